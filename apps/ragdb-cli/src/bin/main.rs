use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use ragdb_cli::{build_retriever, extract_definition, ingest, init_logging, open_corpus, print_json, print_results, UNKNOWN_ANSWER};
use ragdb_core::config::{Config, Settings};
use ragdb_core::types::ChunkId;
use ragdb_embed::get_default_embedder;
use ragdb_hybrid::RetrievalMode;

const USAGE: &str = "Usage: ragdb <command> [args...]

Commands:
  ingest [DIR] [--limit N]
  query \"<query>\" [--mode hybrid|lexical|vector] [--top-k N] [--weight W] [--json]
  show <ID>
  answer \"<query>\"";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{}", USAGE); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

/// Value following `flag`, if the flag is present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|a| a == flag) {
        Some(i) => args.get(i + 1).map(|v| Some(v.as_str())).ok_or_else(|| anyhow!("{} requires a value", flag)),
        None => Ok(None),
    }
}

/// First argument that is neither a flag nor a flag's value.
fn positional(args: &[String]) -> Option<&str> {
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if arg == "--json" { i += 1; continue; }
        if arg.starts_with("--") { i += 2; continue; }
        return Some(arg.as_str());
    }
    None
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let mut settings: Settings = config.settings()?;
    if let Err(e) = init_logging(&settings.logging) { eprintln!("Warning: {:#}", e); }
    let store_dir = config.resolve_path(&settings.data.store_dir);
    let (cmd, args) = parse_args();

    match cmd.as_str() {
        "ingest" => {
            let data_dir = positional(&args).map(PathBuf::from).unwrap_or_else(|| config.resolve_path(&settings.data.raw_txt_dir));
            let limit = flag_value(&args, "--limit")?.map(str::parse::<usize>).transpose()?;
            println!("Ingesting from {}", data_dir.display());
            let count = ingest(&data_dir, &store_dir, settings.chunking.clone(), limit, get_default_embedder().as_ref())?;
            println!("Ingest complete ({} chunks) -> {}", count, store_dir.display());
        }
        "query" => {
            let Some(query) = positional(&args) else { bail!("Usage: ragdb query \"<query>\" [--mode M] [--top-k N] [--weight W] [--json]") };
            let mode: RetrievalMode = flag_value(&args, "--mode")?.map(str::parse::<RetrievalMode>).transpose()?.unwrap_or_default();
            if let Some(w) = flag_value(&args, "--weight")? { settings.retrieval.weight = w.parse()?; }
            if let Some(k) = flag_value(&args, "--top-k")? { settings.retrieval.top_k = k.parse()?; }
            settings.retrieval.validate()?;
            let top_k = settings.retrieval.top_k;

            let corpus = open_corpus(&store_dir, get_default_embedder())?;
            let retrieval = build_retriever(settings.retrieval).retrieve_with(&corpus, query, mode, top_k).await?;
            if args.iter().any(|a| a == "--json") { print_json(&retrieval)?; } else { print_results(&retrieval); }
        }
        "show" => {
            let id: ChunkId = positional(&args).ok_or_else(|| anyhow!("Usage: ragdb show <ID>"))?.parse()?;
            let corpus = open_corpus(&store_dir, get_default_embedder())?;
            let chunk = corpus.chunk(id).ok_or_else(|| anyhow!("no chunk with id {}", id))?;
            println!("--- Chunk {} ---", chunk.id);
            println!("Source: {}#{}", chunk.source, chunk.local_index);
            println!("Text:\n{}", chunk.text);
        }
        "answer" => {
            let Some(query) = positional(&args) else { bail!("Usage: ragdb answer \"<query>\"") };
            let corpus = open_corpus(&store_dir, get_default_embedder())?;
            let retrieval = build_retriever(settings.retrieval).retrieve(&corpus, query).await?;
            println!("Question: {}", query);
            println!("Answer: {}", extract_definition(query, &retrieval.results).as_deref().unwrap_or(UNKNOWN_ANSWER));
            println!("Sources:");
            for r in &retrieval.results { println!("- {}#{}", r.source, r.local_index); }
        }
        _ => { eprintln!("Unknown command: {}\n\n{}", cmd, USAGE); std::process::exit(1); }
    }
    Ok(())
}
