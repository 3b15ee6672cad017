use std::{env, path::PathBuf};

use ragdb_cli::{ingest, init_logging};
use ragdb_core::config::Config;
use ragdb_embed::get_default_embedder;

fn main() -> anyhow::Result<()> {
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    if let Err(e) = init_logging(&settings.logging) { eprintln!("Warning: {:#}", e); }

    let args: Vec<String> = env::args().skip(1).collect();
    let mut data_dir = None; let mut store_dir = None; let mut limit = None;
    let mut i = 0; while i < args.len() { match args[i].as_str() {
        "--limit" => { match args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) { Some(n) => { limit = Some(n); i += 1; } None => { eprintln!("Error: --limit requires a number"); std::process::exit(1); } } }
        "--store" => { match args.get(i + 1) { Some(dir) => { store_dir = Some(PathBuf::from(dir)); i += 1; } None => { eprintln!("Error: --store requires a directory"); std::process::exit(1); } } }
        arg if !arg.starts_with('-') => data_dir = Some(PathBuf::from(arg)), _ => {} } i += 1; }
    let data_dir = data_dir.unwrap_or_else(|| config.resolve_path(&settings.data.raw_txt_dir));
    let store_dir = store_dir.unwrap_or_else(|| config.resolve_path(&settings.data.store_dir));

    println!("ragdb indexer\n=============");
    println!("Data directory: {}", data_dir.display());
    if let Some(limit) = limit { println!("Limiting to {} files", limit); }
    let count = ingest(&data_dir, &store_dir, settings.chunking.clone(), limit, get_default_embedder().as_ref())?;
    println!("\nIndexing completed: {} chunks written to {}", count, store_dir.display());
    println!("To search, use: cargo run --bin ragdb query '<query>'");
    Ok(())
}
