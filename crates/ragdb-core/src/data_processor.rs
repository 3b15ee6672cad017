//! Loads `.txt` sources and splits them into overlapping character windows.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkId};

/// How far a window end may move left looking for whitespace.
const MAX_BACKTRACK: usize = 40;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 120, overlap: 30 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be positive".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// A source file loaded into memory.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source: String,
    pub text: String,
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Result<Self> {
        chunking_config.validate()?;
        Ok(Self { chunking_config })
    }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Chunk>> {
        let documents = self.load_documents(data_dir, None)?;
        Ok(self.chunk_documents(&documents))
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<Chunk>> {
        let documents = self.load_documents(data_dir, Some(limit))?;
        Ok(self.chunk_documents(&documents))
    }

    /// Read every `.txt` file under `data_dir` in sorted path order.
    pub fn load_documents(&self, data_dir: &Path, limit: Option<usize>) -> Result<Vec<SourceDocument>> {
        let mut files = self.list_txt_files(data_dir);
        if files.is_empty() {
            info!("No .txt files found under {}", data_dir.display());
            return Ok(vec![]);
        }
        if let Some(limit) = limit {
            if files.len() > limit { files.truncate(limit); info!("Limited to first {} files", limit); }
        }
        let mut documents = Vec::with_capacity(files.len());
        for (file_index, file_path) in files.iter().enumerate() {
            debug!("Reading file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            let text = self.read_file_content(file_path)?;
            documents.push(SourceDocument { source: file_path.to_string_lossy().to_string(), text });
        }
        Ok(documents)
    }

    /// Chunk documents in order. Ids are global and monotonic starting at 0;
    /// `local_index` restarts at 0 for each source.
    pub fn chunk_documents(&self, documents: &[SourceDocument]) -> Vec<Chunk> {
        let mut all_chunks = Vec::new();
        let mut next_id: ChunkId = 0;
        for document in documents {
            for (local_index, text) in self.chunk_text(&document.text).into_iter().enumerate() {
                all_chunks.push(Chunk { id: next_id, text, source: document.source.clone(), local_index });
                next_id += 1;
            }
        }
        info!("Processed {} documents into {} chunks", documents.len(), all_chunks.len());
        all_chunks
    }

    /// Whitespace-aware character windows. A window end backs off to the
    /// nearest whitespace (at most `MAX_BACKTRACK` chars) so words are not cut,
    /// and every step advances by at least one character.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let normalized = normalize_whitespace(text);
        let chars: Vec<char> = normalized.chars().collect();
        let n = chars.len();
        let chunk_size = self.chunking_config.chunk_size;
        let overlap = self.chunking_config.overlap;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < n {
            let raw_end = (start + chunk_size).min(n);
            let mut end = raw_end;
            if raw_end < n {
                let mut backtrack = 0;
                while end > start && backtrack < MAX_BACKTRACK && !chars[end - 1].is_whitespace() {
                    end -= 1;
                    backtrack += 1;
                }
                if end == start { end = raw_end; }
            }
            let window: String = chars[start..end].iter().collect();
            let window = window.trim();
            if !window.is_empty() { chunks.push(window.to_string()); }
            if end == n { break; }
            start = end.saturating_sub(overlap).max(start + 1);
        }
        chunks
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort(); txt_files
    }
}

/// Collapse every whitespace run into a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
