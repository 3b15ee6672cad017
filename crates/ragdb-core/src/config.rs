//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`,
//! `config.<env>.toml` and `APP_*` env vars (nested keys split on `__`, so
//! `APP_RETRIEVAL__WEIGHT=0.3` overrides `retrieval.weight`). Provides helpers
//! to expand `~` and `${VAR}` and to resolve relative paths against a known
//! base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::data_processor::ChunkingConfig;
use crate::error::Error;

pub struct Config {
    figment: Figment,
    dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Load from `dir` for the given environment name. Missing files are
    /// skipped, so an empty directory yields the defaults.
    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, dir: dir.to_path_buf() };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Resolve a configured path against the directory the config was loaded from.
    pub fn resolve_path<S: AsRef<str>>(&self, p: S) -> PathBuf {
        resolve_with_base(&self.dir, p)
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        self.chunking.validate()?;
        self.retrieval.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub raw_txt_dir: String,
    pub store_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { raw_txt_dir: "data".to_string(), store_dir: "artifacts".to_string() }
    }
}

/// Knobs of the hybrid retrieval pipeline.
///
/// `weight` is the share of the vector signal in the fused score; the lexical
/// signal gets `1 - weight`. Timeouts apply per signal and to the reranker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub weight: f32,
    pub top_k: usize,
    pub lexical_k: usize,
    pub vector_k: usize,
    pub signal_timeout_ms: u64,
    pub rerank_timeout_ms: u64,
    pub rerank: bool,
    pub fallback_to_fusion: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            weight: 0.5,
            top_k: 5,
            lexical_k: 10,
            vector_k: 10,
            signal_timeout_ms: 2_000,
            rerank_timeout_ms: 5_000,
            rerank: true,
            fallback_to_fusion: false,
        }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(Error::InvalidConfig(format!("retrieval.weight must be within [0, 1], got {}", self.weight)));
        }
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be positive".to_string()));
        }
        if self.signal_timeout_ms == 0 || self.rerank_timeout_ms == 0 {
            return Err(Error::InvalidConfig("retrieval timeouts must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
