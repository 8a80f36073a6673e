use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub filerag: FileragConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Storage locations and logging
#[derive(Debug, Clone, Deserialize)]
pub struct FileragConfig {
    /// JSON snapshot of the metadata registry
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
    /// SQLite file holding the retrievable index
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for FileragConfig {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            index_path: default_index_path(),
            log_level: default_log_level(),
        }
    }
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    /// "hash" (local, offline) or "openai" (any OpenAI-compatible endpoint)
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            api_key_env: default_embedding_api_key_env(),
            base_url: default_openai_base_url(),
            batch_size: default_batch_size(),
            dimensions: default_dimensions(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Generator (chat completion) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_base_url")]
    pub base_url: String,
    #[serde(default = "default_generator_model")]
    pub model: String,
    #[serde(default = "default_generator_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_generator_base_url(),
            model: default_generator_model(),
            api_key_env: default_generator_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_generator_timeout_secs(),
        }
    }
}

/// Retrieval and segmentation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Target chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of one span
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_index_timeout_secs")]
    pub index_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            index_timeout_secs: default_index_timeout_secs(),
        }
    }
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("file_metadata.json")
}

fn default_index_path() -> PathBuf {
    PathBuf::from("index.db")
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_dimensions() -> usize {
    384
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_generator_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_generator_model() -> String {
    "qwen/qwen3-30b-a3b:free".to_string()
}

fn default_generator_api_key_env() -> String {
    "API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    512
}

fn default_generator_timeout_secs() -> u64 {
    60
}

fn default_top_k() -> usize {
    3
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_index_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. `explicit` path (the `--config` flag)
    /// 2. Path specified in FILERAG_CONFIG environment variable
    /// 3. ./config.toml in current directory (built-in defaults when absent)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("FILERAG_CONFIG").ok().map(PathBuf::from));

        let config = match named {
            Some(path) => Self::from_file(&path)?,
            None => {
                let path = PathBuf::from("config.toml");
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    log::debug!("No config.toml found, using built-in defaults");
                    Config::default()
                }
            }
        };

        config.validate()?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        match self.embeddings.provider.as_str() {
            "hash" | "openai" => {}
            other => anyhow::bail!(
                "embeddings.provider must be \"hash\" or \"openai\", got \"{}\"",
                other
            ),
        }

        if self.embeddings.dimensions == 0 {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be greater than 0");
        }

        if self.retrieval.chunk_size == 0 {
            anyhow::bail!("retrieval.chunk_size must be greater than 0");
        }

        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            anyhow::bail!("retrieval.chunk_overlap must be less than chunk_size");
        }

        if !(self.generator.temperature > 0.0 && self.generator.temperature <= 2.0) {
            anyhow::bail!("generator.temperature must be in (0.0, 2.0]");
        }

        if self.generator.max_tokens == 0 {
            anyhow::bail!("generator.max_tokens must be greater than 0");
        }

        Ok(())
    }

    /// Get registry snapshot path
    pub fn registry_path(&self) -> &Path {
        &self.filerag.registry_path
    }

    /// Get retrievable index database path
    pub fn index_path(&self) -> &Path {
        &self.filerag.index_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const TEST_CONFIG: &str = r#"
[filerag]
registry_path = "./meta.json"
index_path = "./test.db"
log_level = "debug"

[embeddings]
provider = "openai"
model = "text-embedding-3-small"
dimensions = 1536

[generator]
model = "test-model"
temperature = 0.2
max_tokens = 128

[retrieval]
top_k = 5
chunk_size = 300
chunk_overlap = 30
"#;

    #[test]
    fn test_defaults_match_reference_behaviour() {
        let config = Config::default();
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.chunk_size, 500);
        assert_eq!(config.retrieval.chunk_overlap, 50);
        assert_eq!(config.generator.max_tokens, 512);
        assert!((config.generator.temperature - 0.7).abs() < 1e-6);
        assert_eq!(config.registry_path(), Path::new("file_metadata.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_explicit_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, TEST_CONFIG).unwrap();

        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.filerag.log_level, "debug");
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.embeddings.provider, "openai");
        assert_eq!(config.generator.model, "test-model");
        // Unspecified keys fall back to defaults
        assert_eq!(config.embeddings.batch_size, 100);
        assert_eq!(config.generator.base_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn test_config_from_env_var() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("custom.toml");
        fs::write(&config_path, TEST_CONFIG).unwrap();

        let original = std::env::var("FILERAG_CONFIG").ok();
        std::env::set_var("FILERAG_CONFIG", config_path.to_str().unwrap());
        let config = Config::load(None);
        std::env::remove_var("FILERAG_CONFIG");
        if let Some(v) = original {
            std::env::set_var("FILERAG_CONFIG", v);
        }

        let config = config.unwrap();
        assert_eq!(config.retrieval.chunk_size, 300);
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let config = Config::load(Some(Path::new("nonexistent.toml")));
        assert!(config.is_err());
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_size() {
        let mut config = Config::default();
        config.retrieval.chunk_overlap = 500;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let mut config = Config::default();
        config.embeddings.provider = "magic".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_temperature() {
        let mut config = Config::default();
        config.generator.temperature = 0.0;
        assert!(config.validate().is_err());
    }
}
