use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the whole assistant.
///
/// Resolved once at startup and shared read-only with every component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind (host:port)
    pub bind: String,
    /// Public base URL of the web front end, sent as the CORS allow-origin
    pub public_base_url: Option<String>,
}

/// Where legal documents and their embeddings are searched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StorageMode {
    /// Hosted Postgres with pgvector, reached through its REST gateway
    Remote,
    /// In-process store, optionally seeded from a JSON file of rows
    Memory {
        #[serde(default)]
        seed_path: Option<String>,
    },
}

impl Default for StorageMode {
    fn default() -> Self {
        Self::Remote
    }
}

/// Data-store project settings and the names of its remote functions and tables.
///
/// Query embeddings always come from the project's edge function, whichever
/// storage mode serves the documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub api_key: String,
    pub storage_mode: StorageMode,
    /// Similarity search RPC
    pub match_function: String,
    /// Parameter added to the RPC when filtering by jurisdiction
    pub filter_param: String,
    pub documents_table: String,
    /// Column holding the jurisdiction label
    pub jurisdiction_column: String,
    /// Edge function producing query embeddings
    pub embedding_function: String,
    pub timeout_secs: u64,
}

/// Configuration for the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub api_version: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

/// How the jurisdiction selection narrows retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Filter server-side; only exact label matches come back
    Strict,
    /// Fetch unfiltered, keep rows whose label contains the query label or vice versa
    Fuzzy,
    /// Ignore the jurisdiction during retrieval
    None,
}

/// Whether the chat endpoint streams fragments or returns one body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Streaming,
    Buffered,
}

/// Shape the model is told to give substantive answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerFormat {
    Paragraph,
    Bullets,
}

/// Retrieval and generation parameters for the chat pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub match_threshold: f32,
    pub match_count: usize,
    /// Character budget for the assembled context
    pub max_context_chars: usize,
    pub filter_mode: FilterMode,
    pub response_mode: ResponseMode,
    pub answer_format: AnswerFormat,
    /// Probe the jurisdiction's document count before doing any work
    pub preflight: bool,
    /// Prefix each context row with its citation tag
    pub source_tags: bool,
    /// Ask the model for a follow-up question before retrieving
    pub clarify_first: bool,
}

/// Parameters for the CSV export endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub match_threshold: f32,
    pub match_count: usize,
    pub filename: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            public_base_url: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            storage_mode: StorageMode::default(),
            match_function: "match_documents".to_string(),
            filter_param: "county_param".to_string(),
            documents_table: "documents".to_string(),
            jurisdiction_column: "county".to_string(),
            embedding_function: "generate-embeddings".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            model: "claude-3-opus-20240229".to_string(),
            api_version: "2023-06-01".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            timeout_secs: 120,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.5,
            match_count: 100,
            max_context_chars: 1500,
            filter_mode: FilterMode::Strict,
            response_mode: ResponseMode::Streaming,
            answer_format: AnswerFormat::Bullets,
            preflight: true,
            source_tags: true,
            clarify_first: false,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.1,
            match_count: 10,
            filename: "data.csv".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides without validating the result.
    pub fn merge_env(mut self) -> Self {
        self.apply_overrides(|name| dotenv::var(name).ok().filter(|v| !v.is_empty()));
        self
    }

    /// Apply environment overrides (a `.env` file is honoured) and check that
    /// the service endpoints are set.
    pub fn with_env_overrides(self) -> Result<Self> {
        let config = self.merge_env();
        config.validate()?;
        config.validate_endpoints()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SUPABASE_URL") {
            self.store.url = url;
        }
        if let Some(key) = lookup("SUPABASE_ANON_KEY") {
            self.store.api_key = key;
        }

        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.llm.api_key = key;
        }

        if let Some(base) = lookup("PUBLIC_BASE_URL").or_else(|| lookup("NEXT_PUBLIC_API_URL")) {
            self.server.public_base_url = Some(base);
        }

        if let Some(bind) = lookup("UNBARRED_BIND") {
            self.server.bind = bind;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.match_count == 0 {
            return Err(ConfigError::Invalid("pipeline.match_count must be at least 1".to_string()));
        }
        if self.export.match_count == 0 {
            return Err(ConfigError::Invalid("export.match_count must be at least 1".to_string()));
        }
        Ok(())
    }

    fn validate_endpoints(&self) -> Result<()> {
        if self.store.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "store.url must be set (or SUPABASE_URL in the environment)".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.match_threshold, 0.5);
        assert_eq!(config.match_count, 100);
        assert_eq!(config.max_context_chars, 1500);
        assert_eq!(config.filter_mode, FilterMode::Strict);
        assert!(config.preflight);
    }

    #[test]
    fn test_export_config_defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.match_threshold, 0.1);
        assert_eq!(config.match_count, 10);
        assert_eq!(config.filename, "data.csv");
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "store:\n  url: https://example.supabase.co\npipeline:\n  match_count: 20\n  max_context_chars: 2000\n  filter_mode: fuzzy\n  response_mode: buffered\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.pipeline.max_context_chars, 2000);
        assert_eq!(config.pipeline.match_threshold, 0.5);
        assert_eq!(config.pipeline.filter_mode, FilterMode::Fuzzy);
        assert_eq!(config.pipeline.response_mode, ResponseMode::Buffered);
        assert!(config.pipeline.source_tags);
        assert_eq!(config.store.match_function, "match_documents");
        assert!(matches!(config.store.storage_mode, StorageMode::Remote));
        assert_eq!(config.llm.api_version, "2023-06-01");
    }

    #[test]
    fn test_load_rejects_zero_match_count() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "export:\n  match_count: 0\n").unwrap();

        assert!(matches!(Config::load(file.path()), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_endpoints_require_store_url() {
        let mut config = Config::default();
        config.apply_overrides(|_| None);

        assert!(matches!(config.validate_endpoints(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SUPABASE_URL", "https://example.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("NEXT_PUBLIC_API_URL", "https://unbarred.example"),
        ]);

        let mut config = Config::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.store.url, "https://example.supabase.co");
        assert_eq!(config.store.api_key, "anon");
        assert_eq!(config.llm.api_key, "sk-test");
        assert_eq!(config.server.public_base_url.as_deref(), Some("https://unbarred.example"));
    }
}
