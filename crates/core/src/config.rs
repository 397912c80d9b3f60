//! Configuration management for ragfall.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.ragfall/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources override earlier ones.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["openai", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .ragfall/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM provider ("openai" for OpenAI-compatible servers, "ollama")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Completion endpoint; provider default when unset
    pub endpoint: Option<String>,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Sampling and transport settings for the language model
    pub llm: LlmSettings,

    /// Vector store connection
    pub vector_store: VectorStoreSettings,

    /// Web search used by the fallback tier
    pub web_search: WebSearchSettings,

    /// Retrieval and fusion parameters
    pub retrieval: RetrievalSettings,
}

/// Sampling and transport settings for the language model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmSettings {
    pub temperature: f32,

    /// `-1` asks OpenAI-compatible servers for no limit
    pub max_tokens: Option<i32>,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: Some(-1),
            api_key_env: None,
            timeout_secs: 30,
        }
    }
}

/// Chroma-compatible vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct VectorStoreSettings {
    pub url: String,
    pub collection: String,

    /// Ollama endpoint used to embed query text
    pub embedding_endpoint: String,

    /// Must match the model the collection was indexed with
    pub embedding_model: String,

    pub timeout_secs: u64,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            collection: "olympics".to_string(),
            embedding_endpoint: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Web search settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct WebSearchSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for WebSearchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.duckduckgo.com/".to_string(),
            max_results: 3,
            timeout_secs: 10,
        }
    }
}

/// Retrieval and fusion parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalSettings {
    /// Passages requested per similarity query
    pub limit: usize,

    /// Passages kept after fusion
    pub top_k: usize,

    /// RRF smoothing constant
    pub rrf_k: f64,

    /// Sources displayed for a first-pass answer
    pub sources_shown: usize,

    /// Paraphrases requested from the rewriter
    pub rewrite_count: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            limit: 10,
            top_k: 10,
            rrf_k: 60.0,
            sources_shown: 3,
            rewrite_count: 5,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    llm: Option<LlmSection>,
    vector_store: Option<VectorStoreSettings>,
    web_search: Option<WebSearchSettings>,
    retrieval: Option<RetrievalSettings>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmSection {
    provider: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<i32>,
    api_key_env: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "openai".to_string(),
            model: "meta-llama-3.1-8b-instruct".to_string(),
            endpoint: None,
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: LlmSettings::default(),
            vector_store: VectorStoreSettings::default(),
            web_search: WebSearchSettings::default(),
            retrieval: RetrievalSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `RAGFALL_WORKSPACE`: Override workspace path
    /// - `RAGFALL_CONFIG`: Path to config file
    /// - `RAGFALL_PROVIDER`: LLM provider
    /// - `RAGFALL_MODEL`: Model identifier
    /// - `RAGFALL_ENDPOINT`: Completion endpoint
    /// - `RAGFALL_API_KEY`: API key
    /// - `RAGFALL_CHROMA_URL`: Vector store URL
    /// - `RAGFALL_COLLECTION`: Vector store collection
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use ragfall_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Load like [`AppConfig::load`], with a config file or workspace chosen
    /// on the command line taking the place of `RAGFALL_CONFIG` and
    /// `RAGFALL_WORKSPACE`. Environment variables still override the file.
    pub fn load_with(config_file: Option<&Path>, workspace: Option<&Path>) -> AppResult<Self> {
        Self::load_from(config_file, workspace, |key| std::env::var(key).ok())
    }

    fn load_from(
        config_file: Option<&Path>,
        workspace: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace
            .map(Path::to_path_buf)
            .or_else(|| env("RAGFALL_WORKSPACE").map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file = config_file
            .map(Path::to_path_buf)
            .or_else(|| env("RAGFALL_CONFIG").map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.ragfall_dir().join("config.yaml"));

        if config_path.exists() {
            tracing::debug!("Loading config file {:?}", config_path);
            config = config.merge_yaml(&config_path)?;
        }

        config.apply_env(&env);

        Ok(config)
    }

    /// Environment variables override YAML config.
    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) {
        if let Some(provider) = env("RAGFALL_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = env("RAGFALL_MODEL") {
            self.model = model;
        }
        if let Some(endpoint) = env("RAGFALL_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Some(url) = env("RAGFALL_CHROMA_URL") {
            self.vector_store.url = url;
        }
        if let Some(collection) = env("RAGFALL_COLLECTION") {
            self.vector_store.collection = collection;
        }
        if let Some(key) = env("RAGFALL_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(level) = env("RUST_LOG") {
            self.log_level = Some(level);
        }
        if env("NO_COLOR").is_some() {
            self.no_color = true;
        }
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> Result<Self, serde_yaml::Error> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
            if llm.endpoint.is_some() {
                result.endpoint = llm.endpoint;
            }
            if let Some(temperature) = llm.temperature {
                result.llm.temperature = temperature;
            }
            if llm.max_tokens.is_some() {
                result.llm.max_tokens = llm.max_tokens;
            }
            if llm.api_key_env.is_some() {
                result.llm.api_key_env = llm.api_key_env;
            }
            if let Some(timeout) = llm.timeout_secs {
                result.llm.timeout_secs = timeout;
            }
        }

        if let Some(vector_store) = config_file.vector_store {
            result.vector_store = vector_store;
        }
        if let Some(web_search) = config_file.web_search {
            result.web_search = web_search;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and
    /// the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        endpoint: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(endpoint) = endpoint {
            self.endpoint = Some(endpoint);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .ragfall directory.
    pub fn ragfall_dir(&self) -> PathBuf {
        self.workspace.join(".ragfall")
    }

    /// Resolve the LLM API key: explicit key first, then `llm.apiKeyEnv`.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        self.llm
            .api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.vector_store.timeout_secs)
    }

    pub fn web_timeout(&self) -> Duration {
        Duration::from_secs(self.web_search.timeout_secs)
    }

    /// Validate provider names and numeric ranges.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.to_lowercase();
        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if let Some(ref env_var) = self.llm.api_key_env {
            if self.api_key.is_none() && std::env::var(env_var).is_err() {
                return Err(AppError::Config(format!(
                    "API key not found in environment variable: {}",
                    env_var
                )));
            }
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AppError::Config(format!(
                "Temperature must be within 0.0-2.0, got {}",
                self.llm.temperature
            )));
        }

        let retrieval = &self.retrieval;
        if retrieval.limit == 0 || retrieval.top_k == 0 {
            return Err(AppError::Config(
                "retrieval.limit and retrieval.topK must be at least 1".to_string(),
            ));
        }

        if !retrieval.rrf_k.is_finite() || retrieval.rrf_k <= 0.0 {
            return Err(AppError::Config(format!(
                "retrieval.rrfK must be a positive number, got {}",
                retrieval.rrf_k
            )));
        }

        if self.llm.timeout_secs == 0
            || self.vector_store.timeout_secs == 0
            || self.web_search.timeout_secs == 0
        {
            return Err(AppError::Config("Timeouts must be at least 1 second".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn test_env_overrides_explicit_config_file() {
        let workspace = tempfile::TempDir::new().unwrap();
        let elsewhere = tempfile::TempDir::new().unwrap();
        let path = elsewhere.path().join("ragfall.yaml");
        std::fs::write(
            &path,
            concat!(
                "vectorStore:\n  collection: from_yaml\n  url: http://chroma:8000\n",
                "retrieval:\n  limit: 4\n",
            ),
        )
        .unwrap();

        let config = AppConfig::load_from(
            Some(&path),
            Some(workspace.path()),
            env_of(&[("RAGFALL_COLLECTION", "from_env")]),
        )
        .unwrap();

        assert_eq!(config.vector_store.collection, "from_env");
        assert_eq!(config.vector_store.url, "http://chroma:8000");
        assert_eq!(config.retrieval.limit, 4);
        assert_eq!(config.config_file.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_workspace_config_file_is_read() {
        let workspace = tempfile::TempDir::new().unwrap();
        let ragfall_dir = workspace.path().join(".ragfall");
        std::fs::create_dir_all(&ragfall_dir).unwrap();
        std::fs::write(
            ragfall_dir.join("config.yaml"),
            "llm:\n  model: from_yaml\n  provider: ollama\n",
        )
        .unwrap();

        let config = AppConfig::load_from(
            None,
            Some(workspace.path()),
            env_of(&[("RAGFALL_MODEL", "from_env"), ("NO_COLOR", "1")]),
        )
        .unwrap();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "from_env");
        assert!(config.no_color);

        // Command-line flags win over the environment.
        let config = config.with_overrides(
            None,
            None,
            None,
            Some("from_cli".to_string()),
            None,
            None,
            false,
            false,
        );
        assert_eq!(config.model, "from_cli");
    }

    #[test]
    fn test_missing_workspace_is_config_error() {
        let result = AppConfig::load_from(
            None,
            Some(Path::new("/definitely/not/a/ragfall/workspace")),
            env_of(&[]),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "meta-llama-3.1-8b-instruct");
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.max_tokens, Some(-1));
        assert_eq!(config.retrieval.limit, 10);
        assert_eq!(config.retrieval.rrf_k, 60.0);
        assert_eq!(config.web_search.max_results, 3);
        assert_eq!(config.llm_timeout(), Duration::from_secs(30));
        assert_eq!(config.search_timeout(), Duration::from_secs(10));
        assert!(!config.verbose);
    }

    #[test]
    fn test_ragfall_dir() {
        let config = AppConfig::default();
        assert!(config.ragfall_dir().ends_with(".ragfall"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("ollama".to_string()),
            Some("llama3.2".to_string()),
            Some("http://gpu-box:11434".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "ollama");
        assert_eq!(overridden.model, "llama3.2");
        assert_eq!(overridden.endpoint.as_deref(), Some("http://gpu-box:11434"));
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let yaml = r#"
llm:
  provider: ollama
  model: llama3.2
  temperature: 0.5
  timeoutSecs: 60
vectorStore:
  url: http://chroma:8000
  collection: wiki
retrieval:
  topK: 5
logging:
  level: warn
  color: false
"#;
        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();

        assert_eq!(merged.provider, "ollama");
        assert_eq!(merged.model, "llama3.2");
        assert_eq!(merged.llm.temperature, 0.5);
        assert_eq!(merged.llm.timeout_secs, 60);
        // untouched llm keys keep their defaults
        assert_eq!(merged.llm.max_tokens, Some(-1));
        assert_eq!(merged.vector_store.url, "http://chroma:8000");
        assert_eq!(merged.vector_store.collection, "wiki");
        assert_eq!(merged.vector_store.timeout_secs, 10);
        assert_eq!(merged.retrieval.top_k, 5);
        assert_eq!(merged.retrieval.limit, 10);
        assert_eq!(merged.log_level.as_deref(), Some("warn"));
        assert!(merged.no_color);
    }

    #[test]
    fn test_merge_yaml_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "webSearch:\n  enabled: false\n").unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert!(!merged.web_search.enabled);
        assert_eq!(merged.web_search.max_results, 3);
    }

    #[test]
    fn test_merge_yaml_invalid() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "retrieval: [not, a, map]\n").unwrap();

        let err = AppConfig::default().merge_yaml(&path).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_defaults() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_rrf_constant() {
        let mut config = AppConfig::default();
        config.retrieval.rrf_k = 0.0;
        assert!(config.validate().is_err());

        config.retrieval.rrf_k = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let mut config = AppConfig::default();
        config.retrieval.limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_api_key_prefers_explicit() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-explicit".to_string());
        config.llm.api_key_env = Some("RAGFALL_TEST_UNSET_KEY_VAR".to_string());
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-explicit"));
    }
}
