//! TOML configuration parsing and validation.
//!
//! Every section is optional; omitted keys fall back to the defaults below,
//! so an empty file yields a working local setup (fastembed embeddings,
//! Ollama chat endpoint, Serper web search). Credentials never live in the
//! file itself: the config only names the environment variables that hold
//! them.
//!
//! | Environment variable | Effect |
//! |----------------------|--------|
//! | `MEDASSIST_LLM_PROFILE` | Overrides `[llm].profile` (`local` or `cloud`) |
//! | `[search].api_key_env` (default `SERPER_API_KEY`) | Web search API key |
//! | `[llm.cloud].api_key_env` (default `OPENAI_API_KEY`) | Cloud model API key |

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const PROFILE_ENV: &str = "MEDASSIST_LLM_PROFILE";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Where the index lives and which documents feed it.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_documents_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            root: default_documents_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/index.sqlite")
}
fn default_documents_root() -> PathBuf {
    PathBuf::from("./documents")
}
fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
        "**/*.pdf".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    250
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the `openai` and `ollama` providers.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env_openai")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            api_key_env: default_api_key_env_openai(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_api_key_env_openai() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Document acceptance policy for the retrieval orchestrator.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of nearest documents requested from the index.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Maximum-distance tiers, tried in order. Must be ascending.
    #[serde(default = "default_max_distances")]
    pub max_distances: Vec<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            max_distances: default_max_distances(),
        }
    }
}

fn default_k() -> usize {
    3
}
fn default_max_distances() -> Vec<f32> {
    vec![1.5, 2.0]
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    /// Entry lifetime in seconds; `0` keeps entries until evicted.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_capacity() -> usize {
    2048
}
fn default_cache_ttl_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    /// Number of most recent turns injected into each prompt.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Character budget for each remembered answer.
    #[serde(default = "default_answer_chars")]
    pub answer_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            answer_chars: default_answer_chars(),
        }
    }
}

fn default_window() -> usize {
    3
}
fn default_answer_chars() -> usize {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// `serper` or `disabled`.
    #[serde(default = "default_search_provider")]
    pub provider: String,
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            endpoint: default_search_endpoint(),
            api_key_env: default_search_api_key_env(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_search_provider() -> String {
    "serper".to_string()
}
fn default_search_endpoint() -> String {
    "https://google.serper.dev/search".to_string()
}
fn default_search_api_key_env() -> String {
    "SERPER_API_KEY".to_string()
}
fn default_search_timeout_secs() -> u64 {
    10
}

/// Chat-completion deployment profile.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProfile {
    /// Unauthenticated OpenAI-compatible endpoint on this machine.
    #[default]
    Local,
    /// Hosted endpoint; requires an API key from the environment.
    Cloud,
}

impl FromStr for LlmProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(LlmProfile::Local),
            "cloud" => Ok(LlmProfile::Cloud),
            other => bail!("Unknown LLM profile: '{}'. Must be local or cloud.", other),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmBackendConfig {
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the API key. `None` sends no credentials.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub profile: LlmProfile,
    #[serde(default = "default_local_backend")]
    pub local: LlmBackendConfig,
    #[serde(default = "default_cloud_backend")]
    pub cloud: LlmBackendConfig,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            profile: LlmProfile::default(),
            local: default_local_backend(),
            cloud: default_cloud_backend(),
            system_prompt: default_system_prompt(),
            max_tokens: default_llm_max_tokens(),
            temperature: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// The backend selected by `profile`.
    pub fn active(&self) -> &LlmBackendConfig {
        match self.profile {
            LlmProfile::Local => &self.local,
            LlmProfile::Cloud => &self.cloud,
        }
    }
}

fn default_local_backend() -> LlmBackendConfig {
    LlmBackendConfig {
        model: "mistral".to_string(),
        base_url: "http://localhost:11434/v1".to_string(),
        api_key_env: None,
    }
}
fn default_cloud_backend() -> LlmBackendConfig {
    LlmBackendConfig {
        model: "gpt-4o-mini".to_string(),
        base_url: "https://api.openai.com/v1".to_string(),
        api_key_env: Some("OPENAI_API_KEY".to_string()),
    }
}
fn default_system_prompt() -> String {
    "You are an intelligent medical assistant. Answer precisely using the context \
     provided from local documents or web search and the recent conversation. \
     Remind the user that your answers are informational and do not replace \
     professional medical advice."
        .to_string()
}
fn default_llm_max_tokens() -> u32 {
    2000
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionsConfig {
    #[serde(default = "default_sessions_dir")]
    pub dir: PathBuf,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: default_sessions_dir(),
        }
    }
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("./conversations")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default = "default_events_path")]
    pub path: PathBuf,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            path: default_events_path(),
        }
    }
}

fn default_events_path() -> PathBuf {
    PathBuf::from("./logs/events.jsonl")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
        }
    }
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("./exports")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if let Ok(profile) = std::env::var(PROFILE_ENV) {
        config.llm.profile = profile
            .parse()
            .with_context(|| format!("Invalid {}", PROFILE_ENV))?;
    }

    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_tokens == 0 {
            bail!("chunking.max_tokens must be > 0");
        }

        // Validate retrieval
        if self.retrieval.k == 0 {
            bail!("retrieval.k must be >= 1");
        }
        if self.retrieval.max_distances.is_empty() {
            bail!("retrieval.max_distances must contain at least one threshold");
        }
        if self
            .retrieval
            .max_distances
            .iter()
            .any(|d| !d.is_finite() || *d < 0.0)
        {
            bail!("retrieval.max_distances must be finite and >= 0");
        }
        if self
            .retrieval
            .max_distances
            .windows(2)
            .any(|pair| pair[1] < pair[0])
        {
            bail!("retrieval.max_distances must be in ascending order");
        }

        if self.cache.capacity == 0 {
            bail!("cache.capacity must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
                other
            ),
        }
        if matches!(self.embedding.provider.as_str(), "openai" | "ollama")
            && self.embedding.model.is_none()
        {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                self.embedding.provider
            );
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.search.provider.as_str() {
            "disabled" | "serper" => {}
            other => bail!(
                "Unknown search provider: '{}'. Must be disabled or serper.",
                other
            ),
        }

        if self.llm.active().model.trim().is_empty() {
            bail!("llm model must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.retrieval.k, 3);
        assert_eq!(config.retrieval.max_distances, vec![1.5, 2.0]);
        assert_eq!(config.memory.window, 3);
        assert_eq!(config.memory.answer_chars, 300);
        assert_eq!(config.search.timeout_secs, 10);
    }

    #[test]
    fn test_sections_override_defaults() {
        let file = write_config(
            r#"
[retrieval]
k = 5
max_distances = [0.7]

[memory]
window = 2

[llm.local]
model = "llama3"
base_url = "http://127.0.0.1:8080/v1"
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.retrieval.k, 5);
        assert_eq!(config.retrieval.max_distances, vec![0.7]);
        assert_eq!(config.memory.window, 2);
        assert_eq!(config.llm.active().model, "llama3");
        assert!(config.llm.active().api_key_env.is_none());
    }

    #[test]
    fn test_descending_thresholds_rejected() {
        let file = write_config("[retrieval]\nmax_distances = [2.0, 1.0]\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("ascending"));
    }

    #[test]
    fn test_empty_thresholds_rejected() {
        let file = write_config("[retrieval]\nmax_distances = []\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let file = write_config("[embedding]\nprovider = \"magic\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!("Cloud".parse::<LlmProfile>().unwrap(), LlmProfile::Cloud);
        assert_eq!(" local ".parse::<LlmProfile>().unwrap(), LlmProfile::Local);
        assert!("remote".parse::<LlmProfile>().is_err());
    }

    #[test]
    fn test_cloud_profile_selects_cloud_backend() {
        let mut config = Config::default();
        config.llm.profile = LlmProfile::Cloud;
        assert_eq!(
            config.llm.active().api_key_env.as_deref(),
            Some("OPENAI_API_KEY")
        );
    }
}
