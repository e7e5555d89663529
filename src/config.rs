//! Configuration types for a note-generation run.
//!
//! All run behaviour is controlled through [`NotesConfig`], built via its
//! [`NotesConfigBuilder`]. Credentials and directories live here instead of
//! being read from the process environment deep inside the pipeline, so the
//! resolver and the agent runtime can be exercised against fake endpoints in
//! tests.

use crate::crew::TaskRuntime;
use crate::error::NotesError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default SerpApi search endpoint.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://serpapi.com/search.json";

/// Configuration for a note-generation run.
///
/// Built via [`NotesConfig::builder()`] or using [`NotesConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_notes::NotesConfig;
///
/// let config = NotesConfig::builder()
///     .images_dir("images")
///     .pdf_dir("pdf")
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct NotesConfig {
    /// Directory the downloaded image is written to. Default: `images`.
    pub images_dir: PathBuf,

    /// Directory the assembled PDF is written to. Default: `pdf`.
    pub pdf_dir: PathBuf,

    /// SerpApi key. When `None` the image search is skipped and the run
    /// produces a text-only document.
    pub serpapi_api_key: Option<String>,

    /// Image-search endpoint. Default: [`DEFAULT_SEARCH_ENDPOINT`].
    pub search_endpoint: String,

    /// Widen permissions on the images directory and file to world-writable
    /// (`0o777` / `0o666`). Default: false, which applies `0o755` / `0o644`.
    pub shared_permissions: bool,

    /// Timeout for the image-search request in seconds. Default: 60.
    pub search_timeout_secs: u64,

    /// Timeout for the image download in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// LLM model identifier, e.g. "gpt-4.1-mini". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed agent runtime. Takes precedence over every provider
    /// setting; the default runtime is [`crate::pipeline::llm::LlmRuntime`].
    pub runtime: Option<Arc<dyn TaskRuntime>>,

    /// Sampling temperature for each task completion. Default: 0.7.
    pub temperature: f32,

    /// Maximum tokens an agent may generate per task. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a failed task completion. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 1000.
    pub retry_backoff_ms: u64,

    /// Per-task completion timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Optional stage-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("images"),
            pdf_dir: PathBuf::from("pdf"),
            serpapi_api_key: None,
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            shared_permissions: false,
            search_timeout_secs: 60,
            download_timeout_secs: 120,
            model: None,
            provider_name: None,
            provider: None,
            runtime: None,
            temperature: 0.7,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 1000,
            api_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for NotesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotesConfig")
            .field("images_dir", &self.images_dir)
            .field("pdf_dir", &self.pdf_dir)
            .field("serpapi_api_key", &self.serpapi_api_key.as_ref().map(|_| "<redacted>"))
            .field("search_endpoint", &self.search_endpoint)
            .field("shared_permissions", &self.shared_permissions)
            .field("search_timeout_secs", &self.search_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("runtime", &self.runtime.as_ref().map(|_| "<dyn TaskRuntime>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl NotesConfig {
    /// Create a new builder for `NotesConfig`.
    pub fn builder() -> NotesConfigBuilder {
        NotesConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`NotesConfig`].
pub struct NotesConfigBuilder {
    config: NotesConfig,
}

impl fmt::Debug for NotesConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotesConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl NotesConfigBuilder {
    pub fn images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.images_dir = dir.into();
        self
    }

    pub fn pdf_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdf_dir = dir.into();
        self
    }

    pub fn serpapi_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.serpapi_api_key = Some(key.into());
        self
    }

    pub fn search_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.search_endpoint = url.into();
        self
    }

    pub fn shared_permissions(mut self, v: bool) -> Self {
        self.config.shared_permissions = v;
        self
    }

    pub fn search_timeout_secs(mut self, secs: u64) -> Self {
        self.config.search_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn TaskRuntime>) -> Self {
        self.config.runtime = Some(runtime);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<NotesConfig, NotesError> {
        let c = &self.config;
        if c.images_dir.as_os_str().is_empty() {
            return Err(NotesError::InvalidConfig(
                "images directory must not be empty".into(),
            ));
        }
        if c.pdf_dir.as_os_str().is_empty() {
            return Err(NotesError::InvalidConfig(
                "PDF directory must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(NotesError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if reqwest::Url::parse(&c.search_endpoint).is_err() {
            return Err(NotesError::InvalidConfig(format!(
                "search endpoint is not a valid URL: '{}'",
                c.search_endpoint
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Requested length of the generated notes.
///
/// The value is forwarded to the note-writing agent as-is; anything other
/// than `short`/`long` is kept verbatim in [`Preference::Other`] rather than
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Preference {
    Short,
    #[default]
    Long,
    Other(String),
}

impl FromStr for Preference {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "short" => Preference::Short,
            "long" => Preference::Long,
            _ => Preference::Other(trimmed.to_string()),
        })
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preference::Short => f.write_str("short"),
            Preference::Long => f.write_str("long"),
            Preference::Other(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_parses_known_values() {
        assert_eq!("short".parse::<Preference>().unwrap(), Preference::Short);
        assert_eq!(" LONG ".parse::<Preference>().unwrap(), Preference::Long);
    }

    #[test]
    fn preference_passes_unknown_values_through() {
        let p: Preference = "one page please".parse().unwrap();
        assert_eq!(p, Preference::Other("one page please".into()));
        assert_eq!(p.to_string(), "one page please");
    }

    #[test]
    fn builder_defaults() {
        let c = NotesConfig::builder().build().unwrap();
        assert_eq!(c.images_dir, PathBuf::from("images"));
        assert_eq!(c.pdf_dir, PathBuf::from("pdf"));
        assert!(!c.shared_permissions);
        assert_eq!(c.search_endpoint, DEFAULT_SEARCH_ENDPOINT);
    }

    #[test]
    fn builder_rejects_bad_endpoint() {
        let err = NotesConfig::builder()
            .search_endpoint("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, NotesError::InvalidConfig(_)));
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = NotesConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = NotesConfig::builder()
            .serpapi_api_key("secret-key")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("<redacted>"));
    }
}
