use std::fs;
use std::path::Path;

use crate::llm::LlmClientConfig;
use crate::upstream::UpstreamConfig;
use crate::{Result, TallyError};

/// Top-level configuration for the Tally core
#[derive(Clone, Debug, Default)]
pub struct TallyConfig {
    pub upstream: UpstreamConfig,
    pub llm: LlmClientConfig,
}

impl TallyConfig {
    /// Environment only, validated.
    pub fn from_env() -> Result<Self> {
        let cfg = Self::default();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the environment, overlay a TOML file (path via TALLY_CONFIG or
    /// ./tally.toml) when one exists, then validate that every required input is present.
    pub fn load() -> Result<Self> {
        let path = std::env::var("TALLY_CONFIG").unwrap_or_else(|_| "tally.toml".into());
        let cfg = Self::load_from(Path::new(&path), Self::default())?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn load_from(path: &Path, base: Self) -> Result<Self> {
        if !path.exists() {
            tracing::info!(target: "config", path = %path.display(), "No TOML config found; using env");
            return Ok(base);
        }
        let raw = fs::read_to_string(path).map_err(|e| {
            TallyError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::overlay_str(&raw, base)
    }

    /// Overlay TOML text onto an existing configuration
    pub fn overlay_str(raw: &str, base: Self) -> Result<Self> {
        let parsed: TallyToml = toml::from_str(raw)
            .map_err(|e| TallyError::Config(format!("invalid TOML config: {}", e)))?;
        Ok(parsed.overlay(base))
    }

    /// Required inputs have no defaults; report every missing one at once.
    pub fn validate(&self) -> Result<()> {
        let u = &self.upstream;
        let required = [
            ("CORE_API_BASE_URL", &u.core_base_url),
            ("CORE_API_KEY", &u.core_api_key),
            ("CORE_API_SECRET", &u.core_api_secret),
            ("CONNECT_API_BASE_URL", &u.connect_base_url),
            ("CONNECT_API_KEY", &u.connect_api_key),
            ("CONNECT_API_SECRET", &u.connect_api_secret),
            ("RETAILER_ID", &u.retailer_id),
        ];
        let mut missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect();
        if self.llm.api_key.as_deref().map_or(true, str::is_empty) {
            missing.push("OPENAI_API_KEY");
        }
        if !missing.is_empty() {
            return Err(TallyError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        if self.upstream.timeout_ms == 0 {
            return Err(TallyError::Config(
                "UPSTREAM_TIMEOUT_MS must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Non-empty environment variable
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Parsed environment variable; unparsable values fall back to the caller's default
pub(crate) fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse::<T>().ok())
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct TallyToml {
    upstream: Option<UpstreamToml>,
    llm: Option<LlmToml>,
}

impl TallyToml {
    fn overlay(self, mut base: TallyConfig) -> TallyConfig {
        if let Some(u) = self.upstream {
            u.apply(&mut base.upstream);
        }
        if let Some(l) = self.llm {
            l.apply(&mut base.llm);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct UpstreamToml {
    core_base_url: Option<String>,
    core_api_key: Option<String>,
    core_api_secret: Option<String>,
    connect_base_url: Option<String>,
    connect_api_key: Option<String>,
    connect_api_secret: Option<String>,
    retailer_id: Option<String>,
    timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    retry_backoff_ms: Option<u64>,
    offers_page_size: Option<u32>,
    audit_log_limit: Option<u32>,
    timeline_category: Option<String>,
    culture: Option<String>,
}

impl UpstreamToml {
    fn apply(self, cfg: &mut UpstreamConfig) {
        if let Some(v) = self.core_base_url {
            cfg.core_base_url = v;
        }
        if let Some(v) = self.core_api_key {
            cfg.core_api_key = v;
        }
        if let Some(v) = self.core_api_secret {
            cfg.core_api_secret = v;
        }
        if let Some(v) = self.connect_base_url {
            cfg.connect_base_url = v;
        }
        if let Some(v) = self.connect_api_key {
            cfg.connect_api_key = v;
        }
        if let Some(v) = self.connect_api_secret {
            cfg.connect_api_secret = v;
        }
        if let Some(v) = self.retailer_id {
            cfg.retailer_id = v;
        }
        if let Some(v) = self.timeout_ms {
            cfg.timeout_ms = v;
        }
        if let Some(v) = self.max_retries {
            cfg.max_retries = v;
        }
        if let Some(v) = self.retry_backoff_ms {
            cfg.retry_backoff_ms = v;
        }
        if let Some(v) = self.offers_page_size {
            cfg.offers_page_size = v;
        }
        if let Some(v) = self.audit_log_limit {
            cfg.audit_log_limit = v;
        }
        if let Some(v) = self.timeline_category {
            cfg.timeline_category = v;
        }
        if let Some(v) = self.culture {
            cfg.culture = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LlmToml {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    request_timeout_ms: Option<u64>,
    temperature: Option<f32>,
}

impl LlmToml {
    fn apply(self, cfg: &mut LlmClientConfig) {
        if let Some(v) = self.base_url {
            cfg.base_url = v;
        }
        if let Some(v) = self.model {
            cfg.model = v;
        }
        if let Some(v) = self.api_key {
            cfg.api_key = Some(v);
        }
        if let Some(v) = self.request_timeout_ms {
            cfg.request_timeout_ms = v;
        }
        if let Some(v) = self.temperature {
            cfg.temperature = v;
        }
    }
}
