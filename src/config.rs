use serde::Deserialize;

/// Default Gemini model used for insight generation.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_HUBSPOT_BASE_URL: &str = "https://api.hubapi.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub gemini_api_key: Option<String>, // Missing key only disables insights
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub hubspot_token: Option<String>, // Missing token turns CRM calls into log lines
    pub hubspot_base_url: String,
    pub session_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string())
                .trim()
                .to_string(),
            gemini_base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            hubspot_token: std::env::var("HUBSPOT_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            hubspot_base_url: std::env::var("HUBSPOT_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_HUBSPOT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            session_ttl_secs: std::env::var("SESSION_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SESSION_TTL_SECS must be a positive integer"))?,
        };

        if config.gemini_model.is_empty() {
            anyhow::bail!("GEMINI_MODEL cannot be empty");
        }
        for (name, url) in [
            ("GEMINI_BASE_URL", &config.gemini_base_url),
            ("HUBSPOT_BASE_URL", &config.hubspot_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }
        if config.session_ttl_secs == 0 {
            anyhow::bail!("SESSION_TTL_SECS must be greater than zero");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Gemini model: {}", config.gemini_model);
        tracing::debug!("Gemini Base URL: {}", config.gemini_base_url);
        if config.gemini_api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY not set - insights will be unavailable");
        }
        if config.hubspot_token.is_some() {
            tracing::info!("HubSpot sync enabled: {}", config.hubspot_base_url);
        } else {
            tracing::warn!("HUBSPOT_TOKEN not set - CRM calls will only be logged");
        }
        tracing::debug!("Session TTL: {}s", config.session_ttl_secs);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
