//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

/// Which store backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub store_backend: StoreBackend,
    /// Email domains allowed to register (lowercase, no `@`)
    pub allowed_email_domains: Vec<String>,
    /// How long an activation key stays valid
    pub activation_ttl_hours: i64,
    /// Directory holding avatar files
    pub avatar_dir: PathBuf,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for activation keys (raw bytes)
    pub activation_signing_key: Vec<u8>,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            allowed_email_domains: vec!["uni.edu".to_string()],
            activation_ttl_hours: 48,
            avatar_dir: env::temp_dir().join("lingo-match-avatars"),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            activation_signing_key: b"test_activation_key_32_bytes!!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "firestore" => StoreBackend::Firestore,
            "memory" => StoreBackend::Memory,
            _ => return Err(ConfigError::Invalid("STORE_BACKEND")),
        };

        let allowed_email_domains = parse_domains(
            &env::var("ALLOWED_EMAIL_DOMAINS")
                .map_err(|_| ConfigError::Missing("ALLOWED_EMAIL_DOMAINS"))?,
        );
        if allowed_email_domains.is_empty() {
            return Err(ConfigError::Invalid("ALLOWED_EMAIL_DOMAINS"));
        }

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            store_backend,
            allowed_email_domains,
            activation_ttl_hours: env::var("ACTIVATION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(48),
            avatar_dir: env::var("AVATAR_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/avatars")),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            activation_signing_key: env::var("ACTIVATION_SIGNING_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("ACTIVATION_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Whether `email` belongs to an allowed domain.
    pub fn is_email_domain_allowed(&self, email: &str) -> bool {
        match email.rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() => {
                let domain = domain.to_ascii_lowercase();
                self.allowed_email_domains.iter().any(|d| *d == domain)
            }
            _ => false,
        }
    }
}

/// Parse a comma-separated domain list, e.g. `"uni.edu, @college.edu"`.
fn parse_domains(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().trim_start_matches('@').to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
