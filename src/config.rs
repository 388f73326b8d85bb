use std::time::Duration;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3001";
const DEFAULT_VAULT_SERVICE: &str = "CrismaApp";
const DEFAULT_IMPORT_CLOSE_DELAY_MS: u64 = 2_000;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_token: Option<SecretString>,
    pub vault_service: String,
    pub import_close_delay_ms: u64,
    pub user_agent: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub api_base_url: String,
    pub vault_service: String,
    pub import_close_delay_ms: u64,
    pub user_agent: String,
    pub has_api_token: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            api_base_url: non_blank("CRISMA_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_token: non_blank("CRISMA_API_TOKEN").map(SecretString::from),
            vault_service: non_blank("CRISMA_VAULT_SERVICE")
                .unwrap_or_else(|| DEFAULT_VAULT_SERVICE.to_string()),
            import_close_delay_ms: parse_u64(
                "CRISMA_IMPORT_CLOSE_DELAY_MS",
                DEFAULT_IMPORT_CLOSE_DELAY_MS,
            ),
            user_agent: non_blank("CRISMA_USER_AGENT")
                .unwrap_or_else(|| format!("crisma-admin/{}", env!("CARGO_PKG_VERSION"))),
        }
    }

    /// Configuration pointing at `base_url` with every other value defaulted.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: base_url.into(),
            api_token: None,
            vault_service: DEFAULT_VAULT_SERVICE.to_string(),
            import_close_delay_ms: DEFAULT_IMPORT_CLOSE_DELAY_MS,
            user_agent: format!("crisma-admin/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn import_close_delay(&self) -> Duration {
        Duration::from_millis(self.import_close_delay_ms)
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            api_base_url: self.api_base_url.clone(),
            vault_service: self.vault_service.clone(),
            import_close_delay_ms: self.import_close_delay_ms,
            user_agent: self.user_agent.clone(),
            has_api_token: self.api_token.is_some(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn non_blank(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
