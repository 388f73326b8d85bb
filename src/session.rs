use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::secrets::SecretVault;

pub const TOKEN_ACCOUNT: &str = "api-token";
const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    Environment,
    Vault,
    SignIn,
}

/// Claims read from the token payload. They are not verified here; the
/// backend checks the signature on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionClaims {
    pub subject: Option<String>,
    pub role: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionClaims {
    pub fn from_token(token: &str) -> Self {
        let mut parts = token.split('.');
        let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Self::default(),
        };
        let decoded = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(target: "session", ?err, "token payload is not base64");
                return Self::default();
            }
        };
        let claims: Value = match serde_json::from_slice(&decoded) {
            Ok(value) => value,
            Err(err) => {
                debug!(target: "session", ?err, "token payload is not JSON");
                return Self::default();
            }
        };

        let subject = match claims.get("sub") {
            Some(Value::String(sub)) => Some(sub.clone()),
            Some(Value::Number(sub)) => Some(sub.to_string()),
            _ => None,
        };
        let role = claims
            .get("role")
            .or_else(|| {
                ["public_metadata", "publicMetadata", "metadata"]
                    .iter()
                    .find_map(|key| claims.get(*key).and_then(|meta| meta.get("role")))
            })
            .and_then(Value::as_str)
            .map(str::to_string);
        let expires_at = claims
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|exp| DateTime::from_timestamp(exp, 0));

        Self {
            subject,
            role,
            expires_at,
        }
    }
}

pub struct Session {
    token: SecretString,
    claims: SessionClaims,
    source: TokenSource,
}

impl Session {
    pub fn from_token(token: SecretString, source: TokenSource) -> AppResult<Self> {
        let trimmed = token.expose_secret().trim();
        if trimmed.is_empty() {
            return Err(AppError::Session("token cannot be empty".into()));
        }
        let claims = SessionClaims::from_token(trimmed);
        let token = SecretString::from(trimmed.to_string());
        Ok(Self {
            token,
            claims,
            source,
        })
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }

    pub fn source(&self) -> TokenSource {
        self.source
    }

    pub fn is_expired(&self) -> bool {
        self.claims
            .expires_at
            .map(|exp| exp <= Utc::now())
            .unwrap_or(false)
    }

    /// A token without a role claim is not restricted client-side.
    pub fn is_admin(&self) -> bool {
        self.claims
            .role
            .as_deref()
            .map(|role| role.eq_ignore_ascii_case(ADMIN_ROLE))
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub signed_in: bool,
    pub source: Option<TokenSource>,
    pub subject: Option<String>,
    pub role: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_admin: bool,
    pub api_base_url: String,
}

/// Application-wide context handed to every page: configuration, the
/// current session and the client authenticated with it.
pub struct AppContext {
    config: AppConfig,
    vault: SecretVault,
    session: Option<Session>,
    api: ApiClient,
    expired: bool,
}

impl AppContext {
    /// Restores the session on start. A configured token wins over a stored
    /// one; an expired stored token is discarded.
    pub fn init(config: AppConfig, vault: SecretVault) -> AppResult<Self> {
        let candidate = match config.api_token.clone() {
            Some(token) => Some(Session::from_token(token, TokenSource::Environment)?),
            None => vault
                .read_secret(TOKEN_ACCOUNT)?
                .map(|token| Session::from_token(token, TokenSource::Vault))
                .transpose()?,
        };

        let mut expired = false;
        let session = match candidate {
            Some(session) if session.is_expired() => {
                warn!(
                    target: "session",
                    source = ?session.source(),
                    "discarding expired session token"
                );
                if session.source() == TokenSource::Vault {
                    vault.delete(TOKEN_ACCOUNT)?;
                }
                expired = true;
                None
            }
            other => other,
        };

        if let Some(session) = &session {
            debug!(target: "session", source = ?session.source(), "session restored");
        }
        let api = ApiClient::from_config(&config, session.as_ref().map(|s| s.token().clone()))?;
        Ok(Self {
            config,
            vault,
            session,
            api,
            expired,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn require_session(&self) -> AppResult<&Session> {
        match &self.session {
            Some(session) => Ok(session),
            None if self.expired => Err(AppError::Session(
                "Your session has expired. Sign in again with `crisma login`.".into(),
            )),
            None => Err(AppError::Session(
                "Not signed in. Run `crisma login` or set CRISMA_API_TOKEN.".into(),
            )),
        }
    }

    pub fn require_admin(&self) -> AppResult<&Session> {
        let session = self.require_session()?;
        if !session.is_admin() {
            return Err(AppError::Session(
                "This action requires an admin account.".into(),
            ));
        }
        Ok(session)
    }

    pub fn sign_in(&mut self, token: SecretString) -> AppResult<&Session> {
        let session = Session::from_token(token, TokenSource::SignIn)?;
        if session.is_expired() {
            return Err(AppError::Session("token has already expired".into()));
        }
        self.vault.write_secret(TOKEN_ACCOUNT, session.token())?;
        self.api = ApiClient::from_config(&self.config, Some(session.token().clone()))?;
        info!(
            target: "session",
            subject = session.claims().subject.as_deref().unwrap_or("unknown"),
            "signed in"
        );
        self.expired = false;
        Ok(self.session.insert(session))
    }

    /// Forgets the stored token and drops the in-memory session.
    pub fn sign_out(&mut self) -> AppResult<()> {
        self.vault.delete(TOKEN_ACCOUNT)?;
        self.session = None;
        self.api = ApiClient::from_config(&self.config, None)?;
        info!(target: "session", "signed out");
        Ok(())
    }

    pub fn summary(&self) -> SessionSummary {
        let claims = self.session.as_ref().map(Session::claims);
        SessionSummary {
            signed_in: self.session.is_some(),
            source: self.session.as_ref().map(Session::source),
            subject: claims.and_then(|c| c.subject.clone()),
            role: claims.and_then(|c| c.role.clone()),
            expires_at: claims.and_then(|c| c.expires_at),
            is_admin: self.session.as_ref().map(Session::is_admin).unwrap_or(false),
            api_base_url: self.config.api_base_url.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) fn encode_test_token(payload: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}
