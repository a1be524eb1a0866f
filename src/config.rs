//! Client configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tokio_tungstenite::tungstenite::http::Uri;
use tracing::{debug, warn};

use crate::stream::reassembler::{DEFAULT_COMPLETION_GRACE, DEFAULT_INACTIVITY_TIMEOUT};
use crate::stream::StreamReassembler;
use crate::tools::path::Workspace;
use crate::{AppError, Result};

/// Keychain service name holding the API key.
pub const KEYRING_SERVICE: &str = "acp-session-client";

/// Keychain entry name holding the API key.
pub const KEYRING_API_KEY: &str = "api_key";

/// Environment variable consulted when the keychain has no API key.
pub const API_KEY_ENV: &str = "ACP_API_KEY";

/// Largest accepted connect timeout.
pub const MAX_CONNECT_TIMEOUT_MS: u64 = 60_000;

const MIN_API_KEY_LEN: usize = 10;

/// Retention windows of the stream reassembler (milliseconds).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct StreamingConfig {
    /// How long a completed stream stays readable.
    pub completion_grace_ms: u64,
    /// How long an incomplete stream may sit idle before the sweep drops it.
    pub inactivity_timeout_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            completion_grace_ms: duration_ms(DEFAULT_COMPLETION_GRACE),
            inactivity_timeout_ms: duration_ms(DEFAULT_INACTIVITY_TIMEOUT),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Client configuration parsed from an optional `config.toml`.
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct ClientConfig {
    /// WebSocket URL of the ACP server.
    pub url: String,
    /// Model name sent with every prompt.
    pub model: Option<String>,
    /// Directory relative tool paths are anchored to.
    pub workspace_root: PathBuf,
    /// Directory holding saved session transcripts.
    pub sessions_dir: PathBuf,
    /// Handshake timeout.
    pub connect_timeout_ms: u64,
    /// Reject tool paths outside the workspace root.
    pub restrict_to_workspace: bool,
    /// Stream reassembly windows.
    pub streaming: StreamingConfig,
    /// Bearer token (populated at runtime, never read from the file).
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9000".into(),
            model: None,
            workspace_root: PathBuf::from("workspace"),
            sessions_dir: PathBuf::from("sessions"),
            connect_timeout_ms: 5_000,
            restrict_to_workspace: false,
            streaming: StreamingConfig::default(),
            api_key: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file path.
    ///
    /// The result is not validated; call [`ClientConfig::validate`] after
    /// applying command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::Config(format!("failed to read config {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Check every field, reporting all problems at once.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` listing each invalid field.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if let Err(problem) = validate_url(&self.url) {
            problems.push(problem);
        }

        if let Some(model) = self.model.as_deref() {
            if let Err(problem) = validate_model(model) {
                problems.push(problem);
            }
        }

        if let Some(key) = self.api_key.as_deref() {
            if key.trim().is_empty() {
                problems.push("api key must not be blank".to_owned());
            } else if key.trim().len() < MIN_API_KEY_LEN {
                problems.push(format!(
                    "api key looks too short (expected at least {MIN_API_KEY_LEN} characters)"
                ));
            }
        }

        if self.connect_timeout_ms > MAX_CONNECT_TIMEOUT_MS {
            problems.push(format!(
                "connect_timeout_ms must be at most {MAX_CONNECT_TIMEOUT_MS}, got {}",
                self.connect_timeout_ms
            ));
        }

        if self.workspace_root.as_os_str().to_string_lossy().trim().is_empty() {
            problems.push("workspace_root must not be blank".to_owned());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config(problems.join("; ")))
        }
    }

    /// Create the workspace directory if needed and replace
    /// `workspace_root` with its canonical absolute form.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the directory cannot be created or
    /// resolved.
    pub fn prepare_workspace(&mut self) -> Result<()> {
        fs::create_dir_all(&self.workspace_root).map_err(|err| {
            AppError::Config(format!(
                "failed to create workspace {}: {err}",
                self.workspace_root.display()
            ))
        })?;
        self.workspace_root = self
            .workspace_root
            .canonicalize()
            .map_err(|err| AppError::Config(format!("workspace_root invalid: {err}")))?;
        Ok(())
    }

    /// Fill `api_key` from the OS keychain or the `ACP_API_KEY` environment
    /// variable, unless one is already set.
    ///
    /// A missing key is not an error; the connection is then opened without
    /// an `Authorization` header.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the keychain lookup task panics.
    pub async fn load_credentials(&mut self) -> Result<()> {
        if self.api_key.is_some() {
            return Ok(());
        }
        self.api_key = load_credential(KEYRING_API_KEY, API_KEY_ENV).await?;
        Ok(())
    }

    /// Handshake timeout as a [`Duration`].
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Reassembler configured with this config's windows.
    #[must_use]
    pub fn reassembler(&self) -> StreamReassembler {
        StreamReassembler::new(
            Duration::from_millis(self.streaming.completion_grace_ms),
            Duration::from_millis(self.streaming.inactivity_timeout_ms),
        )
    }

    /// Workspace for the tool dispatcher.
    ///
    /// # Errors
    ///
    /// Returns `AppError::PathViolation` if confinement is enabled and the
    /// root cannot be canonicalized.
    pub fn workspace(&self) -> Result<Workspace> {
        if self.restrict_to_workspace {
            Workspace::confined(&self.workspace_root)
        } else {
            Ok(Workspace::new(self.workspace_root.clone()))
        }
    }
}

fn validate_url(raw: &str) -> std::result::Result<(), String> {
    if raw.trim().is_empty() {
        return Err("url must not be blank".to_owned());
    }
    let uri: Uri = raw
        .parse()
        .map_err(|_| format!("invalid url format: {raw}"))?;
    match uri.scheme_str() {
        Some("ws" | "wss") => {}
        Some(other) => {
            return Err(format!(
                "url scheme must be 'ws://' or 'wss://', got '{other}://'"
            ))
        }
        None => return Err(format!("invalid url format: {raw}")),
    }
    if uri.host().is_none_or(str::is_empty) {
        return Err(format!("url has no host: {raw}"));
    }
    Ok(())
}

fn validate_model(model: &str) -> std::result::Result<(), String> {
    let trimmed = model.trim();
    if trimmed.is_empty() {
        return Err("model must not be blank".to_owned());
    }
    let pattern = Regex::new(r"^[A-Za-z0-9._-]+$")
        .map_err(|err| format!("model pattern failed to compile: {err}"))?;
    if pattern.is_match(trimmed) {
        Ok(())
    } else {
        Err(format!(
            "invalid model name {trimmed}: use letters, digits, '.', '_' or '-'"
        ))
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<Option<String>> {
    let key = keyring_key.to_owned();

    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(Some(value)),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(keyring::Error::NoEntry) => {
            debug!(key = keyring_key, "no keychain entry, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    Ok(env::var(env_key).ok().filter(|value| !value.is_empty()))
}
