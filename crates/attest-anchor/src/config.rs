//! Runtime configuration for anchoring and verification.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables. The environment overlay takes a lookup
//! closure so callers (and tests) decide where values come from.
//!
//! ```toml
//! [api]
//! url = "http://localhost:3000"
//! timeout_secs = 10
//!
//! [anchor]
//! mode = "prod"
//! dir = "/var/lib/attest/anchors"
//!
//! [anchor.git]
//! remote = "origin"
//! branch = "main"
//! author_name = "attest-anchor"
//! author_email = "anchor@example.com"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use attest_contracts::{AnchorMode, AttestError, AttestResult};

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_GIT_BRANCH: &str = "main";

// ── Config types ──────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttestConfig {
    pub api: ApiConfig,
    pub anchor: AnchorConfig,
}

/// The admin collaborator API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Server root; admin routes live under `<url>/admin`.
    pub url: Option<String>,
    pub admin_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: None,
            admin_token: None,
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnchorConfig {
    pub mode: AnchorMode,
    pub dir: Option<PathBuf>,
    pub git: GitConfig,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            mode: AnchorMode::Dev,
            dir: None,
            git: GitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitConfig {
    /// Remote to push to after each commit. Empty or absent disables push.
    pub remote: Option<String>,
    pub branch: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: None,
            branch: DEFAULT_GIT_BRANCH.to_string(),
            author_name: None,
            author_email: None,
            timeout_secs: DEFAULT_GIT_TIMEOUT_SECS,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl AttestConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `AttestError::Config` if the TOML is malformed or has keys this
    /// build does not know.
    pub fn from_toml_str(s: &str) -> AttestResult<Self> {
        toml::from_str(s).map_err(|e| AttestError::Config {
            reason: format!("failed to parse config TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as TOML.
    pub fn from_file(path: &Path) -> AttestResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| AttestError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Defaults (or `path`, when given) overlaid with the process environment.
    pub fn load(path: Option<&Path>) -> AttestResult<Self> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        base.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values returned by `lookup` for the recognised variables.
    ///
    /// Unset variables leave the current value untouched.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> AttestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("ATTEST_API_URL") {
            self.api.url = Some(url);
        }
        if let Some(token) = lookup("ATTEST_ADMIN_TOKEN") {
            self.api.admin_token = Some(token);
        }
        if let Some(raw) = lookup("ATTEST_HTTP_TIMEOUT_SECS") {
            self.api.timeout_secs = parse_secs("ATTEST_HTTP_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("ANCHOR_MODE") {
            self.anchor.mode = parse_mode(&raw)?;
        }
        if let Some(dir) = lookup("ANCHOR_DIR") {
            self.anchor.dir = Some(PathBuf::from(dir));
        }
        if let Some(remote) = lookup("ANCHOR_GIT_REMOTE") {
            self.anchor.git.remote = Some(remote);
        }
        if let Some(branch) = lookup("ANCHOR_GIT_BRANCH") {
            self.anchor.git.branch = branch;
        }
        if let Some(name) = lookup("ANCHOR_GIT_AUTHOR_NAME") {
            self.anchor.git.author_name = Some(name);
        }
        if let Some(email) = lookup("ANCHOR_GIT_AUTHOR_EMAIL") {
            self.anchor.git.author_email = Some(email);
        }
        if let Some(raw) = lookup("ANCHOR_GIT_TIMEOUT_SECS") {
            self.anchor.git.timeout_secs = parse_secs("ANCHOR_GIT_TIMEOUT_SECS", &raw)?;
        }

        debug!(mode = %self.anchor.mode, "configuration loaded");
        Ok(self)
    }

    // ── Validation ────────────────────────────────────────────────────────────

    /// Check that everything a prod anchoring run needs is present.
    pub fn validate_for_prod(&self) -> AttestResult<()> {
        let mut missing = Vec::new();
        if is_blank(self.api.url.as_deref()) {
            missing.push("api.url (ATTEST_API_URL)");
        }
        if is_blank(self.api.admin_token.as_deref()) {
            missing.push("api.admin_token (ATTEST_ADMIN_TOKEN)");
        }
        if self.anchor.dir.is_none() {
            missing.push("anchor.dir (ANCHOR_DIR)");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AttestError::Config {
                reason: format!("prod anchoring requires {}", missing.join(", ")),
            })
        }
    }

    /// The API base URL and admin token, or a `Config` error naming what is missing.
    pub fn api_credentials(&self) -> AttestResult<(&str, &str)> {
        let url = self
            .api
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AttestError::Config {
                reason: "ATTEST_API_URL is not set".to_string(),
            })?;
        let token = self
            .api
            .admin_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AttestError::Config {
                reason: "ATTEST_ADMIN_TOKEN is not set".to_string(),
            })?;
        Ok((url, token))
    }

    /// The remote to push to, or `None` when push is disabled.
    pub fn push_remote(&self) -> Option<&str> {
        self.anchor
            .git
            .remote
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.anchor.git.timeout_secs)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

fn parse_mode(raw: &str) -> AttestResult<AnchorMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "dev" => Ok(AnchorMode::Dev),
        "prod" => Ok(AnchorMode::Prod),
        other => Err(AttestError::Config {
            reason: format!("ANCHOR_MODE must be 'dev' or 'prod', got '{}'", other),
        }),
    }
}

fn parse_secs(key: &str, raw: &str) -> AttestResult<u64> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(AttestError::Config {
            reason: format!("{} must be a positive number of seconds, got '{}'", key, raw),
        }),
    }
}
