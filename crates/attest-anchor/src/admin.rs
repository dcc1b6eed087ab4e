//! Blocking HTTP client for the admin collaborator.
//!
//! Prod anchoring and the CLI reach chain heads and events only through this
//! client, so neither needs database credentials. Every request carries the
//! admin bearer token and is bounded by the configured timeout.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use attest_contracts::{
    AnchorRunReport, AttestError, AttestResult, AuditEvent, ChainHead, HashAlgorithm, ProjectId,
    ProjectSummary,
};
use attest_core::{AdminApi, AnchorRunLog, HeadSource};

use crate::config::AttestConfig;

/// `AdminApi` over HTTP.
pub struct AdminClient {
    base_url: String,
    token: String,
    timeout: Duration,
    http: Client,
}

impl AdminClient {
    /// Build a client for the server at `base_url`.
    ///
    /// Admin routes are resolved under `<base_url>/admin`.
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> AttestResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AttestError::AdminApi {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            timeout,
            http,
        })
    }

    pub fn from_config(config: &AttestConfig) -> AttestResult<Self> {
        let (url, token) = config.api_credentials()?;
        Self::new(url, token, config.http_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/admin{}", self.base_url, path)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> AttestResult<T> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| self.transport_error(&format!("GET {}", path), e))?;

        let response = check_status(response, "GET", path)?;
        response.json::<T>().map_err(|e| {
            if e.is_timeout() {
                self.transport_error(&format!("GET {}", path), e)
            } else {
                AttestError::AdminApi {
                    reason: format!("GET {} returned an unexpected body: {}", path, e),
                }
            }
        })
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> AttestResult<()> {
        let url = self.url(path);
        debug!(url = %url, "POST");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .map_err(|e| self.transport_error(&format!("POST {}", path), e))?;

        check_status(response, "POST", path)?;
        Ok(())
    }

    fn transport_error(&self, operation: &str, e: reqwest::Error) -> AttestError {
        if e.is_timeout() {
            AttestError::Timeout {
                operation: format!("admin API {}", operation),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            AttestError::AdminApi {
                reason: format!("{} failed: {}", operation, e),
            }
        }
    }
}

/// Pass successful responses through; turn anything else into `AdminApi`.
fn check_status(response: Response, method: &str, path: &str) -> AttestResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or(body);

    Err(AttestError::AdminApi {
        reason: format!("{} {} returned {}: {}", method, path, status, detail.trim()),
    })
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

// ── Event wire format ─────────────────────────────────────────────────────────

/// An event as served by `GET /projects/:id/events`.
///
/// The payload arrives either as a JSON object or as the raw stored JSON text.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireEvent {
    project_id: ProjectId,
    sequence: u64,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    payload_json: Option<String>,
    payload_hash: String,
    prev_chain_hash: String,
    chain_hash: String,
    created_at: Value,
    #[serde(default)]
    hash_algorithm: HashAlgorithm,
}

impl WireEvent {
    pub(crate) fn into_event(self) -> AttestResult<AuditEvent> {
        let sequence = self.sequence;
        let payload = match (self.payload, self.payload_json) {
            (Some(payload), _) => payload,
            (None, Some(text)) => serde_json::from_str(&text).map_err(|e| AttestError::AdminApi {
                reason: format!("event {} has unparseable payloadJson: {}", sequence, e),
            })?,
            (None, None) => {
                return Err(AttestError::AdminApi {
                    reason: format!("event {} has no payload", sequence),
                })
            }
        };

        Ok(AuditEvent {
            project_id: self.project_id,
            sequence,
            payload,
            payload_hash: self.payload_hash,
            prev_chain_hash: self.prev_chain_hash,
            chain_hash: self.chain_hash,
            created_at: parse_timestamp(&self.created_at).ok_or_else(|| {
                AttestError::AdminApi {
                    reason: format!("event {} has an invalid createdAt", sequence),
                }
            })?,
            hash_algorithm: self.hash_algorithm,
        })
    }
}

/// Epoch milliseconds or an RFC 3339 string.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

// ── Trait impls ───────────────────────────────────────────────────────────────

impl AdminApi for AdminClient {
    fn list_projects(&self) -> AttestResult<Vec<ProjectSummary>> {
        self.get("/projects")
    }

    fn chain_head(&self, project_id: &ProjectId) -> AttestResult<ChainHead> {
        self.get(&format!("/projects/{}/head", project_id))
    }

    fn events(&self, project_id: &ProjectId) -> AttestResult<Vec<AuditEvent>> {
        let wire: Vec<WireEvent> = self.get(&format!("/projects/{}/events", project_id))?;
        let mut events = wire
            .into_iter()
            .map(WireEvent::into_event)
            .collect::<AttestResult<Vec<_>>>()?;
        events.sort_by_key(|e| e.sequence);
        debug!(project_id = %project_id, count = events.len(), "events fetched");
        Ok(events)
    }

    fn report_anchor_run(&self, report: &AnchorRunReport) -> AttestResult<()> {
        self.post("/anchor-report", report)?;
        info!(run_id = %report.run_id, status = ?report.status, "anchor run reported");
        Ok(())
    }

    fn anchor_runs(&self, limit: usize) -> AttestResult<Vec<AnchorRunReport>> {
        self.get(&format!("/anchor/logs?limit={}", limit))
    }
}

impl HeadSource for AdminClient {
    /// Every project's head, fetched one project at a time.
    ///
    /// Any failed fetch fails the whole listing.
    fn list_heads(&self) -> AttestResult<Vec<ChainHead>> {
        let projects = self.list_projects()?;
        let mut heads = projects
            .iter()
            .map(|p| self.chain_head(&p.project_id))
            .collect::<AttestResult<Vec<_>>>()?;
        heads.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        Ok(heads)
    }
}

impl AnchorRunLog for AdminClient {
    fn record_run(&self, report: &AnchorRunReport) -> AttestResult<()> {
        self.report_anchor_run(report)
    }
}
