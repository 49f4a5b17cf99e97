// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Authenticated delivery of serialized batches to LogScale.
//!
//! A logical endpoint name is resolved through a fixed table to a URL path,
//! and the body is POSTed as-is to `https://{host}/{path}` with the ingest
//! token as a bearer credential. There is no retry here: a transport failure
//! is returned to the caller, and a non-2xx response is logged and reported
//! as [`SendOutcome::Rejected`] without failing the call.

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::IngestError;

/// Logical endpoint names and the URL paths they resolve to.
pub const INGEST_ENDPOINTS: [(&str, &str); 2] = [
    ("hec", "api/v1/ingest/hec"),
    ("api-structured", "api/v1/ingest/humio-structured"),
];

#[must_use]
pub fn endpoint_path(name: &str) -> Option<&'static str> {
    INGEST_ENDPOINTS
        .iter()
        .find(|(endpoint, _)| *endpoint == name)
        .map(|(_, path)| *path)
}

/// Where and as whom events are ingested.
#[derive(Clone, PartialEq, Eq)]
pub struct IngestTarget {
    pub host: String,
    pub repository: String,
    pub token: String,
}

impl IngestTarget {
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        repository: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        IngestTarget {
            host: host.into(),
            repository: repository.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for IngestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestTarget")
            .field("host", &self.host)
            .field("repository", &self.repository)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Result of a POST that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered {
        status: StatusCode,
    },
    Rejected {
        status: StatusCode,
        reason: String,
        body: String,
    },
}

impl SendOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered { .. })
    }
}

#[derive(Debug, Clone)]
pub struct IngestApi {
    client: reqwest::Client,
    /// Replaces `https://{host}` when set. Mostly used by integration tests.
    url_override: Option<String>,
}

impl IngestApi {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        IngestApi {
            client,
            url_override: None,
        }
    }

    #[must_use]
    pub fn with_url_override(mut self, url_override: Option<String>) -> Self {
        self.url_override = url_override.map(|url| url.trim_end_matches('/').to_string());
        self
    }

    pub fn url(&self, endpoint: &str, target: &IngestTarget) -> Result<String, IngestError> {
        let path = endpoint_path(endpoint)
            .ok_or_else(|| IngestError::UnknownEndpoint(endpoint.to_string()))?;
        Ok(match &self.url_override {
            Some(prefix) => format!("{prefix}/{path}"),
            None => format!("https://{}/{path}", target.host),
        })
    }

    pub async fn send(
        &self,
        endpoint: &str,
        target: &IngestTarget,
        body: String,
    ) -> Result<SendOutcome, IngestError> {
        let url = self.url(endpoint, target)?;
        let size = body.len();

        let time = Instant::now();
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&target.token)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| IngestError::Transmission {
                url: url.clone(),
                source,
            })?;
        let elapsed = time.elapsed();

        let status = resp.status();
        if status.is_success() {
            debug!(
                "LOGSCALE | Sent {size} bytes to {url} in {} ms",
                elapsed.as_millis()
            );
            return Ok(SendOutcome::Delivered { status });
        }

        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = resp.text().await.unwrap_or_default();
        warn!(
            "LOGSCALE | Post status code: {} - Reason: {reason} - Text: {body}",
            status.as_u16()
        );
        Ok(SendOutcome::Rejected {
            status,
            reason,
            body,
        })
    }
}
