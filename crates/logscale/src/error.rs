// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors raised while delivering a payload to LogScale.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Unknown ingest endpoint '{0}'")]
    UnknownEndpoint(String),

    #[error("Failed to send payload to {url}: {source}")]
    Transmission {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Only produced when the caller escalates a non-2xx outcome.
    #[error("LogScale rejected payload with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Errors from the collaborators that produce the raw records.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Invalid trigger notification: {0}")]
    Notification(String),

    #[error("Failed to fetch object {bucket}/{key}: {message}")]
    Fetch {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Failed to decompress object: {0}")]
    Decompress(#[from] std::io::Error),

    #[error("Failed to parse object: {0}")]
    Parse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingVar(&'static str),

    #[error("Invalid value for {name}: {message}")]
    InvalidVar { name: &'static str, message: String },
}

/// Errors that abort a forwarding run.
#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}
