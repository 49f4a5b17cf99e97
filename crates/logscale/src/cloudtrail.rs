// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Everything upstream of event shaping: finding out which object to ship,
//! retrieving it and turning it into raw CloudTrail records.
//!
//! CloudTrail delivers gzip-compressed JSON files of the form
//! `{"Records": [...]}` to S3 and announces each one through SNS. The SNS
//! message body is itself a JSON document naming the bucket and object key.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

use crate::error::SourceError;

/// Location of one compressed CloudTrail log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

#[derive(Deserialize)]
struct TriggerEvent {
    #[serde(rename = "Records")]
    records: Vec<TriggerRecord>,
}

#[derive(Deserialize)]
struct TriggerRecord {
    #[serde(rename = "Sns")]
    sns: SnsEnvelope,
}

#[derive(Deserialize)]
struct SnsEnvelope {
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudTrailNotification {
    s3_bucket: String,
    s3_object_key: Vec<String>,
}

#[derive(Deserialize)]
struct CloudTrailLog {
    #[serde(rename = "Records")]
    records: Vec<Value>,
}

/// Extracts the object reference from an SNS-triggered invocation event.
///
/// Only the first SNS record and the first object key are used.
pub fn parse_notification(event: &str) -> Result<ObjectRef, SourceError> {
    let trigger: TriggerEvent = serde_json::from_str(event)
        .map_err(|e| SourceError::Notification(format!("malformed trigger event: {e}")))?;
    let record = trigger
        .records
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::Notification("trigger event has no records".to_string()))?;

    let notification: CloudTrailNotification = serde_json::from_str(&record.sns.message)
        .map_err(|e| SourceError::Notification(format!("malformed SNS message: {e}")))?;
    let key = notification
        .s3_object_key
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::Notification("SNS message has no object key".to_string()))?;

    Ok(ObjectRef {
        bucket: notification.s3_bucket,
        key,
    })
}

/// Decompresses a CloudTrail log file and returns its records in order.
pub fn decode_records(compressed: &[u8]) -> Result<Vec<Value>, SourceError> {
    let mut json = Vec::new();
    GzDecoder::new(compressed).read_to_end(&mut json)?;
    debug!(
        "Decompressed {} bytes into {} bytes",
        compressed.len(),
        json.len()
    );

    let log: CloudTrailLog =
        serde_json::from_slice(&json).map_err(|e| SourceError::Parse(e.to_string()))?;
    Ok(log.records)
}

/// Retrieves the raw bytes of an object.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, SourceError>;
}

/// Fetches objects with a GET on `{base_url}/{bucket}/{key}`.
#[derive(Debug, Clone)]
pub struct HttpObjectFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpObjectFetcher {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        HttpObjectFetcher {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectFetcher for HttpObjectFetcher {
    async fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, SourceError> {
        let url = format!("{}/{}/{}", self.base_url, object.bucket, object.key);
        let fetch_error = |message: String| SourceError::Fetch {
            bucket: object.bucket.clone(),
            key: object.key.clone(),
            message,
        };

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_error(status.to_string()));
        }
        let bytes = resp.bytes().await.map_err(|e| fetch_error(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Reads objects from `{root}/{bucket}/{key}` on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileObjectFetcher {
    root: PathBuf,
}

impl FileObjectFetcher {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileObjectFetcher { root: root.into() }
    }
}

#[async_trait]
impl ObjectFetcher for FileObjectFetcher {
    async fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, SourceError> {
        let path = self.root.join(&object.bucket).join(&object.key);
        tokio::fs::read(&path)
            .await
            .map_err(|e| SourceError::Fetch {
                bucket: object.bucket.clone(),
                key: object.key.clone(),
                message: format!("{}: {e}", path.display()),
            })
    }
}
