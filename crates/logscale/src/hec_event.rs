// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HEC event shaping.
//!
//! Every raw record is wrapped into the HTTP Event Collector shape LogScale
//! accepts on its `hec` endpoint:
//!
//! ```text
//! {"time":1700000000.123,"source":"...","sourcetype":"...","host":"...","index":"...","event":{...},"fields":{}}
//! ```
//!
//! `time` is the moment the record was shaped, not the timestamp carried by
//! the record itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::UNIX_EPOCH;

/// A raw record wrapped with ingestion metadata.
///
/// Field order matches the serialized line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HecEvent {
    /// Seconds since the epoch at shaping time.
    pub time: f64,
    pub source: String,
    pub sourcetype: String,
    pub host: String,
    pub index: String,
    pub event: Value,
    /// Shipper-added metadata. Empty unless the caller extends it before packing.
    pub fields: BTreeMap<String, String>,
}

/// Stamps raw records with the configured source, sourcetype, host and index.
#[derive(Debug, Clone)]
pub struct HecEventFactory {
    index: String,
    host: String,
    source: String,
    sourcetype: String,
}

impl HecEventFactory {
    #[must_use]
    pub fn new(
        index: impl Into<String>,
        host: impl Into<String>,
        source: impl Into<String>,
        sourcetype: impl Into<String>,
    ) -> Self {
        HecEventFactory {
            index: index.into(),
            host: host.into(),
            source: source.into(),
            sourcetype: sourcetype.into(),
        }
    }

    #[must_use]
    pub fn create(&self, record: Value) -> HecEvent {
        HecEvent {
            time: now_epoch_secs(),
            source: self.source.clone(),
            sourcetype: self.sourcetype.clone(),
            host: self.host.clone(),
            index: self.index.clone(),
            event: record,
            fields: BTreeMap::new(),
        }
    }
}

fn now_epoch_secs() -> f64 {
    UNIX_EPOCH
        .elapsed()
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}
