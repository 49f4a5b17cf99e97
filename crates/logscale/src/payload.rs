// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch accumulation for the ingest API.
//!
//! A [`Payload`] holds the newline-delimited JSON body of one POST request.
//! Events are serialized once, when packed, and appended to the body; the
//! body is never rebuilt. The payload is owned by a single caller for one
//! accumulation cycle and is not meant to be shared.

use crate::constants::{MAX_POST_BYTES, MAX_POST_EVENTS};
use crate::hec_event::HecEvent;

#[derive(Debug, Default, Clone)]
pub struct Payload {
    body: String,
    event_count: usize,
}

impl Payload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes `event` and appends it as a new line of the body.
    ///
    /// Fullness is not checked here: an event larger than [`MAX_POST_BYTES`]
    /// is packed like any other and the caller sees [`Payload::is_full`] flip
    /// afterwards.
    pub fn pack(&mut self, event: &HecEvent) -> Result<(), serde_json::Error> {
        let line = serde_json::to_string(event)?;
        if self.event_count > 0 {
            self.body.push('\n');
        }
        self.body.push_str(&line);
        self.event_count += 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.body.clear();
        self.event_count = 0;
    }

    /// Returns the body and leaves the payload empty.
    pub fn take(&mut self) -> String {
        self.event_count = 0;
        std::mem::take(&mut self.body)
    }

    #[must_use]
    pub fn serialized(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.event_count
    }

    /// Exact UTF-8 length of the body, separators included.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.body.len()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.size_bytes() >= MAX_POST_BYTES || self.event_count >= MAX_POST_EVENTS
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size_bytes() == 0
    }
}
