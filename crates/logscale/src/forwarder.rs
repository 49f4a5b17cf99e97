// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Drives records through shaping, batching and delivery.
//!
//! ```text
//!   raw record ──> HecEventFactory ──> Payload ──(full)──> IngestApi ──> LogScale
//!                                         │
//!                                         └──(end of input, not empty)──> IngestApi
//! ```
//!
//! Records are processed one at a time and in order. Each POST is awaited
//! before the next record is packed, so batches leave in input order and
//! their boundaries depend only on cumulative size and count.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, error};

use crate::cloudtrail::{decode_records, ObjectFetcher, ObjectRef};
use crate::error::{ForwarderError, IngestError, SourceError};
use crate::hec_event::HecEventFactory;
use crate::ingest::{IngestApi, IngestTarget, SendOutcome};
use crate::payload::Payload;

/// What to do when LogScale answers a POST with a non-2xx status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RejectionPolicy {
    /// Log a warning and keep shipping.
    #[default]
    Warn,
    /// Abort the run with [`IngestError::Rejected`].
    Fail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardSummary {
    pub events: usize,
    pub batches: usize,
    /// Batches answered with a non-2xx status.
    pub rejected: usize,
}

#[derive(Debug)]
pub struct ForwarderConfig {
    pub api: IngestApi,
    pub target: IngestTarget,
    pub endpoint: String,
    pub event_factory: HecEventFactory,
    pub extra_fields: BTreeMap<String, String>,
    pub rejection_policy: RejectionPolicy,
}

#[derive(Debug, Clone)]
pub struct Forwarder {
    api: IngestApi,
    target: IngestTarget,
    endpoint: String,
    event_factory: HecEventFactory,
    extra_fields: BTreeMap<String, String>,
    rejection_policy: RejectionPolicy,
}

impl Forwarder {
    #[must_use]
    pub fn new(config: ForwarderConfig) -> Self {
        Forwarder {
            api: config.api,
            target: config.target,
            endpoint: config.endpoint,
            event_factory: config.event_factory,
            extra_fields: config.extra_fields,
            rejection_policy: config.rejection_policy,
        }
    }

    /// Ships every record of `records`, in order.
    ///
    /// A failing record source, a transport failure or an unknown endpoint
    /// stops the run at once; batches already sent stay sent.
    pub async fn forward<I>(&self, records: I) -> Result<ForwardSummary, ForwarderError>
    where
        I: IntoIterator<Item = Result<Value, SourceError>>,
    {
        let mut payload = Payload::new();
        let mut summary = ForwardSummary::default();

        for record in records {
            let mut event = self.event_factory.create(record?);
            event.fields.extend(
                self.extra_fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
            payload.pack(&event)?;
            summary.events += 1;

            if payload.is_full() {
                self.flush(&mut payload, &mut summary).await?;
            }
        }

        if !payload.is_empty() {
            self.flush(&mut payload, &mut summary).await?;
        }

        Ok(summary)
    }

    /// Fetches, decodes and forwards one compressed CloudTrail object.
    pub async fn ship_object(
        &self,
        fetcher: &dyn ObjectFetcher,
        object: &ObjectRef,
    ) -> Result<ForwardSummary, ForwarderError> {
        let content = fetcher.fetch(object).await.map_err(|e| {
            error!(
                "Failed to get object: bucket: {} object: {}",
                object.bucket, object.key
            );
            e
        })?;
        let records = decode_records(&content)?;
        debug!(
            "Decoded {} records from {}/{}",
            records.len(),
            object.bucket,
            object.key
        );
        self.forward(records.into_iter().map(Ok)).await
    }

    async fn flush(
        &self,
        payload: &mut Payload,
        summary: &mut ForwardSummary,
    ) -> Result<(), ForwarderError> {
        debug!(
            "LOGSCALE | Post events: {}, payload: {} bytes",
            payload.event_count(),
            payload.size_bytes()
        );
        let body = payload.take();
        let outcome = self.api.send(&self.endpoint, &self.target, body).await?;
        summary.batches += 1;

        if let SendOutcome::Rejected { status, body, .. } = outcome {
            summary.rejected += 1;
            if self.rejection_policy == RejectionPolicy::Fail {
                return Err(IngestError::Rejected { status, body }.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::constants::{MAX_POST_BYTES, MAX_POST_EVENTS};
    use crate::hec_event::HecEvent;
    use mockito::{Matcher, Server, ServerGuard};
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn forwarder(url: String, endpoint: &str, policy: RejectionPolicy) -> Forwarder {
        Forwarder::new(ForwarderConfig {
            api: IngestApi::new(reqwest::Client::new()).with_url_override(Some(url)),
            target: IngestTarget::new("cloud.humio.com", "sandbox", "ingest-token"),
            endpoint: endpoint.to_string(),
            event_factory: HecEventFactory::new(
                "sandbox",
                "cloud.humio.com",
                "my-cloudtrail-stream",
                "cloudtrail",
            ),
            extra_fields: BTreeMap::new(),
            rejection_policy: policy,
        })
    }

    fn records(n: usize) -> Vec<Result<Value, SourceError>> {
        (0..n).map(|i| Ok(json!({ "seq": i }))).collect()
    }

    async fn hec_mock(server: &mut ServerGuard, status: usize, hits: usize) -> mockito::Mock {
        server
            .mock("POST", "/api/v1/ingest/hec")
            .match_header("Authorization", "Bearer ingest-token")
            .with_status(status)
            .expect(hits)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_empty_input_sends_nothing() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let summary = forwarder(server.url(), "hec", RejectionPolicy::Warn)
            .forward(records(0))
            .await
            .unwrap();

        assert_eq!(summary, ForwardSummary::default());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_single_record_is_flushed_at_end() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/ingest/hec")
            .match_body(Matcher::Regex(r#"^\{"time":[^\n]*"event":\{"seq":0\}[^\n]*\}$"#.to_string()))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let summary = forwarder(server.url(), "hec", RejectionPolicy::Warn)
            .forward(records(1))
            .await
            .unwrap();

        assert_eq!(summary.events, 1);
        assert_eq!(summary.batches, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_flushes_when_event_count_limit_reached() {
        let mut server = Server::new_async().await;
        let mock = hec_mock(&mut server, 200, 3).await;

        let summary = forwarder(server.url(), "hec", RejectionPolicy::Warn)
            .forward(records(2 * MAX_POST_EVENTS + 1))
            .await
            .unwrap();

        assert_eq!(summary.events, 2 * MAX_POST_EVENTS + 1);
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.rejected, 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_trailing_flush() {
        let mut server = Server::new_async().await;
        let mock = hec_mock(&mut server, 200, 1).await;

        let summary = forwarder(server.url(), "hec", RejectionPolicy::Warn)
            .forward(records(MAX_POST_EVENTS))
            .await
            .unwrap();

        assert_eq!(summary.batches, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_extra_fields_are_attached() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/ingest/hec")
            .match_body(Matcher::Regex(
                r#""fields":\{"trigger":"sns"\}"#.to_string(),
            ))
            .with_status(200)
            .create_async()
            .await;

        let mut forwarder = forwarder(server.url(), "hec", RejectionPolicy::Warn);
        forwarder
            .extra_fields
            .insert("trigger".to_string(), "sns".to_string());
        forwarder.forward(records(1)).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejection_is_tolerated_by_default() {
        let mut server = Server::new_async().await;
        let mock = hec_mock(&mut server, 401, 2).await;

        let summary = forwarder(server.url(), "hec", RejectionPolicy::Warn)
            .forward(records(MAX_POST_EVENTS + 1))
            .await
            .unwrap();

        assert_eq!(summary.batches, 2);
        assert_eq!(summary.rejected, 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejection_aborts_with_fail_policy() {
        let mut server = Server::new_async().await;
        let mock = hec_mock(&mut server, 500, 1).await;

        let result = forwarder(server.url(), "hec", RejectionPolicy::Fail)
            .forward(records(MAX_POST_EVENTS + 1))
            .await;

        assert!(matches!(
            result,
            Err(ForwarderError::Ingest(IngestError::Rejected { status, .. })) if status.as_u16() == 500
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_endpoint_aborts_without_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let result = forwarder(server.url(), "firehose", RejectionPolicy::Warn)
            .forward(records(3))
            .await;

        assert!(matches!(
            result,
            Err(ForwarderError::Ingest(IngestError::UnknownEndpoint(_)))
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_source_error_is_propagated() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let input = vec![
            Ok(json!({"seq": 0})),
            Err(SourceError::Parse("truncated record".to_string())),
            Ok(json!({"seq": 2})),
        ];
        let result = forwarder(server.url(), "hec", RejectionPolicy::Warn)
            .forward(input)
            .await;

        match result {
            Err(ForwarderError::Source(SourceError::Parse(message))) => {
                assert_eq!(message, "truncated record");
            }
            other => panic!("expected source error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_transport_failure_aborts_run() {
        let result = forwarder("http://127.0.0.1:1".to_string(), "hec", RejectionPolicy::Warn)
            .forward(records(2))
            .await;

        assert!(matches!(
            result,
            Err(ForwarderError::Ingest(IngestError::Transmission { .. }))
        ));
    }

    fn padded_records(pads: &[usize]) -> Vec<Result<Value, SourceError>> {
        pads.iter()
            .enumerate()
            .map(|(seq, pad)| Ok(json!({"seq": seq, "pad": "x".repeat(*pad)})))
            .collect()
    }

    /// Accepts every HEC POST and keeps its body.
    async fn recording_mock(server: &mut ServerGuard) -> (mockito::Mock, Arc<Mutex<Vec<String>>>) {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&bodies);
        let mock = server
            .mock("POST", "/api/v1/ingest/hec")
            .with_status(200)
            .with_body_from_request(move |request| {
                let body = request
                    .body()
                    .map(|body| String::from_utf8_lossy(body).into_owned())
                    .unwrap_or_default();
                recorded.lock().unwrap().push(body);
                Vec::new()
            })
            .create_async()
            .await;
        (mock, bodies)
    }

    /// The `seq` of every event, grouped by POST.
    fn sent_seqs(bodies: &Mutex<Vec<String>>) -> Vec<Vec<usize>> {
        bodies
            .lock()
            .unwrap()
            .iter()
            .map(|body| {
                body.split('\n')
                    .map(|line| {
                        let event: HecEvent = serde_json::from_str(line).unwrap();
                        event.event["seq"].as_u64().unwrap() as usize
                    })
                    .collect()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_batches_follow_size_and_count_limits_in_order() {
        let mut server = Server::new_async().await;
        let (mock, bodies) = recording_mock(&mut server).await;

        // Three 4MB records close a batch on size, the next 5000 small ones
        // on count, an 11MB record goes out alone and two small ones remain.
        let mut pads = vec![4_000_000; 3];
        pads.extend(std::iter::repeat(0).take(MAX_POST_EVENTS));
        pads.push(MAX_POST_BYTES + 1_000_000);
        pads.extend([0, 0]);
        let total = pads.len();

        let summary = forwarder(server.url(), "hec", RejectionPolicy::Warn)
            .forward(padded_records(&pads))
            .await
            .unwrap();

        let batches = sent_seqs(&bodies);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, MAX_POST_EVENTS, 1, 2]);
        assert_eq!(batches.concat(), (0..total).collect::<Vec<_>>());
        assert_eq!(summary.events, total);
        assert_eq!(summary.batches, 4);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_oversized_record_is_sent_alone() {
        let mut server = Server::new_async().await;
        let (mock, bodies) = recording_mock(&mut server).await;

        let summary = forwarder(server.url(), "hec", RejectionPolicy::Warn)
            .forward(padded_records(&[MAX_POST_BYTES + 1_000_000, 0]))
            .await
            .unwrap();

        assert_eq!(sent_seqs(&bodies), vec![vec![0], vec![1]]);
        assert!(bodies.lock().unwrap()[0].len() > MAX_POST_BYTES);
        assert_eq!(
            summary,
            ForwardSummary {
                events: 2,
                batches: 2,
                rejected: 0
            }
        );
        mock.assert_async().await;
    }

    #[test]
    fn test_config_debug_hides_token() {
        let config = ForwarderConfig {
            api: IngestApi::new(reqwest::Client::new()),
            target: IngestTarget::new("cloud.humio.com", "sandbox", "ingest-token"),
            endpoint: "hec".to_string(),
            event_factory: HecEventFactory::new("sandbox", "cloud.humio.com", "src", "cloudtrail"),
            extra_fields: BTreeMap::new(),
            rejection_policy: RejectionPolicy::Fail,
        };

        let debug = format!("{config:?}");
        assert!(debug.contains("sandbox"));
        assert!(debug.contains("Fail"));
        assert!(!debug.contains("ingest-token"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_sent_events_keep_count_and_order(
            pads in proptest::collection::vec(0usize..3_000_000, 0..10)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let (summary, batches) = runtime.block_on(async {
                let mut server = Server::new_async().await;
                let (_mock, bodies) = recording_mock(&mut server).await;
                let summary = forwarder(server.url(), "hec", RejectionPolicy::Warn)
                    .forward(padded_records(&pads))
                    .await
                    .unwrap();
                (summary, sent_seqs(&bodies))
            });

            prop_assert_eq!(summary.events, pads.len());
            prop_assert_eq!(summary.batches, batches.len());
            prop_assert!(batches.iter().all(|batch| !batch.is_empty()));
            prop_assert_eq!(batches.concat(), (0..pads.len()).collect::<Vec<_>>());
        }
    }
}
