// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ships CloudTrail records to Falcon LogScale through its HEC ingest API.
//!
//! Raw records are wrapped into HEC events ([`hec_event`]), packed into
//! newline-delimited JSON bodies that stay within the ingest API limits
//! ([`payload`], [`constants`]) and POSTed with the repository's ingest
//! token ([`ingest`]). [`forwarder`] ties those together; [`cloudtrail`]
//! produces the records from an SNS-announced, gzip-compressed S3 object.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

#[cfg(all(feature = "default", feature = "fips"))]
compile_error!("When building in fips mode, the default feature must be disabled");

pub mod cloudtrail;
pub mod config;
pub mod constants;
pub mod error;
pub mod forwarder;
pub mod hec_event;
pub mod http;
pub mod ingest;
pub mod payload;
