// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Limits the LogScale ingest API enforces on a single POST.
//!
//! Either limit alone is enough to close a batch. Both are checked after an
//! event has been packed, so a batch may overshoot [`MAX_POST_BYTES`] by at
//! most one event.

/// Maximum uncompressed body size per POST request in bytes (10MiB).
pub const MAX_POST_BYTES: usize = 10 * 1_024 * 1_024;

/// Maximum number of events batched into a single POST request.
pub const MAX_POST_EVENTS: usize = 5_000;
