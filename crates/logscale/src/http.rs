// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;
use logscale_fips::reqwest_adapter::tls_client_builder;
use std::error::Error;

pub use logscale_fips::prepare_client_provider;

/// Builds the HTTP client shared by the ingest API and the object fetcher.
pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut builder = tls_client_builder()?.timeout(timeout);
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    Ok(builder.build()?)
}
