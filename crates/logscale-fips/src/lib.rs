// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! TLS setup for the HTTP clients that talk to LogScale and to the object store.

use std::io::Result;

pub mod reqwest_adapter;

#[cfg(all(feature = "default", feature = "fips"))]
compile_error!("When building in fips mode, the default feature must be disabled");

/// Installs the process-wide FIPS rustls provider.
///
/// Must run once, before any client is built with [`reqwest_adapter::tls_client_builder`].
#[cfg(feature = "fips")]
pub fn prepare_client_provider() -> Result<()> {
    rustls::crypto::default_fips_provider()
        .install_default()
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to set up fips provider: {e:?}"),
            )
        })
}

#[cfg(not(feature = "fips"))]
#[allow(clippy::unnecessary_wraps)]
pub fn prepare_client_provider() -> Result<()> {
    // reqwest's bundled rustls stack picks its own provider.
    Ok(())
}
