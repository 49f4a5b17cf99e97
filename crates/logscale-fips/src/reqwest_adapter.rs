// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::ClientBuilder;
use std::error::Error;
#[cfg(feature = "fips")]
use tracing::debug;

/// Returns a client builder with TLS already configured.
///
/// Without the `fips` feature this is reqwest's bundled rustls stack.
#[cfg(not(feature = "fips"))]
pub fn tls_client_builder() -> Result<ClientBuilder, Box<dyn Error>> {
    Ok(reqwest::Client::builder().use_rustls_tls())
}

/// Returns a client builder restricted to a FIPS-validated rustls provider.
///
/// The process must install the provider before calling this, e.g. with
/// `rustls::crypto::default_fips_provider().install_default()`.
#[cfg(feature = "fips")]
pub fn tls_client_builder() -> Result<ClientBuilder, Box<dyn Error>> {
    let provider =
        rustls::crypto::CryptoProvider::get_default().ok_or("No crypto provider configured")?;
    if !provider.fips() {
        return Err("Crypto provider is not FIPS-compliant".into());
    }

    let root_cert_store = native_root_store()?;

    let config = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(rustls::ALL_VERSIONS)
        .map_err(|_| "Failed to set protocol versions")?
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();

    if !config.fips() {
        return Err("The final TLS configuration is not FIPS-compliant".into());
    }
    debug!("TLS client builder is configured with FIPS");

    Ok(reqwest::Client::builder().use_preconfigured_tls(config))
}

#[cfg(feature = "fips")]
fn native_root_store() -> Result<rustls::RootCertStore, Box<dyn Error>> {
    let mut store = rustls::RootCertStore::empty();
    let (added, ignored) =
        store.add_parsable_certificates(rustls_native_certs::load_native_certs().certs);
    if ignored > 0 {
        debug!("Ignored {ignored} unparsable native root certificates");
    }
    if added == 0 {
        return Err("No valid certificates found in native root store".into());
    }
    Ok(store)
}
