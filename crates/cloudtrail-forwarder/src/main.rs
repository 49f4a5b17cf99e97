// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, process::ExitCode};
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use logscale::{
    cloudtrail::{parse_notification, FileObjectFetcher, HttpObjectFetcher, ObjectFetcher},
    config::Config,
    forwarder::{Forwarder, ForwarderConfig},
    hec_event::HecEventFactory,
    http::{build_client, prepare_client_provider},
    ingest::IngestApi,
};

#[tokio::main]
pub async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error reading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", config.log_level);
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(false)
        .without_time()
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Setting default subscriber failed: {e}");
        return ExitCode::FAILURE;
    }
    debug!("Logging subsystem enabled");

    let trigger = match read_trigger(env::args().nth(1)).await {
        Ok(trigger) => trigger,
        Err(e) => {
            error!("Failed to read trigger event: {e}");
            return ExitCode::FAILURE;
        }
    };
    let object = match parse_notification(&trigger) {
        Ok(object) => object,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!("Shipping s3://{}/{}", object.bucket, object.key);

    if let Err(e) = prepare_client_provider() {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    let client = match build_client(config.https_proxy.as_deref(), config.timeout) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create HTTP client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let fetcher: Box<dyn ObjectFetcher> = match config.object_store_url.strip_prefix("file://") {
        Some(root) => Box::new(FileObjectFetcher::new(root)),
        None => Box::new(HttpObjectFetcher::new(
            client.clone(),
            &config.object_store_url,
        )),
    };

    let forwarder = Forwarder::new(ForwarderConfig {
        api: IngestApi::new(client).with_url_override(config.url_override.clone()),
        event_factory: HecEventFactory::new(
            config.target.repository.clone(),
            config.target.host.clone(),
            config.source.clone(),
            config.sourcetype.clone(),
        ),
        target: config.target,
        endpoint: config.endpoint,
        extra_fields: config.extra_fields,
        rejection_policy: config.rejection_policy,
    });

    match forwarder.ship_object(fetcher.as_ref(), &object).await {
        Ok(summary) => {
            info!(
                "Shipped {} events in {} batches ({} rejected)",
                summary.events, summary.batches, summary.rejected
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to ship s3://{}/{}: {e}", object.bucket, object.key);
            ExitCode::FAILURE
        }
    }
}

/// Reads the invocation event from `path`, or from stdin when no path is given.
async fn read_trigger(path: Option<String>) -> std::io::Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path).await,
        None => {
            let mut trigger = String::new();
            tokio::io::stdin().read_to_string(&mut trigger).await?;
            Ok(trigger)
        }
    }
}
