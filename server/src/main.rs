// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use adc_secrets_server::application::Application;
use adc_secrets_server::configuration::ServerOptions;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("[server] init");

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        // this needs to be set to remove duplicated information in the log.
        .with_current_span(false)
        // this needs to be set to false, otherwise ANSI color codes will
        // show up in a confusing manner in log aggregators.
        .with_ansi(false)
        // the log collector adds the ingestion time.
        .without_time()
        // remove the name of the function from every log entry
        .with_target(false)
        .init();

    // get configuration options from arguments and environment variables
    let options = ServerOptions::parse();

    tracing::info!("[server] {:?}", &options);

    let application = Application::build(options).await?;
    let tasks = application.spawn_background_tasks();

    application.run_until_stopped().await?;

    for task in tasks {
        task.abort();
    }
    tracing::info!("[server] stopped");
    Ok(())
}
