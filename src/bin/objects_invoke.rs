//! Local invocation: reads one JSON request from stdin, dispatches it, and
//! prints the JSON response.
//!
//! Usage: `objects-invoke [config.yaml] < request.json`

use std::process::ExitCode;

use tenant_objects::{
    api::{App, ApiRequest},
    config::ServiceConfig,
    core::store::ObjectStore,
    persist::{OpSink, sqlite::SqliteOpSink},
    runtime::handle::spawn_service,
    telemetry,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "invocation failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1);
    let config = ServiceConfig::load(config_path.as_deref())?;

    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    let request: ApiRequest = serde_json::from_str(&input)?;

    let (store, sink): (ObjectStore, Option<Box<dyn OpSink>>) = match &config.db_path {
        Some(path) => {
            let sink = SqliteOpSink::open(path)?;
            (sink.load_store()?, Some(Box::new(sink)))
        }
        None => (ObjectStore::new(), None),
    };
    info!(records = store.len(), "store loaded");

    let handle = spawn_service(store, sink, config.runtime.clone());
    let app = App::new(handle.clone(), config);
    let response = app.dispatch(request).await;
    handle.flush().await?;
    handle.shutdown().await?;

    let mut out = serde_json::to_vec(&response)?;
    out.push(b'\n');
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&out).await?;
    stdout.flush().await?;
    Ok(())
}
