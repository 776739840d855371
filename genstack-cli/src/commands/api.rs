//! The `genstack api` subcommand: bring the server and its containers up.

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::config::{API_PORT, StackConfig};
use crate::orchestrate::Orchestrator;

pub async fn handle_api_command(
    config: &StackConfig,
    hard_reset: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let orchestrator = Orchestrator::new(config);
    let report = orchestrator.execute_setup(hard_reset, cancel).await?;
    report.print();

    if !report.success {
        anyhow::bail!("setup aborted: required runtime missing");
    }
    println!("Listening on http://localhost:{API_PORT}");
    Ok(())
}
