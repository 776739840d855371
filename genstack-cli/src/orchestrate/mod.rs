//! Sequenced stack bring-up: runtime gate, compose teardown, server
//! launch, container start.
//!
//! The compose steps are best-effort infrastructure commands; their
//! failures are recorded in the report but never abort the sequence. The
//! server launch always precedes the container start so dependent
//! containers find the API already listening.

pub mod report;

pub use report::{SetupReport, SetupStep, StepOutcome};

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::StackConfig;
use crate::deps;
use crate::error::{CancelledSnafu, CommandError};
use crate::process::CommandRunner;

pub struct Orchestrator<'a> {
    config: &'a StackConfig,
    runner: CommandRunner,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a StackConfig) -> Self {
        Self {
            config,
            runner: CommandRunner::new(config.stack_root.clone()),
        }
    }

    /// Full setup: the runtime gate, then the teardown/launch/start
    /// sequence. Only the gate or an unexpected error (cancellation
    /// included) yields an unsuccessful result.
    pub async fn execute_setup(
        &self,
        hard_reset: bool,
        cancel: &CancellationToken,
    ) -> Result<SetupReport, CommandError> {
        println!("Starting setup from: {}", self.config.stack_root.display());
        let mut report = SetupReport::new();

        if !deps::ensure_runtime(self.config).await {
            report.record(
                SetupStep::RuntimeCheck,
                false,
                "runtime missing or below the version floor",
            );
            report.success = false;
            return Ok(report);
        }
        report.record(SetupStep::RuntimeCheck, true, "runtime meets requirements");

        self.run_sequence(hard_reset, cancel, &mut report).await?;
        Ok(report)
    }

    /// The post-gate sequence. Public so the steps can be exercised
    /// without a runtime installed.
    pub async fn run_sequence(
        &self,
        hard_reset: bool,
        cancel: &CancellationToken,
        report: &mut SetupReport,
    ) -> Result<(), CommandError> {
        self.teardown(hard_reset, cancel, report).await?;
        self.grace_wait(cancel).await?;

        self.launch_server(report);

        self.grace_wait(cancel).await?;
        self.start_containers(cancel, report).await?;
        Ok(())
    }

    async fn teardown(
        &self,
        hard_reset: bool,
        cancel: &CancellationToken,
        report: &mut SetupReport,
    ) -> Result<(), CommandError> {
        let args: &[&str] = if hard_reset { &["down", "-v"] } else { &["down"] };
        if hard_reset {
            println!("Stopping and removing containers, networks, images, and volumes...");
        } else {
            println!("Stopping and removing containers, networks, and images (volumes retained)...");
        }

        self.best_effort(SetupStep::Teardown, args, cancel, report)
            .await
    }

    fn launch_server(&self, report: &mut SetupReport) {
        if self.config.server_exe.exists() {
            println!("Starting API server in detached mode...");
            let workdir = self
                .config
                .server_exe
                .parent()
                .unwrap_or(&self.config.stack_root);
            match CommandRunner::spawn_detached(&self.config.server_exe, &[], workdir) {
                Ok(()) => report.record(
                    SetupStep::ServerLaunch,
                    true,
                    format!("launched {}", self.config.server_exe.display()),
                ),
                Err(err) => report.record(
                    SetupStep::ServerLaunch,
                    false,
                    format!(
                        "failed to launch {}: {err}",
                        self.config.server_exe.display()
                    ),
                ),
            }
        } else {
            println!(
                "Warning: server executable not found at {}",
                self.config.server_exe.display()
            );
            report.record(
                SetupStep::ServerLaunch,
                true,
                "server executable not found; assuming externally managed",
            );
        }
    }

    async fn start_containers(
        &self,
        cancel: &CancellationToken,
        report: &mut SetupReport,
    ) -> Result<(), CommandError> {
        println!("Starting containers in detached mode...");
        self.best_effort(SetupStep::ContainerStart, &["up", "-d"], cancel, report)
            .await
    }

    /// Run one compose subcommand; any outcome short of cancellation is
    /// recorded and absorbed.
    async fn best_effort(
        &self,
        step: SetupStep,
        args: &[&str],
        cancel: &CancellationToken,
        report: &mut SetupReport,
    ) -> Result<(), CommandError> {
        let command = format!("{} {}", self.config.compose_bin, args.join(" "));
        match self
            .runner
            .run_cancellable(&self.config.compose_bin, args, cancel)
            .await
        {
            Ok(0) => report.record(step, true, command),
            Ok(code) => {
                report.record(step, false, format!("`{command}` exited with {code}"));
            }
            Err(err @ CommandError::Cancelled { .. }) => return Err(err),
            Err(err) => {
                warn!(%err, "compose command could not run");
                report.record(step, false, err.to_string());
            }
        }
        Ok(())
    }

    async fn grace_wait(&self, cancel: &CancellationToken) -> Result<(), CommandError> {
        if self.config.grace_period.is_zero() {
            return Ok(());
        }
        tokio::select! {
            () = tokio::time::sleep(self.config.grace_period) => Ok(()),
            () = cancel.cancelled() => CancelledSnafu { program: "setup" }.fail(),
        }
    }
}
