//! Orchestration sequencing against stub commands.

#![cfg(unix)]

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use genstack_cli::config::StackConfig;
use genstack_cli::orchestrate::{Orchestrator, SetupReport, SetupStep};

fn stub_config(root: &Path, compose_bin: &str) -> StackConfig {
    let mut config = StackConfig::with_root(root.to_path_buf());
    config.compose_bin = compose_bin.to_string();
    config.grace_period = Duration::ZERO;
    config
}

#[tokio::test]
async fn launch_is_recorded_before_container_start_for_both_reset_modes() {
    for hard_reset in [false, true] {
        let dir = tempfile::tempdir().unwrap();
        // `true` accepts any arguments and exits 0, standing in for compose.
        let config = stub_config(dir.path(), "true");
        let orchestrator = Orchestrator::new(&config);

        let mut report = SetupReport::new();
        orchestrator
            .run_sequence(hard_reset, &CancellationToken::new(), &mut report)
            .await
            .unwrap();

        let order: Vec<SetupStep> = report.steps.iter().map(|outcome| outcome.step).collect();
        assert_eq!(
            order,
            vec![
                SetupStep::Teardown,
                SetupStep::ServerLaunch,
                SetupStep::ContainerStart
            ],
            "hard_reset={hard_reset}"
        );

        // No server executable in the temp root: the skip is recorded as a
        // warning outcome, still strictly before the container start.
        let launch = report.outcome(SetupStep::ServerLaunch).unwrap();
        assert!(launch.success);
        assert!(launch.detail.contains("externally managed"));
    }
}

#[tokio::test]
async fn hard_reset_drops_volumes_and_soft_reset_keeps_them() {
    let dir = tempfile::tempdir().unwrap();
    let config = stub_config(dir.path(), "true");
    let orchestrator = Orchestrator::new(&config);

    let mut soft = SetupReport::new();
    orchestrator
        .run_sequence(false, &CancellationToken::new(), &mut soft)
        .await
        .unwrap();
    let mut hard = SetupReport::new();
    orchestrator
        .run_sequence(true, &CancellationToken::new(), &mut hard)
        .await
        .unwrap();

    assert!(!soft.outcome(SetupStep::Teardown).unwrap().detail.contains("-v"));
    assert!(hard.outcome(SetupStep::Teardown).unwrap().detail.contains("-v"));
}

#[tokio::test]
async fn failing_compose_steps_are_recorded_but_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    // `false` exits 1 for every invocation.
    let config = stub_config(dir.path(), "false");
    let orchestrator = Orchestrator::new(&config);

    let mut report = SetupReport::new();
    orchestrator
        .run_sequence(false, &CancellationToken::new(), &mut report)
        .await
        .unwrap();

    let teardown = report.outcome(SetupStep::Teardown).unwrap();
    assert!(!teardown.success);
    assert!(teardown.detail.contains("exited with 1"));

    let start = report.outcome(SetupStep::ContainerStart).unwrap();
    assert!(!start.success);

    // Best-effort failures never flip the overall result.
    assert!(report.success);
}

#[tokio::test]
async fn missing_compose_binary_is_recorded_but_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = stub_config(dir.path(), "genstack-test-no-such-compose");
    let orchestrator = Orchestrator::new(&config);

    let mut report = SetupReport::new();
    orchestrator
        .run_sequence(false, &CancellationToken::new(), &mut report)
        .await
        .unwrap();

    assert!(!report.outcome(SetupStep::Teardown).unwrap().success);
    assert!(report.outcome(SetupStep::ContainerStart).is_some());
}

#[tokio::test]
async fn setup_aborts_when_the_runtime_gate_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = stub_config(dir.path(), "true");
    config.runtime_bin = "genstack-test-no-such-runtime".to_string();
    let orchestrator = Orchestrator::new(&config);

    let report = orchestrator
        .execute_setup(false, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.steps.len(), 1);
    let gate = &report.steps[0];
    assert_eq!(gate.step, SetupStep::RuntimeCheck);
    assert!(!gate.success);
}

#[tokio::test]
async fn existing_server_executable_is_launched() {
    let dir = tempfile::tempdir().unwrap();
    let config = stub_config(dir.path(), "true");

    // Plant an executable stand-in at the fixed relative path.
    let server_dir = config.server_exe.parent().unwrap();
    std::fs::create_dir_all(server_dir).unwrap();
    std::fs::copy("/bin/true", &config.server_exe).unwrap();

    let orchestrator = Orchestrator::new(&config);
    let mut report = SetupReport::new();
    orchestrator
        .run_sequence(false, &CancellationToken::new(), &mut report)
        .await
        .unwrap();

    let launch = report.outcome(SetupStep::ServerLaunch).unwrap();
    assert!(launch.success);
    assert!(launch.detail.contains("launched"));
}
