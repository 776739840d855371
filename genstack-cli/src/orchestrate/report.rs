//! Per-step outcomes for one setup run.
//!
//! Steps are recorded in execution order so callers (and tests) can assert
//! on individual results instead of parsing log text.

use std::fmt;

use chrono::Utc;

/// One stage of the setup sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    RuntimeCheck,
    Teardown,
    ServerLaunch,
    ContainerStart,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RuntimeCheck => "runtime check",
            Self::Teardown => "compose teardown",
            Self::ServerLaunch => "server launch",
            Self::ContainerStart => "container start",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct StepOutcome {
    pub step: SetupStep,
    pub success: bool,
    pub detail: String,
}

#[derive(Debug)]
pub struct SetupReport {
    pub timestamp: String,
    pub steps: Vec<StepOutcome>,
    /// Overall result; individual best-effort step failures leave this
    /// true, only the runtime gate flips it.
    pub success: bool,
}

impl SetupReport {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            steps: Vec::new(),
            success: true,
        }
    }

    pub fn record(&mut self, step: SetupStep, success: bool, detail: impl Into<String>) {
        self.steps.push(StepOutcome {
            step,
            success,
            detail: detail.into(),
        });
    }

    pub fn outcome(&self, step: SetupStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|outcome| outcome.step == step)
    }

    pub fn print(&self) {
        println!();
        println!("🧰 genstack setup report");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("Generated: {}", self.timestamp);
        for outcome in &self.steps {
            let status = if outcome.success { "✅" } else { "⚠️" };
            println!("  {status} {}: {}", outcome.step, outcome.detail);
        }
        println!();
        if self.success {
            println!("✅ Setup complete!");
        } else {
            println!("⚠️  Setup did not complete");
        }
    }
}

impl Default for SetupReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_recorded_in_order() {
        let mut report = SetupReport::new();
        report.record(SetupStep::RuntimeCheck, true, "ok");
        report.record(SetupStep::Teardown, false, "exit 1");
        report.record(SetupStep::ServerLaunch, true, "launched");

        let order: Vec<SetupStep> = report.steps.iter().map(|o| o.step).collect();
        assert_eq!(
            order,
            vec![
                SetupStep::RuntimeCheck,
                SetupStep::Teardown,
                SetupStep::ServerLaunch
            ]
        );
        assert!(report.success);
    }

    #[test]
    fn outcome_looks_up_by_step() {
        let mut report = SetupReport::new();
        report.record(SetupStep::Teardown, false, "exit 1");
        let outcome = report.outcome(SetupStep::Teardown).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.detail, "exit 1");
        assert!(report.outcome(SetupStep::ContainerStart).is_none());
    }
}
