//! Device executors
//!
//! Concrete transports (NETCONF, SSH/CLI, REST, SNMP) plug in behind the
//! [`Executor`] trait. The default is a simulated executor with per-method
//! success rates and delays proportional to the step timeout, which is also
//! what the test suites run against.

use async_trait::async_trait;
use netheal_common::{Action, ActionMethod, ActionStep};
use rand::Rng;
use std::collections::HashMap;
use tokio::time::{sleep, Duration};
use tracing::debug;

/// Result of running one step against a device
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        StepOutcome {
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        StepOutcome {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Pluggable device-access transport
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, action: &Action, step: &ActionStep) -> StepOutcome;
}

/// Simulated executor with per-method success rates
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    success_rates: HashMap<ActionMethod, f64>,
    /// Fraction of the step timeout spent simulating device latency
    delay_factor: f64,
}

impl SimulatedExecutor {
    pub fn new() -> Self {
        let mut success_rates = HashMap::new();
        success_rates.insert(ActionMethod::Netconf, 0.90);
        success_rates.insert(ActionMethod::Cli, 0.95);
        success_rates.insert(ActionMethod::RestApi, 0.92);
        success_rates.insert(ActionMethod::Snmp, 0.88);
        SimulatedExecutor {
            success_rates,
            delay_factor: 0.01,
        }
    }

    /// Deterministic variant for tests: every step succeeds instantly
    pub fn reliable() -> Self {
        let mut executor = Self::new();
        for rate in executor.success_rates.values_mut() {
            *rate = 1.0;
        }
        executor.delay_factor = 0.0;
        executor
    }

    pub fn with_success_rate(mut self, method: ActionMethod, rate: f64) -> Self {
        self.success_rates.insert(method, rate);
        self
    }

    pub fn with_delay_factor(mut self, factor: f64) -> Self {
        self.delay_factor = factor;
        self
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for SimulatedExecutor {
    async fn run(&self, action: &Action, step: &ActionStep) -> StepOutcome {
        if self.delay_factor > 0.0 {
            let delay_ms = (step.timeout_seconds as f64 * self.delay_factor * 1000.0) as u64;
            sleep(Duration::from_millis(delay_ms)).await;
        }

        let rate = self.success_rates.get(&action.method).copied().unwrap_or(0.9);
        let roll: f64 = rand::thread_rng().gen();
        debug!(
            action_id = %action.action_id,
            method = %action.method.as_str(),
            command = %step.command,
            "simulated execution"
        );
        if roll < rate {
            StepOutcome::ok(format!("{}: ok", step.command))
        } else {
            StepOutcome::failed(format!(
                "simulated {} failure running '{}'",
                action.method.as_str(),
                step.command
            ))
        }
    }
}
