//! Single-shot simulate-and-report runner.
//!
//! The runner never touches the process streams itself: it produces a
//! [`RunReport`] that `main` writes out, which keeps every path testable.

use crate::config::{RequestConfig, ReturnType};
use crate::decode::decode_result;
use crate::errors::{AppError, DecodeResult};
use crate::simulator::{SimulationOutcome, Simulator};
use log::{debug, info};
use std::process::ExitCode;

/// How the process should exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// A fault reached the top-level handler
    Failure,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => ExitCode::SUCCESS,
            ExitStatus::Failure => ExitCode::FAILURE,
        }
    }
}

/// The top-level fault that ended a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultSummary {
    /// See [`AppError::class`]
    pub class: &'static str,
    pub description: String,
}

/// Everything a run writes, plus its exit status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
    /// Set exactly when `status` is `Failure`
    pub fault: Option<FaultSummary>,
}

impl RunReport {
    /// Report for a fault caught at the top level
    pub fn from_fault(fault: &AppError) -> Self {
        let description = fault.to_string();
        Self {
            stdout: String::new(),
            stderr: format!("{description}\n"),
            status: ExitStatus::Failure,
            fault: Some(FaultSummary {
                class: fault.class(),
                description,
            }),
        }
    }
}

/// Render an outcome as `(stdout, stderr)` text.
///
/// The response and the error are checked independently, so an outcome
/// carrying both prints both.
pub fn format_outcome(
    outcome: &SimulationOutcome,
    return_type: ReturnType,
) -> DecodeResult<(String, String)> {
    let mut stdout = String::new();
    let mut stderr = String::new();

    if let Some(response) = &outcome.response_bytes_hexstring {
        let value = decode_result(response, return_type)?;
        stdout.push_str(&format!("Response is : \n      {value}\n\n"));
    }
    if let Some(error) = &outcome.error_string {
        stderr.push_str(&format!("Error: {error}\n"));
    }

    Ok((stdout, stderr))
}

/// Simulate `config` and report the result
pub async fn run(simulator: &dyn Simulator, config: &RequestConfig) -> RunReport {
    match simulate_and_format(simulator, config).await {
        Ok((stdout, stderr)) => RunReport {
            stdout,
            stderr,
            status: ExitStatus::Success,
            fault: None,
        },
        Err(fault) => {
            info!("Run aborted: {fault}");
            RunReport::from_fault(&fault)
        }
    }
}

async fn simulate_and_format(
    simulator: &dyn Simulator,
    config: &RequestConfig,
) -> Result<(String, String), AppError> {
    let outcome = simulator.simulate(config).await?;

    if !outcome.captured_terminal_output.is_empty() {
        debug!("Script terminal output:\n{}", outcome.captured_terminal_output);
    }
    info!(
        "Simulation finished (response: {}, error: {})",
        outcome.response_bytes_hexstring.is_some(),
        outcome.error_string.is_some()
    );

    Ok(format_outcome(&outcome, config.expected_return_type)?)
}
