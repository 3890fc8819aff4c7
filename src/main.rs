use script_sim::config::{RunnerSettings, load_request_config};
use script_sim::errors::{AppError, SimulationFault};
use script_sim::fault_log::FaultLog;
use script_sim::runner::{RunReport, run};
use script_sim::script_source::ConfiguredScriptSource;
use script_sim::simulator::WasmSimulator;

use log::{info, warn};
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

fn fault_report(fault: AppError) -> RunReport {
    info!("Run aborted: {fault}");
    RunReport::from_fault(&fault)
}

async fn simulate(settings: &RunnerSettings) -> RunReport {
    let config = match load_request_config(&settings.config_path).await {
        Ok(config) => config,
        Err(e) => return fault_report(e.into()),
    };
    info!("Loaded request config from {}", settings.config_path);

    let simulator = ConfiguredScriptSource::for_request(&config)
        .map_err(SimulationFault::from)
        .and_then(|source| WasmSimulator::new(Arc::new(source)));

    match simulator {
        Ok(simulator) => run(&simulator, &config).await,
        Err(e) => fault_report(e.into()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let settings = RunnerSettings::from_env();
    let report = simulate(&settings).await;

    print!("{}", report.stdout);
    eprint!("{}", report.stderr);
    if let Err(e) = std::io::stdout().flush() {
        warn!("Failed to flush stdout: {e}");
    }

    if let (Some(fault), Some(path)) = (&report.fault, &settings.fault_log_path) {
        FaultLog::new(path).record(&settings.config_path, fault);
    }

    report.status.into()
}
