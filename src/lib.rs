pub mod config;
pub mod decode;
pub mod errors;
pub mod fault_log;
pub mod runner;
pub mod script_source;
pub mod simulator;

pub use config::{CodeLocation, RequestConfig, ReturnType};
pub use runner::{ExitStatus, RunReport, run};
pub use simulator::{SimulationOutcome, Simulator};
