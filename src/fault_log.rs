//! Optional record of runs that ended in a top-level fault.
//!
//! One line per fault, tagged with the failing stage and the request config
//! that was being run, so unattended runs can be grepped afterwards.

use crate::runner::FaultSummary;
use chrono::{DateTime, Utc};
use log::warn;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

pub struct FaultLog {
    path: PathBuf,
}

impl FaultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append `fault` for the run of `config_path`. Write failures are
    /// logged and otherwise ignored; the run's exit status is already decided.
    pub fn record(&self, config_path: &str, fault: &FaultSummary) {
        let entry = fault_entry(Utc::now(), config_path, fault);

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));

        if let Err(e) = written {
            warn!("Failed to write fault log {}: {e}", self.path.display());
            warn!("{}", entry.trim_end());
        }
    }
}

fn fault_entry(at: DateTime<Utc>, config_path: &str, fault: &FaultSummary) -> String {
    format!(
        "[{}] FAULT class={} config={}: {}\n",
        at.format("%Y-%m-%d %H:%M:%S UTC"),
        fault.class,
        config_path,
        fault.description
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn missing_script() -> FaultSummary {
        FaultSummary {
            class: "simulation",
            description: "Simulation failed: Failed to load script: Script not found: a.wasm"
                .to_string(),
        }
    }

    #[test]
    fn test_fault_entry_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let entry = fault_entry(at, "configs/mint.json", &missing_script());

        assert_eq!(
            entry,
            "[2024-03-01 12:30:05 UTC] FAULT class=simulation config=configs/mint.json: \
             Simulation failed: Failed to load script: Script not found: a.wasm\n"
        );
    }

    #[test]
    fn test_record_appends_one_line_per_fault() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("faults.log");
        let fault_log = FaultLog::new(&path);

        fault_log.record("first.json", &missing_script());
        fault_log.record(
            "second.json",
            &FaultSummary {
                class: "config",
                description: "Configuration error: Config file not found: second.json"
                    .to_string(),
            },
        );

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("FAULT class=simulation config=first.json: "));
        assert!(lines[1].contains("FAULT class=config config=second.json: "));
        assert!(lines[1].ends_with("Config file not found: second.json"));
    }

    #[test]
    fn test_unwritable_path_does_not_panic() {
        let fault_log = FaultLog::new("/nonexistent-dir/faults.log");
        fault_log.record("request-config.json", &missing_script());
    }
}
