//! Local script simulation.
//!
//! [`Simulator`] is the seam the runner depends on. [`WasmSimulator`] is the
//! bundled implementation: it loads a compiled WASI preview1 module, feeds it
//! the request inputs, and runs it under fuel, memory and wall-clock limits.
//!
//! A script reports its response by writing raw bytes to stdout and exiting
//! with status 0. Anything it writes to stderr is captured as terminal
//! output. Script misbehaviour (non-zero exit, traps, exhausted limits) is
//! reported inside the [`SimulationOutcome`]; only failures to set up the
//! run are returned as [`SimulationFault`]s.

use crate::config::RequestConfig;
use crate::errors::{SimulationFault, SimulationResult};
use crate::script_source::ScriptSource;
use alloy_primitives::hex;
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use wasmtime::{Config, Engine, Linker, Module, Store, StoreLimits, StoreLimitsBuilder, Trap};
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::pipe::{MemoryInputPipe, MemoryOutputPipe};
use wasmtime_wasi::preview1::{self, WasiP1Ctx};

/// WASM magic bytes: "\0asm"
const WASM_MAGIC: &[u8] = b"\0asm";

/// Expected WASM version bytes (version 1)
const WASM_VERSION: &[u8] = &[0x01, 0x00, 0x00, 0x00];

/// Maximum allowed memory limit in megabytes (1 GB)
pub const MAX_MEMORY_LIMIT_MB: u32 = 1024;

/// Capacity of each captured output stream. Writes past it are dropped.
pub const OUTPUT_PIPE_CAPACITY: usize = 64 * 1024;

/// Fuel units between yields back to the runtime, so the timeout can fire
const FUEL_YIELD_INTERVAL: u64 = 10_000;

/// argv[0] seen by the script
const SCRIPT_ARGV0: &str = "script";

/// Result of one simulated script run.
///
/// The two optional fields are independent; nothing here forces exactly one
/// of them to be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationOutcome {
    /// `0x`-prefixed hex of the response bytes
    pub response_bytes_hexstring: Option<String>,
    pub error_string: Option<String>,
    pub captured_terminal_output: String,
}

impl SimulationOutcome {
    pub fn success(response_bytes_hexstring: impl Into<String>) -> Self {
        Self {
            response_bytes_hexstring: Some(response_bytes_hexstring.into()),
            ..Self::default()
        }
    }

    pub fn failure(error_string: impl Into<String>) -> Self {
        Self {
            error_string: Some(error_string.into()),
            ..Self::default()
        }
    }

    pub fn with_terminal_output(mut self, output: impl Into<String>) -> Self {
        self.captured_terminal_output = output.into();
        self
    }
}

/// Anything that can run a request and report its outcome
#[async_trait]
pub trait Simulator: Send + Sync {
    async fn simulate(&self, config: &RequestConfig) -> SimulationResult<SimulationOutcome>;
}

/// JSON document written to the script's stdin
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScriptInput<'a> {
    args: &'a [String],
    bytes_args: &'a [String],
    secrets: &'a BTreeMap<String, String>,
}

/// Store data that holds both WASI context and resource limits
struct StoreData {
    wasi: WasiP1Ctx,
    limits: StoreLimits,
}

/// Runs requests as sandboxed WASM modules
pub struct WasmSimulator<S: ScriptSource> {
    engine: Engine,
    source: Arc<S>,
}

impl<S: ScriptSource> WasmSimulator<S> {
    pub fn new(source: Arc<S>) -> SimulationResult<Self> {
        let mut engine_config = Config::new();
        engine_config.async_support(true).consume_fuel(true);

        let engine = Engine::new(&engine_config)
            .map_err(|e| SimulationFault::CompilationFailed(e.to_string()))?;

        Ok(Self { engine, source })
    }
}

#[async_trait]
impl<S: ScriptSource> Simulator for WasmSimulator<S> {
    async fn simulate(&self, config: &RequestConfig) -> SimulationResult<SimulationOutcome> {
        info!("Simulating script {}", config.source);

        if config.max_memory_usage_mb > MAX_MEMORY_LIMIT_MB {
            return Err(SimulationFault::MemoryLimitTooLarge(
                config.max_memory_usage_mb,
                MAX_MEMORY_LIMIT_MB,
            ));
        }
        let input = script_input(config)?;

        let wasm_bytes = self.source.load(&config.source).await?;
        validate_wasm(&wasm_bytes)?;

        let module = Module::new(&self.engine, &wasm_bytes)
            .map_err(|e| SimulationFault::CompilationFailed(e.to_string()))?;

        let stdout_pipe = MemoryOutputPipe::new(OUTPUT_PIPE_CAPACITY);
        let stderr_pipe = MemoryOutputPipe::new(OUTPUT_PIPE_CAPACITY);

        let wasi = WasiCtxBuilder::new()
            .stdin(MemoryInputPipe::new(Bytes::from(input)))
            .stdout(stdout_pipe.clone())
            .stderr(stderr_pipe.clone())
            .args(&script_argv(config))
            .build_p1();

        let limits = StoreLimitsBuilder::new()
            .memory_size((config.max_memory_usage_mb as usize) * 1024 * 1024)
            .trap_on_grow_failure(true)
            .build();

        let mut store = Store::new(&self.engine, StoreData { wasi, limits });
        store.limiter(|data| &mut data.limits as &mut dyn wasmtime::ResourceLimiter);
        store
            .set_fuel(config.fuel_limit)
            .map_err(|e| SimulationFault::Internal(format!("Failed to set fuel: {e}")))?;
        store
            .fuel_async_yield_interval(Some(FUEL_YIELD_INTERVAL))
            .map_err(|e| SimulationFault::Internal(format!("Failed to set yield interval: {e}")))?;

        let mut linker = Linker::new(&self.engine);
        preview1::add_to_linker_async(&mut linker, |s: &mut StoreData| &mut s.wasi)
            .map_err(|e| SimulationFault::WasiSetupFailed(e.to_string()))?;

        // A declared initial memory above the limit fails here rather than at
        // run time, but it is the same limit and is reported the same way.
        let instance = match linker.instantiate_async(&mut store, &module).await {
            Ok(instance) => instance,
            Err(e) if is_memory_limit_error(&format!("{e:#}")) => {
                info!("Script memory exceeds the limit at instantiation: {e}");
                return Ok(SimulationOutcome::failure(memory_limit_message(config)));
            }
            Err(e) => return Err(SimulationFault::InstantiationFailed(e.to_string())),
        };

        let start_func = instance
            .get_typed_func::<(), ()>(&mut store, "_start")
            .map_err(|_| SimulationFault::EntryPointNotFound)?;

        let execution = tokio::time::timeout(
            Duration::from_millis(config.max_execution_time_ms),
            start_func.call_async(&mut store, ()),
        )
        .await;

        let remaining_fuel = store.get_fuel().unwrap_or(0);
        debug!(
            "Script consumed {} fuel units",
            config.fuel_limit.saturating_sub(remaining_fuel)
        );

        let mut terminal_output = String::from_utf8_lossy(&stderr_pipe.contents()).into_owned();
        let reported_error = match execution {
            Ok(Ok(())) => None,
            Ok(Err(e)) => script_error(&e, config, &terminal_output),
            Err(_elapsed) => Some(format!(
                "script exceeded maximum execution time of {} ms",
                config.max_execution_time_ms
            )),
        };

        let outcome = match reported_error {
            Some(error) => {
                info!("Script reported an error: {error}");
                SimulationOutcome::failure(error)
            }
            None => {
                let response = stdout_pipe.contents();
                if response.len() > config.max_on_chain_response_bytes {
                    SimulationOutcome::failure(format!(
                        "response >{} bytes",
                        config.max_on_chain_response_bytes
                    ))
                } else {
                    debug!("Script returned {} response bytes", response.len());
                    SimulationOutcome::success(format!("0x{}", hex::encode(&response)))
                }
            }
        };

        mark_truncation(&mut terminal_output);
        Ok(outcome.with_terminal_output(terminal_output))
    }
}

/// Append a marker when stderr filled its pipe and later writes were lost
fn mark_truncation(terminal_output: &mut String) {
    if terminal_output.len() >= OUTPUT_PIPE_CAPACITY {
        debug!("Script terminal output hit the {OUTPUT_PIPE_CAPACITY} byte capture limit");
        terminal_output.push_str(&format!(
            "\n[terminal output truncated at {OUTPUT_PIPE_CAPACITY} bytes]\n"
        ));
    }
}

fn memory_limit_message(config: &RequestConfig) -> String {
    format!(
        "script exceeded maximum memory usage of {} MB",
        config.max_memory_usage_mb
    )
}

/// Map a failed `_start` call to the error string reported to the user.
/// `None` means the script exited cleanly through `proc_exit(0)`.
fn script_error(
    error: &anyhow::Error,
    config: &RequestConfig,
    terminal_output: &str,
) -> Option<String> {
    if let Some(exit) = error.downcast_ref::<wasmtime_wasi::I32Exit>() {
        if exit.0 == 0 {
            return None;
        }
        let message = terminal_output
            .lines()
            .map(str::trim)
            .rev()
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("script exited with code {}", exit.0));
        return Some(message);
    }

    if matches!(error.downcast_ref::<Trap>(), Some(Trap::OutOfFuel)) {
        return Some(format!(
            "script exceeded fuel limit of {} units",
            config.fuel_limit
        ));
    }

    let message = format!("{error:#}");
    if is_memory_limit_error(&message) {
        return Some(memory_limit_message(config));
    }

    Some(error.root_cause().to_string())
}

fn is_memory_limit_error(message: &str) -> bool {
    message.contains("growing memory")
        || message.contains("resource limit exceeded")
        || (message.contains("memory") && message.contains("limit exceeded"))
}

/// Serialize the request inputs for the script's stdin
fn script_input(config: &RequestConfig) -> SimulationResult<Vec<u8>> {
    if let Some(bad) = config
        .bytes_args
        .iter()
        .find(|arg| {
            arg.strip_prefix("0x")
                .is_none_or(|digits| hex::decode(digits).is_err())
        })
    {
        return Err(SimulationFault::invalid_request(format!(
            "bytesArgs entry '{bad}' is not a 0x-prefixed hex string"
        )));
    }

    let input = ScriptInput {
        args: &config.args,
        bytes_args: &config.bytes_args,
        secrets: &config.secrets,
    };
    serde_json::to_vec(&input).map_err(|e| SimulationFault::Internal(e.to_string()))
}

fn script_argv(config: &RequestConfig) -> Vec<String> {
    std::iter::once(SCRIPT_ARGV0.to_string())
        .chain(config.args.iter().cloned())
        .collect()
}

/// Validate that bytes represent a valid WASM binary
///
/// Checks for:
/// - WASM magic bytes ("\0asm")
/// - WASM version (1.0)
pub fn validate_wasm(bytes: &[u8]) -> SimulationResult<()> {
    if bytes.len() < 8 {
        return Err(SimulationFault::InvalidWasm {
            reason: format!(
                "WASM binary too small: {} bytes (minimum 8 required)",
                bytes.len()
            ),
        });
    }

    if &bytes[0..4] != WASM_MAGIC {
        return Err(SimulationFault::InvalidWasm {
            reason: format!(
                "Invalid WASM magic bytes: expected {:?}, got {:?}",
                WASM_MAGIC,
                &bytes[0..4]
            ),
        });
    }

    if &bytes[4..8] != WASM_VERSION {
        return Err(SimulationFault::InvalidWasm {
            reason: format!(
                "Unsupported WASM version: expected {:?}, got {:?}",
                WASM_VERSION,
                &bytes[4..8]
            ),
        });
    }

    Ok(())
}
