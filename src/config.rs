//! Request configuration and runner settings.
//!
//! A request config is a JSON document describing which script to simulate,
//! what it receives, and how its response should be decoded. Field names are
//! camelCase so existing request files can be reused as-is.

use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tokio::fs;

/// Config file read when `SCRIPT_SIM_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "request-config.json";

/// Environment variable overriding the request config path
pub const CONFIG_PATH_ENV: &str = "SCRIPT_SIM_CONFIG";

/// Environment variable enabling the fault log
pub const FAULT_LOG_ENV: &str = "SCRIPT_SIM_FAULT_LOG";

const DEFAULT_MAX_ON_CHAIN_RESPONSE_BYTES: usize = 256;
const DEFAULT_MAX_EXECUTION_TIME_MS: u64 = 10_000;
const DEFAULT_MAX_MEMORY_USAGE_MB: u32 = 128;
const DEFAULT_FUEL_LIMIT: u64 = 100_000_000;

/// How a script's response bytes are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReturnType {
    Uint256,
    Int256,
    String,
    Bytes,
}

impl ReturnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnType::Uint256 => "uint256",
            ReturnType::Int256 => "int256",
            ReturnType::String => "string",
            ReturnType::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uint256" | "uint" => Ok(ReturnType::Uint256),
            "int256" | "int" => Ok(ReturnType::Int256),
            "string" => Ok(ReturnType::String),
            "bytes" => Ok(ReturnType::Bytes),
            _ => Err(ConfigError::invalid_value("expectedReturnType", s)),
        }
    }
}

impl TryFrom<String> for ReturnType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReturnType> for String {
    fn from(value: ReturnType) -> Self {
        value.as_str().to_string()
    }
}

/// Where `RequestConfig::source` points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLocation {
    /// A path on the local filesystem
    #[default]
    Local,
    /// An HTTP(S) URL
    Remote,
}

/// Description of a single script simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    /// Path or URL of the compiled WASM script
    pub source: String,
    #[serde(default)]
    pub code_location: CodeLocation,
    #[serde(default)]
    pub args: Vec<String>,
    /// `0x`-prefixed hex strings
    #[serde(default)]
    pub bytes_args: Vec<String>,
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    pub expected_return_type: ReturnType,
    #[serde(default = "default_max_on_chain_response_bytes")]
    pub max_on_chain_response_bytes: usize,
    #[serde(default = "default_max_execution_time_ms")]
    pub max_execution_time_ms: u64,
    #[serde(default = "default_max_memory_usage_mb")]
    pub max_memory_usage_mb: u32,
    #[serde(default = "default_fuel_limit")]
    pub fuel_limit: u64,
}

fn default_max_on_chain_response_bytes() -> usize {
    DEFAULT_MAX_ON_CHAIN_RESPONSE_BYTES
}

fn default_max_execution_time_ms() -> u64 {
    DEFAULT_MAX_EXECUTION_TIME_MS
}

fn default_max_memory_usage_mb() -> u32 {
    DEFAULT_MAX_MEMORY_USAGE_MB
}

fn default_fuel_limit() -> u64 {
    DEFAULT_FUEL_LIMIT
}

impl RequestConfig {
    /// Create a local-file request with default limits
    pub fn new(source: impl Into<String>, expected_return_type: ReturnType) -> Self {
        Self {
            source: source.into(),
            code_location: CodeLocation::Local,
            args: Vec::new(),
            bytes_args: Vec::new(),
            secrets: BTreeMap::new(),
            expected_return_type,
            max_on_chain_response_bytes: DEFAULT_MAX_ON_CHAIN_RESPONSE_BYTES,
            max_execution_time_ms: DEFAULT_MAX_EXECUTION_TIME_MS,
            max_memory_usage_mb: DEFAULT_MAX_MEMORY_USAGE_MB,
            fuel_limit: DEFAULT_FUEL_LIMIT,
        }
    }

    pub fn with_code_location(mut self, code_location: CodeLocation) -> Self {
        self.code_location = code_location;
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_bytes_args(mut self, bytes_args: Vec<String>) -> Self {
        self.bytes_args = bytes_args;
        self
    }

    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), value.into());
        self
    }

    pub fn with_max_on_chain_response_bytes(mut self, max: usize) -> Self {
        self.max_on_chain_response_bytes = max;
        self
    }

    pub fn with_max_execution_time_ms(mut self, max: u64) -> Self {
        self.max_execution_time_ms = max;
        self
    }

    pub fn with_max_memory_usage_mb(mut self, max: u32) -> Self {
        self.max_memory_usage_mb = max;
        self
    }

    pub fn with_fuel_limit(mut self, fuel_limit: u64) -> Self {
        self.fuel_limit = fuel_limit;
        self
    }
}

/// Load a request config from a JSON file
pub async fn load_request_config(path: &str) -> ConfigResult<RequestConfig> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::FileNotFound {
            path: path.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Process-level settings taken from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    pub config_path: String,
    pub fault_log_path: Option<String>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            fault_log_path: None,
        }
    }
}

impl RunnerSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            config_path: non_empty(CONFIG_PATH_ENV)
                .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string()),
            fault_log_path: non_empty(FAULT_LOG_ENV),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_return_type_parsing() {
        assert_eq!("uint256".parse::<ReturnType>().unwrap(), ReturnType::Uint256);
        assert_eq!("UINT256".parse::<ReturnType>().unwrap(), ReturnType::Uint256);
        assert_eq!("uint".parse::<ReturnType>().unwrap(), ReturnType::Uint256);
        assert_eq!("int".parse::<ReturnType>().unwrap(), ReturnType::Int256);
        assert_eq!("String".parse::<ReturnType>().unwrap(), ReturnType::String);
        assert_eq!("bytes".parse::<ReturnType>().unwrap(), ReturnType::Bytes);

        let err = "float".parse::<ReturnType>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_request_config_defaults_from_json() {
        let json = r#"{
            "source": "scripts/price.wasm",
            "expectedReturnType": "uint256"
        }"#;
        let config: RequestConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config, RequestConfig::new("scripts/price.wasm", ReturnType::Uint256));
        assert_eq!(config.code_location, CodeLocation::Local);
        assert_eq!(config.max_on_chain_response_bytes, 256);
        assert_eq!(config.max_execution_time_ms, 10_000);
        assert_eq!(config.max_memory_usage_mb, 128);
    }

    #[test]
    fn test_request_config_full_json() {
        let json = r#"{
            "source": "https://example.com/mint.wasm",
            "codeLocation": "remote",
            "args": ["AAPL", "10"],
            "bytesArgs": ["0x1234"],
            "secrets": { "apiKey": "secret" },
            "expectedReturnType": "Int",
            "maxOnChainResponseBytes": 64,
            "maxExecutionTimeMs": 500,
            "maxMemoryUsageMb": 32,
            "fuelLimit": 1000
        }"#;
        let config: RequestConfig = serde_json::from_str(json).unwrap();

        let expected = RequestConfig::new("https://example.com/mint.wasm", ReturnType::Int256)
            .with_code_location(CodeLocation::Remote)
            .with_args(vec!["AAPL".to_string(), "10".to_string()])
            .with_bytes_args(vec!["0x1234".to_string()])
            .with_secret("apiKey", "secret")
            .with_max_on_chain_response_bytes(64)
            .with_max_execution_time_ms(500)
            .with_max_memory_usage_mb(32)
            .with_fuel_limit(1000);
        assert_eq!(config, expected);
    }

    #[test]
    fn test_request_config_rejects_unknown_return_type() {
        let json = r#"{ "source": "a.wasm", "expectedReturnType": "float" }"#;
        let result = serde_json::from_str::<RequestConfig>(json);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("float"));
    }

    #[test]
    fn test_return_type_serializes_canonical_name() {
        let config = RequestConfig::new("a.wasm", ReturnType::Int256);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""expectedReturnType":"int256""#));
    }

    #[tokio::test]
    async fn test_load_request_config_from_file() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(
            temp_file.path(),
            r#"{ "source": "script.wasm", "expectedReturnType": "string" }"#,
        )
        .unwrap();

        let config = load_request_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.source, "script.wasm");
        assert_eq!(config.expected_return_type, ReturnType::String);
    }

    #[tokio::test]
    async fn test_load_request_config_missing_file() {
        let result = load_request_config("definitely/not/here.json").await;
        match result {
            Err(ConfigError::FileNotFound { path }) => assert_eq!(path, "definitely/not/here.json"),
            other => panic!("Expected FileNotFound, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_request_config_malformed() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "{ not json").unwrap();

        let result = load_request_config(temp_file.path().to_str().unwrap()).await;
        assert!(matches!(result, Err(ConfigError::Serialization(_))));
    }

    #[test]
    fn test_runner_settings_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (CONFIG_PATH_ENV, "configs/mint.json"),
            (FAULT_LOG_ENV, "faults.log"),
        ]
        .into_iter()
        .collect();

        let settings = RunnerSettings::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(settings.config_path, "configs/mint.json");
        assert_eq!(settings.fault_log_path.as_deref(), Some("faults.log"));
    }

    #[test]
    fn test_runner_settings_defaults() {
        let settings = RunnerSettings::from_lookup(|key| {
            (key == FAULT_LOG_ENV).then(|| "  ".to_string())
        });
        assert_eq!(settings, RunnerSettings::default());
    }
}
