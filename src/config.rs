//! Client configuration
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (ClientConfig::default())
//! 2. Config file (`.toml` or `.json`)
//! 3. Environment variables (FTPLINK_* prefix)
//! 4. CLI flags (highest priority, applied by the caller)

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{FtpError, FtpResult};
use crate::state::{DataMode, TransferSettings, TransferType};
use crate::util::decide_transfer_type;

// ============================================================================
// MAIN CONFIGURATION STRUCT
// ============================================================================

/// Configuration for one FTP session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
	// ========================================================================
	// CONNECTION
	// ========================================================================
	/// Server host name or address
	pub host: String,

	/// Control connection port
	pub port: u16,

	/// Control connection establishment timeout in seconds
	pub connect_timeout_secs: u64,

	/// Upper bound for one queued command (0 = unbounded). The clock stops
	/// while a data connection is moving bytes and restarts when it ends;
	/// `dataTimeoutSecs` bounds the transfer itself.
	pub command_timeout_secs: u64,

	// ========================================================================
	// DATA CHANNEL
	// ========================================================================
	/// Data connection establishment and per-read/write timeout in seconds
	pub data_timeout_secs: u64,

	/// Data mode used for file commands
	pub data_mode: DataMode,

	/// Dial the control host instead of the address announced by PASV
	pub passive_use_control_host: bool,

	/// Active mode settings
	pub active: ActiveConfig,

	/// Representation type selection for file commands
	pub transfer_type: TransferTypePolicy,

	// ========================================================================
	// LIMITS
	// ========================================================================
	/// Read buffer size for control and data sockets
	pub read_buffer_size: usize,

	/// Longest accepted reply line
	pub max_reply_line: usize,

	// ========================================================================
	// OUTPUT & LOGGING
	// ========================================================================
	/// Log level (trace, debug, info, warn, error)
	pub log_level: String,
}

impl Default for ClientConfig {
	fn default() -> Self {
		ClientConfig {
			host: "localhost".to_string(),
			port: 21,
			connect_timeout_secs: 30,
			command_timeout_secs: 300,
			data_timeout_secs: 30,
			data_mode: DataMode::Passive,
			passive_use_control_host: false,
			active: ActiveConfig::default(),
			transfer_type: TransferTypePolicy::Auto,
			read_buffer_size: 4096,
			max_reply_line: crate::reply::DEFAULT_MAX_LINE,
			log_level: "info".to_string(),
		}
	}
}

impl ClientConfig {
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		ClientConfig { host: host.into(), port, ..ClientConfig::default() }
	}

	/// Load a config file; the format is chosen by extension (`.json`, else TOML)
	pub fn load(path: &Path) -> FtpResult<Self> {
		let text = std::fs::read_to_string(path).map_err(|e| FtpError::Config {
			message: format!("cannot read {}: {}", path.display(), e),
		})?;
		let config = match path.extension().and_then(|e| e.to_str()) {
			Some("json") => serde_json::from_str(&text)?,
			_ => toml::from_str(&text)?,
		};
		Ok(config)
	}

	/// Apply FTPLINK_* environment overrides
	pub fn apply_env(&mut self) -> FtpResult<()> {
		self.apply_vars(|key| std::env::var(key).ok())
	}

	fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> FtpResult<()> {
		if let Some(host) = var("FTPLINK_HOST") {
			self.host = host;
		}
		if let Some(port) = var("FTPLINK_PORT") {
			self.port = port.parse().map_err(|_| FtpError::Config {
				message: format!("FTPLINK_PORT is not a port number: {}", port),
			})?;
		}
		if let Some(mode) = var("FTPLINK_DATA_MODE") {
			self.data_mode = match mode.to_ascii_lowercase().as_str() {
				"active" => DataMode::Active,
				"passive" => DataMode::Passive,
				other => {
					return Err(FtpError::Config { message: format!("unknown FTPLINK_DATA_MODE: {}", other) })
				}
			};
		}
		if let Some(level) = var("FTPLINK_LOG") {
			self.log_level = level;
		}
		Ok(())
	}

	pub fn validate(&self) -> FtpResult<()> {
		if self.host.trim().is_empty() {
			return Err(FtpError::Config { message: "host must not be empty".to_string() });
		}
		if self.port == 0 {
			return Err(FtpError::Config { message: "port must not be 0".to_string() });
		}
		if self.read_buffer_size == 0 {
			return Err(FtpError::Config { message: "readBufferSize must be positive".to_string() });
		}
		if self.active.port_start > self.active.port_end {
			return Err(FtpError::Config {
				message: format!(
					"active port range is inverted: {}..{}",
					self.active.port_start, self.active.port_end
				),
			});
		}
		if let Some(addr) = &self.active.bind_address {
			addr.parse::<IpAddr>().map_err(|_| FtpError::Config {
				message: format!("active.bindAddress is not an IP address: {}", addr),
			})?;
		}
		Ok(())
	}

	pub fn connect_timeout(&self) -> Duration {
		Duration::from_secs(self.connect_timeout_secs)
	}

	pub fn command_timeout(&self) -> Option<Duration> {
		match self.command_timeout_secs {
			0 => None,
			secs => Some(Duration::from_secs(secs)),
		}
	}

	pub fn data_timeout(&self) -> Duration {
		Duration::from_secs(self.data_timeout_secs)
	}

	/// Data-channel settings handed to the session state
	pub fn transfer_settings(&self) -> TransferSettings {
		TransferSettings {
			data_timeout: self.data_timeout(),
			active_ports: self.active.port_start..=self.active.port_end,
			active_bind: self.active.bind_address.as_deref().and_then(|a| a.parse().ok()),
			passive_use_control_host: self.passive_use_control_host,
			read_buffer_size: self.read_buffer_size,
		}
	}
}

// ============================================================================
// NESTED CONFIGURATION STRUCTS
// ============================================================================

/// Active mode (PORT) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActiveConfig {
	/// First candidate local port (0 lets the OS choose)
	pub port_start: u16,

	/// Last candidate local port
	pub port_end: u16,

	/// Address announced with PORT (defaults to the control socket's local address)
	pub bind_address: Option<String>,
}

impl Default for ActiveConfig {
	fn default() -> Self {
		ActiveConfig { port_start: 50000, port_end: 50099, bind_address: None }
	}
}

// ============================================================================
// ENUMERATIONS
// ============================================================================

/// How file commands pick the TYPE to send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransferTypePolicy {
	/// Decide from the file extension
	#[default]
	Auto,
	Ascii,
	Binary,
}

impl TransferTypePolicy {
	pub fn resolve(self, path: Option<&str>) -> TransferType {
		match self {
			TransferTypePolicy::Auto => decide_transfer_type(path),
			TransferTypePolicy::Ascii => TransferType::Ascii,
			TransferTypePolicy::Binary => TransferType::Image,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::io::Write;

	#[test]
	fn test_config_default() {
		let config = ClientConfig::default();
		assert_eq!(config.port, 21);
		assert_eq!(config.data_mode, DataMode::Passive);
		assert_eq!(config.command_timeout(), Some(Duration::from_secs(300)));
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_load_toml() {
		let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
		writeln!(
			file,
			"host = \"ftp.example.org\"\nport = 2121\ndataMode = \"active\"\ncommandTimeoutSecs = 0\n\n[active]\nportStart = 0\nportEnd = 0"
		)
		.unwrap();

		let config = ClientConfig::load(file.path()).unwrap();
		assert_eq!(config.host, "ftp.example.org");
		assert_eq!(config.port, 2121);
		assert_eq!(config.data_mode, DataMode::Active);
		assert_eq!(config.command_timeout(), None);
		assert_eq!(config.active.port_start, 0);
		// Unspecified fields keep their defaults
		assert_eq!(config.data_timeout_secs, 30);
	}

	#[test]
	fn test_load_json() {
		let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
		write!(file, r#"{{"host": "10.0.0.5", "transferType": "binary"}}"#).unwrap();

		let config = ClientConfig::load(file.path()).unwrap();
		assert_eq!(config.host, "10.0.0.5");
		assert_eq!(config.transfer_type, TransferTypePolicy::Binary);
	}

	#[test]
	fn test_load_invalid_file() {
		let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
		writeln!(file, "port = \"not a number\"").unwrap();
		assert!(matches!(ClientConfig::load(file.path()), Err(FtpError::Config { .. })));
	}

	#[test]
	fn test_env_overrides() {
		let vars: HashMap<&str, &str> =
			[("FTPLINK_HOST", "mirror.local"), ("FTPLINK_PORT", "990"), ("FTPLINK_DATA_MODE", "Active")]
				.into_iter()
				.collect();
		let mut config = ClientConfig::default();
		config.apply_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
		assert_eq!(config.host, "mirror.local");
		assert_eq!(config.port, 990);
		assert_eq!(config.data_mode, DataMode::Active);

		let res = config.apply_vars(|k| (k == "FTPLINK_PORT").then(|| "ninety".to_string()));
		assert!(res.is_err());
	}

	#[test]
	fn test_validate_rejects_bad_values() {
		let mut config = ClientConfig::new("", 21);
		assert!(config.validate().is_err());

		config.host = "h".to_string();
		config.active.port_start = 100;
		config.active.port_end = 10;
		assert!(config.validate().is_err());

		config.active.port_end = 200;
		config.active.bind_address = Some("not-an-ip".to_string());
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_transfer_settings() {
		let mut config = ClientConfig::default();
		config.active.bind_address = Some("192.168.1.10".to_string());
		let settings = config.transfer_settings();
		assert_eq!(settings.active_ports, 50000..=50099);
		assert_eq!(settings.active_bind, Some("192.168.1.10".parse().unwrap()));
	}

	#[test]
	fn test_policy_resolve() {
		assert_eq!(TransferTypePolicy::Binary.resolve(Some("a.txt")), TransferType::Image);
		assert_eq!(TransferTypePolicy::Auto.resolve(Some("a.txt")), TransferType::Ascii);
		assert_eq!(TransferTypePolicy::Auto.resolve(Some("a.zip")), TransferType::Image);
	}
}

// vim: ts=4
