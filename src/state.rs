//! Per-session protocol state
//!
//! `SessionState` is owned by a session and only touched by whoever holds
//! the session's state lock: the dispatcher while a command executes, or the
//! reply reader while a command handles a reply. Commands receive it through
//! [`CommandContext`](crate::command::CommandContext).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::control::ControlWriter;
use crate::future::CommandFuture;
use crate::queue::InFlight;

// ============================================================================
// ENUMERATIONS
// ============================================================================

/// Login progress on the control connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AuthPhase {
	/// Waiting for the server greeting
	#[default]
	Connecting,
	AwaitingUser,
	AwaitingPassword,
	LoggedIn,
}

/// Who opens the data connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DataMode {
	/// Client dials the address announced by PASV/EPSV
	#[default]
	Passive,
	/// Client listens and announces its address with PORT
	Active,
}

/// Representation type negotiated with TYPE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransferType {
	#[default]
	Ascii,
	Image,
}

impl TransferType {
	/// Type character sent with TYPE
	pub fn code(self) -> char {
		match self {
			TransferType::Ascii => 'A',
			TransferType::Image => 'I',
		}
	}
}

// ============================================================================
// FEATURES
// ============================================================================

/// Server extensions advertised by FEAT
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
	pub epsv: bool,
	pub mdtm: bool,
	pub mlst: bool,
	pub size: bool,
	pub utf8: bool,
	/// Facts listed after MLST, e.g. `type*`, `size*`
	pub mlst_facts: Vec<String>,
	/// Every advertised feature line, trimmed
	pub raw: Vec<String>,
}

impl Features {
	/// Parse the content of a 211 FEAT reply.
	///
	/// The first and last lines are the reply's header and trailer; each line
	/// between them names one feature, optionally followed by parameters.
	pub fn parse(content: &str) -> Self {
		let mut features = Features::default();
		let lines: Vec<&str> = content.split('\n').collect();
		if lines.len() < 3 {
			return features;
		}

		for line in &lines[1..lines.len() - 1] {
			let line = line.trim();
			if line.is_empty() {
				continue;
			}
			features.raw.push(line.to_string());

			let (name, params) = match line.split_once(' ') {
				Some((name, params)) => (name, params.trim()),
				None => (line, ""),
			};
			match name.to_ascii_uppercase().as_str() {
				"EPSV" => features.epsv = true,
				"MDTM" => features.mdtm = true,
				"SIZE" => features.size = true,
				"UTF8" => features.utf8 = true,
				"MLST" => {
					features.mlst = true;
					features.mlst_facts = params
						.split(';')
						.map(str::trim)
						.filter(|f| !f.is_empty())
						.map(str::to_string)
						.collect();
				}
				_ => {}
			}
		}
		features
	}
}

// ============================================================================
// TRANSFER SETTINGS
// ============================================================================

/// Data-channel knobs copied from the client configuration
#[derive(Debug, Clone)]
pub struct TransferSettings {
	/// Bound on data connection establishment and on each read/write
	pub data_timeout: Duration,
	/// Candidate local ports for active mode (`0..=0` lets the OS pick)
	pub active_ports: RangeInclusive<u16>,
	/// Address announced with PORT instead of the control socket's local address
	pub active_bind: Option<IpAddr>,
	/// Dial the control host instead of the address in a PASV reply
	pub passive_use_control_host: bool,
	pub read_buffer_size: usize,
}

impl Default for TransferSettings {
	fn default() -> Self {
		TransferSettings {
			data_timeout: Duration::from_secs(30),
			active_ports: 50000..=50099,
			active_bind: None,
			passive_use_control_host: false,
			read_buffer_size: 4096,
		}
	}
}

// ============================================================================
// SESSION STATE
// ============================================================================

/// Mutable per-connection protocol state
pub struct SessionState {
	pub host: String,
	pub port: u16,
	/// Local address of the control socket
	pub local_addr: Option<SocketAddr>,
	pub welcome_message: String,
	pub system: String,
	pub auth: AuthPhase,
	/// Data mode negotiated by the last successful mode command
	pub mode: DataMode,
	pub data_host: String,
	pub data_port: u16,
	pub working_directory: String,
	pub transfer_type: TransferType,
	pub features: Features,
	pub utf8_enabled: bool,
	pub settings: TransferSettings,

	pub(crate) data_listener: Option<TcpListener>,
	pub(crate) control: Option<ControlWriter>,
	pub(crate) current: Option<InFlight>,
	/// True while a data connection is moving bytes; pauses the command timeout
	pub(crate) data_active: watch::Sender<bool>,
}

impl SessionState {
	pub fn new(host: impl Into<String>, port: u16, settings: TransferSettings) -> Self {
		SessionState {
			host: host.into(),
			port,
			local_addr: None,
			welcome_message: String::new(),
			system: String::new(),
			auth: AuthPhase::Connecting,
			mode: DataMode::Passive,
			data_host: String::new(),
			data_port: 0,
			working_directory: String::new(),
			transfer_type: TransferType::default(),
			features: Features::default(),
			utf8_enabled: false,
			settings,
			data_listener: None,
			control: None,
			current: None,
			data_active: watch::Sender::new(false),
		}
	}

	/// Return protocol fields to their defaults after (re)initialization.
	///
	/// Connection identity (host, port, local address) and the control writer
	/// are kept.
	pub fn reset(&mut self) {
		self.welcome_message.clear();
		self.system.clear();
		self.auth = AuthPhase::Connecting;
		self.mode = DataMode::Passive;
		self.data_host.clear();
		self.data_port = 0;
		self.data_listener = None;
		self.working_directory.clear();
		self.transfer_type = TransferType::default();
		self.features = Features::default();
		self.utf8_enabled = false;
		self.set_data_active(false);
	}

	pub(crate) fn set_data_active(&self, active: bool) {
		self.data_active.send_replace(active);
	}

	pub fn is_logged_in(&self) -> bool {
		self.auth == AuthPhase::LoggedIn
	}

	/// Future of the command currently awaiting replies, if any
	pub fn current_future(&self) -> Option<&CommandFuture> {
		self.current.as_ref().map(|c| &c.future)
	}

	pub fn snapshot(&self) -> StateSnapshot {
		StateSnapshot {
			host: self.host.clone(),
			port: self.port,
			auth: self.auth,
			mode: self.mode,
			working_directory: self.working_directory.clone(),
			transfer_type: self.transfer_type,
			features: self.features.clone(),
			welcome_message: self.welcome_message.clone(),
			system: self.system.clone(),
			utf8_enabled: self.utf8_enabled,
		}
	}
}

impl fmt::Debug for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionState")
			.field("host", &self.host)
			.field("port", &self.port)
			.field("auth", &self.auth)
			.field("mode", &self.mode)
			.field("data_host", &self.data_host)
			.field("data_port", &self.data_port)
			.field("working_directory", &self.working_directory)
			.field("transfer_type", &self.transfer_type)
			.field("features", &self.features)
			.field("current", &self.current_future().map(|f| f.label().to_string()))
			.finish_non_exhaustive()
	}
}

/// Serializable view of the session state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
	pub host: String,
	pub port: u16,
	pub auth: AuthPhase,
	pub mode: DataMode,
	pub working_directory: String,
	pub transfer_type: TransferType,
	pub features: Features,
	pub welcome_message: String,
	pub system: String,
	pub utf8_enabled: bool,
}


// vim: ts=4
