//! Error types for ftplink operations

use std::error::Error;
use std::fmt;
use std::io;
use std::time::Duration;

/// Main error type for the FTP client engine
#[derive(Debug)]
pub enum FtpError {
	/// I/O error on the control or data connection
	Io(io::Error),

	/// Control connection could not be established
	ConnectFailed { addr: String, source: io::Error },

	/// Session is not connected (or has been torn down)
	NotConnected,

	/// Command has already been executed and cannot be reused
	AlreadyExecuted { command: String },

	/// A result was already bound to this future
	ResultAlreadySet { command: String },

	/// Operation did not complete in time
	Timeout { what: String, after: Duration },

	/// Execution was quit (session closed or command aborted)
	Cancelled,

	/// Data connection could not be established or used
	DataChannel { message: String },

	/// Malformed or unexpected server reply
	Protocol { message: String },

	/// Invalid argument passed to the API
	InvalidArgument { message: String },

	/// Invalid configuration
	Config { message: String },

	/// Command completed with a failed result
	CommandFailed { command: String },
}

impl fmt::Display for FtpError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FtpError::Io(e) => write!(f, "I/O error: {}", e),
			FtpError::ConnectFailed { addr, source } => {
				write!(f, "Failed to connect to {}: {}", addr, source)
			}
			FtpError::NotConnected => write!(f, "Not connected"),
			FtpError::AlreadyExecuted { command } => {
				write!(f, "Command '{}' was already executed and is not reusable", command)
			}
			FtpError::ResultAlreadySet { command } => {
				write!(f, "Result for '{}' was already set", command)
			}
			FtpError::Timeout { what, after } => {
				write!(f, "Timed out after {:?} waiting for {}", after, what)
			}
			FtpError::Cancelled => write!(f, "Execution cancelled"),
			FtpError::DataChannel { message } => write!(f, "Data channel error: {}", message),
			FtpError::Protocol { message } => write!(f, "Protocol error: {}", message),
			FtpError::InvalidArgument { message } => write!(f, "Invalid argument: {}", message),
			FtpError::Config { message } => write!(f, "Invalid configuration: {}", message),
			FtpError::CommandFailed { command } => write!(f, "Command '{}' failed", command),
		}
	}
}

impl Error for FtpError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			FtpError::Io(e) => Some(e),
			FtpError::ConnectFailed { source, .. } => Some(source),
			_ => None,
		}
	}
}

impl FtpError {
	/// True for errors that leave the control connection unusable
	pub fn is_fatal(&self) -> bool {
		matches!(self, FtpError::Io(_) | FtpError::NotConnected | FtpError::Protocol { .. })
	}

	pub(crate) fn data(message: impl Into<String>) -> Self {
		FtpError::DataChannel { message: message.into() }
	}
}

impl From<io::Error> for FtpError {
	fn from(e: io::Error) -> Self {
		FtpError::Io(e)
	}
}

impl From<toml::de::Error> for FtpError {
	fn from(e: toml::de::Error) -> Self {
		FtpError::Config { message: e.to_string() }
	}
}

impl From<serde_json::Error> for FtpError {
	fn from(e: serde_json::Error) -> Self {
		FtpError::Config { message: e.to_string() }
	}
}

/// Result type used throughout the crate
pub type FtpResult<T> = Result<T, FtpError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_display_messages() {
		let err = FtpError::AlreadyExecuted { command: "RETR a.txt".to_string() };
		assert_eq!(err.to_string(), "Command 'RETR a.txt' was already executed and is not reusable");
		assert_eq!(FtpError::NotConnected.to_string(), "Not connected");
	}

	#[test]
	fn test_io_conversion_is_fatal() {
		let err: FtpError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
		assert!(err.is_fatal());
		assert!(err.source().is_some());
		assert!(!FtpError::Cancelled.is_fatal());
	}
}

// vim: ts=4
