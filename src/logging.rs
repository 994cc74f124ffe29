//! Logging setup and re-exports

pub use tracing::{debug, error, info, trace, warn};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; `default_level` is used when it is unset or
/// unparsable. Output goes to stderr so that command output on stdout stays
/// clean.
pub fn init_tracing(default_level: &str) {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
		)
		.with_writer(std::io::stderr)
		.try_init();
}

/// Mask the argument of credentials before a command line is logged
pub fn redact(line: &str) -> String {
	let upper = line.get(..5).map(|s| s.to_ascii_uppercase());
	match upper.as_deref() {
		Some("PASS ") => "PASS ****".to_string(),
		_ => line.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_redact_password() {
		assert_eq!(redact("PASS hunter2"), "PASS ****");
		assert_eq!(redact("pass hunter2"), "PASS ****");
		assert_eq!(redact("USER bob"), "USER bob");
		assert_eq!(redact("PWD"), "PWD");
	}
}

// vim: ts=4
