//! Command outcome value

/// Outcome of a command: success flag plus optional payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
	success: bool,
	data: Option<Vec<u8>>,
}

impl CommandResult {
	pub fn new(success: bool, data: Option<Vec<u8>>) -> Self {
		CommandResult { success, data }
	}

	pub fn succeeded() -> Self {
		CommandResult { success: true, data: None }
	}

	pub fn failed() -> Self {
		CommandResult { success: false, data: None }
	}

	/// Successful result carrying a payload
	pub fn with_data(data: impl Into<Vec<u8>>) -> Self {
		CommandResult { success: true, data: Some(data.into()) }
	}

	pub fn from_success(success: bool) -> Self {
		CommandResult { success, data: None }
	}

	pub fn is_success(&self) -> bool {
		self.success
	}

	pub fn data(&self) -> Option<&[u8]> {
		self.data.as_deref()
	}

	pub fn into_data(self) -> Option<Vec<u8>> {
		self.data
	}

	/// Payload decoded as UTF-8 (lossy)
	pub fn text(&self) -> Option<String> {
		self.data.as_ref().map(|d| String::from_utf8_lossy(d).into_owned())
	}

	/// Fold `next` into this result: success only if both succeeded, and the
	/// later payload replaces the earlier one when present.
	pub fn merge(self, next: CommandResult) -> CommandResult {
		CommandResult { success: self.success && next.success, data: next.data.or(self.data) }
	}
}

impl Default for CommandResult {
	fn default() -> Self {
		CommandResult::succeeded()
	}
}


// vim: ts=4
