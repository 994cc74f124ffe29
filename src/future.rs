//! Single-assignment result handle
//!
//! A `CommandFuture` is returned when a command is queued. The dispatcher
//! binds it as the session's current future while the command runs, and the
//! command's result is assigned exactly once. Any number of clones may wait on
//! it concurrently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{FtpError, FtpResult};
use crate::result::CommandResult;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

struct Slot {
	id: u64,
	label: String,
	tx: watch::Sender<Option<CommandResult>>,
}

/// Awaitable handle to a queued command's result
#[derive(Clone)]
pub struct CommandFuture {
	slot: Arc<Slot>,
}

impl CommandFuture {
	pub fn new(label: impl Into<String>) -> Self {
		let (tx, _rx) = watch::channel(None);
		CommandFuture {
			slot: Arc::new(Slot { id: NEXT_ID.fetch_add(1, Ordering::Relaxed), label: label.into(), tx }),
		}
	}

	/// Process-unique identifier
	pub fn id(&self) -> u64 {
		self.slot.id
	}

	/// Label of the command this future belongs to
	pub fn label(&self) -> &str {
		&self.slot.label
	}

	/// Bind the result. Fails if a result was already bound; the first
	/// result is never overwritten.
	pub fn set_result(&self, result: CommandResult) -> FtpResult<()> {
		let stored = self.slot.tx.send_if_modified(move |slot| {
			if slot.is_some() {
				return false;
			}
			*slot = Some(result);
			true
		});
		if stored {
			Ok(())
		} else {
			Err(FtpError::ResultAlreadySet { command: self.slot.label.clone() })
		}
	}

	/// Bind the result unless another party got there first
	pub(crate) fn complete(&self, result: CommandResult) {
		if let Err(e) = self.set_result(result) {
			debug!("Ignoring late result: {}", e);
		}
	}

	pub fn is_done(&self) -> bool {
		self.slot.tx.borrow().is_some()
	}

	pub fn try_result(&self) -> Option<CommandResult> {
		self.slot.tx.borrow().clone()
	}

	/// Wait until a result is bound
	pub async fn wait(&self) -> CommandResult {
		let mut rx = self.slot.tx.subscribe();
		let result = match rx.wait_for(Option::is_some).await {
			Ok(value) => value.clone().unwrap_or_else(CommandResult::failed),
			// The sender lives in `self`, so the channel cannot close here
			Err(_) => CommandResult::failed(),
		};
		result
	}

	pub async fn wait_timeout(&self, after: Duration) -> FtpResult<CommandResult> {
		tokio::time::timeout(after, self.wait())
			.await
			.map_err(|_| FtpError::Timeout { what: self.slot.label.clone(), after })
	}

	/// Wait and return the payload, treating failure as an error
	pub async fn wait_data(&self) -> FtpResult<Vec<u8>> {
		let result = self.wait().await;
		if !result.is_success() {
			return Err(FtpError::CommandFailed { command: self.slot.label.clone() });
		}
		Ok(result.into_data().unwrap_or_default())
	}
}

impl std::fmt::Debug for CommandFuture {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CommandFuture")
			.field("id", &self.slot.id)
			.field("label", &self.slot.label)
			.field("result", &*self.slot.tx.borrow())
			.finish()
	}
}


// vim: ts=4
