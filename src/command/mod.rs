//! Command abstraction
//!
//! A command writes zero or more lines on the control connection when it is
//! executed, then consumes the replies routed to it until it produces a
//! [`CommandResult`]. The dispatcher runs one command at a time; replies that
//! arrive while it is current are handed to [`Command::handle`].

mod chained;
mod mode;
mod text;
mod transfer;

pub use chained::ChainedCommand;
pub use mode::{format_port, mode_command, parse_epsv, parse_pasv, ActiveMode, PassiveMode};
pub use text::{
	DeleteFile, DirectoryAction, DirectoryCommand, FeatureList, FileInfo, FileInfoKind, Greeting, Noop, Password,
	PrintDirectory, Quit, RawCommand, Reinitialize, SetTransferType, System, User, Utf8Option,
};
pub use transfer::{Download, DownloadKind, Upload, UploadKind};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{FtpError, FtpResult};
use crate::reply::Reply;
use crate::result::CommandResult;
use crate::state::SessionState;

/// Unit of work on the control connection
#[async_trait]
pub trait Command: Send {
	/// Short description used in logs and by [`CommandFuture::label`](crate::future::CommandFuture::label)
	fn label(&self) -> String;

	/// Whether the command may be executed more than once
	fn is_reusable(&self) -> bool {
		false
	}

	/// Whether `execute` has already run
	fn has_executed(&self) -> bool {
		false
	}

	/// Whether the command may run in the current protocol state
	fn is_valid_context(&self, _state: &SessionState) -> bool {
		true
	}

	/// Send the command.
	///
	/// `Ok(None)` means replies are expected; `Ok(Some(result))` completes the
	/// command without waiting for a reply.
	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>>;

	/// Consume a reply. Returning `Some` completes the command.
	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult>;

	/// Release anything the command is blocked on (pending data connections)
	fn quit_execution(&mut self) {}
}

/// What a command sees while executing or handling a reply
pub struct CommandContext<'a> {
	pub state: &'a mut SessionState,
	quit: CancellationToken,
	close_requested: bool,
}

impl<'a> CommandContext<'a> {
	pub fn new(state: &'a mut SessionState, quit: CancellationToken) -> Self {
		CommandContext { state, quit, close_requested: false }
	}

	/// Write one command line (CRLF appended) on the control connection
	pub async fn send(&mut self, line: &str) -> FtpResult<()> {
		match self.state.control.as_mut() {
			Some(control) => control.send_line(line, &self.quit).await,
			None => Err(FtpError::NotConnected),
		}
	}

	/// Cancelled when the session closes or the command is abandoned
	pub fn quit_token(&self) -> &CancellationToken {
		&self.quit
	}

	pub fn is_quitting(&self) -> bool {
		self.quit.is_cancelled()
	}

	/// Ask the session to tear the connection down once this call returns
	pub fn request_close(&mut self) {
		self.close_requested = true;
	}

	pub fn close_requested(&self) -> bool {
		self.close_requested
	}
}


// vim: ts=4
