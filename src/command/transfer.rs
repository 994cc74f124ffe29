//! Commands that move bytes over a data connection
//!
//! Both directions follow the same rendezvous: the command is sent and the
//! data connection is established in the background; 150/125 hands the socket
//! to `handle`, which moves the payload; 226 completes the command. A data
//! side failure keeps the command listening until the server's final reply so
//! the control stream stays in step.

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::{Command, CommandContext};
use crate::data::{read_to_end, write_all, DataEndpoint, DataHandoff};
use crate::error::{FtpError, FtpResult};
use crate::reply::Reply;
use crate::result::CommandResult;
use crate::state::SessionState;

/// Data connection bookkeeping shared by downloads and uploads
#[derive(Debug, Default)]
struct DataPhase {
	handoff: Option<DataHandoff>,
	line: Option<String>,
	transferred: bool,
	failed: bool,
}

impl DataPhase {
	async fn start(&mut self, ctx: &mut CommandContext<'_>, line: String) -> FtpResult<()> {
		let endpoint = DataEndpoint::take_from(ctx.state)?;
		self.handoff = Some(DataHandoff::spawn(endpoint, ctx.state.settings.data_timeout));
		ctx.send(&line).await?;
		self.line = Some(line);
		Ok(())
	}

	async fn stream(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<TcpStream> {
		match self.handoff.as_mut() {
			Some(handoff) => handoff.wait(ctx.quit_token()).await,
			None => Err(FtpError::data("no data connection pending")),
		}
	}

	/// Record a data-side error; true when the command must end right away
	fn record(&mut self, error: FtpError) -> bool {
		if matches!(error, FtpError::Cancelled) {
			return true;
		}
		warn!("Data transfer for '{}' failed: {}", self.line.as_deref().unwrap_or("?"), error);
		self.failed = true;
		false
	}

	fn completed(&self) -> bool {
		self.transferred && !self.failed
	}

	fn abort(&mut self) {
		if let Some(handoff) = self.handoff.take() {
			handoff.abort();
		}
	}
}

// ============================================================================
// DOWNLOAD
// ============================================================================

/// What a [`Download`] retrieves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
	/// RETR
	Retrieve,
	/// MLSD when the server advertised MLST, LIST otherwise
	List,
	/// NLST
	NameList,
}

/// Retrieves a file or listing; the result carries the received bytes
#[derive(Debug)]
pub struct Download {
	kind: DownloadKind,
	path: Option<String>,
	phase: DataPhase,
	data: Option<Vec<u8>>,
	executed: bool,
}

impl Download {
	pub fn new(kind: DownloadKind, path: Option<String>) -> Self {
		Download { kind, path, phase: DataPhase::default(), data: None, executed: false }
	}

	pub fn retrieve(path: impl Into<String>) -> Self {
		Download::new(DownloadKind::Retrieve, Some(path.into()))
	}

	pub fn list(path: Option<String>) -> Self {
		Download::new(DownloadKind::List, path)
	}

	pub fn name_list(path: Option<String>) -> Self {
		Download::new(DownloadKind::NameList, path)
	}

	fn line(&self, state: Option<&SessionState>) -> String {
		let verb = match self.kind {
			DownloadKind::Retrieve => "RETR",
			DownloadKind::List if state.map_or(false, |s| s.features.mlst) => "MLSD",
			DownloadKind::List => "LIST",
			DownloadKind::NameList => "NLST",
		};
		match &self.path {
			Some(path) => format!("{} {}", verb, path),
			None => verb.to_string(),
		}
	}
}

#[async_trait]
impl Command for Download {
	fn label(&self) -> String {
		self.phase.line.clone().unwrap_or_else(|| self.line(None))
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		state.is_logged_in()
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		self.executed = true;
		let line = self.line(Some(&*ctx.state));
		self.phase.start(ctx, line).await?;
		Ok(None)
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		match reply.code() {
			125 | 150 => {
				let timeout = ctx.state.settings.data_timeout;
				let buffer_size = ctx.state.settings.read_buffer_size;
				ctx.state.set_data_active(true);
				let outcome = match self.phase.stream(ctx).await {
					Ok(mut stream) => read_to_end(&mut stream, ctx.quit_token(), timeout, buffer_size).await,
					Err(e) => Err(e),
				};
				ctx.state.set_data_active(false);
				match outcome {
					Ok(bytes) => {
						debug!("Received {} bytes for '{}'", bytes.len(), self.label());
						self.data = Some(bytes);
						self.phase.transferred = true;
					}
					Err(e) => {
						if self.phase.record(e) {
							return Some(CommandResult::failed());
						}
					}
				}
				None
			}
			226 if self.phase.completed() => Some(CommandResult::with_data(self.data.take().unwrap_or_default())),
			_ => {
				self.phase.abort();
				Some(CommandResult::failed())
			}
		}
	}

	fn quit_execution(&mut self) {
		self.phase.abort();
	}
}

// ============================================================================
// UPLOAD
// ============================================================================

/// How an [`Upload`] writes the remote file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
	/// STOR: create or replace
	Store,
	/// APPE: append, creating if missing
	Append,
}

/// Sends a payload to a remote file
pub struct Upload {
	kind: UploadKind,
	path: String,
	payload: Vec<u8>,
	phase: DataPhase,
	executed: bool,
}

impl Upload {
	pub fn new(kind: UploadKind, path: impl Into<String>, payload: Vec<u8>) -> Self {
		Upload { kind, path: path.into(), payload, phase: DataPhase::default(), executed: false }
	}

	pub fn store(path: impl Into<String>, payload: Vec<u8>) -> Self {
		Upload::new(UploadKind::Store, path, payload)
	}

	pub fn append(path: impl Into<String>, payload: Vec<u8>) -> Self {
		Upload::new(UploadKind::Append, path, payload)
	}
}

impl std::fmt::Debug for Upload {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Upload")
			.field("kind", &self.kind)
			.field("path", &self.path)
			.field("payload_len", &self.payload.len())
			.field("phase", &self.phase)
			.finish()
	}
}

#[async_trait]
impl Command for Upload {
	fn label(&self) -> String {
		match self.kind {
			UploadKind::Store => format!("STOR {}", self.path),
			UploadKind::Append => format!("APPE {}", self.path),
		}
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		state.is_logged_in()
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		self.executed = true;
		let line = self.label();
		self.phase.start(ctx, line).await?;
		Ok(None)
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		match reply.code() {
			125 | 150 => {
				let timeout = ctx.state.settings.data_timeout;
				ctx.state.set_data_active(true);
				let outcome = match self.phase.stream(ctx).await {
					Ok(mut stream) => write_all(&mut stream, &self.payload, ctx.quit_token(), timeout).await,
					Err(e) => Err(e),
				};
				ctx.state.set_data_active(false);
				match outcome {
					Ok(()) => {
						debug!("Sent {} bytes for '{}'", self.payload.len(), self.label());
						self.phase.transferred = true;
					}
					Err(e) => {
						if self.phase.record(e) {
							return Some(CommandResult::failed());
						}
					}
				}
				None
			}
			226 if self.phase.completed() => Some(CommandResult::succeeded()),
			_ => {
				self.phase.abort();
				Some(CommandResult::failed())
			}
		}
	}

	fn quit_execution(&mut self) {
		self.phase.abort();
	}
}


// vim: ts=4
