//! FTP client session
//!
//! A `Session` owns one control connection at a time. Commands are queued
//! from any task and executed strictly one after another by the session's
//! dispatcher; each queued command yields a [`CommandFuture`] that resolves
//! once the command has consumed its replies.
//!
//! ```rust,ignore
//! use ftplink::{ClientConfig, Session};
//!
//! let session = Session::new(ClientConfig::new("ftp.example.com", 21));
//! session.connect("anonymous", Some("guest")).await?.wait_data().await?;
//! let listing = session.list(None)?.wait_data().await?;
//! session.quit()?.wait().await;
//! ```

mod dispatcher;

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::command::{
	mode_command, ChainedCommand, Command, DeleteFile, DirectoryAction, DirectoryCommand, Download, FeatureList,
	FileInfo, FileInfoKind, Greeting, Noop, Password, PrintDirectory, Quit, Reinitialize, SetTransferType, System,
	Upload, User, Utf8Option,
};
use crate::config::ClientConfig;
use crate::control::ControlWriter;
use crate::error::{FtpError, FtpResult};
use crate::future::CommandFuture;
use crate::handler::HandlerRegistry;
use crate::queue::{CommandQueue, PendingCommand};
use crate::result::CommandResult;
use crate::state::{AuthPhase, DataMode, SessionState, StateSnapshot};
use crate::util::join_path;

/// Lifecycle of the control connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkStatus {
	/// Never connected
	Idle,
	/// Dialing the control connection
	Opening,
	Open,
	/// Torn down; `connect` may open a new connection
	Closed,
}

pub(crate) struct Link {
	status: LinkStatus,
	/// Bumped for every connection attempt; tasks of older connections compare against it
	generation: u64,
	stop: CancellationToken,
	reader: Option<OwnedReadHalf>,
}

/// State shared between the session handle and its background tasks
pub(crate) struct Shared {
	id: Uuid,
	config: ClientConfig,
	state: tokio::sync::Mutex<SessionState>,
	queue: CommandQueue,
	handlers: HandlerRegistry,
	link: Mutex<Link>,
	data_mode: Mutex<DataMode>,
}

impl Shared {
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	fn link(&self) -> MutexGuard<'_, Link> {
		self.link.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn enqueue(&self, command: Box<dyn Command>) -> FtpResult<CommandFuture> {
		if command.has_executed() && !command.is_reusable() {
			return Err(FtpError::AlreadyExecuted { command: command.label() });
		}

		// Hold the link while pushing so teardown cannot drain in between
		let link = self.link();
		if link.status != LinkStatus::Open {
			return Err(FtpError::NotConnected);
		}
		let pending = PendingCommand::new(command);
		let future = pending.future.clone();
		debug!("Queued '{}' (#{})", future.label(), future.id());
		self.queue.push(pending);
		drop(link);
		Ok(future)
	}

	/// Mark the link closed and stop its tasks; false if it was not live
	fn close_link(&self) -> bool {
		let mut link = self.link();
		link.stop.cancel();
		link.reader = None;
		let was_live = matches!(link.status, LinkStatus::Open | LinkStatus::Opening);
		if was_live {
			link.status = LinkStatus::Closed;
		}
		was_live
	}

	/// Tear the connection down with the state lock already held
	fn shutdown_locked(&self, state: &mut SessionState, reason: &str) {
		if self.close_link() {
			info!("Session {} closed: {}", self.id, reason);
		}
		state.control = None;
		state.data_listener = None;
		state.auth = AuthPhase::Connecting;

		if let Some(inflight) = state.current.take() {
			debug!("Failing in-flight '{}'", inflight.future.label());
			inflight.finish(CommandResult::failed());
		}
		for pending in self.queue.drain() {
			debug!("Failing queued '{}'", pending.future.label());
			pending.future.complete(CommandResult::failed());
		}
	}

	fn is_current(&self, generation: u64) -> bool {
		self.link().generation == generation
	}

	/// Stop everything, fail every outstanding future
	pub async fn teardown(&self, reason: &str) {
		// Wake whoever holds the state lock before waiting for it
		self.link().stop.cancel();
		let mut state = self.state.lock().await;
		self.shutdown_locked(&mut state, reason);
	}

	/// Like `teardown`, but a no-op once a newer connection has replaced `generation`
	pub async fn teardown_link(&self, generation: u64, reason: &str) {
		{
			let link = self.link();
			if link.generation != generation {
				return;
			}
			link.stop.cancel();
		}
		let mut state = self.state.lock().await;
		if self.is_current(generation) {
			self.shutdown_locked(&mut state, reason);
		}
	}
}

/// Handle to one FTP client session
pub struct Session {
	shared: Arc<Shared>,
}

impl Session {
	pub fn new(config: ClientConfig) -> Self {
		Session::with_handlers(config, HandlerRegistry::with_defaults())
	}

	/// Session with a custom set of session-wide reply handlers
	pub fn with_handlers(config: ClientConfig, handlers: HandlerRegistry) -> Self {
		let state = SessionState::new(config.host.clone(), config.port, config.transfer_settings());
		let data_mode = config.data_mode;
		Session {
			shared: Arc::new(Shared {
				id: Uuid::new_v4(),
				config,
				state: tokio::sync::Mutex::new(state),
				queue: CommandQueue::new(),
				handlers,
				link: Mutex::new(Link {
					status: LinkStatus::Idle,
					generation: 0,
					stop: CancellationToken::new(),
					reader: None,
				}),
				data_mode: Mutex::new(data_mode),
			}),
		}
	}

	pub fn id(&self) -> Uuid {
		self.shared.id
	}

	pub fn config(&self) -> &ClientConfig {
		&self.shared.config
	}

	pub fn status(&self) -> LinkStatus {
		self.shared.link().status
	}

	pub fn is_connected(&self) -> bool {
		self.status() == LinkStatus::Open
	}

	/// Commands queued behind the one currently running
	pub fn pending_commands(&self) -> usize {
		self.shared.queue.len()
	}

	// === Lifecycle ===

	/// Log in: greeting (or REIN when already connected), USER, PASS, SYST,
	/// FEAT and PWD as one short-circuiting chain. The result carries the
	/// working directory.
	pub async fn connect(&self, user: &str, password: Option<&str>) -> FtpResult<CommandFuture> {
		let first: Box<dyn Command> = if self.is_connected() {
			Box::new(Reinitialize::new())
		} else {
			self.open().await?;
			Box::new(Greeting::new())
		};
		let chain = ChainedCommand::new(
			vec![
				first,
				Box::new(User::new(user)),
				Box::new(Password::new(password.map(str::to_string))),
				Box::new(System::new()),
				Box::new(FeatureList::new()),
				Box::new(PrintDirectory::new()),
			],
			true,
		);
		self.queue_command(Box::new(chain))
	}

	async fn open(&self) -> FtpResult<()> {
		let generation = {
			let mut link = self.shared.link();
			if matches!(link.status, LinkStatus::Open | LinkStatus::Opening) {
				return Err(FtpError::InvalidArgument { message: "session is already connecting".to_string() });
			}
			link.status = LinkStatus::Opening;
			link.generation += 1;
			link.generation
		};

		let config = &self.shared.config;
		let addr = format!("{}:{}", config.host, config.port);
		info!("Connecting to {}", addr);
		let connect = TcpStream::connect((config.host.as_str(), config.port));
		let stream = match tokio::time::timeout(config.connect_timeout(), connect).await {
			Ok(Ok(stream)) => stream,
			Ok(Err(e)) => {
				self.shared.link().status = LinkStatus::Closed;
				return Err(FtpError::ConnectFailed { addr, source: e });
			}
			Err(_) => {
				self.shared.link().status = LinkStatus::Closed;
				return Err(FtpError::Timeout { what: format!("connection to {}", addr), after: config.connect_timeout() });
			}
		};
		if let Err(e) = stream.set_nodelay(true) {
			debug!("TCP_NODELAY not set: {}", e);
		}
		let local_addr = stream.local_addr().ok();
		let (reader, writer) = stream.into_split();

		{
			let mut state = self.shared.state.lock().await;
			state.reset();
			state.local_addr = local_addr;
			state.control = Some(ControlWriter::new(writer));
		}

		let stop = CancellationToken::new();
		{
			let mut link = self.shared.link();
			link.status = LinkStatus::Open;
			link.stop = stop.clone();
			link.reader = Some(reader);
		}
		tokio::spawn(dispatcher::run(self.shared.clone(), stop, generation));
		Ok(())
	}

	/// Send QUIT; the connection is closed on 221
	pub fn quit(&self) -> FtpResult<CommandFuture> {
		self.queue_command(Box::new(Quit::new()))
	}

	/// Drop the connection now; pending and queued commands fail
	pub async fn close(&self) {
		self.shared.teardown("closed by client").await;
	}

	// === Queueing ===

	/// Queue a command; fails at once when the session is not connected
	pub fn queue_command(&self, command: Box<dyn Command>) -> FtpResult<CommandFuture> {
		self.shared.enqueue(command)
	}

	/// Queue `command` behind TYPE and a fresh mode command, as one
	/// short-circuiting chain. `path` drives the ASCII/binary decision.
	pub fn queue_file_command(&self, command: Box<dyn Command>, path: Option<&str>) -> FtpResult<CommandFuture> {
		let kind = self.shared.config.transfer_type.resolve(path);
		let chain = ChainedCommand::new(
			vec![Box::new(SetTransferType::new(kind)), mode_command(self.data_mode()), command],
			true,
		);
		self.queue_command(Box::new(chain))
	}

	pub fn data_mode(&self) -> DataMode {
		*self.shared.data_mode.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Mode used by file commands queued from now on
	pub fn set_data_mode(&self, mode: DataMode) {
		*self.shared.data_mode.lock().unwrap_or_else(PoisonError::into_inner) = mode;
	}

	pub fn set_active_mode(&self) {
		self.set_data_mode(DataMode::Active);
	}

	pub fn set_passive_mode(&self) {
		self.set_data_mode(DataMode::Passive);
	}

	// === Files ===

	pub fn retrieve_file(&self, path: &str) -> FtpResult<CommandFuture> {
		self.queue_file_command(Box::new(Download::retrieve(path)), Some(path))
	}

	pub fn store_file(&self, path: &str, data: Vec<u8>) -> FtpResult<CommandFuture> {
		self.queue_file_command(Box::new(Upload::store(path, data)), Some(path))
	}

	pub fn append_file(&self, path: &str, data: Vec<u8>) -> FtpResult<CommandFuture> {
		self.queue_file_command(Box::new(Upload::append(path, data)), Some(path))
	}

	/// Directory listing (MLSD when supported, LIST otherwise)
	pub fn list(&self, path: Option<&str>) -> FtpResult<CommandFuture> {
		self.queue_file_command(Box::new(Download::list(path.map(str::to_string))), None)
	}

	/// Bare file names (NLST)
	pub fn name_list(&self, path: Option<&str>) -> FtpResult<CommandFuture> {
		self.queue_file_command(Box::new(Download::name_list(path.map(str::to_string))), None)
	}

	pub fn delete_file(&self, path: &str) -> FtpResult<CommandFuture> {
		self.queue_command(Box::new(DeleteFile::new(path)))
	}

	pub fn file_size(&self, path: &str) -> FtpResult<CommandFuture> {
		self.queue_command(Box::new(FileInfo::new(FileInfoKind::Size, path)))
	}

	pub fn modification_time(&self, path: &str) -> FtpResult<CommandFuture> {
		self.queue_command(Box::new(FileInfo::new(FileInfoKind::ModificationTime, path)))
	}

	// === Directories ===

	pub fn working_directory(&self) -> FtpResult<CommandFuture> {
		self.queue_command(Box::new(PrintDirectory::new()))
	}

	pub fn change_directory(&self, path: &str) -> FtpResult<CommandFuture> {
		self.directory_then_pwd(DirectoryAction::Change(path.to_string()))
	}

	pub fn change_to_parent(&self) -> FtpResult<CommandFuture> {
		self.directory_then_pwd(DirectoryAction::Parent)
	}

	pub fn make_directory(&self, path: &str) -> FtpResult<CommandFuture> {
		self.directory_then_pwd(DirectoryAction::Make(path.to_string()))
	}

	pub fn remove_directory(&self, path: &str) -> FtpResult<CommandFuture> {
		self.directory_then_pwd(DirectoryAction::Remove(path.to_string()))
	}

	/// The PWD runs even if the action fails so the cached directory stays right
	fn directory_then_pwd(&self, action: DirectoryAction) -> FtpResult<CommandFuture> {
		let chain = ChainedCommand::new(
			vec![Box::new(DirectoryCommand::new(action)), Box::new(PrintDirectory::new())],
			false,
		);
		self.queue_command(Box::new(chain))
	}

	// === Miscellaneous ===

	pub fn noop(&self) -> FtpResult<CommandFuture> {
		self.queue_command(Box::new(Noop::new()))
	}

	/// Ask the server for UTF-8 paths (OPTS UTF8 ON)
	pub fn enable_utf8(&self) -> FtpResult<CommandFuture> {
		self.queue_command(Box::new(Utf8Option::new()))
	}

	/// Copy of the protocol state; waits for the running command to yield the state
	pub async fn snapshot(&self) -> StateSnapshot {
		self.shared.state.lock().await.snapshot()
	}

	/// `path` resolved against the last known working directory
	pub async fn resolve_path(&self, path: &str) -> String {
		let state = self.shared.state.lock().await;
		join_path(&state.working_directory, path)
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		// Background tasks observe the token, fail outstanding futures and exit
		self.shared.link().stop.cancel();
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.shared.id)
			.field("host", &self.shared.config.host)
			.field("port", &self.shared.config.port)
			.field("status", &self.status())
			.finish()
	}
}


// vim: ts=4
