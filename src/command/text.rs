//! Single-line control commands
//!
//! Each command sends one line and completes on the first non-preliminary
//! reply, updating the session state on success.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Command, CommandContext};
use crate::error::FtpResult;
use crate::reply::Reply;
use crate::result::CommandResult;
use crate::state::{AuthPhase, Features, SessionState, TransferType};
use crate::util::parse_quoted_path;

async fn send_once(executed: &mut bool, ctx: &mut CommandContext<'_>, line: &str) -> FtpResult<Option<CommandResult>> {
	*executed = true;
	ctx.send(line).await?;
	Ok(None)
}

fn past_greeting(state: &SessionState) -> bool {
	state.auth != AuthPhase::Connecting
}

// ============================================================================
// CONNECTION LIFECYCLE
// ============================================================================

/// Waits for the 220 greeting of a fresh control connection
#[derive(Debug, Default)]
pub struct Greeting {
	executed: bool,
}

impl Greeting {
	pub fn new() -> Self {
		Greeting::default()
	}
}

#[async_trait]
impl Command for Greeting {
	fn label(&self) -> String {
		"greeting".to_string()
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		state.auth == AuthPhase::Connecting
	}

	async fn execute(&mut self, _ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		self.executed = true;
		Ok(None)
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		match reply.code() {
			120 => {
				debug!("Server not ready yet: {}", reply.content());
				None
			}
			220 => {
				ctx.state.reset();
				ctx.state.welcome_message = reply.content().to_string();
				ctx.state.auth = AuthPhase::AwaitingUser;
				info!("Connected to {}:{}", ctx.state.host, ctx.state.port);
				Some(CommandResult::with_data(reply.content()))
			}
			_ => Some(CommandResult::failed()),
		}
	}
}

/// REIN: flush the login and return to the greeting state
#[derive(Debug, Default)]
pub struct Reinitialize {
	executed: bool,
}

impl Reinitialize {
	pub fn new() -> Self {
		Reinitialize::default()
	}
}

#[async_trait]
impl Command for Reinitialize {
	fn label(&self) -> String {
		"REIN".to_string()
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		send_once(&mut self.executed, ctx, "REIN").await
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		match reply.code() {
			120 => None,
			220 => {
				ctx.state.reset();
				ctx.state.welcome_message = reply.content().to_string();
				ctx.state.auth = AuthPhase::AwaitingUser;
				Some(CommandResult::succeeded())
			}
			_ => Some(CommandResult::failed()),
		}
	}
}

/// QUIT: on 221 the session closes the connection
#[derive(Debug, Default)]
pub struct Quit {
	executed: bool,
}

impl Quit {
	pub fn new() -> Self {
		Quit::default()
	}
}

#[async_trait]
impl Command for Quit {
	fn label(&self) -> String {
		"QUIT".to_string()
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		send_once(&mut self.executed, ctx, "QUIT").await
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		if reply.code() == 221 {
			ctx.request_close();
			Some(CommandResult::succeeded())
		} else {
			Some(CommandResult::failed())
		}
	}
}

// ============================================================================
// LOGIN
// ============================================================================

/// USER
#[derive(Debug)]
pub struct User {
	name: String,
	executed: bool,
}

impl User {
	pub fn new(name: impl Into<String>) -> Self {
		User { name: name.into(), executed: false }
	}
}

#[async_trait]
impl Command for User {
	fn label(&self) -> String {
		format!("USER {}", self.name)
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		state.auth == AuthPhase::AwaitingUser
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		let line = format!("USER {}", self.name);
		send_once(&mut self.executed, ctx, &line).await
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		match reply.code() {
			331 => {
				ctx.state.auth = AuthPhase::AwaitingPassword;
				Some(CommandResult::succeeded())
			}
			230 => {
				ctx.state.auth = AuthPhase::LoggedIn;
				info!("Logged in as {}", self.name);
				Some(CommandResult::succeeded())
			}
			_ => {
				warn!("USER rejected: {}", reply);
				Some(CommandResult::failed())
			}
		}
	}
}

/// PASS; completes immediately when USER alone was enough
pub struct Password {
	password: Option<String>,
	executed: bool,
}

impl Password {
	pub fn new(password: Option<String>) -> Self {
		Password { password, executed: false }
	}
}

impl std::fmt::Debug for Password {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Password").field("executed", &self.executed).finish_non_exhaustive()
	}
}

#[async_trait]
impl Command for Password {
	fn label(&self) -> String {
		"PASS".to_string()
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		matches!(state.auth, AuthPhase::AwaitingPassword | AuthPhase::LoggedIn)
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		self.executed = true;
		if ctx.state.auth == AuthPhase::LoggedIn {
			return Ok(Some(CommandResult::succeeded()));
		}
		match &self.password {
			Some(password) => {
				ctx.send(&format!("PASS {}", password)).await?;
				Ok(None)
			}
			None => {
				warn!("Server requires a password but none was given");
				ctx.state.auth = AuthPhase::AwaitingUser;
				Ok(Some(CommandResult::failed()))
			}
		}
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		match reply.code() {
			230 | 202 => {
				ctx.state.auth = AuthPhase::LoggedIn;
				info!("Logged in");
				Some(CommandResult::succeeded())
			}
			_ => {
				warn!("PASS rejected: {}", reply);
				ctx.state.auth = AuthPhase::AwaitingUser;
				Some(CommandResult::failed())
			}
		}
	}
}

// ============================================================================
// SERVER INFORMATION
// ============================================================================

/// SYST
#[derive(Debug, Default)]
pub struct System {
	executed: bool,
}

impl System {
	pub fn new() -> Self {
		System::default()
	}
}

#[async_trait]
impl Command for System {
	fn label(&self) -> String {
		"SYST".to_string()
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		past_greeting(state)
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		send_once(&mut self.executed, ctx, "SYST").await
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		if reply.code() != 215 {
			return Some(CommandResult::failed());
		}
		ctx.state.system = reply.content().to_string();
		Some(CommandResult::with_data(reply.content()))
	}
}

/// FEAT; a server without FEAT (502) simply has no extensions
#[derive(Debug, Default)]
pub struct FeatureList {
	executed: bool,
}

impl FeatureList {
	pub fn new() -> Self {
		FeatureList::default()
	}
}

#[async_trait]
impl Command for FeatureList {
	fn label(&self) -> String {
		"FEAT".to_string()
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		past_greeting(state)
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		send_once(&mut self.executed, ctx, "FEAT").await
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		match reply.code() {
			211 => {
				ctx.state.features = Features::parse(reply.content());
				debug!("Server features: {:?}", ctx.state.features.raw);
				Some(CommandResult::succeeded())
			}
			502 => {
				ctx.state.features = Features::default();
				Some(CommandResult::succeeded())
			}
			_ => Some(CommandResult::failed()),
		}
	}
}

/// OPTS UTF8 ON; a refusal leaves UTF-8 off but is not a failure
#[derive(Debug, Default)]
pub struct Utf8Option {
	executed: bool,
}

impl Utf8Option {
	pub fn new() -> Self {
		Utf8Option::default()
	}
}

#[async_trait]
impl Command for Utf8Option {
	fn label(&self) -> String {
		"OPTS UTF8 ON".to_string()
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		state.is_logged_in()
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		send_once(&mut self.executed, ctx, "OPTS UTF8 ON").await
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		ctx.state.utf8_enabled = reply.code() == 200;
		Some(CommandResult::succeeded())
	}
}

// ============================================================================
// DIRECTORIES
// ============================================================================

/// PWD; the result carries the directory path
#[derive(Debug, Default)]
pub struct PrintDirectory {
	executed: bool,
}

impl PrintDirectory {
	pub fn new() -> Self {
		PrintDirectory::default()
	}
}

#[async_trait]
impl Command for PrintDirectory {
	fn label(&self) -> String {
		"PWD".to_string()
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		state.is_logged_in()
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		send_once(&mut self.executed, ctx, "PWD").await
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		if reply.code() != 257 {
			return Some(CommandResult::failed());
		}
		match parse_quoted_path(reply.content()) {
			Some(path) => {
				ctx.state.working_directory = path.clone();
				Some(CommandResult::with_data(path))
			}
			None => {
				warn!("Unparsable PWD reply: {}", reply);
				Some(CommandResult::failed())
			}
		}
	}
}

/// Directory operation carried by [`DirectoryCommand`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryAction {
	Change(String),
	Parent,
	Make(String),
	Remove(String),
}

/// CWD, CDUP, MKD or RMD
#[derive(Debug)]
pub struct DirectoryCommand {
	action: DirectoryAction,
	executed: bool,
}

impl DirectoryCommand {
	pub fn new(action: DirectoryAction) -> Self {
		DirectoryCommand { action, executed: false }
	}

	fn line(&self) -> String {
		match &self.action {
			DirectoryAction::Change(path) => format!("CWD {}", path),
			DirectoryAction::Parent => "CDUP".to_string(),
			DirectoryAction::Make(path) => format!("MKD {}", path),
			DirectoryAction::Remove(path) => format!("RMD {}", path),
		}
	}
}

#[async_trait]
impl Command for DirectoryCommand {
	fn label(&self) -> String {
		self.line()
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		state.is_logged_in()
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		let line = self.line();
		send_once(&mut self.executed, ctx, &line).await
	}

	async fn handle(&mut self, _ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		let ok = match self.action {
			DirectoryAction::Change(_) | DirectoryAction::Remove(_) => reply.code() == 250,
			DirectoryAction::Parent => matches!(reply.code(), 200 | 250),
			DirectoryAction::Make(_) => reply.code() == 257,
		};
		if !ok {
			return Some(CommandResult::failed());
		}
		match (&self.action, parse_quoted_path(reply.content())) {
			(DirectoryAction::Make(_), Some(created)) => Some(CommandResult::with_data(created)),
			_ => Some(CommandResult::succeeded()),
		}
	}
}

// ============================================================================
// FILES
// ============================================================================

/// TYPE A / TYPE I
#[derive(Debug)]
pub struct SetTransferType {
	kind: TransferType,
	executed: bool,
}

impl SetTransferType {
	pub fn new(kind: TransferType) -> Self {
		SetTransferType { kind, executed: false }
	}
}

#[async_trait]
impl Command for SetTransferType {
	fn label(&self) -> String {
		format!("TYPE {}", self.kind.code())
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		state.is_logged_in()
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		let line = self.label();
		send_once(&mut self.executed, ctx, &line).await
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		if reply.code() != 200 {
			return Some(CommandResult::failed());
		}
		ctx.state.transfer_type = self.kind;
		Some(CommandResult::succeeded())
	}
}

/// DELE
#[derive(Debug)]
pub struct DeleteFile {
	path: String,
	executed: bool,
}

impl DeleteFile {
	pub fn new(path: impl Into<String>) -> Self {
		DeleteFile { path: path.into(), executed: false }
	}
}

#[async_trait]
impl Command for DeleteFile {
	fn label(&self) -> String {
		format!("DELE {}", self.path)
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		state.is_logged_in()
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		let line = self.label();
		send_once(&mut self.executed, ctx, &line).await
	}

	async fn handle(&mut self, _ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		Some(CommandResult::from_success(reply.code() == 250))
	}
}

/// Which attribute [`FileInfo`] asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileInfoKind {
	/// SIZE: byte count
	Size,
	/// MDTM: `YYYYMMDDHHMMSS[.sss]` in UTC
	ModificationTime,
}

/// SIZE or MDTM; the result carries the attribute as text
#[derive(Debug)]
pub struct FileInfo {
	kind: FileInfoKind,
	path: String,
	executed: bool,
}

impl FileInfo {
	pub fn new(kind: FileInfoKind, path: impl Into<String>) -> Self {
		FileInfo { kind, path: path.into(), executed: false }
	}
}

#[async_trait]
impl Command for FileInfo {
	fn label(&self) -> String {
		match self.kind {
			FileInfoKind::Size => format!("SIZE {}", self.path),
			FileInfoKind::ModificationTime => format!("MDTM {}", self.path),
		}
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		state.is_logged_in()
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		let line = self.label();
		send_once(&mut self.executed, ctx, &line).await
	}

	async fn handle(&mut self, _ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		if reply.code() != 213 {
			return Some(CommandResult::failed());
		}
		Some(CommandResult::with_data(reply.content().trim()))
	}
}

// ============================================================================
// MISCELLANEOUS
// ============================================================================

/// NOOP; reusable
#[derive(Debug, Default)]
pub struct Noop;

impl Noop {
	pub fn new() -> Self {
		Noop
	}
}

#[async_trait]
impl Command for Noop {
	fn label(&self) -> String {
		"NOOP".to_string()
	}

	fn is_reusable(&self) -> bool {
		true
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		past_greeting(state)
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		ctx.send("NOOP").await?;
		Ok(None)
	}

	async fn handle(&mut self, _ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		Some(CommandResult::from_success(reply.code() == 200))
	}
}

/// Arbitrary command line; succeeds when the final reply code is expected.
///
/// Preliminary replies that are not expected are skipped. The result carries
/// the reply text.
#[derive(Debug)]
pub struct RawCommand {
	line: String,
	expected: Vec<u16>,
	executed: bool,
}

impl RawCommand {
	pub fn new(line: impl Into<String>, expected: &[u16]) -> Self {
		RawCommand { line: line.into(), expected: expected.to_vec(), executed: false }
	}
}

#[async_trait]
impl Command for RawCommand {
	fn label(&self) -> String {
		crate::logging::redact(&self.line)
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		past_greeting(state)
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		let line = self.line.clone();
		send_once(&mut self.executed, ctx, &line).await
	}

	async fn handle(&mut self, _ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		let expected = self.expected.contains(&reply.code());
		if reply.is_preliminary() && !expected {
			return None;
		}
		Some(CommandResult::new(expected, Some(reply.content().as_bytes().to_vec())))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::state::TransferSettings;
	use tokio_util::sync::CancellationToken;

	fn state(auth: AuthPhase) -> SessionState {
		let mut state = SessionState::new("localhost", 21, TransferSettings::default());
		state.auth = auth;
		state
	}

	#[tokio::test]
	async fn test_greeting_resets_and_awaits_user() {
		let mut st = state(AuthPhase::Connecting);
		st.features.epsv = true;
		let mut ctx = CommandContext::new(&mut st, CancellationToken::new());
		let mut cmd = Greeting::new();

		assert!(cmd.execute(&mut ctx).await.unwrap().is_none());
		assert!(cmd.handle(&mut ctx, &Reply::new(120, "wait")).await.is_none());
		let result = cmd.handle(&mut ctx, &Reply::new(220, "Hello")).await.unwrap();
		assert!(result.is_success());
		assert_eq!(st.auth, AuthPhase::AwaitingUser);
		assert_eq!(st.welcome_message, "Hello");
		assert!(!st.features.epsv);
	}

	#[tokio::test]
	async fn test_user_replies() {
		let mut st = state(AuthPhase::AwaitingUser);
		let mut ctx = CommandContext::new(&mut st, CancellationToken::new());
		let mut cmd = User::new("anonymous");
		assert!(cmd.handle(&mut ctx, &Reply::new(331, "need pass")).await.unwrap().is_success());
		assert_eq!(ctx.state.auth, AuthPhase::AwaitingPassword);

		ctx.state.auth = AuthPhase::AwaitingUser;
		assert!(cmd.handle(&mut ctx, &Reply::new(230, "ok")).await.unwrap().is_success());
		assert_eq!(ctx.state.auth, AuthPhase::LoggedIn);

		assert!(!cmd.handle(&mut ctx, &Reply::new(530, "no")).await.unwrap().is_success());
	}

	#[tokio::test]
	async fn test_password_skipped_when_logged_in() {
		let mut st = state(AuthPhase::LoggedIn);
		let mut ctx = CommandContext::new(&mut st, CancellationToken::new());
		let mut cmd = Password::new(Some("secret".to_string()));
		// No control writer attached: a send would fail, so success proves nothing was sent
		let result = cmd.execute(&mut ctx).await.unwrap();
		assert_eq!(result, Some(CommandResult::succeeded()));
		assert!(cmd.has_executed());
	}

	#[tokio::test]
	async fn test_password_missing_fails() {
		let mut st = state(AuthPhase::AwaitingPassword);
		let mut ctx = CommandContext::new(&mut st, CancellationToken::new());
		let mut cmd = Password::new(None);
		let result = cmd.execute(&mut ctx).await.unwrap();
		assert_eq!(result, Some(CommandResult::failed()));
		assert_eq!(st.auth, AuthPhase::AwaitingUser);
	}

	#[tokio::test]
	async fn test_password_rejected_returns_to_user() {
		let mut st = state(AuthPhase::AwaitingPassword);
		let mut ctx = CommandContext::new(&mut st, CancellationToken::new());
		let mut cmd = Password::new(Some("bad".to_string()));
		let result = cmd.handle(&mut ctx, &Reply::new(530, "Login incorrect")).await.unwrap();
		assert!(!result.is_success());
		assert_eq!(st.auth, AuthPhase::AwaitingUser);
	}

	#[tokio::test]
	async fn test_send_without_control_is_not_connected() {
		let mut st = state(AuthPhase::LoggedIn);
		let mut ctx = CommandContext::new(&mut st, CancellationToken::new());
		let res = Noop::new().execute(&mut ctx).await;
		assert!(matches!(res, Err(crate::error::FtpError::NotConnected)));
	}

	#[tokio::test]
	async fn test_feat_and_pwd() {
		let mut st = state(AuthPhase::LoggedIn);
		let mut ctx = CommandContext::new(&mut st, CancellationToken::new());

		let feat = Reply::new(211, "Features:\n EPSV\n SIZE\nEnd");
		assert!(FeatureList::new().handle(&mut ctx, &feat).await.unwrap().is_success());
		assert!(ctx.state.features.epsv);
		assert!(ctx.state.features.size);
		assert!(!ctx.state.features.mlst);

		let pwd = Reply::new(257, "\"/var/ftp\" is the current directory");
		let result = PrintDirectory::new().handle(&mut ctx, &pwd).await.unwrap();
		assert_eq!(result.text().as_deref(), Some("/var/ftp"));
		assert_eq!(ctx.state.working_directory, "/var/ftp");
	}

	#[tokio::test]
	async fn test_feat_not_implemented_is_empty() {
		let mut st = state(AuthPhase::LoggedIn);
		st.features.epsv = true;
		let mut ctx = CommandContext::new(&mut st, CancellationToken::new());
		let result = FeatureList::new().handle(&mut ctx, &Reply::new(502, "no")).await.unwrap();
		assert!(result.is_success());
		assert!(!st.features.epsv);
	}

	#[tokio::test]
	async fn test_directory_commands() {
		let mut st = state(AuthPhase::LoggedIn);
		let mut ctx = CommandContext::new(&mut st, CancellationToken::new());

		let mut mkd = DirectoryCommand::new(DirectoryAction::Make("new".to_string()));
		assert_eq!(mkd.label(), "MKD new");
		let result = mkd.handle(&mut ctx, &Reply::new(257, "\"/home/new\" created")).await.unwrap();
		assert_eq!(result.text().as_deref(), Some("/home/new"));

		let mut cwd = DirectoryCommand::new(DirectoryAction::Change("/nope".to_string()));
		assert!(!cwd.handle(&mut ctx, &Reply::new(550, "No such directory")).await.unwrap().is_success());

		let mut cdup = DirectoryCommand::new(DirectoryAction::Parent);
		assert!(cdup.handle(&mut ctx, &Reply::new(200, "ok")).await.unwrap().is_success());
	}

	#[tokio::test]
	async fn test_quit_requests_close() {
		let mut st = state(AuthPhase::LoggedIn);
		let mut ctx = CommandContext::new(&mut st, CancellationToken::new());
		let result = Quit::new().handle(&mut ctx, &Reply::new(221, "Bye")).await.unwrap();
		assert!(result.is_success());
		assert!(ctx.close_requested());
	}

	#[tokio::test]
	async fn test_raw_command() {
		let mut st = state(AuthPhase::LoggedIn);
		let mut ctx = CommandContext::new(&mut st, CancellationToken::new());
		let mut raw = RawCommand::new("SITE CHMOD 644 a", &[200]);
		assert!(raw.handle(&mut ctx, &Reply::new(150, "working")).await.is_none());
		let result = raw.handle(&mut ctx, &Reply::new(200, "done")).await.unwrap();
		assert!(result.is_success());
		assert_eq!(result.text().as_deref(), Some("done"));
	}

	#[test]
	fn test_validity() {
		let st = state(AuthPhase::AwaitingUser);
		assert!(User::new("u").is_valid_context(&st));
		assert!(!Password::new(None).is_valid_context(&st));
		assert!(!PrintDirectory::new().is_valid_context(&st));
		assert!(Noop::new().is_valid_context(&st));
		assert!(!Noop::new().is_valid_context(&state(AuthPhase::Connecting)));
	}
}

// vim: ts=4
