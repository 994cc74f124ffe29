//! Data mode negotiation: PASV/EPSV and PORT

use async_trait::async_trait;
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{debug, warn};

use super::{Command, CommandContext};
use crate::data::bind_active_listener;
use crate::error::{FtpError, FtpResult};
use crate::reply::Reply;
use crate::result::CommandResult;
use crate::state::{DataMode, SessionState};

fn pasv_address() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| {
		Regex::new(r"(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})").expect("static regex")
	})
}

/// Parse the `h1,h2,h3,h4,p1,p2` tuple of a 227 reply
pub fn parse_pasv(text: &str) -> Option<(Ipv4Addr, u16)> {
	let caps = pasv_address().captures(text)?;
	let mut n = [0u8; 6];
	for (i, slot) in n.iter_mut().enumerate() {
		*slot = caps[i + 1].parse().ok()?;
	}
	let ip = Ipv4Addr::new(n[0], n[1], n[2], n[3]);
	let port = u16::from(n[4]) * 256 + u16::from(n[5]);
	Some((ip, port))
}

/// Parse the `(<d><d><d>port<d>)` part of a 229 reply
pub fn parse_epsv(text: &str) -> Option<u16> {
	let start = text.find('(')?;
	let mut chars = text[start + 1..].chars();
	let delim = chars.next()?;
	if !delim.is_ascii_graphic() || delim.is_ascii_digit() {
		return None;
	}
	if chars.next()? != delim || chars.next()? != delim {
		return None;
	}

	let rest = chars.as_str();
	let end = rest.find(delim)?;
	let digits = &rest[..end];
	if digits.is_empty() || digits.len() > 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	if !rest[end + delim.len_utf8()..].starts_with(')') {
		return None;
	}
	match digits.parse::<u16>() {
		Ok(0) | Err(_) => None,
		Ok(port) => Some(port),
	}
}

/// PORT argument for `ip:port`
pub fn format_port(ip: Ipv4Addr, port: u16) -> String {
	let [a, b, c, d] = ip.octets();
	format!("{},{},{},{},{},{}", a, b, c, d, port >> 8, port & 0xff)
}

/// Fresh mode command for `mode`
pub fn mode_command(mode: DataMode) -> Box<dyn Command> {
	match mode {
		DataMode::Passive => Box::new(PassiveMode::new()),
		DataMode::Active => Box::new(ActiveMode::new()),
	}
}

// ============================================================================
// PASSIVE
// ============================================================================

/// EPSV when the server advertised it, PASV otherwise
#[derive(Debug, Default)]
pub struct PassiveMode {
	extended: bool,
	executed: bool,
}

impl PassiveMode {
	pub fn new() -> Self {
		PassiveMode::default()
	}
}

#[async_trait]
impl Command for PassiveMode {
	fn label(&self) -> String {
		let verb = if self.extended { "EPSV" } else { "PASV" };
		verb.to_string()
	}

	fn is_reusable(&self) -> bool {
		true
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		state.is_logged_in()
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		self.executed = true;
		self.extended = ctx.state.features.epsv;
		ctx.send(if self.extended { "EPSV" } else { "PASV" }).await?;
		Ok(None)
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		let (host, port) = match (self.extended, reply.code()) {
			(true, 229) => match parse_epsv(reply.content()) {
				Some(port) => (ctx.state.host.clone(), port),
				None => {
					warn!("Unparsable EPSV reply: {}", reply);
					return Some(CommandResult::failed());
				}
			},
			(false, 227) => match parse_pasv(reply.content()) {
				Some((ip, port)) if !ctx.state.settings.passive_use_control_host => (ip.to_string(), port),
				Some((_, port)) => (ctx.state.host.clone(), port),
				None => {
					warn!("Unparsable PASV reply: {}", reply);
					return Some(CommandResult::failed());
				}
			},
			_ => return Some(CommandResult::failed()),
		};

		debug!("Passive data endpoint {}:{}", host, port);
		ctx.state.data_listener = None;
		ctx.state.data_host = host;
		ctx.state.data_port = port;
		ctx.state.mode = DataMode::Passive;
		Some(CommandResult::succeeded())
	}
}

// ============================================================================
// ACTIVE
// ============================================================================

/// PORT with a freshly bound local listener
#[derive(Debug, Default)]
pub struct ActiveMode {
	listener: Option<TcpListener>,
	announced: Option<(Ipv4Addr, u16)>,
	executed: bool,
}

impl ActiveMode {
	pub fn new() -> Self {
		ActiveMode::default()
	}
}

#[async_trait]
impl Command for ActiveMode {
	fn label(&self) -> String {
		"PORT".to_string()
	}

	fn is_reusable(&self) -> bool {
		true
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	fn is_valid_context(&self, state: &SessionState) -> bool {
		state.is_logged_in()
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		self.executed = true;
		let local_ip = ctx.state.local_addr.map(|a| a.ip()).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
		let announce = match ctx.state.settings.active_bind.unwrap_or(local_ip) {
			IpAddr::V4(ip) if !ip.is_unspecified() => ip,
			other => {
				return Err(FtpError::data(format!("PORT needs a routable IPv4 address, have {}", other)));
			}
		};
		let bind_ip = match ctx.state.settings.active_bind {
			Some(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
			None => local_ip,
		};

		let ports = ctx.state.settings.active_ports.clone();
		let listener = bind_active_listener(bind_ip, &ports).await?;
		let port = listener.local_addr()?.port();
		self.listener = Some(listener);
		self.announced = Some((announce, port));

		ctx.send(&format!("PORT {}", format_port(announce, port))).await?;
		Ok(None)
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		let listener = self.listener.take();
		match (reply.code(), listener, self.announced) {
			(200, Some(listener), Some((ip, port))) => {
				debug!("Active data endpoint {}:{}", ip, port);
				ctx.state.data_listener = Some(listener);
				ctx.state.data_host = ip.to_string();
				ctx.state.data_port = port;
				ctx.state.mode = DataMode::Active;
				Some(CommandResult::succeeded())
			}
			_ => Some(CommandResult::failed()),
		}
	}

	fn quit_execution(&mut self) {
		self.listener = None;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::state::{AuthPhase, TransferSettings};
	use tokio_util::sync::CancellationToken;

	#[test]
	fn test_parse_pasv() {
		let parsed = parse_pasv("Entering Passive Mode (192,168,1,2,19,137)");
		assert_eq!(parsed, Some((Ipv4Addr::new(192, 168, 1, 2), 19 * 256 + 137)));

		// Some servers omit the parentheses
		assert_eq!(parse_pasv("=127,0,0,1,4,1"), Some((Ipv4Addr::LOCALHOST, 1025)));

		assert_eq!(parse_pasv("Entering Passive Mode (300,1,1,1,1,1)"), None);
		assert_eq!(parse_pasv("Entering Passive Mode"), None);
	}

	#[test]
	fn test_parse_epsv() {
		assert_eq!(parse_epsv("Entering Extended Passive Mode (|||6446|)"), Some(6446));
		assert_eq!(parse_epsv("ok (!!!21!)"), Some(21));
		assert_eq!(parse_epsv("(|||6446|"), None);
		assert_eq!(parse_epsv("(||6446|)"), None);
		assert_eq!(parse_epsv("(|||99999|)"), None);
		assert_eq!(parse_epsv("(|||0|)"), None);
		assert_eq!(parse_epsv("(|||abc|)"), None);
		assert_eq!(parse_epsv("no parens"), None);
	}

	#[test]
	fn test_format_port() {
		assert_eq!(format_port(Ipv4Addr::LOCALHOST, 50000), "127,0,0,1,195,80");
		assert_eq!(format_port(Ipv4Addr::new(10, 0, 0, 7), 21), "10,0,0,7,0,21");
	}

	fn logged_in() -> SessionState {
		let mut state = SessionState::new("ftp.example.com", 21, TransferSettings::default());
		state.auth = AuthPhase::LoggedIn;
		state
	}

	#[tokio::test]
	async fn test_epsv_reply_uses_control_host() {
		let mut state = logged_in();
		let mut cmd = PassiveMode { extended: true, executed: true };
		let mut ctx = CommandContext::new(&mut state, CancellationToken::new());
		let result = cmd.handle(&mut ctx, &Reply::new(229, "Entering Extended Passive Mode (|||6446|)")).await;
		assert!(result.unwrap().is_success());
		assert_eq!(state.data_host, "ftp.example.com");
		assert_eq!(state.data_port, 6446);
		assert_eq!(state.mode, DataMode::Passive);
	}

	#[tokio::test]
	async fn test_pasv_reply_and_control_host_override() {
		let mut state = logged_in();
		let mut cmd = PassiveMode::new();
		let reply = Reply::new(227, "Entering Passive Mode (10,1,2,3,4,5)");
		{
			let mut ctx = CommandContext::new(&mut state, CancellationToken::new());
			assert!(cmd.handle(&mut ctx, &reply).await.unwrap().is_success());
		}
		assert_eq!(state.data_host, "10.1.2.3");
		assert_eq!(state.data_port, 4 * 256 + 5);

		state.settings.passive_use_control_host = true;
		let mut ctx = CommandContext::new(&mut state, CancellationToken::new());
		assert!(cmd.handle(&mut ctx, &reply).await.unwrap().is_success());
		assert_eq!(state.data_host, "ftp.example.com");
	}

	#[tokio::test]
	async fn test_passive_failure_codes() {
		let mut state = logged_in();
		let mut ctx = CommandContext::new(&mut state, CancellationToken::new());
		let mut cmd = PassiveMode::new();
		assert!(!cmd.handle(&mut ctx, &Reply::new(425, "no")).await.unwrap().is_success());
		// A 229 answer to PASV is not accepted
		assert!(!cmd.handle(&mut ctx, &Reply::new(229, "(|||1|)")).await.unwrap().is_success());
	}

	#[tokio::test]
	async fn test_active_without_ipv4_fails_to_execute() {
		let mut state = logged_in();
		state.local_addr = Some("[::1]:40000".parse().unwrap());
		let mut ctx = CommandContext::new(&mut state, CancellationToken::new());
		let res = ActiveMode::new().execute(&mut ctx).await;
		assert!(matches!(res, Err(FtpError::DataChannel { .. })));
	}

	#[test]
	fn test_mode_command_labels() {
		assert_eq!(mode_command(DataMode::Passive).label(), "PASV");
		assert_eq!(mode_command(DataMode::Active).label(), "PORT");
		assert!(mode_command(DataMode::Active).is_reusable());
	}
}

// vim: ts=4
