//! Control-channel replies and the reply framer
//!
//! The framer is a pure accumulator: bytes go in as they arrive from the
//! socket, completed replies come out. Lines are CRLF-terminated and
//! classified against `^(\d{3})([ -])(.*)$`:
//!
//! - `NNN text` completes a reply (joined with any accumulated lines)
//! - `NNN-text` opens a multi-line reply
//! - anything else is continuation text of the open reply
//!
//! While a multi-line reply is open, a line carrying a *different* code is
//! continuation text too, so a `123 ...` line quoted inside a `211-` block
//! does not end it.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::{FtpError, FtpResult};

/// Default upper bound for a single unterminated line
pub const DEFAULT_MAX_LINE: usize = 64 * 1024;

/// Default upper bound for the text of one multi-line reply
pub const DEFAULT_MAX_REPLY: usize = 1024 * 1024;

fn reply_line() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^(\d{3})([ -])(.*)$").expect("static regex"))
}

/// One complete server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
	code: u16,
	content: String,
}

impl Reply {
	pub fn new(code: u16, content: impl Into<String>) -> Self {
		Reply { code, content: content.into() }
	}

	pub fn code(&self) -> u16 {
		self.code
	}

	/// Reply text; lines of a multi-line reply are joined with `\n`
	pub fn content(&self) -> &str {
		&self.content
	}

	pub fn lines(&self) -> impl Iterator<Item = &str> {
		self.content.split('\n')
	}

	/// 1xx
	pub fn is_preliminary(&self) -> bool {
		(100..200).contains(&self.code)
	}

	/// 2xx
	pub fn is_completion(&self) -> bool {
		(200..300).contains(&self.code)
	}

	/// 3xx
	pub fn is_intermediate(&self) -> bool {
		(300..400).contains(&self.code)
	}

	/// 4xx
	pub fn is_transient_failure(&self) -> bool {
		(400..500).contains(&self.code)
	}

	/// 5xx
	pub fn is_permanent_failure(&self) -> bool {
		(500..600).contains(&self.code)
	}
}

impl fmt::Display for Reply {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.code, self.content.replace('\n', " | "))
	}
}

/// Incremental CRLF line framer and multi-line reply assembler
#[derive(Debug)]
pub struct ReplyFramer {
	buf: Vec<u8>,
	open: Option<u16>,
	accumulated: String,
	max_line: usize,
	max_reply: usize,
}

impl Default for ReplyFramer {
	fn default() -> Self {
		ReplyFramer::new()
	}
}

impl ReplyFramer {
	pub fn new() -> Self {
		ReplyFramer::with_max_line(DEFAULT_MAX_LINE)
	}

	pub fn with_max_line(max_line: usize) -> Self {
		ReplyFramer::with_limits(max_line, DEFAULT_MAX_REPLY)
	}

	/// `max_reply` bounds the text gathered for an open multi-line reply; it
	/// is never below `max_line`.
	pub fn with_limits(max_line: usize, max_reply: usize) -> Self {
		ReplyFramer {
			buf: Vec::new(),
			open: None,
			accumulated: String::new(),
			max_line,
			max_reply: max_reply.max(max_line),
		}
	}

	/// Feed raw bytes; returns every reply completed by them, in order.
	pub fn push(&mut self, bytes: &[u8]) -> FtpResult<Vec<Reply>> {
		self.buf.extend_from_slice(bytes);

		let mut replies = Vec::new();
		let mut start = 0;
		while let Some(pos) = find_crlf(&self.buf[start..]) {
			let line = String::from_utf8_lossy(&self.buf[start..start + pos]).into_owned();
			start += pos + 2;
			if let Some(reply) = self.push_line(&line) {
				replies.push(reply);
			}
			if self.accumulated.len() > self.max_reply {
				let len = self.accumulated.len();
				self.buf.clear();
				self.accumulated.clear();
				self.open = None;
				return Err(FtpError::Protocol {
					message: format!("multi-line reply exceeds {} bytes ({} gathered)", self.max_reply, len),
				});
			}
		}
		self.buf.drain(..start);

		if self.buf.len() > self.max_line {
			let len = self.buf.len();
			self.buf.clear();
			return Err(FtpError::Protocol {
				message: format!("reply line exceeds {} bytes without CRLF ({} buffered)", self.max_line, len),
			});
		}
		Ok(replies)
	}

	/// Feed one line without its CRLF terminator
	pub fn push_line(&mut self, line: &str) -> Option<Reply> {
		let caps = match reply_line().captures(line) {
			Some(caps) => caps,
			None => {
				self.continuation(line);
				return None;
			}
		};

		let code: u16 = match caps[1].parse() {
			Ok(code) => code,
			Err(_) => {
				self.continuation(line);
				return None;
			}
		};
		let text = caps.get(3).map_or("", |m| m.as_str());

		match (self.open, &caps[2]) {
			(Some(open), _) if open != code => {
				self.accumulated.push_str(line);
				self.accumulated.push('\n');
				None
			}
			(_, " ") => {
				let mut content = std::mem::take(&mut self.accumulated);
				content.push_str(text);
				self.open = None;
				Some(Reply { code, content })
			}
			_ => {
				self.open = Some(code);
				self.accumulated.push_str(text);
				self.accumulated.push('\n');
				None
			}
		}
	}

	/// No multi-line reply is open and no partial line is buffered
	pub fn is_idle(&self) -> bool {
		self.open.is_none() && self.accumulated.is_empty() && self.buf.is_empty()
	}

	fn continuation(&mut self, line: &str) {
		if self.open.is_none() {
			debug!("Discarding text outside of a reply: {:?}", line);
			return;
		}
		self.accumulated.push_str(line);
		self.accumulated.push('\n');
	}
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
	buf.windows(2).position(|w| w == b"\r\n")
}


// vim: ts=4
