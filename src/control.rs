//! Control connection I/O
//!
//! Commands go out through [`ControlWriter`], owned by the session state so
//! that only the party holding the state lock can write. Replies come in on
//! a dedicated reader task which frames them and routes each one through the
//! session.

use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FtpError, FtpResult};
use crate::logging::redact;
use crate::reply::ReplyFramer;
use crate::session::Shared;

/// CRLF line writer for the control connection
#[derive(Debug)]
pub(crate) struct ControlWriter {
	writer: OwnedWriteHalf,
}

impl ControlWriter {
	pub fn new(writer: OwnedWriteHalf) -> Self {
		ControlWriter { writer }
	}

	/// Write one command line. A server that stops reading cannot hold the
	/// write past `quit`.
	pub async fn send_line(&mut self, line: &str, quit: &CancellationToken) -> FtpResult<()> {
		if line.contains(['\r', '\n']) {
			return Err(FtpError::InvalidArgument { message: format!("line break in command {:?}", redact(line)) });
		}
		debug!(">>> {}", redact(line));
		let mut buf = Vec::with_capacity(line.len() + 2);
		buf.extend_from_slice(line.as_bytes());
		buf.extend_from_slice(b"\r\n");

		let writer = &mut self.writer;
		tokio::select! {
			biased;
			_ = quit.cancelled() => Err(FtpError::Cancelled),
			written = async {
				writer.write_all(&buf).await?;
				writer.flush().await
			} => Ok(written?),
		}
	}
}

/// Read, frame and route replies until the connection ends or `stop` fires
pub(crate) async fn run_reader(shared: Arc<Shared>, mut reader: OwnedReadHalf, stop: CancellationToken, generation: u64) {
	let mut framer = ReplyFramer::with_max_line(shared.config().max_reply_line);
	let mut buf = vec![0u8; shared.config().read_buffer_size.max(512)];
	debug!("Reply reader started");

	loop {
		let read = tokio::select! {
			biased;
			_ = stop.cancelled() => break,
			read = reader.read(&mut buf) => read,
		};
		let n = match read {
			Ok(0) => {
				info!("Server closed the control connection");
				shared.teardown_link(generation, "control connection closed by server").await;
				break;
			}
			Ok(n) => n,
			Err(e) => {
				warn!("Control connection read failed: {}", e);
				shared.teardown_link(generation, "control connection read error").await;
				break;
			}
		};

		let replies = match framer.push(&buf[..n]) {
			Ok(replies) => replies,
			Err(e) => {
				warn!("{}", e);
				shared.teardown_link(generation, "malformed reply stream").await;
				break;
			}
		};
		for reply in replies {
			if stop.is_cancelled() {
				break;
			}
			shared.route(reply, generation).await;
		}
	}
	debug!("Reply reader stopped");
}

// vim: ts=4
