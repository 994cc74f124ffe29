//! Data connection establishment and transfer
//!
//! The endpoint negotiated by a mode command is consumed by the next transfer:
//! passive mode dials the announced address, active mode accepts one
//! connection on the listener bound for PORT. Establishment runs on its own
//! task and delivers the socket through a single-slot handoff, so a transfer
//! can send its command immediately and pick the socket up once the server
//! signals 150/125.

use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{FtpError, FtpResult};
use crate::state::{DataMode, SessionState};

const WRITE_CHUNK: usize = 64 * 1024;

/// Where the next data connection comes from
#[derive(Debug)]
pub enum DataEndpoint {
	Dial { host: String, port: u16 },
	Accept(TcpListener),
}

impl DataEndpoint {
	/// Consume the endpoint negotiated by the last mode command
	pub fn take_from(state: &mut SessionState) -> FtpResult<Self> {
		match state.mode {
			DataMode::Active => state
				.data_listener
				.take()
				.map(DataEndpoint::Accept)
				.ok_or_else(|| FtpError::data("no active listener; PORT was not negotiated")),
			DataMode::Passive => {
				if state.data_port == 0 || state.data_host.is_empty() {
					return Err(FtpError::data("no passive address; PASV/EPSV was not negotiated"));
				}
				let endpoint = DataEndpoint::Dial { host: std::mem::take(&mut state.data_host), port: state.data_port };
				state.data_port = 0;
				Ok(endpoint)
			}
		}
	}

	pub async fn open(self) -> FtpResult<TcpStream> {
		match self {
			DataEndpoint::Dial { host, port } => {
				debug!("Opening data connection to {}:{}", host, port);
				TcpStream::connect((host.as_str(), port)).await.map_err(|e| FtpError::ConnectFailed {
					addr: format!("{}:{}", host, port),
					source: e,
				})
			}
			DataEndpoint::Accept(listener) => {
				let (stream, peer) = listener.accept().await?;
				debug!("Accepted data connection from {}", peer);
				Ok(stream)
			}
		}
	}
}

/// Bind a listener on the first free port of `ports` (`0..=0` lets the OS pick)
pub async fn bind_active_listener(ip: IpAddr, ports: &RangeInclusive<u16>) -> FtpResult<TcpListener> {
	let mut last_err = None;
	for port in ports.clone() {
		match TcpListener::bind(SocketAddr::new(ip, port)).await {
			Ok(listener) => return Ok(listener),
			Err(e) => {
				trace!("Port {} unavailable: {}", port, e);
				last_err = Some(e);
			}
		}
	}
	Err(FtpError::data(format!(
		"no free port in {}..={} on {}{}",
		ports.start(),
		ports.end(),
		ip,
		last_err.map(|e| format!(": {}", e)).unwrap_or_default()
	)))
}

/// Single-slot handoff of a data socket being established in the background
#[derive(Debug)]
pub struct DataHandoff {
	rx: Option<oneshot::Receiver<FtpResult<TcpStream>>>,
	task: AbortHandle,
	timeout: Duration,
}

impl DataHandoff {
	/// Start establishing `endpoint`, giving up after `timeout`
	pub fn spawn(endpoint: DataEndpoint, timeout: Duration) -> Self {
		let (tx, rx) = oneshot::channel();
		let handle = tokio::spawn(async move {
			let result = match tokio::time::timeout(timeout, endpoint.open()).await {
				Ok(result) => result,
				Err(_) => Err(FtpError::Timeout { what: "data connection".to_string(), after: timeout }),
			};
			let _ = tx.send(result);
		});
		DataHandoff { rx: Some(rx), task: handle.abort_handle(), timeout }
	}

	/// Take the socket; returns early with `Cancelled` when `quit` fires
	pub async fn wait(&mut self, quit: &CancellationToken) -> FtpResult<TcpStream> {
		let rx = self.rx.take().ok_or_else(|| FtpError::data("data connection already taken"))?;
		tokio::select! {
			biased;
			_ = quit.cancelled() => {
				self.task.abort();
				Err(FtpError::Cancelled)
			}
			received = rx => match received {
				Ok(result) => result,
				Err(_) => Err(FtpError::Timeout { what: "data connection".to_string(), after: self.timeout }),
			},
		}
	}

	pub fn abort(&self) {
		self.task.abort();
	}
}

impl Drop for DataHandoff {
	fn drop(&mut self) {
		self.task.abort();
	}
}

/// Read until EOF; each read is bounded by `timeout`
pub async fn read_to_end(
	stream: &mut TcpStream,
	quit: &CancellationToken,
	timeout: Duration,
	buffer_size: usize,
) -> FtpResult<Vec<u8>> {
	let mut data = Vec::new();
	let mut buf = vec![0u8; buffer_size.max(512)];
	loop {
		let n = tokio::select! {
			biased;
			_ = quit.cancelled() => return Err(FtpError::Cancelled),
			read = tokio::time::timeout(timeout, stream.read(&mut buf)) => match read {
				Ok(result) => result?,
				Err(_) => return Err(FtpError::Timeout { what: "data read".to_string(), after: timeout }),
			},
		};
		if n == 0 {
			break;
		}
		data.extend_from_slice(&buf[..n]);
	}
	trace!("Data connection delivered {} bytes", data.len());
	Ok(data)
}

/// Write `data` and close the write side; each chunk is bounded by `timeout`
pub async fn write_all(
	stream: &mut TcpStream,
	data: &[u8],
	quit: &CancellationToken,
	timeout: Duration,
) -> FtpResult<()> {
	for chunk in data.chunks(WRITE_CHUNK) {
		tokio::select! {
			biased;
			_ = quit.cancelled() => return Err(FtpError::Cancelled),
			written = tokio::time::timeout(timeout, stream.write_all(chunk)) => match written {
				Ok(result) => result?,
				Err(_) => return Err(FtpError::Timeout { what: "data write".to_string(), after: timeout }),
			},
		}
	}
	stream.shutdown().await?;
	trace!("Data connection accepted {} bytes", data.len());
	Ok(())
}


// vim: ts=4
