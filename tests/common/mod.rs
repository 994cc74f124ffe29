//! Scripted in-process FTP server for integration tests
//!
//! Speaks enough RFC 959 for the client's command set: login, FEAT, PWD and
//! friends, PASV/EPSV/PORT and RETR/LIST/MLSD/NLST/STOR/APPE over a real data
//! connection. Behaviour is tuned through [`MockOptions`]; every received
//! command line is logged so tests can assert what went over the wire.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

use ftplink::ClientConfig;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct MockOptions {
	/// Raw greeting lines, CRLF appended
	pub greeting: Vec<String>,
	pub require_password: bool,
	pub password: String,
	/// FEAT lines; empty answers 502
	pub features: Vec<String>,
	pub files: BTreeMap<String, Vec<u8>>,
	/// Verb answered with 421 followed by a hangup
	pub disconnect_on: Option<String>,
	/// Verb that never completes; transfers get a bare 150
	pub stall_on: Option<String>,
	/// Pause between the chunks of an outgoing data transfer
	pub data_pace: Option<Duration>,
}

impl Default for MockOptions {
	fn default() -> Self {
		MockOptions {
			greeting: vec!["220 Mock FTP ready".to_string()],
			require_password: true,
			password: "secret".to_string(),
			features: Vec::new(),
			files: BTreeMap::new(),
			disconnect_on: None,
			stall_on: None,
			data_pace: None,
		}
	}
}

impl MockOptions {
	pub fn with_file(mut self, name: &str, data: &[u8]) -> Self {
		self.files.insert(name.to_string(), data.to_vec());
		self
	}

	pub fn with_features(mut self, features: &[&str]) -> Self {
		self.features = features.iter().map(|f| f.to_string()).collect();
		self
	}
}

struct ServerState {
	options: MockOptions,
	commands: Mutex<Vec<String>>,
	files: Mutex<BTreeMap<String, Vec<u8>>>,
	dirs: Mutex<BTreeSet<String>>,
	connections: Mutex<usize>,
}

pub struct MockServer {
	pub addr: SocketAddr,
	state: Arc<ServerState>,
}

impl MockServer {
	pub async fn start(options: MockOptions) -> Self {
		let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
		let addr = listener.local_addr().unwrap();
		let state = Arc::new(ServerState {
			files: Mutex::new(options.files.clone()),
			dirs: Mutex::new(["/".to_string(), "/pub".to_string()].into_iter().collect()),
			options,
			commands: Mutex::new(Vec::new()),
			connections: Mutex::new(0),
		});

		let accept_state = state.clone();
		tokio::spawn(async move {
			while let Ok((stream, _)) = listener.accept().await {
				*accept_state.connections.lock().unwrap() += 1;
				tokio::spawn(serve(accept_state.clone(), stream));
			}
		});
		MockServer { addr, state }
	}

	/// Client config pointing at this server with short timeouts
	pub fn config(&self) -> ClientConfig {
		let mut config = ClientConfig::new("127.0.0.1", self.addr.port());
		config.connect_timeout_secs = 5;
		config.command_timeout_secs = 10;
		config.data_timeout_secs = 5;
		config.active.port_start = 0;
		config.active.port_end = 0;
		config
	}

	/// Every command line received so far, across connections
	pub fn commands(&self) -> Vec<String> {
		self.state.commands.lock().unwrap().clone()
	}

	/// Just the verbs of [`commands`](Self::commands)
	pub fn verbs(&self) -> Vec<String> {
		self.commands().iter().map(|c| verb_of(c)).collect()
	}

	pub fn file(&self, name: &str) -> Option<Vec<u8>> {
		self.state.files.lock().unwrap().get(name).cloned()
	}

	pub fn connections(&self) -> usize {
		*self.state.connections.lock().unwrap()
	}
}

fn verb_of(line: &str) -> String {
	line.split(' ').next().unwrap_or("").to_ascii_uppercase()
}

enum DataPlan {
	Listen(TcpListener),
	Connect(SocketAddr),
}

impl DataPlan {
	async fn open(self) -> std::io::Result<TcpStream> {
		match self {
			DataPlan::Listen(listener) => Ok(listener.accept().await?.0),
			DataPlan::Connect(addr) => TcpStream::connect(addr).await,
		}
	}
}

struct Connection {
	state: Arc<ServerState>,
	writer: OwnedWriteHalf,
	cwd: String,
	user_ok: bool,
	data: Option<DataPlan>,
	// Held so a stalled transfer's peer never sees the endpoint go away
	stalled: Option<DataPlan>,
}

impl Connection {
	async fn reply(&mut self, line: &str) -> bool {
		let mut bytes = line.as_bytes().to_vec();
		bytes.extend_from_slice(b"\r\n");
		self.writer.write_all(&bytes).await.is_ok()
	}

	fn resolve(&self, path: &str) -> String {
		if path.starts_with('/') {
			path.to_string()
		} else if self.cwd == "/" {
			format!("/{}", path)
		} else {
			format!("{}/{}", self.cwd, path)
		}
	}

	fn listing(&self, verb: &str) -> Vec<u8> {
		let files = self.state.files.lock().unwrap();
		let mut out = String::new();
		for (name, data) in files.iter() {
			match verb {
				"MLSD" => out.push_str(&format!("type=file;size={}; {}\r\n", data.len(), name)),
				"NLST" => out.push_str(&format!("{}\r\n", name)),
				_ => out.push_str(&format!("-rw-r--r-- 1 ftp ftp {} Jan 01 00:00 {}\r\n", data.len(), name)),
			}
		}
		out.into_bytes()
	}

	/// Handle one command line; false ends the connection
	async fn dispatch(&mut self, line: &str) -> bool {
		let verb = verb_of(line);
		let arg = line.split_once(' ').map(|(_, a)| a.trim().to_string()).unwrap_or_default();
		let options = self.state.options.clone();

		if options.disconnect_on.as_deref() == Some(verb.as_str()) {
			self.reply("421 Service not available, closing control connection").await;
			return false;
		}
		if options.stall_on.as_deref() == Some(verb.as_str()) {
			if matches!(verb.as_str(), "RETR" | "STOR" | "APPE" | "LIST" | "MLSD" | "NLST") {
				self.stalled = self.data.take();
				return self.reply("150 Opening data connection").await;
			}
			return true;
		}

		match verb.as_str() {
			"USER" => {
				if options.require_password {
					self.user_ok = true;
					self.reply("331 Password required").await
				} else {
					self.reply("230 Logged in").await
				}
			}
			"PASS" => {
				if self.user_ok && arg == options.password {
					self.reply("230 Logged in").await
				} else {
					self.reply("530 Login incorrect").await
				}
			}
			"SYST" => self.reply("215 UNIX Type: L8").await,
			"FEAT" => {
				if options.features.is_empty() {
					return self.reply("502 Command not implemented").await;
				}
				let mut block = String::from("211-Features:\r\n");
				for feature in &options.features {
					block.push_str(&format!(" {}\r\n", feature));
				}
				block.push_str("211 End");
				self.reply(&block).await
			}
			"PWD" => {
				let line = format!("257 \"{}\" is the current directory", self.cwd);
				self.reply(&line).await
			}
			"CWD" => {
				let target = self.resolve(&arg);
				let exists = self.state.dirs.lock().unwrap().contains(&target);
				if exists {
					self.cwd = target;
					self.reply("250 Directory changed").await
				} else {
					self.reply("550 No such directory").await
				}
			}
			"CDUP" => {
				self.cwd = match self.cwd.rfind('/') {
					Some(0) | None => "/".to_string(),
					Some(pos) => self.cwd[..pos].to_string(),
				};
				self.reply("250 Directory changed").await
			}
			"MKD" => {
				let target = self.resolve(&arg);
				self.state.dirs.lock().unwrap().insert(target.clone());
				self.reply(&format!("257 \"{}\" created", target)).await
			}
			"RMD" => {
				let target = self.resolve(&arg);
				let removed = self.state.dirs.lock().unwrap().remove(&target);
				if removed {
					self.reply("250 Directory removed").await
				} else {
					self.reply("550 No such directory").await
				}
			}
			"TYPE" => self.reply(&format!("200 Type set to {}", arg)).await,
			"PASV" => {
				let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
				let port = listener.local_addr().unwrap().port();
				self.data = Some(DataPlan::Listen(listener));
				let line = format!("227 Entering Passive Mode (127,0,0,1,{},{})", port >> 8, port & 0xff);
				self.reply(&line).await
			}
			"EPSV" => {
				let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
				let port = listener.local_addr().unwrap().port();
				self.data = Some(DataPlan::Listen(listener));
				self.reply(&format!("229 Entering Extended Passive Mode (|||{}|)", port)).await
			}
			"PORT" => {
				let n: Vec<u16> = arg.split(',').filter_map(|p| p.trim().parse().ok()).collect();
				if n.len() != 6 {
					return self.reply("501 Bad PORT").await;
				}
				let ip = Ipv4Addr::new(n[0] as u8, n[1] as u8, n[2] as u8, n[3] as u8);
				self.data = Some(DataPlan::Connect(SocketAddr::from((ip, n[4] * 256 + n[5]))));
				self.reply("200 PORT command successful").await
			}
			"RETR" => {
				let content = self.state.files.lock().unwrap().get(&arg).cloned();
				match content {
					Some(content) => self.send_data(&content).await,
					None => {
						self.data = None;
						self.reply("550 No such file").await
					}
				}
			}
			"LIST" | "MLSD" | "NLST" => {
				let listing = self.listing(&verb);
				self.send_data(&listing).await
			}
			"STOR" | "APPE" => {
				let plan = match self.data.take() {
					Some(plan) => plan,
					None => return self.reply("425 Use PORT or PASV first").await,
				};
				if !self.reply("150 Ok to send data").await {
					return false;
				}
				let mut received = Vec::new();
				if let Ok(mut stream) = plan.open().await {
					let _ = stream.read_to_end(&mut received).await;
				}
				{
					let mut files = self.state.files.lock().unwrap();
					let entry = files.entry(arg.clone()).or_default();
					if verb == "STOR" {
						entry.clear();
					}
					entry.extend_from_slice(&received);
				}
				self.reply("226 Transfer complete").await
			}
			"DELE" => {
				let removed = self.state.files.lock().unwrap().remove(&arg).is_some();
				if removed {
					self.reply("250 Deleted").await
				} else {
					self.reply("550 No such file").await
				}
			}
			"SIZE" => {
				let size = self.state.files.lock().unwrap().get(&arg).map(Vec::len);
				match size {
					Some(size) => self.reply(&format!("213 {}", size)).await,
					None => self.reply("550 No such file").await,
				}
			}
			"MDTM" => {
				let exists = self.state.files.lock().unwrap().contains_key(&arg);
				if exists {
					self.reply("213 20240101120000").await
				} else {
					self.reply("550 No such file").await
				}
			}
			"NOOP" => self.reply("200 NOOP ok").await,
			"OPTS" => self.reply("200 UTF8 set to on").await,
			"SITE" => match arg.strip_prefix("ECHO ") {
				Some(text) => self.reply(&format!("200 {}", text)).await,
				None => self.reply("500 Unknown SITE command").await,
			},
			"REIN" => {
				self.user_ok = false;
				self.cwd = "/".to_string();
				self.reply("220 Ready for new user").await
			}
			"QUIT" => {
				self.reply("221 Goodbye").await;
				false
			}
			_ => self.reply("500 Unknown command").await,
		}
	}

	async fn send_data(&mut self, payload: &[u8]) -> bool {
		let plan = match self.data.take() {
			Some(plan) => plan,
			None => return self.reply("425 Use PORT or PASV first").await,
		};
		if !self.reply("150 Opening data connection").await {
			return false;
		}
		match plan.open().await {
			Ok(mut stream) => {
				match self.state.options.data_pace {
					Some(pace) => {
						for chunk in payload.chunks(payload.len().div_ceil(5).max(1)) {
							tokio::time::sleep(pace).await;
							if stream.write_all(chunk).await.is_err() {
								break;
							}
						}
					}
					None => {
						let _ = stream.write_all(payload).await;
					}
				}
				let _ = stream.shutdown().await;
				self.reply("226 Transfer complete").await
			}
			Err(_) => self.reply("425 Can't open data connection").await,
		}
	}
}

async fn serve(state: Arc<ServerState>, stream: TcpStream) {
	let (reader, writer) = stream.into_split();
	let mut conn = Connection { state, writer, cwd: "/".to_string(), user_ok: false, data: None, stalled: None };
	let greeting = conn.state.options.greeting.join("\r\n");
	if !conn.reply(&greeting).await {
		return;
	}

	let mut lines = BufReader::new(reader).lines();
	while let Ok(Some(line)) = lines.next_line().await {
		conn.state.commands.lock().unwrap().push(line.clone());
		if !conn.dispatch(&line).await {
			break;
		}
	}
}

// vim: ts=4
