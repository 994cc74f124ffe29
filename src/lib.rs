//! # ftplink - Queued RFC 959 FTP Client Engine
//!
//! ftplink drives an FTP control connection from a FIFO command queue.
//! Every queued command returns a [`CommandFuture`] that resolves once the
//! server's replies for that command have been consumed; data transfers are
//! synchronised with the control replies that announce them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ftplink::{ClientConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(ClientConfig::new("ftp.example.com", 21));
//!     session.connect("anonymous", Some("guest")).await?.wait_data().await?;
//!
//!     let readme = session.retrieve_file("README")?;
//!     let listing = session.list(None)?;
//!     println!("{}", String::from_utf8_lossy(&listing.wait_data().await?));
//!     println!("{} bytes", readme.wait_data().await?.len());
//!
//!     session.quit()?.wait().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Commands
//!
//! ```rust,ignore
//! use ftplink::command::{ChainedCommand, RawCommand};
//!
//! let chain = ChainedCommand::new(
//!     vec![
//!         Box::new(RawCommand::new("SITE CHMOD 644 index.html", &[200])),
//!         Box::new(RawCommand::new("SITE CHMOD 755 cgi-bin", &[200])),
//!     ],
//!     true,
//! );
//! let ok = session.queue_command(Box::new(chain))?.wait().await.is_success();
//! ```

pub mod command;
pub mod config;
mod control;
pub mod data;
pub mod error;
pub mod future;
pub mod handler;
pub mod logging;
mod queue;
pub mod reply;
pub mod result;
pub mod session;
pub mod state;
pub mod util;

// Re-export commonly used types
pub use command::{ChainedCommand, Command, CommandContext};
pub use config::ClientConfig;
pub use error::{FtpError, FtpResult};
pub use future::CommandFuture;
pub use handler::{HandlerRegistry, ReplyHandler};
pub use reply::{Reply, ReplyFramer};
pub use result::CommandResult;
pub use session::{LinkStatus, Session};
pub use state::{AuthPhase, DataMode, SessionState, TransferType};

// vim: ts=4
