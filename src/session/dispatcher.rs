//! Dispatcher task and reply routing
//!
//! The dispatcher pulls one command at a time, binds it as the current
//! command, executes it and waits for its future before pulling the next.
//! Replies framed by the reader task are routed here: session-wide handlers
//! first, then the current command.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Shared;
use crate::command::CommandContext;
use crate::control::run_reader;
use crate::queue::{InFlight, PendingCommand};
use crate::reply::Reply;
use crate::result::CommandResult;

/// Resolve once `after` has passed with no data moving. Each data phase
/// stops the clock and restarts it from zero when it ends.
async fn expire(after: Option<Duration>, data_active: &mut watch::Receiver<bool>) {
	let Some(after) = after else {
		return std::future::pending().await;
	};
	loop {
		while *data_active.borrow_and_update() {
			if data_active.changed().await.is_err() {
				break;
			}
		}
		tokio::select! {
			_ = tokio::time::sleep(after) => return,
			changed = data_active.changed() => {
				if changed.is_err() {
					return tokio::time::sleep(after).await;
				}
			}
		}
	}
}

pub(crate) async fn run(shared: Arc<Shared>, stop: CancellationToken, generation: u64) {
	debug!("Dispatcher started for session {}", shared.id);
	let command_timeout = shared.config.command_timeout();
	let mut data_active = shared.state.lock().await.data_active.subscribe();

	loop {
		let pending = tokio::select! {
			biased;
			_ = stop.cancelled() => break,
			pending = shared.queue.pop() => pending,
		};
		let future = pending.future.clone();
		if !shared.start(pending, &stop).await {
			continue;
		}
		shared.spawn_reader(generation);

		let completed = tokio::select! {
			biased;
			_ = stop.cancelled() => false,
			_ = future.wait() => true,
			_ = expire(command_timeout, &mut data_active) => {
				warn!("'{}' got no result within {:?}", future.label(), command_timeout.unwrap_or_default());
				shared.teardown_link(generation, "command timed out").await;
				false
			}
		};
		if !completed {
			break;
		}
	}

	shared.teardown_link(generation, "dispatcher stopped").await;
	debug!("Dispatcher stopped for session {}", shared.id);
}

impl Shared {
	/// Bind and execute `pending`; true when its result depends on replies
	async fn start(&self, pending: PendingCommand, stop: &CancellationToken) -> bool {
		let mut state = self.state.lock().await;
		if stop.is_cancelled() {
			pending.future.complete(CommandResult::failed());
			return false;
		}
		if !pending.command.is_valid_context(&state) {
			debug!("'{}' is not valid in state {:?}", pending.future.label(), state.auth);
			pending.future.complete(CommandResult::failed());
			return false;
		}

		let mut inflight = InFlight::new(pending, stop.child_token());
		debug!("Executing '{}' (#{})", inflight.future.label(), inflight.future.id());
		let (outcome, close) = {
			let mut ctx = CommandContext::new(&mut state, inflight.quit.clone());
			let outcome = inflight.command.execute(&mut ctx).await;
			(outcome, ctx.close_requested())
		};

		match outcome {
			Ok(None) => {
				state.current = Some(inflight);
				true
			}
			Ok(Some(result)) => {
				if close {
					self.close_link();
				}
				inflight.finish(result);
				if close {
					self.shutdown_locked(&mut state, "closed by command");
				}
				false
			}
			Err(e) => {
				warn!("'{}' failed to execute: {}", inflight.future.label(), e);
				// Closed before the waiter sees the failure
				if e.is_fatal() {
					self.shutdown_locked(&mut state, "control connection lost");
				}
				inflight.finish(CommandResult::failed());
				false
			}
		}
	}

	/// Start the reply reader once a command is in place to receive the greeting
	fn spawn_reader(self: &Arc<Self>, generation: u64) {
		let taken = {
			let mut link = self.link();
			if link.generation != generation {
				return;
			}
			link.reader.take().map(|reader| (reader, link.stop.clone()))
		};
		if let Some((reader, stop)) = taken {
			tokio::spawn(run_reader(self.clone(), reader, stop, generation));
		}
	}

	/// Deliver one framed reply
	pub(crate) async fn route(&self, reply: Reply, generation: u64) {
		let mut state = self.state.lock().await;
		if !self.is_current(generation) {
			debug!("Reply {} from a replaced connection dropped", reply);
			return;
		}
		debug!("<<< {}", reply);

		let mut current = state.current.take();
		let quit = current.as_ref().map_or_else(CancellationToken::new, |c| c.quit.clone());
		let (outcome, close) = {
			let mut ctx = CommandContext::new(&mut state, quit);
			let outcome = match self.handlers.dispatch(&mut ctx, &reply, current.is_some()) {
				Some(result) => Some(result),
				None => match current.as_mut() {
					Some(inflight) => inflight.command.handle(&mut ctx, &reply).await,
					None => {
						debug!("No command awaiting reply {}; dropped", reply);
						None
					}
				},
			};
			(outcome, ctx.close_requested())
		};

		if close {
			// Waiters woken by the result must already see the link as closed
			self.close_link();
		}
		match (current, outcome) {
			(Some(inflight), Some(result)) => {
				debug!("'{}' completed: success={}", inflight.future.label(), result.is_success());
				inflight.finish(result);
			}
			(Some(inflight), None) => state.current = Some(inflight),
			(None, _) => {}
		}
		if close {
			self.shutdown_locked(&mut state, "closed on server reply");
		}
	}
}

// vim: ts=4
