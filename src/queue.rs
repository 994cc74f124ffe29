//! FIFO of commands waiting for the dispatcher

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::future::CommandFuture;
use crate::result::CommandResult;

/// A queued command and the future its result will be bound to
pub(crate) struct PendingCommand {
	pub future: CommandFuture,
	pub command: Box<dyn Command>,
}

impl PendingCommand {
	pub fn new(command: Box<dyn Command>) -> Self {
		PendingCommand { future: CommandFuture::new(command.label()), command }
	}
}

/// The command currently bound as the session's current future
pub(crate) struct InFlight {
	pub future: CommandFuture,
	pub command: Box<dyn Command>,
	pub quit: CancellationToken,
}

impl InFlight {
	pub fn new(pending: PendingCommand, quit: CancellationToken) -> Self {
		InFlight { future: pending.future, command: pending.command, quit }
	}

	/// Bind `result` and release anything the command still waits on
	pub fn finish(mut self, result: CommandResult) {
		self.command.quit_execution();
		self.quit.cancel();
		self.future.complete(result);
	}
}

/// Multi-producer, single-consumer command queue
#[derive(Default)]
pub(crate) struct CommandQueue {
	items: Mutex<VecDeque<PendingCommand>>,
	notify: Notify,
}

impl CommandQueue {
	pub fn new() -> Self {
		CommandQueue::default()
	}

	pub fn push(&self, pending: PendingCommand) {
		self.items.lock().unwrap_or_else(PoisonError::into_inner).push_back(pending);
		self.notify.notify_one();
	}

	/// Wait for the oldest pending command
	pub async fn pop(&self) -> PendingCommand {
		loop {
			let next = self.items.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
			if let Some(pending) = next {
				return pending;
			}
			self.notify.notified().await;
		}
	}

	/// Remove everything still queued
	pub fn drain(&self) -> Vec<PendingCommand> {
		self.items.lock().unwrap_or_else(PoisonError::into_inner).drain(..).collect()
	}

	pub fn len(&self) -> usize {
		self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
	}
}


// vim: ts=4
