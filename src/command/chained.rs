//! Sequential composition of commands
//!
//! A chain runs its sub-commands one after another on the same control
//! connection while occupying a single queue slot. Results are folded with
//! [`CommandResult::merge`]. With short-circuiting enabled the chain stops at
//! the first failure.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Command, CommandContext};
use crate::error::FtpResult;
use crate::reply::Reply;
use crate::result::CommandResult;

pub struct ChainedCommand {
	commands: Vec<Box<dyn Command>>,
	short_circuit: bool,
	index: usize,
	aggregate: CommandResult,
	executed: bool,
}

impl ChainedCommand {
	pub fn new(commands: Vec<Box<dyn Command>>, short_circuit: bool) -> Self {
		ChainedCommand { commands, short_circuit, index: 0, aggregate: CommandResult::succeeded(), executed: false }
	}

	pub fn len(&self) -> usize {
		self.commands.len()
	}

	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}

	/// Fold a sub-result; true when the chain must stop here
	fn fold(&mut self, result: CommandResult) -> bool {
		let aggregate = std::mem::take(&mut self.aggregate);
		self.aggregate = aggregate.merge(result);
		self.short_circuit && !self.aggregate.is_success()
	}

	/// Run sub-commands from `self.index` until one waits for a reply or the
	/// chain is finished. Fatal execution errors end the chain and propagate.
	async fn advance(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		while let Some(command) = self.commands.get_mut(self.index) {
			let outcome = if !command.is_valid_context(ctx.state) {
				debug!("Skipping '{}': not valid in the current state", command.label());
				CommandResult::failed()
			} else if command.has_executed() && !command.is_reusable() {
				warn!("Skipping '{}': already executed", command.label());
				CommandResult::failed()
			} else {
				match command.execute(ctx).await {
					Ok(None) => return Ok(None),
					Ok(Some(result)) => result,
					Err(e) if e.is_fatal() => return Err(e),
					Err(e) => {
						warn!("'{}' failed to execute: {}", command.label(), e);
						CommandResult::failed()
					}
				}
			};

			if self.fold(outcome) {
				return Ok(Some(self.aggregate.clone()));
			}
			self.index += 1;
		}
		Ok(Some(self.aggregate.clone()))
	}
}

#[async_trait]
impl Command for ChainedCommand {
	fn label(&self) -> String {
		let labels: Vec<String> = self.commands.iter().map(|c| c.label()).collect();
		format!("[{}]", labels.join(", "))
	}

	fn has_executed(&self) -> bool {
		self.executed
	}

	async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> FtpResult<Option<CommandResult>> {
		self.executed = true;
		self.index = 0;
		self.aggregate = CommandResult::succeeded();
		self.advance(ctx).await
	}

	async fn handle(&mut self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		let command = match self.commands.get_mut(self.index) {
			Some(command) => command,
			None => return Some(self.aggregate.clone()),
		};
		let result = command.handle(ctx, reply).await?;

		if self.fold(result) {
			return Some(self.aggregate.clone());
		}
		self.index += 1;
		match self.advance(ctx).await {
			Ok(outcome) => outcome,
			Err(e) => {
				warn!("Chain {} stopped: {}", self.label(), e);
				ctx.request_close();
				Some(CommandResult::failed())
			}
		}
	}

	fn quit_execution(&mut self) {
		if let Some(command) = self.commands.get_mut(self.index) {
			command.quit_execution();
		}
	}
}


// vim: ts=4
