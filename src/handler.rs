//! Session-wide reply handlers
//!
//! Handlers see every reply before the current command does. A handler that
//! claims a reply produces the result bound to the current future (if any);
//! the command itself never sees that reply.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::command::CommandContext;
use crate::reply::Reply;
use crate::result::CommandResult;

/// Intercepts replies by code, ahead of the current command
pub trait ReplyHandler: Send + Sync {
	fn name(&self) -> &str;

	/// Codes this handler wants to see
	fn codes(&self) -> &[u16];

	/// When true, the handler only applies while a command is awaiting replies
	fn requires_future(&self) -> bool;

	/// Returning `Some` claims the reply
	fn handle(&self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult>;
}

/// 421: the server is closing the control connection
#[derive(Debug, Default)]
pub struct DisconnectHandler;

impl ReplyHandler for DisconnectHandler {
	fn name(&self) -> &str {
		"disconnect"
	}

	fn codes(&self) -> &[u16] {
		&[421]
	}

	fn requires_future(&self) -> bool {
		false
	}

	fn handle(&self, ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		warn!("Server closing connection: {}", reply);
		ctx.request_close();
		Some(CommandResult::failed())
	}
}

/// 500/501: the server did not understand the command
#[derive(Debug, Default)]
pub struct SyntaxErrorHandler;

impl ReplyHandler for SyntaxErrorHandler {
	fn name(&self) -> &str {
		"syntax-error"
	}

	fn codes(&self) -> &[u16] {
		&[500, 501]
	}

	fn requires_future(&self) -> bool {
		true
	}

	fn handle(&self, _ctx: &mut CommandContext<'_>, reply: &Reply) -> Option<CommandResult> {
		warn!("Command rejected: {}", reply);
		Some(CommandResult::failed())
	}
}

/// Per-session map from reply code to handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
	handlers: HashMap<u16, Arc<dyn ReplyHandler>>,
}

impl HandlerRegistry {
	pub fn new() -> Self {
		HandlerRegistry::default()
	}

	/// Registry with the disconnect and syntax-error handlers
	pub fn with_defaults() -> Self {
		let mut registry = HandlerRegistry::new();
		registry.register(Arc::new(DisconnectHandler));
		registry.register(Arc::new(SyntaxErrorHandler));
		registry
	}

	/// Register `handler` for each of its codes not yet taken; returns how
	/// many codes it received.
	pub fn register(&mut self, handler: Arc<dyn ReplyHandler>) -> usize {
		let mut taken = 0;
		for &code in handler.codes() {
			if let std::collections::hash_map::Entry::Vacant(slot) = self.handlers.entry(code) {
				slot.insert(handler.clone());
				taken += 1;
			} else {
				debug!("Code {} already handled; '{}' not registered for it", code, handler.name());
			}
		}
		taken
	}

	pub fn handles(&self, code: u16) -> bool {
		self.handlers.contains_key(&code)
	}

	/// Offer `reply` to its handler. `has_future` tells whether a command is
	/// currently awaiting replies.
	pub fn dispatch(&self, ctx: &mut CommandContext<'_>, reply: &Reply, has_future: bool) -> Option<CommandResult> {
		let handler = self.handlers.get(&reply.code())?;
		if handler.requires_future() && !has_future {
			return None;
		}
		handler.handle(ctx, reply)
	}
}

impl std::fmt::Debug for HandlerRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut codes: Vec<_> = self.handlers.iter().map(|(code, h)| (*code, h.name().to_string())).collect();
		codes.sort();
		f.debug_struct("HandlerRegistry").field("handlers", &codes).finish()
	}
}


// vim: ts=4
