//! Control-channel commands and the table that routes lines to them.
//!
//! Each command is a [`Command`] implementation registered by name. A line
//! is split on whitespace; the first token selects the command and the rest
//! are its arguments. The reply is the success payload or the error text.

mod handlers;

use std::collections::BTreeMap;

use renderer::{GraphicsBackend, RendererError};

use crate::state::RenderState;
use crate::subscribers::SubscriberError;

pub use handlers::{
    ColorspaceCommand, FpsCommand, HelpCommand, KillCommand, MessageCommand, MouseCommand,
    QuitCommand, ShaderCommand, StatsCommand, Topic,
};

/// Most tokens accepted on one line, command name included.
pub const MAX_TOKENS: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("too many tokens (at most {MAX_TOKENS} per line)")]
    TooManyTokens,
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("{0}")]
    Invalid(String),
    #[error("unknown help topic '{0}'")]
    UnknownTopic(String),
    #[error(transparent)]
    Subscriber(#[from] SubscriberError),
    #[error(transparent)]
    Shader(#[from] RendererError),
}

impl CommandError {
    /// Errors that must end the process instead of becoming a reply.
    pub fn is_fatal(&self) -> bool {
        match self {
            CommandError::Subscriber(err) => err.is_fatal(),
            CommandError::Shader(err) => !err.is_recoverable(),
            _ => false,
        }
    }
}

pub trait Command<B: GraphicsBackend> {
    fn name(&self) -> &'static str;

    /// One-line synopsis, e.g. `fps [n]`.
    fn usage(&self) -> &'static str;

    fn summary(&self) -> &'static str;

    /// Runs with the arguments after the command name. `Ok` carries the
    /// reply payload, which is empty when there is nothing to report.
    fn execute(&self, state: &mut RenderState<B>, args: &[&str]) -> Result<String, CommandError>;
}

pub struct Dispatcher<B: GraphicsBackend> {
    commands: BTreeMap<&'static str, Box<dyn Command<B>>>,
}

impl<B: GraphicsBackend> Default for Dispatcher<B> {
    fn default() -> Self {
        Self {
            commands: BTreeMap::new(),
        }
    }
}

impl<B: GraphicsBackend> Dispatcher<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full command set, with `help` describing every other entry.
    pub fn standard() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(Box::new(FpsCommand));
        dispatcher.register(Box::new(ColorspaceCommand));
        dispatcher.register(Box::new(MouseCommand));
        dispatcher.register(Box::new(ShaderCommand));
        dispatcher.register(Box::new(MessageCommand));
        dispatcher.register(Box::new(KillCommand));
        dispatcher.register(Box::new(QuitCommand));
        dispatcher.register(Box::new(StatsCommand));

        let topics = dispatcher
            .commands
            .values()
            .map(|command| Topic {
                name: command.name(),
                usage: command.usage(),
                summary: command.summary(),
            })
            .collect();
        dispatcher.register(Box::new(HelpCommand::new(topics)));
        dispatcher
    }

    pub fn register(&mut self, command: Box<dyn Command<B>>) {
        self.commands.insert(command.name(), command);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }

    /// Tokenises `line` and runs the matching command against `state`.
    pub fn dispatch(&self, state: &mut RenderState<B>, line: &str) -> Result<String, CommandError> {
        let tokens = tokenize(line)?;
        let Some((&name, args)) = tokens.split_first() else {
            return Ok(String::new());
        };
        let command = self
            .commands
            .get(name)
            .ok_or_else(|| CommandError::Unknown(name.to_string()))?;
        command.execute(state, args)
    }
}

pub fn tokenize(line: &str) -> Result<Vec<&str>, CommandError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() > MAX_TOKENS {
        return Err(CommandError::TooManyTokens);
    }
    Ok(tokens)
}
