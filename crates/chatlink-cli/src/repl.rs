//! Command execution against a running session.

use std::io::{self, Write};

use chatlink_app::SessionHandle;
use chatlink_client::{ChannelId, Notification, UserId};
use tracing::debug;

use crate::{
    command::{self, Command, HELP},
    render,
};

/// Whether the input loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line
    Continue,
    /// Exit
    Quit,
}

/// Executes input lines against a session and writes the results to `out`.
pub struct Repl<W> {
    handle: SessionHandle,
    user_id: UserId,
    out: W,
}

impl<W: Write> Repl<W> {
    /// Create a REPL that connects as `user_id`.
    pub fn new(handle: SessionHandle, user_id: UserId, out: W) -> Self {
        Self { handle, user_id, out }
    }

    /// Output sink.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Parse and execute one input line.
    ///
    /// Session errors are reported to the output; only output failures are
    /// returned.
    pub async fn line(&mut self, line: &str) -> io::Result<Flow> {
        match command::parse(line) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => Ok(Flow::Continue),
            Err(error) => {
                writeln!(self.out, "! {error}")?;
                Ok(Flow::Continue)
            },
        }
    }

    /// Execute a parsed command.
    pub async fn execute(&mut self, command: Command) -> io::Result<Flow> {
        debug!(?command, "executing");

        let result = match command {
            Command::Connect => self.handle.connect(self.user_id.clone()).await,
            Command::Disconnect => self.handle.disconnect().await,
            Command::Join(channel_id) => self.handle.join(channel_id).await,
            Command::Leave(channel_id) => match channel_id.or_else(|| self.active()) {
                Some(channel_id) => self.handle.leave(channel_id).await,
                None => return self.no_active_channel(),
            },
            Command::LeaveAll => self.handle.leave_all().await,
            Command::Switch(target) => self.handle.switch_channel(target).await,
            Command::Navigate(route) => self.handle.navigate(route).await,
            Command::Typing(is_typing) => match self.active() {
                Some(channel_id) => self.handle.send_typing(channel_id, is_typing).await,
                None => return self.no_active_channel(),
            },
            Command::Attach { url, file_name, text } => match self.active() {
                Some(channel_id) => {
                    self.handle.send_attachment(channel_id, text, url, file_name).await
                },
                None => return self.no_active_channel(),
            },
            Command::Say(text) => match self.active() {
                Some(channel_id) => self.handle.send_message(channel_id, text).await,
                None => return self.no_active_channel(),
            },
            Command::Status => {
                writeln!(self.out, "{}", render::status(&self.handle.snapshot()))?;
                Ok(())
            },
            Command::Help => {
                writeln!(self.out, "{HELP}")?;
                Ok(())
            },
            Command::Quit => return Ok(Flow::Quit),
        };

        if let Err(error) = result {
            writeln!(self.out, "! {error}")?;
        }
        Ok(Flow::Continue)
    }

    /// Print a session notification.
    pub fn notify(&mut self, notification: &Notification) -> io::Result<()> {
        match render::notification(notification) {
            Some(line) => writeln!(self.out, "{line}"),
            None => Ok(()),
        }
    }

    fn active(&self) -> Option<ChannelId> {
        self.handle.snapshot().active
    }

    fn no_active_channel(&mut self) -> io::Result<Flow> {
        writeln!(self.out, "! no active channel, /join one first")?;
        Ok(Flow::Continue)
    }
}
