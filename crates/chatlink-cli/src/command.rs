//! Slash-command parsing.
//!
//! Lines starting with `/` are commands; anything else is a message for the
//! active channel.

use chatlink_client::ChannelId;
use thiserror::Error;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/connect`
    Connect,
    /// `/disconnect`
    Disconnect,
    /// `/join <channel>`
    Join(ChannelId),
    /// `/leave [channel]`, defaulting to the active channel
    Leave(Option<ChannelId>),
    /// `/leave-all`
    LeaveAll,
    /// `/switch [channel]`; no argument clears the active channel
    Switch(Option<ChannelId>),
    /// `/go <route>`
    Navigate(String),
    /// `/typing on|off`
    Typing(bool),
    /// `/attach <url> <file name> [text]`
    Attach {
        /// Attachment URL
        url: String,
        /// Attachment file name
        file_name: String,
        /// Accompanying text
        text: String,
    },
    /// `/status`
    Status,
    /// `/help`
    Help,
    /// `/quit`
    Quit,
    /// Plain text for the active channel
    Say(String),
}

/// Input that is not a valid command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Known command with the wrong arguments
    #[error("usage: {0}")]
    Usage(&'static str),

    /// Command not recognized
    #[error("unknown command /{0}, try /help")]
    Unknown(String),
}

/// Help text listing every command.
pub const HELP: &str = "\
/connect                 connect to the server
/disconnect              leave every channel and disconnect
/join <channel>          join a channel and make it active
/leave [channel]         leave a channel (default: active)
/leave-all               leave every channel
/switch [channel]        switch the active channel (none: clear)
/go <route>              navigate, e.g. /go /channels/general
/typing on|off           send a typing indicator
/attach <url> <name> ..  send a message with an attachment
/status                  show connection and channel state
/quit                    disconnect and exit
anything else            send to the active channel";

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some(body) = line.strip_prefix('/') else {
        return Ok(Some(Command::Say(line.to_string())));
    };

    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    let mut args = rest.split_whitespace();

    let command = match name {
        "connect" => Command::Connect,
        "disconnect" => Command::Disconnect,
        "join" => Command::Join(args.next().map(ChannelId::from).ok_or(CommandError::Usage(
            "/join <channel>",
        ))?),
        "leave" => Command::Leave(args.next().map(ChannelId::from)),
        "leave-all" => Command::LeaveAll,
        "switch" => Command::Switch(args.next().map(ChannelId::from)),
        "go" => match args.next() {
            Some(route) => Command::Navigate(route.to_string()),
            None => return Err(CommandError::Usage("/go <route>")),
        },
        "typing" => match args.next() {
            Some("on") => Command::Typing(true),
            Some("off") => Command::Typing(false),
            _ => return Err(CommandError::Usage("/typing on|off")),
        },
        "attach" => {
            let (Some(url), Some(file_name)) = (args.next(), args.next()) else {
                return Err(CommandError::Usage("/attach <url> <file name> [text]"));
            };
            Command::Attach {
                url: url.to_string(),
                file_name: file_name.to_string(),
                text: args.collect::<Vec<_>>().join(" "),
            }
        },
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}
