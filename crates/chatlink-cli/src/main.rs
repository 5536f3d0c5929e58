//! chatlink terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Connect to a local server as user 42 and open #general
//! chatlink --user 42 --channel general
//!
//! # Verbose protocol logging on stderr
//! chatlink --user 42 --server https://chat.example.com --log-level debug
//! ```

use chatlink_app::{RuntimeConfig, Session, SystemEnv, WebSocketDriver};
use chatlink_cli::{Command, Flow, Repl};
use chatlink_client::{ChannelId, ClientConfig, DEFAULT_SERVER_URL, UserId};
use clap::Parser;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// chatlink terminal client
#[derive(Parser, Debug)]
#[command(name = "chatlink")]
#[command(about = "Line-oriented client for chatlink servers")]
#[command(version)]
struct Args {
    /// Server base URL (http, https, ws or wss)
    #[arg(short, long, default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// User id to connect as
    #[arg(short, long)]
    user: String,

    /// Channel to join once connected
    #[arg(short, long)]
    channel: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // Logs go to stderr so they do not interleave with chat output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = RuntimeConfig {
        client: ClientConfig { server_url: args.server, ..ClientConfig::default() },
        ..RuntimeConfig::default()
    };

    let (handle, task) = Session::start(config, WebSocketDriver::new(), SystemEnv::new());
    let mut notifications = handle.subscribe();
    let mut repl = Repl::new(handle.clone(), UserId::from(args.user), std::io::stdout());

    repl.execute(Command::Connect).await?;
    if let Some(channel) = args.channel {
        repl.execute(Command::Join(ChannelId::from(channel))).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if repl.line(&line).await? == Flow::Quit {
                        break;
                    }
                },
                None => break,
            },
            notification = notifications.recv() => match notification {
                Ok(notification) => repl.notify(&notification)?,
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "output lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    if let Err(error) = handle.shutdown().await {
        tracing::debug!(%error, "session already stopped");
    }
    task.await?;

    Ok(())
}
