#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use anyhow::Result;
use async_trait::async_trait;
use clap::{ArgGroup, Parser, Subcommand};
use slackline::channels::{Handler, Identity, Message, MessageKind, Presence};
use slackline::config::Config;
use slackline::slack::{Room, SlackBackend};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// `slackline` - Slack real-time messaging for chat bots.
#[derive(Parser, Debug)]
#[command(name = "slackline")]
#[command(version)]
#[command(about = "Connect a bot to Slack's real-time messaging API.", long_about = None)]
struct Cli {
    /// Path to config.toml (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect and log inbound messages and presence until Ctrl-C
    Run {
        /// Answer every message with its own text
        #[arg(long)]
        echo: bool,
    },

    /// List rooms the bot is in
    Rooms,

    /// Inspect or manage a single room
    Room {
        /// Room name (`general`, `#general`), id or channel link
        room: String,

        #[command(subcommand)]
        action: RoomAction,
    },

    /// Resolve a user name to an id, or an id to a name
    Whois { user: String },

    /// Send one message and exit
    #[command(group(ArgGroup::new("target").required(true).args(["room", "user"])))]
    Send {
        /// Room to post in
        #[arg(long)]
        room: Option<String>,

        /// User to message directly
        #[arg(long)]
        user: Option<String>,

        text: String,
    },
}

#[derive(Subcommand, Debug)]
enum RoomAction {
    /// Show id, kind, membership, topic and purpose
    Info,
    /// Create the room
    Create {
        /// Create a private group instead of a public channel
        #[arg(long)]
        private: bool,
    },
    /// Archive the room
    Destroy,
    Join,
    Leave,
    /// Show the topic, or set it when TEXT is given
    Topic { text: Option<String> },
    /// Show the purpose, or set it when TEXT is given
    Purpose { text: Option<String> },
}

/// Logs traffic; optionally echoes messages back to where they came from.
struct ConsoleHandler {
    backend: Arc<SlackBackend>,
    echo: bool,
}

#[async_trait]
impl Handler for ConsoleHandler {
    async fn on_connected(&self) {
        info!(bot = %self.backend.username(), "Connected to Slack");
    }

    async fn on_message(&self, message: &Message) -> Result<()> {
        info!(
            from = %message.from,
            to = %message.to,
            kind = ?message.kind,
            "{}",
            message.body
        );
        if self.echo && message.from.node() != self.backend.username() {
            let reply = self.backend.build_reply(message, &message.body, false);
            self.backend.send_message(&reply).await;
        }
        Ok(())
    }

    async fn on_presence(&self, presence: &Presence) -> Result<()> {
        info!(user = %presence.identifier, status = ?presence.status, "Presence changed");
        Ok(())
    }

    async fn on_disconnected(&self) {
        info!("Disconnected from Slack");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    slackline::logging::init(&config.log_level)?;

    let backend = match SlackBackend::from_config(&config.slack).await {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            // Missing token or rejected auth: nothing else can work.
            error!(fatal = e.is_fatal(), "{e}");
            return Err(e.into());
        }
    };

    match cli.command {
        Commands::Run { echo } => {
            let shutdown = CancellationToken::new();
            let on_interrupt = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let handler = ConsoleHandler {
                backend: backend.clone(),
                echo,
            };
            backend.run(&handler, shutdown).await?;
            Ok(())
        }

        Commands::Rooms => {
            for room in backend.rooms().await? {
                println!("{:<24} {}", room.to_string(), room.id().await?);
            }
            Ok(())
        }

        Commands::Room { room, action } => {
            let room = backend.query_room(&room).await?;
            room_command(&room, action).await
        }

        Commands::Whois { user } => {
            let looks_like_id = user.starts_with(['U', 'W'])
                && user[1..]
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
            if looks_like_id {
                println!("{user} -> @{}", backend.resolve_user_name(&user).await?);
            } else {
                let id = backend.resolve_user_id(&user).await?;
                println!("@{} -> {id}", user.trim_start_matches('@'));
            }
            Ok(())
        }

        Commands::Send { room, user, text } => {
            let (kind, to) = match (room, user) {
                // Names, ids and channel links all resolve to the room's name.
                (Some(room), _) => (
                    MessageKind::Group,
                    backend.query_room(&room).await?.identity(),
                ),
                (None, Some(user)) => (MessageKind::Direct, Identity::user(user)),
                (None, None) => unreachable!("clap requires --room or --user"),
            };
            backend.connect().await?;
            let message = Message::new(text, kind, backend.identity().clone(), to);
            backend.send_message(&message).await;
            Ok(())
        }
    }
}

async fn room_command(room: &Room, action: RoomAction) -> Result<()> {
    match action {
        RoomAction::Info => {
            if !room.exists().await? {
                println!("{room} does not exist");
                return Ok(());
            }
            println!("Room:     {room}");
            println!("Id:       {}", room.id().await?);
            println!("Kind:     {}", room.kind().await?);
            println!("Joined:   {}", room.joined().await?);
            println!("Topic:    {}", room.topic().await?.unwrap_or_default());
            println!("Purpose:  {}", room.purpose().await?.unwrap_or_default());
        }
        RoomAction::Create { private } => {
            room.create(private).await?;
            println!("Created {room}");
        }
        RoomAction::Destroy => {
            room.destroy().await?;
            println!("Archived {room}");
        }
        RoomAction::Join => {
            room.join().await?;
            println!("Joined {room}");
        }
        RoomAction::Leave => {
            room.leave().await?;
            println!("Left {room}");
        }
        RoomAction::Topic { text: Some(text) } => room.set_topic(&text).await?,
        RoomAction::Topic { text: None } => {
            println!("{}", room.topic().await?.unwrap_or_default());
        }
        RoomAction::Purpose { text: Some(text) } => room.set_purpose(&text).await?,
        RoomAction::Purpose { text: None } => {
            println!("{}", room.purpose().await?.unwrap_or_default());
        }
    }
    Ok(())
}
