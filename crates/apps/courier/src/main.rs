//! Courier - A terminal client for polling two-party chats
//!
//! This is the main entry point for the Courier application.

use anyhow::{Context, Result};
use chat::{
    BucketStore, ChatBackend, ClientSettings, HttpChatBackend, InMemoryBucketStore,
    RegistrationClient, Session, SqliteBucketStore, UserId,
};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

mod demo;
mod terminal;

use terminal::{Command, HELP, TerminalObserver, describe, parse_command};

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Courier - terminal chat client", long_about = None)]
struct Cli {
    /// Use a built-in in-memory backend instead of the configured server
    #[arg(long, global = true)]
    offline: bool,

    /// Read settings from this file instead of the config directory
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and chat
    Chat {
        user: String,
        #[arg(long, env = "COURIER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account on the registration service
    Register {
        nickname: String,
        email: String,
        #[arg(long, env = "COURIER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Look up the user id registered for an email address
    Whoami {
        email: String,
        #[arg(long, env = "COURIER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Write the effective settings to the config directory
    SaveSettings,
    /// Delete the date dividers remembered for a user
    Forget { user: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => ClientSettings::from_file(path),
        None => ClientSettings::load(),
    }
    .context("Failed to load settings")?;

    match cli.command {
        Commands::Chat { user, password } => run_chat(settings, cli.offline, user, password).await,
        Commands::Register {
            nickname,
            email,
            password,
        } => {
            let client = RegistrationClient::new(settings.registration_url.clone());
            let user = tokio::task::spawn_blocking(move || {
                client.register(&nickname, &email, &password)
            })
            .await??;
            println!("Registered {}", user);
            Ok(())
        }
        Commands::Whoami { email, password } => {
            let client = RegistrationClient::new(settings.registration_url.clone());
            let user =
                tokio::task::spawn_blocking(move || client.lookup_user(&email, &password)).await??;
            println!("{}", user);
            Ok(())
        }
        Commands::SaveSettings => {
            let path = settings.save()?;
            println!("Saved settings to {}", path.display());
            Ok(())
        }
        Commands::Forget { user } => {
            open_bucket_store(&settings).clear_user(&UserId::new(user.as_str()))?;
            println!("Forgot date dividers for {}", user);
            Ok(())
        }
    }
}

fn open_bucket_store(settings: &ClientSettings) -> Arc<dyn BucketStore> {
    let opened = config::ensure_config_dir().and_then(|_| {
        let path = settings
            .bucket_db_path()
            .context("No config directory available")?;
        SqliteBucketStore::new(&path)
    });
    match opened {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("Date buckets will not persist: {:#}", e);
            Arc::new(InMemoryBucketStore::new())
        }
    }
}

async fn run_chat(settings: ClientSettings, offline: bool, user: String, password: String) -> Result<()> {
    let backend: Arc<dyn ChatBackend> = if offline {
        let server = demo::demo_server(&user, &password);
        demo::schedule_newcomer(server.clone(), user.clone(), Duration::from_secs(8));
        server
    } else {
        info!("Using backend at {}", settings.api_root());
        Arc::new(HttpChatBackend::new(&settings))
    };
    let buckets: Arc<dyn BucketStore> = if offline {
        Arc::new(InMemoryBucketStore::new())
    } else {
        open_bucket_store(&settings)
    };

    let (tx, mut events) = mpsc::unbounded_channel();
    let session = Arc::new(Session::new(
        backend,
        buckets,
        Arc::new(TerminalObserver::new(tx)),
        settings,
    ));

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            for line in describe(&event) {
                println!("{}", line);
            }
        }
    });

    let mut login = {
        let session = session.clone();
        tokio::task::spawn_blocking(move || session.login(&user, &password))
    };
    let logged_in = tokio::select! {
        result = &mut login => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling login");
            session.cancel_login();
            login.await?
        }
    };
    if let Err(e) = logged_in {
        drop(session);
        let _ = printer.await;
        return Err(e).context("Login failed");
    }
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing session");
                break;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        break;
                    }
                };
                let command = parse_command(&line);
                if command == Command::Close {
                    break;
                }
                if let Err(e) = run_command(&session, command).await {
                    error!("Command failed: {:#}", e);
                    break;
                }
            }
        }
    }

    let closing = session.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || closing.close()).await? {
        warn!("Close failed: {}", e);
    }
    // Dropping the last session handle drops the observer, which ends the printer
    drop(session);
    let _ = printer.await;
    Ok(())
}

async fn run_command(session: &Arc<Session>, command: Command) -> Result<()> {
    let session = session.clone();
    let result = tokio::task::spawn_blocking(move || match command {
        Command::Open(partner) => session.open_conversation(&partner).map(|_| ()),
        Command::New(partner) => session.create_chat(&partner).map(|_| ()),
        Command::Send(text) => session.send_message(&text).map(|_| ()),
        Command::List => {
            for conversation in session.conversations() {
                let marker = if conversation.unread { "*" } else { " " };
                println!("{} {}", marker, conversation.partner_id);
            }
            Ok(())
        }
        Command::Help => {
            println!("{}", HELP);
            Ok(())
        }
        Command::Close | Command::Empty => Ok(()),
    })
    .await?;

    if let Err(e) = result {
        println!("error: {}", e);
    }
    Ok(())
}
