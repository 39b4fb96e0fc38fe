use clap::Parser;
use client::{Config, RconClient, RconEvent, TaskKind};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file; flags override its values
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Server host name or address (no short -h to avoid conflict with --help)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Server RCON port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// RCON password
    #[arg(short = 'P', long)]
    password: Option<String>,

    /// Stay down after a lost connection instead of reconnecting
    #[arg(long)]
    no_reconnect: bool,

    /// Message broadcast to all players on a fixed period
    #[arg(long)]
    announce: Option<String>,

    /// Seconds between announcements
    #[arg(long, default_value = "600")]
    announce_every: u64,
}

impl Args {
    fn into_config(self) -> Result<(Config, Option<(String, u64)>), client::RconError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(password) = self.password {
            config.password = password;
        }
        if self.no_reconnect {
            config.auto_reconnect = false;
        }

        let announce = self.announce.map(|message| (message, self.announce_every));
        Ok((config, announce))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let (config, announce) = Args::parse().into_config()?;

    info!("Starting RCON client...");
    info!("Server: {}", config.server_addr());
    info!("Commands: players, say <msg>, kick <slot> <reason>, ban <guid> <minutes> <reason>,");
    info!("          lock, unlock, bans, missions, refresh, shutdown, quit; anything else is sent raw");

    let client = RconClient::new(config);
    let mut events = client.subscribe();
    client.start()?;

    if let Some((message, every)) = announce {
        let period = Duration::from_secs(every.max(1));
        client
            .add_task(TaskKind::GlobalMessage, message, true, period, Duration::ZERO)
            .await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(RconEvent::ShutdownRequested) => {
                        info!("Server shutdown requested, exiting");
                        break;
                    }
                    Ok(event) => print_event(&event),
                    Err(RecvError::Lagged(missed)) => warn!("Missed {} events", missed),
                    Err(RecvError::Closed) => break,
                }
            },

            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !run_command(&client, line.trim()).await {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            },

            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            },
        }
    }

    client.shutdown().await;
    Ok(())
}

/// Runs one operator command; returns `false` to quit.
async fn run_command(client: &RconClient, line: &str) -> bool {
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));

    let result = match verb {
        "" => return true,
        "quit" | "exit" => return false,
        "players" => {
            match client.players().await {
                Ok(players) => {
                    for player in players {
                        println!(
                            "#{:<3} {:<24} {:<16} {:>5}ms  {}{}",
                            player.number,
                            player.name,
                            player.ip,
                            player.ping,
                            player.guid,
                            if player.verified { " (verified)" } else { "" }
                        );
                    }
                }
                Err(e) => error!("{}", e),
            }
            return true;
        }
        "say" => client.say(rest).await,
        "kick" => {
            let (slot, reason) = rest.split_once(' ').unwrap_or((rest, ""));
            client.kick(slot, reason).await
        }
        "ban" => {
            let mut parts = rest.splitn(3, ' ');
            let guid = parts.next().unwrap_or("");
            let minutes = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);
            let reason = parts.next().unwrap_or("");
            client.ban_guid(guid, minutes, reason).await
        }
        "lock" => client.lock().await,
        "unlock" => client.unlock().await,
        "bans" => client.request_bans().await,
        "missions" => client.request_missions().await,
        "refresh" => client.refresh_players().await,
        "shutdown" => client.shutdown_server().await,
        "restart" => {
            if let Err(e) = client.restart() {
                error!("{}", e);
            }
            return true;
        }
        _ => client.send_command(line).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
    }
    true
}

fn print_event(event: &RconEvent) {
    match event {
        RconEvent::LoggedIn => println!("* logged in"),
        RconEvent::LoginFailed => println!("* login rejected"),
        RconEvent::Disconnected(reason) => println!("* disconnected: {}", reason),
        RconEvent::ReconnectExhausted => println!("* giving up; type 'restart' to retry"),
        RconEvent::PlayerConnected(p) => println!("+ #{} {} ({}:{})", p.number, p.name, p.ip, p.port),
        RconEvent::PlayerDisconnected(p) => println!("- #{} {}", p.number, p.name),
        RconEvent::PlayerVerified(p) => println!("= #{} {} verified {}", p.number, p.name, p.guid),
        RconEvent::Chat(line) => println!("> {}", line),
        RconEvent::CommandResponse { text, .. } => println!("{}", text),
        RconEvent::Missions(missions) => {
            for mission in missions {
                println!("  {}", mission);
            }
        }
        RconEvent::Bans(bans) => {
            for ban in bans {
                let left = ban
                    .minutes_left
                    .map_or("perm".to_string(), |minutes| format!("{}m", minutes));
                println!("  {:<3} {:<34} {:<6} {}", ban.index, ban.guid, left, ban.reason);
            }
        }
        RconEvent::ShutdownRequested => {}
    }
}
