use clap::Parser;
use log::info;
use protocol::PlayerInfo;
use server::{MockConfig, MockServer};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "2306")]
    port: u16,

    /// RCON password admins must log in with
    #[arg(short = 'P', long, default_value = "changeme")]
    password: String,

    /// Largest response body sent in one datagram
    #[arg(long, default_value = "1024")]
    fragment_size: usize,

    /// Number of fake players to populate the roster with
    #[arg(long, default_value = "0")]
    players: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = MockConfig {
        password: args.password,
        fragment_size: args.fragment_size,
        ..MockConfig::default()
    };
    let address = format!("{}:{}", args.host, args.port);
    let server = MockServer::bind(&address, config).await?;

    server
        .set_players(
            (0..args.players)
                .map(|slot| PlayerInfo {
                    number: slot.to_string(),
                    name: format!("Player{}", slot),
                    guid: format!("{:032x}", u64::from(slot) + 1),
                    ip: "127.0.0.1".to_string(),
                    port: 2304 + (slot % 1000) as u16,
                    verified: true,
                    ping: 30,
                    lobby: false,
                })
                .collect(),
        )
        .await;

    let handle = server.spawn();
    info!("Mock server started successfully");

    tokio::select! {
        result = handle => {
            if let Err(e) = result {
                eprintln!("Server task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down...");
        }
    }

    // Give in-flight responses a moment before the runtime stops
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
