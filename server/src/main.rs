use clap::Parser;
use log::info;
use server::config::RoomConfig;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Fire value lost per second
    #[arg(long, default_value = "8")]
    fire_decay: f64,

    /// Fire value at which the large fire shows
    #[arg(long, default_value = "200", value_parser = positive_f64)]
    fire_threshold: f64,

    /// Milliseconds before a burned log comes back
    #[arg(long, default_value = "5000")]
    log_cooldown: f64,

    /// Milliseconds before an unreleased drag is abandoned
    #[arg(long, default_value = "5000")]
    drag_timeout: u64,
}

fn positive_f64(value: &str) -> Result<f64, String> {
    let number: f64 = value.parse().map_err(|e| format!("`{}` is not a number: {}", value, e))?;
    if number.is_finite() && number > 0.0 {
        Ok(number)
    } else {
        Err(format!("`{}` must be greater than zero", value))
    }
}

impl Args {
    fn room_config(&self) -> RoomConfig {
        RoomConfig {
            fire_decay: self.fire_decay,
            fire_threshold: self.fire_threshold,
            log_cooldown: self.log_cooldown,
            drag_timeout: self.drag_timeout,
            ..RoomConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64);

    info!("Starting campfire server on {}", address);
    info!("Tick rate: {}Hz, max clients: {}", args.tick_rate, args.max_clients);

    let mut server = Server::new(&address, tick_duration, args.max_clients, args.room_config()).await?;
    server.run().await?;

    Ok(())
}
