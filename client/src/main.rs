use clap::Parser;
use client::input::{InputManager, PointerState};
use client::network::{NetworkEvent, NetworkHandle};
use client::rendering::Renderer;
use client::scene::CampScene;
use log::{error, info, warn};
use macroquad::prelude::*;
use shared::{WORLD_HEIGHT, WORLD_WIDTH};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Campfire".to_owned(),
        window_width: WORLD_WIDTH as i32,
        window_height: WORLD_HEIGHT as i32,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let mut network = match NetworkHandle::spawn(&args.server, args.fake_ping) {
        Ok(network) => network,
        Err(e) => {
            error!("Failed to start network session: {}", e);
            return;
        }
    };

    let mut renderer = Renderer::new();
    let mut input = InputManager::new();
    let mut scene: Option<CampScene> = None;
    let mut status = "Connecting...".to_string();

    while !is_key_pressed(KeyCode::Escape) {
        for event in network.poll() {
            match event {
                NetworkEvent::Joined { player_id, state } => match CampScene::new(&player_id, state) {
                    Ok(joined) => scene = Some(joined),
                    Err(e) => error!("Invalid room snapshot: {}", e),
                },
                NetworkEvent::Patch { tick, changes } => {
                    let Some(scene) = scene.as_mut() else {
                        continue;
                    };
                    for change in &changes {
                        if let Err(e) = scene.apply(change) {
                            warn!("Tick {}: failed to apply change to {}: {}", tick, change.path, e);
                        }
                    }
                }
                NetworkEvent::Disconnected { reason } => {
                    status = format!("Disconnected: {}", reason);
                    scene = None;
                }
            }
        }

        match scene.as_ref().filter(|scene| scene.is_mounted()) {
            Some(scene) => {
                let viewport = renderer.viewport();
                let pointer = PointerState::sample(|point| viewport.to_world(point));
                for message in input.update(pointer, std::time::Instant::now(), scene) {
                    network.send(message);
                }
                renderer.render(scene);
            }
            None => renderer.render_waiting(&status),
        }

        next_frame().await;
    }

    network.shutdown();
}
