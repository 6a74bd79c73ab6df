//! bridge-peer: run one scene-bridge peer over an in-memory scene
//!
//! Usage:
//!   bridge-peer <a|b> [port]   run a peer listener until Ctrl-C
//!   bridge-peer ping <a|b>     probe a peer and print its reply
//!
//! The listener serves the full command set (`PING`, `IMPORT`, `REPLACE`)
//! against a small demo scene, which makes one process per terminal enough
//! to exercise a whole round trip by hand.

use anyhow::{Result, bail};
use bridge_core::PeerRole;
use bridge_host::{BridgeConfig, BridgeHandler, MemoryScene, SceneExecutor, SceneHost, ping_peer};
use bridge_net::{ListenerConfig, PeerListener};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

fn parse_role(arg: &str) -> Result<PeerRole> {
    match arg {
        "a" | "A" => Ok(PeerRole::A),
        "b" | "B" => Ok(PeerRole::B),
        other => bail!("Unknown peer role '{}' (expected 'a' or 'b')", other),
    }
}

/// A small scene so manual transfers have something to land on
fn demo_scene(role: PeerRole) -> MemoryScene {
    let name = match role {
        PeerRole::A => "demo_scene_a",
        PeerRole::B => "demo_scene_b",
    };
    let mut scene = MemoryScene::new(name);
    scene.create_transform("props", None);
    let crate_obj = scene.create_mesh("crate", Some("|props"));
    scene.create_group("woodSG");
    let _ = scene.assign_faces("woodSG", &["|props|crate|crateShape.f[0:5]".into()]);
    let light = scene.create_light("keyLight");
    let _ = scene.set_light_link(&light, &crate_obj, true);
    let _ = scene.select(&crate_obj);
    scene
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("ping") => {
            let role = parse_role(args.get(2).map(String::as_str).unwrap_or("a"))?;
            let config = BridgeConfig::default();
            let reply = ping_peer(&config, role).await?;
            println!("{}", reply.encode());
            Ok(())
        }
        Some(role_arg) => {
            let role = parse_role(role_arg)?;
            let config = BridgeConfig::default();
            let port = match args.get(2) {
                Some(p) => p.parse()?,
                None => config.port_for(role),
            };
            config.ensure_temp_dir()?;

            info!(
                "Starting peer {} on port {}, temp dir {}",
                role,
                port,
                config.temp_dir().display()
            );

            let executor = SceneExecutor::spawn(demo_scene(role));
            let handler = BridgeHandler::new(executor.handle(), config, role);
            let mut listener = PeerListener::new(ListenerConfig::new(port), Arc::new(handler));
            listener.set_on_connect(|| info!("Peer connected"));
            listener.start().await?;

            tokio::signal::ctrl_c().await?;
            info!("Shutting down");
            listener.stop().await;
            executor.shutdown().await;
            Ok(())
        }
        None => bail!("Usage: bridge-peer <a|b> [port] | bridge-peer ping <a|b>"),
    }
}
