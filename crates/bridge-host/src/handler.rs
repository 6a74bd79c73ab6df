//! Command handler table for one peer
//!
//! Bridges the wire layer to the scene executor: each command becomes a
//! job on the scene-owner context, and its outcome becomes the reply.
//! Handler failures never escape as errors; they are formatted into
//! `ERR|...` so the listener's accept loop stays untouched.

use async_trait::async_trait;
use bridge_core::{Command, PeerRole, Reply, Result};
use bridge_net::CommandHandler;
use std::path::PathBuf;
use tracing::warn;

use crate::config::BridgeConfig;
use crate::executor::SceneHandle;
use crate::replace::{run_import, run_replace};
use crate::scene::short_name;

/// This peer's handler table
pub struct BridgeHandler {
    scene: SceneHandle,
    config: BridgeConfig,
    role: PeerRole,
    banner: String,
}

impl BridgeHandler {
    pub fn new(scene: SceneHandle, config: BridgeConfig, role: PeerRole) -> Self {
        Self {
            scene,
            config,
            role,
            banner: format!("Peer {} bridge ready", role),
        }
    }

    /// Override the `PONG` banner
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    async fn handle_import(&self, path: String) -> Reply {
        let result = self
            .scene
            .submit(move |scene| run_import(scene, &PathBuf::from(&path)))
            .await;
        match flatten(result) {
            Ok(outcome) => Reply::Ok(format!("Imported {}", short_name(&outcome.object))),
            Err(e) => {
                warn!("Import failed: {}", e);
                Reply::Err(e.reason().to_string())
            }
        }
    }

    async fn handle_replace(&self, scene_name: Option<String>, object: String) -> Reply {
        let config = self.config.clone();
        let role = self.role;
        let result = self
            .scene
            .submit(move |scene| run_replace(scene, role, scene_name, object, &config))
            .await;
        match flatten(result) {
            Ok(outcome) => Reply::Ok(format!("Replaced with {}", outcome.object)),
            Err(e) => {
                warn!("Replace failed: {}", e);
                Reply::Err(e.reason().to_string())
            }
        }
    }
}

fn flatten<T>(result: Result<Result<T>>) -> Result<T> {
    result.and_then(|inner| inner)
}

#[async_trait]
impl CommandHandler for BridgeHandler {
    async fn handle(&self, command: Command) -> Reply {
        match command {
            Command::Ping => Reply::Pong(self.banner.clone()),
            Command::Import { path } => self.handle_import(path).await,
            Command::Replace { scene, object } => self.handle_replace(scene, object).await,
            Command::Unknown { raw } => {
                warn!("Unknown command: {}", raw);
                Reply::unknown(&raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SceneExecutor;
    use crate::memory::MemoryScene;

    fn handler(temp_dir: &std::path::Path) -> (SceneExecutor, BridgeHandler) {
        let executor = SceneExecutor::spawn(MemoryScene::new("shotB"));
        let handler = BridgeHandler::new(
            executor.handle(),
            BridgeConfig::with_temp_dir(temp_dir),
            PeerRole::B,
        );
        (executor, handler)
    }

    #[tokio::test]
    async fn ping_answers_with_banner() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, handler) = handler(dir.path());
        assert_eq!(
            handler.handle(Command::Ping).await,
            Reply::Pong("Peer B bridge ready".into())
        );
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn import_with_missing_path_replies_err() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, handler) = handler(dir.path());
        let reply = handler
            .handle(Command::Import {
                path: dir
                    .path()
                    .join("shot010_crate_toPeerB.fbx")
                    .to_string_lossy()
                    .into_owned(),
            })
            .await;
        match reply {
            Reply::Err(reason) => assert!(reason.starts_with("File not found")),
            other => panic!("Expected ERR, got {:?}", other),
        }
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn replace_for_unknown_session_replies_err() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, handler) = handler(dir.path());
        let reply = handler
            .handle(Command::Replace {
                scene: Some("shot010".into()),
                object: "crate".into(),
            })
            .await;
        assert!(matches!(reply, Reply::Err(_)));
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_command_echoes_raw_text() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, handler) = handler(dir.path());
        let reply = handler
            .handle(Command::Unknown {
                raw: "FOO|bar".into(),
            })
            .await;
        assert_eq!(reply, Reply::Err("Unknown command: FOO|bar".into()));
        executor.shutdown().await;
    }
}
