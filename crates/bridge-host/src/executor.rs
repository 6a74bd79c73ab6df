//! Scene executor: the "run on scene-owner thread" primitive
//!
//! Host scene graphs are not safe to mutate from arbitrary tasks. The
//! executor owns the [`SceneHost`] and drains a work queue of closures,
//! one at a time, in submission order; everything else in the process
//! talks to the scene by submitting jobs through a [`SceneHandle`]. This
//! total-orders all command handlers on one host: a job observes every
//! mutation committed by the jobs submitted before it.

use bridge_core::{BridgeError, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::scene::SceneHost;

/// One unit of work against the scene
pub type SceneJob = Box<dyn FnOnce(&mut dyn SceneHost) + Send>;

/// Cloneable submission side of the work queue
#[derive(Clone)]
pub struct SceneHandle {
    tx: mpsc::Sender<SceneJob>,
}

impl SceneHandle {
    /// Run a closure on the scene-owner context and return its value.
    ///
    /// Errors only if the executor is gone (host shut down).
    pub async fn submit<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn SceneHost) -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let boxed: SceneJob = Box::new(move |scene| {
            // Receiver may have given up; the job still ran to completion.
            let _ = reply_tx.send(job(scene));
        });

        self.tx
            .send(boxed)
            .await
            .map_err(|_| BridgeError::HostApi("Scene executor is not running".into()))?;
        reply_rx
            .await
            .map_err(|_| BridgeError::HostApi("Scene executor dropped the job".into()))
    }
}

/// Owns the scene and the draining task
pub struct SceneExecutor {
    handle: SceneHandle,
    task: JoinHandle<()>,
}

impl SceneExecutor {
    /// Take ownership of a scene and start draining jobs
    pub fn spawn(scene: impl SceneHost + 'static) -> Self {
        let (tx, mut rx) = mpsc::channel::<SceneJob>(32);
        let task = tokio::spawn(async move {
            let mut scene = scene;
            while let Some(job) = rx.recv().await {
                job(&mut scene);
            }
            debug!("Scene executor exiting");
        });

        Self {
            handle: SceneHandle { tx },
            task,
        }
    }

    pub fn handle(&self) -> SceneHandle {
        self.handle.clone()
    }

    /// Stop the executor. Jobs are synchronous, so a job already running
    /// finishes first; queued jobs are dropped and their submitters see an
    /// error.
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
        debug!("Scene executor stopped");
    }
}
