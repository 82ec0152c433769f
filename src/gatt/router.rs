//! Write dispatch.
//!
//! Every writable characteristic gets its own bounded queue and worker task.
//! The worker runs one action at a time in arrival order, so writes to the
//! same characteristic never overlap while different characteristics proceed
//! independently. The GATT write callback only enqueues and returns.

use super::{CharacteristicBinding, CharacteristicRole};
use crate::network::{NetworkClient, ResetActuator};
use crate::workflow::{ProvisioningService, WorkflowAction};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Why a write could not be queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// No action is bound to this characteristic.
    Unbound(Uuid),
    /// The worker has stopped.
    Closed(Uuid),
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::Unbound(uuid) => write!(f, "no action bound to characteristic {}", uuid),
            RouteError::Closed(uuid) => {
                write!(f, "characteristic {} is no longer accepting writes", uuid)
            }
        }
    }
}

impl std::error::Error for RouteError {}

#[derive(Debug)]
struct Route {
    role: CharacteristicRole,
    tx: mpsc::Sender<Vec<u8>>,
}

/// Cheap handle used by the GATT layer to queue writes.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    routes: Arc<HashMap<Uuid, Route>>,
}

impl RouterHandle {
    /// Queue `payload` for the characteristic `uuid`.
    ///
    /// Waits for queue space when the worker is behind.
    pub async fn dispatch(&self, uuid: Uuid, payload: Vec<u8>) -> Result<(), RouteError> {
        let route = self.routes.get(&uuid).ok_or(RouteError::Unbound(uuid))?;
        debug!("Write to {} ({} bytes)", route.role, payload.len());
        route
            .tx
            .send(payload)
            .await
            .map_err(|_| RouteError::Closed(uuid))
    }
}

/// Owns the per-characteristic workers.
pub struct Router {
    handle: RouterHandle,
    workers: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl Router {
    /// Spawn one worker per binding with an `on_write` action.
    pub fn start<C, R>(
        service: Arc<ProvisioningService<C, R>>,
        bindings: &[CharacteristicBinding],
        queue_depth: usize,
    ) -> Self
    where
        C: NetworkClient,
        R: ResetActuator,
    {
        let cancel = CancellationToken::new();
        let mut routes = HashMap::new();
        let mut workers = Vec::new();

        for binding in bindings {
            let Some(action) = binding.on_write else {
                continue;
            };
            let (tx, rx) = mpsc::channel(queue_depth.max(1));
            workers.push(tokio::spawn(worker(
                service.clone(),
                binding.role,
                action,
                rx,
                cancel.clone(),
            )));
            routes.insert(
                binding.uuid,
                Route {
                    role: binding.role,
                    tx,
                },
            );
        }

        Self {
            handle: RouterHandle {
                routes: Arc::new(routes),
            },
            workers,
            cancel,
        }
    }

    pub fn handle(&self) -> RouterHandle {
        self.handle.clone()
    }

    /// Stop accepting writes and finish the queued ones.
    ///
    /// Workers still busy after `grace` are aborted.
    pub async fn shutdown(self, grace: Duration) {
        self.cancel.cancel();
        let mut workers = self.workers;

        let joined = tokio::time::timeout(grace, async {
            for worker in workers.iter_mut() {
                let _ = worker.await;
            }
        })
        .await;

        if joined.is_err() {
            let busy = workers.iter().filter(|w| !w.is_finished()).count();
            warn!("{} write worker(s) still busy after {:?}, aborting", busy, grace);
            for worker in &workers {
                worker.abort();
            }
        }
    }
}

async fn worker<C, R>(
    service: Arc<ProvisioningService<C, R>>,
    role: CharacteristicRole,
    action: WorkflowAction,
    mut rx: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
) where
    C: NetworkClient,
    R: ResetActuator,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            payload = rx.recv() => match payload {
                Some(payload) => service.run(action, &payload).await,
                None => return,
            },
        }
    }

    rx.close();
    let mut drained = 0;
    while let Ok(payload) = rx.try_recv() {
        service.run(action, &payload).await;
        drained += 1;
    }
    if drained > 0 {
        info!("Finished {} queued {} write(s)", drained, role);
    }
}
