//! In-process transport over tokio channels

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::trace;

use super::{Transport, TransportError};
use crate::protocol::{ActorId, Envelope, Request};

type Registry = Arc<RwLock<HashMap<ActorId, mpsc::Sender<Envelope>>>>;

/// Shared registry handing out per-actor endpoints
///
/// Create one hub per run, then one endpoint per actor before spawning any
/// of them, so every id is routable by the time the first send happens.
#[derive(Clone)]
pub struct ChannelHub {
    registry: Registry,
    buffer: usize,
}

impl ChannelHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            buffer,
        }
    }

    /// Register `id` and return its endpoint
    pub async fn endpoint(&self, id: ActorId) -> ChannelEndpoint {
        let (tx, rx) = mpsc::channel(self.buffer);
        self.registry.write().await.insert(id, tx);
        ChannelEndpoint {
            id,
            registry: Arc::clone(&self.registry),
            rx,
        }
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new(64)
    }
}

/// One actor's mailbox plus a handle to everyone else's
pub struct ChannelEndpoint {
    id: ActorId,
    registry: Registry,
    rx: mpsc::Receiver<Envelope>,
}

#[async_trait]
impl Transport for ChannelEndpoint {
    fn local_id(&self) -> ActorId {
        self.id
    }

    async fn send(&self, to: ActorId, payload: Request) -> Result<(), TransportError> {
        let tx = {
            let registry = self.registry.read().await;
            registry.get(&to).cloned().ok_or(TransportError::UnknownActor(to))?
        };
        trace!(from = %self.id, %to, request = payload.kind(), "send");
        tx.send(Envelope::new(self.id, to, payload))
            .await
            .map_err(|_| TransportError::Closed(to))
    }

    async fn recv(&mut self) -> Result<Envelope, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Disconnected)
    }

    async fn recv_timeout(&mut self, timeout: Duration) -> Result<Envelope, TransportError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(env)) => Ok(env),
            Ok(None) => Err(TransportError::Disconnected),
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }
}
