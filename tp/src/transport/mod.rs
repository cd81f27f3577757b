//! Point-to-point transport between actors
//!
//! Actors exchange [`Envelope`]s through a [`Transport`]: a blocking
//! send/receive primitive addressed by [`ActorId`]. The in-process
//! implementation lives in [`channel`]; anything that can move an envelope
//! between two ids (sockets, MPI, ...) can stand in behind the same trait.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::{ActorId, Envelope, Request};

mod channel;

pub use channel::{ChannelEndpoint, ChannelHub};

/// Errors from transport operations
///
/// Delivery is assumed reliable; any of these is fatal to the run.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no actor registered under {0}")]
    UnknownActor(ActorId),

    #[error("channel to {0} closed")]
    Closed(ActorId),

    #[error("own inbox closed")]
    Disconnected,

    #[error("receive timed out after {0:?}")]
    Timeout(Duration),
}

/// Blocking send/receive addressed by actor id
#[async_trait]
pub trait Transport: Send {
    /// The id this endpoint receives under
    fn local_id(&self) -> ActorId;

    /// Deliver `payload` to `to`, stamped with the local id as sender
    async fn send(&self, to: ActorId, payload: Request) -> Result<(), TransportError>;

    /// Block until the next inbound envelope arrives
    async fn recv(&mut self) -> Result<Envelope, TransportError>;

    /// Like [`Transport::recv`], but give up after `timeout`
    async fn recv_timeout(&mut self, timeout: Duration) -> Result<Envelope, TransportError>;
}
