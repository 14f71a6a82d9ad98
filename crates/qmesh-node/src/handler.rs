//! Packet-handling worker pool
//!
//! The receiver task queues raw datagrams; a fixed number of workers share
//! the queue. Each worker decodes one datagram, lets the router decide, sends
//! the resulting packets and publishes the event. Workers exit once the queue
//! is closed and drained.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, trace, warn};

use qmesh_core::{Address, Packet, RouterEvent, Transport};

use crate::persister::SaveTrigger;
use crate::state::NodeState;

/// A datagram waiting for a worker
#[derive(Debug)]
pub struct Inbound {
    pub from: Address,
    pub data: Vec<u8>,
}

/// Shared work queue
pub type InboundQueue = Arc<Mutex<mpsc::Receiver<Inbound>>>;

/// Handles one datagram at a time
#[derive(Clone)]
pub struct PacketHandler {
    state: Arc<NodeState>,
    transport: Arc<dyn Transport>,
    trigger: SaveTrigger,
    events: broadcast::Sender<RouterEvent>,
}

impl PacketHandler {
    pub fn new(
        state: Arc<NodeState>,
        transport: Arc<dyn Transport>,
        trigger: SaveTrigger,
        events: broadcast::Sender<RouterEvent>,
    ) -> Self {
        Self {
            state,
            transport,
            trigger,
            events,
        }
    }

    /// Spawn `count` workers draining `queue`
    pub fn spawn_workers(&self, count: usize, queue: InboundQueue, span: Span) -> Vec<JoinHandle<()>> {
        (0..count)
            .map(|worker| {
                let handler = self.clone();
                let queue = queue.clone();
                tokio::spawn(handler.run(worker, queue).instrument(span.clone()))
            })
            .collect()
    }

    async fn run(self, worker: usize, queue: InboundQueue) {
        trace!(worker, "Worker started");
        loop {
            let next = {
                let mut rx = queue.lock().await;
                rx.recv().await
            };
            match next {
                Some(inbound) => self.handle(inbound).await,
                None => break,
            }
        }
        trace!(worker, "Worker stopped");
    }

    /// Decode, route and answer one datagram
    pub async fn handle(&self, inbound: Inbound) {
        let packet = match Packet::decode(&inbound.data) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(from = %inbound.from, error = %e, "Discarding malformed datagram");
                return;
            }
        };

        let dispatch = self.state.router().process(inbound.from, packet);

        for outbound in dispatch.outbound {
            let bytes = match outbound.packet.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(to = %outbound.to, error = %e, "Failed to encode packet");
                    continue;
                }
            };
            if let Err(e) = self.transport.send(&outbound.to, bytes).await {
                warn!(
                    to = %outbound.to,
                    kind = outbound.packet.kind(),
                    error = %e,
                    "Send failed"
                );
            }
        }

        if dispatch.table_changed {
            self.trigger.mark_dirty();
        }

        // No subscribers is not an error
        let _ = self.events.send(dispatch.event);
    }
}
