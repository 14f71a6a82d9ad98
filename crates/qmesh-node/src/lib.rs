//! # QMesh Node
//!
//! Runs one Q-routing router on a datagram transport.
//!
//! This crate provides [`QMeshNode`], which ties together:
//! - Transport (UDP socket, or the in-memory mock in tests)
//! - Router ([`QRouter`](qmesh_routing::QRouter) cost table, policy and learning)
//! - Persistence (one snapshot per node, written by a single background task)
//!
//! ## Tasks
//!
//! - **Receiver**: reads datagrams and queues them; drops them when the
//!   queue is full
//! - **Workers**: a fixed pool that decodes, routes and answers
//! - **Snapshot writer**: saves the table after it changes
//!
//! ## Example
//!
//! ```rust,ignore
//! use qmesh_node::{NodeConfig, QMeshNode};
//!
//! let config = NodeConfig::new("10.0.1.1".parse()?).with_name("h11");
//! let node = QMeshNode::bind_udp(config).await?;
//! node.start().await?;
//!
//! let mut events = node.events();
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

mod config;
mod error;
pub mod handler;
pub mod persister;
mod state;
pub mod udp;

pub use config::{DEFAULT_PORT, NodeConfig, PersistenceConfig, TopologyConfig, TransportConfig};
pub use error::{NodeError, NodeResult};
pub use state::NodeState;
pub use udp::UdpTransport;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, instrument, warn};

use qmesh_core::{Address, RouterEvent, Transport, TransportError};
use qmesh_logging::NodeContext;
use qmesh_storage::{JsonFileStore, SnapshotStore};

use handler::{Inbound, PacketHandler};
use persister::{SaveTrigger, SnapshotWriter};

/// Handles of a started node's background tasks
struct RunningTasks {
    receiver: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    writer: JoinHandle<()>,
    writer_stop: oneshot::Sender<()>,
}

/// A running Q-routing router
pub struct QMeshNode {
    /// Node configuration
    config: NodeConfig,
    /// Identity used in logs
    context: NodeContext,
    /// Router and identity shared with the workers
    state: Arc<NodeState>,
    /// Datagram transport
    transport: Arc<dyn Transport>,
    /// Snapshot persistence
    store: Arc<dyn SnapshotStore>,
    /// Router events
    events: broadcast::Sender<RouterEvent>,
    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,
    /// Background task handles (None until started)
    tasks: Mutex<Option<RunningTasks>>,
    /// Whether the node has been started
    started: AtomicBool,
    /// Whether the node has been stopped
    stopped: AtomicBool,
}

impl QMeshNode {
    /// Create a node on the given transport and store
    ///
    /// Restores the node's saved cost table. Call [`start`](Self::start) to
    /// begin handling datagrams.
    #[instrument(skip_all, fields(address = ?config.address))]
    pub async fn new(
        config: NodeConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SnapshotStore>,
    ) -> NodeResult<Self> {
        config.validate()?;
        let state = NodeState::load(&config, store.as_ref()).await?;
        let context = NodeContext::new(state.name(), state.address());

        let (events, _) = broadcast::channel(config.event_channel_capacity);
        let (shutdown_tx, _) = broadcast::channel(1);

        info!(
            node = %state.name(),
            neighbors = state.neighbors().len(),
            destinations = state.table().len(),
            "Node created"
        );

        Ok(Self {
            config,
            context,
            state: Arc::new(state),
            transport,
            store,
            events,
            shutdown_tx,
            tasks: Mutex::new(None),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    /// Create a node on a UDP socket with snapshots under the state dir
    pub async fn bind_udp(config: NodeConfig) -> NodeResult<Self> {
        config.validate()?;
        let transport = UdpTransport::bind(
            config.transport.bind,
            config.address()?,
            config.transport.peer_port,
        )
        .await?;
        for (peer, socket) in &config.transport.peers {
            transport.add_peer(*peer, *socket);
        }
        let store = JsonFileStore::new(&config.persistence.state_dir).await?;
        Self::new(config, Arc::new(transport), Arc::new(store)).await
    }

    /// Start the receiver, the workers and the snapshot writer
    #[instrument(skip(self), fields(node = %self.context.name))]
    pub async fn start(&self) -> NodeResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(NodeError::Stopped);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NodeError::AlreadyStarted);
        }

        let mut tasks = self.tasks.lock().await;
        let span = self.context.span();
        let trigger = SaveTrigger::new();

        let (stop_tx, stop_rx) = oneshot::channel();
        let writer = SnapshotWriter::spawn(
            self.state.clone(),
            self.store.clone(),
            trigger.clone(),
            self.config.persistence.save_debounce(),
            stop_rx,
            span.clone(),
        );

        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_capacity);
        let handler = PacketHandler::new(
            self.state.clone(),
            self.transport.clone(),
            trigger,
            self.events.clone(),
        );
        let workers = handler.spawn_workers(
            self.config.workers,
            Arc::new(Mutex::new(queue_rx)),
            span.clone(),
        );

        let receiver = tokio::spawn(
            receive_loop(self.transport.clone(), queue_tx, self.shutdown_tx.subscribe())
                .instrument(span),
        );

        *tasks = Some(RunningTasks {
            receiver,
            workers,
            writer,
            writer_stop: stop_tx,
        });

        info!(
            address = %self.state.address(),
            workers = self.config.workers,
            "Node started"
        );
        Ok(())
    }

    /// Stop the node
    ///
    /// Stops reading, lets the workers finish every queued datagram, writes
    /// a final snapshot and closes the transport. A stopped node cannot be
    /// restarted.
    #[instrument(skip(self), fields(node = %self.context.name))]
    pub async fn stop(&self) -> NodeResult<()> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.stopped.store(true, Ordering::SeqCst);

        let _ = self.shutdown_tx.send(());

        if let Some(tasks) = self.tasks.lock().await.take() {
            let _ = tasks.receiver.await;
            for worker in tasks.workers {
                let _ = worker.await;
            }
            let _ = tasks.writer_stop.send(());
            let _ = tasks.writer.await;
        }

        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "Failed to close transport");
        }

        info!("Node stopped");
        Ok(())
    }

    /// Subscribe to router events
    pub fn events(&self) -> broadcast::Receiver<RouterEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> &Arc<NodeState> {
        &self.state
    }

    pub fn address(&self) -> Address {
        self.state.address()
    }

    pub fn name(&self) -> &str {
        self.state.name()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

/// Read datagrams until shutdown and hand them to the workers
async fn receive_loop(
    transport: Arc<dyn Transport>,
    queue: mpsc::Sender<Inbound>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    debug!("Receiver started");
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            result = transport.recv() => {
                match result {
                    Ok((from, data)) => match queue.try_send(Inbound { from, data }) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(inbound)) => {
                            warn!(from = %inbound.from, "Inbound queue full, dropping datagram");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    },
                    Err(TransportError::ConnectionClosed) => {
                        debug!("Transport closed");
                        break;
                    }
                    Err(e) => warn!(error = %e, "Transport receive error"),
                }
            }
        }
    }
    debug!("Receiver stopped");
}
