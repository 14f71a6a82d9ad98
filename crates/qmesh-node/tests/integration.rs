//! End-to-end tests for QMeshNode on the in-memory network

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc};

use qmesh_core::{
    Address, DataPacket, DropReason, MockNetwork, MockTransport, Packet, RouterEvent, Transport,
};
use qmesh_node::{NodeConfig, NodeError, QMeshNode};
use qmesh_routing::GridAddressing;
use qmesh_storage::{InMemorySnapshotStore, JsonFileStore, SnapshotStore};

const TIMEOUT: Duration = Duration::from_secs(10);

fn injector_address() -> Address {
    Address::v4(127, 0, 0, 1)
}

async fn node_on(
    network: &MockNetwork,
    config: NodeConfig,
    store: Arc<dyn SnapshotStore>,
) -> QMeshNode {
    let transport = network.join(config.address().unwrap());
    QMeshNode::new(config, Arc::new(transport), store)
        .await
        .unwrap()
}

async fn inject(injector: &MockTransport, router: Address, destination: Address, payload: &str) {
    let bytes = Packet::from(DataPacket::new(destination, payload))
        .encode()
        .unwrap();
    injector.send(&router, bytes).await.unwrap();
}

async fn next_matching<F>(events: &mut broadcast::Receiver<RouterEvent>, mut pred: F) -> RouterEvent
where
    F: FnMut(&RouterEvent) -> bool,
{
    tokio::time::timeout(TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Two routers that only know each other
fn pair_configs() -> (NodeConfig, NodeConfig) {
    let a = Address::v4(10, 0, 0, 1);
    let b = Address::v4(10, 0, 0, 2);
    let config_a = NodeConfig::new(a)
        .with_name("a")
        .with_neighbors([b])
        .with_epsilon(0.0);
    let config_b = NodeConfig::new(b)
        .with_name("b")
        .with_neighbors([a])
        .with_epsilon(0.0);
    (config_a, config_b)
}

#[tokio::test]
async fn test_lifecycle() {
    let network = MockNetwork::new();
    let (config, _) = pair_configs();
    let node = node_on(&network, config, Arc::new(InMemorySnapshotStore::new())).await;

    assert!(!node.is_started());
    node.start().await.unwrap();
    assert!(node.is_started());
    assert!(matches!(node.start().await, Err(NodeError::AlreadyStarted)));

    node.stop().await.unwrap();
    assert!(!node.is_started());
    assert!(!network.is_attached(&node.address()));

    // Stopping twice is fine, restarting is not
    node.stop().await.unwrap();
    assert!(matches!(node.start().await, Err(NodeError::Stopped)));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let network = MockNetwork::new();
    let config = NodeConfig::new(Address::v4(10, 0, 1, 1)).with_workers(0);
    let transport = network.join(Address::v4(10, 0, 1, 1));
    let result = QMeshNode::new(
        config,
        Arc::new(transport),
        Arc::new(InMemorySnapshotStore::new()),
    )
    .await;
    assert!(matches!(result, Err(NodeError::Config(_))));
}

#[tokio::test]
async fn test_delivery_feeds_back_to_sender() {
    let network = MockNetwork::new();
    let store: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::new());
    let (config_a, config_b) = pair_configs();
    let a = node_on(&network, config_a, store.clone()).await;
    let b = node_on(&network, config_b, store.clone()).await;
    let injector = network.join(injector_address());

    let mut a_events = a.events();
    let mut b_events = b.events();
    a.start().await.unwrap();
    b.start().await.unwrap();

    inject(&injector, a.address(), b.address(), "hello b").await;

    let forwarded = next_matching(&mut a_events, |e| matches!(e, RouterEvent::Forwarded { .. })).await;
    match forwarded {
        RouterEvent::Forwarded { from, next_hop, .. } => {
            assert_eq!(from, injector_address());
            assert_eq!(next_hop, b.address());
        }
        other => panic!("unexpected event {other:?}"),
    }

    let delivered = next_matching(&mut b_events, |e| matches!(e, RouterEvent::Delivered { .. })).await;
    assert_eq!(delivered.data().map(|d| d.payload.as_str()), Some("hello b"));

    // b answered with a zero estimate: 5 + 0.5 * ((1 + 0.9 * 0) - 5) = 3
    let applied = next_matching(&mut a_events, |e| matches!(e, RouterEvent::FeedbackApplied { .. })).await;
    match applied {
        RouterEvent::FeedbackApplied {
            from,
            destination,
            previous,
            cost,
            ..
        } => {
            assert_eq!(from, b.address());
            assert_eq!(destination, b.address());
            assert_eq!(previous, 5.0);
            assert_eq!(cost, 3.0);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(a.state().table().get(&b.address(), &b.address()), 3.0);

    a.stop().await.unwrap();
    b.stop().await.unwrap();
}

#[tokio::test]
async fn test_delivery_answers_injector_with_zero_estimate() {
    let network = MockNetwork::new();
    let (config_a, _) = pair_configs();
    let a = node_on(&network, config_a, Arc::new(InMemorySnapshotStore::new())).await;
    let injector = network.join(injector_address());
    let mut events = a.events();
    a.start().await.unwrap();

    inject(&injector, a.address(), a.address(), "to myself").await;
    next_matching(&mut events, |e| matches!(e, RouterEvent::Delivered { .. })).await;

    let (from, data) = tokio::time::timeout(TIMEOUT, injector.recv())
        .await
        .expect("no feedback for the injector")
        .unwrap();
    assert_eq!(from, a.address());
    assert_eq!(Packet::decode(&data).unwrap(), Packet::feedback(a.address(), 0.0));

    // Exactly one FEEDBACK per delivery
    let nothing = tokio::time::timeout(Duration::from_millis(100), injector.recv()).await;
    assert!(nothing.is_err());

    a.stop().await.unwrap();
}

#[tokio::test]
async fn test_malformed_datagram_does_not_stop_node() {
    let network = MockNetwork::new();
    let (config_a, _) = pair_configs();
    let a = node_on(&network, config_a, Arc::new(InMemorySnapshotStore::new())).await;
    let injector = network.join(injector_address());
    let mut events = a.events();
    a.start().await.unwrap();

    injector.send(&a.address(), b"{\"type\":\"DATA\"".to_vec()).await.unwrap();
    injector
        .send(&a.address(), b"{\"type\":\"PING\"}".to_vec())
        .await
        .unwrap();
    inject(&injector, a.address(), a.address(), "still alive").await;

    let event = next_matching(&mut events, |_| true).await;
    assert_eq!(event.data().map(|d| d.payload.as_str()), Some("still alive"));

    a.stop().await.unwrap();
}

#[tokio::test]
async fn test_feedback_from_stranger_is_ignored() {
    let network = MockNetwork::new();
    let (config_a, _) = pair_configs();
    let a = node_on(&network, config_a, Arc::new(InMemorySnapshotStore::new())).await;
    let injector = network.join(injector_address());
    let mut events = a.events();
    a.start().await.unwrap();

    let feedback = Packet::feedback(Address::v4(10, 0, 0, 9), 0.0).encode().unwrap();
    injector.send(&a.address(), feedback).await.unwrap();

    let event = next_matching(&mut events, |_| true).await;
    assert!(matches!(event, RouterEvent::FeedbackIgnored { .. }));
    assert!(!a.state().table().contains(&Address::v4(10, 0, 0, 9)));

    a.stop().await.unwrap();
}

#[tokio::test]
async fn test_table_survives_restart() {
    let temp = TempDir::new().unwrap();
    let store: Arc<dyn SnapshotStore> = Arc::new(JsonFileStore::new(temp.path()).await.unwrap());
    let (config_a, config_b) = pair_configs();
    let a_address = config_a.address().unwrap();
    let b_address = config_b.address().unwrap();

    {
        let network = MockNetwork::new();
        let a = node_on(&network, config_a.clone(), store.clone()).await;
        let b = node_on(&network, config_b, store.clone()).await;
        let injector = network.join(injector_address());
        let mut a_events = a.events();
        a.start().await.unwrap();
        b.start().await.unwrap();

        inject(&injector, a_address, b_address, "learn me").await;
        next_matching(&mut a_events, |e| matches!(e, RouterEvent::FeedbackApplied { .. })).await;

        a.stop().await.unwrap();
        b.stop().await.unwrap();
    }

    assert!(temp.path().join("q_table_a.json").exists());
    // b only delivered, which never touches its table
    assert!(!temp.path().join("q_table_b.json").exists());

    let network = MockNetwork::new();
    let restored = node_on(&network, config_a, store.clone()).await;
    assert_eq!(restored.state().table().get(&b_address, &b_address), 3.0);
}

#[tokio::test]
async fn test_grid_delivers_corner_to_corner() {
    let network = MockNetwork::new();
    let store: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::new());
    let addressing = GridAddressing::default();
    let addresses = addressing.all_addresses(3).unwrap();

    let (collector_tx, mut collected) = mpsc::unbounded_channel();
    let mut nodes = Vec::new();
    for (i, address) in addresses.iter().enumerate() {
        let config = NodeConfig::new(*address)
            .with_grid(3)
            .with_seed(i as u64)
            .with_hop_limit(64)
            .with_workers(2);
        let node = node_on(&network, config, store.clone()).await;
        let mut events = node.events();
        let tx = collector_tx.clone();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if tx.send(event).is_err() {
                    break;
                }
            }
        });
        node.start().await.unwrap();
        nodes.push(node);
    }

    let source = Address::v4(10, 0, 1, 1);
    let destination = Address::v4(10, 0, 3, 3);
    let injector = network.join(injector_address());

    let mut delivered = 0;
    let mut dropped = 0;
    for i in 0..20 {
        let payload = format!("msg-{i}");
        inject(&injector, source, destination, &payload).await;

        let outcome = tokio::time::timeout(TIMEOUT, async {
            loop {
                let event = collected.recv().await.expect("collector closed");
                let ours = event.data().is_some_and(|d| d.payload == payload);
                match event {
                    RouterEvent::Delivered { .. } if ours => return true,
                    RouterEvent::Dropped { reason, .. } if ours => {
                        assert_eq!(reason, DropReason::HopLimitExceeded);
                        return false;
                    }
                    _ => {}
                }
            }
        })
        .await
        .expect("packet neither delivered nor dropped");

        if outcome {
            delivered += 1;
        } else {
            dropped += 1;
        }
    }

    assert_eq!(delivered + dropped, 20);
    assert!(delivered > 0);

    let origin = &nodes[0];
    assert_eq!(origin.address(), source);
    assert!(origin.state().table().contains(&destination));
    assert!(origin.state().table().best_cost(&destination).is_some());

    for node in &nodes {
        node.stop().await.unwrap();
    }
}
