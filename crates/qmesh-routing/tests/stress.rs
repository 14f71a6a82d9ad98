//! Stress tests for qmesh-routing
//!
//! These tests exercise the cost table and router under concurrent access:
//! many writers, snapshots taken mid-flight, and racing lazy initialization.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use qmesh_core::{Address, DataPacket, NeighborSet, Packet, RouterEvent};
use qmesh_routing::{CostTable, LearningUpdater, QRouter, RouterConfig, neighbors_of};

// Test helpers
fn addr(c: u8, d: u8) -> Address {
    Address::v4(10, 0, c, d)
}

fn interior_neighbors() -> NeighborSet {
    neighbors_of(&addr(2, 2), 3).unwrap()
}

#[test]
fn test_racing_ensure_creates_row_once() {
    const THREADS: usize = 16;

    let table = Arc::new(CostTable::new(interior_neighbors(), 5.0));
    let created = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let table = Arc::clone(&table);
            let created = Arc::clone(&created);
            thread::spawn(move || {
                for dest in 1..=50u8 {
                    if table.ensure(&Address::v4(10, 1, 0, dest)) {
                        created.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(created.load(Ordering::Relaxed), 50);
    assert_eq!(table.len(), 50);
    assert_eq!(table.version(), 50);
}

#[test]
fn test_concurrent_updates_are_not_lost() {
    const WRITERS: usize = 8;
    const UPDATES: usize = 2_000;

    let table = Arc::new(CostTable::new(interior_neighbors(), 0.0));
    let dest = addr(3, 3);
    let neighbor = addr(2, 3);

    let start = Instant::now();
    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for _ in 0..UPDATES {
                    table.update_with(&dest, &neighbor, |cost| cost + 1.0);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    println!("{} updates in {:?}", WRITERS * UPDATES, start.elapsed());

    assert_eq!(table.get(&dest, &neighbor), (WRITERS * UPDATES) as f64);
}

#[test]
fn test_snapshots_during_updates_are_monotonic() {
    const WRITERS: usize = 4;
    const UPDATES: usize = 1_000;

    let table = Arc::new(CostTable::new(interior_neighbors(), 0.0));
    let neighbors: Vec<Address> = table.neighbors().iter().copied().collect();
    let dest = addr(3, 3);

    let writers: Vec<_> = neighbors
        .iter()
        .copied()
        .take(WRITERS)
        .map(|neighbor| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for _ in 0..UPDATES {
                    table.update_with(&dest, &neighbor, |cost| cost + 1.0);
                }
            })
        })
        .collect();

    let reader = {
        let table = Arc::clone(&table);
        thread::spawn(move || {
            let mut last_version = 0;
            let mut last_total = 0.0;
            for _ in 0..200 {
                let (version, snapshot) = table.snapshot_versioned();
                let total: f64 = snapshot
                    .row(&dest)
                    .map(|row| row.values().sum())
                    .unwrap_or(0.0);
                assert!(version >= last_version);
                assert!(total >= last_total);
                // Each update adds exactly one; the cut never splits an update
                assert_eq!(total.fract(), 0.0);
                last_version = version;
                last_total = total;
            }
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    reader.join().unwrap();

    let final_total: f64 = table.costs(&dest).iter().map(|(_, cost)| cost).sum();
    assert_eq!(final_total, (WRITERS * UPDATES) as f64);
}

#[test]
fn test_learning_under_contention_converges() {
    let table = Arc::new(CostTable::new(interior_neighbors(), 5.0));
    let updater = Arc::new(LearningUpdater::default());
    let dest = addr(3, 3);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let table = Arc::clone(&table);
            let updater = Arc::clone(&updater);
            thread::spawn(move || {
                for _ in 0..100 {
                    updater.update(&table, &addr(2, 3), &dest, 0.0);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!((table.get(&dest, &addr(2, 3)) - 1.0).abs() < 1e-9);
    assert_eq!(table.get(&dest, &addr(3, 2)), 5.0);
}

#[test]
fn test_shared_router_handles_parallel_traffic() {
    const THREADS: usize = 8;
    const PACKETS: usize = 500;

    let own = addr(2, 2);
    let router = Arc::new(
        QRouter::new(own, interior_neighbors(), &RouterConfig::default().with_seed(11)).unwrap(),
    );

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                let sender = router.neighbors().as_slice()[i % router.neighbors().len()];
                let mut forwarded = 0;
                for n in 0..PACKETS {
                    let packet = if n % 2 == 0 {
                        Packet::Data(DataPacket::new(addr(3, 3), format!("t{i}-{n}")))
                    } else {
                        Packet::feedback(addr(3, 3), (n % 5) as f64)
                    };
                    let dispatch = router.process(sender, packet);
                    if let RouterEvent::Forwarded { next_hop, .. } = dispatch.event {
                        assert_ne!(next_hop, sender);
                        forwarded += 1;
                    }
                }
                forwarded
            })
        })
        .collect();

    let forwarded: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(forwarded, THREADS * PACKETS / 2);

    for (_, cost) in router.table().costs(&addr(3, 3)) {
        assert!(cost.is_finite());
        assert!(cost <= 5.0);
    }
}
