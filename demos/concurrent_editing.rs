//! Concurrent editing example with several replicas.
//!
//! This example showcases:
//! - Replicas editing independently and exchanging operations as JSON
//! - Out-of-order and duplicated delivery
//! - A shared replica written from several threads
//! - Bootstrapping a late replica from a snapshot
//!
//! Run with: cargo run --example concurrent_editing

use std::thread;
use std::time::Instant;

use lseq_tree::{InsertPayload, LSeqOptions, LSeqTree, Operation, SharedLSeq};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn text(tree: &LSeqTree<char>) -> String {
    tree.iter().collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Concurrent LSEQ Tree Example ===\n");

    networked_replicas_demo();
    println!();

    shared_replica_demo();
    println!();

    snapshot_demo();
}

/// Three replicas edit concurrently; every operation goes through JSON and is
/// delivered in reverse, twice
fn networked_replicas_demo() {
    println!("--- Replicas Exchanging Operations ---");

    let options = LSeqOptions::default();
    let mut replicas: Vec<LSeqTree<char>> = (1..=3)
        .map(|site| LSeqTree::seeded(site, options, site).unwrap())
        .collect();

    let words = ["alpha ", "beta ", "gamma "];
    let mut wire: Vec<(usize, String)> = Vec::new();

    for (i, word) in words.iter().enumerate() {
        for ch in word.chars() {
            let len = replicas[i].len();
            let op = replicas[i].insert(ch, len / 2).unwrap();
            wire.push((i, serde_json::to_string(&op).unwrap()));
        }
        println!("  Replica {} typed: '{}'", i + 1, text(&replicas[i]));
    }

    let start = Instant::now();
    for _ in 0..2 {
        for (origin, json) in wire.iter().rev() {
            let op: InsertPayload<char> = serde_json::from_str(json).unwrap();
            for (target, tree) in replicas.iter_mut().enumerate() {
                if target != *origin {
                    tree.apply_insert(op.clone()).unwrap();
                }
            }
        }
    }
    info!(operations = wire.len(), elapsed = ?start.elapsed(), "replication finished");

    // Replica 2 removes the first three elements
    let mut removals = Vec::new();
    for _ in 0..3 {
        let id = replicas[1].remove(0).unwrap();
        removals.push(serde_json::to_string(&Operation::<char>::from(id)).unwrap());
    }
    for json in &removals {
        let op: Operation<char> = serde_json::from_str(json).unwrap();
        replicas[0].apply_remove(op.clone()).unwrap();
        replicas[2].apply_remove(op).unwrap();
    }

    for (i, tree) in replicas.iter().enumerate() {
        println!("  Replica {} sees: '{}'", i + 1, text(tree));
    }
    let converged = replicas.windows(2).all(|pair| pair[0].to_vec() == pair[1].to_vec());
    println!("  Converged: {}", converged);
}

/// Several threads insert into one replica through a shared handle
fn shared_replica_demo() {
    println!("--- Shared Replica Across Threads ---");

    let num_threads = 4;
    let operations_per_thread = 250;
    let shared = SharedLSeq::new(LSeqTree::seeded(7, LSeqOptions::default(), 7).unwrap());

    let start = Instant::now();
    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let shared = shared.clone();
            thread::spawn(move || {
                for i in 0..operations_per_thread {
                    let ch = (b'A' + ((thread_id * 7 + i) % 26) as u8) as char;
                    let index = (i * 31) % (shared.len() + 1);
                    // Another thread may shrink the sequence in between
                    let _ = shared.insert(ch, index);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    println!(
        "  {} threads inserted {} elements in {:?}",
        num_threads,
        shared.len(),
        start.elapsed()
    );
    let depth = shared.read(|tree| {
        (0..tree.len())
            .filter_map(|i| tree.identifier_at(i).ok())
            .map(|id| id.depth())
            .max()
            .unwrap_or(0)
    });
    println!("  Deepest identifier: {} levels", depth);
}

/// A replica joining late catches up from a snapshot and keeps editing
fn snapshot_demo() {
    println!("--- Late Replica From Snapshot ---");

    let mut origin = LSeqTree::seeded(1, LSeqOptions::default(), 1).unwrap();
    for (i, ch) in "snapshots carry the whole tree".chars().enumerate() {
        origin.insert(ch, i).unwrap();
    }

    let json = origin.to_json().unwrap();
    println!("  Snapshot is {} bytes", json.len());

    let mut late = LSeqTree::<char>::seeded(9, LSeqOptions::default(), 9).unwrap();
    let snapshot = serde_json::from_str(&json).unwrap();
    let added = late.merge_snapshot(&snapshot).unwrap();
    println!("  Late replica merged {} elements: '{}'", added, text(&late));

    let op = late.insert('!', late.len()).unwrap();
    origin.apply_insert(op).unwrap();
    println!("  Origin after late edit: '{}'", text(&origin));
}
