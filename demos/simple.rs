//! Simple standalone example of LSEQ tree usage.
//!
//! This example demonstrates the basic functionality of the LSEQ tree
//! in a simple, easy-to-understand scenario.
//!
//! Run with: cargo run --example simple
//! Set `RUST_LOG=lseq_tree=trace` to watch every allocation.

use lseq_tree::{LSeqOptions, LSeqTree};
use tracing_subscriber::EnvFilter;

fn text(tree: &LSeqTree<char>) -> String {
    tree.iter().collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Simple LSEQ Tree Example ===\n");

    // Create two replicas representing two users
    let mut alice = LSeqTree::seeded(1, LSeqOptions::default(), 1).unwrap();
    let mut bob = LSeqTree::seeded(2, LSeqOptions::default(), 2).unwrap();

    println!("Alice (site 1) and Bob (site 2) start editing a document\n");

    // Alice types "Hello"
    println!("Alice types 'Hello':");
    let mut alice_ops = Vec::new();
    for (i, ch) in "Hello".chars().enumerate() {
        alice_ops.push(alice.insert(ch, i).unwrap());
    }
    println!("  Alice's document: '{}'", text(&alice));

    // Bob concurrently types "World!" into his empty document
    println!("\nBob concurrently types 'World!':");
    let mut bob_ops = Vec::new();
    for (i, ch) in "World!".chars().enumerate() {
        bob_ops.push(bob.insert(ch, i).unwrap());
    }
    println!("  Bob's document: '{}'", text(&bob));

    // Synchronize in both directions
    println!("\n--- Synchronizing Changes ---");
    for op in bob_ops {
        alice.apply_insert(op).unwrap();
    }
    for op in alice_ops {
        bob.apply_insert(op).unwrap();
    }

    println!("  Alice sees: '{}'", text(&alice));
    println!("  Bob sees:   '{}'", text(&bob));

    if text(&alice) == text(&bob) {
        println!("\n✓ SUCCESS: Both users converged to the same document!");
    } else {
        println!("\n✗ ERROR: Documents did not converge!");
    }

    // Show the identifiers behind the ordering
    println!("\n--- Technical Details ---");
    println!("The final ordering is determined by identifiers:");
    for i in 0..alice.len() {
        let id = alice.identifier_at(i).unwrap();
        println!(
            "  {:>2} {:?} digit={} sites={:?} counters={:?}",
            i,
            alice.get(i).unwrap(),
            id.digit(),
            id.sites(),
            id.counters()
        );
    }

    // Demonstrate removal
    println!("\n=== Removal Example ===");
    let w_index = alice.iter().position(|&ch| ch == 'W');
    if let Some(index) = w_index {
        println!("Alice removes 'W'");
        let id = alice.remove(index).unwrap();
        println!("  Alice's document: '{}'", text(&alice));

        bob.apply_remove(id).unwrap();
        println!("  Bob's document: '{}'", text(&bob));

        if text(&alice) == text(&bob) {
            println!("✓ Removal synchronized successfully!");
        }
    }

    println!("\n=== Example Complete ===");
}
