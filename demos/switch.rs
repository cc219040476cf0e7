//! Switch
//!
//! The smallest useful chart: two states flipping on one event.
//!
//! Key concepts:
//! - Declaring states with `states!`
//! - Handling events with `on`
//! - The change counter and cached snapshots
//!
//! Run with: cargo run --example switch

use hierarch::{start, states, ChartBuilder, StartOptions};

fn main() {
    println!("=== Switch ===\n");

    let mut chart = ChartBuilder::new();
    states!(chart => switch = "Switch", off = "Off", on = "On");
    chart.define(off, move |s| {
        s.on("flick", on);
    });
    chart.define(on, move |s| {
        s.on("flick", off);
    });
    chart.define(switch, move |_| off);
    let chart = chart.build().unwrap();

    let machine = start(&chart, switch, StartOptions::default()).unwrap();
    println!("Initial state: {} (change {})", machine.value(), machine.change_count());

    for event in ["flick", "flick", "unknown"] {
        let snapshot = machine.next(event).unwrap();
        println!("  {event:>8} -> {} (change {})", snapshot.state, snapshot.change);
    }

    println!("\nHistory:");
    for record in machine.history().records() {
        println!("  {} --{}--> {}", record.from, record.event, record.to);
    }

    println!("\n=== Example Complete ===");
}
