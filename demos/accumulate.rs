//! Accumulating Events
//!
//! While a dialog is open it records every key press. Closing it drops the
//! buffer, and the next opening starts empty.
//!
//! Key concepts:
//! - `accumulate` buffers scoped to a state's lifetime
//! - Feeding events from an `EventBus` subscription
//! - Tags exposed on snapshots
//!
//! Run with: cargo run --example accumulate

use hierarch::{start, states, ChartBuilder, Event, EventBus, StartOptions};
use serde_json::json;

fn main() {
    println!("=== Accumulate ===\n");

    let keyboard = EventBus::new();

    let mut chart = ChartBuilder::new();
    states!(chart => dialog, closed = "Closed", open = "Open");
    chart.define(closed, move |s| {
        s.on("OPEN", open);
    });
    {
        let keyboard = keyboard.clone();
        chart.define(open, move |s| {
            s.subscribe(keyboard.clone(), ["key"])
                .accumulate("key", "typed")
                .expose("modal")
                .on("CLOSE", closed);
        });
    }
    chart.define(dialog, move |_| closed);
    let chart = chart.build().unwrap();

    let machine = start(&chart, dialog, StartOptions::default()).unwrap();

    machine.next("OPEN").unwrap();
    println!("Opened: {} (modal: {})", machine.value(), machine.has_tag("modal"));
    for key in ["h", "i", "!"] {
        keyboard.emit(Event::with_payload("key", json!(key)));
    }
    let typed: Vec<String> = machine
        .accumulations()
        .get("typed")
        .map(|events| events.iter().map(|event| event.payload.to_string()).collect())
        .unwrap_or_default();
    println!("Typed while open: {}", typed.join(" "));

    machine.next("CLOSE").unwrap();
    keyboard.emit(Event::with_payload("key", json!("lost")));
    println!(
        "Closed: {} (buffers: {}, listeners: {})",
        machine.value(),
        machine.accumulations().len(),
        keyboard.listener_count()
    );

    println!("\n=== Example Complete ===");
}
