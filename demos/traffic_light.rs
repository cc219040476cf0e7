//! Hierarchical Traffic Light
//!
//! Red holds a nested pedestrian signal. A power outage jumps straight into
//! a blinking pedestrian light from anywhere.
//!
//! Key concepts:
//! - Nested states and bubbling
//! - Compound transitions with `jump_to`
//! - Observing changes with `subscribe`
//!
//! Run with: cargo run --example traffic_light

use hierarch::builder::jump_to;
use hierarch::{start, states, ChartBuilder, Notification, StartOptions};

fn main() {
    println!("=== Traffic Light ===\n");

    let mut chart = ChartBuilder::new();
    states!(chart => lights = "TrafficLights", green, yellow, red, walk, wait, blinking);

    chart.define(green, move |s| {
        s.on("TIMER", yellow);
    });
    chart.define(yellow, move |s| {
        s.on("TIMER", red);
    });
    chart.define(walk, move |s| {
        s.on("PED_TIMER", wait);
    });
    chart.define(wait, |_| ());
    chart.define(blinking, |_| ());
    chart.define(red, move |s| {
        s.on("TIMER", green);
        walk
    });
    chart.define(lights, move |s| {
        s.on("POWER_OUTAGE", jump_to([red, blinking]))
            .on("POWER_RESTORED", jump_to([red]));
        green
    });
    let chart = chart.build().unwrap();

    let machine = start(&chart, lights, StartOptions::default()).unwrap();
    machine.subscribe(|notification| {
        if let Notification::StateChanged { change, state } = notification {
            println!("    entered {state} (change {change})");
        }
    });

    println!("Initial state: {}\n", machine.value());
    for event in ["TIMER", "TIMER", "PED_TIMER", "POWER_OUTAGE", "TIMER", "POWER_RESTORED"] {
        println!("  {event}");
        let snapshot = machine.next(event).unwrap();
        println!("  => {}\n", snapshot.state);
    }

    println!("=== Example Complete ===");
}
