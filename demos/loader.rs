//! Async Loader
//!
//! An entry effect starts a fetch that settles later. Its result comes back
//! into the machine as a `SUCCESS` or `FAILURE` event.
//!
//! Key concepts:
//! - Entry effects returning deferred results
//! - Synthetic `SUCCESS`/`FAILURE` events
//! - Awaiting `when_state` from async code
//! - Stale results being discarded after the machine moves on
//!
//! Run with: cargo run --example loader

use hierarch::effects::EffectError;
use hierarch::{start, states, ChartBuilder, Deferred, StartOptions};
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::{spawn_local, LocalSet};
use tokio::time::sleep;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("=== Async Loader ===\n");

    let attempts = Rc::new(Cell::new(0u32));

    let mut chart = ChartBuilder::new();
    states!(chart => loader, idle, loading, success, failure);
    chart.define(idle, move |s| {
        s.on("FETCH", loading);
    });
    {
        let attempts = attempts.clone();
        chart.define(loading, move |s| {
            let attempts = attempts.clone();
            s.entry("fetch", move |_| {
                let attempt = attempts.get() + 1;
                attempts.set(attempt);
                let (result, settler) = Deferred::pending();
                spawn_local(async move {
                    sleep(Duration::from_millis(20)).await;
                    if attempt == 1 {
                        settler.reject(EffectError::new("connection reset"));
                    } else {
                        settler.resolve(json!({"items": 3}));
                    }
                });
                result
            })
            .on("SUCCESS", success)
            .on("FAILURE", failure);
        });
    }
    chart.define(success, |_| ());
    chart.define(failure, move |s| {
        s.on("RETRY", loading);
    });
    chart.define(loader, move |_| idle);
    let chart = chart.build().unwrap();

    LocalSet::new()
        .run_until(async move {
            let machine = start(&chart, loader, StartOptions::default()).unwrap();
            println!("Initial state: {}", machine.value());

            machine.next("FETCH").unwrap();
            println!("After FETCH: {}", machine.value());
            let failed = machine.when_state("failure", None).await;
            println!("First attempt: {failed:?}");

            machine.next("RETRY").unwrap();
            let results = machine.results();
            let _ = machine.when_state("success", None).await;
            println!("After RETRY: {}", machine.value());
            if let Some(results) = results {
                println!("Results: {:?}", results.await);
            }
            println!("Attempts: {}", attempts.get());
        })
        .await;

    println!("\n=== Example Complete ===");
}
