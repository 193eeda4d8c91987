//! Basic demonstration of the Living Village simulation.
//!
//! Run with: cargo run --example village_demo
//! Set `RUST_LOG=village_sim=debug` to watch routines being planned.

use village_sim::{EntityKind, SimWorld, Snapshot};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== Living Village - Simulation Demo ===\n");

    let mut sim = SimWorld::new_village();
    println!("Spawned {} entities", sim.entity_count());
    print_snapshot(&sim.snapshot());

    // Drive it like a renderer would: 60 frames per second of wall clock.
    sim.start();
    let frame_ms = 1000.0 / 60.0;
    let mut now = 0.0;
    for second in 1..=20 {
        for _ in 0..60 {
            now += frame_ms;
            sim.update(now);
        }
        if second % 5 == 0 {
            println!("\n--- {}s (tick {}) ---", second, sim.current_tick());
            print_snapshot(&sim.snapshot());
        }
    }

    println!("\n--- Jumping to 21:00 ---");
    sim.set_hour(21);
    for _ in 0..(30 * 5) {
        sim.step(1.0 / 30.0);
    }
    print_snapshot(&sim.snapshot());

    println!("\n=== Final State (JSON) ===\n");
    match sim.snapshot().to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to serialize snapshot: {err}"),
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("  Day {} {:02}:00", snapshot.day, snapshot.hour);
    for entity in &snapshot.entities {
        if !matches!(entity.kind, EntityKind::Npc(_) | EntityKind::Animal(_)) {
            continue;
        }
        let state = entity.state.map(|s| s.to_string()).unwrap_or_default();
        let task = entity.task.map(|t| t.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "    {:>3} {:<10} {:<8} pos=({:6.1}, {:6.1}) [{} / {}]",
            entity.id.0,
            entity.kind.to_string(),
            entity.name.as_deref().unwrap_or(""),
            entity.x,
            entity.z,
            state,
            task,
        );
    }
}
