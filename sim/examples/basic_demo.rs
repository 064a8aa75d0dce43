//! Basic demonstration of the horde simulation.
//!
//! Run with: cargo run --example basic_demo
//! More detail: RUST_LOG=horde_sim=debug cargo run --example basic_demo

use horde_sim::{CharacterId, EnemyKind, SimConfig, SimWorld};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== Horde Sim - Simulation Demo ===\n");

    let mut config = SimConfig::default();
    config.waves.base_rate = 12.0;
    config.waves.boss_at = 20.0;
    let mut sim = match SimWorld::with_config(config) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("bad config: {err}");
            return;
        }
    };
    sim.set_character(CharacterId::Engineer);

    // A pack already closing in
    for i in 0..24 {
        let angle = i as f32 / 24.0 * std::f32::consts::TAU;
        let _ = sim.spawn_enemy(EnemyKind::Medium, angle.cos() * 260.0, angle.sin() * 260.0);
    }

    // Run 30 seconds at 60 Hz, the player walking a slow circle
    println!("Running simulation for 30 seconds...\n");
    for frame in 0..1800 {
        let t = frame as f32 / 60.0;
        sim.set_player_position((t * 0.2).cos() * 150.0, (t * 0.2).sin() * 150.0);
        sim.step(1.0 / 60.0);

        if (frame + 1) % 300 == 0 {
            print_status(&sim);
        }
    }

    println!("\n{}", sim.profiler().summary());

    println!("=== Final State (JSON) ===\n");
    match sim.snapshot().to_json_pretty() {
        Ok(json) => println!("{}", &json[..json.len().min(2000)]),
        Err(err) => eprintln!("snapshot failed: {err}"),
    }
}

fn print_status(sim: &SimWorld) {
    let player = sim.player();
    let stats = sim.stats();
    let meter = player.ability.meter();
    println!(
        "--- Tick {} (t={:.1}s) ---\n  hp={:.0}/{:.0} xp={} gold={} {}={:.0}/{:.0}",
        sim.current_tick(),
        sim.current_time(),
        player.hp,
        player.max_hp,
        player.xp,
        player.gold,
        meter.label,
        meter.value,
        meter.max,
    );
    println!(
        "  enemies={} gems={} kills={} dropped={} damage={:.0}",
        sim.enemy_count(),
        sim.active_gems().count(),
        stats.kills,
        stats.dropped_spawns,
        stats.damage_dealt,
    );
    if let Some(boss) = sim.boss() {
        println!("  boss hp={:.0}/{:.0} phase={:?}", boss.hp, boss.max_hp, boss.phase);
    }
}
