//! Tunnel Grove entry point
//!
//! Headless native runner: plays one autopilot session at a fixed frame
//! rate and logs every game event.
//!
//! Usage: `tunnel-grove [settings.json] [--dump-tree]`

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    use tunnel_grove::Settings;
    use tunnel_grove::consts::SIM_DT;
    use tunnel_grove::geometry::build_tree;
    use tunnel_grove::sim::{GameEvent, GameState, autopilot_input, run_frame};

    env_logger::init();

    let mut settings_path = None;
    let mut dump_tree = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dump-tree" => dump_tree = true,
            _ => settings_path = Some(arg),
        }
    }

    let settings = match settings_path {
        Some(path) => Settings::load(path),
        None => Settings::default(),
    };

    if dump_tree {
        let seed = settings.seed.unwrap_or_default();
        let model = build_tree(&settings.tree, &mut Pcg32::seed_from_u64(seed));
        match serde_json::to_string_pretty(&model) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                log::error!("Failed to serialize tree: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    log::info!("Tunnel Grove (headless) starting...");
    let mut state = GameState::new(&settings);
    state.toggle();

    let mut frames = 0;
    while frames < settings.max_frames {
        let input = autopilot_input(&state);
        let more = run_frame(&mut state, &input, SIM_DT);
        frames += 1;

        for event in state.drain_events() {
            match event {
                GameEvent::Started => log::info!("Started"),
                GameEvent::ScoreChanged(score) => log::debug!("Score {}", score),
                GameEvent::LevelCompleted => log::info!("Level layout cleared"),
                GameEvent::GameEnded(score) => log::info!("Game ended with score {}", score),
            }
        }

        if !more {
            break;
        }
    }

    println!(
        "seed {} | frames {} | distance {:.1} | level {} | score {}",
        state.seed,
        frames,
        -state.player.position.z,
        state.level.level(),
        state.level.score()
    );
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The simulation library is embedded by a web front end instead
}
