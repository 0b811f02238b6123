//! pinch_player — interactive entry point.
//!
//! ```text
//! pinch_player [--config <path>] [--quick]
//! ```

use std::path::PathBuf;

use log::info;

use pinch_player::app::run;
use pinch_player::config::AppConfig;

const DEFAULT_CONFIG: &str = "pinch_player.toml";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║        Pinch Player — gesture-driven MIDI performance        ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "leap")]
    println!("  Mode: LeapMotion hardware");
    #[cfg(not(feature = "leap"))]
    println!("  Mode: Mouse/keyboard simulation  (use --features leap for hardware)");
    println!();

    let cfg = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match &cfg.catalog.dir {
        Some(dir) => println!("  Catalog: {}", dir.display()),
        None      => println!("  Catalog: none (set [catalog] dir in the config)"),
    }
    println!("  Pinch threshold: {} px", cfg.gesture.pinch_threshold);
    println!();
    println!("  Opening visualizer window…");
    println!();

    if let Err(e) = run(cfg) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// `--quick` uses the defaults; `--config <path>` must load.  Otherwise
/// `pinch_player.toml` is used when present.
fn load_config() -> Result<AppConfig, pinch_player::error::ConfigError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--quick") {
        println!("  Quick-start: default configuration\n");
        return Ok(AppConfig::default());
    }

    let explicit = args.iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    match explicit {
        Some(path) => {
            info!("loading config from {}", path.display());
            AppConfig::load(&path)
        }
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG);
            if path.exists() {
                info!("loading config from {}", path.display());
                AppConfig::load(&path)
            } else {
                Ok(AppConfig::default())
            }
        }
    }
}
