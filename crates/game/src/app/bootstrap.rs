use rpg_engine::{resolve_app_paths, AppPaths, BusWiring, LoopConfig, StartupError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use super::audio::subscribe_music;
use super::config::{GameConfig, CONFIG_FILE_NAME};
use super::services::GameServices;

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) paths: AppPaths,
    pub(crate) game: GameConfig,
    pub(crate) services: GameServices,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Tile RPG Startup ===");

    let paths = resolve_app_paths()?;
    let mut game = GameConfig::load_or_default(&paths.assets_dir.join(CONFIG_FILE_NAME));
    game.apply_env_overrides(|name| std::env::var(name).ok());

    let config = loop_config(&game);
    let services = GameServices::new(game.music_volume);
    Ok(AppWiring {
        config,
        paths,
        game,
        services,
    })
}

fn loop_config(game: &GameConfig) -> LoopConfig {
    LoopConfig {
        window_title: game.window_title.clone(),
        window_width: game.window_width,
        window_height: game.window_height,
        target_tps: game.target_tps,
        start_scene: game.start_scene,
        ..LoopConfig::default()
    }
}

/// Runs on startup and after every full reset, against a fresh bus.
pub(crate) fn bus_wiring(services: GameServices) -> BusWiring {
    Box::new(move |bus| {
        services.reset();
        if let Err(err) = subscribe_music(&services.music, bus) {
            error!(error = %err, "music_subscription_failed");
        }
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
