use std::process::ExitCode;

use rpg_engine::run_app;
use tracing::error;

use super::bootstrap::{bus_wiring, AppWiring};
use super::scenes::build_registry;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let registry = build_registry(&app.game, &app.services);
    let wiring = bus_wiring(app.services.clone());
    if let Err(err) = run_app(app.config, &app.paths, registry, Some(wiring)) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
