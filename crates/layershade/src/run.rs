use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::bootstrap::{self, resolve_scene, run_settings};
use crate::cli::RunArgs;
use crate::paths::AppPaths;
use crate::report;
use crate::window::{self, WindowConfig};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let loaded = resolve_scene(args.scene.as_deref(), &paths.scene_file())?;
    let settings = run_settings(&loaded.scene, &args)?;
    let layers = bootstrap::prepare_layers(&loaded.scene, settings.size)?;

    if args.check {
        let summary = report::describe(&loaded, &settings, &layers);
        if args.json {
            report::print_json(&summary)?;
        } else {
            report::print_text(&summary);
        }
        return Ok(());
    }

    window::run(WindowConfig {
        settings,
        layers,
        title: format!("layershade - {}", loaded.origin),
    })
}
