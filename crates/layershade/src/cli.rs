use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "layershade",
    author,
    version,
    about = "Layered GLSL shader compositor",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Scene file to render. Falls back to `scene.toml` in the config
    /// directory, then to the built-in two-layer scene.
    #[arg(value_name = "SCENE")]
    pub scene: Option<PathBuf>,

    /// Override the surface size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,

    /// Optional FPS cap (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Shrink the backing store by 64 pixels per axis per step on resize.
    #[arg(long, value_name = "STEPS")]
    pub quality: Option<u32>,

    /// Log the measured frame rate at the scene's report interval.
    #[arg(long)]
    pub show_fps: bool,

    /// Exit after presenting this many frames.
    #[arg(long, value_name = "COUNT")]
    pub frames: Option<u64>,

    /// Fail instead of skipping layers whose shaders do not build.
    #[arg(long)]
    pub strict: bool,

    /// Validate the scene and list its layers without opening a window.
    #[arg(long)]
    pub check: bool,

    /// With `--check`, print the layer summary as JSON.
    #[arg(long, requires = "check")]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}
