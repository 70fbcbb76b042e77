mod check;
mod ids;

use check::CheckCommand;
use clap::{Parser, Subcommand};
use eyre::Result;
use ids::IdsCommand;

/// Extension trait for exiting on validation errors with pretty formatting
pub(crate) trait UnwrapOrExit<T> {
    fn unwrap_or_exit(self) -> T;
}

impl<T> UnwrapOrExit<T> for trellis_schema::Result<T> {
    fn unwrap_or_exit(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => {
                eprintln!("{:?}", miette::Report::new(*e));
                std::process::exit(1);
            }
        }
    }
}

#[derive(Parser)]
#[command(name = "trellis")]
#[command(version)]
#[command(about = "Build content-addressed pipeline contexts from YAML definitions")]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Check(cmd) => cmd.run(),
            Commands::Ids(cmd) => cmd.run(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a pipeline file and summarize its context
    Check(CheckCommand),

    /// Print every resource's content IDs and dependencies
    Ids(IdsCommand),
}

/// Parses a pipeline file and builds its context, exiting with a rendered
/// diagnostic on any validation failure.
pub(crate) fn build_context(path: &std::path::Path, root: &str) -> Result<trellis_graph::Context> {
    use eyre::WrapErr;

    let src = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let doc = trellis_types::from_yaml_str(&src)
        .map_err(Into::<Box<trellis_schema::Error>>::into)
        .unwrap_or_exit();
    let config =
        trellis_graph::PipelineConfig::from_value(&doc, &path.display().to_string())
            .unwrap_or_exit();
    let registry = trellis_graph::Registry::builtin().unwrap_or_exit();
    let root = format!("{root}/{}", config.app_name);
    Ok(trellis_graph::Context::build(&config, &registry, &root).unwrap_or_exit())
}
