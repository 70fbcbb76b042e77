use std::path::PathBuf;

use clap::Args;
use eyre::Result;

#[derive(Args)]
pub struct CheckCommand {
    /// Path to the pipeline file (defaults to ./pipeline.yaml)
    #[arg(short, long, default_value = "pipeline.yaml")]
    pub config: PathBuf,

    /// Storage root prefix used when deriving artifact keys
    #[arg(long, default_value = "apps")]
    pub root: String,
}

impl CheckCommand {
    pub fn run(&self) -> Result<()> {
        let context = super::build_context(&self.config, &self.root)?;

        println!("✓ {} is valid\n", self.config.display());
        println!("  {} ({})", context.app_name, &context.id[..12]);
        println!();

        let counts = [
            ("python packages", context.python_packages.len()),
            ("raw columns", context.raw_columns.len()),
            ("constants", context.constants.len()),
            ("aggregates", context.aggregates.len()),
            ("transformed columns", context.transformed_columns.len()),
            ("models", context.models.len()),
            ("training datasets", context.training_datasets.len()),
            ("apis", context.apis.len()),
        ];
        for (label, count) in counts {
            if count > 0 {
                println!("  {count} {label}");
            }
        }

        Ok(())
    }
}
