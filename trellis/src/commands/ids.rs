use std::path::PathBuf;

use clap::Args;
use eyre::Result;
use trellis_graph::{all_dependencies, direct_dependencies};

#[derive(Args)]
pub struct IdsCommand {
    /// Path to the pipeline file (defaults to ./pipeline.yaml)
    #[arg(short, long, default_value = "pipeline.yaml")]
    pub config: PathBuf,

    /// Storage root prefix used when deriving artifact keys
    #[arg(long, default_value = "apps")]
    pub root: String,

    /// Also print each resource's dependency IDs
    #[arg(long)]
    pub deps: bool,

    /// Include the transitive closure when printing dependencies
    #[arg(long, requires = "deps")]
    pub all: bool,
}

impl IdsCommand {
    pub fn run(&self) -> Result<()> {
        let context = super::build_context(&self.config, &self.root)?;

        println!("context {}", context.id);
        for resource in context.resources() {
            let ids = resource.ids();
            println!("{}: {}", resource.kind(), resource.name());
            println!("  id           {}", ids.id);
            if ids.id_with_tags != ids.id {
                println!("  id_with_tags {}", ids.id_with_tags);
            }
            if self.deps {
                let deps = if self.all {
                    all_dependencies(resource, &context)
                } else {
                    direct_dependencies(resource, &context)
                };
                for dep in deps {
                    println!("  dep          {dep}");
                }
            }
        }

        Ok(())
    }
}
