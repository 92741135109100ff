// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses command line arguments with clap and hands off to the
// application layer. This is the only layer that prints.
//
//   1. `inspect` — summarise a checkpoint
//   2. `layers`  — list hookable layer names
//   3. `embed`   — embed a directory of images
//   4. `compare` — similarity between two images
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, CompareArgs, EmbedArgs, InspectArgs, LayersArgs};

use crate::infra::config::ModelConfig;

#[derive(Parser, Debug)]
#[command(
    name = "face-bench",
    version,
    about = "Load pretrained face-recognition networks, capture layer activations and extract embeddings."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Inspect(args) => run_inspect(args),
            Commands::Layers(args)  => run_layers(args),
            Commands::Embed(args)   => run_embed(args),
            Commands::Compare(args) => run_compare(args),
        }
    }
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    let report = InspectUseCase::new(args.arch).inspect(&args.weights)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_layers(args: LayersArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    for layer in InspectUseCase::new(args.arch).layers() {
        println!("{layer}");
    }
    Ok(())
}

fn run_embed(args: EmbedArgs) -> Result<()> {
    use crate::application::embed_use_case::EmbedUseCase;
    use crate::data::loader::ImageLoader;

    let config = ModelConfig::try_from(args.model)?;
    tracing::info!("Embedding images in '{}' with '{}'", args.images_dir, config.name);

    let mut use_case = EmbedUseCase::from_config(&config)?;
    let report = use_case.execute(&ImageLoader::new(&args.images_dir))?;
    report.save(&args.output)?;

    println!("Embedded {} images → {}", report.embeddings.len(), args.output.display());
    Ok(())
}

fn run_compare(args: CompareArgs) -> Result<()> {
    use crate::application::embed_use_case::EmbedUseCase;

    let config = ModelConfig::try_from(args.model)?;
    let mut use_case = EmbedUseCase::from_config(&config)?;
    let similarity = use_case.compare(&args.image_a, &args.image_b)?;

    println!("Cosine similarity: {similarity:.4}");
    Ok(())
}
