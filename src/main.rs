use anyhow::Result;
use clap::Parser;
use face_model_bench::cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("face_model_bench=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
