use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = caravan::cli::Cli::parse();
    caravan::cli::run(cli).await
}
