use clap::Parser;
use dsmlgate::{DsmlEngine, GatewayConfig};
use tokio::io::AsyncReadExt;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = dsmlgate::config::CliArgs::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        match args.log_level.to_lowercase().as_str() {
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = GatewayConfig::from_cli_args(&args);
    let engine = DsmlEngine::new(config);

    let response = match &args.file {
        Some(path) if args.encoding.is_some() => {
            let bytes = tokio::fs::read(path).await?;
            engine.run_batch_bytes(&bytes, args.encoding.as_deref()).await
        }
        Some(path) => engine.run_batch_file(path).await,
        None => {
            let mut bytes = Vec::new();
            tokio::io::stdin().read_to_end(&mut bytes).await?;
            engine.run_batch_bytes(&bytes, args.encoding.as_deref()).await
        }
    };

    println!("{}", response);
    Ok(())
}
