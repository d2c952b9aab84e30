//! Four-diagnosis demo binary.
//!
//! Replays a fixture through the coordinator and prints the assembled
//! result as JSON. No language model is wired.
//!
//! Usage:
//!   sizhen-demo --fixture consultation.json
//!   sizhen-demo --config sizhen.toml --fixture consultation.json

use sizhen_coordinator::{CoordinatorConfig, Fixture, FourDiagnosisCoordinator};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sizhen_coordinator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut fixture_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--fixture" | "-f" => {
                if i + 1 < args.len() {
                    fixture_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Four-diagnosis coordination demo");
                println!();
                println!("Usage: sizhen-demo [OPTIONS] --fixture <FILE>");
                println!();
                println!("Options:");
                println!("  -c, --config <FILE>    TOML configuration (defaults otherwise)");
                println!("  -f, --fixture <FILE>   JSON consultation fixture to replay");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            other => anyhow::bail!("Unknown argument '{other}' (try --help)"),
        }
        i += 1;
    }

    let Some(fixture_path) = fixture_path else {
        anyhow::bail!("--fixture <FILE> is required");
    };

    let config = match &config_path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            CoordinatorConfig::from_file(path)?
        }
        None => CoordinatorConfig::default(),
    };

    let fixture = Fixture::from_file(&fixture_path)
        .map_err(|e| anyhow::anyhow!("Invalid fixture '{}': {}", fixture_path.display(), e))?;

    let coordinator = fixture
        .services()
        .into_iter()
        .fold(FourDiagnosisCoordinator::new(config)?, |coordinator, service| {
            coordinator.with_service(service)
        });

    let result = coordinator.coordinate(&fixture.request()).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    let metrics = coordinator.metrics().snapshot();
    info!(
        coordinations = metrics.coordinations,
        adapter_failures = metrics.adapter_failures,
        "Demo finished"
    );
    Ok(())
}
