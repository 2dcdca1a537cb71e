use clap::Parser;
use tracing_subscriber::EnvFilter;

use thruster_zenoh_runtime::config::Settings;

#[tokio::main]
async fn main() {
    let settings = Settings::parse();

    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    if let Err(e) = thruster_zenoh_runtime::runtime::run(settings).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
