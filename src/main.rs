use clap::Parser;
use tracing_subscriber::EnvFilter;

use arduino_car_runtime::config::Config;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    if let Err(e) = arduino_car_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
