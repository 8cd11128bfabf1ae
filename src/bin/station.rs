//! Station process entry point: no CLI surface of its own (every tunable
//! comes from `MOTHERSHIP_*` environment variables, §10.3), just bind and
//! run.

use mothership::{Config, Station};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    let station = match Station::bind(config).await {
        Ok(station) => station,
        Err(e) => {
            tracing::error!(error = %e, "station failed to start");
            std::process::exit(1);
        }
    };

    station.run().await;
}
