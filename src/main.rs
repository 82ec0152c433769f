//! Kiosk BLE provisioning agent binary.

#[cfg(feature = "bluez")]
#[tokio::main]
async fn main() {
    use clap::Parser;
    use kiosk_ble_provisioner::{AgentConfig, Cli};
    use log::{error, info};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AgentConfig::from(Cli::parse());
    info!("=== Kiosk BLE provisioner starting ===");
    info!("Network service at {}", config.api_base);

    if let Err(e) = kiosk_ble_provisioner::run(config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "bluez"))]
fn main() {
    println!("This binary requires the 'bluez' feature.");
    println!("Use 'cargo build --features bluez' on the target device.");
    std::process::exit(1);
}
