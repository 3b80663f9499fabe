use log::info;
use slot_roster::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr = std::env::var("ROSTER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let state = match std::env::var("ROSTER_CONFIG") {
        Ok(path) => {
            info!("Loading default config from {}", path);
            AppState::with_default_config(slot_roster::Config::load(&path)?)
        }
        Err(_) => AppState::default(),
    };

    server::run_server(&addr, state).await?;
    Ok(())
}
