use crate::config::Config;
use crate::main_loop::MainLoop;
use crate::platform::Platforms;
use anyhow::{Context, Error};
use log::{error, info, trace};
use mimalloc::MiMalloc;
use std::env;
use std::fs;
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::oneshot;

mod config;
mod devices;
mod dps;
mod entity;
mod ha;
mod main_loop;
mod platform;
mod publisher;
mod schema;
mod sensor;
mod transform;
mod utils;

#[global_allocator]
static GLOBAL_ALLOCATOR: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    pretty_env_logger::init();

    let config_path = env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from("config.toml"), PathBuf::from);
    info!("Reading config from {}...", config_path.display());
    let config = fs::read_to_string(&config_path)
        .with_context(|| format!("Could not read {}", config_path.display()))?;
    let config = toml::from_str::<Config>(&config)
        .with_context(|| format!("Could not parse {}", config_path.display()))?;
    trace!("Config: {:#?}", config);

    let mut platforms = Platforms::default();
    platforms.register(sensor::platform())?;

    let mut main_loop = MainLoop::new(config, &platforms)?;
    let (stop_sender, stop_receiver) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        let _ = stop_sender.send(());
    });
    main_loop.run(stop_receiver).await
}
