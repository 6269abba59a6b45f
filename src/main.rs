use std::{error::Error, fs, sync::Arc};

use anyhow::Context;
use bollard::{Docker, API_DEFAULT_VERSION};
use livesync::{
    config::load_config,
    infra::{
        docker::DockerRuntime,
        web::{router, SyncService},
    },
    Container,
};
use log::info;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = load_config()?;
    info!("Loaded config {:?}", config);
    let docker = Docker::connect_with_socket(&config.docker_socket, 120, API_DEFAULT_VERSION)
        .context("Can't connect to docker socket")?;

    let dockerfile = fs::read_to_string(&config.dockerfile)
        .with_context(|| format!("Can't read Dockerfile {}", config.dockerfile))?;
    let container = Container::new(
        &dockerfile,
        config.context.as_str(),
        config.container.as_str(),
        Arc::new(DockerRuntime { docker }),
    )?
    .with_options(config.sync_options());

    info!("Container {} synchronized from {}", container.id(), container.context_root().display());
    if !container.check_running().await? {
        info!("Container {} is not running yet, synchronization will fail until it starts", container.id());
    }

    let listener = TcpListener::bind(config.listen_address.as_str()).await?;
    info!("Listening on {}", config.listen_address);
    axum::serve(listener, router(SyncService::new(container))).await?;
    Ok(())
}
