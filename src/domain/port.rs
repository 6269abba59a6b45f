use anyhow::Error;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use super::model::{ContainerState, RuntimeEvent};

pub type EventStream = BoxStream<'static, Result<RuntimeEvent, Error>>;

/// Operations the synchronization engine needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn inspect(&self, container_id: &str) -> Result<ContainerState, Error>;

    async fn start(&self, container_id: &str) -> Result<(), Error>;

    async fn stop(&self, container_id: &str) -> Result<(), Error>;

    /// Extracts a tar archive (optionally gzipped) into `path`.
    async fn put_archive(&self, container_id: &str, path: &str, archive: Bytes) -> Result<(), Error>;

    async fn get_archive(&self, container_id: &str, path: &str) -> Result<Bytes, Error>;

    /// Runs `command` inside the container and returns its exit code.
    async fn exec(&self, container_id: &str, command: Vec<String>) -> Result<i64, Error>;

    /// Kills the main process. The runtime restart policy is expected to bring it back.
    async fn kill(&self, container_id: &str) -> Result<(), Error>;

    async fn restart(&self, container_id: &str) -> Result<(), Error>;

    /// Lifecycle events of `container_id` happening after this call.
    async fn events(&self, container_id: &str) -> Result<EventStream, Error>;
}
