use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Error};
use async_trait::async_trait;
use bollard::{
    container::{
        DownloadFromContainerOptions, InspectContainerOptions, KillContainerOptions, LogOutput,
        RestartContainerOptions, StartContainerOptions, StopContainerOptions, UploadToContainerOptions,
    },
    exec::{CreateExecOptions, StartExecResults},
    system::EventsOptions,
    Docker,
};
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use log::{debug, warn};
use map_macro::hash_map;

use crate::domain::{
    model::{ContainerState, EventStatus, RuntimeEvent},
    port::{ContainerRuntime, EventStream},
};

pub struct DockerRuntime {
    pub docker: Docker,
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn inspect(&self, container_id: &str) -> Result<ContainerState, Error> {
        let container = self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .context(format!("Error while inspecting container {}", container_id))?;
        Ok(ContainerState {
            running: container.state.and_then(|state| state.running).unwrap_or(false),
        })
    }

    async fn start(&self, container_id: &str) -> Result<(), Error> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .context(format!("Error starting container {}", container_id))
    }

    async fn stop(&self, container_id: &str) -> Result<(), Error> {
        self.docker
            .stop_container(container_id, None::<StopContainerOptions>)
            .await
            .context(format!("Error stopping container {}", container_id))
    }

    async fn put_archive(&self, container_id: &str, path: &str, archive: Bytes) -> Result<(), Error> {
        self.docker
            .upload_to_container(
                container_id,
                Some(UploadToContainerOptions {
                    path,
                    ..Default::default()
                }),
                archive,
            )
            .await
            .context(format!("Error while uploading archive to {}:{}", container_id, path))
    }

    async fn get_archive(&self, container_id: &str, path: &str) -> Result<Bytes, Error> {
        self.docker
            .download_from_container(container_id, Some(DownloadFromContainerOptions { path }))
            .try_fold(BytesMut::new(), |mut archive, chunk| async move {
                archive.extend_from_slice(&chunk);
                Ok(archive)
            })
            .await
            .map(BytesMut::freeze)
            .context(format!("Error while downloading {}:{}", container_id, path))
    }

    async fn exec(&self, container_id: &str, command: Vec<String>) -> Result<i64, Error> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(command.clone()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .context(format!("Can't create exec {:?} in {}", command, container_id))?;

        if let StartExecResults::Attached { mut output, .. } = self.docker.start_exec(&exec.id, None).await? {
            while let Some(Ok(output)) = output.next().await {
                match output {
                    LogOutput::StdOut { message } => debug!("{} => {:?}", container_id, message),
                    LogOutput::StdErr { message } => warn!("{} => {:?}", container_id, message),
                    _ => {}
                }
            }
        }

        self.docker
            .inspect_exec(&exec.id)
            .await
            .context(format!("Can't inspect exec {:?} in {}", command, container_id))
            .map(|inspect| inspect.exit_code.unwrap_or(0))
    }

    async fn kill(&self, container_id: &str) -> Result<(), Error> {
        self.docker
            .kill_container(container_id, None::<KillContainerOptions<String>>)
            .await
            .context(format!("Error while killing container {}", container_id))
    }

    async fn restart(&self, container_id: &str) -> Result<(), Error> {
        self.docker
            .restart_container(container_id, None::<RestartContainerOptions>)
            .await
            .context(format!("Error while restarting container {}", container_id))
    }

    async fn events(&self, container_id: &str) -> Result<EventStream, Error> {
        // The daemon request is only sent on first poll. `since` makes the
        // daemon replay whatever happened in between.
        let since = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the Unix epoch")?;
        let container_id = container_id.to_string();
        let events = self
            .docker
            .events(Some(EventsOptions::<String> {
                since: Some(format!("{}.{:09}", since.as_secs(), since.subsec_nanos())),
                filters: hash_map! {
                    "type".to_string() => vec!["container".to_string()],
                    "container".to_string() => vec![container_id.clone()]
                },
                ..Default::default()
            }))
            .map(move |event| {
                event
                    .map(|message| RuntimeEvent {
                        status: EventStatus::from(message.action.as_deref().unwrap_or_default()),
                    })
                    .context(format!("Error in event stream of {}", container_id))
            });
        Ok(events.boxed())
    }
}
