use std::{path::Path, time::Duration};

use anyhow::{Context, Error};
use bytes::{BufMut, Bytes, BytesMut};
use flate2::{write::GzEncoder, Compression};
use log::{debug, info};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{
    error::SyncError,
    model::{Action, CopyAction, CopyFile, DeleteAction, FileUpdates},
    port::ContainerRuntime,
    restart::RestartMonitor,
};

/// How the main process is restarted once files changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartMode {
    /// Kill the process and let the container restart policy bring it back.
    #[default]
    Kill,
    /// Ask the runtime to restart the container.
    Restart,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    pub restart_timeout: Duration,
    pub restart_mode: RestartMode,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            restart_timeout: Duration::from_secs(30),
            restart_mode: RestartMode::Kill,
        }
    }
}

/// Applies planned actions to one running container.
pub struct ActionExecutor<'a> {
    pub runtime: &'a dyn ContainerRuntime,
    pub container_id: &'a str,
    pub context_root: &'a Path,
    pub options: &'a SyncOptions,
    pub cancel: &'a CancellationToken,
}

impl ActionExecutor<'_> {
    pub async fn perform(&self, updates: &FileUpdates, actions: &[Action]) -> Result<(), SyncError> {
        let state = self
            .runtime
            .inspect(self.container_id)
            .await
            .map_err(|e| SyncError::Inspect {
                container: self.container_id.to_string(),
                reason: format!("{:#}", e),
            })?;
        if !state.running {
            return Err(SyncError::NotRunning(self.container_id.to_string()));
        }
        if actions.is_empty() {
            debug!("No action needed for {} changed files", updates.len());
            return Ok(());
        }

        info!(
            "Applying {} actions for {} changed files to container {}",
            actions.len(),
            updates.len(),
            self.container_id
        );
        for action in actions {
            match action {
                Action::Copy(copy) => self.copy(copy).await?,
                Action::Delete(delete) => self.delete(delete).await?,
            }
        }
        self.restart().await
    }

    async fn copy(&self, copy: &CopyAction) -> Result<(), SyncError> {
        let paths: Vec<String> = copy.files.iter().map(|file| file.host_path.clone()).collect();
        let archive = build_archive(self.context_root, &copy.files)
            .map_err(|e| SyncError::transfer("archive", paths.clone(), e))?;
        self.runtime
            .put_archive(self.container_id, &copy.destination_dir, archive)
            .await
            .map_err(|e| SyncError::transfer(format!("copy to {}", copy.destination_dir), paths, e))?;
        info!(
            "Copied {} files to {}:{}",
            copy.files.len(),
            self.container_id,
            copy.destination_dir
        );
        Ok(())
    }

    async fn delete(&self, delete: &DeleteAction) -> Result<(), SyncError> {
        for path in &delete.container_paths {
            let command = vec!["rm".to_string(), "-rf".to_string(), path.clone()];
            let exit_code = self
                .runtime
                .exec(self.container_id, command)
                .await
                .map_err(|e| SyncError::transfer("delete", vec![path.clone()], e))?;
            if exit_code != 0 {
                return Err(SyncError::Transfer {
                    action: "delete".to_string(),
                    paths: vec![path.clone()],
                    reason: format!("rm exited with code {}", exit_code),
                });
            }
            info!("Deleted {}:{}", self.container_id, path);
        }
        Ok(())
    }

    async fn restart(&self) -> Result<(), SyncError> {
        // Subscribed right before the request: transitions caused by anything
        // earlier, like an application crash during the upload, are not ours.
        let events = self
            .runtime
            .events(self.container_id)
            .await
            .map_err(|e| SyncError::EventStreamClosed {
                container: self.container_id.to_string(),
                reason: format!("{:#}", e),
            })?;
        info!("Restarting container {} ({:?})", self.container_id, self.options.restart_mode);
        let requested = match self.options.restart_mode {
            RestartMode::Kill => self.runtime.kill(self.container_id).await,
            RestartMode::Restart => self.runtime.restart(self.container_id).await,
        };
        requested.map_err(|e| SyncError::Restart {
            container: self.container_id.to_string(),
            reason: format!("{:#}", e),
        })?;

        RestartMonitor::new(self.container_id)
            .wait(events, self.options.restart_timeout, self.cancel)
            .await
    }
}

/// Gzipped tar holding the current content of each file under its container name.
fn build_archive(context_root: &Path, files: &[CopyFile]) -> Result<Bytes, Error> {
    let tar_gz = BytesMut::new().writer();
    let enc = GzEncoder::new(tar_gz, Compression::default());
    let mut tar = tar::Builder::new(enc);
    for file in files {
        tar.append_path_with_name(context_root.join(&file.host_path), &file.container_name)
            .with_context(|| format!("Can't read {}", file.host_path))?;
    }
    let tar_gz = tar.into_inner()?.finish()?;
    Ok(tar_gz.into_inner().freeze())
}
