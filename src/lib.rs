//! Live synchronization of build-context changes into a running container.
//!
//! The Dockerfile of the image is read once to learn where each context file
//! lands in the container. A batch of host changes is then turned into a short
//! list of archive uploads and deletions, applied to the running container,
//! and followed by a restart of its main process.

pub mod config;
pub mod domain;
pub mod infra;

pub use domain::{
    error::SyncError,
    executor::{RestartMode, SyncOptions},
    model::{Action, CopyAction, CopyFile, DeleteAction, FileUpdates, ResolvedCopyRule},
    port::ContainerRuntime,
    Container,
};
