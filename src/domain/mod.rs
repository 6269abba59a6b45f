use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::info;
use tokio_util::sync::CancellationToken;

use error::SyncError;
use executor::{ActionExecutor, SyncOptions};
use model::{Action, FileUpdates, ResolvedCopyRule};
use port::ContainerRuntime;

pub mod error;
pub mod executor;
pub mod instructions;
pub mod model;
pub mod path;
pub mod pattern;
pub mod planner;
pub mod port;
pub mod restart;

/// A running container kept in sync with its build context.
///
/// Copy rules are derived once from the Dockerfile. The runtime handle is
/// shared with the caller, which also owns the container lifecycle.
/// Synchronizations of one container must not overlap.
pub struct Container {
    container_id: String,
    context_root: PathBuf,
    rules: Vec<ResolvedCopyRule>,
    runtime: Arc<dyn ContainerRuntime>,
    options: SyncOptions,
    cancel: CancellationToken,
}

impl Container {
    pub fn new(
        dockerfile: &str,
        context_root: impl Into<PathBuf>,
        container_id: impl Into<String>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Result<Container, SyncError> {
        let context_root = context_root.into();
        let rules = instructions::parse(dockerfile, &context_root)?;
        let container_id = container_id.into();
        info!("Container {} tracks {} copy rules", container_id, rules.len());
        Ok(Container {
            container_id,
            context_root,
            rules,
            runtime,
            options: SyncOptions::default(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn id(&self) -> &str {
        &self.container_id
    }

    pub fn context_root(&self) -> &Path {
        &self.context_root
    }

    pub fn rules(&self) -> &[ResolvedCopyRule] {
        &self.rules
    }

    /// Cancelling this token aborts any pending restart confirmation, now and
    /// for every later synchronization.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn check_running(&self) -> Result<bool, SyncError> {
        self.runtime
            .inspect(&self.container_id)
            .await
            .map(|state| state.running)
            .map_err(|e| SyncError::Inspect {
                container: self.container_id.clone(),
                reason: format!("{:#}", e),
            })
    }

    pub fn actions_needed(&self, updates: &FileUpdates) -> Vec<Action> {
        planner::actions_needed(&self.rules, updates)
    }

    pub async fn perform_actions(&self, updates: &FileUpdates, actions: &[Action]) -> Result<(), SyncError> {
        ActionExecutor {
            runtime: self.runtime.as_ref(),
            container_id: &self.container_id,
            context_root: &self.context_root,
            options: &self.options,
            cancel: &self.cancel,
        }
        .perform(updates, actions)
        .await
    }

    /// Plans and applies `updates`, returning the applied actions.
    pub async fn sync(&self, updates: &FileUpdates) -> Result<Vec<Action>, SyncError> {
        let actions = self.actions_needed(updates);
        self.perform_actions(updates, &actions).await?;
        Ok(actions)
    }
}
