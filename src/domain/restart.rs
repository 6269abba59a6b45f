use std::time::Duration;

use futures::StreamExt;
use log::{debug, info};
use tokio_util::sync::CancellationToken;

use super::{
    error::SyncError,
    model::EventStatus,
    port::EventStream,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartState {
    Idle,
    AwaitingStop,
    AwaitingStart,
    Confirmed,
    Failed,
}

/// Tracks the stop-then-start sequence expected after a restart is requested.
#[derive(Debug)]
pub struct RestartMonitor {
    container_id: String,
    state: RestartState,
}

impl RestartMonitor {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            state: RestartState::Idle,
        }
    }

    pub fn state(&self) -> RestartState {
        self.state
    }

    /// Called once the restart has been requested from the runtime.
    pub fn arm(&mut self) {
        if self.state == RestartState::Idle {
            self.state = RestartState::AwaitingStop;
        }
    }

    pub fn observe(&mut self, status: &EventStatus) -> Result<RestartState, SyncError> {
        self.state = match (self.state, status) {
            (RestartState::AwaitingStop, status) if status.is_stop() => RestartState::AwaitingStart,
            (RestartState::AwaitingStop, EventStatus::Start) => {
                self.state = RestartState::Failed;
                return Err(SyncError::RestartOrder(self.container_id.clone()));
            }
            (RestartState::AwaitingStart, EventStatus::Start) => RestartState::Confirmed,
            (state, _) => state,
        };
        debug!("Container {} restart state {:?} after {:?}", self.container_id, self.state, status);
        Ok(self.state)
    }

    /// Consumes `events` until the restart is confirmed, the window elapses or
    /// `cancel` fires.
    pub async fn wait(
        mut self,
        mut events: EventStream,
        window: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        self.arm();
        let container_id = self.container_id.clone();
        let confirmation = async {
            while let Some(event) = events.next().await {
                let event = event.map_err(|e| SyncError::EventStreamClosed {
                    container: container_id.clone(),
                    reason: format!("{:#}", e),
                })?;
                if self.observe(&event.status)? == RestartState::Confirmed {
                    return Ok(());
                }
            }
            Err(SyncError::EventStreamClosed {
                container: container_id.clone(),
                reason: "stream ended".to_string(),
            })
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(SyncError::RestartCancelled(container_id.clone())),
            outcome = tokio::time::timeout(window, confirmation) => match outcome {
                Ok(confirmed) => {
                    if confirmed.is_ok() {
                        info!("Container {} restarted", container_id);
                    }
                    confirmed
                }
                Err(_) => Err(SyncError::RestartTimeout {
                    container: container_id.clone(),
                    waited: window,
                }),
            },
        }
    }
}
