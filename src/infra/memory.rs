//! In-memory [`ContainerRuntime`] used by the tests in place of a Docker daemon.

use std::{
    collections::{BTreeMap, HashMap},
    io::Read,
    sync::Mutex,
};

use anyhow::{anyhow, Context, Error};
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use flate2::read::GzDecoder;
use futures::{channel::mpsc, StreamExt};

use crate::domain::{
    model::{ContainerState, EventStatus, RuntimeEvent},
    path::{basename, join, normalize_absolute},
    port::{ContainerRuntime, EventStream},
};

/// What the fake does when its main process is killed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartBehaviour {
    /// Restart policy brings the process back: kill, die, start.
    Policy,
    /// No restart policy: kill, die and the container stays down.
    Never,
    /// Reports a start without the preceding stop.
    StartOnly,
}

#[derive(Default)]
struct FakeContainer {
    running: bool,
    files: BTreeMap<String, Vec<u8>>,
}

struct FakeState {
    containers: HashMap<String, FakeContainer>,
    subscribers: Vec<(String, mpsc::UnboundedSender<Result<RuntimeEvent, Error>>)>,
    restart_behaviour: RestartBehaviour,
    crash_during_upload: bool,
    calls: Vec<String>,
}

impl FakeState {
    fn container(&mut self, container_id: &str) -> Result<&mut FakeContainer, Error> {
        self.containers
            .get_mut(container_id)
            .ok_or_else(|| anyhow!("No such container: {}", container_id))
    }

    fn emit(&mut self, container_id: &str, statuses: &[&str]) {
        for status in statuses {
            self.subscribers.retain(|(subscribed, sender)| {
                subscribed != container_id
                    || sender
                        .unbounded_send(Ok(RuntimeEvent {
                            status: EventStatus::from(*status),
                        }))
                        .is_ok()
            });
        }
    }
}

pub struct InMemoryRuntime {
    state: Mutex<FakeState>,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                containers: HashMap::new(),
                subscribers: vec![],
                restart_behaviour: RestartBehaviour::Policy,
                crash_during_upload: false,
                calls: vec![],
            }),
        }
    }

    pub fn with_container(self, container_id: &str, running: bool) -> Self {
        self.state.lock().unwrap().containers.insert(
            container_id.to_string(),
            FakeContainer {
                running,
                ..Default::default()
            },
        );
        self
    }

    pub fn with_restart_behaviour(self, behaviour: RestartBehaviour) -> Self {
        self.state.lock().unwrap().restart_behaviour = behaviour;
        self
    }

    /// The main process dies and is restarted by its policy while an archive
    /// is being uploaded.
    pub fn with_crash_during_upload(self) -> Self {
        self.state.lock().unwrap().crash_during_upload = true;
        self
    }

    pub fn with_file(self, container_id: &str, path: &str, content: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .containers
            .get_mut(container_id)
            .unwrap()
            .files
            .insert(normalize_absolute(path), content.to_vec());
        self
    }

    pub fn file(&self, container_id: &str, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(container_id)
            .and_then(|container| container.files.get(&normalize_absolute(path)).cloned())
    }

    /// Mutating calls received so far, e.g. `put_archive /tmp` or `kill`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn restarts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| *call == "kill" || *call == "restart")
            .count()
    }
}

#[async_trait]
impl ContainerRuntime for InMemoryRuntime {
    async fn inspect(&self, container_id: &str) -> Result<ContainerState, Error> {
        let mut state = self.state.lock().unwrap();
        let container = state.container(container_id)?;
        Ok(ContainerState {
            running: container.running,
        })
    }

    async fn start(&self, container_id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.container(container_id)?.running = true;
        state.emit(container_id, &["start"]);
        Ok(())
    }

    async fn stop(&self, container_id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.container(container_id)?.running = false;
        state.emit(container_id, &["kill", "die", "stop"]);
        Ok(())
    }

    async fn put_archive(&self, container_id: &str, path: &str, archive: Bytes) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("put_archive {}", path));
        let crash = state.crash_during_upload;
        let container = state.container(container_id)?;
        let mut archive = tar::Archive::new(GzDecoder::new(&archive[..]));
        for entry in archive.entries().context("Invalid archive")? {
            let mut entry = entry?;
            if entry.header().entry_type().is_dir() {
                continue;
            }
            let name = entry.path()?.to_string_lossy().into_owned();
            let mut content = vec![];
            entry.read_to_end(&mut content)?;
            container.files.insert(join(path, &name), content);
        }
        if crash {
            state.emit(container_id, &["die", "start"]);
        }
        Ok(())
    }

    async fn get_archive(&self, container_id: &str, path: &str) -> Result<Bytes, Error> {
        let mut state = self.state.lock().unwrap();
        let content = state
            .container(container_id)?
            .files
            .get(&normalize_absolute(path))
            .cloned()
            .ok_or_else(|| anyhow!("Could not find the file {} in container {}", path, container_id))?;

        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        let mut tar = tar::Builder::new(BytesMut::new().writer());
        tar.append_data(&mut header, basename(path), &content[..])?;
        Ok(tar.into_inner()?.into_inner().freeze())
    }

    async fn exec(&self, container_id: &str, command: Vec<String>) -> Result<i64, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("exec {}", command.join(" ")));
        let container = state.container(container_id)?;
        if !container.running {
            return Err(anyhow!("Container {} is not running", container_id));
        }
        match command.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
            ["rm", "-rf", path] => {
                let path = normalize_absolute(path);
                let nested = format!("{}/", path);
                container
                    .files
                    .retain(|file, _| *file != path && !file.starts_with(&nested));
                Ok(0)
            }
            _ => Ok(127),
        }
    }

    async fn kill(&self, container_id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("kill".to_string());
        let behaviour = state.restart_behaviour;
        let container = state.container(container_id)?;
        if !container.running {
            return Err(anyhow!("Container {} is not running", container_id));
        }
        match behaviour {
            RestartBehaviour::Policy => state.emit(container_id, &["kill", "die", "start"]),
            RestartBehaviour::Never => {
                container.running = false;
                state.emit(container_id, &["kill", "die"]);
            }
            RestartBehaviour::StartOnly => state.emit(container_id, &["start"]),
        }
        Ok(())
    }

    async fn restart(&self, container_id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("restart".to_string());
        state.container(container_id)?.running = true;
        state.emit(container_id, &["kill", "die", "stop", "start", "restart"]);
        Ok(())
    }

    async fn events(&self, container_id: &str) -> Result<EventStream, Error> {
        let (sender, receiver) = mpsc::unbounded();
        self.state
            .lock()
            .unwrap()
            .subscribers
            .push((container_id.to_string(), sender));
        Ok(receiver.boxed())
    }
}

/// Content of the single file held by an archive returned from `get_archive`.
pub fn archived_file(archive: &[u8]) -> Result<Vec<u8>, Error> {
    let mut archive = tar::Archive::new(archive);
    let mut entry = archive
        .entries()?
        .next()
        .ok_or_else(|| anyhow!("Empty archive"))??;
    let mut content = vec![];
    entry.read_to_end(&mut content)?;
    Ok(content)
}
