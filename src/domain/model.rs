use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{
    error::SyncError,
    path::{join, normalize_relative},
    pattern::SourcePattern,
};

/// One batch of host changes, as paths relative to the build context.
///
/// The three sets are disjoint. Paths are normalized on construction so
/// `./src/a.js` and `src/a.js` name the same file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFileUpdates")]
pub struct FileUpdates {
    added: BTreeSet<String>,
    updated: BTreeSet<String>,
    deleted: BTreeSet<String>,
}

impl FileUpdates {
    pub fn new<I, S>(added: I, updated: I, deleted: I) -> Result<FileUpdates, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalize = |paths: I| -> Result<BTreeSet<String>, SyncError> {
            paths
                .into_iter()
                .map(|path| {
                    normalize_relative(path.as_ref())
                        .ok_or_else(|| SyncError::OutsideContext(path.as_ref().to_string()))
                })
                .filter(|path| !matches!(path, Ok(path) if path.is_empty()))
                .collect()
        };
        let updates = FileUpdates {
            added: normalize(added)?,
            updated: normalize(updated)?,
            deleted: normalize(deleted)?,
        };
        if let Some(overlap) = updates
            .added
            .intersection(&updates.updated)
            .chain(updates.added.intersection(&updates.deleted))
            .chain(updates.updated.intersection(&updates.deleted))
            .next()
        {
            return Err(SyncError::OverlappingUpdates(overlap.clone()));
        }
        Ok(updates)
    }

    pub fn builder() -> FileUpdatesBuilder {
        FileUpdatesBuilder::default()
    }

    pub fn added(&self) -> &BTreeSet<String> {
        &self.added
    }

    pub fn updated(&self) -> &BTreeSet<String> {
        &self.updated
    }

    pub fn deleted(&self) -> &BTreeSet<String> {
        &self.deleted
    }

    /// Added and updated paths in lexical order.
    pub fn changed(&self) -> impl Iterator<Item = &String> {
        itertools::merge(self.added.iter(), self.updated.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.deleted.len()
    }
}

/// Unvalidated wire form of [`FileUpdates`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawFileUpdates {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

impl TryFrom<RawFileUpdates> for FileUpdates {
    type Error = SyncError;

    fn try_from(raw: RawFileUpdates) -> Result<Self, Self::Error> {
        FileUpdates::new(raw.added, raw.updated, raw.deleted)
    }
}

#[derive(Default)]
pub struct FileUpdatesBuilder {
    added: Vec<String>,
    updated: Vec<String>,
    deleted: Vec<String>,
}

impl FileUpdatesBuilder {
    pub fn added(mut self, path: impl Into<String>) -> Self {
        self.added.push(path.into());
        self
    }

    pub fn updated(mut self, path: impl Into<String>) -> Self {
        self.updated.push(path.into());
        self
    }

    pub fn deleted(mut self, path: impl Into<String>) -> Self {
        self.deleted.push(path.into());
        self
    }

    pub fn build(self) -> Result<FileUpdates, SyncError> {
        FileUpdates::new(self.added, self.updated, self.deleted)
    }
}

/// Source patterns of one `COPY`/`ADD` instruction and where they land.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedCopyRule {
    pub sources: Vec<SourcePattern>,
    /// Absolute directory receiving the copied files.
    pub destination_dir: String,
    /// Set when the instruction copies a single file to an explicit file name.
    /// A destination without a trailing `/` is always taken as that name, even
    /// when the image has a directory there (`COPY a.txt /tmp`).
    pub rename: Option<String>,
}

impl ResolvedCopyRule {
    /// Name of `host_path` relative to [`destination_dir`](Self::destination_dir),
    /// or `None` if this rule does not copy it.
    pub fn container_name(&self, host_path: &str) -> Option<String> {
        self.sources
            .iter()
            .find_map(|source| source.relative_name(host_path))
            .map(|name| self.rename.clone().unwrap_or(name))
    }

    pub fn container_path(&self, host_path: &str) -> Option<String> {
        self.container_name(host_path)
            .map(|name| join(&self.destination_dir, &name))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Copy(CopyAction),
    Delete(DeleteAction),
}

/// Files sent to one container directory in a single archive.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CopyAction {
    pub destination_dir: String,
    pub files: Vec<CopyFile>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CopyFile {
    pub host_path: String,
    pub container_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeleteAction {
    pub container_paths: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerState {
    pub running: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub status: EventStatus,
}

/// Container lifecycle status as reported by the runtime event stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventStatus {
    Kill,
    Die,
    Stop,
    Start,
    Restart,
    Other(String),
}

impl EventStatus {
    pub fn is_stop(&self) -> bool {
        matches!(self, EventStatus::Kill | EventStatus::Die | EventStatus::Stop)
    }
}

impl From<&str> for EventStatus {
    fn from(status: &str) -> Self {
        match status {
            "kill" => EventStatus::Kill,
            "die" => EventStatus::Die,
            "stop" => EventStatus::Stop,
            "start" => EventStatus::Start,
            "restart" => EventStatus::Restart,
            other => EventStatus::Other(other.to_string()),
        }
    }
}
