use itertools::Itertools;

use super::model::{Action, CopyAction, CopyFile, DeleteAction, FileUpdates, ResolvedCopyRule};

/// Computes the actions reproducing `updates` inside the container.
///
/// Each rule yields at most one copy action, holding every changed file it
/// matches, and at most one delete action. Actions follow rule order and
/// identical actions coming from different rules are kept once. Paths no rule
/// matches are ignored.
pub fn actions_needed(rules: &[ResolvedCopyRule], updates: &FileUpdates) -> Vec<Action> {
    rules
        .iter()
        .flat_map(|rule| {
            let files: Vec<CopyFile> = updates
                .changed()
                .filter_map(|host_path| {
                    rule.container_name(host_path).map(|container_name| CopyFile {
                        host_path: host_path.clone(),
                        container_name,
                    })
                })
                .collect();
            let container_paths: Vec<String> = updates
                .deleted()
                .iter()
                .filter_map(|host_path| rule.container_path(host_path))
                .collect();

            let copy = (!files.is_empty()).then(|| {
                Action::Copy(CopyAction {
                    destination_dir: rule.destination_dir.clone(),
                    files,
                })
            });
            let delete = (!container_paths.is_empty()).then(|| Action::Delete(DeleteAction { container_paths }));
            copy.into_iter().chain(delete)
        })
        .unique()
        .collect()
}
