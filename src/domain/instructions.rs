use std::{borrow::Cow, path::Path};

use dockerfile_parser::{CopyInstruction, Dockerfile, Instruction, MiscInstruction};
use log::{debug, warn};

use super::{
    error::SyncError,
    model::ResolvedCopyRule,
    path::{basename, parent, resolve},
    pattern::SourcePattern,
};

/// Parses `dockerfile` into the copy rules of its final build stage, resolving
/// every destination against the `WORKDIR` in effect at that instruction.
pub fn parse(dockerfile: &str, context_root: &Path) -> Result<Vec<ResolvedCopyRule>, SyncError> {
    let dockerfile =
        Dockerfile::parse(&json_copies_as_add(dockerfile)).map_err(|e| SyncError::Parse(e.to_string()))?;

    let final_stage = dockerfile
        .instructions
        .iter()
        .try_fold(None, |stage: Option<StageFold>, instruction| match (stage, instruction) {
            (_, Instruction::From(_)) => Ok(Some(StageFold::default())),
            (None, _) => Ok(None),
            (Some(stage), instruction) => stage.apply(instruction, context_root).map(Some),
        })?
        .ok_or_else(|| SyncError::Parse("Dockerfile contains no build stage".to_string()))?;

    if final_stage.rules.is_empty() {
        return Err(SyncError::Parse(
            "Final build stage has no COPY or ADD instruction reading from the build context".to_string(),
        ));
    }
    Ok(final_stage.rules)
}

/// Container directories that a destination without a trailing `/` almost
/// always means as a directory.
const WELL_KNOWN_DIRECTORIES: &[&str] = &[
    "/app", "/etc", "/home", "/opt", "/root", "/srv", "/tmp", "/usr", "/usr/local", "/usr/src", "/usr/src/app",
    "/var", "/var/www", "/var/www/html",
];

/// `dockerfile-parser` cannot unescape the JSON form of `COPY`, while `ADD`
/// goes through its generic instruction path. Both share one operand syntax,
/// so JSON-form `COPY` lines are handed over under the `ADD` keyword.
fn json_copies_as_add(dockerfile: &str) -> String {
    dockerfile
        .split_inclusive('\n')
        .map(|line| {
            let instruction = line.trim_start();
            let indent = &line[..line.len() - instruction.len()];
            match instruction.get(..4) {
                Some(keyword) if keyword.eq_ignore_ascii_case("copy") && is_json_form(&instruction[4..]) => {
                    Cow::Owned(format!("{}ADD{}", indent, &instruction[4..]))
                }
                _ => Cow::Borrowed(line),
            }
        })
        .collect()
}

fn is_json_form(arguments: &str) -> bool {
    arguments.starts_with(char::is_whitespace) && split_flags(arguments).1.starts_with('[')
}

/// Splits leading `--name=value` flags from the operands.
fn split_flags(arguments: &str) -> (Vec<&str>, &str) {
    let mut flags = vec![];
    let mut rest = arguments.trim();
    while let Some(flag) = rest.strip_prefix("--") {
        let (flag, tail) = flag.split_once(char::is_whitespace).unwrap_or((flag, ""));
        flags.push(flag);
        rest = tail.trim_start();
    }
    (flags, rest)
}

/// Accumulator threaded through the instructions of one stage.
struct StageFold {
    workdir: String,
    rules: Vec<ResolvedCopyRule>,
}

impl Default for StageFold {
    fn default() -> Self {
        Self {
            workdir: "/".to_string(),
            rules: vec![],
        }
    }
}

impl StageFold {
    fn apply(mut self, instruction: &Instruction, context_root: &Path) -> Result<StageFold, SyncError> {
        match instruction {
            Instruction::Copy(copy) => {
                if let Some(rule) = self.copy_rule(copy, context_root)? {
                    self.rules.push(rule);
                }
            }
            Instruction::Misc(misc) if misc.instruction.content.eq_ignore_ascii_case("workdir") => {
                let arguments = misc.arguments.to_string();
                self.workdir = resolve(&self.workdir, unquote(arguments.trim()));
                debug!("WORKDIR is now {}", self.workdir);
            }
            Instruction::Misc(misc) if misc.instruction.content.eq_ignore_ascii_case("add") => {
                if let Some(rule) = self.add_rule(misc, context_root)? {
                    self.rules.push(rule);
                }
            }
            _ => {}
        }
        Ok(self)
    }

    fn copy_rule(&self, copy: &CopyInstruction, context_root: &Path) -> Result<Option<ResolvedCopyRule>, SyncError> {
        if let Some(stage) = copy.flags.iter().find(|flag| flag.name.content == "from") {
            debug!("Skipping COPY --from={}, it does not read the build context", stage.value.content);
            return Ok(None);
        }
        let sources: Vec<String> = copy.sources.iter().map(|source| source.content.clone()).collect();
        self.rule(&sources, &copy.destination.content, context_root).map(Some)
    }

    /// `ADD` in either form, and `COPY` in JSON form.
    fn add_rule(&self, add: &MiscInstruction, context_root: &Path) -> Result<Option<ResolvedCopyRule>, SyncError> {
        let arguments = add.arguments.to_string();
        let (flags, operands) = split_flags(&arguments);
        if let Some(stage) = flags.iter().find_map(|flag| flag.strip_prefix("from=")) {
            debug!("Skipping copy from {}, it does not read the build context", stage);
            return Ok(None);
        }
        let mut operands: Vec<String> = if operands.starts_with('[') {
            serde_json::from_str(operands)
                .map_err(|e| SyncError::Parse(format!("Invalid instruction operands {}: {}", operands, e)))?
        } else {
            operands.split_whitespace().map(str::to_string).collect()
        };
        let destination = match operands.pop() {
            Some(destination) if !operands.is_empty() => destination,
            _ => {
                return Err(SyncError::Parse(format!(
                    "Copy needs a source and a destination: {}",
                    arguments.trim()
                )))
            }
        };
        let sources: Vec<String> = operands.into_iter().filter(|source| !source.contains("://")).collect();
        if sources.is_empty() {
            debug!("Skipping ADD of remote sources only");
            return Ok(None);
        }
        self.rule(&sources, &destination, context_root).map(Some)
    }

    fn rule(&self, sources: &[String], destination: &str, context_root: &Path) -> Result<ResolvedCopyRule, SyncError> {
        let sources = sources
            .iter()
            .map(|source| SourcePattern::compile(unquote(source), context_root))
            .collect::<Result<Vec<_>, _>>()?;
        let destination = unquote(destination);
        let resolved = resolve(&self.workdir, destination);
        let names_directory = destination.ends_with('/') || matches!(basename(destination), "" | "." | "..");

        let rule = match sources.as_slice() {
            [single] if single.is_file() && !names_directory => {
                if WELL_KNOWN_DIRECTORIES.contains(&resolved.as_str()) {
                    warn!(
                        "COPY of {} to {} replaces that path with a file, add a trailing / to copy into the directory",
                        single, resolved
                    );
                }
                ResolvedCopyRule {
                    destination_dir: parent(&resolved),
                    rename: Some(basename(&resolved).to_string()),
                    sources,
                }
            }
            _ => ResolvedCopyRule {
                destination_dir: resolved,
                rename: None,
                sources,
            },
        };
        debug!(
            "Copy rule [{}] -> {}{}",
            rule.sources.iter().map(|source| source.to_string()).collect::<Vec<_>>().join(", "),
            rule.destination_dir,
            rule.rename.as_ref().map(|name| format!(" as {}", name)).unwrap_or_default()
        );
        Ok(rule)
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}
