use std::{fmt, path::Path};

use regex::Regex;
use serde::{Serialize, Serializer};

use super::{
    error::SyncError,
    path::{basename, normalize_relative},
};

/// One source operand of a `COPY`/`ADD` instruction, relative to the build context.
#[derive(Clone, Debug)]
pub enum SourcePattern {
    /// A single file, copied under its own name (or renamed by the rule).
    File(String),
    /// A directory whose whole tree is copied. The empty string is the context root.
    Directory(String),
    /// Shell-style wildcard. `*` and `?` never cross a `/`, so matches are
    /// limited to the directory level the pattern names.
    Glob { pattern: String, matcher: Regex },
}

impl SourcePattern {
    /// Classifies `source`, looking at the build context to tell literal files
    /// from directories.
    pub fn compile(source: &str, context_root: &Path) -> Result<SourcePattern, SyncError> {
        let normalized = normalize_relative(source)
            .ok_or_else(|| SyncError::Parse(format!("Source {} is outside the build context", source)))?;
        if normalized.contains(['*', '?', '[']) {
            let matcher = Regex::new(&glob_to_regex(&normalized))
                .map_err(|e| SyncError::Parse(format!("Invalid source pattern {}: {}", source, e)))?;
            return Ok(SourcePattern::Glob {
                pattern: normalized,
                matcher,
            });
        }
        if normalized.is_empty() || source.ends_with('/') || context_root.join(&normalized).is_dir() {
            Ok(SourcePattern::Directory(normalized))
        } else {
            Ok(SourcePattern::File(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SourcePattern::File(path) | SourcePattern::Directory(path) => path,
            SourcePattern::Glob { pattern, .. } => pattern,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, SourcePattern::File(_))
    }

    /// Name of `host_path` relative to the rule destination when this pattern
    /// covers it, `None` otherwise. `host_path` must be normalized.
    pub fn relative_name(&self, host_path: &str) -> Option<String> {
        match self {
            SourcePattern::File(path) => (path == host_path).then(|| basename(host_path).to_string()),
            SourcePattern::Directory(dir) if dir.is_empty() => Some(host_path.to_string()),
            SourcePattern::Directory(dir) => host_path
                .strip_prefix(dir.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .filter(|rest| !rest.is_empty())
                .map(str::to_string),
            SourcePattern::Glob { matcher, .. } => matcher
                .is_match(host_path)
                .then(|| basename(host_path).to_string()),
        }
    }
}

impl PartialEq for SourcePattern {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other) && self.as_str() == other.as_str()
    }
}

impl Eq for SourcePattern {}

impl fmt::Display for SourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourcePattern::Directory(dir) if dir.is_empty() => write!(f, "."),
            SourcePattern::Directory(dir) => write!(f, "{}/", dir),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl Serialize for SourcePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                if let Some(&negation) = chars.peek() {
                    if negation == '!' || negation == '^' {
                        chars.next();
                        class.push('^');
                    }
                }
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    if inner == '\\' || inner == '[' {
                        class.push('\\');
                    }
                    class.push(inner);
                }
                if closed && !class.is_empty() && class != "^" {
                    regex.push('[');
                    regex.push_str(&class);
                    regex.push(']');
                } else {
                    regex.push_str(&regex::escape(&format!("[{}", class)));
                }
            }
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    regex
}
