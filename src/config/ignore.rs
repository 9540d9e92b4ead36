// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Ignore pattern rules.
//!
//! Unisync keeps a single ignore file shared by every named command. Each
//! line of that file is one rule made of a kind and a pattern:
//!
//! ```text
//! # comments and blank lines are skipped
//! Name *.log
//! Path build/cache
//! Regex .*\.bak
//! ```
//!
//! Rules are a union of exclusions. Order is kept only so that generated
//! profiles are deterministic.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Rules used when no ignore file exists.
pub const DEFAULT_RULES: &[(IgnoreKind, &str)] = &[
    (IgnoreKind::Name, ".DS_Store"),
    (IgnoreKind::Name, "Thumbs.db"),
    (IgnoreKind::Name, "node_modules"),
    (IgnoreKind::Name, "__pycache__"),
    (IgnoreKind::Name, "*.pyc"),
    (IgnoreKind::Name, ".cache"),
];

/// How unison should interpret an ignore pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreKind {
    /// Match the last component of a path.
    Name,

    /// Match a whole path relative to the root.
    Path,

    /// Match a whole path with a regular expression.
    Regex,
}

impl IgnoreKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Path => "Path",
            Self::Regex => "Regex",
        }
    }
}

impl Display for IgnoreKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Single ignore rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRule {
    pub kind: IgnoreKind,
    pub pattern: String,
}

impl IgnoreRule {
    /// Construct new ignore rule.
    pub fn new(kind: IgnoreKind, pattern: impl Into<String>) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
        }
    }
}

impl Display for IgnoreRule {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{} {}", self.kind, self.pattern)
    }
}

/// Ordered set of ignore rules.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IgnoreRuleSet {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRuleSet {
    /// Built-in rule set used when the ignore file is absent.
    pub fn builtin() -> Self {
        Self {
            rules: DEFAULT_RULES
                .iter()
                .map(|(kind, pattern)| IgnoreRule::new(*kind, *pattern))
                .collect(),
        }
    }

    /// Load rule set from ignore file.
    ///
    /// Falls back to [`IgnoreRuleSet::builtin`] if the file does not exist.
    ///
    /// # Errors
    ///
    /// - Return [`IgnoreError::Read`] if the file exists but cannot be read.
    /// - Return [`IgnoreError::InvalidRules`] if any line is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(content) => {
                debug!("load ignore rules from {}", path.display());
                content.parse()
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!("no ignore file at {}, using built-in rules", path.display());
                Ok(Self::builtin())
            }
            Err(source) => Err(IgnoreError::Read {
                source,
                path: path.to_path_buf(),
            }),
        }
    }

    /// Iterate over rules in order.
    pub fn iter(&self) -> impl Iterator<Item = &IgnoreRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromStr for IgnoreRuleSet {
    type Err = IgnoreError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let mut rules = Vec::new();
        let mut invalid = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (kind, pattern) = match line.split_once(char::is_whitespace) {
                Some((kind, pattern)) => (kind, pattern.trim()),
                None => (line, ""),
            };

            let kind = match kind {
                "Name" => IgnoreKind::Name,
                "Path" => IgnoreKind::Path,
                "Regex" => IgnoreKind::Regex,
                _ => {
                    invalid.push(format!("line {}: unknown rule kind {kind:?}", index + 1));
                    continue;
                }
            };

            if pattern.is_empty() {
                invalid.push(format!("line {}: {kind} rule without a pattern", index + 1));
                continue;
            }

            rules.push(IgnoreRule::new(kind, pattern));
        }

        if !invalid.is_empty() {
            return Err(IgnoreError::InvalidRules { lines: invalid });
        }

        Ok(Self { rules })
    }
}

/// Default ignore file written by `config init`.
pub fn default_ignore_file() -> String {
    let mut out = String::from(
        "# Unisync ignore rules.\n\
         #\n\
         # One rule per line: `Name <pattern>`, `Path <pattern>`, or `Regex <pattern>`.\n\
         # Every rule is added to every generated unison profile.\n\n",
    );
    for (kind, pattern) in DEFAULT_RULES {
        out.push_str(&format!("{kind} {pattern}\n"));
    }

    out
}

/// Ignore rule error types.
#[derive(Debug, thiserror::Error)]
pub enum IgnoreError {
    /// Ignore file exists but cannot be read.
    #[error("failed to read ignore file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// One or more lines of the ignore file are malformed.
    #[error("invalid ignore rules:\n  - {}", lines.join("\n  - "))]
    InvalidRules { lines: Vec<String> },
}

/// Friendly result alias :3
pub type Result<T, E = IgnoreError> = std::result::Result<T, E>;
