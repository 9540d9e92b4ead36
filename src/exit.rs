// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Exit status classification.
//!
//! Unisync promises four exit codes:
//!
//! | Code | Meaning             |
//! |------|---------------------|
//! | 0    | Success             |
//! | 1    | General error       |
//! | 2    | Configuration error |
//! | 3    | Network error       |
//!
//! Errors reach the binary as [`anyhow::Error`]. Their class is decided by
//! walking the source chain and downcasting to the error types that carry a
//! configuration or network meaning.

use crate::{
    bootstrap::BootstrapError,
    config::{ignore::IgnoreError, ConfigError},
    host::HostError,
    store::StoreError,
};

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Observable exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    General,
    Config,
    Network,
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::General => 1,
            Self::Config => 2,
            Self::Network => 3,
        }
    }
}

impl Display for ExitStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Success => "success",
            Self::General => "general error",
            Self::Config => "configuration error",
            Self::Network => "network error",
        };
        write!(fmt, "{name} ({})", self.code())
    }
}

/// Classify error into exit status.
///
/// The first error in the chain with a known class wins.
pub fn classify(error: &anyhow::Error) -> ExitStatus {
    error
        .chain()
        .find_map(classify_one)
        .unwrap_or(ExitStatus::General)
}

fn classify_one(error: &(dyn std::error::Error + 'static)) -> Option<ExitStatus> {
    if let Some(error) = error.downcast_ref::<StoreError>() {
        return match error {
            StoreError::ConfigNotFound { .. }
            | StoreError::CommandNotFound { .. }
            | StoreError::Config { .. } => Some(ExitStatus::Config),
            _ => None,
        };
    }

    if error.downcast_ref::<ConfigError>().is_some() {
        return Some(ExitStatus::Config);
    }

    if let Some(IgnoreError::InvalidRules { .. }) = error.downcast_ref::<IgnoreError>() {
        return Some(ExitStatus::Config);
    }

    if error.downcast_ref::<HostError>().is_some() {
        return Some(ExitStatus::Network);
    }

    if let Some(BootstrapError::Host(_)) = error.downcast_ref::<BootstrapError>() {
        return Some(ExitStatus::Network);
    }

    None
}
