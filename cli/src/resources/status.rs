//! # Resource Status
//!
//! File: cli/src/resources/status.rs
//!
//! Every resource starts in `PendingCreation`. A successful create moves it to
//! `Applied`, a failed one to `Failed`; both are terminal. Destroying a resource
//! removes it from the graph instead of adding another state.
//!
use crate::core::error::{DevyardError, Result};
use anyhow::anyhow;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    #[default]
    PendingCreation,
    Applied,
    Failed,
}

impl Status {
    /// Validates a move from `self` to `to`, returning the new status.
    ///
    /// # Errors
    ///
    /// `DevyardError::InvalidTransition` for anything other than
    /// `PendingCreation -> Applied` or `PendingCreation -> Failed`.
    pub fn transition(self, to: Status) -> Result<Status> {
        match (self, to) {
            (Status::PendingCreation, Status::Applied)
            | (Status::PendingCreation, Status::Failed) => Ok(to),
            (from, to) => Err(anyhow!(DevyardError::InvalidTransition { from, to })),
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Status::PendingCreation
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::PendingCreation => "PendingCreation",
            Status::Applied => "Applied",
            Status::Failed => "Failed",
        };
        f.write_str(label)
    }
}
