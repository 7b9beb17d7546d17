// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connector command kinds.

use serde::{Deserialize, Serialize};

/// One of the five connector operations the worker can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    Discover,
    Spec,
    Check,
    Sync,
    ClearDestination,
}

impl Command {
    /// `sync` and `clear-destination` are long-running, adoption-capable,
    /// placement-aware.
    pub fn is_async(self) -> bool {
        matches!(self, Command::Sync | Command::ClearDestination)
    }

    /// `discover`, `check`, `spec` are short and ephemeral.
    pub fn is_simple(self) -> bool {
        !self.is_async()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Discover => "discover",
            Command::Spec => "spec",
            Command::Check => "check",
            Command::Sync => "sync",
            Command::ClearDestination => "clear-destination",
        }
    }
}

crate::simple_display! {
    Command {
        Discover => "discover",
        Spec => "spec",
        Check => "check",
        Sync => "sync",
        ClearDestination => "clear-destination",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_and_clear_destination_are_async() {
        assert!(Command::Sync.is_async());
        assert!(Command::ClearDestination.is_async());
        assert!(!Command::Discover.is_async());
        assert!(!Command::Check.is_async());
        assert!(!Command::Spec.is_async());
    }

    #[test]
    fn async_and_simple_are_exclusive() {
        for c in [Command::Discover, Command::Spec, Command::Check, Command::Sync, Command::ClearDestination] {
            assert_ne!(c.is_async(), c.is_simple());
        }
    }
}
