// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! worker-adapters: the two pluggable execution back-ends (§4.4, §4.5),
//! image resolution (§4.2), and the cluster placement watcher (§4.3).

pub mod image;
pub mod placement;
pub mod runtime;

pub use image::{CloudRegistryAuth, ImageResolver, RegistryToken};
pub use placement::PlacementWatcher;
pub use runtime::cluster::{ClusterConfig, ClusterSupervisor};
pub use runtime::local::LocalSupervisor;
pub use runtime::{LaunchOutcome, Supervisor, ENV_DENY_LIST, MOUNT_PATH};
