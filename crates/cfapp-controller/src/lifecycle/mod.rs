// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application lifecycle orchestration.

mod apply;
mod controller;
mod poll;
mod status;

pub use apply::{ApplyReport, apply_bindings, apply_mappings};
pub use controller::AppController;
pub use poll::{Backoff, StartState, classify, wait_until_started};
pub use status::{LifecycleStatus, ReconcileOutcome};
