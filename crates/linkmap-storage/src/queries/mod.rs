// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per entity family.

pub mod device_auth;
pub mod links;
pub mod probe_devices;
pub mod probe_events;
pub mod relations;
pub mod tasks;
pub mod users;
