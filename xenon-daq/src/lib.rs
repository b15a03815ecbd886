// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The raw-event decoding application: configuration, the per-file orchestration loop, sinks,
//! and the file-backed stand-ins for the run-database tables.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod config;
pub mod pipeline;
pub mod sink;
pub mod tables;
