// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `sink` module provides the contract between the decoder and the archive writer.

use crate::errors::Result;
use crate::event::DecodedEvent;

/// An `EventSink` consumes fully decoded events in DAQ arrival order.
///
/// The archive writer implements this trait outside the decoder core. Digit emission order
/// within an event is unspecified; a sink that needs a particular ordering sorts by sensor id.
pub trait EventSink {
    /// Persist one decoded event.
    fn write(&mut self, event: &DecodedEvent) -> Result<()>;
}
