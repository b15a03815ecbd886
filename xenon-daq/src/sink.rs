// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sinks shipped with the application. The archive writer proper lives outside the decoder; the
//! sinks here exist for dry runs and tests.

use log::info;

use xenon_core::errors::Result;
use xenon_core::event::DecodedEvent;
use xenon_core::sink::EventSink;

/// A sink that logs a one-line digest of every event and otherwise discards it.
#[derive(Default)]
pub struct SummarySink {
    events: u32,
}

impl SummarySink {
    pub fn new() -> Self {
        Default::default()
    }

    /// The number of events written so far.
    pub fn events(&self) -> u32 {
        self.events
    }
}

impl EventSink for SummarySink {
    fn write(&mut self, event: &DecodedEvent) -> Result<()> {
        self.events += 1;

        info!(
            "wrote event {} of run {}: {} pmts, {} blrs, {} sipms, {} trigger entries",
            event.header.event_number,
            event.header.run_number,
            event.pmts.len(),
            event.blrs.len(),
            event.sipms.len(),
            event.trigger_info.len()
        );

        Ok(())
    }
}

/// A sink that keeps every event in memory.
#[derive(Default)]
pub struct CollectSink {
    pub events: Vec<DecodedEvent>,
}

impl CollectSink {
    pub fn new() -> Self {
        Default::default()
    }
}

impl EventSink for CollectSink {
    fn write(&mut self, event: &DecodedEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }
}
