// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `event` module provides the decoded per-event data model.

/// The two sensor families served by the front-end electronics. Each has its own database
/// identifier space and Huffman code table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SensorKind {
    /// Photomultiplier tube.
    Pmt,
    /// Silicon photomultiplier.
    Sipm,
}

/// A `Digit` is one sensor's digitized waveform for one event.
#[derive(Clone, Debug)]
pub struct Digit {
    /// The electronics identifier of the channel that produced the waveform.
    pub elec_id: i32,
    /// Whether the channel was present in the payload. Inactive digits carry zero-filled
    /// waveforms emitted in the non-discarding error path.
    pub active: bool,
    /// The signed samples, one per buffer slot. Once emitted, the length equals the buffer
    /// sample count agreed for the event.
    pub samples: Vec<i16>,
    /// The per-slice channel-mask words observed while reconstructing a zero-suppressed
    /// payload. Empty for non-suppressed payloads.
    pub chmask: Vec<u16>,
}

impl Digit {
    /// Instantiate a new active `Digit` with a zero-filled waveform of `n_samples` samples.
    pub fn new(elec_id: i32, n_samples: usize) -> Self {
        Digit { elec_id, active: true, samples: vec![0; n_samples], chmask: Vec::new() }
    }

    /// Instantiate an inactive, zero-filled `Digit`.
    pub fn inactive(elec_id: i32, n_samples: usize) -> Self {
        Digit { elec_id, active: false, samples: vec![0; n_samples], chmask: Vec::new() }
    }

    /// The number of samples in the waveform.
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }
}

/// An ordered sequence of `Digit`s of one kind. Duplicate electronics ids may be present while
/// an event is being decoded; assembly merges repeat entries.
pub type DigitCollection = Vec<Digit>;

/// Per-event metadata extracted from the DAQ framing.
#[derive(Clone, Debug, Default)]
pub struct EventHeader {
    /// The run number the event belongs to.
    pub run_number: u32,
    /// The event number within the run.
    pub event_number: u32,
    /// Event timestamp in microseconds since the epoch.
    pub timestamp: u64,
    /// The trigger type reported by the trigger equipment, -1 when absent.
    pub trigger_type: i32,
    /// One bit per equipment block that reported a front-end error.
    pub error_bits: u32,
}

/// The fully decoded event handed to the sink.
#[derive(Clone, Default)]
pub struct DecodedEvent {
    pub header: EventHeader,
    /// Raw PMT waveforms.
    pub pmts: DigitCollection,
    /// Baseline-restored mirrors of the PMT waveforms.
    pub blrs: DigitCollection,
    /// The external-trigger PMT waveform, when one is configured.
    pub ext_pmts: DigitCollection,
    /// SiPM waveforms.
    pub sipms: DigitCollection,
    /// Trigger configuration entries reported by the trigger equipment.
    pub trigger_info: Vec<(String, i32)>,
    /// The trigger channels that fired.
    pub fired_channels: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::Digit;

    #[test]
    fn verify_digit_new() {
        let digit = Digit::new(314, 8);

        assert_eq!(digit.elec_id, 314);
        assert!(digit.active);
        assert_eq!(digit.n_samples(), 8);
        assert!(digit.samples.iter().all(|&s| s == 0));

        assert!(!Digit::inactive(0, 1).active);
    }
}
