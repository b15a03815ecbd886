// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time reconstruction against the circular electronics buffer.
//!
//! Each card records samples into a 65536-slot ring. When a trigger fires the card reports its
//! current ring index (`FT`) and a coarse counter (`FThm`); the event buffer covers the
//! `pre_trg_samples` slots before the trigger and runs for `buffer_samples` slots. Output sample
//! `i` of every waveform corresponds to electronics ring position `(first_ft + i) mod 65536`.

use crate::card::CardHeader;

/// The PMT sampling period in microseconds (40 MHz front-end clock).
pub const CLOCK_TICK_US: f64 = 0.025;

/// The number of slots in the circular electronics buffer.
pub const RING_SAMPLES: usize = 65536;

/// The ratio of the PMT sampling rate to the SiPM sampling rate (1 MHz).
pub const SIPM_DECIMATION: usize = 40;

/// Per-event time alignment constants derived from one card header.
#[derive(Copy, Clone, Debug)]
pub struct TimeContext {
    /// The ring position of output sample 0.
    pub first_ft: usize,
    /// The number of samples in the event buffer.
    pub buffer_samples: usize,
}

impl TimeContext {
    /// Derive the event time base from a card header: the buffer starts `pre_trg_samples`
    /// before the reported trigger position.
    pub fn from_card(card: &CardHeader) -> Self {
        let first_ft =
            (usize::from(card.ft) + RING_SAMPLES - card.pre_trg_samples) % RING_SAMPLES;

        TimeContext { first_ft, buffer_samples: card.buffer_samples }
    }

    /// Map an absolute ring position to an output sample index, or `None` when the position
    /// falls outside the event buffer. Positions past a ring wrap remain contiguous in the
    /// output.
    pub fn sample_index(&self, ring_pos: usize) -> Option<usize> {
        let index = (ring_pos + RING_SAMPLES - self.first_ft) % RING_SAMPLES;

        if index < self.buffer_samples {
            Some(index)
        }
        else {
            None
        }
    }
}

/// Convert a slice time in microseconds to a ring sample position.
pub fn mus_to_sample(time_mus: f64) -> usize {
    ((time_mus / CLOCK_TICK_US).round() as usize) % RING_SAMPLES
}

/// Convert a PMT ring sample index to a SiPM slice index.
pub fn sipm_index(pmt_sample: usize) -> usize {
    pmt_sample / SIPM_DECIMATION
}

/// The SiPM time base of an event: the SiPM slice holding the first buffered sample.
pub fn compute_sipm_time(card: &CardHeader) -> usize {
    sipm_index(TimeContext::from_card(card).first_ft)
}

/// Predict the card's (FT, FThm) counters for the next trigger, for cross-checking counter
/// continuity between consecutive events.
pub fn compute_next_ft(card: &CardHeader) -> (u16, u16) {
    let advanced = usize::from(card.ft) + card.buffer_samples;

    let next_ft = (advanced % RING_SAMPLES) as u16;
    let next_ft_hm = card.ft_hm.wrapping_add((advanced / RING_SAMPLES) as u16);

    (next_ft, next_ft_hm)
}
