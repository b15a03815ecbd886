// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SiPM payload decoders.
//!
//! A front-end board (FEB) serves 64 SiPMs through a pair of cards: the even card of the pair
//! carries the even output channels, the odd card the odd ones. Each card stream is decoded on
//! its own; the board waveform is assembled once both cards of the pair have reported.

use xenon_core::errors::{event_error, unsupported_error, Result};
use xenon_core::event::{Digit, DigitCollection};
use xenon_core::huffman::HuffmanTree;
use xenon_core::io::{BitReader, WordReader};

use crate::card::CardHeader;
use crate::{Firmware, SIPMS_PER_FEB, SIPMS_PER_FEC};

/// The decoded half of a front-end board: 32 channels in slice-major order.
pub struct SipmHalf {
    /// Samples, `SIPMS_PER_FEC` per slice.
    pub data: Vec<i16>,
    /// Which of the half's channels appeared in at least one slice mask.
    pub seen: [bool; SIPMS_PER_FEC],
    /// The number of slices decoded.
    pub n_slices: usize,
}

/// The front-end board served by a SiPM card.
pub fn feb_of_fec(fec_id: usize) -> usize {
    fec_id / 2
}

/// Whether the card carries the even (stream A) or odd (stream B) output channels of its board.
pub fn fec_side(fec_id: usize) -> usize {
    fec_id % 2
}

/// The electronics id of one SiPM channel.
pub fn sipm_elec_id(feb: usize, channel: usize) -> i32 {
    (feb * 1000 + channel) as i32
}

/// The detector-wide position of a SiPM electronics id, used to index the per-event position
/// table.
pub fn sipm_position(elec_id: i32) -> Option<usize> {
    let feb = (elec_id / 1000) as usize;
    let channel = (elec_id % 1000) as usize;

    if elec_id >= 0 && feb < crate::NUMBER_OF_FEBS && channel < SIPMS_PER_FEB {
        Some(feb * SIPMS_PER_FEB + channel)
    }
    else {
        None
    }
}

/// Decode one SiPM card payload into its half of the board.
///
/// `last_values` is the event-scoped running value of each of the board's 64 channels; it must
/// be zeroed at event start and persists across slices so that suppressed slices repeat the
/// previous emitted sample.
pub fn decode_sipm_stream(
    card: &CardHeader,
    words: &mut WordReader<'_>,
    huffman: Option<&HuffmanTree>,
    last_values: &mut [i32],
) -> Result<SipmHalf> {
    debug_assert_eq!(last_values.len(), SIPMS_PER_FEB);

    if card.n_channels != SIPMS_PER_FEC {
        return event_error("sipm: card channel count is not half a board");
    }

    if card.compressed {
        if card.fw == Firmware::Hotel {
            return event_error("sipm: hotel firmware does not compress");
        }

        match huffman {
            Some(tree) => decode_compressed(card, words, tree, last_values),
            None => unsupported_error("sipm: no huffman table supplied for this run"),
        }
    }
    else {
        decode_hotel(card, words)
    }
}

/// Hotel layout: `buffer_samples` fixed slices of 32 raw samples.
fn decode_hotel(card: &CardHeader, words: &mut WordReader<'_>) -> Result<SipmHalf> {
    let n_samples = card.buffer_samples * SIPMS_PER_FEC;

    let data = words.take(n_samples)?.iter().map(|&w| w as i16).collect();

    Ok(SipmHalf { data, seen: [true; SIPMS_PER_FEC], n_slices: card.buffer_samples })
}

/// India layout: a bit stream of slices, each a 64-bit board channel mask followed by Huffman
/// deltas for the active channels belonging to this card's half.
fn decode_compressed(
    card: &CardHeader,
    words: &mut WordReader<'_>,
    tree: &HuffmanTree,
    last_values: &mut [i32],
) -> Result<SipmHalf> {
    let side = fec_side(usize::from(card.fec_id));

    let mut data = Vec::with_capacity(card.buffer_samples * SIPMS_PER_FEC);
    let mut seen = [false; SIPMS_PER_FEC];

    let mut bits = BitReader::new(words.take_remaining());

    for _ in 0..card.buffer_samples {
        let mask = sipm_channel_mask(&mut bits)?;

        for k in 0..SIPMS_PER_FEC {
            let channel = 2 * k + side;

            if mask >> channel & 1 == 1 {
                last_values[channel] += tree.decode(&mut bits)?;
                seen[k] = true;
            }

            data.push(last_values[channel] as i16);
        }
    }

    Ok(SipmHalf { data, seen, n_slices: card.buffer_samples })
}

/// Read one 64-bit board channel mask, transmitted as two 32-bit words, high half first.
pub fn sipm_channel_mask(bits: &mut BitReader<'_>) -> Result<u64> {
    let high = bits.read_bits(32)?;
    let low = bits.read_bits(32)?;

    Ok((u64::from(high) << 32) | u64::from(low))
}

/// Interleave the two card streams of a board: output channel `2k` of every slice comes from
/// stream A's channel `k`, channel `2k + 1` from stream B's channel `k`.
pub fn build_sipm_data(n_slices: usize, a: &[i16], b: &[i16]) -> Vec<i16> {
    debug_assert_eq!(a.len(), n_slices * SIPMS_PER_FEC);
    debug_assert_eq!(b.len(), n_slices * SIPMS_PER_FEC);

    let mut out = Vec::with_capacity(n_slices * SIPMS_PER_FEB);

    for t in 0..n_slices {
        let slice_a = &a[t * SIPMS_PER_FEC..(t + 1) * SIPMS_PER_FEC];
        let slice_b = &b[t * SIPMS_PER_FEC..(t + 1) * SIPMS_PER_FEC];

        for k in 0..SIPMS_PER_FEC {
            out.push(slice_a[k]);
            out.push(slice_b[k]);
        }
    }

    out
}

/// Assemble the 64 digits of one board from its two decoded halves.
pub fn assemble_feb(feb: usize, a: &SipmHalf, b: &SipmHalf) -> Result<DigitCollection> {
    if a.n_slices != b.n_slices {
        return event_error("sipm: board card pair disagrees on the buffer length");
    }

    let n_slices = a.n_slices;
    let data = build_sipm_data(n_slices, &a.data, &b.data);

    let mut digits = DigitCollection::with_capacity(SIPMS_PER_FEB);

    for channel in 0..SIPMS_PER_FEB {
        let samples = (0..n_slices).map(|t| data[t * SIPMS_PER_FEB + channel]).collect();

        let seen =
            if channel % 2 == 0 { a.seen[channel / 2] } else { b.seen[channel / 2] };

        digits.push(Digit {
            elec_id: sipm_elec_id(feb, channel),
            active: seen,
            samples,
            chmask: Vec::new(),
        });
    }

    Ok(digits)
}
