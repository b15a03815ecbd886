// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PMT payload decoders.
//!
//! Three layouts exist in the wild, selected by the card header: plain Hotel slices, zero-
//! suppressed slices with explicit slice times, and the India/Juliett Huffman-compressed form
//! where each channel is one absolute sample followed by a delta stream.

use std::collections::HashMap;

use lazy_static::lazy_static;
use log::warn;

use xenon_core::errors::{event_error, unsupported_error, Result};
use xenon_core::event::{Digit, DigitCollection};
use xenon_core::huffman::HuffmanTree;
use xenon_core::io::{BitReader, WordReader};

use crate::card::CardHeader;
use crate::time::{mus_to_sample, TimeContext};
use crate::{Firmware, NPMTS};

/// Relation between real channels and their baseline-restored mirrors for Hotel firmware:
/// entry `i` is the partner of channel `i` within a group of four 8-channel cards.
pub static CHANNELS_RELATION: [i32; 32] = [
    2, 3, 0, 1, 6, 7, 4, 5, 10, 11, 8, 9, 14, 15, 12, 13, 18, 19, 16, 17, 22, 23, 20, 21, 26, 27,
    24, 25, 30, 31, 28, 29,
];

/// Real/mirror channel relation for India firmware onwards: entry `i` is the partner of channel
/// `i` within a group of four 12-channel cards. Mirrors live on the neighbouring card.
pub static CHANNELS_RELATION_INDIA: [i32; 48] = [
    12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 36, 37,
    38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35,
];

/// Absolute PMT electronics ids for Juliett firmware, indexed by `12 * fec + channel` over the
/// fourteen PMT cards.
#[rustfmt::skip]
pub static CHANNELS_RELATION_JULIETT: [i32; NPMTS] = [
    112, 113, 114, 115, 116, 117, 118, 119, 120, 121, 122, 123,
    100, 101, 102, 103, 104, 105, 106, 107, 108, 109, 110, 111,
    212, 213, 214, 215, 216, 217, 218, 219, 220, 221, 222, 223,
    200, 201, 202, 203, 204, 205, 206, 207, 208, 209, 210, 211,
    312, 313, 314, 315, 316, 317, 318, 319, 320, 321, 322, 323,
    300, 301, 302, 303, 304, 305, 306, 307, 308, 309, 310, 311,
    412, 413, 414, 415, 416, 417, 418, 419, 420, 421, 422, 423,
    400, 401, 402, 403, 404, 405, 406, 407, 408, 409, 410, 411,
    512, 513, 514, 515, 516, 517, 518, 519, 520, 521, 522, 523,
    500, 501, 502, 503, 504, 505, 506, 507, 508, 509, 510, 511,
    612, 613, 614, 615, 616, 617, 618, 619, 620, 621, 622, 623,
    600, 601, 602, 603, 604, 605, 606, 607, 608, 609, 610, 611,
    712, 713, 714, 715, 716, 717, 718, 719, 720, 721, 722, 723,
    700, 701, 702, 703, 704, 705, 706, 707, 708, 709, 710, 711,
];

lazy_static! {
    /// Inverse of the Juliett id table: electronics id to detector-wide channel position.
    static ref JULIETT_POSITION: HashMap<i32, usize> =
        CHANNELS_RELATION_JULIETT.iter().enumerate().map(|(i, &id)| (id, i)).collect();
}

/// The electronics id of one PMT channel, a closed-form function of the card id, physical
/// channel, and firmware generation.
pub fn pmt_elec_id(fec: usize, channel: usize, fw: Firmware) -> Result<i32> {
    if channel >= fw.pmts_per_fec() {
        return event_error("pmt: channel out of range for firmware");
    }

    match fw {
        Firmware::Hotel => Ok((8 * fec + channel) as i32),
        Firmware::India => Ok((12 * fec + channel) as i32),
        Firmware::Juliett => match CHANNELS_RELATION_JULIETT.get(12 * fec + channel) {
            Some(&id) => Ok(id),
            None => event_error("pmt: fec id out of range for firmware"),
        },
    }
}

/// The detector-wide position of a PMT electronics id, used to index the per-event position
/// table.
pub fn pmt_position(elec_id: i32, fw: Firmware) -> Option<usize> {
    match fw {
        Firmware::Juliett => JULIETT_POSITION.get(&elec_id).copied(),
        _ => {
            if elec_id >= 0 && (elec_id as usize) < NPMTS {
                Some(elec_id as usize)
            }
            else {
                None
            }
        }
    }
}

/// The partner (real or mirror) of a channel under the dual-mode relation tables.
fn dual_partner(fw: Firmware, fec: usize, channel: usize) -> (usize, usize) {
    let per_fec = fw.pmts_per_fec();
    let group_base = fec - fec % 4;

    let index = per_fec * (fec % 4) + channel;

    let partner = match fw {
        Firmware::Hotel => CHANNELS_RELATION[index] as usize,
        _ => CHANNELS_RELATION_INDIA[index] as usize,
    };

    (group_base + partner / per_fec, partner % per_fec)
}

/// Whether a channel carries the baseline-restored mirror of its partner. By convention the
/// lower-indexed channel of a pair is the real one.
fn is_mirror(fw: Firmware, fec: usize, channel: usize) -> bool {
    let per_fec = fw.pmts_per_fec();
    let (pfec, pch) = dual_partner(fw, fec, channel);

    per_fec * pfec + pch < per_fec * fec + channel
}

/// The raw and baseline-restored digits decoded from one PMT card payload.
#[derive(Default, Debug)]
pub struct PmtDigits {
    pub raw: DigitCollection,
    pub blr: DigitCollection,
}

/// Decode one PMT card payload, dispatching on the layout flags of the card header.
pub fn decode_pmt(
    card: &CardHeader,
    words: &mut WordReader<'_>,
    huffman: Option<&HuffmanTree>,
) -> Result<PmtDigits> {
    if card.n_channels == 0 || card.n_channels > card.fw.pmts_per_fec() {
        return event_error("pmt: card channel count out of range for firmware");
    }

    if card.buffer_samples == 0 {
        return event_error("pmt: card reports an empty buffer");
    }

    let (waveforms, seen) = if card.compressed {
        if card.fw == Firmware::Hotel {
            return event_error("pmt: hotel firmware does not compress");
        }

        match huffman {
            Some(tree) => decode_compressed(card, words, tree)?,
            None => return unsupported_error("pmt: no huffman table supplied for this run"),
        }
    }
    else if card.zero_suppressed {
        decode_zs(card, words)?
    }
    else {
        decode_plain(card, words)?
    };

    assemble(card, waveforms, &seen)
}

/// Plain Hotel layout: `buffer_samples` slices, each a mask word followed by one sample per
/// active channel in ascending physical order.
fn decode_plain(
    card: &CardHeader,
    words: &mut WordReader<'_>,
) -> Result<(Vec<Vec<i16>>, Vec<bool>)> {
    let nch = card.n_channels;

    let mut waveforms = vec![vec![0i16; card.buffer_samples]; nch];
    let mut seen = vec![false; nch];

    for t in 0..card.buffer_samples {
        let mask = words.next_word()?;
        check_slice_mask(mask, nch)?;

        for (ch, waveform) in waveforms.iter_mut().enumerate() {
            if mask >> ch & 1 == 1 {
                waveform[t] = words.next_word()? as i16;
                seen[ch] = true;
            }
        }
    }

    Ok((waveforms, seen))
}

/// Zero-suppressed layout: repeated `[time µs, mask, samples…]` records. Slices that were
/// suppressed leave zeros in the output.
fn decode_zs(card: &CardHeader, words: &mut WordReader<'_>) -> Result<(Vec<Vec<i16>>, Vec<bool>)> {
    let nch = card.n_channels;
    let time = TimeContext::from_card(card);

    let mut waveforms = vec![vec![0i16; card.buffer_samples]; nch];
    let mut seen = vec![false; nch];

    while words.remaining() > 0 {
        if words.remaining() < 2 {
            return event_error("pmt: truncated zero-suppressed slice");
        }

        let time_mus = words.next_word()?;
        let mask = words.next_word()?;
        check_slice_mask(mask, nch)?;

        let index = time.sample_index(mus_to_sample(f64::from(time_mus)));

        if index.is_none() {
            warn!("pmt: slice at {} µs falls outside the event buffer", time_mus);
        }

        for (ch, waveform) in waveforms.iter_mut().enumerate() {
            if mask >> ch & 1 == 1 {
                let sample = words.next_word()? as i16;

                if let Some(i) = index {
                    waveform[i] = sample;
                }

                seen[ch] = true;
            }
        }
    }

    Ok((waveforms, seen))
}

/// Compressed layout: the card-level mask selects the participating channels; each carries an
/// absolute 16-bit first sample followed by Huffman-coded deltas for the rest of the buffer.
fn decode_compressed(
    card: &CardHeader,
    words: &mut WordReader<'_>,
    tree: &HuffmanTree,
) -> Result<(Vec<Vec<i16>>, Vec<bool>)> {
    let nch = card.n_channels;

    let mask =
        if card.channel_mask != 0 { card.channel_mask } else { ((1u32 << nch) - 1) as u16 };

    let mut waveforms = vec![Vec::new(); nch];
    let mut seen = vec![false; nch];

    let mut bits = BitReader::new(words.take_remaining());

    for (ch, waveform) in waveforms.iter_mut().enumerate() {
        if mask >> ch & 1 == 0 {
            continue;
        }

        waveform.reserve(card.buffer_samples);

        let mut value = bits.read_bits_signed(16)?;
        waveform.push(value as i16);

        for _ in 1..card.buffer_samples {
            value += tree.decode(&mut bits)?;
            waveform.push(value as i16);
        }

        seen[ch] = true;
    }

    Ok((waveforms, seen))
}

/// Build digits out of the decoded waveforms, routing dual-mode mirror channels into the
/// baseline-restored collection under their real partner's electronics id.
fn assemble(card: &CardHeader, mut waveforms: Vec<Vec<i16>>, seen: &[bool]) -> Result<PmtDigits> {
    let fec = usize::from(card.fec_id);

    let chmask: Vec<u16> = seen.iter().map(|&s| u16::from(s)).collect();

    let mut out = PmtDigits::default();

    for (ch, waveform) in waveforms.iter_mut().enumerate() {
        if !seen[ch] {
            continue;
        }

        let mirror = card.dual_mode && is_mirror(card.fw, fec, ch);

        let elec_id = if mirror {
            let (pfec, pch) = dual_partner(card.fw, fec, ch);
            pmt_elec_id(pfec, pch, card.fw)?
        }
        else {
            pmt_elec_id(fec, ch, card.fw)?
        };

        let digit = Digit {
            elec_id,
            active: true,
            samples: std::mem::take(waveform),
            chmask: if card.zero_suppressed { chmask.clone() } else { Vec::new() },
        };

        if mirror {
            out.blr.push(digit);
        }
        else {
            out.raw.push(digit);
        }
    }

    Ok(out)
}

fn check_slice_mask(mask: u16, nch: usize) -> Result<()> {
    if nch < 16 && mask >> nch != 0 {
        return event_error("pmt: channel mask implies more channels than the card has");
    }

    Ok(())
}
