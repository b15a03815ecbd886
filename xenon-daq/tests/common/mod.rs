// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builders that synthesize DATE files in memory for the end-to-end tests.

use std::io::Cursor;

use xenon_core::io::SourceStream;
use xenon_format_date::{
    flip_words, DateReader, DATE_MAGIC, EQUIPMENT_HEADER_LEN, HEADER_SIZE_V314,
    HEADER_VERSION_V314,
};

pub const EQ_PMT_FEC: u32 = 1;
pub const EQ_SIPM_FEC: u32 = 2;
pub const EQ_TRIGGER: u32 = 3;

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Encode payload words into their wire form: halves of each 32-bit word swapped, each 16-bit
/// word big-endian.
pub fn wire_payload(words: &[u16]) -> Vec<u8> {
    flip_words(words).iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// One equipment block with the given payload words.
pub fn equipment_block(etype: u32, id: u32, error: bool, words: &[u16]) -> Vec<u8> {
    let payload = wire_payload(words);
    let mut out = Vec::new();

    put_u32(&mut out, EQUIPMENT_HEADER_LEN + payload.len() as u32);
    put_u32(&mut out, etype);
    put_u32(&mut out, id);
    put_u32(&mut out, if error { 1 } else { 0 });
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, 2);

    out.extend_from_slice(&payload);
    out
}

/// One 3.14-format event record with the given equipment region as payload.
pub fn event_record(etype: u32, event_number: u32, ts_sec: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();

    put_u32(&mut out, HEADER_SIZE_V314 + payload.len() as u32);
    put_u32(&mut out, DATE_MAGIC);
    put_u32(&mut out, HEADER_SIZE_V314);
    put_u32(&mut out, HEADER_VERSION_V314);
    put_u32(&mut out, etype);
    put_u32(&mut out, 42); // run
    put_u32(&mut out, event_number);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0); // trigger pattern
    put_u32(&mut out, 0);
    put_u32(&mut out, 0); // detector pattern
    put_u32(&mut out, 0); // attributes
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0); // ldc
    put_u32(&mut out, 1); // gdc
    put_u32(&mut out, ts_sec);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);

    out.extend_from_slice(payload);
    out
}

/// A FEC card header word sequence.
#[allow(clippy::too_many_arguments)]
pub fn card_words(
    fw: u16,
    zs: bool,
    compressed: bool,
    dual: bool,
    fec_id: u16,
    n_channels: u16,
    channel_mask: u16,
    buffer_samples: u16,
    pre_trg_samples: u16,
    ft: u16,
) -> Vec<u16> {
    let mut format = fw;
    if zs {
        format |= 0x0100;
    }
    if compressed {
        format |= 0x0200;
    }
    if dual {
        format |= 0x0400;
    }

    vec![format, fec_id, n_channels, channel_mask, buffer_samples, pre_trg_samples, ft, 0, 0, 1]
}

/// A reader over an in-memory DATE file.
pub fn reader_over(bytes: Vec<u8>) -> DateReader {
    DateReader::new(SourceStream::new(Box::new(Cursor::new(bytes))))
}
