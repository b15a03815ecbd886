// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bitflags::bitflags;
use log::warn;

use xenon_core::errors::{decode_error, Result};
use xenon_core::io::ReadBytes;

/// Every DATE record starts with this magic number.
pub const DATE_MAGIC: u32 = 0xda1e_5afe;

/// Header format 3.12, 68-byte header with a single seconds timestamp.
pub const HEADER_VERSION_V312: u32 = 0x0003_000c;
/// Header format 3.14, 80-byte header with a microsecond-resolution timestamp.
pub const HEADER_VERSION_V314: u32 = 0x0003_000e;

pub const HEADER_SIZE_V312: u32 = 68;
pub const HEADER_SIZE_V314: u32 = 80;

/// DAQ record types. Only physics and calibration events carry sensor payloads.
pub const EVENT_TYPE_START_OF_RUN: u32 = 1;
pub const EVENT_TYPE_END_OF_RUN: u32 = 2;
pub const EVENT_TYPE_PHYSICS: u32 = 7;
pub const EVENT_TYPE_CALIBRATION: u32 = 8;

bitflags! {
    /// Event type-attribute bits.
    pub struct EventAttrs: u32 {
        /// The record is a super event whose payload is a sequence of sub-events.
        const SUPER_EVENT = 0x0000_0001;
    }
}

bitflags! {
    /// Equipment type-attribute bits.
    pub struct EquipmentAttrs: u32 {
        /// The front-end card flagged an acquisition error for this block.
        const ERROR = 0x0000_0001;
    }
}

/// A super-event or sub-event header. The two share one layout; a sub-event carries a non-zero
/// LDC id and no super-event attribute bit.
#[derive(Clone, Debug)]
pub struct EventRecordHeader {
    /// Total record size in bytes, header included.
    pub size: u32,
    /// Declared header size, 68 or 80 bytes depending on the format version.
    pub head_size: u32,
    /// Header format version.
    pub version: u32,
    /// DAQ record type.
    pub etype: u32,
    /// Run number.
    pub run_nb: u32,
    /// Event identifier; `id[0]` is the event number within the run.
    pub id: [u32; 2],
    pub trigger_pattern: [u32; 2],
    pub detector_pattern: u32,
    /// Type-attribute words; the first carries the [`EventAttrs`] bits.
    pub type_attribute: [u32; 3],
    pub ldc_id: u32,
    pub gdc_id: u32,
    /// Timestamp in microseconds. Format 3.12 only records whole seconds.
    pub timestamp: u64,
}

impl EventRecordHeader {
    /// Parse a record header from the stream, including the `size` field.
    pub fn parse<B: ReadBytes>(reader: &mut B) -> Result<Self> {
        let size = reader.read_u32()?;
        Self::parse_after_size(reader, size)
    }

    /// Parse the remainder of a record header when the `size` field has already been consumed.
    pub fn parse_after_size<B: ReadBytes>(reader: &mut B, size: u32) -> Result<Self> {
        let magic = reader.read_u32()?;

        if magic != DATE_MAGIC {
            return decode_error("date: bad record magic");
        }

        let head_size = reader.read_u32()?;
        let version = reader.read_u32()?;

        let expected = match version {
            HEADER_VERSION_V312 => HEADER_SIZE_V312,
            HEADER_VERSION_V314 => HEADER_SIZE_V314,
            _ => return decode_error("date: unknown header version"),
        };

        if head_size != expected {
            return decode_error("date: header size does not match version");
        }

        if size < head_size {
            return decode_error("date: record smaller than its header");
        }

        let etype = reader.read_u32()?;
        let run_nb = reader.read_u32()?;
        let id = [reader.read_u32()?, reader.read_u32()?];
        let trigger_pattern = [reader.read_u32()?, reader.read_u32()?];
        let detector_pattern = reader.read_u32()?;
        let type_attribute = [reader.read_u32()?, reader.read_u32()?, reader.read_u32()?];
        let ldc_id = reader.read_u32()?;
        let gdc_id = reader.read_u32()?;

        let timestamp = match version {
            HEADER_VERSION_V312 => 1_000_000 * u64::from(reader.read_u32()?),
            _ => {
                let sec = u64::from(reader.read_u32()?);
                let usec = u64::from(reader.read_u32()?);
                // Two reserved words pad the 3.14 header to 80 bytes.
                reader.read_u32()?;
                reader.read_u32()?;
                1_000_000 * sec + usec
            }
        };

        Ok(EventRecordHeader {
            size,
            head_size,
            version,
            etype,
            run_nb,
            id,
            trigger_pattern,
            detector_pattern,
            type_attribute,
            ldc_id,
            gdc_id,
            timestamp,
        })
    }

    /// The event number within the run.
    pub fn event_number(&self) -> u32 {
        self.id[0]
    }

    /// The payload length in bytes.
    pub fn payload_len(&self) -> u32 {
        self.size - self.head_size
    }

    /// Whether the record is a super event containing sub-events.
    pub fn is_super_event(&self) -> bool {
        EventAttrs::from_bits_truncate(self.type_attribute[0]).contains(EventAttrs::SUPER_EVENT)
    }

    /// Whether the orchestrator should decode this record. Only physics and calibration events
    /// carry sensor data; every other record type is read and discarded.
    pub fn is_selected(&self) -> bool {
        self.etype == EVENT_TYPE_PHYSICS || self.etype == EVENT_TYPE_CALIBRATION
    }
}

/// The equipment types of interest. Anything else is skipped by the framer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EquipmentKind {
    PmtFec,
    SipmFec,
    Trigger,
    Unknown(u32),
}

impl From<u32> for EquipmentKind {
    fn from(etype: u32) -> Self {
        match etype {
            1 => EquipmentKind::PmtFec,
            2 => EquipmentKind::SipmFec,
            3 => EquipmentKind::Trigger,
            other => EquipmentKind::Unknown(other),
        }
    }
}

/// Length of an equipment header in bytes.
pub const EQUIPMENT_HEADER_LEN: u32 = 28;

/// An equipment block header.
#[derive(Clone, Debug)]
pub struct EquipmentHeader {
    /// Total block size in bytes, header included.
    pub size: u32,
    pub etype: u32,
    /// The equipment identifier; for front-end cards this is the FEC id.
    pub id: u32,
    /// Type-attribute words; the first carries the [`EquipmentAttrs`] bits.
    pub type_attribute: [u32; 3],
    pub basic_element_size: u32,
}

impl EquipmentHeader {
    pub fn parse<B: ReadBytes>(reader: &mut B) -> Result<Self> {
        let size = reader.read_u32()?;
        let etype = reader.read_u32()?;
        let id = reader.read_u32()?;
        let type_attribute = [reader.read_u32()?, reader.read_u32()?, reader.read_u32()?];
        let basic_element_size = reader.read_u32()?;

        if size < EQUIPMENT_HEADER_LEN {
            return decode_error("date: equipment block smaller than its header");
        }

        Ok(EquipmentHeader { size, etype, id, type_attribute, basic_element_size })
    }

    pub fn kind(&self) -> EquipmentKind {
        EquipmentKind::from(self.etype)
    }

    /// Whether the front-end flagged an error for this block.
    pub fn error_bit(&self) -> bool {
        EquipmentAttrs::from_bits_truncate(self.type_attribute[0]).contains(EquipmentAttrs::ERROR)
    }

    /// The payload length in bytes.
    pub fn payload_len(&self) -> u32 {
        self.size - EQUIPMENT_HEADER_LEN
    }
}

/// Swap each pair of 16-bit words within a 32-bit word. A trailing unpaired word is passed
/// through unchanged. The transformation is an involution.
pub fn flip_words(words: &[u16]) -> Vec<u16> {
    let mut out = Vec::with_capacity(words.len());

    for pair in words.chunks(2) {
        match *pair {
            [a, b] => {
                out.push(b);
                out.push(a);
            }
            [a] => out.push(a),
            _ => unreachable!(),
        }
    }

    out
}

/// Convert an equipment payload from its wire form, a sequence of 16-bit big-endian words with
/// the halves of each 32-bit word swapped, into decoder-order host words.
pub fn payload_to_words(bytes: &[u8]) -> Result<Vec<u16>> {
    if bytes.len() % 2 != 0 {
        warn!("date: equipment payload has an odd byte length ({})", bytes.len());
        return decode_error("date: odd equipment payload length");
    }

    let words: Vec<u16> =
        bytes.chunks_exact(2).map(|b| u16::from_be_bytes([b[0], b[1]])).collect();

    Ok(flip_words(&words))
}
