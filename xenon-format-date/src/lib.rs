// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DATE raw-event demuxer.
//!
//! A DATE file is a sequence of super events produced by a global data concentrator (GDC). Each
//! super event contains zero or more sub-events, one per local concentrator, and each sub-event
//! contains zero or more equipment blocks, one per front-end card or trigger module. The framer
//! surfaces, for each equipment block, its kind, id, error bit, and endian-fixed payload words;
//! decoding the payloads is the business of the codec crates.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::io;

use log::{debug, warn};

use xenon_core::errors::{decode_error, limit_error, Error, Result};
use xenon_core::io::{BufReader, ReadBytes, SourceStream, MAX_SUPER_EVENT_BYTES};

mod records;

pub use records::*;

/// One equipment block surfaced by the framer, with its payload transferred out of the raw
/// super-event buffer and endian-fixed into decoder order.
#[derive(Debug)]
pub struct Equipment {
    pub kind: EquipmentKind,
    /// The equipment identifier; the FEC id for front-end blocks.
    pub id: u32,
    /// Whether the front-end flagged an acquisition error for this block.
    pub error_bit: bool,
    pub payload: Box<[u16]>,
}

/// One framed super event: its header and every recognized equipment block beneath it.
#[derive(Debug)]
pub struct RawEvent {
    pub header: EventRecordHeader,
    pub equipment: Vec<Equipment>,
}

/// The result of scanning a file for its event count.
#[derive(Copy, Clone, Debug)]
pub struct EventCount {
    pub events: u32,
    pub first_event_number: Option<u32>,
}

/// `DateReader` demuxes a DATE file into [`RawEvent`]s.
pub struct DateReader {
    stream: SourceStream,
    /// Receives each raw super-event payload; reused across events.
    scratch: Vec<u8>,
}

impl DateReader {
    /// Instantiate a new `DateReader` over the given stream.
    pub fn new(stream: SourceStream) -> Self {
        DateReader { stream, scratch: Vec::new() }
    }

    /// Read the next super event, or `None` at the end of the stream.
    ///
    /// Records that are not physics or calibration events are surfaced with their header only;
    /// their payloads are service records, not equipment blocks, and are skipped unparsed.
    ///
    /// A failure here means the file framing is damaged; the caller should abandon the file.
    pub fn next_event(&mut self) -> Result<Option<RawEvent>> {
        let size = match self.read_record_size()? {
            Some(size) => size,
            None => return Ok(None),
        };

        let header = EventRecordHeader::parse_after_size(&mut self.stream, size)?;

        let payload_len = header.payload_len() as usize;

        if payload_len > MAX_SUPER_EVENT_BYTES {
            return limit_error("date: super event exceeds the maximum record size");
        }

        self.scratch.resize(payload_len, 0);
        self.stream.read_buf_exact(&mut self.scratch)?;

        let mut equipment = Vec::new();

        if !header.is_selected() {
            return Ok(Some(RawEvent { header, equipment }));
        }

        if header.is_super_event() {
            let mut reader = BufReader::new(&self.scratch);

            while reader.bytes_available() > 0 {
                let sub = EventRecordHeader::parse(&mut reader)?;

                debug!(
                    "sub-event: ldc={} type={} len={}",
                    sub.ldc_id,
                    sub.etype,
                    sub.payload_len()
                );

                if (sub.payload_len() as usize) > reader.bytes_available() {
                    return decode_error("date: sub-event overruns its super event");
                }

                let sub_payload = reader.read_buf_bytes_ref(sub.payload_len() as usize)?;
                parse_equipment_blocks(sub_payload, &mut equipment)?;
            }
        }
        else {
            parse_equipment_blocks(&self.scratch, &mut equipment)?;
        }

        Ok(Some(RawEvent { header, equipment }))
    }

    /// Scan the remainder of the stream, counting records, then restore the read position. The
    /// position is restored even when the scan fails partway.
    pub fn count_events(&mut self) -> Result<EventCount> {
        let start = self.stream.pos();
        let result = self.scan_events();

        self.stream.seek(start)?;

        result
    }

    fn scan_events(&mut self) -> Result<EventCount> {
        let mut events = 0u32;
        let mut first_event_number = None;

        loop {
            let size = match self.read_record_size()? {
                Some(size) => size,
                None => break,
            };

            let header = EventRecordHeader::parse_after_size(&mut self.stream, size)?;

            if first_event_number.is_none() {
                first_event_number = Some(header.event_number());
            }

            events += 1;
            self.stream.ignore_bytes(u64::from(header.payload_len()))?;
        }

        Ok(EventCount { events, first_event_number })
    }

    /// Read the leading record-size field. A clean end of stream before the first byte yields
    /// `None`; an end of stream inside the field is a framing error.
    fn read_record_size(&mut self) -> Result<Option<u32>> {
        let first = match self.stream.read_byte() {
            Ok(byte) => byte,
            Err(Error::IoError(ref err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let mut rest = [0u8; 3];

        if self.stream.read_buf_exact(&mut rest).is_err() {
            return decode_error("date: truncated record header");
        }

        Ok(Some(u32::from_le_bytes([first, rest[0], rest[1], rest[2]])))
    }
}

/// Parse the equipment blocks of one sub-event payload. Unknown equipment types are skipped;
/// anything that does not frame cleanly is a file-level error.
fn parse_equipment_blocks(bytes: &[u8], out: &mut Vec<Equipment>) -> Result<()> {
    let mut reader = BufReader::new(bytes);

    while reader.bytes_available() > 0 {
        if reader.bytes_available() < EQUIPMENT_HEADER_LEN as usize {
            return decode_error("date: truncated equipment header");
        }

        let head = EquipmentHeader::parse(&mut reader)?;

        if (head.payload_len() as usize) > reader.bytes_available() {
            return decode_error("date: equipment block overruns its sub-event");
        }

        let payload = reader.read_buf_bytes_ref(head.payload_len() as usize)?;

        match head.kind() {
            EquipmentKind::Unknown(etype) => {
                warn!("skipping unknown equipment: type={} id={}", etype, head.id);
            }
            kind => out.push(Equipment {
                kind,
                id: head.id,
                error_bit: head.error_bit(),
                payload: payload_to_words(payload)?.into_boxed_slice(),
            }),
        }
    }

    Ok(())
}
