// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-run orchestration loop: reads super events from one or two GDC files, gates them by
//! DAQ type, dispatches equipment payloads to the decoders, assembles the per-sensor waveforms,
//! and emits each event to the sink.

use std::fs::File;

use log::{debug, error, info, warn};

use xenon_codec_fec::card::CardHeader;
use xenon_codec_fec::pmt::{decode_pmt, pmt_elec_id, pmt_position};
use xenon_codec_fec::sipm::{
    assemble_feb, decode_sipm_stream, feb_of_fec, sipm_elec_id, SipmHalf,
};
use xenon_codec_fec::time::{compute_next_ft, compute_sipm_time};
use xenon_codec_fec::trigger::decode_trigger;
use xenon_codec_fec::{NPMTS, NSIPMS, NUMBER_OF_FEBS, NUM_FEC_SIPM, SIPMS_PER_FEB};
use xenon_core::errors::{event_error, Result};
use xenon_core::event::{DecodedEvent, Digit, DigitCollection, EventHeader, SensorKind};
use xenon_core::io::{SourceStream, WordReader};
use xenon_core::sensors::{HuffmanProvider, SensorMap};
use xenon_core::sink::EventSink;
use xenon_format_date::{DateReader, Equipment, EquipmentKind, RawEvent};

use crate::config::Config;

/// Per-run accounting reported when the read loop finishes.
#[derive(Copy, Clone, Debug, Default)]
pub struct RunStats {
    /// Super events read from the inputs, selected or not.
    pub events_read: u32,
    /// Events written to the sink.
    pub events_written: u32,
    /// Fatal framing errors; at most one per input file.
    pub file_errors: u32,
    /// Localized event or equipment errors.
    pub event_errors: u32,
}

/// The event orchestrator.
pub struct Pipeline<'a> {
    config: &'a Config,
    sensors: &'a dyn SensorMap,
    huffman: &'a dyn HuffmanProvider,
    sink: &'a mut dyn EventSink,

    stats: RunStats,

    // Per-event scratch, reused across events and reinitialized at event start. Stale values
    // leaking across events would corrupt the delta reconstruction.
    pmt_slots: Vec<i32>,
    blr_slots: Vec<i32>,
    sipm_last_values: Vec<i32>,
    sipm_halves: Vec<Option<SipmHalf>>,
    feb_dropped: Vec<bool>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        sensors: &'a dyn SensorMap,
        huffman: &'a dyn HuffmanProvider,
        sink: &'a mut dyn EventSink,
    ) -> Self {
        Pipeline {
            config,
            sensors,
            huffman,
            sink,
            stats: Default::default(),
            pmt_slots: vec![-1; NPMTS],
            blr_slots: vec![-1; NPMTS],
            sipm_last_values: vec![0; NSIPMS],
            sipm_halves: (0..NUM_FEC_SIPM).map(|_| None).collect(),
            feb_dropped: vec![false; NUMBER_OF_FEBS],
        }
    }

    /// Open the configured input file(s) and run the read loop to completion.
    pub fn run(&mut self) -> Result<RunStats> {
        let gdc1 = DateReader::new(SourceStream::new(Box::new(File::open(&self.config.file_in)?)));

        let gdc2 = match (&self.config.file_in2, self.config.two_files) {
            (Some(path), true) => {
                Some(DateReader::new(SourceStream::new(Box::new(File::open(path)?))))
            }
            (None, true) => return event_error("config: two_files set without a second input"),
            _ => None,
        };

        self.run_readers(gdc1, gdc2)
    }

    /// Run the read loop over already-opened readers. In dual-source mode events are taken from
    /// the two readers in strict alternation, starting with GDC1; the run ends when either
    /// source is exhausted.
    pub fn run_readers(
        &mut self,
        mut gdc1: DateReader,
        mut gdc2: Option<DateReader>,
    ) -> Result<RunStats> {
        match gdc1.count_events() {
            Ok(count) => info!(
                "input reports {} events, first event {:?}",
                count.events, count.first_event_number
            ),
            Err(err) => debug!("event count scan failed: {}", err),
        }

        let mut next_gdc2 = false;
        let mut skipped = 0u32;

        loop {
            if self.stats.events_written >= self.config.max_events {
                info!("reached the configured event limit");
                break;
            }

            let has_gdc2 = gdc2.is_some();
            let reader = if next_gdc2 { gdc2.as_mut().unwrap() } else { &mut gdc1 };

            if has_gdc2 {
                next_gdc2 = !next_gdc2;
            }

            let raw = match reader.next_event() {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(err) => {
                    error!("abandoning input file: {}", err);
                    self.stats.file_errors += 1;
                    break;
                }
            };

            self.stats.events_read += 1;

            if skipped < self.config.skip {
                skipped += 1;
                continue;
            }

            if !raw.header.is_selected() {
                debug!("skipping event of type {}", raw.header.etype);
                continue;
            }

            match self.process_event(&raw) {
                Ok(event) => {
                    self.sink.write(&event)?;
                    self.stats.events_written += 1;
                }
                Err(err) if err.is_event_error() => {
                    self.stats.event_errors += 1;
                    warn!("event {} dropped: {}", raw.header.event_number(), err);
                }
                Err(err) => {
                    error!("abandoning input file: {}", err);
                    self.stats.file_errors += 1;
                    break;
                }
            }
        }

        info!(
            "run finished: {} events read, {} written, {} file errors, {} event errors",
            self.stats.events_read,
            self.stats.events_written,
            self.stats.file_errors,
            self.stats.event_errors
        );

        Ok(self.stats)
    }

    /// Decode one selected super event.
    fn process_event(&mut self, raw: &RawEvent) -> Result<DecodedEvent> {
        self.reset_event_scratch();

        let mut event = DecodedEvent {
            header: EventHeader {
                run_number: if raw.header.run_nb != 0 {
                    raw.header.run_nb
                }
                else {
                    self.config.run_number
                },
                event_number: raw.header.event_number(),
                timestamp: raw.header.timestamp,
                trigger_type: -1,
                error_bits: 0,
            },
            ..Default::default()
        };

        for (index, equipment) in raw.equipment.iter().enumerate() {
            if let Err(err) = self.dispatch_equipment(index, equipment, &mut event) {
                if err.is_event_error() {
                    self.stats.event_errors += 1;
                    event.header.error_bits |= 1 << index.min(31);
                    warn!(
                        "event {}: equipment {} abandoned: {}",
                        event.header.event_number, index, err
                    );
                }
                else {
                    return Err(err);
                }
            }
        }

        self.assemble_sipms(&mut event)?;
        self.extract_external_pmt(&mut event);
        self.log_event_summary(&event);

        Ok(event)
    }

    fn dispatch_equipment(
        &mut self,
        index: usize,
        equipment: &Equipment,
        event: &mut DecodedEvent,
    ) -> Result<()> {
        match equipment.kind {
            EquipmentKind::Trigger => {
                let mut words = WordReader::new(&equipment.payload);
                let trigger = decode_trigger(&mut words)?;

                event.header.trigger_type = trigger.trigger_type;
                event.fired_channels = trigger.fired_channels;
                event.trigger_info = trigger.config;
            }
            EquipmentKind::PmtFec if self.config.read_pmts => {
                self.read_pmt_fec(index, equipment, event)?;
            }
            EquipmentKind::SipmFec if self.config.read_sipms => {
                self.read_sipm_fec(index, equipment, event)?;
            }
            _ => {}
        }

        Ok(())
    }

    fn read_pmt_fec(
        &mut self,
        index: usize,
        equipment: &Equipment,
        event: &mut DecodedEvent,
    ) -> Result<()> {
        if equipment.error_bit {
            self.stats.event_errors += 1;
            event.header.error_bits |= 1 << index.min(31);
            warn!("event {}: pmt fec {} flagged an error", event.header.event_number, equipment.id);

            if self.config.discard_errors {
                return Ok(());
            }

            // Keep the channel bookkeeping but emit silence for the damaged card.
            let mut words = WordReader::new(&equipment.payload);
            let card = CardHeader::parse(&mut words)?;

            if card.n_channels == 0 || card.n_channels > card.fw.pmts_per_fec() {
                return event_error("pmt: card channel count out of range for firmware");
            }

            let mask = if card.channel_mask != 0 {
                card.channel_mask
            }
            else {
                ((1u32 << card.n_channels) - 1) as u16
            };

            for channel in 0..card.n_channels {
                if mask >> channel & 1 == 0 {
                    continue;
                }

                let elec_id = pmt_elec_id(usize::from(card.fec_id), channel, card.fw)?;
                let digit = Digit::inactive(elec_id, card.buffer_samples);

                merge_digit(&mut self.pmt_slots, &mut event.pmts, digit, pmt_position(elec_id, card.fw));
            }

            return Ok(());
        }

        let mut words = WordReader::new(&equipment.payload);
        let card = CardHeader::parse(&mut words)?;

        let (next_ft, next_ft_hm) = compute_next_ft(&card);
        debug!(
            "pmt fec {}: ft {} fthm {}, next trigger expected at {} {}",
            card.fec_id, card.ft, card.ft_hm, next_ft, next_ft_hm
        );

        let tree = self.huffman.get_huffman(event.header.run_number, SensorKind::Pmt);
        let digits = decode_pmt(&card, &mut words, tree)?;

        for digit in digits.raw {
            let position = pmt_position(digit.elec_id, card.fw);
            merge_digit(&mut self.pmt_slots, &mut event.pmts, digit, position);
        }

        for digit in digits.blr {
            let position = pmt_position(digit.elec_id, card.fw);
            merge_digit(&mut self.blr_slots, &mut event.blrs, digit, position);
        }

        Ok(())
    }

    fn read_sipm_fec(
        &mut self,
        index: usize,
        equipment: &Equipment,
        event: &mut DecodedEvent,
    ) -> Result<()> {
        let fec = equipment.id as usize;

        if fec >= NUM_FEC_SIPM {
            return event_error("sipm: equipment id is not a sipm fec");
        }

        let feb = feb_of_fec(fec);

        if equipment.error_bit {
            self.stats.event_errors += 1;
            event.header.error_bits |= 1 << index.min(31);
            warn!("event {}: sipm fec {} flagged an error", event.header.event_number, fec);

            if self.config.discard_errors {
                self.feb_dropped[feb] = true;
            }

            return Ok(());
        }

        let mut words = WordReader::new(&equipment.payload);
        let card = CardHeader::parse(&mut words)?;

        if usize::from(card.fec_id) != fec {
            warn!("sipm: card id {} disagrees with equipment id {}", card.fec_id, fec);
        }

        debug!("sipm fec {}: time base slice {}", fec, compute_sipm_time(&card));

        let tree = self.huffman.get_huffman(event.header.run_number, SensorKind::Sipm);

        let last_values =
            &mut self.sipm_last_values[feb * SIPMS_PER_FEB..(feb + 1) * SIPMS_PER_FEB];

        let half = decode_sipm_stream(&card, &mut words, tree, last_values)?;

        if self.sipm_halves[fec].is_some() {
            warn!("sipm: fec {} reported twice; keeping the later payload", fec);
        }

        self.sipm_halves[fec] = Some(half);

        Ok(())
    }

    /// Pair up the SiPM card streams and emit one 64-channel board at a time. A board with only
    /// one card present at event end is in error.
    fn assemble_sipms(&mut self, event: &mut DecodedEvent) -> Result<()> {
        for feb in 0..NUMBER_OF_FEBS {
            let a = self.sipm_halves[2 * feb].take();
            let b = self.sipm_halves[2 * feb + 1].take();

            if self.feb_dropped[feb] {
                continue;
            }

            match (a, b) {
                (Some(a), Some(b)) => match assemble_feb(feb, &a, &b) {
                    Ok(digits) => event.sipms.extend(digits),
                    Err(err) if err.is_event_error() => {
                        self.stats.event_errors += 1;
                        warn!("sipm: board {} abandoned: {}", feb, err);
                    }
                    Err(err) => return Err(err),
                },
                (None, None) => {}
                (a, b) => {
                    self.stats.event_errors += 1;
                    warn!("sipm: board {} is missing one of its two cards", feb);

                    if !self.config.discard_errors {
                        let present = a.or(b).expect("one half is present");

                        for channel in 0..SIPMS_PER_FEB {
                            event.sipms.push(Digit::inactive(
                                sipm_elec_id(feb, channel),
                                present.n_slices,
                            ));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Re-emit the configured external-trigger PMT channel as its own collection.
    fn extract_external_pmt(&self, event: &mut DecodedEvent) {
        let channel = self.config.external_trigger_channel;

        if channel < 0 {
            return;
        }

        match event.pmts.iter().find(|d| d.elec_id == channel) {
            Some(digit) => event.ext_pmts.push(digit.clone()),
            None => debug!("external trigger channel {} absent from this event", channel),
        }
    }

    fn log_event_summary(&self, event: &DecodedEvent) {
        if self.config.verbosity == 0 {
            return;
        }

        let unmapped = event
            .pmts
            .iter()
            .chain(event.sipms.iter())
            .filter(|d| self.sensors.elec_to_sensor(d.elec_id) < 0)
            .count();

        info!(
            "event {:>8} ts {} trigger {:>3} pmts {:>3} blrs {:>3} sipms {:>4} ext {} unmapped {}",
            event.header.event_number,
            event.header.timestamp,
            event.header.trigger_type,
            event.pmts.len(),
            event.blrs.len(),
            event.sipms.len(),
            event.ext_pmts.len(),
            unmapped
        );
    }

    fn reset_event_scratch(&mut self) {
        self.pmt_slots.fill(-1);
        self.blr_slots.fill(-1);
        self.sipm_last_values.fill(0);
        self.sipm_halves.iter_mut().for_each(|half| *half = None);
        self.feb_dropped.fill(false);
    }
}

/// Merge a digit into an event-wide collection through the per-event position table. Repeat
/// entries for one electronics id overwrite the slices they actually carry.
fn merge_digit(
    slots: &mut [i32],
    collection: &mut DigitCollection,
    digit: Digit,
    position: Option<usize>,
) {
    let position = match position {
        Some(position) => position,
        None => {
            warn!("pmt: electronics id {} has no detector position", digit.elec_id);
            collection.push(digit);
            return;
        }
    };

    let slot = slots[position];

    if slot < 0 {
        slots[position] = collection.len() as i32;
        collection.push(digit);
        return;
    }

    let existing = &mut collection[slot as usize];

    existing.active |= digit.active;

    for (dst, &src) in existing.samples.iter_mut().zip(digit.samples.iter()) {
        if src != 0 {
            *dst = src;
        }
    }
}
