// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end decoding scenarios over in-memory DATE streams.

mod common;

use common::{
    card_words, equipment_block, event_record, reader_over, EQ_PMT_FEC, EQ_SIPM_FEC, EQ_TRIGGER,
};

use xenon_codec_fec::{NPMTS, NSIPMS, SIPMS_PER_FEB};
use xenon_core::sensors::{SensorTable, StaticHuffman};
use xenon_daq::config::Config;
use xenon_daq::pipeline::{Pipeline, RunStats};
use xenon_daq::sink::CollectSink;
use xenon_format_date::{EVENT_TYPE_CALIBRATION, EVENT_TYPE_PHYSICS, EVENT_TYPE_START_OF_RUN};

fn run_one_file(config: &Config, bytes: Vec<u8>) -> (CollectSink, RunStats) {
    let sensors = SensorTable::identity(NPMTS, NSIPMS);
    let huffman = StaticHuffman::empty();
    let mut sink = CollectSink::new();

    let stats = {
        let mut pipeline = Pipeline::new(config, &sensors, &huffman, &mut sink);
        pipeline.run_readers(reader_over(bytes), None).unwrap()
    };

    (sink, stats)
}

#[test]
fn verify_single_pmt_event() {
    // One Hotel PMT card, channel 0 only, four slices.
    let mut words = card_words(8, false, false, false, 2, 8, 0x01, 4, 0, 0);

    for sample in [10u16, 20, 30, 40] {
        words.push(0x0001);
        words.push(sample);
    }

    let payload = equipment_block(EQ_PMT_FEC, 2, false, &words);
    let bytes = event_record(EVENT_TYPE_PHYSICS, 1, 1000, &payload);

    let (sink, stats) = run_one_file(&Config::default(), bytes);

    assert_eq!(stats.events_read, 1);
    assert_eq!(stats.events_written, 1);
    assert_eq!(stats.event_errors, 0);

    let event = &sink.events[0];

    assert_eq!(event.header.run_number, 42);
    assert_eq!(event.header.event_number, 1);
    assert_eq!(event.header.timestamp, 1000 * 1_000_000);

    assert_eq!(event.pmts.len(), 1);
    assert_eq!(event.pmts[0].elec_id, 16);
    assert!(event.pmts[0].active);
    assert_eq!(event.pmts[0].samples, vec![10, 20, 30, 40]);
}

#[test]
fn verify_sipm_error_discard() {
    // Two boards: FEB 0 (fecs 0, 1) clean, FEB 1 (fecs 2, 3) with the error bit set on fec 3.
    let mut payload = Vec::new();

    for fec in 0u16..4 {
        let mut words = card_words(8, false, false, false, fec, 32, 0, 1, 0, 0);
        words.extend((0..32).map(|k| u16::from(fec) * 100 + k));

        payload.extend_from_slice(&equipment_block(
            EQ_SIPM_FEC,
            u32::from(fec),
            fec == 3,
            &words,
        ));
    }

    let bytes = event_record(EVENT_TYPE_PHYSICS, 1, 0, &payload);

    let config = Config { discard_errors: true, ..Default::default() };
    let (sink, stats) = run_one_file(&config, bytes);

    assert_eq!(stats.event_errors, 1);

    let event = &sink.events[0];

    // Only FEB 0 was emitted, and in full.
    assert_eq!(event.sipms.len(), SIPMS_PER_FEB);
    assert!(event.sipms.iter().all(|d| d.elec_id < 1000));

    // The interleave rule: even channels from fec 0, odd from fec 1.
    assert_eq!(event.sipms[0].samples, vec![0]);
    assert_eq!(event.sipms[1].samples, vec![100]);
    assert_eq!(event.sipms[2].samples, vec![1]);
}

#[test]
fn verify_sipm_missing_partner_zero_fills() {
    // Only one card of FEB 0 reports; without the discard policy the board is zero-filled.
    let mut words = card_words(8, false, false, false, 0, 32, 0, 2, 0, 0);
    words.extend(std::iter::repeat(7u16).take(64));

    let payload = equipment_block(EQ_SIPM_FEC, 0, false, &words);
    let bytes = event_record(EVENT_TYPE_PHYSICS, 1, 0, &payload);

    let (sink, stats) = run_one_file(&Config::default(), bytes);

    assert_eq!(stats.event_errors, 1);

    let event = &sink.events[0];
    assert_eq!(event.sipms.len(), SIPMS_PER_FEB);
    assert!(event.sipms.iter().all(|d| !d.active));
    assert!(event.sipms.iter().all(|d| d.samples == vec![0, 0]));
}

#[test]
fn verify_two_file_alternation() {
    let mut file_a = Vec::new();
    let mut file_b = Vec::new();

    for n in 1..4 {
        file_a.extend_from_slice(&event_record(EVENT_TYPE_PHYSICS, n, 100 + n, &[]));
        file_b.extend_from_slice(&event_record(EVENT_TYPE_PHYSICS, n, 200 + n, &[]));
    }

    let config = Config::default();
    let sensors = SensorTable::identity(NPMTS, NSIPMS);
    let huffman = StaticHuffman::empty();
    let mut sink = CollectSink::new();

    let stats = {
        let mut pipeline = Pipeline::new(&config, &sensors, &huffman, &mut sink);
        pipeline.run_readers(reader_over(file_a), Some(reader_over(file_b))).unwrap()
    };

    assert_eq!(stats.events_written, 6);

    let order: Vec<(u32, u64)> = sink
        .events
        .iter()
        .map(|e| (e.header.event_number, e.header.timestamp / 1_000_000))
        .collect();

    assert_eq!(order, vec![(1, 101), (1, 201), (2, 102), (2, 202), (3, 103), (3, 203)]);
}

#[test]
fn verify_skip_and_max_events() {
    let mut bytes = Vec::new();

    for n in 1..6 {
        bytes.extend_from_slice(&event_record(EVENT_TYPE_PHYSICS, n, 0, &[]));
    }

    let config = Config { skip: 1, max_events: 2, ..Default::default() };
    let (sink, stats) = run_one_file(&config, bytes);

    assert_eq!(stats.events_written, 2);

    let numbers: Vec<u32> = sink.events.iter().map(|e| e.header.event_number).collect();
    assert_eq!(numbers, vec![2, 3]);
}

#[test]
fn verify_event_type_gating() {
    let mut bytes = Vec::new();

    bytes.extend_from_slice(&event_record(EVENT_TYPE_START_OF_RUN, 0, 0, &[]));
    bytes.extend_from_slice(&event_record(EVENT_TYPE_PHYSICS, 1, 0, &[]));
    bytes.extend_from_slice(&event_record(EVENT_TYPE_CALIBRATION, 2, 0, &[]));

    let (sink, stats) = run_one_file(&Config::default(), bytes);

    assert_eq!(stats.events_read, 3);
    assert_eq!(stats.events_written, 2);

    let numbers: Vec<u32> = sink.events.iter().map(|e| e.header.event_number).collect();
    assert_eq!(numbers, vec![1, 2]);
}

#[test]
fn verify_trigger_and_external_pmt() {
    // Trigger equipment: type 7, fired channels {0, 3, 17}, two configuration entries.
    let mut trigger_words: Vec<u16> = vec![7, 0x0009, 0x0002, 0x0000];

    for (name, value) in [("PERIOD", 1000i32), ("WIDTH", 50)] {
        let mut bytes = name.as_bytes().to_vec();
        bytes.resize(8, 0);

        trigger_words
            .extend(bytes.chunks(2).map(|c| (u16::from(c[0]) << 8) | u16::from(c[1])));
        trigger_words.push((value >> 16) as u16);
        trigger_words.push((value & 0xffff) as u16);
    }

    // A PMT card whose channel 0 is electronics id 0, selected as the external PMT.
    let mut pmt_words = card_words(8, false, false, false, 0, 8, 0x01, 1, 0, 0);
    pmt_words.extend_from_slice(&[0x0001, 555]);

    let mut payload = equipment_block(EQ_TRIGGER, 0, false, &trigger_words);
    payload.extend_from_slice(&equipment_block(EQ_PMT_FEC, 0, false, &pmt_words));

    let bytes = event_record(EVENT_TYPE_PHYSICS, 1, 0, &payload);

    let config = Config { external_trigger_channel: 0, ..Default::default() };
    let (sink, _) = run_one_file(&config, bytes);

    let event = &sink.events[0];

    assert_eq!(event.header.trigger_type, 7);
    assert_eq!(event.fired_channels, vec![0, 3, 17]);
    assert_eq!(
        event.trigger_info,
        vec![("PERIOD".to_string(), 1000), ("WIDTH".to_string(), 50)]
    );

    assert_eq!(event.ext_pmts.len(), 1);
    assert_eq!(event.ext_pmts[0].elec_id, 0);
    assert_eq!(event.ext_pmts[0].samples, vec![555]);
}

#[test]
fn verify_truncated_file_counts_a_file_error() {
    let mut bytes = event_record(EVENT_TYPE_PHYSICS, 1, 0, &[]);
    bytes.extend_from_slice(&event_record(EVENT_TYPE_PHYSICS, 2, 0, &[]));
    bytes.truncate(bytes.len() - 30);

    let (sink, stats) = run_one_file(&Config::default(), bytes);

    assert_eq!(sink.events.len(), 1);
    assert_eq!(stats.file_errors, 1);
}
