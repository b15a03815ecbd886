// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `sensors` module provides the run-scoped collaborator contracts: the sensor map relating
//! electronics and sensor identifier spaces, and the provider of per-kind Huffman code tables.
//!
//! Both are read-only after start of run, so implementations may be shared freely across the
//! decode loop without locking.

use std::collections::HashMap;

use log::warn;

use crate::event::SensorKind;
use crate::huffman::HuffmanTree;

/// A `SensorMap` is a read-only, per-run bijection subset between electronics ids and sensor
/// ids. Lookups return -1 when the id is not mapped, matching the database convention.
pub trait SensorMap {
    /// Maps an electronics id to its sensor id, or -1.
    fn elec_to_sensor(&self, elec_id: i32) -> i32;

    /// Maps a sensor id to its electronics id, or -1.
    fn sensor_to_elec(&self, sensor_id: i32) -> i32;

    /// The number of PMT channels mapped for the run.
    fn number_of_pmts(&self) -> usize;

    /// The number of SiPM channels mapped for the run.
    fn number_of_sipms(&self) -> usize;
}

/// An in-memory [`SensorMap`].
#[derive(Default)]
pub struct SensorTable {
    elec_to_sensor: HashMap<i32, i32>,
    sensor_to_elec: HashMap<i32, i32>,
    n_pmts: usize,
    n_sipms: usize,
}

impl SensorTable {
    /// Instantiate an empty `SensorTable`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Instantiate an identity `SensorTable` covering the given channel counts. Used when
    /// running without the run database.
    pub fn identity(n_pmts: usize, n_sipms: usize) -> Self {
        SensorTable { elec_to_sensor: HashMap::new(), sensor_to_elec: HashMap::new(), n_pmts, n_sipms }
    }

    /// Add one electronics id to sensor id relation.
    pub fn insert(&mut self, kind: SensorKind, elec_id: i32, sensor_id: i32) {
        if self.elec_to_sensor.insert(elec_id, sensor_id).is_some() {
            warn!("sensor map: electronics id {} remapped", elec_id);
        }

        self.sensor_to_elec.insert(sensor_id, elec_id);

        match kind {
            SensorKind::Pmt => self.n_pmts += 1,
            SensorKind::Sipm => self.n_sipms += 1,
        }
    }

    fn is_identity(&self) -> bool {
        self.elec_to_sensor.is_empty()
    }
}

impl SensorMap for SensorTable {
    fn elec_to_sensor(&self, elec_id: i32) -> i32 {
        if self.is_identity() {
            return elec_id;
        }
        *self.elec_to_sensor.get(&elec_id).unwrap_or(&-1)
    }

    fn sensor_to_elec(&self, sensor_id: i32) -> i32 {
        if self.is_identity() {
            return sensor_id;
        }
        *self.sensor_to_elec.get(&sensor_id).unwrap_or(&-1)
    }

    fn number_of_pmts(&self) -> usize {
        self.n_pmts
    }

    fn number_of_sipms(&self) -> usize {
        self.n_sipms
    }
}

/// A `HuffmanProvider` supplies the per-run, per-sensor-kind Huffman code tables required by the
/// compressed firmware payloads.
pub trait HuffmanProvider {
    /// Gets the Huffman tree for the given run and sensor kind, or `None` when the run carries
    /// no table for that kind.
    fn get_huffman(&self, run_number: u32, kind: SensorKind) -> Option<&HuffmanTree>;
}

/// A [`HuffmanProvider`] backed by tables loaded once at start of run.
#[derive(Default)]
pub struct StaticHuffman {
    pmt: Option<HuffmanTree>,
    sipm: Option<HuffmanTree>,
}

impl StaticHuffman {
    /// Instantiate a provider with no tables. Compressed payloads will fail to decode.
    pub fn empty() -> Self {
        Default::default()
    }

    /// Instantiate a provider from the given tables.
    pub fn new(pmt: Option<HuffmanTree>, sipm: Option<HuffmanTree>) -> Self {
        StaticHuffman { pmt, sipm }
    }
}

impl HuffmanProvider for StaticHuffman {
    fn get_huffman(&self, _run_number: u32, kind: SensorKind) -> Option<&HuffmanTree> {
        match kind {
            SensorKind::Pmt => self.pmt.as_ref(),
            SensorKind::Sipm => self.sipm.as_ref(),
        }
    }
}
