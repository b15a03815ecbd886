// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

/// Run configuration of the decoding application.
#[derive(Clone, Debug)]
pub struct Config {
    /// The GDC1 input file.
    pub file_in: PathBuf,
    /// The GDC2 input file, read in strict alternation with GDC1 when `two_files` is set.
    pub file_in2: Option<PathBuf>,
    /// The output archive path, handed to the sink.
    pub file_out: Option<PathBuf>,
    /// The run number to stamp on events whose framing does not carry one.
    pub run_number: u32,
    /// Number of events to read and discard before decoding starts.
    pub skip: u32,
    /// Stop after this many events have been written to the sink.
    pub max_events: u32,
    /// Log verbosity; non-zero enables the per-event summary line.
    pub verbosity: u32,
    /// Run without the database: identity sensor maps and no Huffman tables.
    pub no_db: bool,
    /// Drop the sensors of any equipment block whose error bit is set.
    pub discard_errors: bool,
    pub read_pmts: bool,
    pub read_sipms: bool,
    /// Read GDC1 and GDC2 in strict alternation.
    pub two_files: bool,
    /// PMT electronics channel re-emitted as the external PMT, -1 to disable.
    pub external_trigger_channel: i32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_in: PathBuf::new(),
            file_in2: None,
            file_out: None,
            run_number: 0,
            skip: 0,
            max_events: u32::MAX,
            verbosity: 0,
            no_db: true,
            discard_errors: false,
            read_pmts: true,
            read_sipms: true,
            two_files: false,
            external_trigger_channel: -1,
        }
    }
}
