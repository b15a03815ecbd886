// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use clap::Arg;
use log::{error, LevelFilter};

use xenon_core::errors::Result;
use xenon_core::huffman::HuffmanTree;
use xenon_core::sensors::{SensorTable, StaticHuffman};

use xenon_daq::config::Config;
use xenon_daq::pipeline::Pipeline;
use xenon_daq::sink::SummarySink;
use xenon_daq::tables;

fn main() {
    let matches = clap::Command::new("Xenon DAQ decoder")
        .version("0.2")
        .about("Decode raw DATE event files into per-sensor waveforms")
        .arg(Arg::new("in2").long("in2").takes_value(true).help("GDC2 input file"))
        .arg(Arg::new("out").long("out").short('o').takes_value(true).help("Output archive path"))
        .arg(
            Arg::new("run")
                .long("run")
                .takes_value(true)
                .default_value("0")
                .help("Run number for events whose framing does not carry one"),
        )
        .arg(
            Arg::new("skip")
                .long("skip")
                .takes_value(true)
                .default_value("0")
                .help("Events to read and discard before decoding starts"),
        )
        .arg(
            Arg::new("max-events")
                .long("max-events")
                .takes_value(true)
                .help("Stop after writing this many events"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Increase verbosity; once for per-event summaries"),
        )
        .arg(
            Arg::new("tables")
                .long("tables")
                .takes_value(true)
                .help("Directory holding sensors.txt / huffman_pmt.txt / huffman_sipm.txt"),
        )
        .arg(Arg::new("no-db").long("no-db").help("Run without database tables"))
        .arg(
            Arg::new("discard-errors")
                .long("discard-errors")
                .help("Drop the sensors of any equipment whose error bit is set"),
        )
        .arg(Arg::new("no-pmts").long("no-pmts").help("Do not decode PMT cards"))
        .arg(Arg::new("no-sipms").long("no-sipms").help("Do not decode SiPM cards"))
        .arg(
            Arg::new("two-files")
                .long("two-files")
                .help("Read GDC1 and GDC2 in strict alternation"),
        )
        .arg(
            Arg::new("external-trigger-ch")
                .long("external-trigger-ch")
                .takes_value(true)
                .help("PMT electronics channel re-emitted as the external PMT"),
        )
        .arg(Arg::new("INPUT").help("The GDC1 input file").required(true).index(1))
        .get_matches();

    let verbosity = matches.occurrences_of("verbose") as u32;

    pretty_env_logger::formatted_builder()
        .filter_level(match verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .init();

    let config = Config {
        file_in: PathBuf::from(matches.value_of("INPUT").unwrap()),
        file_in2: matches.value_of("in2").map(PathBuf::from),
        file_out: matches.value_of("out").map(PathBuf::from),
        run_number: matches.value_of_t("run").unwrap_or(0),
        skip: matches.value_of_t("skip").unwrap_or(0),
        max_events: matches.value_of_t("max-events").unwrap_or(u32::MAX),
        verbosity,
        no_db: matches.is_present("no-db") || !matches.is_present("tables"),
        discard_errors: matches.is_present("discard-errors"),
        read_pmts: !matches.is_present("no-pmts"),
        read_sipms: !matches.is_present("no-sipms"),
        two_files: matches.is_present("two-files"),
        external_trigger_channel: matches.value_of_t("external-trigger-ch").unwrap_or(-1),
    };

    let tables_dir = matches.value_of("tables").map(PathBuf::from);

    std::process::exit(match run(&config, tables_dir.as_deref()) {
        Ok(0) => 0,
        Ok(_) => 1,
        Err(err) => {
            error!("{}", err);
            2
        }
    });
}

/// Load the run tables, drive the pipeline, and return the number of file errors.
fn run(config: &Config, tables_dir: Option<&Path>) -> Result<u32> {
    let (sensors, huffman) = match tables_dir {
        Some(dir) if !config.no_db => (
            tables::load_sensor_table(&dir.join("sensors.txt"))?,
            StaticHuffman::new(
                load_optional_huffman(&dir.join("huffman_pmt.txt"))?,
                load_optional_huffman(&dir.join("huffman_sipm.txt"))?,
            ),
        ),
        _ => (
            SensorTable::identity(xenon_codec_fec::NPMTS, xenon_codec_fec::NSIPMS),
            StaticHuffman::empty(),
        ),
    };

    let mut sink = SummarySink::new();

    let stats = Pipeline::new(config, &sensors, &huffman, &mut sink).run()?;

    println!("Decoded {} of {} events", stats.events_written, stats.events_read);
    println!("File errors:  {}", stats.file_errors);
    println!("Event errors: {}", stats.event_errors);

    Ok(stats.file_errors)
}

fn load_optional_huffman(path: &Path) -> Result<Option<HuffmanTree>> {
    if path.exists() {
        Ok(Some(tables::load_huffman_table(path)?))
    }
    else {
        Ok(None)
    }
}
