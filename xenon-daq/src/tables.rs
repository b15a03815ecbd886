// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! File-backed stand-ins for the run-database tables.
//!
//! The production database client is a separate collaborator; this module loads the same rows
//! from plain text files so runs can be decoded offline. A sensor file carries
//! `pmt|sipm <elec_id> <sensor_id>` rows, a Huffman file `<value> <code>` rows where the code
//! is a '0'/'1' string.

use std::fs;
use std::path::Path;

use log::info;

use xenon_core::errors::{decode_error, Result};
use xenon_core::event::SensorKind;
use xenon_core::huffman::HuffmanTree;
use xenon_core::sensors::{SensorMap, SensorTable};

/// Load a sensor map from a text file. Blank lines and `#` comments are ignored.
pub fn load_sensor_table(path: &Path) -> Result<SensorTable> {
    let mut table = SensorTable::new();

    for line in fs::read_to_string(path)?.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();

        let kind = match fields.next() {
            Some("pmt") => SensorKind::Pmt,
            Some("sipm") => SensorKind::Sipm,
            _ => return decode_error("tables: sensor row must start with pmt or sipm"),
        };

        let elec_id = parse_int(fields.next())?;
        let sensor_id = parse_int(fields.next())?;

        table.insert(kind, elec_id, sensor_id);
    }

    info!("loaded sensor map: {} pmts, {} sipms", table.number_of_pmts(), table.number_of_sipms());

    Ok(table)
}

/// Load one Huffman code table from a text file.
pub fn load_huffman_table(path: &Path) -> Result<HuffmanTree> {
    let mut tree = HuffmanTree::new();

    for line in fs::read_to_string(path)?.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();

        let value = parse_int(fields.next())?;

        let code = match fields.next() {
            Some(code) => code,
            None => return decode_error("tables: huffman row is missing its code"),
        };

        tree.insert(code, value)?;
    }

    if tree.is_empty() {
        return decode_error("tables: huffman file holds no codes");
    }

    Ok(tree)
}

fn parse_int(field: Option<&str>) -> Result<i32> {
    match field.and_then(|f| f.parse().ok()) {
        Some(value) => Ok(value),
        None => decode_error("tables: malformed integer field"),
    }
}

#[cfg(test)]
mod tests {
    use super::{load_huffman_table, load_sensor_table};
    use std::io::Write;
    use xenon_core::io::BitReader;
    use xenon_core::sensors::SensorMap;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("xenon-tables-{}-{}", std::process::id(), name));

        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn verify_load_sensor_table() {
        let path = temp_file("sensors", "# header\npmt 104 3\nsipm 2017 11017\n\n");

        let table = load_sensor_table(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(table.elec_to_sensor(104), 3);
        assert_eq!(table.sensor_to_elec(11017), 2017);
        assert_eq!(table.number_of_pmts(), 1);
    }

    #[test]
    fn verify_load_huffman_table() {
        let path = temp_file("huffman", "0 0\n1 10\n-1 11\n");

        let tree = load_huffman_table(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let mut bits = BitReader::new(&[0b0101_1000_0000_0000]);
        assert_eq!(tree.decode(&mut bits).unwrap(), 0);
        assert_eq!(tree.decode(&mut bits).unwrap(), 1);
        assert_eq!(tree.decode(&mut bits).unwrap(), -1);
    }

    #[test]
    fn verify_malformed_rows_are_rejected() {
        let path = temp_file("malformed", "pmt abc 3\n");
        assert!(load_sensor_table(&path).is_err());
        std::fs::remove_file(&path).ok();
    }
}
