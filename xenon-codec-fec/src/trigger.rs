// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Trigger equipment decoder.
//!
//! The trigger payload is a flat record sequence: a type word, the fired-channel mask words,
//! then fixed-width `(name, value)` configuration entries. An empty payload is legal and yields
//! an empty trigger report.

use log::warn;

use xenon_core::errors::{event_error, Result};
use xenon_core::io::WordReader;

/// Number of fired-channel mask words; bit `b` of word `w` is trigger channel `16 * w + b`.
pub const TRIGGER_MASK_WORDS: usize = 3;

/// Words per configuration entry: an 8-character ASCII name then a 32-bit value.
const CONFIG_NAME_WORDS: usize = 4;
const CONFIG_ENTRY_WORDS: usize = CONFIG_NAME_WORDS + 2;

/// The decoded trigger report of one event.
#[derive(Clone, Debug)]
pub struct TriggerInfo {
    /// The trigger type, -1 when no trigger equipment was present.
    pub trigger_type: i32,
    /// The trigger channels that fired, in ascending order.
    pub fired_channels: Vec<i32>,
    /// Configuration entries reported alongside the trigger.
    pub config: Vec<(String, i32)>,
}

impl Default for TriggerInfo {
    fn default() -> Self {
        TriggerInfo { trigger_type: -1, fired_channels: Vec::new(), config: Vec::new() }
    }
}

/// Decode one trigger equipment payload.
pub fn decode_trigger(words: &mut WordReader<'_>) -> Result<TriggerInfo> {
    if words.remaining() == 0 {
        return Ok(Default::default());
    }

    let trigger_type = i32::from(words.next_word()?);

    if words.remaining() < TRIGGER_MASK_WORDS {
        return event_error("trigger: truncated fired-channel mask");
    }

    let mut fired_channels = Vec::new();

    for word in 0..TRIGGER_MASK_WORDS {
        let mask = words.next_word()?;

        for bit in 0..16 {
            if mask >> bit & 1 == 1 {
                fired_channels.push((16 * word + bit) as i32);
            }
        }
    }

    let mut config = Vec::new();

    while words.remaining() >= CONFIG_ENTRY_WORDS {
        let mut name = String::with_capacity(2 * CONFIG_NAME_WORDS);

        for &word in words.take(CONFIG_NAME_WORDS)? {
            for byte in word.to_be_bytes() {
                if byte != 0 {
                    name.push(char::from(byte));
                }
            }
        }

        let value =
            ((u32::from(words.next_word()?) << 16) | u32::from(words.next_word()?)) as i32;

        config.push((name, value));
    }

    if words.remaining() > 0 {
        warn!("trigger: {} trailing words ignored", words.remaining());
    }

    Ok(TriggerInfo { trigger_type, fired_channels, config })
}

#[cfg(test)]
mod tests {
    use super::{decode_trigger, TriggerInfo};
    use xenon_core::io::WordReader;

    fn config_words(name: &str, value: i32) -> Vec<u16> {
        let mut bytes = name.as_bytes().to_vec();
        bytes.resize(8, 0);

        let mut words: Vec<u16> =
            bytes.chunks(2).map(|c| (u16::from(c[0]) << 8) | u16::from(c[1])).collect();

        words.push((value >> 16) as u16);
        words.push((value & 0xffff) as u16);
        words
    }

    #[test]
    fn verify_trigger_decode() {
        // Type 7, fired channels {0, 3, 17}, two configuration entries.
        let mut words: Vec<u16> = vec![7, 0x0009, 0x0002, 0x0000];
        words.extend(config_words("PERIOD", 1000));
        words.extend(config_words("WIDTH", 50));

        let info = decode_trigger(&mut WordReader::new(&words)).unwrap();

        assert_eq!(info.trigger_type, 7);
        assert_eq!(info.fired_channels, vec![0, 3, 17]);
        assert_eq!(
            info.config,
            vec![("PERIOD".to_string(), 1000), ("WIDTH".to_string(), 50)]
        );
    }

    #[test]
    fn verify_empty_trigger_payload() {
        let info = decode_trigger(&mut WordReader::new(&[])).unwrap();

        assert_eq!(info.trigger_type, -1);
        assert!(info.fired_channels.is_empty());
        assert!(info.config.is_empty());

        // Default is the no-trigger report.
        let default: TriggerInfo = Default::default();
        assert_eq!(default.trigger_type, -1);
    }

    #[test]
    fn verify_truncated_mask_is_event_error() {
        let words: Vec<u16> = vec![7, 0x0001];

        assert!(decode_trigger(&mut WordReader::new(&words)).unwrap_err().is_event_error());
    }

    #[test]
    fn verify_negative_config_value() {
        let mut words: Vec<u16> = vec![1, 0, 0, 0];
        words.extend(config_words("OFFSET", -25));

        let info = decode_trigger(&mut WordReader::new(&words)).unwrap();

        assert_eq!(info.config, vec![("OFFSET".to_string(), -25)]);
    }
}
