// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The common card header found at the start of every FEC payload.

use xenon_core::errors::{event_error, Result};
use xenon_core::io::WordReader;

use crate::Firmware;

/// The number of 16-bit words in a card header.
pub const CARD_HEADER_WORDS: usize = 10;

/// Format-word flag bits.
const FMT_ZERO_SUPPRESSED: u16 = 0x0100;
const FMT_COMPRESSED: u16 = 0x0200;
const FMT_DUAL_MODE: u16 = 0x0400;

/// The per-card acquisition context read from the first [`CARD_HEADER_WORDS`] words of a FEC
/// payload. All per-event time alignment derives from the `ft`/`ft_hm` counters recorded here.
#[derive(Clone, Debug)]
pub struct CardHeader {
    /// Firmware generation, decoded from the low bits of the format word.
    pub fw: Firmware,
    /// The payload only carries slices that passed zero suppression.
    pub zero_suppressed: bool,
    /// The payload samples are Huffman-compressed deltas.
    pub compressed: bool,
    /// The card interleaves baseline-restored mirror channels with the raw channels.
    pub dual_mode: bool,
    /// The front-end card id.
    pub fec_id: u16,
    /// The number of physical channels the card serves.
    pub n_channels: usize,
    /// Card-level channel mask over the physical channels.
    pub channel_mask: u16,
    /// The number of samples in the event buffer section.
    pub buffer_samples: usize,
    /// The number of pre-trigger samples.
    pub pre_trg_samples: usize,
    /// The card's ring-buffer index when the trigger fired.
    pub ft: u16,
    /// The half-MHz coarse counter paired with `ft`.
    pub ft_hm: u16,
    /// The card's running trigger counter.
    pub trigger_counter: u32,
}

impl CardHeader {
    /// Parse a card header from the head of a FEC payload.
    pub fn parse(words: &mut WordReader<'_>) -> Result<Self> {
        let format = words.next_word()?;

        let fw = Firmware::from_code(format & 0x003f)?;
        let zero_suppressed = format & FMT_ZERO_SUPPRESSED != 0;
        let compressed = format & FMT_COMPRESSED != 0;
        let dual_mode = format & FMT_DUAL_MODE != 0;

        let fec_id = words.next_word()?;
        let n_channels = usize::from(words.next_word()?);
        let channel_mask = words.next_word()?;
        let buffer_samples = usize::from(words.next_word()?);
        let pre_trg_samples = usize::from(words.next_word()?);
        let ft = words.next_word()?;
        let ft_hm = words.next_word()?;

        let trigger_counter =
            (u32::from(words.next_word()?) << 16) | u32::from(words.next_word()?);

        if n_channels > 64 {
            return event_error("fec: card claims more channels than any front-end has");
        }

        if n_channels < 16 && (channel_mask >> n_channels) != 0 {
            return event_error("fec: channel mask implies more channels than the card has");
        }

        Ok(CardHeader {
            fw,
            zero_suppressed,
            compressed,
            dual_mode,
            fec_id,
            n_channels,
            channel_mask,
            buffer_samples,
            pre_trg_samples,
            ft,
            ft_hm,
            trigger_counter,
        })
    }
}

/// Build a card header word sequence. Test support for this crate's decoder tests.
#[cfg(test)]
#[allow(clippy::too_many_arguments)]
pub(crate) fn header_words(
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
        format |= FMT_ZERO_SUPPRESSED;
    }
    if compressed {
        format |= FMT_COMPRESSED;
    }
    if dual {
        format |= FMT_DUAL_MODE;
    }

    vec![format, fec_id, n_channels, channel_mask, buffer_samples, pre_trg_samples, ft, 0, 0, 1]
}

#[cfg(test)]
mod tests {
    use super::{header_words, CardHeader, CARD_HEADER_WORDS};
    use crate::Firmware;
    use xenon_core::io::WordReader;

    #[test]
    fn verify_card_header_parse() {
        let words = header_words(9, true, true, false, 11, 12, 0x0fff, 3200, 800, 40000);
        let mut reader = WordReader::new(&words);

        let card = CardHeader::parse(&mut reader).unwrap();

        assert_eq!(reader.pos(), CARD_HEADER_WORDS);
        assert_eq!(card.fw, Firmware::India);
        assert!(card.zero_suppressed);
        assert!(card.compressed);
        assert!(!card.dual_mode);
        assert_eq!(card.fec_id, 11);
        assert_eq!(card.n_channels, 12);
        assert_eq!(card.buffer_samples, 3200);
        assert_eq!(card.pre_trg_samples, 800);
        assert_eq!(card.ft, 40000);
        assert_eq!(card.trigger_counter, 1);
    }

    #[test]
    fn verify_card_header_rejects_wide_mask() {
        // 8-channel card with bit 8 set in the mask.
        let words = header_words(8, false, false, false, 2, 8, 0x0101, 4, 0, 0);
        let mut reader = WordReader::new(&words);

        let err = CardHeader::parse(&mut reader).unwrap_err();
        assert!(err.is_event_error());
    }

    #[test]
    fn verify_card_header_rejects_unknown_firmware() {
        let words = header_words(3, false, false, false, 0, 8, 0, 4, 0, 0);
        let mut reader = WordReader::new(&words);

        assert!(CardHeader::parse(&mut reader).is_err());
    }
}
