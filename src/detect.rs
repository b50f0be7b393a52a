//! Encoding detection over a bounded byte sample.
//!
//! A detector proposes a single best guess with a confidence score. The guess
//! is advisory: the decoder treats it as one more candidate, and an absent
//! guess simply means only the fallback list is tried.

use encoding_rs::{EUC_JP, Encoding, ISO_2022_JP, SHIFT_JIS, UTF_8, UTF_16BE, UTF_16LE};
use serde::Serialize;

/// Confidence ceiling for guesses backed only by script statistics.
const LEGACY_CONFIDENCE_CEILING: f64 = 0.95;
const UTF8_CONFIDENCE: f64 = 0.99;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodingGuess {
    pub name: String,
    pub confidence: f64,
}

impl EncodingGuess {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

pub trait EncodingDetector {
    /// Best guess for `sample`, or `None` when nothing plausible can be said.
    /// Must not panic for any input, including an empty slice.
    fn detect(&self, sample: &[u8]) -> Option<EncodingGuess>;
}

/// Detector used when detection is switched off; every file goes straight to
/// the fallback list.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDetector;

impl EncodingDetector for UnavailableDetector {
    fn detect(&self, _sample: &[u8]) -> Option<EncodingGuess> {
        None
    }
}

/// BOM sniffing, UTF-8 validation, then Japanese legacy encodings scored by
/// how much of the decoded non-ASCII text is Japanese script.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicDetector;

impl EncodingDetector for HeuristicDetector {
    fn detect(&self, sample: &[u8]) -> Option<EncodingGuess> {
        if sample.is_empty() {
            return None;
        }
        if let Some((encoding, _)) = Encoding::for_bom(sample) {
            let name = if encoding == UTF_8 {
                "utf-8-sig"
            } else if encoding == UTF_16LE {
                "utf-16le"
            } else {
                debug_assert_eq!(encoding, UTF_16BE);
                "utf-16be"
            };
            return Some(EncodingGuess::new(name, 1.0));
        }
        if sample.is_ascii() {
            if contains_iso2022_escape(sample) {
                return score_legacy(sample, "iso-2022-jp", ISO_2022_JP)
                    .map(|share| EncodingGuess::new("iso-2022-jp", scale(share)));
            }
            return Some(EncodingGuess::new("ascii", 1.0));
        }
        if is_utf8_allowing_truncation(sample) {
            return Some(EncodingGuess::new("utf-8", UTF8_CONFIDENCE));
        }

        let mut best: Option<(&str, f64)> = None;
        for (name, encoding) in [("euc-jp", EUC_JP), ("shift_jis", SHIFT_JIS)] {
            if let Some(share) = score_legacy(sample, name, encoding) {
                if best.is_none_or(|(_, top)| share > top) {
                    best = Some((name, share));
                }
            }
        }
        best.filter(|(_, share)| *share > 0.0)
            .map(|(name, share)| EncodingGuess::new(name, scale(share)))
    }
}

fn scale(share: f64) -> f64 {
    (share * LEGACY_CONFIDENCE_CEILING).clamp(0.0, LEGACY_CONFIDENCE_CEILING)
}

fn contains_iso2022_escape(sample: &[u8]) -> bool {
    sample
        .windows(3)
        .any(|w| matches!(w, [0x1b, b'$', b'B'] | [0x1b, b'$', b'@'] | [0x1b, b'(', b'J']))
}

// The sample may cut a multi-byte sequence in half; only the final sequence
// is allowed to be incomplete.
fn is_utf8_allowing_truncation(sample: &[u8]) -> bool {
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none() && sample.len() - err.valid_up_to() < 4,
    }
}

/// Share of decoded non-ASCII characters that are Japanese script, or `None`
/// when the sample is not valid in `encoding` (after allowing a truncated tail).
fn score_legacy(sample: &[u8], name: &str, encoding: &'static Encoding) -> Option<f64> {
    let text = (0..=2usize)
        .filter(|trim| *trim < sample.len())
        .find_map(|trim| {
            encoding
                .decode_without_bom_handling_and_without_replacement(&sample[..sample.len() - trim])
        })?;
    let (japanese, non_ascii) = text
        .chars()
        .filter(|ch| !ch.is_ascii())
        .fold((0usize, 0usize), |(jp, total), ch| {
            (jp + usize::from(is_japanese(ch)), total + 1)
        });
    if non_ascii == 0 {
        return None;
    }
    let share = japanese as f64 / non_ascii as f64;
    log::trace!("{name}: {japanese}/{non_ascii} Japanese characters");
    Some(share)
}

fn is_japanese(ch: char) -> bool {
    matches!(ch as u32,
        0x3000..=0x303F   // CJK symbols and punctuation
        | 0x3040..=0x309F // hiragana
        | 0x30A0..=0x30FF // katakana
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF // CJK unified ideographs
        | 0xFF01..=0xFF60) // full-width forms (half-width katakana excluded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(bytes: &[u8]) -> Option<EncodingGuess> {
        HeuristicDetector.detect(bytes)
    }

    #[test]
    fn empty_sample_is_absent() {
        assert_eq!(detect(b""), None);
    }

    #[test]
    fn bom_wins_with_full_confidence() {
        let guess = detect(b"\xEF\xBB\xBFid\tname\n").expect("guess");
        assert_eq!(guess.name, "utf-8-sig");
        assert_eq!(guess.confidence, 1.0);
        assert_eq!(detect(b"\xFF\xFEi\0d\0").unwrap().name, "utf-16le");
    }

    #[test]
    fn plain_ascii_and_utf8() {
        assert_eq!(detect(b"id,name\n1,a\n").unwrap().name, "ascii");
        let guess = detect("品名,数量\n".as_bytes()).unwrap();
        assert_eq!(guess.name, "utf-8");
        assert!(guess.confidence > 0.9);
    }

    #[test]
    fn truncated_utf8_tail_is_still_utf8() {
        let bytes = "数量".as_bytes();
        assert_eq!(detect(&bytes[..bytes.len() - 1]).unwrap().name, "utf-8");
    }

    #[test]
    fn shift_jis_text_is_recognised() {
        let (encoded, _, _) = SHIFT_JIS.encode("品目コード,工場,数量\n部品名称,東京,十\n");
        let guess = detect(&encoded).expect("guess");
        assert_eq!(guess.name, "shift_jis");
        assert!(guess.confidence > 0.7, "{guess:?}");
        assert!(guess.confidence <= LEGACY_CONFIDENCE_CEILING);
    }

    #[test]
    fn iso_2022_jp_needs_escape_sequences() {
        let (encoded, _, _) = ISO_2022_JP.encode("日本語のテキスト\n");
        assert_eq!(detect(&encoded).unwrap().name, "iso-2022-jp");
    }

    #[test]
    fn unavailable_detector_is_always_absent() {
        assert_eq!(UnavailableDetector.detect(b"\xEF\xBB\xBFid"), None);
    }
}
