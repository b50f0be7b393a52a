use encoding_rs::{EUC_JP, SHIFT_JIS};
use proptest::prelude::*;
use tabload::{
    decode::{SearchOutcome, attempt_candidate, first_success},
    detect::{EncodingDetector, HeuristicDetector},
    io_utils::FileKind,
};

#[test]
fn euc_jp_sample_prefers_euc_jp() {
    let (encoded, _, _) = EUC_JP.encode("品目コード\t工場名\n部品\t東京工場\n");
    let guess = HeuristicDetector.detect(&encoded).expect("guess");
    assert_eq!(guess.name, "euc-jp");
}

#[test]
fn utf16_bom_is_reported_even_with_odd_payload() {
    let guess = HeuristicDetector.detect(&[0xFF, 0xFE, 0xFF, 0xFF, 0x00]);
    assert_eq!(guess.map(|g| g.name).as_deref(), Some("utf-16le"));
}

#[test]
fn undecodable_bytes_give_no_guess() {
    assert!(HeuristicDetector.detect(&[0xFF; 64]).is_none());
}

#[test]
fn detector_guess_decodes_the_same_bytes() {
    let (encoded, _, _) = SHIFT_JIS.encode("品名,数量\nボルト,4\n");
    let guess = HeuristicDetector.detect(&encoded).expect("guess");
    let table =
        attempt_candidate(&encoded, FileKind::CommaSeparated, &guess.name).expect("parse");
    assert_eq!(table.columns(), ["品名", "数量"]);
}

proptest! {
    #[test]
    fn detector_never_panics_and_bounds_confidence(
        bytes in proptest::collection::vec(any::<u8>(), 0..2048)
    ) {
        if let Some(guess) = HeuristicDetector.detect(&bytes) {
            prop_assert!((0.0..=1.0).contains(&guess.confidence));
            prop_assert!(!guess.name.is_empty());
        }
    }

    #[test]
    fn repeated_byte_samples_are_handled(byte in any::<u8>(), len in 0usize..4096) {
        let bytes = vec![byte; len];
        let _ = HeuristicDetector.detect(&bytes);
        let candidates = ["utf-8-sig", "utf-8", "shift_jis", "euc-jp", "cp932", "iso-2022-jp"];
        let mut attempted = 0;
        let outcome = first_success(candidates, |c| {
            attempted += 1;
            attempt_candidate(&bytes, FileKind::DelimitedText, c)
        });
        match outcome {
            SearchOutcome::Found { failures, .. } => {
                prop_assert_eq!(attempted, failures.len() + 1);
            }
            SearchOutcome::Exhausted(failures) => {
                prop_assert_eq!(attempted, candidates.len());
                prop_assert_eq!(failures.len(), candidates.len());
            }
        }
    }
}
