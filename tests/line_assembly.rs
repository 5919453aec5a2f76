// tests/line_assembly.rs

use proptest::prelude::*;
use sysmaint::exec::{CarriageReturnPolicy, Encoding, LineAssembler, LineShaper};

/// Split `text` at the given (sorted, deduplicated) byte offsets.
fn split_at_points(text: &str, mut points: Vec<usize>) -> Vec<&str> {
    points.sort_unstable();
    points.dedup();
    let mut chunks = Vec::new();
    let mut start = 0;
    for p in points {
        if p > start && p < text.len() && text.is_char_boundary(p) {
            chunks.push(&text[start..p]);
            start = p;
        }
    }
    chunks.push(&text[start..]);
    chunks
}

proptest! {
    #[test]
    fn assembler_reassembles_lines_across_any_chunking(
        lines in proptest::collection::vec("[a-z %\r]{0,10}", 0..12),
        trailing_newline in any::<bool>(),
        cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..6),
    ) {
        let mut text: String = lines.iter().map(|l| format!("{l}\n")).collect();
        if !trailing_newline && !text.is_empty() {
            text.pop();
        }

        let mut expected = lines.clone();
        if !trailing_newline && expected.last().is_some_and(|l| l.is_empty()) {
            expected.pop();
        }

        let points = cuts.iter().map(|i| i.index(text.len() + 1)).collect();
        let mut assembler = LineAssembler::new();
        let mut got = Vec::new();
        for chunk in split_at_points(&text, points) {
            got.extend(assembler.push(chunk));
        }
        got.extend(assembler.finish());

        prop_assert_eq!(got, expected);
        prop_assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn utf16le_decoding_is_independent_of_chunking(
        text in "\\PC{0,40}",
        cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..6),
    ) {
        prop_assume!(!text.starts_with('\u{feff}'));
        let bytes: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();

        let mut points: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len() + 1)).collect();
        points.sort_unstable();
        points.dedup();

        let mut decoder = Encoding::Utf16Le.decoder();
        let mut got = String::new();
        let mut start = 0;
        for p in points {
            got.push_str(&decoder.decode(&bytes[start..p]));
            start = p;
        }
        got.push_str(&decoder.decode(&bytes[start..]));
        got.push_str(&decoder.finish());

        prop_assert_eq!(got, text);
    }

    #[test]
    fn utf8_decoding_is_independent_of_chunking(
        text in "\\PC{0,40}",
        cut in any::<prop::sample::Index>(),
    ) {
        prop_assume!(!text.starts_with('\u{feff}'));
        let bytes = text.as_bytes();
        let p = cut.index(bytes.len() + 1);

        let mut decoder = Encoding::Utf8.decoder();
        let mut got = decoder.decode(&bytes[..p]);
        got.push_str(&decoder.decode(&bytes[p..]));
        got.push_str(&decoder.finish());

        prop_assert_eq!(got, text);
    }
}

#[test]
fn bom_is_stripped_once_and_not_duplicated() {
    let mut decoder = Encoding::Utf16Le.decoder();
    let first = decoder.decode(&[0xFF]);
    let second = decoder.decode(&[0xFE, b'h', 0x00, b'i', 0x00]);
    assert_eq!(format!("{first}{second}{}", decoder.finish()), "hi");
}

#[test]
fn utf16be_is_supported() {
    let mut decoder = Encoding::Utf16Be.decoder();
    let text = decoder.decode(&[0xFE, 0xFF, 0x00, b'o', 0x00, b'k']);
    assert_eq!(format!("{text}{}", decoder.finish()), "ok");
}

#[test]
fn dangling_half_code_unit_becomes_replacement_char() {
    let mut decoder = Encoding::Utf16Le.decoder();
    let text = decoder.decode(&[b'a', 0x00, b'b']);
    assert_eq!(text, "a");
    assert_eq!(decoder.finish(), "\u{fffd}");
}

#[test]
fn encoding_names_parse_leniently_and_reject_unknowns() {
    assert_eq!("utf-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
    assert_eq!("UTF16LE".parse::<Encoding>().unwrap(), Encoding::Utf16Le);
    assert_eq!("utf_16_be".parse::<Encoding>().unwrap(), Encoding::Utf16Be);

    let err = "latin1".parse::<Encoding>().unwrap_err();
    assert!(err.to_string().contains("latin1"));
}

#[test]
fn shaper_splits_carriage_return_frames() {
    let shaper = LineShaper::new(CarriageReturnPolicy::Split, None);
    assert_eq!(
        shaper.shape("  10%\r 50% \r\r100%  "),
        vec!["10%", "50%", "100%"]
    );

    let last = LineShaper::new(CarriageReturnPolicy::Last, None);
    assert_eq!(last.shape("10%\r50%\r100%\r  "), vec!["100%"]);
    assert!(last.shape(" \r \r").is_empty());
}

#[test]
fn shaper_tags_every_frame() {
    let shaper = LineShaper::new(
        CarriageReturnPolicy::Split,
        Some("User(tag=\"alice\")".to_string()),
    );
    assert_eq!(
        shaper.shape("a\rb"),
        vec!["User(tag=\"alice\") a", "User(tag=\"alice\") b"]
    );
}

#[test]
fn shaper_filters_noise_per_frame() {
    let shaper = LineShaper::default();
    let raw = "WARNING: apt does not have a stable CLI interface. Use with caution in scripts.\rReading package lists...";
    assert_eq!(shaper.shape(raw), vec!["Reading package lists..."]);
}

#[test]
fn carriage_return_policy_parses_from_text() {
    assert_eq!("split".parse::<CarriageReturnPolicy>(), Ok(CarriageReturnPolicy::Split));
    assert_eq!(" LAST ".parse::<CarriageReturnPolicy>(), Ok(CarriageReturnPolicy::Last));
    assert!("collapse".parse::<CarriageReturnPolicy>().is_err());
}
