//! Text extraction from uploaded transcripts.
//!
//! Plain text gets best-effort decoding: BOM handling, UTF-16 detection,
//! lossy UTF-8 and repair of the usual UTF-8-read-as-Windows-1252 mojibake.
//! Word documents are read with `docx-rs`, one line per non-empty paragraph.

use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use tracing::warn;

use crate::errors::AppError;
use crate::models::transcript::TranscriptKind;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Mojibake sequences and their intended characters, longest first so that
/// `â€` prefixes are only used as a last resort.
const MOJIBAKE: &[(&str, &str)] = &[
    ("â™ª", "♪"),
    ("â€™", "’"),
    ("â€˜", "‘"),
    ("â€œ", "“"),
    ("â€\u{9d}", "”"),
    ("â€”", "—"),
    ("â€“", "–"),
    ("â€¦", "…"),
    ("â€¢", "•"),
    ("Ã©", "é"),
    ("Ã¨", "è"),
    ("Ã±", "ñ"),
    ("Ã¼", "ü"),
    ("Ã¶", "ö"),
    ("Ã¡", "á"),
    ("Ã³", "ó"),
    ("Ã\u{AD}", "í"),
    ("Â\u{a0}", " "),
    ("â€", "”"),
];

pub fn extract_text(kind: TranscriptKind, bytes: &[u8]) -> Result<String, AppError> {
    match kind {
        TranscriptKind::PlainText => Ok(decode_text(bytes)),
        TranscriptKind::Word => extract_docx_text(bytes),
    }
}

/// Decodes a plain-text transcript, never failing.
pub fn decode_text(bytes: &[u8]) -> String {
    let decoded = if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        String::from_utf8_lossy(rest).into_owned()
    } else if let Some(rest) = bytes.strip_prefix(UTF16_LE_BOM) {
        decode_utf16(rest, u16::from_le_bytes)
    } else if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
        decode_utf16(rest, u16::from_be_bytes)
    } else {
        match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(e) => {
                warn!("Transcript is not valid UTF-8 (at byte {}); decoding lossily", e.valid_up_to());
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    };

    repair_mojibake(&decoded).replace("\r\n", "\n").replace('\r', "\n")
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

pub fn repair_mojibake(text: &str) -> String {
    if !text.contains('â') && !text.contains('Ã') && !text.contains('Â') {
        return text.to_string();
    }
    MOJIBAKE
        .iter()
        .fold(text.to_string(), |acc, (bad, good)| acc.replace(bad, good))
}

/// Paragraph text of a `.docx` package, newline separated, empty paragraphs skipped.
pub fn extract_docx_text(bytes: &[u8]) -> Result<String, AppError> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|e| AppError::Validation(format!("Error reading Word document: {e}")))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(paragraph) => Some(
                paragraph
                    .children
                    .iter()
                    .filter_map(|c| match c {
                        ParagraphChild::Run(run) => Some(run_text(&run.children)),
                        _ => None,
                    })
                    .collect::<String>(),
            ),
            _ => None,
        })
        .filter(|text| !text.trim().is_empty())
        .collect();

    Ok(paragraphs.join("\n"))
}

fn run_text(children: &[RunChild]) -> String {
    children
        .iter()
        .filter_map(|c| match c {
            RunChild::Text(text) => Some(text.text.as_str()),
            RunChild::Tab(_) => Some("\t"),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Paragraph, Run};
    use std::io::Cursor;

    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let docx = paragraphs.iter().fold(Docx::new(), |d, p| {
            d.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*p)))
        });
        let mut buf = Cursor::new(Vec::new());
        docx.build().pack(&mut buf).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_plain_utf8() {
        assert_eq!(decode_text("SPEAKER A: Hello.".as_bytes()), "SPEAKER A: Hello.");
    }

    #[test]
    fn test_bom_and_crlf() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"line one\r\nline two\r\n");
        assert_eq!(decode_text(&bytes), "line one\nline two\n");
    }

    #[test]
    fn test_utf16_le() {
        let mut bytes = UTF16_LE_BOM.to_vec();
        for unit in "Amen ♪".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&bytes), "Amen ♪");
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let text = decode_text(&[b'h', b'i', 0xFF, b'!']);
        assert!(text.starts_with("hi"));
        assert!(text.ends_with('!'));
    }

    #[test]
    fn test_mojibake_repair() {
        assert_eq!(repair_mojibake("â™ª Give me Jesus â™ª"), "♪ Give me Jesus ♪");
        assert_eq!(repair_mojibake("Itâ€™s CafÃ© time"), "It’s Café time");
        assert_eq!(repair_mojibake("â€œQuoteâ€\u{9d}"), "“Quote”");
        assert_eq!(repair_mojibake("clean text"), "clean text");
    }

    #[test]
    fn test_docx_extraction_skips_empty_paragraphs() {
        let bytes = docx_bytes(&["First paragraph", "", "Second paragraph"]);
        assert_eq!(
            extract_docx_text(&bytes).unwrap(),
            "First paragraph\nSecond paragraph"
        );
    }

    #[test]
    fn test_corrupt_docx_is_validation_error() {
        let err = extract_text(TranscriptKind::Word, b"definitely not a zip").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
