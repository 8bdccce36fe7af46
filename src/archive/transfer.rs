use base64::Engine;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::{DecodePaddingMode, general_purpose};

use crate::observer::{DecodeFallback, ExtractEvent, ExtractObserver};

const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Declared `Content-Transfer-Encoding` of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    QuotedPrintable,
    Base64,
    /// `7bit`, `8bit`, `binary`, or anything unrecognised.
    Identity,
}

impl TransferEncoding {
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("quoted-printable") => TransferEncoding::QuotedPrintable,
            Some("base64") => TransferEncoding::Base64,
            _ => TransferEncoding::Identity,
        }
    }
}

/// How the archive bytes were turned into text before splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    /// Every char is a single byte (U+0000..=U+00FF).
    Latin1,
}

/// Reverses the transfer encoding of `body`. Never fails.
pub fn decode_body(
    body: &str,
    encoding: TransferEncoding,
    source: SourceEncoding,
    observer: &dyn ExtractObserver,
) -> Vec<u8> {
    match encoding {
        TransferEncoding::QuotedPrintable => decode_quoted_printable(&source_bytes(body, source)),
        TransferEncoding::Base64 => match decode_base64(body) {
            Some(bytes) => bytes,
            None => {
                observer.on_event(&ExtractEvent::DecodeFallback {
                    charset: "base64".to_string(),
                    fallback: DecodeFallback::RawBase64,
                });
                source_bytes(body, source)
            }
        },
        TransferEncoding::Identity => source_bytes(body, source),
    }
}

fn source_bytes(body: &str, source: SourceEncoding) -> Vec<u8> {
    match source {
        SourceEncoding::Utf8 => body.as_bytes().to_vec(),
        SourceEncoding::Latin1 => body.chars().map(|c| c as u32 as u8).collect(),
    }
}

/// Lenient quoted-printable decoding.
///
/// `=XX` becomes one byte, `=` before a line break is a soft break and is
/// dropped together with the break, and any other `=` is kept literally.
pub fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];
        if byte != b'=' {
            out.push(byte);
            i += 1;
            continue;
        }

        let rest = &input[i + 1..];
        match rest {
            [] => i += 1,
            [b'\r', b'\n', ..] => i += 3,
            [b'\n', ..] => i += 2,
            [hi, lo, ..] if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                out.push(hex_value(*hi) << 4 | hex_value(*lo));
                i += 3;
            }
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    out
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        b'A'..=b'F' => digit - b'A' + 10,
        _ => 0,
    }
}

/// Decodes a base64 body, ignoring line breaks and missing padding.
pub fn decode_base64(body: &str) -> Option<Vec<u8>> {
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    general_purpose::STANDARD
        .decode(&compact)
        .or_else(|_| LENIENT_BASE64.decode(compact.trim_end_matches('=')))
        .ok()
}

/// Turns decoded bytes into text using the declared charset.
///
/// Fallback chain: strict decode with the declared charset, then a loose
/// decode (lossy UTF-8 for UTF-8 labels), then Latin-1, which always succeeds.
pub fn decode_charset(
    bytes: Vec<u8>,
    charset: Option<&str>,
    observer: &dyn ExtractObserver,
) -> String {
    let label = charset
        .map(|c| c.trim().trim_matches('"').to_ascii_lowercase())
        .unwrap_or_default();

    match Charset::from_label(&label) {
        Charset::Latin1 => latin1(&bytes),
        Charset::Windows1252 => windows_1252(&bytes),
        Charset::Utf8 => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                observer.on_event(&ExtractEvent::DecodeFallback {
                    charset: display_label(&label),
                    fallback: DecodeFallback::LossyUtf8,
                });
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        },
        Charset::Unknown => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                observer.on_event(&ExtractEvent::DecodeFallback {
                    charset: display_label(&label),
                    fallback: DecodeFallback::Latin1,
                });
                latin1(err.as_bytes())
            }
        },
    }
}

fn display_label(label: &str) -> String {
    if label.is_empty() {
        "utf-8".to_string()
    } else {
        label.to_string()
    }
}

enum Charset {
    Utf8,
    Latin1,
    Windows1252,
    Unknown,
}

impl Charset {
    fn from_label(label: &str) -> Self {
        match label {
            "" | "utf-8" | "utf8" | "us-ascii" | "ascii" => Charset::Utf8,
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" => Charset::Latin1,
            "windows-1252" | "cp1252" | "x-cp1252" => Charset::Windows1252,
            _ => Charset::Unknown,
        }
    }
}

pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Code points for 0x80..=0x9F in windows-1252; the rest matches Latin-1.
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

fn windows_1252(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(b - 0x80)],
            _ => char::from(b),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use std::cell::RefCell;

    fn encode_quoted_printable(input: &[u8]) -> String {
        let mut out = String::new();
        let mut line_len = 0;
        for &byte in input {
            let piece = if (33..=126).contains(&byte) && byte != b'=' {
                (byte as char).to_string()
            } else {
                format!("={:02X}", byte)
            };
            if line_len + piece.len() > 75 {
                out.push_str("=\r\n");
                line_len = 0;
            }
            line_len += piece.len();
            out.push_str(&piece);
        }
        out
    }

    #[test]
    fn quoted_printable_decodes_utf8_escapes() {
        let decoded = decode_quoted_printable(b"=E4=BD=A0=E5=A5=BD");
        assert_eq!(String::from_utf8(decoded).unwrap(), "你好");

        let decoded = decode_quoted_printable(b"Hello=20World");
        assert_eq!(decoded, b"Hello World");
    }

    #[test]
    fn quoted_printable_soft_breaks_join_lines() {
        assert_eq!(decode_quoted_printable(b"Hel=\r\nlo=\nthere="), b"Hellothere");
    }

    #[test]
    fn quoted_printable_is_lenient_on_malformed_escapes() {
        assert_eq!(decode_quoted_printable(b"a=ZZb"), b"a=ZZb");
        assert_eq!(decode_quoted_printable(b"x = y"), b"x = y");
        assert_eq!(decode_quoted_printable(b"end=4"), b"end=4");
        assert_eq!(decode_quoted_printable(b"lower=e2=80=99"), "lower\u{2019}".as_bytes());
    }

    #[test]
    fn quoted_printable_round_trips_arbitrary_bytes() {
        let original: Vec<u8> = (0..=255u8).chain(b"==\r\n= tail".iter().copied()).collect();
        let encoded = encode_quoted_printable(&original);
        assert_eq!(decode_quoted_printable(encoded.as_bytes()), original);
    }

    #[test]
    fn transfer_encoding_header_is_case_insensitive() {
        assert_eq!(
            TransferEncoding::from_header(Some(" Quoted-Printable ")),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::from_header(Some("BASE64")), TransferEncoding::Base64);
        assert_eq!(TransferEncoding::from_header(Some("8bit")), TransferEncoding::Identity);
        assert_eq!(TransferEncoding::from_header(None), TransferEncoding::Identity);
    }

    #[test]
    fn base64_body_with_line_breaks() {
        let body = "PGRpdj5I\r\naTwvZGl2Pg==\r\n";
        let bytes =
            decode_body(body, TransferEncoding::Base64, SourceEncoding::Utf8, &NoopObserver);
        assert_eq!(bytes, b"<div>Hi</div>");
    }

    #[test]
    fn base64_without_padding_is_accepted() {
        assert_eq!(decode_base64("SGk").unwrap(), b"Hi");
    }

    #[test]
    fn invalid_base64_keeps_raw_bytes_and_reports() {
        let events = RefCell::new(Vec::new());
        let observer = |event: &ExtractEvent| events.borrow_mut().push(event.clone());

        let bytes = decode_body(
            "not base64 !!",
            TransferEncoding::Base64,
            SourceEncoding::Utf8,
            &observer,
        );

        assert_eq!(bytes, b"not base64 !!");
        assert!(matches!(
            events.borrow().as_slice(),
            [ExtractEvent::DecodeFallback { fallback: DecodeFallback::RawBase64, .. }]
        ));
    }

    #[test]
    fn latin1_source_restores_original_bytes() {
        let text = latin1(&[0x63, 0x61, 0x66, 0xE9]);
        let bytes = decode_body(
            &text,
            TransferEncoding::Identity,
            SourceEncoding::Latin1,
            &NoopObserver,
        );
        assert_eq!(bytes, vec![0x63, 0x61, 0x66, 0xE9]);
    }

    #[test]
    fn charset_chain_prefers_declared_single_byte() {
        assert_eq!(
            decode_charset(vec![0x63, 0x61, 0x66, 0xE9], Some("ISO-8859-1"), &NoopObserver),
            "café"
        );
        assert_eq!(
            decode_charset(vec![0x93, 0x68, 0x69, 0x94], Some("windows-1252"), &NoopObserver),
            "\u{201C}hi\u{201D}"
        );
    }

    #[test]
    fn charset_chain_falls_back_without_failing() {
        let events = RefCell::new(Vec::new());
        let observer = |event: &ExtractEvent| events.borrow_mut().push(event.clone());

        let lossy = decode_charset(vec![0x68, 0xFF, 0x69], Some("utf-8"), &observer);
        assert_eq!(lossy, "h\u{FFFD}i");

        let unknown = decode_charset(vec![0xC4, 0xE3], Some("gbk"), &observer);
        assert_eq!(unknown, "Äã");

        let ascii_in_unknown = decode_charset(b"plain".to_vec(), Some("gbk"), &observer);
        assert_eq!(ascii_in_unknown, "plain");

        assert_eq!(
            events.into_inner(),
            vec![
                ExtractEvent::DecodeFallback {
                    charset: "utf-8".to_string(),
                    fallback: DecodeFallback::LossyUtf8,
                },
                ExtractEvent::DecodeFallback {
                    charset: "gbk".to_string(),
                    fallback: DecodeFallback::Latin1,
                },
            ]
        );
    }

    #[test]
    fn missing_charset_defaults_to_utf8() {
        assert_eq!(decode_charset("你好".as_bytes().to_vec(), None, &NoopObserver), "你好");
    }
}
