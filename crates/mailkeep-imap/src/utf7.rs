//! Modified UTF-7 mailbox name codec (RFC 3501 §5.1.3).
//!
//! Printable ASCII passes through unchanged, `&` is written as `&-`, and
//! every other run of characters is shifted into `&<base64 of UTF-16BE>-`
//! using `,` in place of `/`.

use base64::Engine;
use base64::alphabet::IMAP_MUTF7;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::{Error, Result};

const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &IMAP_MUTF7,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

/// Encodes a display name into its modified UTF-7 wire form.
#[must_use]
pub fn encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut shifted: Vec<u16> = Vec::new();

    for c in name.chars() {
        if (' '..='~').contains(&c) {
            flush_shifted(&mut out, &mut shifted);
            if c == '&' {
                out.push_str("&-");
            } else {
                out.push(c);
            }
        } else {
            let mut units = [0u16; 2];
            shifted.extend_from_slice(c.encode_utf16(&mut units));
        }
    }
    flush_shifted(&mut out, &mut shifted);

    out
}

fn flush_shifted(out: &mut String, shifted: &mut Vec<u16>) {
    if shifted.is_empty() {
        return;
    }
    let bytes: Vec<u8> = shifted.iter().flat_map(|unit| unit.to_be_bytes()).collect();
    out.push('&');
    out.push_str(&ENGINE.encode(bytes));
    out.push('-');
    shifted.clear();
}

/// Decodes a modified UTF-7 wire name into display form.
///
/// # Errors
///
/// Returns [`Error::MailboxEncoding`] for an unterminated shift sequence,
/// invalid base64, or a payload that is not well-formed UTF-16.
pub fn decode(name: &str) -> Result<String> {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let shifted = &rest[start + 1..];
        let end = shifted
            .find('-')
            .ok_or_else(|| Error::MailboxEncoding(format!("unterminated shift in {name:?}")))?;

        let payload = &shifted[..end];
        if payload.is_empty() {
            out.push('&');
        } else {
            out.push_str(&decode_payload(payload)?);
        }
        rest = &shifted[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

fn decode_payload(payload: &str) -> Result<String> {
    let bytes = ENGINE
        .decode(payload)
        .map_err(|e| Error::MailboxEncoding(format!("{payload:?}: {e}")))?;
    if bytes.len() % 2 != 0 {
        return Err(Error::MailboxEncoding(format!(
            "{payload:?}: odd UTF-16 byte count"
        )));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| Error::MailboxEncoding(format!("{payload:?}: {e}")))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_plain_ascii_unchanged() {
        assert_eq!(encode("[Gmail]/All Mail"), "[Gmail]/All Mail");
        assert_eq!(decode("[Gmail]/All Mail").unwrap(), "[Gmail]/All Mail");
    }

    #[test]
    fn test_ampersand() {
        assert_eq!(encode("Q&A"), "Q&-A");
        assert_eq!(decode("Q&-A").unwrap(), "Q&A");
    }

    #[test]
    fn test_known_names() {
        let cases = [
            ("Wysłane", "Wys&AUI-ane"),
            ("Entwürfe", "Entw&APw-rfe"),
            ("すべてのメール", "&MFkweTBmMG4w4TD8MOs-"),
            ("ゴミ箱", "&MLQw33ux-"),
            ("Корзина", "&BBoEPgRABDcEOAQ9BDA-"),
            ("受信トレイ/日本", "&U9dP4TDIMOwwpA-/&ZeVnLA-"),
        ];
        for (display, wire) in cases {
            assert_eq!(encode(display), wire, "encoding {display}");
            assert_eq!(decode(wire).unwrap(), display, "decoding {wire}");
        }
    }

    #[test]
    fn test_unterminated_shift() {
        assert!(matches!(
            decode("Bad&AUI"),
            Err(Error::MailboxEncoding(_))
        ));
    }

    #[test]
    fn test_odd_payload_rejected() {
        // "AQ" decodes to a single byte
        assert!(decode("&AQ-").is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip(name in "\\PC{0,24}") {
            prop_assert_eq!(decode(&encode(&name)).unwrap(), name);
        }

        #[test]
        fn prop_encoded_is_ascii(name in "\\PC{0,24}") {
            prop_assert!(encode(&name).is_ascii());
        }
    }
}
