//! RFC 2047 encoded-word decoding.
//!
//! Header text may embed `=?charset?B?...?=` (base64) and `=?charset?Q?...?=`
//! (quoted-printable-like) words. Charsets are resolved by their WHATWG
//! label; an unknown label is decoded as UTF-8 with replacement characters.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use encoding_rs::Encoding;
use regex::Regex;

use crate::error::{Error, Result};

const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[allow(clippy::expect_used)]
static ENCODED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"=\?([^?\s]+)\?([BbQq])\?([^?\s]*)\?=").expect("valid encoded-word regex")
});

/// Decodes base64 data, ignoring embedded whitespace and missing padding.
///
/// # Errors
///
/// Returns an error if the input is not valid base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    LENIENT_BASE64.decode(cleaned).map_err(Into::into)
}

/// Decodes the Q encoding of RFC 2047 §4.2: `_` is a space, `=XX` a byte.
///
/// # Errors
///
/// Returns [`Error::InvalidEncoding`] for a truncated or non-hex escape.
pub fn decode_q(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'_' => out.push(b' '),
            b'=' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .ok_or_else(|| Error::InvalidEncoding("incomplete escape sequence".into()))?;
                let byte = u8::from_str_radix(hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("invalid hex {hex:?}: {e}")))?;
                out.push(byte);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }

    Ok(out)
}

/// Converts bytes in the named charset to a string.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: &str) -> String {
    // RFC 2231 allows a language suffix: utf-8*en
    let charset = charset.split('*').next().unwrap_or(charset);
    match Encoding::for_label(charset.trim().as_bytes()) {
        Some(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Decodes every encoded word in a header value.
///
/// Whitespace between two adjacent encoded words is dropped, as RFC 2047
/// §6.2 requires; all other text passes through unchanged.
///
/// # Errors
///
/// Returns an error if an encoded word carries invalid base64 or a broken
/// Q escape.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;
    let mut previous_was_word = false;

    for caps in ENCODED_WORD.captures_iter(text) {
        let (Some(whole), Some(charset), Some(kind), Some(payload)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };

        let gap = &text[last_end..whole.start()];
        if !(previous_was_word && gap.trim().is_empty()) {
            out.push_str(gap);
        }

        let bytes = if kind.as_str().eq_ignore_ascii_case("b") {
            decode_base64(payload.as_str())?
        } else {
            decode_q(payload.as_str())?
        };
        out.push_str(&decode_charset(&bytes, charset.as_str()));

        last_end = whole.end();
        previous_was_word = true;
    }
    out.push_str(&text[last_end..]);

    Ok(out)
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
    use super::*;

    #[test]
    fn test_base64_lenient() {
        assert_eq!(decode_base64("SGVs bG8=").unwrap(), b"Hello");
        assert_eq!(decode_base64("SGVsbG8").unwrap(), b"Hello");
        assert!(decode_base64("!!!").is_err());
    }

    #[test]
    fn test_q_decoding() {
        assert_eq!(decode_q("Caf=C3=A9_au_lait").unwrap(), "Café au lait".as_bytes());
        assert!(decode_q("broken=A").is_err());
        assert!(decode_q("broken=ZZ").is_err());
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("50% off =? maybe").unwrap(), "50% off =? maybe");
    }

    #[test]
    fn test_base64_word() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_rfc2047("=?UTF-8?b?SMOpbGxv?=").unwrap(), "Héllo");
    }

    #[test]
    fn test_q_word() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap(), "Héllo");
    }

    #[test]
    fn test_latin1_word() {
        assert_eq!(decode_rfc2047("=?ISO-8859-1?Q?Andr=E9?=").unwrap(), "André");
    }

    #[test]
    fn test_legacy_charsets() {
        assert_eq!(decode_charset(b"\xb1\xea", "ISO-8859-2"), "ąę");
        assert_eq!(decode_charset(b"\xf0\xd2\xc9\xd7\xc5\xd4", "koi8-r"), "Привет");
        assert_eq!(decode_charset(b"\xc4\xe3\xba\xc3", "gb2312"), "你好");
        assert_eq!(decode_charset(b"\x82\xa0", "Shift_JIS"), "あ");
    }

    #[test]
    fn test_windows_1252_is_not_latin1() {
        assert_eq!(decode_charset(b"\x80 5", "windows-1252"), "€ 5");
        assert_eq!(decode_charset(b"\x93hi\x94", "cp1252"), "\u{201c}hi\u{201d}");
    }

    #[test]
    fn test_koi8_word() {
        assert_eq!(decode_rfc2047("=?KOI8-R?B?8NLJ18XU?=").unwrap(), "Привет");
    }

    #[test]
    fn test_adjacent_words_join() {
        let decoded = decode_rfc2047("=?utf-8?Q?Hello?=\r\n =?utf-8?Q?_World?=").unwrap();
        assert_eq!(decoded, "Hello World");
    }

    #[test]
    fn test_mixed_text_and_words() {
        let decoded = decode_rfc2047("Re: =?utf-8?B?w7xiZXI=?= the plan").unwrap();
        assert_eq!(decoded, "Re: über the plan");
    }

    #[test]
    fn test_broken_word_is_error() {
        assert!(decode_rfc2047("=?utf-8?B?@@@?=").is_err());
    }

    #[test]
    fn test_unknown_charset_lossy() {
        assert_eq!(decode_rfc2047("=?x-unknown?Q?abc?=").unwrap(), "abc");
        assert_eq!(decode_charset(b"ok\xff", "x-klingon"), "ok\u{fffd}");
        assert_eq!(decode_charset(b"\xe9", "utf-8*en"), "\u{fffd}");
    }
}
