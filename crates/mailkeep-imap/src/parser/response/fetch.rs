//! The data list of `* n FETCH (...)`.

use crate::Result;
use crate::parser::lexer::{Lexer, Token};

use super::helpers::parse_flag_list;
use super::types::FetchItem;

/// Parses the `(name value ...)` list of a FETCH response.
///
/// Items this client never asks for (`UID`, `X-GM-LABELS`, ...) are skipped.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;
    let mut items = Vec::new();
    loop {
        let name = match lexer.next_token()? {
            Token::RParen => return Ok(items),
            Token::Space => continue,
            Token::Atom(name) => name.to_ascii_uppercase(),
            token => return Err(lexer.error(&format!("{token:?} in FETCH data"))),
        };

        if name == "BODY" || name == "RFC822" {
            let section = delimited(lexer, b'[', b']').filter(|s| !s.is_empty());
            let origin = delimited(lexer, b'<', b'>').and_then(|s| s.parse().ok());
            lexer.expect_space()?;
            let data = match lexer.next_token()? {
                Token::Literal(bytes) => Some(bytes),
                Token::QuotedString(text) => Some(text.into_bytes()),
                _ => None,
            };
            items.push(FetchItem::Body {
                section,
                origin,
                data,
            });
            continue;
        }

        let item = match name.as_str() {
            "FLAGS" => {
                lexer.expect_space()?;
                FetchItem::Flags(parse_flag_list(lexer)?)
            }
            "RFC822.SIZE" => {
                lexer.expect_space()?;
                FetchItem::Rfc822Size(lexer.read_number()?)
            }
            "INTERNALDATE" => {
                lexer.expect_space()?;
                match lexer.next_token()? {
                    Token::QuotedString(date) => FetchItem::InternalDate(date),
                    _ => continue,
                }
            }
            _ => {
                skip_value(lexer)?;
                continue;
            }
        };
        items.push(item);
    }
}

/// Text between `open` and `close` when the next byte is `open`, taken
/// verbatim: a section like `HEADER.FIELDS (MESSAGE-ID)` holds spaces and
/// parentheses.
fn delimited(lexer: &mut Lexer<'_>, open: u8, close: u8) -> Option<String> {
    if lexer.peek() != Some(open) {
        return None;
    }
    lexer.advance();
    let mut text = String::new();
    while let Some(b) = lexer.advance() {
        if b == close {
            break;
        }
        text.push(char::from(b));
    }
    Some(text)
}

/// Skips one value: an atom, number, string, literal or nested list.
fn skip_value(lexer: &mut Lexer<'_>) -> Result<()> {
    if lexer.peek() == Some(b' ') {
        lexer.advance();
    }
    let mut depth = 0usize;
    while let Some(b) = lexer.peek() {
        match b {
            b'(' => {
                depth += 1;
                lexer.advance();
            }
            b')' if depth == 0 => break,
            b')' => {
                depth -= 1;
                lexer.advance();
                if depth == 0 {
                    break;
                }
            }
            b'"' | b'{' => {
                lexer.next_token()?;
                if depth == 0 {
                    break;
                }
            }
            b' ' | b'\r' if depth == 0 => break,
            _ => {
                lexer.advance();
            }
        }
    }
    Ok(())
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
    fn test_header_fields_section() {
        let input = b"(BODY[HEADER.FIELDS (MESSAGE-ID)] {23}\r\nMessage-ID: <a@b.c>\r\n\r\n)";
        let mut lexer = Lexer::new(input);
        let items = parse_fetch_response(&mut lexer).unwrap();

        assert_eq!(
            items,
            vec![FetchItem::Body {
                section: Some("HEADER.FIELDS (MESSAGE-ID)".to_string()),
                origin: None,
                data: Some(b"Message-ID: <a@b.c>\r\n\r\n".to_vec()),
            }]
        );
    }

    #[test]
    fn test_whole_body_with_origin() {
        let mut lexer = Lexer::new(b"(BODY[]<0> {3}\r\nabc)");
        let items = parse_fetch_response(&mut lexer).unwrap();

        assert_eq!(
            items,
            vec![FetchItem::Body {
                section: None,
                origin: Some(0),
                data: Some(b"abc".to_vec()),
            }]
        );
    }

    #[test]
    fn test_nil_body() {
        let mut lexer = Lexer::new(b"(BODY[] NIL)");
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert!(matches!(&items[0], FetchItem::Body { data: None, .. }));
    }

    #[test]
    fn test_skips_gmail_items() {
        let input = b"(X-GM-MSGID 1278455344230334865 X-GM-LABELS (\\Inbox \"Work stuff\") UID 7 FLAGS (\\Seen) RFC822.SIZE 2048)";
        let mut lexer = Lexer::new(input);
        let items = parse_fetch_response(&mut lexer).unwrap();

        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], FetchItem::Flags(f) if f.is_seen()));
        assert_eq!(items[1], FetchItem::Rfc822Size(2048));
    }

    #[test]
    fn test_internal_date() {
        let mut lexer = Lexer::new(b"(INTERNALDATE \"17-Jul-1996 02:44:25 -0700\")");
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(
            items,
            vec![FetchItem::InternalDate(
                "17-Jul-1996 02:44:25 -0700".to_string()
            )]
        );
    }
}
