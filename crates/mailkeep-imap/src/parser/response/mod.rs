//! Turns one framed response into a [`Response`].

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod helpers;
mod types;

pub use types::{FetchItem, UntaggedResponse};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, SeqNum, Status, Tag};
use crate::{Error, Result};

use helpers::{
    parse_capability_data, parse_flag_list, parse_list_response, parse_response_code,
    parse_search_response,
};

/// One server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Completion of the command carrying `tag`.
    Tagged {
        /// Tag of the completed command.
        tag: Tag,
        /// OK, NO or BAD.
        status: Status,
        /// Bracketed code, if any.
        code: Option<ResponseCode>,
        /// Text after the code.
        text: String,
    },
    /// `* ...` data or status.
    Untagged(UntaggedResponse),
    /// `+ ...`: the server wants the literal.
    Continuation {
        /// Text after the `+`, if any.
        text: Option<String>,
    },
}

/// Entry point of the parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one complete response, literals included.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);
        match lexer.next_token()? {
            Token::Asterisk => {
                lexer.expect_space()?;
                Self::parse_untagged(&mut lexer).map(Response::Untagged)
            }
            Token::Plus => {
                if lexer.peek() == Some(b' ') {
                    lexer.advance();
                }
                let text = lexer.read_text_until_crlf();
                Ok(Response::Continuation {
                    text: (!text.is_empty()).then_some(text),
                })
            }
            Token::Atom(tag) => {
                lexer.expect_space()?;
                let word = lexer.read_atom_string()?;
                let status =
                    status_word(word).ok_or_else(|| lexer.error(&format!("{word} is no status")))?;
                let (code, text) = Self::parse_resp_text(&mut lexer)?;
                Ok(Response::Tagged {
                    tag: Tag::new(tag),
                    status,
                    code,
                    text,
                })
            }
            token => Err(Error::Parse {
                position: 0,
                message: format!("response starts with {token:?}"),
            }),
        }
    }

    /// Everything after `* `.
    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
        let keyword = match lexer.next_token()? {
            Token::Atom(keyword) => keyword,
            Token::Number(n) => return Self::parse_message_data(lexer, n),
            token => return Err(lexer.error(&format!("{token:?} after *"))),
        };

        if let Some(status) = status_word(keyword) {
            let (code, text) = Self::parse_resp_text(lexer)?;
            return Ok(match status {
                Status::Ok => UntaggedResponse::Ok { code, text },
                Status::No => UntaggedResponse::No { code, text },
                Status::Bad => UntaggedResponse::Bad { code, text },
                Status::PreAuth => UntaggedResponse::PreAuth { code, text },
                Status::Bye => UntaggedResponse::Bye { code, text },
            });
        }

        let data = match keyword.to_ascii_uppercase().as_str() {
            "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(lexer)?),
            "SEARCH" => UntaggedResponse::Search(parse_search_response(lexer)?),
            "FLAGS" => {
                lexer.expect_space()?;
                UntaggedResponse::Flags(parse_flag_list(lexer)?)
            }
            "LIST" => {
                lexer.expect_space()?;
                UntaggedResponse::List(parse_list_response(lexer)?)
            }
            _ => return Err(lexer.error(&format!("unsupported untagged {keyword}"))),
        };
        Ok(data)
    }

    /// `* n KEYWORD ...`
    fn parse_message_data(lexer: &mut Lexer<'_>, n: u32) -> Result<UntaggedResponse> {
        lexer.expect_space()?;
        let keyword = lexer.read_atom_string()?;
        let upper = keyword.to_ascii_uppercase();
        if upper == "EXISTS" {
            return Ok(UntaggedResponse::Exists(n));
        }
        if upper == "RECENT" {
            return Ok(UntaggedResponse::Recent(n));
        }

        let seq = SeqNum::new(n).ok_or_else(|| lexer.error(&format!("{keyword} of message 0")))?;
        match upper.as_str() {
            "EXPUNGE" => Ok(UntaggedResponse::Expunge(seq)),
            "FETCH" => {
                lexer.expect_space()?;
                let items = fetch::parse_fetch_response(lexer)?;
                Ok(UntaggedResponse::Fetch { seq, items })
            }
            _ => Err(lexer.error(&format!("unsupported message data {keyword}"))),
        }
    }

    /// `[SP] [code] [SP] text`. Gmail ends a bare `OK` right at CRLF.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        let code = match lexer.peek() {
            Some(b'[') => Some(parse_response_code(lexer)?),
            _ => None,
        };
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        Ok((code, lexer.read_text_until_crlf()))
    }
}

fn status_word(word: &str) -> Option<Status> {
    [
        ("OK", Status::Ok),
        ("NO", Status::No),
        ("BAD", Status::Bad),
        ("PREAUTH", Status::PreAuth),
        ("BYE", Status::Bye),
    ]
    .into_iter()
    .find_map(|(name, status)| name.eq_ignore_ascii_case(word).then_some(status))
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
    use crate::types::{Capability, Flag, MailboxAttribute};

    use super::*;

    #[test]
    fn test_greeting() {
        let response = ResponseParser::parse(b"* OK Gimap ready for requests from 1.2.3.4\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Ok {
                code: None,
                text: "Gimap ready for requests from 1.2.3.4".to_string(),
            })
        );
    }

    #[test]
    fn test_tagged_no_with_code() {
        let response =
            ResponseParser::parse(b"A0003 NO [AUTHENTICATIONFAILED] Invalid credentials (Failure)\r\n")
                .unwrap();

        match response {
            Response::Tagged {
                tag,
                status,
                code,
                text,
            } => {
                assert_eq!(tag.as_str(), "A0003");
                assert_eq!(status, Status::No);
                assert_eq!(
                    code,
                    Some(ResponseCode::Unknown("AUTHENTICATIONFAILED".to_string()))
                );
                assert_eq!(text, "Invalid credentials (Failure)");
            }
            other => panic!("Expected tagged response, got {other:?}"),
        }
    }

    #[test]
    fn test_tagged_read_write() {
        let response =
            ResponseParser::parse(b"A0004 OK [READ-WRITE] [Gmail]/All Mail selected. (Success)\r\n")
                .unwrap();
        assert!(matches!(
            response,
            Response::Tagged {
                code: Some(ResponseCode::ReadWrite),
                ..
            }
        ));
    }

    #[test]
    fn test_bare_tagged_ok() {
        let response = ResponseParser::parse(b"A0001 OK\r\n").unwrap();
        assert!(matches!(response, Response::Tagged { status: Status::Ok, .. }));
    }

    #[test]
    fn test_capability() {
        let response =
            ResponseParser::parse(b"* CAPABILITY IMAP4rev1 UNSELECT IDLE X-GM-EXT-1 AUTH=PLAIN\r\n")
                .unwrap();

        match response {
            Response::Untagged(UntaggedResponse::Capability(caps)) => {
                assert!(caps.contains(&Capability::Imap4Rev1));
                assert!(caps.contains(&Capability::GmailExt));
                assert!(caps.contains(&Capability::Auth("PLAIN".to_string())));
            }
            other => panic!("Expected capability response, got {other:?}"),
        }
    }

    #[test]
    fn test_permanent_flags_wildcard() {
        let response = ResponseParser::parse(
            b"* OK [PERMANENTFLAGS (\\Answered \\Deleted \\Seen $Phishing \\*)] Flags permitted.\r\n",
        )
        .unwrap();

        match response {
            Response::Untagged(UntaggedResponse::Ok {
                code: Some(ResponseCode::PermanentFlags(flags)),
                ..
            }) => {
                assert!(flags.contains(&Flag::Deleted));
                assert!(flags.contains(&Flag::Keyword("\\*".to_string())));
            }
            other => panic!("Expected PERMANENTFLAGS, got {other:?}"),
        }
    }

    #[test]
    fn test_list_gmail() {
        let response = ResponseParser::parse(
            b"* LIST (\\All \\HasNoChildren) \"/\" \"[Gmail]/All Mail\"\r\n",
        )
        .unwrap();

        match response {
            Response::Untagged(UntaggedResponse::List(list)) => {
                assert!(list.attributes.contains(&MailboxAttribute::All));
                assert_eq!(list.delimiter, Some('/'));
                assert_eq!(list.mailbox.as_str(), "[Gmail]/All Mail");
            }
            other => panic!("Expected LIST, got {other:?}"),
        }
    }

    #[test]
    fn test_list_unquoted_noselect() {
        let response =
            ResponseParser::parse(b"* LIST (\\HasChildren \\Noselect) \"/\" [Gmail]\r\n").unwrap();

        match response {
            Response::Untagged(UntaggedResponse::List(list)) => {
                assert!(!list.is_selectable());
                assert_eq!(list.mailbox.as_str(), "[Gmail]");
            }
            other => panic!("Expected LIST, got {other:?}"),
        }
    }

    #[test]
    fn test_exists_and_expunge() {
        assert_eq!(
            ResponseParser::parse(b"* 172 EXISTS\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Exists(172))
        );
        assert_eq!(
            ResponseParser::parse(b"* 3 EXPUNGE\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Expunge(SeqNum::new(3).unwrap()))
        );
        assert!(ResponseParser::parse(b"* 0 EXPUNGE\r\n").is_err());
    }

    #[test]
    fn test_search() {
        match ResponseParser::parse(b"* SEARCH 2 84 882\r\n").unwrap() {
            Response::Untagged(UntaggedResponse::Search(nums)) => {
                let values: Vec<u32> = nums.iter().map(|s| s.get()).collect();
                assert_eq!(values, vec![2, 84, 882]);
            }
            other => panic!("Expected SEARCH, got {other:?}"),
        }

        assert_eq!(
            ResponseParser::parse(b"* SEARCH\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Search(Vec::new()))
        );
    }

    #[test]
    fn test_fetch_with_literal() {
        let input = b"* 5 FETCH (BODY[] {11}\r\nSubject: hi)\r\n";
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(UntaggedResponse::Fetch { seq, items }) => {
                assert_eq!(seq.get(), 5);
                assert_eq!(
                    items,
                    vec![FetchItem::Body {
                        section: None,
                        origin: None,
                        data: Some(b"Subject: hi".to_vec()),
                    }]
                );
            }
            other => panic!("Expected FETCH, got {other:?}"),
        }
    }

    #[test]
    fn test_continuation() {
        assert_eq!(
            ResponseParser::parse(b"+ go ahead\r\n").unwrap(),
            Response::Continuation {
                text: Some("go ahead".to_string())
            }
        );
        assert_eq!(
            ResponseParser::parse(b"+\r\n").unwrap(),
            Response::Continuation { text: None }
        );
    }

    #[test]
    fn test_unknown_untagged_is_error() {
        assert!(ResponseParser::parse(b"* ENABLED CONDSTORE\r\n").is_err());
    }
}
