//! Response parsing.
//!
//! Works on complete responses as read by the framing layer. Covers
//! status lines, CAPABILITY, LIST, SEARCH, FLAGS, EXISTS and FETCH with
//! body literals. Anything else surfaces as a parse error, which the client
//! skips over.
//!
//! # Example
//!
//! ```
//! use mailkeep_imap::parser::{ResponseParser, Response, UntaggedResponse};
//!
//! let input = b"* 12 EXISTS\r\n";
//! let response = ResponseParser::parse(input).unwrap();
//!
//! assert_eq!(response, Response::Untagged(UntaggedResponse::Exists(12)));
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{FetchItem, Response, ResponseParser, UntaggedResponse};
