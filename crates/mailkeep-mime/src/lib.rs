//! # mailkeep-mime
//!
//! Just enough RFC 5322 to file a raw message away: header parsing,
//! RFC 2047 encoded words, lenient date parsing, and the derived attributes
//! a backup needs.
//!
//! ## Derived attributes
//!
//! Every attribute is a pure function of the raw bytes, so backing up the
//! same message twice gives the same answers:
//!
//! - **identity**: the `Message-ID` without its angle brackets, or a
//!   `from.subject.sha256` synthesis when the header is absent
//! - **sent date**: the `Date` header's wall-clock fields, clamped into range
//!   and falling back to the Unix epoch
//! - **sender** and **subject**: decoded header text, or
//!   [`UNPARSEABLE_HEADER`] when decoding fails
//!
//! ## Quick Start
//!
//! ```
//! use mailkeep_mime::Message;
//!
//! let raw = b"From: Alice <alice@example.com>\r\n\
//!             Subject: =?utf-8?Q?Caf=C3=A9?=\r\n\
//!             Date: Fri, 1 May 2020 10:00:00 +0200\r\n\
//!             Message-ID: <abc@mail.example.com>\r\n\
//!             \r\n\
//!             Hello";
//!
//! let message = Message::parse(raw.to_vec()).unwrap();
//! assert_eq!(message.identity(), "abc@mail.example.com");
//! assert_eq!(message.sender(), "alice@example.com");
//! assert_eq!(message.subject(), "Café");
//! assert_eq!(message.sent_date().to_string(), "2020-05-01 10:00:00");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod header;
mod message;

pub mod date;
pub mod encoding;

pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, UNPARSEABLE_HEADER, identity_from_header_block, normalize_identity};
