//! # mailkeep-imap
//!
//! An IMAP4rev1 client shaped around bulk mailbox transfer: enumerating a
//! folder, pulling message bodies one by one, and pushing them back with
//! APPEND and COPY.
//!
//! ## What is here
//!
//! - Session states (`NotAuthenticated`, `Authenticated`, `Selected`) as
//!   types, so a FETCH before SELECT does not compile
//! - [`Transport`] opens the byte stream; tests plug in an in-memory server
//!   where production uses [`TlsTransport`]
//! - [`MeteredStream`] tells a [`TransferObserver`] about every chunk moved
//! - [`utf7`] converts mailbox names to and from modified UTF-7
//! - The response parser works on bytes and never touches the network
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailkeep_imap::{Client, Config, Mailbox, SearchCriteria, TlsTransport, Transport};
//!
//! #[tokio::main]
//! async fn main() -> mailkeep_imap::Result<()> {
//!     let transport = TlsTransport::new(Config::new("imap.gmail.com"));
//!     let client = Client::from_stream(transport.connect().await?).await?;
//!     let client = client.login("user@gmail.com", "app-password").await?;
//!
//!     let (mut client, status) = client.select(&Mailbox::new("[Gmail]/All Mail")).await?;
//!     println!("{} messages", status.exists);
//!
//!     let hits = client.search(&SearchCriteria::All).await?;
//!     println!("{} matched", hits.len());
//!
//!     client.logout().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── login() ──→ Authenticated ── select() ──→ Selected ─┐
//!                                                                  ↑      │
//!                                                                  └──────┘
//!                                                                  select()
//! ```
//!
//! LIST, CREATE, DELETE and APPEND are valid in both `Authenticated` and
//! `Selected`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;
pub mod utf7;

pub use command::{Command, FetchAttribute, FetchItems, SearchCriteria, StoreAction, TagGenerator};
pub use connection::{
    Authenticated, Client, Config, ConfigBuilder, FramedStream, ImapStream, MeteredStream,
    NotAuthenticated, Ready, Security, SelectError, Selected, TlsTransport, TransferObserver,
    Transport,
};
pub use error::{Error, Result};
pub use parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
pub use types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, ResponseCode,
    SeqNum, SequenceSet, Status, Tag,
};
