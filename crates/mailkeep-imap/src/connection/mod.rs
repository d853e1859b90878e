//! From socket to session.
//!
//! [`Transport`] opens the byte stream, [`MeteredStream`] counts what goes
//! through it, [`FramedStream`] cuts it into responses and [`Client`] runs
//! commands on top.

mod client;
mod config;
mod framed;
mod metered;
mod stream;
mod transport;

pub use client::{Authenticated, Client, NotAuthenticated, Ready, SelectError, Selected};
pub use config::{Config, ConfigBuilder, Security};
pub use framed::FramedStream;
pub(crate) use metered::Stalled;
pub use metered::{MeteredStream, TransferObserver};
pub use stream::ImapStream;
pub use transport::{TlsTransport, Transport};
