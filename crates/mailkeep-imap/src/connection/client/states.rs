//! Marker types for the session states a [`super::Client`] moves through.

use crate::types::{Mailbox, MailboxStatus};

/// Greeting read, LOGIN pending.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// LOGIN accepted; nothing selected yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// SELECT succeeded. Sequence numbers refer to this mailbox until the next
/// SELECT.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: Mailbox,
    pub(crate) status: MailboxStatus,
}

impl Selected {
    /// State after selecting `mailbox`.
    #[must_use]
    pub const fn new(mailbox: Mailbox, status: MailboxStatus) -> Self {
        Self { mailbox, status }
    }

    /// Mailbox the sequence numbers refer to.
    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// What SELECT reported.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.status
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Authenticated {}
    impl Sealed for super::Selected {}
}

/// Logged-in states, with or without a selected mailbox. LIST, CREATE,
/// DELETE and APPEND need nothing more.
pub trait Ready: sealed::Sealed {}

impl Ready for Authenticated {}
impl Ready for Selected {}

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

    fn thread_safe<T: Send + Sync>() {}

    #[test]
    fn test_states_cross_threads() {
        thread_safe::<NotAuthenticated>();
        thread_safe::<Authenticated>();
        thread_safe::<Selected>();
    }

    #[test]
    fn test_selected_accessors() {
        let status = MailboxStatus {
            exists: 42,
            read_only: false,
            ..Default::default()
        };
        let selected = Selected::new(Mailbox::new("[Gmail]/All Mail"), status);

        assert_eq!(selected.mailbox().as_str(), "[Gmail]/All Mail");
        assert_eq!(selected.status().exists, 42);
    }
}
