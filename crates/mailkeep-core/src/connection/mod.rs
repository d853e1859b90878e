//! A Gmail session that survives dropped connections.
//!
//! [`Connection`] wraps the type-state IMAP client behind a plain `&mut self`
//! API. Every command goes through one retry wrapper: transport failures
//! (and credential errors after a first successful login) drop the session,
//! reconnect with exponential back-off, reselect the last folder, replay the
//! last search and run the command again.

use std::sync::Arc;

use mailkeep_imap::{
    Authenticated, Client, FetchItem, FetchItems, Flag, ListResponse, Mailbox, MailboxStatus,
    MeteredStream, SearchCriteria, Selected, SeqNum, SequenceSet, StoreAction, TlsTransport,
    Transport,
};
use mailkeep_mime::{Message, identity_from_header_block};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AccountConfig;
use crate::notifier::{Notifier, ProgressBridge};
use crate::profile::MailboxProfile;
use crate::{Error, Result};

type Stream<T> = MeteredStream<<T as Transport>::Stream>;

enum SessionState<S> {
    Disconnected,
    Authenticated(Client<S, Authenticated>),
    Selected(Client<S, Selected>),
}

/// One command, replayable after a reconnect.
#[derive(Clone, Copy)]
enum Request<'a> {
    Connect,
    Select(&'a Mailbox),
    Search(&'a SearchCriteria),
    Fetch(&'a SequenceSet, &'a FetchItems),
    Append {
        folder: &'a Mailbox,
        flags: &'a [Flag],
        internal_date: Option<&'a str>,
        body: &'a [u8],
    },
    Copy(&'a SequenceSet, &'a Mailbox),
    Store(&'a SequenceSet, &'a StoreAction),
    Expunge,
    Create(&'a Mailbox),
    Delete(&'a Mailbox),
    List,
}

enum Reply {
    Done,
    Status(MailboxStatus),
    Numbers(Vec<SeqNum>),
    Fetched(Vec<(SeqNum, Vec<FetchItem>)>),
    Folders(Vec<ListResponse>),
}

fn unexpected_reply() -> Error {
    mailkeep_imap::Error::Protocol("unexpected reply kind".to_string()).into()
}

fn not_connected() -> mailkeep_imap::Error {
    mailkeep_imap::Error::InvalidState("not connected".to_string())
}

/// First body section carried by a FETCH reply.
fn body_of(fetched: Vec<(SeqNum, Vec<FetchItem>)>, num: SeqNum) -> Option<Vec<u8>> {
    fetched
        .into_iter()
        .filter(|(seq, _)| *seq == num)
        .flat_map(|(_, items)| items)
        .find_map(|item| match item {
            FetchItem::Body { data, .. } => data,
            _ => None,
        })
}

/// A reconnecting session with one Gmail account.
pub struct Connection<T: Transport = TlsTransport> {
    transport: T,
    account: AccountConfig,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
    state: SessionState<Stream<T>>,
    profile: Option<MailboxProfile>,
    ever_authenticated: bool,
    last_folder: Option<Mailbox>,
    last_search: Option<SearchCriteria>,
    last_fetched: Option<(SeqNum, Vec<u8>)>,
}

impl<T: Transport> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("account", &self.account.username)
            .field("connected", &!matches!(self.state, SessionState::Disconnected))
            .field("profile", &self.profile.as_ref().map(|p| p.key.as_str()))
            .field("last_folder", &self.last_folder)
            .finish_non_exhaustive()
    }
}

impl Connection<TlsTransport> {
    /// Creates a connection over TLS to the account's configured server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProfile`] if the account names a profile
    /// that does not exist.
    pub fn tls(
        account: AccountConfig,
        notifier: Arc<dyn Notifier>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let transport = TlsTransport::new(account.server.clone());
        Self::new(transport, account, notifier, cancel)
    }
}

impl<T: Transport> Connection<T> {
    /// Creates a disconnected session. Nothing is sent until
    /// [`connect`](Self::connect) or the first command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProfile`] if the account names a profile
    /// that does not exist.
    pub fn new(
        transport: T,
        account: AccountConfig,
        notifier: Arc<dyn Notifier>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let profile = account
            .profile
            .as_deref()
            .map(MailboxProfile::by_key)
            .transpose()?;

        Ok(Self {
            transport,
            account,
            notifier,
            cancel,
            state: SessionState::Disconnected,
            profile,
            ever_authenticated: false,
            last_folder: None,
            last_search: None,
            last_fetched: None,
        })
    }

    /// Returns the account this session logs into.
    #[must_use]
    pub const fn account(&self) -> &AccountConfig {
        &self.account
    }

    /// Returns the folder-name profile in use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMatchingProfile`] before a profile has been fixed
    /// or detected.
    pub fn profile(&self) -> Result<&MailboxProfile> {
        self.profile.as_ref().ok_or(Error::NoMatchingProfile)
    }

    /// Fails with [`Error::Interrupted`] once the host has cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] if cancellation was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Logs in and, when `detect_profile` is set and no profile was fixed
    /// up front, picks the profile matching the account's folder names.
    ///
    /// # Errors
    ///
    /// Returns an error if login fails or no profile matches.
    pub async fn connect(&mut self, detect_profile: bool) -> Result<()> {
        self.call(Request::Connect).await?;
        info!(account = %self.account.username, "Logged in");

        if detect_profile && self.profile.is_none() {
            let folders = self.list_folders().await?;
            let detection = MailboxProfile::detect(folders.iter().map(|f| &f.mailbox))?;
            if detection.partial {
                self.notifier.on_warning_or_recoverable_error(&format!(
                    "Trash folder {} not found, using profile {} by its All Mail folder",
                    detection.profile.trash, detection.profile.key
                ));
            }
            debug!(profile = %detection.profile.key, "Profile detected");
            self.profile = Some(detection.profile);
        }
        Ok(())
    }

    /// Selects a folder, remembering it for reconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be selected.
    pub async fn select(&mut self, folder: &Mailbox) -> Result<MailboxStatus> {
        self.last_search = None;
        self.last_fetched = None;

        match self.call(Request::Select(folder)).await {
            Ok(Reply::Status(status)) => {
                self.last_folder = Some(folder.clone());
                Ok(status)
            }
            Ok(_) => Err(unexpected_reply()),
            Err(e) => {
                self.last_folder = None;
                Err(e)
            }
        }
    }

    /// Searches the selected folder, remembering the criteria for
    /// reconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<SeqNum>> {
        match self.call(Request::Search(criteria)).await? {
            Reply::Numbers(nums) => {
                self.last_search = Some(criteria.clone());
                Ok(nums)
            }
            _ => Err(unexpected_reply()),
        }
    }

    /// Fetches a whole message. Asking for the same number twice in a row
    /// is served from a one-message cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the server sends no body.
    pub async fn fetch_body(&mut self, num: SeqNum) -> Result<Vec<u8>> {
        if let Some((cached, body)) = &self.last_fetched
            && *cached == num
        {
            return Ok(body.clone());
        }

        let body = self.fetch_section(num, &FetchItems::full_body()).await?;
        self.last_fetched = Some((num, body.clone()));
        Ok(body)
    }

    /// Returns a message's identity, fetching only its `Message-ID` header
    /// when it has one and the whole message otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the message cannot be parsed.
    pub async fn fetch_identity(&mut self, num: SeqNum) -> Result<String> {
        let header = self
            .fetch_section(num, &FetchItems::header_fields(&["MESSAGE-ID"]))
            .await?;
        if let Some(identity) = identity_from_header_block(&header) {
            return Ok(identity);
        }

        let body = self.fetch_body(num).await?;
        Ok(Message::parse(body)?.identity())
    }

    async fn fetch_section(&mut self, num: SeqNum, items: &FetchItems) -> Result<Vec<u8>> {
        let sequence = SequenceSet::Single(num);
        match self.call(Request::Fetch(&sequence, items)).await? {
            Reply::Fetched(fetched) => body_of(fetched, num).ok_or_else(|| {
                mailkeep_imap::Error::Protocol(format!("no body returned for message {num}"))
                    .into()
            }),
            _ => Err(unexpected_reply()),
        }
    }

    /// Uploads a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the message.
    pub async fn append(
        &mut self,
        folder: &Mailbox,
        flags: &[Flag],
        internal_date: Option<&str>,
        body: &[u8],
    ) -> Result<()> {
        self.call(Request::Append {
            folder,
            flags,
            internal_date,
            body,
        })
        .await
        .map(drop)
    }

    /// Copies messages of the selected folder into another folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    pub async fn copy(&mut self, sequence: &SequenceSet, folder: &Mailbox) -> Result<()> {
        self.call(Request::Copy(sequence, folder)).await.map(drop)
    }

    /// Changes flags of messages in the selected folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn store(&mut self, sequence: &SequenceSet, action: &StoreAction) -> Result<()> {
        self.call(Request::Store(sequence, action)).await.map(drop)
    }

    /// Expunges deleted messages from the selected folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the expunge fails.
    pub async fn expunge(&mut self) -> Result<()> {
        self.last_fetched = None;
        self.call(Request::Expunge).await.map(drop)
    }

    /// Creates a folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created.
    pub async fn create_folder(&mut self, folder: &Mailbox) -> Result<()> {
        self.call(Request::Create(folder)).await.map(drop)
    }

    /// Deletes a folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be deleted.
    pub async fn delete_folder(&mut self, folder: &Mailbox) -> Result<()> {
        self.call(Request::Delete(folder)).await.map(drop)
    }

    /// Lists every folder of the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    pub async fn list_folders(&mut self) -> Result<Vec<ListResponse>> {
        match self.call(Request::List).await? {
            Reply::Folders(folders) => Ok(folders),
            _ => Err(unexpected_reply()),
        }
    }

    /// Logs out. Failures are logged and otherwise ignored.
    pub async fn disconnect(&mut self) {
        let limit = self.account.server.io_timeout;
        let logout = async {
            match std::mem::replace(&mut self.state, SessionState::Disconnected) {
                SessionState::Authenticated(client) => client.logout().await,
                SessionState::Selected(client) => client.logout().await,
                SessionState::Disconnected => Ok(()),
            }
        };
        match tokio::time::timeout(limit, logout).await {
            Ok(Ok(())) => debug!("Logged out"),
            Ok(Err(e)) => debug!(error = %e, "Logout failed"),
            Err(_) => debug!("Logout timed out"),
        }
        self.last_folder = None;
        self.last_search = None;
        self.last_fetched = None;
    }

    fn is_recoverable(&self, error: &Error) -> bool {
        match error {
            Error::Imap(e) => e.is_transport() || (self.ever_authenticated && e.is_auth()),
            _ => false,
        }
    }

    async fn call(&mut self, request: Request<'_>) -> Result<Reply> {
        let mut rounds = 0;
        loop {
            self.check_cancelled()?;

            let error = match self.attempt(request).await {
                Ok(reply) => return Ok(reply),
                Err(e) => e,
            };
            if !matches!(
                error,
                Error::Imap(mailkeep_imap::Error::No(_) | mailkeep_imap::Error::Bad(_))
            ) {
                self.state = SessionState::Disconnected;
            }
            if !self.is_recoverable(&error) || rounds >= self.account.retry.max_attempts {
                return Err(error);
            }
            rounds += 1;

            warn!(error = %error, "Connection lost");
            self.notifier.on_log("Network error occurred, disconnected");
            self.reconnect(error).await?;
        }
    }

    async fn attempt(&mut self, request: Request<'_>) -> Result<Reply> {
        let cancel = self.cancel.clone();
        tokio::select! {
            () = cancel.cancelled() => Err(Error::Interrupted),
            reply = self.dispatch(request) => reply,
        }
    }

    async fn reconnect(&mut self, original: Error) -> Result<()> {
        let max_attempts = self.account.retry.max_attempts;
        for attempt in 1..=max_attempts {
            self.notifier
                .on_log(&format!("Trying to reconnect ({attempt})"));

            match self.restore_session().await {
                Ok(()) => {
                    self.notifier.on_log("Reconnected!");
                    return Ok(());
                }
                Err(e) if self.is_recoverable(&e) => {
                    self.state = SessionState::Disconnected;
                    let delay = self.account.retry.delay(attempt);
                    warn!(attempt, error = %e, ?delay, "Reconnect failed");
                    if attempt < max_attempts {
                        self.notifier.on_log(&format!(
                            "Reconnect failed, retrying in {} s",
                            delay.as_secs()
                        ));
                        let cancel = self.cancel.clone();
                        tokio::select! {
                            () = cancel.cancelled() => return Err(Error::Interrupted),
                            () = tokio::time::sleep(delay) => {}
                        }
                    }
                }
                Err(e) => {
                    self.state = SessionState::Disconnected;
                    return Err(e);
                }
            }
        }

        self.notifier.on_log("Unable to reconnect");
        Err(original)
    }

    /// Opens a fresh session and brings it back to the last folder and
    /// search.
    async fn restore_session(&mut self) -> Result<()> {
        self.state = SessionState::Disconnected;
        self.last_fetched = None;

        let stream = self.transport.connect().await?;
        let observer = Arc::new(ProgressBridge(Arc::clone(&self.notifier)));
        let stream =
            MeteredStream::new(stream, observer).with_stall_limit(self.account.server.io_timeout);
        let client = Client::from_stream(stream).await?;
        let client = client
            .login(&self.account.username, &self.account.password)
            .await?;
        self.ever_authenticated = true;

        match self.last_folder.clone() {
            Some(folder) => {
                let (mut client, _) = client
                    .select(&folder)
                    .await
                    .map_err(mailkeep_imap::Error::from)?;
                if let Some(criteria) = &self.last_search {
                    client.search(criteria).await?;
                }
                self.state = SessionState::Selected(client);
            }
            None => self.state = SessionState::Authenticated(client),
        }
        Ok(())
    }

    fn selected(&mut self) -> Result<&mut Client<Stream<T>, Selected>> {
        match &mut self.state {
            SessionState::Selected(client) => Ok(client),
            SessionState::Authenticated(_) => Err(mailkeep_imap::Error::InvalidState(
                "no folder selected".to_string(),
            )
            .into()),
            SessionState::Disconnected => Err(not_connected().into()),
        }
    }

    async fn dispatch(&mut self, request: Request<'_>) -> Result<Reply> {
        if matches!(self.state, SessionState::Disconnected) {
            self.restore_session().await?;
        }

        let reply = match request {
            Request::Connect => Reply::Done,
            Request::Select(folder) => {
                let selected = match std::mem::replace(&mut self.state, SessionState::Disconnected)
                {
                    SessionState::Authenticated(client) => client.select(folder).await,
                    SessionState::Selected(client) => client.select(folder).await,
                    SessionState::Disconnected => return Err(not_connected().into()),
                };
                match selected {
                    Ok((client, status)) => {
                        self.state = SessionState::Selected(client);
                        Reply::Status(status)
                    }
                    Err(failed) => {
                        let (session, error) = failed.into_parts();
                        if let Some(client) = session {
                            self.state = SessionState::Authenticated(client);
                        }
                        return Err(error.into());
                    }
                }
            }
            Request::Search(criteria) => Reply::Numbers(self.selected()?.search(criteria).await?),
            Request::Fetch(sequence, items) => {
                Reply::Fetched(self.selected()?.fetch(sequence, items.clone()).await?)
            }
            Request::Append {
                folder,
                flags,
                internal_date,
                body,
            } => {
                match &mut self.state {
                    SessionState::Authenticated(client) => {
                        client.append(folder, flags, internal_date, body).await?;
                    }
                    SessionState::Selected(client) => {
                        client.append(folder, flags, internal_date, body).await?;
                    }
                    SessionState::Disconnected => return Err(not_connected().into()),
                }
                Reply::Done
            }
            Request::Copy(sequence, folder) => {
                self.selected()?.copy(sequence, folder).await?;
                Reply::Done
            }
            Request::Store(sequence, action) => {
                self.selected()?
                    .store_silent(sequence, action.clone())
                    .await?;
                Reply::Done
            }
            Request::Expunge => {
                self.selected()?.expunge().await?;
                Reply::Done
            }
            Request::Create(folder) => {
                match &mut self.state {
                    SessionState::Authenticated(client) => client.create(folder).await?,
                    SessionState::Selected(client) => client.create(folder).await?,
                    SessionState::Disconnected => return Err(not_connected().into()),
                }
                Reply::Done
            }
            Request::Delete(folder) => {
                match &mut self.state {
                    SessionState::Authenticated(client) => client.delete(folder).await?,
                    SessionState::Selected(client) => client.delete(folder).await?,
                    SessionState::Disconnected => return Err(not_connected().into()),
                }
                Reply::Done
            }
            Request::List => Reply::Folders(match &mut self.state {
                SessionState::Authenticated(client) => client.list("", "*").await?,
                SessionState::Selected(client) => client.list("", "*").await?,
                SessionState::Disconnected => return Err(not_connected().into()),
            }),
        };
        Ok(reply)
    }
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

    fn seq(n: u32) -> SeqNum {
        SeqNum::new(n).unwrap()
    }

    #[test]
    fn test_body_of_picks_matching_number() {
        let fetched = vec![
            (
                seq(1),
                vec![FetchItem::Body {
                    section: None,
                    origin: None,
                    data: Some(b"one".to_vec()),
                }],
            ),
            (
                seq(2),
                vec![
                    FetchItem::Rfc822Size(3),
                    FetchItem::Body {
                        section: None,
                        origin: None,
                        data: Some(b"two".to_vec()),
                    },
                ],
            ),
        ];
        assert_eq!(body_of(fetched, seq(2)), Some(b"two".to_vec()));
    }

    #[test]
    fn test_body_of_nil() {
        let fetched = vec![(
            seq(1),
            vec![FetchItem::Body {
                section: Some("HEADER.FIELDS (MESSAGE-ID)".into()),
                origin: None,
                data: None,
            }],
        )];
        assert_eq!(body_of(fetched, seq(1)), None);
    }

    #[test]
    fn test_unknown_profile_rejected_up_front() {
        let account = AccountConfig::builder("me@gmail.com", "pw")
            .profile("klingon")
            .build();
        let err = Connection::tls(account, Arc::new(crate::NullNotifier), CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownProfile(key) if key == "klingon"));
    }
}
