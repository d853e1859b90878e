//! A small Gmail-flavoured IMAP server running over in-memory pipes.
//!
//! It understands just the commands the engines send. Messages live once in
//! a shared store and folders hold references to them, so copying into a
//! label and expunging from All Mail behave the way Gmail's do.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use mailkeep_core::{AccountConfig, Notifier, RetryPolicy};
use mailkeep_imap::Transport;
use mailkeep_mime::Message;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};

pub const USER: &str = "alice@example.org";
pub const PASSWORD: &str = "app-password";
pub const ALL_MAIL: &str = "[Gmail]/All Mail";
pub const TRASH: &str = "[Gmail]/Trash";

#[derive(Debug, Clone)]
pub struct StoredMail {
    pub raw: Vec<u8>,
    pub date: NaiveDate,
}

/// Shared state of the fake account.
#[derive(Debug)]
pub struct Account {
    pub password: String,
    pub mails: BTreeMap<u64, StoredMail>,
    /// Folder name (wire form) to message uids, in sequence order.
    pub folders: BTreeMap<String, Vec<u64>>,
    pub next_uid: u64,
    pub logins: usize,
    pub connects: usize,
    /// Every command received, without its tag.
    pub commands: Vec<String>,
    /// Connection attempts still to refuse.
    pub refuse_connects: usize,
    /// Drop the connection when the n-th command of this name arrives.
    pub drop_on: Option<(String, usize)>,
    /// LOGIN attempts (1-based) answered NO even with the right password.
    pub reject_logins: BTreeSet<usize>,
    /// Listed folders whose SELECT is always refused.
    pub unselectable: BTreeSet<String>,
    /// Send replies 64 bytes at a time with this pause in between.
    pub trickle: Option<Duration>,
    login_attempts: usize,
    seen: BTreeMap<String, usize>,
}

impl Account {
    fn new() -> Self {
        let folders = [ALL_MAIL, TRASH, "INBOX"]
            .into_iter()
            .map(|f| (f.to_string(), Vec::new()))
            .collect();
        Self {
            password: PASSWORD.to_string(),
            mails: BTreeMap::new(),
            folders,
            next_uid: 1,
            logins: 0,
            connects: 0,
            commands: Vec::new(),
            refuse_connects: 0,
            drop_on: None,
            reject_logins: BTreeSet::new(),
            unselectable: BTreeSet::new(),
            trickle: None,
            login_attempts: 0,
            seen: BTreeMap::new(),
        }
    }

    fn insert(&mut self, raw: Vec<u8>, date: NaiveDate) -> u64 {
        let uid = self.next_uid;
        self.next_uid += 1;
        self.mails.insert(uid, StoredMail { raw, date });
        uid
    }

    fn attach(&mut self, folder: &str, uid: u64) {
        let members = self.folders.entry(folder.to_string()).or_default();
        if !members.contains(&uid) {
            members.push(uid);
        }
    }

    fn should_drop(&mut self, command: &str) -> bool {
        let count = self.seen.entry(command.to_string()).or_default();
        *count += 1;
        match &self.drop_on {
            Some((name, nth)) if name == command && *nth == *count => {
                self.drop_on = None;
                true
            }
            _ => false,
        }
    }

    /// Raw messages in a folder, in sequence order.
    pub fn messages_in(&self, folder: &str) -> Vec<Vec<u8>> {
        self.folders
            .get(folder)
            .into_iter()
            .flatten()
            .map(|uid| self.mails[uid].raw.clone())
            .collect()
    }

    pub fn count(&self, folder: &str) -> Option<usize> {
        self.folders.get(folder).map(Vec::len)
    }

    pub fn folder_names(&self) -> Vec<String> {
        self.folders.keys().cloned().collect()
    }
}

/// Transport that opens a fresh server session for every connect.
#[derive(Debug, Clone)]
pub struct FakeGmail {
    pub account: Arc<Mutex<Account>>,
}

impl Default for FakeGmail {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGmail {
    pub fn new() -> Self {
        Self {
            account: Arc::new(Mutex::new(Account::new())),
        }
    }

    /// Puts a message in All Mail and the given labels (wire names).
    pub fn deliver(&self, raw: &[u8], labels: &[&str]) {
        let mut account = self.account.lock().unwrap();
        let date = Message::parse(raw.to_vec()).unwrap().sent_date().date();
        let uid = account.insert(raw.to_vec(), date);
        account.attach(ALL_MAIL, uid);
        for label in labels {
            account.attach(label, uid);
        }
    }

    /// Puts raw bytes in All Mail without parsing them.
    pub fn deliver_raw(&self, raw: &[u8], date: NaiveDate) {
        let mut account = self.account.lock().unwrap();
        let uid = account.insert(raw.to_vec(), date);
        account.attach(ALL_MAIL, uid);
    }

    pub fn add_folder(&self, name: &str) {
        self.account
            .lock()
            .unwrap()
            .folders
            .entry(name.to_string())
            .or_default();
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Account) -> R) -> R {
        f(&mut self.account.lock().unwrap())
    }
}

impl Transport for FakeGmail {
    type Stream = DuplexStream;

    fn connect(&self) -> impl Future<Output = mailkeep_imap::Result<Self::Stream>> + Send {
        let account = Arc::clone(&self.account);
        async move {
            {
                let mut state = account.lock().unwrap();
                if state.refuse_connects > 0 {
                    state.refuse_connects -= 1;
                    return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into());
                }
                state.connects += 1;
            }
            let (client, server) = tokio::io::duplex(1 << 20);
            tokio::spawn(serve(server, account));
            Ok(client)
        }
    }
}

#[derive(Default)]
struct Session {
    authenticated: bool,
    selected: Option<String>,
    deleted: BTreeSet<u64>,
}

enum Outcome {
    Reply(Vec<u8>),
    Close(Vec<u8>),
}

async fn serve(stream: DuplexStream, account: Arc<Mutex<Account>>) {
    let (read, mut write) = tokio::io::split(stream);
    let mut reader = BufReader::new(read);
    let mut session = Session::default();

    let greeting = b"* OK [CAPABILITY IMAP4rev1 X-GM-EXT-1] Gimap ready\r\n";
    if write.write_all(greeting).await.is_err() {
        return;
    }

    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = String::from_utf8_lossy(&line).trim_end().to_string();
        let Some((tag, rest)) = line.split_once(' ') else {
            continue;
        };
        let tag = tag.to_string();
        let tokens = tokenize(rest);
        let Some(command) = tokens.first().map(|c| c.to_ascii_uppercase()) else {
            continue;
        };

        {
            let mut state = account.lock().unwrap();
            state.commands.push(rest.to_string());
            if state.should_drop(&command) {
                return;
            }
        }

        let mut literal = None;
        if command == "APPEND" {
            let Some(size) = literal_size(rest) else {
                return;
            };
            if write.write_all(b"+ go ahead\r\n").await.is_err() {
                return;
            }
            let mut data = vec![0; size];
            if reader.read_exact(&mut data).await.is_err() {
                return;
            }
            let mut end = Vec::new();
            if reader.read_until(b'\n', &mut end).await.is_err() {
                return;
            }
            literal = Some(data);
        }

        let (outcome, trickle) = {
            let mut state = account.lock().unwrap();
            let outcome = handle(&mut state, &mut session, &tag, &command, &tokens[1..], literal);
            (outcome, state.trickle)
        };
        match outcome {
            Outcome::Reply(bytes) => {
                if send(&mut write, &bytes, trickle).await.is_err() {
                    return;
                }
            }
            Outcome::Close(bytes) => {
                let _ = write.write_all(&bytes).await;
                return;
            }
        }
    }
}

async fn send(
    write: &mut (impl AsyncWriteExt + Unpin),
    bytes: &[u8],
    trickle: Option<Duration>,
) -> io::Result<()> {
    let Some(pause) = trickle else {
        return write.write_all(bytes).await;
    };
    for chunk in bytes.chunks(64) {
        tokio::time::sleep(pause).await;
        write.write_all(chunk).await?;
    }
    Ok(())
}

fn handle(
    account: &mut Account,
    session: &mut Session,
    tag: &str,
    command: &str,
    args: &[String],
    literal: Option<Vec<u8>>,
) -> Outcome {
    let ok = |text: &str| format!("{tag} OK {text}\r\n").into_bytes();
    let no = |text: &str| format!("{tag} NO {text}\r\n").into_bytes();
    let bad = |text: &str| format!("{tag} BAD {text}\r\n").into_bytes();

    if command == "LOGOUT" {
        let mut out = b"* BYE LOGOUT Requested\r\n".to_vec();
        out.extend(ok("73 good day (Success)"));
        return Outcome::Close(out);
    }
    if command == "LOGIN" {
        let password = args.get(1).map(String::as_str).unwrap_or_default();
        account.login_attempts += 1;
        let rejected = account.reject_logins.contains(&account.login_attempts);
        if rejected || password != account.password {
            return Outcome::Reply(no("[AUTHENTICATIONFAILED] Invalid credentials (Failure)"));
        }
        account.logins += 1;
        session.authenticated = true;
        return Outcome::Reply(ok(&format!("{USER} authenticated (Success)")));
    }
    if !session.authenticated {
        return Outcome::Reply(bad("Not logged in"));
    }

    let reply = match command {
        "LIST" => {
            let mut out = Vec::new();
            out.extend(b"* LIST (\\HasChildren \\Noselect) \"/\" \"[Gmail]\"\r\n");
            for name in account.folders.keys() {
                let attributes = match name.as_str() {
                    ALL_MAIL => "\\All \\HasNoChildren",
                    TRASH => "\\HasNoChildren \\Trash",
                    _ if has_children(account, name) => "\\HasChildren",
                    _ => "\\HasNoChildren",
                };
                out.extend(format!("* LIST ({attributes}) \"/\" {}\r\n", quote(name)).into_bytes());
            }
            out.extend(ok("Success"));
            out
        }
        "SELECT" => {
            let name = args.first().cloned().unwrap_or_default();
            session.deleted.clear();
            match account.folders.get(&name) {
                Some(_) if account.unselectable.contains(&name) => {
                    session.selected = None;
                    no("[UNAVAILABLE] Temporary System Error (Failure)")
                }
                Some(members) => {
                    session.selected = Some(name);
                    let mut out = b"* FLAGS (\\Answered \\Flagged \\Draft \\Deleted \\Seen)\r\n".to_vec();
                    out.extend(format!("* {} EXISTS\r\n* 0 RECENT\r\n", members.len()).into_bytes());
                    out.extend(ok("[READ-WRITE] Success"));
                    out
                }
                None => {
                    session.selected = None;
                    no("[NONEXISTENT] Unknown Mailbox (Failure)")
                }
            }
        }
        "CREATE" => {
            let name = args.first().cloned().unwrap_or_default();
            if account.folders.contains_key(&name) {
                no("[ALREADYEXISTS] Duplicate folder name (Failure)")
            } else {
                account.folders.insert(name, Vec::new());
                ok("Success")
            }
        }
        "DELETE" => {
            let name = args.first().cloned().unwrap_or_default();
            if [ALL_MAIL, TRASH, "INBOX"].contains(&name.as_str()) {
                no("[CANNOT] Cannot delete system folder (Failure)")
            } else if account.folders.remove(&name).is_some() {
                ok("Success")
            } else {
                no("[NONEXISTENT] Unknown Mailbox (Failure)")
            }
        }
        "APPEND" => {
            let name = args.first().cloned().unwrap_or_default();
            let (Some(raw), true) = (literal, account.folders.contains_key(&name)) else {
                return Outcome::Reply(no("[TRYCREATE] Folder doesn't exist (Failure)"));
            };
            let date = args
                .iter()
                .find_map(|a| NaiveDate::parse_from_str(a.get(..11)?, "%d-%b-%Y").ok())
                .unwrap_or_else(|| Message::parse(raw.clone()).unwrap().sent_date().date());
            let uid = account.insert(raw, date);
            account.attach(&name, uid);
            ok("[APPENDUID 1 1] (Success)")
        }
        _ => match session.selected.clone() {
            Some(folder) => selected(account, session, &folder, tag, command, args),
            None => bad("No mailbox selected"),
        },
    };
    Outcome::Reply(reply)
}

fn selected(
    account: &mut Account,
    session: &mut Session,
    folder: &str,
    tag: &str,
    command: &str,
    args: &[String],
) -> Vec<u8> {
    let ok = |text: &str| format!("{tag} OK {text}\r\n").into_bytes();
    let members = account.folders.get(folder).cloned().unwrap_or_default();

    match command {
        "SEARCH" => {
            let mut since = None;
            let mut before = None;
            let mut i = 0;
            while i < args.len() {
                let date = args
                    .get(i + 1)
                    .and_then(|d| NaiveDate::parse_from_str(d, "%d-%b-%Y").ok());
                match args[i].to_ascii_uppercase().as_str() {
                    "SINCE" => {
                        since = date;
                        i += 1;
                    }
                    "BEFORE" => {
                        before = date;
                        i += 1;
                    }
                    _ => {}
                }
                i += 1;
            }
            let mut out = b"* SEARCH".to_vec();
            for (seq, uid) in members.iter().enumerate() {
                let date = account.mails[uid].date;
                if since.is_none_or(|s| date >= s) && before.is_none_or(|b| date < b) {
                    out.extend(format!(" {}", seq + 1).into_bytes());
                }
            }
            out.extend(b"\r\n");
            out.extend(ok("SEARCH completed (Success)"));
            out
        }
        "FETCH" => {
            let seqs = parse_set(args.first().map(String::as_str).unwrap_or_default());
            let header_only = args.iter().any(|a| a.to_ascii_uppercase().contains("HEADER.FIELDS"));
            let mut out = Vec::new();
            for seq in seqs {
                let Some(uid) = members.get(seq - 1) else {
                    continue;
                };
                let raw = &account.mails[uid].raw;
                let (section, data) = if header_only {
                    ("BODY[HEADER.FIELDS (MESSAGE-ID)]", message_id_block(raw))
                } else {
                    ("BODY[]", raw.clone())
                };
                out.extend(format!("* {seq} FETCH ({section} {{{}}}\r\n", data.len()).into_bytes());
                out.extend(data);
                out.extend(b")\r\n");
            }
            out.extend(ok("Success"));
            out
        }
        "STORE" => {
            let seqs = parse_set(args.first().map(String::as_str).unwrap_or_default());
            if args.iter().any(|a| a.to_ascii_uppercase().contains("\\DELETED")) {
                for seq in seqs {
                    if let Some(uid) = members.get(seq - 1) {
                        session.deleted.insert(*uid);
                    }
                }
            }
            ok("Success")
        }
        "COPY" => {
            let seqs = parse_set(args.first().map(String::as_str).unwrap_or_default());
            let target = args.get(1).cloned().unwrap_or_default();
            if !account.folders.contains_key(&target) {
                return format!("{tag} NO [TRYCREATE] No folder {target} (Failure)\r\n").into_bytes();
            }
            for seq in seqs {
                if let Some(&uid) = members.get(seq - 1) {
                    account.attach(&target, uid);
                }
            }
            ok("[COPYUID 1 1 1] (Success)")
        }
        "EXPUNGE" => {
            let mut out = Vec::new();
            for (seq, uid) in members.iter().enumerate().rev() {
                if session.deleted.contains(uid) {
                    out.extend(format!("* {} EXPUNGE\r\n", seq + 1).into_bytes());
                }
            }
            let deleted = std::mem::take(&mut session.deleted);
            if folder == ALL_MAIL {
                for (name, uids) in &mut account.folders {
                    if name != TRASH {
                        uids.retain(|u| !deleted.contains(u));
                    }
                }
            } else {
                if let Some(uids) = account.folders.get_mut(folder) {
                    uids.retain(|u| !deleted.contains(u));
                }
                if folder == TRASH {
                    account.mails.retain(|u, _| !deleted.contains(u));
                }
            }
            out.extend(ok("Success"));
            out
        }
        _ => format!("{tag} BAD Unknown command {command}\r\n").into_bytes(),
    }
}

fn has_children(account: &Account, name: &str) -> bool {
    let prefix = format!("{name}/");
    account.folders.keys().any(|k| k.starts_with(&prefix))
}

fn message_id_block(raw: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(raw);
    let header = text.split("\r\n\r\n").next().unwrap_or_default();
    let mut block = String::new();
    for line in header.split("\r\n") {
        if line.to_ascii_lowercase().starts_with("message-id:") {
            block.push_str(line);
            block.push_str("\r\n");
        }
    }
    block.push_str("\r\n");
    block.into_bytes()
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

fn literal_size(line: &str) -> Option<usize> {
    let open = line.rfind('{')?;
    line[open + 1..].trim_end_matches('}').trim_end_matches('+').parse().ok()
}

fn parse_set(set: &str) -> Vec<usize> {
    let mut out = Vec::new();
    for part in set.split(',') {
        match part.split_once(':') {
            Some((a, b)) => {
                if let (Ok(a), Ok(b)) = (a.parse::<usize>(), b.parse::<usize>()) {
                    out.extend(a.min(b)..=a.max(b));
                }
            }
            None => out.extend(part.parse::<usize>().ok()),
        }
    }
    out
}

/// Splits a command line on spaces outside quotes, brackets and
/// parentheses. Quoted strings come back unescaped.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut chars = line.chars();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match c {
            '"' if depth == 0 => quoted = !quoted,
            '\\' if quoted => current.extend(chars.next()),
            ' ' if !quoted && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '(' | '[' if !quoted => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' if !quoted => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Builds a minimal RFC 5322 message.
pub fn mail(id: &str, from: &str, date: &str, subject: &str) -> Vec<u8> {
    format!(
        "Message-ID: <{id}>\r\nFrom: {from}\r\nDate: {date}\r\nSubject: {subject}\r\n\r\nHello from {from}.\r\n"
    )
    .into_bytes()
}

/// Account settings pointed at the fake server, retrying quickly.
pub fn account() -> AccountConfig {
    AccountConfig::builder(USER, PASSWORD)
        .retry(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        })
        .label_retries(1)
        .build()
}

/// Notifier that records every event as a line of text.
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<String>>,
    stop_after_stored: Option<(usize, tokio_util::sync::CancellationToken)>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Cancels `token` once `count` messages have been stored.
    pub fn cancelling(count: usize, token: tokio_util::sync::CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::default(),
            stop_after_stored: Some((count, token)),
        })
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.events().iter().any(|e| e.contains(needle))
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Notifier for Recorder {
    fn on_backup_started(&self, account: &str, location: &str) {
        self.push(format!("backup started {account} {location}"));
    }

    fn on_backup_ended(&self, account: &str, _location: &str) {
        self.push(format!("backup ended {account}"));
    }

    fn on_restore_ended(&self, account: &str, _location: &str) {
        self.push(format!("restore ended {account}"));
    }

    fn on_clear_ended(&self, account: &str) {
        self.push(format!("clear ended {account}"));
    }

    fn on_message_stored(&self, sender: &str, subject: &str, index: usize, total: usize) {
        self.push(format!("stored {index}/{total} {sender} {subject}"));
        if let Some((count, token)) = &self.stop_after_stored {
            let stored = self
                .events()
                .iter()
                .filter(|e| e.starts_with("stored "))
                .count();
            if stored >= *count {
                token.cancel();
            }
        }
    }

    fn on_message_skipped_duplicate(
        &self,
        index: usize,
        total: usize,
        _skipped: usize,
        _known: usize,
    ) {
        self.push(format!("duplicate {index}/{total}"));
    }

    fn on_message_restored(&self, sender: &str, subject: &str, index: usize, total: usize) {
        self.push(format!("restored {index}/{total} {sender} {subject}"));
    }

    fn on_message_restore_skipped_by_date(
        &self,
        sender: &str,
        subject: &str,
        index: usize,
        total: usize,
    ) {
        self.push(format!("date-skipped {index}/{total} {sender} {subject}"));
    }

    fn on_log(&self, message: &str) {
        self.push(format!("log {message}"));
    }

    fn on_warning_or_recoverable_error(&self, message: &str) {
        self.push(format!("warning {message}"));
    }

    fn on_fatal_exception(&self, kind: &str, message: &str, _trace: &str) {
        self.push(format!("fatal {kind}: {message}"));
    }
}
