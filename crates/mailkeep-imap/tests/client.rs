//! Client tests against a scripted stream.
//!
//! `tokio_test::io::Builder` checks every byte the client writes, so these
//! tests pin the exact wire exchange.

use tokio_test::io::Builder;

use mailkeep_imap::{
    Client, Error, FetchItem, FetchItems, Flag, Mailbox, SearchCriteria, SequenceSet, StoreAction,
};

const GREETING: &[u8] = b"* OK Gimap ready for requests\r\n";

#[tokio::test]
async fn test_login_select_search_fetch() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN user@gmail.com secret\r\n")
        .read(b"* CAPABILITY IMAP4rev1 X-GM-EXT-1\r\n")
        .read(b"A0001 OK user@gmail.com authenticated (Success)\r\n")
        .write(b"A0002 SELECT \"[Gmail]/All Mail\"\r\n")
        .read(b"* FLAGS (\\Seen \\Deleted)\r\n")
        .read(b"* 2 EXISTS\r\n")
        .read(b"A0002 OK [READ-WRITE] [Gmail]/All Mail selected. (Success)\r\n")
        .write(b"A0003 SEARCH SINCE 01-May-2020\r\n")
        .read(b"* SEARCH 1 2\r\n")
        .read(b"A0003 OK SEARCH completed (Success)\r\n")
        .write(b"A0004 FETCH 2 BODY.PEEK[]\r\n")
        .read(b"* 2 FETCH (BODY[] {11}\r\n")
        .read(b"Subject: hi)\r\n")
        .read(b"A0004 OK Success\r\n")
        .write(b"A0005 LOGOUT\r\n")
        .read(b"* BYE LOGOUT Requested\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("user@gmail.com", "secret").await.unwrap();
    assert!(client.has_capability(&mailkeep_imap::Capability::GmailExt));

    let (mut client, status) = client
        .select(&Mailbox::new("[Gmail]/All Mail"))
        .await
        .unwrap();
    assert_eq!(status.exists, 2);
    assert_eq!(client.mailbox().as_str(), "[Gmail]/All Mail");

    let hits = client
        .search(&SearchCriteria::Since("01-May-2020".to_string()))
        .await
        .unwrap();
    let hits: Vec<u32> = hits.iter().map(|s| s.get()).collect();
    assert_eq!(hits, vec![1, 2]);

    let fetched = client
        .fetch(&SequenceSet::single(2).unwrap(), FetchItems::full_body())
        .await
        .unwrap();
    assert_eq!(fetched.len(), 1);
    assert!(matches!(
        &fetched[0].1[0],
        FetchItem::Body { data: Some(d), .. } if d == b"Subject: hi"
    ));

    client.logout().await.unwrap();
}

#[tokio::test]
async fn test_login_rejected_is_auth_error() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN user@gmail.com wrong\r\n")
        .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials (Failure)\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let err = client.login("user@gmail.com", "wrong").await.unwrap_err();

    assert!(err.is_auth());
    assert!(!err.is_transport());
    assert!(err.to_string().contains("Invalid credentials"));
}

#[tokio::test]
async fn test_greeting_bye() {
    let mock = Builder::new().read(b"* BYE too many connections\r\n").build();
    let err = Client::from_stream(mock).await.unwrap_err();
    assert!(matches!(err, Error::Bye(_)));
}

#[tokio::test]
async fn test_append_waits_for_continuation() {
    let message = b"Subject: hi\r\n\r\nbody";
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN u p\r\n")
        .read(b"A0001 OK\r\n")
        .write(b"A0002 APPEND \"[Gmail]/All Mail\" (\\Seen) \"01-May-2020 10:00:00 +0000\" {19}\r\n")
        .read(b"+ go ahead\r\n")
        .write(b"Subject: hi\r\n\r\nbody\r\n")
        .read(b"A0002 OK [APPENDUID 11 1990] (Success)\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("u", "p").await.unwrap();
    client
        .append(
            &Mailbox::new("[Gmail]/All Mail"),
            &[Flag::Seen],
            Some("01-May-2020 10:00:00 +0000"),
            message,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_append_rejected_before_literal() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN u p\r\n")
        .read(b"A0001 OK\r\n")
        .write(b"A0002 APPEND Nowhere {1}\r\n")
        .read(b"A0002 NO [TRYCREATE] Folder doesn't exist\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("u", "p").await.unwrap();
    let err = client
        .append(&Mailbox::new("Nowhere"), &[], None, b"x")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::No(_)));
}

#[tokio::test]
async fn test_list_create_copy_store_expunge() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN u p\r\n")
        .read(b"A0001 OK\r\n")
        .write(b"A0002 LIST \"\" \"*\"\r\n")
        .read(b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n")
        .read(b"* LIST (\\HasChildren \\Noselect) \"/\" \"[Gmail]\"\r\n")
        .read(b"* LIST (\\All \\HasNoChildren) \"/\" \"[Gmail]/All Mail\"\r\n")
        .read(b"A0002 OK Success\r\n")
        .write(b"A0003 CREATE Work\r\n")
        .read(b"A0003 OK Success\r\n")
        .write(b"A0004 SELECT INBOX\r\n")
        .read(b"* 3 EXISTS\r\n")
        .read(b"A0004 OK [READ-WRITE] INBOX selected. (Success)\r\n")
        .write(b"A0005 COPY 1:3 Work\r\n")
        .read(b"A0005 OK [COPYUID 3 1:3 1:3] (Success)\r\n")
        .write(b"A0006 STORE 1:3 FLAGS.SILENT (\\Deleted)\r\n")
        .read(b"A0006 OK Success\r\n")
        .write(b"A0007 EXPUNGE\r\n")
        .read(b"* 1 EXPUNGE\r\n* 1 EXPUNGE\r\n* 1 EXPUNGE\r\n")
        .read(b"A0007 OK Success\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("u", "p").await.unwrap();

    let folders = client.list("", "*").await.unwrap();
    assert_eq!(folders.len(), 3);
    assert!(!folders[1].is_selectable());

    client.create(&Mailbox::new("Work")).await.unwrap();

    let (mut client, _) = client.select(&Mailbox::inbox()).await.unwrap();
    let all = SequenceSet::range(1, 3).unwrap();
    client.copy(&all, &Mailbox::new("Work")).await.unwrap();
    client
        .store_silent(&all, StoreAction::SetFlags(vec![Flag::Deleted]))
        .await
        .unwrap();
    let expunged = client.expunge().await.unwrap();
    assert_eq!(expunged.len(), 3);
}

#[tokio::test]
async fn test_connection_drop_is_transport_error() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN u p\r\n")
        .read(b"A0001 OK\r\n")
        .write(b"A0002 SELECT INBOX\r\n")
        .read(b"* 3 EXI")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("u", "p").await.unwrap();
    let (session, err) = client.select(&Mailbox::inbox()).await.unwrap_err().into_parts();
    assert!(err.is_transport());
    assert!(session.is_none());
}

#[tokio::test]
async fn test_refused_select_keeps_session() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN u p\r\n")
        .read(b"A0001 OK\r\n")
        .write(b"A0002 SELECT \"[Gmail]/All Mail\"\r\n")
        .read(b"* 4 EXISTS\r\n")
        .read(b"A0002 OK [READ-WRITE] Success\r\n")
        .write(b"A0003 SELECT Gone\r\n")
        .read(b"A0003 NO [NONEXISTENT] Unknown Mailbox (Failure)\r\n")
        .write(b"A0004 LIST \"\" \"*\"\r\n")
        .read(b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n")
        .read(b"A0004 OK Success\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("u", "p").await.unwrap();
    let (client, _) = client
        .select(&Mailbox::new("[Gmail]/All Mail"))
        .await
        .unwrap();

    let (session, err) = client
        .select(&Mailbox::new("Gone"))
        .await
        .unwrap_err()
        .into_parts();
    assert!(matches!(err, Error::No(ref text) if text.contains("Unknown Mailbox")));

    let mut client = session.unwrap();
    let folders = client.list("", "*").await.unwrap();
    assert_eq!(folders.len(), 1);
}
