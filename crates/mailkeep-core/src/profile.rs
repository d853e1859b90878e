//! Localized folder names for All Mail and Trash.
//!
//! Gmail names its special folders after the account's display language
//! and, for some regions, uses a `[Google Mail]` prefix instead of
//! `[Gmail]`. The table lists every known pair once; the `[Google Mail]`
//! twins are generated with a `_GM` key suffix.

use std::collections::HashSet;

use mailkeep_imap::Mailbox;

use crate::{Error, Result};

const GMAIL_PREFIX: &str = "[Gmail]/";
const GOOGLE_MAIL_PREFIX: &str = "[Google Mail]/";

/// `(key, all mail, trash)` with names in modified UTF-7, without prefix.
const LANGUAGES: &[(&str, &str, &str)] = &[
    ("en_us", "All Mail", "Trash"),
    ("en_uk", "All Mail", "Bin"),
    ("cs", "V&AWE-echny zpr&AOE-vy", "Ko&AWE-"),
    ("es", "Todos", "Papelera"),
    ("de", "Alle Nachrichten", "Papierkorb"),
    ("fr", "Tous les messages", "Corbeille"),
    ("ar", "&BkMGRA- &BicGRAYoBjEGSgYv-", "&BkUGRwZABkUGRAYnBio-"),
    ("it", "Tutti i messaggi", "Cestino"),
    ("pl", "Wszystkie", "Kosz"),
    ("sk", "V&AWE-etky spr&AOE-vy", "K&APQBYQ-"),
    ("bahasa_indonesia", "Semua Email", "Tong Sampah"),
    ("bahasa_melayu", "Semua Mel", "Sampah"),
    ("catala", "Tots els missatges", "Paperera"),
    ("dansk", "Alle e-mails", "Papirkurv"),
    ("eesti_keel", "K&APU-ik kirjad", "Pr&APw-gikast"),
    ("filipino", "Lahat ng Mail", "Basurahan"),
    ("hrvatski", "Sva po&AWE-ta", "Otpad"),
    ("islenska", "Allur p&APM-stur", "Rusl"),
    ("latviesu", "Visas v&ARM-stules", "Miskaste"),
    ("lietuviu", "Visi lai&AWE-kai", "&AWA-iuk&AWE-liad&ARcBfgEX-"),
    ("magyar", "&ANY-sszes lev&AOk-l", "Kuka"),
    ("norsk", "All e-post", "Papirkurv"),
    ("nederlands", "Alle berichten", "Prullenbak"),
    ("portugues_brazil", "Todos os e-mails", "Lixeira"),
    ("portugues_portugal", "Todo o correio", "Lixo"),
    ("romana", "Toate mesajele", "Co&AV8- de gunoi"),
    ("slovenscina", "Vsa po&AWE-ta", "Smetnjak"),
    ("suomi", "Kaikki viestit", "Roskakori"),
    ("svenska", "Alla mail", "Papperskorgen"),
    ("tieng_viet", "T&AOIDAQ-t ca&Awk- Th&AbA-", "Thu&AwA-ng Ra&AwE-c"),
    ("turkce", "T&APw-m Postalar", "&AMcA9g-p Kutusu"),
    (
        "ellnvika",
        "&A4wDuwOx- &A8QDsQ- &A7wDtwO9A80DvAOxA8QDsQ-",
        "&A5oDrAO0A78Dwg- &A7EDwAO,A8EDwQO5A7wDvAOsA8QDyQO9-",
    ),
    ("azbuka1", "&BBIEQQRP- &BD8EPgRHBEIEMA-", "&BBoEPgRABDcEOAQ9BDA-"),
    ("azbuka2", "&BCEEMgQw- &BD8EPgRIBEIEMA-", "&BB4EQgQ,BDAENA-"),
    ("azbuka3", "&BCMEQQRP- &BD8EPgRIBEIEMA-", "&BBoEPgRIBDgEOg-"),
    ("azbuka4", "&BCYETwQ7BDAEQgQw- &BD8EPgRJBDA-", "&BBoEPgRIBEcENQ-"),
    ("hebrew", "&BdsF3A- &BdQF0wXVBdAF6A-", "&BdAF6QXkBdQ-"),
    ("hindi", "&CTgJLQlA- &CS4JRwky-", "&CR8JTQkwCUgJNg- &CRUJMAlHCQI-"),
    ("thai", "&DggOFA4rDiEOMg4iDhcOMQ5JDgcOKw4hDhQ-", "&DhYOMQ4HDgIOIg4w-"),
    ("chinese_traditional", "&UWiQ6JD1TvY-", "&V4NXPmh2-"),
    ("chinese_simplified", "&YkBnCZCuTvY-", "&XfJSIJZkkK5O9g-"),
    ("japanese", "&MFkweTBmMG4w4TD8MOs-", "&MLQw33ux-"),
    ("korean", "&yATMtLz0rQDVaA-", "&1zTJwNG1-"),
];

/// The pair of special folders used for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxProfile {
    /// Table key, e.g. `en_us` or `de_GM`.
    pub key: String,
    /// The folder holding every message.
    pub all_mail: Mailbox,
    /// The trash folder.
    pub trash: Mailbox,
}

/// Result of matching a folder listing against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// The matched profile.
    pub profile: MailboxProfile,
    /// True when only the all-mail folder matched, not the trash.
    pub partial: bool,
}

impl MailboxProfile {
    /// Returns every known profile, `[Gmail]` variants first.
    #[must_use]
    pub fn all() -> Vec<Self> {
        prefixed(GMAIL_PREFIX, "")
            .chain(prefixed(GOOGLE_MAIL_PREFIX, "_GM"))
            .collect()
    }

    /// Looks up a profile by key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProfile`] if no profile has that key.
    pub fn by_key(key: &str) -> Result<Self> {
        Self::all()
            .into_iter()
            .find(|p| p.key == key)
            .ok_or_else(|| Error::UnknownProfile(key.to_string()))
    }

    /// Picks the profile matching a folder listing.
    ///
    /// A profile whose all-mail and trash folders are both present wins.
    /// Failing that, the first profile whose all-mail folder is present is
    /// returned with [`Detection::partial`] set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMatchingProfile`] if no all-mail folder is present.
    pub fn detect<'a>(folders: impl IntoIterator<Item = &'a Mailbox>) -> Result<Detection> {
        let present: HashSet<&str> = folders.into_iter().map(Mailbox::as_str).collect();
        let profiles = Self::all();

        if let Some(profile) = profiles.iter().find(|p| {
            present.contains(p.all_mail.as_str()) && present.contains(p.trash.as_str())
        }) {
            return Ok(Detection {
                profile: profile.clone(),
                partial: false,
            });
        }

        profiles
            .into_iter()
            .find(|p| present.contains(p.all_mail.as_str()))
            .map(|profile| Detection {
                profile,
                partial: true,
            })
            .ok_or(Error::NoMatchingProfile)
    }
}

/// The language table with every folder under `prefix` and `suffix`
/// appended to each key.
fn prefixed(
    prefix: &'static str,
    suffix: &'static str,
) -> impl Iterator<Item = MailboxProfile> {
    LANGUAGES.iter().map(move |(key, all_mail, trash)| MailboxProfile {
        key: format!("{key}{suffix}"),
        all_mail: Mailbox::new(format!("{prefix}{all_mail}")),
        trash: Mailbox::new(format!("{prefix}{trash}")),
    })
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

    fn boxes(names: &[&str]) -> Vec<Mailbox> {
        names.iter().map(|n| Mailbox::new(*n)).collect()
    }

    #[test]
    fn test_table_doubles_with_google_mail() {
        let all = MailboxProfile::all();
        assert_eq!(all.len(), LANGUAGES.len() * 2);

        let gm = MailboxProfile::by_key("de_GM").unwrap();
        assert_eq!(gm.all_mail.as_str(), "[Google Mail]/Alle Nachrichten");
        assert_eq!(gm.trash.as_str(), "[Google Mail]/Papierkorb");
    }

    #[test]
    fn test_keys_unique() {
        let all = MailboxProfile::all();
        let keys: HashSet<&str> = all.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys.len(), all.len());
    }

    #[test]
    fn test_names_decode() {
        for profile in MailboxProfile::all() {
            assert!(profile.all_mail.display_name().is_ok(), "{}", profile.key);
            assert!(profile.trash.display_name().is_ok(), "{}", profile.key);
        }
        let ja = MailboxProfile::by_key("japanese").unwrap();
        assert_eq!(ja.all_mail.display_name().unwrap(), "[Gmail]/すべてのメール");
    }

    #[test]
    fn test_unknown_key() {
        assert!(matches!(
            MailboxProfile::by_key("klingon"),
            Err(Error::UnknownProfile(k)) if k == "klingon"
        ));
    }

    #[test]
    fn test_detect_prefers_full_match() {
        // en_us and en_uk share All Mail; only the trash tells them apart
        let folders = boxes(&["INBOX", "[Gmail]", "[Gmail]/All Mail", "[Gmail]/Bin", "Work"]);
        let found = MailboxProfile::detect(&folders).unwrap();
        assert_eq!(found.profile.key, "en_uk");
        assert!(!found.partial);
    }

    #[test]
    fn test_detect_google_mail() {
        let folders = boxes(&["[Google Mail]/All Mail", "[Google Mail]/Trash"]);
        let found = MailboxProfile::detect(&folders).unwrap();
        assert_eq!(found.profile.key, "en_us_GM");
    }

    #[test]
    fn test_detect_partial() {
        let folders = boxes(&["INBOX", "[Gmail]/Alle Nachrichten"]);
        let found = MailboxProfile::detect(&folders).unwrap();
        assert_eq!(found.profile.key, "de");
        assert!(found.partial);
    }

    #[test]
    fn test_detect_none() {
        let folders = boxes(&["INBOX", "Work"]);
        assert!(matches!(
            MailboxProfile::detect(&folders),
            Err(Error::NoMatchingProfile)
        ));
    }
}
