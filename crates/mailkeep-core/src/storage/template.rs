//! Relative message paths from a `${NAME}` template.

use std::collections::HashMap;

use chrono::{Datelike, Timelike};
use mailkeep_mime::Message;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Template used when a location names no fragment.
pub const DEFAULT_FRAGMENT: &str =
    "${YEAR}/${MONTH}/${YEAR}${MONTH}${DAY}-${HOUR}${MINUTE}${SECOND}-${FROM}-${SUBJ}";

const MAX_PATH_CHARS: usize = 240;

/// A path template such as `${YEAR}/${MONTH}/${FROM}`.
///
/// Recognised variables are `YEAR`, `MONTH`, `DAY`, `HOUR`, `MINUTE` and
/// `SECOND` (zero padded), `FROM` (lower-cased local part of the sender),
/// `ADDRESS` (lower-cased sender address) and `SUBJ` (decoded subject).
/// Both `$NAME` and `${NAME}` work, `$$` is a literal dollar, and unknown
/// variables are left as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate(String);

impl Default for PathTemplate {
    fn default() -> Self {
        Self(DEFAULT_FRAGMENT.to_string())
    }
}

impl PathTemplate {
    /// Wraps a template string.
    #[must_use]
    pub fn new(fragment: impl Into<String>) -> Self {
        Self(fragment.into())
    }

    /// Returns the template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Expands the template for a message and cleans the result into a
    /// portable relative path, without extension.
    #[must_use]
    pub fn expand(&self, message: &Message) -> String {
        clean_path(&substitute(&self.0, &variables(message)))
    }
}

fn variables(message: &Message) -> HashMap<&'static str, String> {
    let date = message.sent_date();
    let sender = message.sender().to_lowercase();
    let local = message.sender_local_part().to_lowercase();

    let vars = [
        ("YEAR", format!("{:04}", date.year())),
        ("MONTH", format!("{:02}", date.month())),
        ("DAY", format!("{:02}", date.day())),
        ("HOUR", format!("{:02}", date.hour())),
        ("MINUTE", format!("{:02}", date.minute())),
        ("SECOND", format!("{:02}", date.second())),
        ("FROM", local),
        ("ADDRESS", sender),
        ("SUBJ", message.subject()),
    ];

    vars.into_iter()
        .map(|(k, v)| (k, v.replace('/', "_")))
        .collect()
}

/// Substitutes `$NAME` and `${NAME}` references.
pub(crate) fn substitute(template: &str, vars: &HashMap<&'static str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
            continue;
        }

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match vars.get(name) {
            Some(value) if !name.is_empty() => {
                out.push_str(value);
                rest = &after[consumed..];
            }
            _ => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    out
}

fn is_portable(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#'()+-;=@[]_{}/".contains(c)
}

/// Strips diacritics, replaces anything outside a conservative portable
/// set with `_`, squeezes `_` runs and empty path segments, and caps the
/// length.
#[must_use]
pub fn clean_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());

    for c in path.nfkd().filter(|c| !is_combining_mark(*c)) {
        let c = if is_portable(c) { c } else { '_' };
        if (c == '_' && out.ends_with('_')) || (c == '/' && (out.is_empty() || out.ends_with('/'))) {
            continue;
        }
        out.push(c);
    }

    let mut out: String = out.chars().take(MAX_PATH_CHARS).collect();
    while out.ends_with('/') {
        out.pop();
    }
    if out.is_empty() {
        out.push('_');
    }
    out
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

    fn message(raw: &str) -> Message {
        Message::parse(raw.as_bytes().to_vec()).unwrap()
    }

    fn vars(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, (*v).to_string())).collect()
    }

    #[test]
    fn test_substitute_forms() {
        let v = vars(&[("YEAR", "2020"), ("FROM", "alice")]);
        assert_eq!(substitute("${YEAR}/$FROM-x", &v), "2020/alice-x");
        assert_eq!(substitute("$$5 ${NOPE} $NOPE", &v), "$5 ${NOPE} $NOPE");
        assert_eq!(substitute("${YEAR", &v), "${YEAR");
        assert_eq!(substitute("trailing $", &v), "trailing $");
    }

    #[test]
    fn test_default_template() {
        let msg = message(concat!(
            "From: Alice <Alice@Example.com>\r\n",
            "Subject: Quarterly report\r\n",
            "Date: Fri, 1 May 2020 10:11:12 +0000\r\n",
            "\r\n",
        ));
        assert_eq!(
            PathTemplate::default().expand(&msg),
            "2020/05/20200501-101112-alice-Quarterly_report"
        );
    }

    #[test]
    fn test_address_variable() {
        let msg = message("From: bob@example.org\r\nDate: 2 Jan 2021 00:00:00\r\n\r\n");
        assert_eq!(
            PathTemplate::new("$ADDRESS/${DAY}").expand(&msg),
            "bob@example_org/02"
        );
    }

    #[test]
    fn test_slash_in_value_does_not_nest() {
        let msg = message("From: a@b.c\r\nSubject: 50/50\r\n\r\n");
        assert_eq!(PathTemplate::new("${SUBJ}").expand(&msg), "50_50");
    }

    #[test]
    fn test_clean_diacritics_and_symbols() {
        assert_eq!(clean_path("Příliš žluťoučký kůň"), "Prilis_zlutoucky_kun");
        assert_eq!(clean_path("a:b*c?d<e>f|g\"h\\i"), "a_b_c_d_e_f_g_h_i");
        assert_eq!(clean_path("re: ...  done"), "re_done");
        assert_eq!(clean_path("日本語"), "_");
    }

    #[test]
    fn test_clean_path_segments() {
        assert_eq!(clean_path("/abs//path/"), "abs/path");
        assert_eq!(clean_path("../../etc/passwd"), "_/_/etc/passwd");
        assert_eq!(clean_path(""), "_");
    }

    #[test]
    fn test_clean_truncates() {
        let long = "x".repeat(500);
        assert_eq!(clean_path(&long).chars().count(), MAX_PATH_CHARS);
    }
}
