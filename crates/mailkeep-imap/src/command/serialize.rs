//! Wire encoding of command arguments.

use crate::types::{Flag, Mailbox};

use super::types::{FetchAttribute, FetchItems, SearchCriteria, StoreAction};

/// A command line under construction.
pub struct Line {
    buf: Vec<u8>,
}

impl Line {
    /// Starts a line with `tag` and the command name.
    pub fn start(tag: &str, name: &str) -> Self {
        let mut buf = Vec::with_capacity(tag.len() + name.len() + 32);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(name.as_bytes());
        Self { buf }
    }

    /// Appends raw text after a separating space.
    pub fn word(&mut self, text: &str) -> &mut Self {
        self.buf.push(b' ');
        self.raw(text)
    }

    /// Appends an argument after a separating space.
    pub fn arg<T: Encode + ?Sized>(&mut self, value: &T) -> &mut Self {
        self.buf.push(b' ');
        value.encode(self);
        self
    }

    fn raw(&mut self, text: &str) -> &mut Self {
        self.buf.extend_from_slice(text.as_bytes());
        self
    }

    /// Terminates the line with CRLF.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(b"\r\n");
        self.buf
    }
}

/// Something that can be written as one command argument.
pub trait Encode {
    /// Writes `self` at the end of `line`.
    fn encode(&self, line: &mut Line);
}

/// Atom unless quoting is required, then a quoted string.
impl Encode for str {
    fn encode(&self, line: &mut Line) {
        if !self.is_empty() && !self.bytes().any(is_special) {
            line.raw(self);
            return;
        }
        line.buf.push(b'"');
        for byte in self.bytes() {
            if matches!(byte, b'"' | b'\\') {
                line.buf.push(b'\\');
            }
            line.buf.push(byte);
        }
        line.buf.push(b'"');
    }
}

impl Encode for Mailbox {
    fn encode(&self, line: &mut Line) {
        self.as_str().encode(line);
    }
}

/// Parenthesized list.
impl Encode for [Flag] {
    fn encode(&self, line: &mut Line) {
        let names: Vec<&str> = self.iter().map(Flag::as_str).collect();
        line.raw("(").raw(&names.join(" ")).raw(")");
    }
}

impl Encode for FetchAttribute {
    fn encode(&self, line: &mut Line) {
        match self {
            Self::Flags => line.raw("FLAGS"),
            Self::InternalDate => line.raw("INTERNALDATE"),
            Self::Rfc822Size => line.raw("RFC822.SIZE"),
            Self::Body { section, peek } => line
                .raw(if *peek { "BODY.PEEK[" } else { "BODY[" })
                .raw(section.as_deref().unwrap_or(""))
                .raw("]"),
        };
    }
}

impl Encode for FetchItems {
    fn encode(&self, line: &mut Line) {
        let attrs = match self {
            Self::Fast => {
                line.raw("FAST");
                return;
            }
            Self::Items(attrs) => attrs,
        };
        let grouped = attrs.len() != 1;
        if grouped {
            line.raw("(");
        }
        for (i, attr) in attrs.iter().enumerate() {
            if i > 0 {
                line.raw(" ");
            }
            attr.encode(line);
        }
        if grouped {
            line.raw(")");
        }
    }
}

/// `FLAGS.SILENT (...)` and friends. The bool selects the silent form.
impl Encode for (&StoreAction, bool) {
    fn encode(&self, line: &mut Line) {
        let (action, silent) = *self;
        let (item, flags) = match action {
            StoreAction::SetFlags(flags) => ("FLAGS", flags),
            StoreAction::AddFlags(flags) => ("+FLAGS", flags),
            StoreAction::RemoveFlags(flags) => ("-FLAGS", flags),
        };
        line.raw(item);
        if silent {
            line.raw(".SILENT");
        }
        line.arg(flags.as_slice());
    }
}

impl Encode for SearchCriteria {
    fn encode(&self, line: &mut Line) {
        match self {
            Self::All => {
                line.raw("ALL");
            }
            Self::Deleted => {
                line.raw("DELETED");
            }
            Self::Since(date) => {
                line.raw("SINCE").word(date);
            }
            Self::Before(date) => {
                line.raw("BEFORE").word(date);
            }
            Self::Header(field, value) => {
                line.raw("HEADER").arg(field.as_str()).arg(value.as_str());
            }
            Self::Not(inner) => {
                line.raw("NOT").arg(&**inner);
            }
            Self::And(terms) if terms.is_empty() => {
                line.raw("ALL");
            }
            Self::And(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        line.raw(" ");
                    }
                    term.encode(line);
                }
            }
        }
    }
}

/// Bytes that force an astring into quoted form.
const fn is_special(byte: u8) -> bool {
    byte < 0x20
        || byte == 0x7F
        || matches!(byte, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*')
}
