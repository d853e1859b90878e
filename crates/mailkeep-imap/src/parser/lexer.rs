//! Tokenizer over one complete server response.

#![allow(clippy::missing_errors_doc)]

use crate::{Error, Result};

/// A lexical unit of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Bare word, such as a tag, a status or `\Seen`.
    Atom(&'a str),
    /// `"..."` with escapes resolved.
    QuotedString(String),
    /// `{n}` followed by n raw bytes.
    Literal(Vec<u8>),
    /// An all-digit atom.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// A single space.
    Space,
    /// `*`
    Asterisk,
    /// `+`
    Plus,
    /// `NIL`, any case.
    Nil,
    /// Line end.
    Crlf,
    /// No input left.
    Eof,
}

/// Reads tokens from the front of a byte slice.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Starts at the first byte of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Unread input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos.min(self.input.len())..]
    }

    /// Whether all input has been consumed.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// The next byte, not consumed.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Consumes and returns the next byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    /// Consumes bytes while `pred` holds and returns them.
    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let rest = self.remaining();
        let len = rest.iter().position(|&b| !pred(b)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    /// Consumes `bytes` if the input continues with them.
    fn eat(&mut self, bytes: &[u8]) -> bool {
        let matched = self.remaining().starts_with(bytes);
        if matched {
            self.pos += bytes.len();
        }
        matched
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };
        let punct = match byte {
            b' ' => Token::Space,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b'*' => Token::Asterisk,
            b'+' => Token::Plus,
            b'\r' if self.eat(b"\r\n") => return Ok(Token::Crlf),
            b'"' => return self.quoted(),
            b'{' => return self.literal(),
            _ if is_atom_char(byte) => return self.atom(),
            _ => return Err(self.error(&format!("Unexpected byte {byte:#04x}"))),
        };
        self.pos += 1;
        Ok(punct)
    }

    fn quoted(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let mut text = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(escaped @ (b'"' | b'\\')) => text.push(escaped),
                    _ => return Err(self.error("Bad escape in quoted string")),
                },
                Some(byte) => text.push(byte),
                None => return Err(self.error("Unterminated quoted string")),
            }
        }
        String::from_utf8(text)
            .map(Token::QuotedString)
            .map_err(|_| self.error("Quoted string is not UTF-8"))
    }

    fn literal(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let digits = self.take_while(|b| b.is_ascii_digit());
        let size = std::str::from_utf8(digits)
            .ok()
            .and_then(|d| d.parse::<usize>().ok())
            .ok_or_else(|| self.error("Bad literal size"))?;
        self.eat(b"+");
        if !self.eat(b"}\r\n") {
            return Err(self.error("Literal size not followed by }CRLF"));
        }
        let data = self
            .remaining()
            .get(..size)
            .ok_or_else(|| self.error("Literal cut short"))?;
        self.pos += size;
        Ok(Token::Literal(data.to_vec()))
    }

    fn atom(&mut self) -> Result<Token<'a>> {
        let raw = self.take_while(is_atom_char);
        let word = std::str::from_utf8(raw).map_err(|_| self.error("Atom is not UTF-8"))?;
        if word.bytes().all(|b| b.is_ascii_digit()) {
            return word
                .parse()
                .map(Token::Number)
                .map_err(|_| self.error("Number out of range"));
        }
        if word.eq_ignore_ascii_case("NIL") {
            return Ok(Token::Nil);
        }
        Ok(Token::Atom(word))
    }

    /// A parse error at the current offset.
    pub(crate) fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    /// Consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let found = self.next_token()?;
        if std::mem::discriminant(&found) != std::mem::discriminant(&expected) {
            return Err(self.error(&format!("Wanted {expected:?}, found {found:?}")));
        }
        Ok(())
    }

    /// Consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Reads an atom, number, quoted string or literal as text.
    pub fn read_astring(&mut self) -> Result<String> {
        match self.next_token()? {
            Token::Atom(word) => Ok(word.to_string()),
            Token::Number(n) => Ok(n.to_string()),
            Token::QuotedString(text) => Ok(text),
            Token::Literal(data) => {
                String::from_utf8(data).map_err(|_| self.error("Literal is not UTF-8"))
            }
            other => Err(self.error(&format!("Wanted a string, found {other:?}"))),
        }
    }

    /// Reads a mailbox name.
    ///
    /// Gmail sends names like `[Gmail]/Trash` unquoted even though brackets
    /// are not atom characters, so an unquoted name runs to the next space,
    /// parenthesis or line end.
    pub fn read_mailbox_name(&mut self) -> Result<String> {
        if matches!(self.peek(), Some(b'"' | b'{')) {
            return self.read_astring();
        }
        let raw = self.take_while(|b| !matches!(b, b' ' | b'\r' | b'(' | b')'));
        if raw.is_empty() {
            return Err(self.error("Missing mailbox name"));
        }
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    /// Reads a number token.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            other => Err(self.error(&format!("Wanted a number, found {other:?}"))),
        }
    }

    /// Reads an atom token.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(word) => Ok(word),
            other => Err(self.error(&format!("Wanted an atom, found {other:?}"))),
        }
    }

    /// Reads free text to the end of the line and consumes the CRLF.
    pub fn read_text_until_crlf(&mut self) -> String {
        let text = self.take_while(|b| b != b'\r');
        self.eat(b"\r\n");
        String::from_utf8_lossy(text).into_owned()
    }
}

/// Bytes allowed in an atom.
///
/// `\` is included so that flags such as `\Seen` come out as one atom;
/// brackets, braces, quotes, `%` and `*` are not.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    b > b' '
        && b < 0x7F
        && !matches!(b, b'(' | b')' | b'{' | b'}' | b'"' | b'%' | b'*' | b'[' | b']')
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

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            match lexer.next_token().unwrap() {
                Token::Eof => return out,
                token => out.push(token),
            }
        }
    }

    #[test]
    fn test_tagged_status_line() {
        assert_eq!(
            tokens(b"A0001 OK [READ-WRITE] done\r\n"),
            [
                Token::Atom("A0001"),
                Token::Space,
                Token::Atom("OK"),
                Token::Space,
                Token::LBracket,
                Token::Atom("READ-WRITE"),
                Token::RBracket,
                Token::Space,
                Token::Atom("done"),
                Token::Crlf,
            ]
        );
    }

    #[test]
    fn test_numbers_nil_and_flags() {
        assert_eq!(
            tokens(b"123 nil 4a \\Seen"),
            [
                Token::Number(123),
                Token::Space,
                Token::Nil,
                Token::Space,
                Token::Atom("4a"),
                Token::Space,
                Token::Atom("\\Seen"),
            ]
        );
    }

    #[test]
    fn test_quoted_string_escapes() {
        assert_eq!(
            tokens(b"\"say \\\"hi\\\"\""),
            [Token::QuotedString("say \"hi\"".to_string())]
        );
        assert!(Lexer::new(b"\"open").next_token().is_err());
    }

    #[test]
    fn test_literal_may_contain_crlf() {
        assert_eq!(
            tokens(b"{6}\r\nab\r\ncd)"),
            [Token::Literal(b"ab\r\ncd".to_vec()), Token::RParen]
        );
        assert_eq!(tokens(b"{2+}\r\nok"), [Token::Literal(b"ok".to_vec())]);
    }

    #[test]
    fn test_literal_cut_short() {
        assert!(Lexer::new(b"{10}\r\nshort").next_token().is_err());
        assert!(Lexer::new(b"{3}x").next_token().is_err());
    }

    #[test]
    fn test_lone_cr_is_rejected() {
        assert!(Lexer::new(b"\rx").next_token().is_err());
    }

    #[test]
    fn test_gmail_mailbox_names() {
        let mut lexer = Lexer::new(b"[Gmail]/Trash\r\n");
        assert_eq!(lexer.read_mailbox_name().unwrap(), "[Gmail]/Trash");
        assert_eq!(lexer.remaining(), b"\r\n");

        let mut lexer = Lexer::new(b"\"[Gmail]/All Mail\"\r\n");
        assert_eq!(lexer.read_mailbox_name().unwrap(), "[Gmail]/All Mail");

        assert!(Lexer::new(b" x").read_mailbox_name().is_err());
    }

    #[test]
    fn test_text_to_line_end() {
        let mut lexer = Lexer::new(b"Success [x]\r\nnext");
        assert_eq!(lexer.read_text_until_crlf(), "Success [x]");
        assert_eq!(lexer.remaining(), b"next");

        let mut lexer = Lexer::new(b"no line end");
        assert_eq!(lexer.read_text_until_crlf(), "no line end");
        assert!(lexer.is_eof());
    }

    #[test]
    fn test_atom_bytes() {
        for b in [b'A', b'\\', b'.', b'$', b'&', b'-', b'~'] {
            assert!(is_atom_char(b), "{}", b as char);
        }
        for b in [b' ', b'"', b'%', b'*', b'[', b']', b'{', b'(', 0x7F, b'\r'] {
            assert!(!is_atom_char(b), "{b:#x}");
        }
    }
}
