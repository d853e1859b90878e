//! Pieces shared by the untagged and tagged response parsers.

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, ResponseCode, SeqNum,
};

/// Parses `[CODE args]`. Arguments of codes this client ignores are skipped.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;
    let name = lexer.read_atom_string()?;

    let code = if name.eq_ignore_ascii_case("CAPABILITY") {
        ResponseCode::Capability(parse_capability_data(lexer)?)
    } else if name.eq_ignore_ascii_case("PERMANENTFLAGS") {
        lexer.expect_space()?;
        ResponseCode::PermanentFlags(parse_flag_list(lexer)?.into_iter().collect())
    } else if let Some(number_code) = numbered_code(name) {
        lexer.expect_space()?;
        number_code(lexer.read_number()?).ok_or_else(|| lexer.error("UNSEEN 0"))?
    } else {
        match name.to_ascii_uppercase().as_str() {
            "ALERT" => ResponseCode::Alert,
            "PARSE" => ResponseCode::Parse,
            "READ-ONLY" => ResponseCode::ReadOnly,
            "READ-WRITE" => ResponseCode::ReadWrite,
            "TRYCREATE" => ResponseCode::TryCreate,
            _ => ResponseCode::Unknown(name.to_string()),
        }
    };

    while !lexer.is_eof() && lexer.peek() != Some(b']') {
        lexer.advance();
    }
    lexer.expect(Token::RBracket)?;
    Ok(code)
}

/// Codes carrying a single number.
fn numbered_code(name: &str) -> Option<fn(u32) -> Option<ResponseCode>> {
    let build: fn(u32) -> Option<ResponseCode> = match name.to_ascii_uppercase().as_str() {
        "UIDNEXT" => |n| Some(ResponseCode::UidNext(n)),
        "UIDVALIDITY" => |n| Some(ResponseCode::UidValidity(n)),
        "UNSEEN" => |n| SeqNum::new(n).map(ResponseCode::Unseen),
        _ => return None,
    };
    Some(build)
}

/// Parses the space-prefixed atoms of a CAPABILITY list.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if let Token::Atom(atom) = lexer.next_token()? {
            caps.push(Capability::parse(atom));
        }
    }
    Ok(caps)
}

/// Parses `(...)` with space-separated atoms, handing each to `item`.
fn parse_atom_list<'a>(
    lexer: &mut Lexer<'a>,
    what: &str,
    mut item: impl FnMut(&mut Lexer<'a>, &'a str),
) -> Result<()> {
    lexer.expect(Token::LParen)?;
    loop {
        match lexer.next_token()? {
            Token::RParen => return Ok(()),
            Token::Space => {}
            Token::Atom(atom) => item(lexer, atom),
            other => return Err(lexer.error(&format!("{other:?} inside {what}"))),
        }
    }
}

/// Parses a flag list, including the `\*` of PERMANENTFLAGS.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    let mut flags = Flags::new();
    // `\*` lexes as the atom `\` followed by an asterisk.
    parse_atom_list(lexer, "flag list", |lexer, atom| {
        if atom == "\\" && lexer.peek() == Some(b'*') {
            lexer.advance();
            flags.insert(Flag::Keyword("\\*".to_string()));
        } else {
            flags.insert(Flag::parse(atom));
        }
    })?;
    Ok(flags)
}

/// Parses `(attributes) delimiter name` of a LIST line.
pub fn parse_list_response(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    let mut attributes = Vec::new();
    parse_atom_list(lexer, "LIST attributes", |_, atom| {
        attributes.push(MailboxAttribute::parse(atom));
    })?;

    lexer.expect_space()?;
    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(text) => text.chars().next(),
        other => return Err(lexer.error(&format!("{other:?} where a delimiter belongs"))),
    };

    lexer.expect_space()?;
    let name = lexer.read_mailbox_name()?;
    Ok(ListResponse {
        attributes,
        delimiter,
        mailbox: Mailbox::new(name),
    })
}

/// Parses the numbers of a SEARCH line. Zeroes are dropped.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<Vec<SeqNum>> {
    let mut hits = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if let Token::Number(n) = lexer.next_token()? {
            hits.extend(SeqNum::new(n));
        }
    }
    Ok(hits)
}
