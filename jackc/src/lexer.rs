use crate::{escape_xml, JackcError};
use std::io::{Bytes, Read};

macro_rules! keywords {
    ($($keyword:ident),* $(,)?) => {
        #[derive(Eq, PartialEq, Debug, Clone, Copy)]
        pub enum KeywordKind {
            $($keyword),*
        }

        impl TryFrom<&[u8]> for KeywordKind {
            type Error = ();

            fn try_from(word: &[u8]) -> Result<KeywordKind, ()> {
                $(if word == stringify!($keyword).to_lowercase().as_bytes() {
                    return Ok(KeywordKind::$keyword);
                })*
                Err(())
            }
        }

        impl std::fmt::Display for KeywordKind {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(KeywordKind::$keyword => {
                        write!(f, "{}", stringify!($keyword).to_lowercase())
                    }),*
                }
            }
        }
    };
}

keywords! {Class, Constructor, Function, Method, Field, Static, Var, Int,
Char, Boolean, Void, True, False, Null, This, Let, Do, If, Else,
While, Return}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub struct SymbolKind(pub(crate) u8);

impl TryFrom<u8> for SymbolKind {
    type Error = ();

    fn try_from(c: u8) -> Result<SymbolKind, ()> {
        match c {
            b'{' | b'}' | b'(' | b')' | b'[' | b']' | b'.' | b',' | b';' | b'+' | b'-' | b'*'
            | b'/' | b'&' | b'|' | b'<' | b'>' | b'=' | b'~' => Ok(SymbolKind(c)),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum Token {
    Keyword(KeywordKind),
    Symbol(SymbolKind),
    IntConst(u16),
    StringConst(String),
    Identifier(String),
    EndOfFile,
}

impl Token {
    pub fn to_xml_element(&self) -> String {
        match self {
            Token::EndOfFile => String::new(),
            Token::Keyword(keyword) => format!("<keyword> {} </keyword>", keyword),
            Token::Symbol(SymbolKind(c)) => {
                format!("<symbol> {} </symbol>", escape_xml(&(*c as char).to_string()))
            }
            Token::IntConst(n) => format!("<integerConstant> {} </integerConstant>", n),
            Token::StringConst(s) => {
                format!("<stringConstant> {} </stringConstant>", escape_xml(s))
            }
            Token::Identifier(ident) => {
                format!("<identifier> {} </identifier>", escape_xml(ident))
            }
        }
    }

    pub(crate) fn expect_identifier(self) -> Result<String, JackcError> {
        match self {
            Token::Identifier(ident) => Ok(ident),
            _ => Err(JackcError::Expected("identifier")),
        }
    }

    pub(crate) fn expect_keyword(self) -> Result<KeywordKind, JackcError> {
        match self {
            Token::Keyword(keyword) => Ok(keyword),
            _ => Err(JackcError::Expected("keyword")),
        }
    }

    pub(crate) fn expect_symbol(self) -> Result<u8, JackcError> {
        match self {
            Token::Symbol(SymbolKind(c)) => Ok(c),
            _ => Err(JackcError::Expected("symbol")),
        }
    }

    pub(crate) fn expect_given_symbol(self, expected: u8) -> Result<(), JackcError> {
        match self {
            Token::Symbol(SymbolKind(c)) if c == expected => Ok(()),
            _ => Err(JackcError::ExpectedChar(expected as char)),
        }
    }
}

/// Byte-level tokenizer with one pushed-back byte and one pushed-back token.
pub struct JackTokenizer<T: Read> {
    bytes: Bytes<T>,
    prev: Option<u8>,
    prev_token: Option<Token>,
    line: usize,
}

impl<T: Read> JackTokenizer<T> {
    pub fn new(reader: T) -> Self {
        JackTokenizer {
            bytes: reader.bytes(),
            prev: None,
            prev_token: None,
            line: 1,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    fn read(&mut self) -> Result<Option<u8>, JackcError> {
        if let Some(b) = self.prev.take() {
            return Ok(Some(b));
        }

        match self.bytes.next() {
            Some(b) => {
                let b = b?;
                if b == b'\n' {
                    self.line += 1;
                }
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    fn unread(&mut self, b: u8) {
        if b == b'\n' {
            self.line -= 1;
        }
        self.prev = Some(b);
    }

    pub fn unread_token(&mut self, token: Token) {
        self.prev_token = Some(token);
    }

    fn drop_until(&mut self, target: u8) -> Result<(), JackcError> {
        while let Some(b) = self.read()? {
            if b == target {
                return Ok(());
            }
        }

        Err(JackcError::ExpectedChar(target as char))
    }

    // strips one /* ... */ span (doc comments included); the terminator is
    // found by re-scanning from each '*'
    fn drop_block_comment(&mut self) -> Result<(), JackcError> {
        loop {
            self.drop_until(b'*')?;
            match self.read()? {
                Some(b'/') => return Ok(()),
                Some(b) => self.unread(b),
                None => return Err(JackcError::ExpectedChar('/')),
            }
        }
    }

    fn string_constant(&mut self) -> Result<Token, JackcError> {
        let mut raw = vec![];

        while let Some(b) = self.read()? {
            match b {
                b'"' => return Ok(Token::StringConst(String::from_utf8(raw)?)),
                b'\n' => return Err(JackcError::UnterminatedString),
                _ => raw.push(b),
            }
        }

        Err(JackcError::UnterminatedString)
    }

    fn int_constant(&mut self, first: u8) -> Result<Token, JackcError> {
        let mut value = u32::from(first - b'0');

        while let Some(b) = self.read()? {
            if b.is_ascii_digit() {
                value = value * 10 + u32::from(b - b'0');
                if value > 0x7FFF {
                    return Err(JackcError::IntegerOutOfRange(value));
                }
            } else {
                self.unread(b);
                break;
            }
        }

        Ok(Token::IntConst(value as u16))
    }

    fn word(&mut self, first: u8) -> Result<Token, JackcError> {
        let mut raw = vec![first];

        while let Some(b) = self.read()? {
            match b {
                b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'0'..=b'9' => raw.push(b),
                _ => {
                    self.unread(b);
                    break;
                }
            }
        }

        if let Ok(keyword) = KeywordKind::try_from(&raw[..]) {
            Ok(Token::Keyword(keyword))
        } else {
            Ok(Token::Identifier(String::from_utf8(raw)?))
        }
    }

    pub fn advance(&mut self) -> Result<Token, JackcError> {
        if let Some(token) = self.prev_token.take() {
            return Ok(token);
        }

        while let Some(b) = self.read()? {
            match b {
                b' ' | b'\x09'..=b'\x0d' => continue,
                b'/' => match self.read()? {
                    Some(b'/') => {
                        // a line comment on the last line may hit EOF first
                        if self.drop_until(b'\n').is_err() {
                            return Ok(Token::EndOfFile);
                        }
                    }
                    Some(b'*') => self.drop_block_comment()?,
                    next => {
                        if let Some(next) = next {
                            self.unread(next);
                        }
                        return Ok(Token::Symbol(SymbolKind(b'/')));
                    }
                },
                b'"' => return self.string_constant(),
                b'0'..=b'9' => return self.int_constant(b),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => return self.word(b),
                _ => {
                    return SymbolKind::try_from(b)
                        .map(Token::Symbol)
                        .map_err(|_| JackcError::InvalidSyntax)
                }
            }
        }

        Ok(Token::EndOfFile)
    }
}
