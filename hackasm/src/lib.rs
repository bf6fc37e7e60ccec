use lazy_static::lazy_static;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AsmError {
    #[error("L{0} invalid command: {1}")]
    InvalidCommand(usize, String),
    #[error("L{0} invalid symbol: {1}")]
    InvalidSymbol(usize, String),
    #[error("L{0} address literal out of range: {1}")]
    LiteralOutOfRange(usize, u32),
    #[error("label defined twice: {0}")]
    DuplicateLabel(String),
    #[error("unknown mnemonic: {0}")]
    UnknownMnemonic(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The symbolic part of an A-instruction.
#[derive(Debug, Eq, PartialEq)]
pub enum ASymbol {
    Symbol(String),
    Literal(u16),
}

#[derive(Debug, Eq, PartialEq)]
pub enum Command {
    A(ASymbol),
    C {
        dest: String,
        comp: String,
        jump: String,
    },
    Label(String),
}

lazy_static! {
    static ref DEST_LIST: HashMap<&'static str, u16> = {
        // dest bits count up in (A, D, M) order, so the table is just an enumeration
        " M D MD A AM AD AMD"
            .split(' ')
            .enumerate()
            .map(|(i, s)| (s, i as u16))
            .collect()
    };
    static ref JUMP_LIST: HashMap<&'static str, u16> = {
        " JGT JEQ JGE JLT JNE JLE JMP"
            .split(' ')
            .enumerate()
            .map(|(i, s)| (s, i as u16))
            .collect()
    };
    static ref COMP_LIST: HashMap<&'static str, u16> = [
        ("0", 0b0101010),
        ("1", 0b0111111),
        ("-1", 0b0111010),
        ("D", 0b0001100),
        ("A", 0b0110000),
        ("M", 0b1110000),
        ("!D", 0b0001101),
        ("!A", 0b0110001),
        ("!M", 0b1110001),
        ("-D", 0b0001111),
        ("-A", 0b0110011),
        ("-M", 0b1110011),
        ("D+1", 0b0011111),
        ("A+1", 0b0110111),
        ("M+1", 0b1110111),
        ("D-1", 0b0001110),
        ("A-1", 0b0110010),
        ("M-1", 0b1110010),
        ("D+A", 0b0000010),
        ("D+M", 0b1000010),
        ("D-A", 0b0010011),
        ("D-M", 0b1010011),
        ("A-D", 0b0000111),
        ("M-D", 0b1000111),
        ("D&A", 0b0000000),
        ("D&M", 0b1000000),
        ("D|A", 0b0010101),
        ("D|M", 0b1010101),
    ]
    .iter()
    .cloned()
    .collect();
}

pub mod code {
    use super::*;

    pub fn dest(mnemonic: &str) -> Result<u16, AsmError> {
        DEST_LIST
            .get(mnemonic)
            .copied()
            .ok_or_else(|| AsmError::UnknownMnemonic(mnemonic.to_owned()))
    }

    pub fn comp(mnemonic: &str) -> Result<u16, AsmError> {
        COMP_LIST
            .get(mnemonic)
            .copied()
            .ok_or_else(|| AsmError::UnknownMnemonic(mnemonic.to_owned()))
    }

    pub fn jump(mnemonic: &str) -> Result<u16, AsmError> {
        JUMP_LIST
            .get(mnemonic)
            .copied()
            .ok_or_else(|| AsmError::UnknownMnemonic(mnemonic.to_owned()))
    }
}

/// Predefined symbols of the Hack platform.
pub fn symbol_table() -> HashMap<String, u16> {
    let mut table = HashMap::new();

    table.insert("SP".to_owned(), 0);
    table.insert("LCL".to_owned(), 1);
    table.insert("ARG".to_owned(), 2);
    table.insert("THIS".to_owned(), 3);
    table.insert("THAT".to_owned(), 4);
    table.insert("SCREEN".to_owned(), 0x4000);
    table.insert("KBD".to_owned(), 0x6000);

    (0..16).for_each(|i| {
        table.insert(format!("R{}", i), i);
    });

    table
}

fn is_hack_symbol(symbol: &str) -> bool {
    let mut chars = symbol.chars();

    match chars.next() {
        None => false,
        Some(first) if first.is_ascii_digit() => false,
        Some(first) => {
            let ok = |c: char| c.is_alphanumeric() || c == '.' || c == '_' || c == '$' || c == ':';
            ok(first) && chars.all(ok)
        }
    }
}

fn parse_command(text: &str, line: usize) -> Result<Command, AsmError> {
    if let Some(symbol) = text.strip_prefix('@') {
        return if symbol.starts_with(|c: char| c.is_ascii_digit()) {
            let value = symbol
                .parse::<u32>()
                .map_err(|_| AsmError::InvalidSymbol(line, symbol.to_owned()))?;

            if value > 0x7FFF {
                Err(AsmError::LiteralOutOfRange(line, value))
            } else {
                Ok(Command::A(ASymbol::Literal(value as u16)))
            }
        } else if is_hack_symbol(symbol) {
            Ok(Command::A(ASymbol::Symbol(symbol.to_owned())))
        } else {
            Err(AsmError::InvalidSymbol(line, symbol.to_owned()))
        };
    }

    if let Some(rest) = text.strip_prefix('(') {
        let symbol = rest
            .strip_suffix(')')
            .ok_or_else(|| AsmError::InvalidCommand(line, text.to_owned()))?;

        return if is_hack_symbol(symbol) {
            Ok(Command::Label(symbol.to_owned()))
        } else {
            Err(AsmError::InvalidSymbol(line, symbol.to_owned()))
        };
    }

    // dest=comp;jump with both dest= and ;jump optional
    let (compdest, jump) = match text.split_once(';') {
        Some((c, j)) => (c, j),
        None => (text, ""),
    };
    let (dest, comp) = match compdest.split_once('=') {
        Some((d, c)) => (d, c),
        None => ("", compdest),
    };

    if DEST_LIST.contains_key(dest) && COMP_LIST.contains_key(comp) && JUMP_LIST.contains_key(jump)
    {
        Ok(Command::C {
            dest: dest.to_owned(),
            comp: comp.to_owned(),
            jump: jump.to_owned(),
        })
    } else {
        Err(AsmError::InvalidCommand(line, text.to_owned()))
    }
}

/// Pull parser over an assembly source with one-command lookahead.
pub struct Parser<T: BufRead> {
    reader: T,
    next: Option<Command>,
    line: usize,
}

impl<T: BufRead> Parser<T> {
    pub fn new(reader: T) -> Result<Self, AsmError> {
        let mut parser = Parser {
            reader,
            next: None,
            line: 0,
        };

        parser.advance()?;

        Ok(parser)
    }

    /// Returns the current command and reads ahead to the next one.
    pub fn advance(&mut self) -> Result<Option<Command>, AsmError> {
        let current = self.next.take();
        let mut line = String::new();

        while self.reader.read_line(&mut line)? != 0 {
            self.line += 1;

            let cleaned: String = line
                .split("//")
                .next()
                .unwrap_or("")
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();

            if cleaned.is_empty() {
                line.clear();
                continue;
            }

            self.next = Some(parse_command(&cleaned, self.line)?);
            break;
        }

        Ok(current)
    }
}

/// Two-pass translation of a whole assembly source into Hack binary text.
///
/// Pass 1 materializes the command stream and binds each `(label)` to the
/// index of the instruction that follows it. Pass 2 encodes, allocating
/// data addresses from 16 upward for symbols that never got defined.
pub fn assemble<R: BufRead, W: Write>(src: R, dst: &mut W) -> Result<(), AsmError> {
    let mut table = symbol_table();
    let mut ops = Vec::new();

    let mut parser = Parser::new(src)?;
    while let Some(command) = parser.advance()? {
        if let Command::Label(symbol) = command {
            if table.insert(symbol.clone(), ops.len() as u16).is_some() {
                return Err(AsmError::DuplicateLabel(symbol));
            }
        } else {
            ops.push(command);
        }
    }

    let mut next_data = 16u16;

    for command in ops {
        let word = match command {
            Command::A(ASymbol::Literal(value)) => value,
            Command::A(ASymbol::Symbol(symbol)) => {
                if let Some(&addr) = table.get(&symbol) {
                    addr
                } else {
                    let addr = next_data;
                    table.insert(symbol, addr);
                    next_data += 1;
                    addr
                }
            }
            Command::C { dest, comp, jump } => {
                0xE000 | (code::comp(&comp)? << 6) | (code::dest(&dest)? << 3) | code::jump(&jump)?
            }
            Command::Label(_) => continue,
        };

        writeln!(dst, "{:016b}", word)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembled(src: &str) -> Vec<String> {
        let mut out = Vec::new();
        assemble(src.as_bytes(), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn encodes_literal_a_instruction() {
        assert_eq!(assembled("@21\n"), vec!["0000000000010101"]);
    }

    #[test]
    fn encodes_c_instruction() {
        assert_eq!(assembled("D=D+A\n"), vec!["1110000010010000"]);
        assert_eq!(assembled("0;JMP\n"), vec!["1110101010000111"]);
        assert_eq!(assembled("AMD=M+1;JNE\n"), vec!["1111110111111101"]);
    }

    #[test]
    fn resolves_forward_label_and_allocates_variable() {
        let lines = assembled("@LOOP\nD=1\n(LOOP)\n@x\n");

        assert_eq!(
            lines,
            vec![
                "0000000000000010", // LOOP is instruction 2
                "1110111111010000", // D=1
                "0000000000010000", // x allocated at 16
            ]
        );
    }

    #[test]
    fn allocates_data_addresses_in_first_reference_order() {
        let lines = assembled("@first\n@second\n@first\n");

        assert_eq!(lines[0], "0000000000010000");
        assert_eq!(lines[1], "0000000000010001");
        assert_eq!(lines[2], "0000000000010000");
    }

    #[test]
    fn strips_comments_and_whitespace() {
        let lines = assembled("  // intro\n\n  @ 2 1  // trailing\n   D = A ; JGT \n");

        assert_eq!(lines, vec!["0000000000010101", "1110110000010001"]);
    }

    #[test]
    fn predefined_symbols_resolve() {
        let lines = assembled("@R13\n@SCREEN\n@KBD\n@SP\n");

        assert_eq!(
            lines,
            vec![
                "0000000000001101",
                "0100000000000000",
                "0110000000000000",
                "0000000000000000",
            ]
        );
    }

    #[test]
    fn duplicate_label_is_fatal() {
        let mut out = Vec::new();
        let err = assemble("(END)\n@END\n(END)\n".as_bytes(), &mut out).unwrap_err();

        assert!(matches!(err, AsmError::DuplicateLabel(s) if s == "END"));
    }

    #[test]
    fn literal_out_of_range_is_fatal() {
        let mut out = Vec::new();
        let err = assemble("@32768\n".as_bytes(), &mut out).unwrap_err();

        assert!(matches!(err, AsmError::LiteralOutOfRange(1, 32768)));

        let mut out = Vec::new();
        assert!(assemble("@32767\n".as_bytes(), &mut out).is_ok());
    }

    #[test]
    fn unknown_mnemonics_are_fatal() {
        for src in ["D=QQQ\n", "X=D\n", "D;JXX\n"] {
            let mut out = Vec::new();
            let err = assemble(src.as_bytes(), &mut out).unwrap_err();
            assert!(matches!(err, AsmError::InvalidCommand(1, _)), "{}", src);
        }
    }

    #[test]
    fn code_tables_are_complete() {
        assert_eq!(code::dest("").unwrap(), 0b000);
        assert_eq!(code::dest("AMD").unwrap(), 0b111);
        assert_eq!(code::jump("JGT").unwrap(), 0b001);
        assert_eq!(code::jump("JMP").unwrap(), 0b111);
        assert_eq!(code::comp("D|M").unwrap(), 0b1010101);
        assert_eq!(code::comp("-M").unwrap(), 0b1110011);
        assert_eq!(code::comp("A-D").unwrap(), 0b0000111);
        assert!(code::comp("M|D").is_err());
    }

    #[test]
    fn parser_classifies_commands() {
        let src = "@2\n(HALT)\nMD=D+1;JGE\n";
        let mut parser = Parser::new(src.as_bytes()).unwrap();

        assert_eq!(
            parser.advance().unwrap(),
            Some(Command::A(ASymbol::Literal(2)))
        );
        assert_eq!(
            parser.advance().unwrap(),
            Some(Command::Label("HALT".to_owned()))
        );
        assert_eq!(
            parser.advance().unwrap(),
            Some(Command::C {
                dest: "MD".to_owned(),
                comp: "D+1".to_owned(),
                jump: "JGE".to_owned(),
            })
        );
        assert_eq!(parser.advance().unwrap(), None);
    }
}
