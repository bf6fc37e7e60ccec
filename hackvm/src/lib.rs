use std::fmt;
use std::io::BufRead;
use thiserror::Error;

pub mod codegen;

pub use codegen::CodeWriter;

#[derive(Error, Debug)]
pub enum VmError {
    #[error("L{0} invalid command: {1}")]
    InvalidCommand(usize, String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum ArithmeticKind {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl TryFrom<&str> for ArithmeticKind {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, ()> {
        Ok(match value {
            "add" => ArithmeticKind::Add,
            "sub" => ArithmeticKind::Sub,
            "neg" => ArithmeticKind::Neg,
            "eq" => ArithmeticKind::Eq,
            "gt" => ArithmeticKind::Gt,
            "lt" => ArithmeticKind::Lt,
            "and" => ArithmeticKind::And,
            "or" => ArithmeticKind::Or,
            "not" => ArithmeticKind::Not,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for ArithmeticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArithmeticKind::Add => "add",
            ArithmeticKind::Sub => "sub",
            ArithmeticKind::Neg => "neg",
            ArithmeticKind::Eq => "eq",
            ArithmeticKind::Gt => "gt",
            ArithmeticKind::Lt => "lt",
            ArithmeticKind::And => "and",
            ArithmeticKind::Or => "or",
            ArithmeticKind::Not => "not",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum Segment {
    Argument,
    Local,
    Static,
    Constant,
    This,
    That,
    Pointer,
    Temp,
}

impl TryFrom<&str> for Segment {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, ()> {
        Ok(match value {
            "argument" => Segment::Argument,
            "local" => Segment::Local,
            "static" => Segment::Static,
            "constant" => Segment::Constant,
            "this" => Segment::This,
            "that" => Segment::That,
            "pointer" => Segment::Pointer,
            "temp" => Segment::Temp,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Segment::Argument => "argument",
            Segment::Local => "local",
            Segment::Static => "static",
            Segment::Constant => "constant",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum Command {
    Arithmetic(ArithmeticKind),
    Push { segment: Segment, index: u16 },
    Pop { segment: Segment, index: u16 },
    Label(String),
    Goto(String),
    If(String),
    Function { name: String, n_locals: u16 },
    Call { name: String, n_args: u16 },
    Return,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Arithmetic(kind) => write!(f, "{}", kind),
            Command::Push { segment, index } => write!(f, "push {} {}", segment, index),
            Command::Pop { segment, index } => write!(f, "pop {} {}", segment, index),
            Command::Label(name) => write!(f, "label {}", name),
            Command::Goto(name) => write!(f, "goto {}", name),
            Command::If(name) => write!(f, "if-goto {}", name),
            Command::Function { name, n_locals } => write!(f, "function {} {}", name, n_locals),
            Command::Call { name, n_args } => write!(f, "call {} {}", name, n_args),
            Command::Return => write!(f, "return"),
        }
    }
}

fn is_vm_symbol(symbol: &str) -> bool {
    let mut chars = symbol.chars();

    match chars.next() {
        None => false,
        Some(first) if first.is_ascii_digit() => false,
        Some(first) => {
            let ok = |c: char| c.is_alphanumeric() || c == '.' || c == '_' || c == ':';
            ok(first) && chars.all(ok)
        }
    }
}

fn parse_index(text: &str) -> Result<u16, ()> {
    let index = text.parse::<u16>().map_err(|_| ())?;

    // every index must fit an A-instruction operand
    if index > 0x7FFF {
        Err(())
    } else {
        Ok(index)
    }
}

impl TryFrom<&[&str]> for Command {
    type Error = ();

    fn try_from(words: &[&str]) -> Result<Self, ()> {
        Ok(match words {
            [op] => {
                if *op == "return" {
                    Command::Return
                } else {
                    Command::Arithmetic(ArithmeticKind::try_from(*op)?)
                }
            }
            [op @ ("label" | "goto" | "if-goto"), name] if is_vm_symbol(name) => {
                let name = (*name).to_owned();
                match *op {
                    "label" => Command::Label(name),
                    "goto" => Command::Goto(name),
                    _ => Command::If(name),
                }
            }
            ["push", segment, index] | ["pop", segment, index] => {
                let segment = Segment::try_from(*segment)?;
                let index = parse_index(index)?;

                match segment {
                    Segment::Pointer if index > 1 => return Err(()),
                    Segment::Temp if index > 7 => return Err(()),
                    Segment::Constant if words[0] == "pop" => return Err(()),
                    _ => {}
                }

                if words[0] == "push" {
                    Command::Push { segment, index }
                } else {
                    Command::Pop { segment, index }
                }
            }
            ["function", name, n] if is_vm_symbol(name) => Command::Function {
                name: (*name).to_owned(),
                n_locals: parse_index(n)?,
            },
            ["call", name, n] if is_vm_symbol(name) => Command::Call {
                name: (*name).to_owned(),
                n_args: parse_index(n)?,
            },
            _ => return Err(()),
        })
    }
}

/// Pull parser over one `.vm` translation unit with one-command lookahead.
pub struct Parser<T: BufRead> {
    reader: T,
    next: Option<Command>,
    line: usize,
}

impl<T: BufRead> Parser<T> {
    pub fn new(reader: T) -> Result<Self, VmError> {
        let mut parser = Parser {
            reader,
            next: None,
            line: 0,
        };

        parser.advance()?;

        Ok(parser)
    }

    /// Returns the current command and reads ahead to the next one.
    pub fn advance(&mut self) -> Result<Option<Command>, VmError> {
        let current = self.next.take();
        let mut line = String::new();

        while self.reader.read_line(&mut line)? != 0 {
            self.line += 1;

            let words = line
                .split("//")
                .next()
                .unwrap_or("")
                .split_whitespace()
                .collect::<Vec<_>>();

            if words.is_empty() {
                line.clear();
                continue;
            }

            self.next = Some(
                Command::try_from(&words[..])
                    .map_err(|_| VmError::InvalidCommand(self.line, line.trim().to_owned()))?,
            );
            break;
        }

        Ok(current)
    }
}
