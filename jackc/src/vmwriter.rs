use std::fmt;
use std::io::{self, Write};

/// A virtual memory segment of the stack machine.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Segment::Constant => "constant",
            Segment::Argument => "argument",
            Segment::Local => "local",
            Segment::Static => "static",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
        };
        write!(f, "{}", name)
    }
}

/// Emits VM commands, one per line.
pub struct VmWriter<W: Write> {
    out: W,
}

impl<W: Write> VmWriter<W> {
    pub fn new(out: W) -> Self {
        VmWriter { out }
    }

    pub fn push(&mut self, segment: Segment, index: u16) -> io::Result<()> {
        writeln!(self.out, "push {} {}", segment, index)
    }

    pub fn pop(&mut self, segment: Segment, index: u16) -> io::Result<()> {
        writeln!(self.out, "pop {} {}", segment, index)
    }

    pub fn arithmetic(&mut self, op: &str) -> io::Result<()> {
        writeln!(self.out, "{}", op)
    }

    pub fn label(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "label {}", label)
    }

    pub fn goto(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "goto {}", label)
    }

    pub fn if_goto(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "if-goto {}", label)
    }

    pub fn call(&mut self, name: &str, n_args: u16) -> io::Result<()> {
        writeln!(self.out, "call {} {}", name, n_args)
    }

    pub fn function(&mut self, name: &str, n_locals: u16) -> io::Result<()> {
        writeln!(self.out, "function {} {}", name, n_locals)
    }

    pub fn ret(&mut self) -> io::Result<()> {
        writeln!(self.out, "return")
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_command_per_line() {
        let mut writer = VmWriter::new(Vec::new());

        writer.push(Segment::Constant, 7).unwrap();
        writer.pop(Segment::Temp, 0).unwrap();
        writer.if_goto("WHILE_END_1").unwrap();
        writer.call("Math.multiply", 2).unwrap();
        writer.function("Main.main", 0).unwrap();
        writer.ret().unwrap();

        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(
            text,
            "push constant 7\n\
             pop temp 0\n\
             if-goto WHILE_END_1\n\
             call Math.multiply 2\n\
             function Main.main 0\n\
             return\n"
        );
    }
}
