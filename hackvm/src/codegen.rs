use crate::{ArithmeticKind, Command, Segment, VmError};
use std::borrow::Cow;
use std::io::Write;

type Asm = Vec<Cow<'static, str>>;

fn lines(texts: &[&'static str]) -> Asm {
    texts.iter().map(|&s| s.into()).collect()
}

// *SP = D; SP++ (A is left pointing at the written cell)
const PUSH_D: [&str; 4] = ["@SP", "AM=M+1", "A=A-1", "M=D"];

// SP--; D = *SP
const POP_D: [&str; 3] = ["@SP", "AM=M-1", "D=M"];

fn base_register(segment: Segment) -> &'static str {
    match segment {
        Segment::Local => "LCL",
        Segment::Argument => "ARG",
        Segment::This => "THIS",
        Segment::That => "THAT",
        _ => unreachable!("segment has no base register"),
    }
}

/// Assembly emitter for one output stream.
///
/// Lives for the whole output file: the label counter keeps generated
/// labels unique across every translation unit that feeds the stream,
/// while the unit stem is swapped in per input file.
pub struct CodeWriter<W: Write> {
    out: W,
    unit: String,
    labels: usize,
}

impl<W: Write> CodeWriter<W> {
    pub fn new(out: W) -> Self {
        CodeWriter {
            out,
            unit: String::new(),
            labels: 0,
        }
    }

    /// Sets the translation-unit stem used to mangle `static` references.
    pub fn set_unit(&mut self, stem: &str) {
        self.unit = stem.to_owned();
    }

    fn fresh_label(&mut self, prefix: &str) -> String {
        self.labels += 1;
        format!("{}_{}", prefix, self.labels)
    }

    /// `SP := 256`, then a genuine `call Sys.init 0`.
    pub fn write_bootstrap(&mut self) -> Result<(), VmError> {
        writeln!(self.out, "// bootstrap")?;

        let mut asm = lines(&["@256", "D=A", "@SP", "M=D"]);
        asm.extend(self.call("Sys.init", 0));
        self.emit(&asm)
    }

    /// Translates one command, prefixed by its source form as a comment.
    pub fn write(&mut self, command: &Command) -> Result<(), VmError> {
        writeln!(self.out, "// {}", command)?;

        let asm = match command {
            Command::Arithmetic(kind) => self.arithmetic(*kind),
            Command::Push { segment, index } => self.push(*segment, *index),
            Command::Pop { segment, index } => self.pop(*segment, *index),
            Command::Label(name) => vec![format!("({})", name).into()],
            Command::Goto(name) => goto(name),
            Command::If(name) => {
                let mut asm = lines(&POP_D);
                asm.push(format!("@{}", name).into());
                asm.push("D;JNE".into());
                asm
            }
            Command::Function { name, n_locals } => self.function(name, *n_locals),
            Command::Call { name, n_args } => self.call(name, *n_args),
            Command::Return => self.ret(),
        };

        self.emit(&asm)
    }

    pub fn finish(mut self) -> Result<W, VmError> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn emit(&mut self, asm: &Asm) -> Result<(), VmError> {
        for line in asm {
            writeln!(self.out, "{}", line)?;
        }

        Ok(())
    }

    fn arithmetic(&mut self, kind: ArithmeticKind) -> Asm {
        match kind {
            ArithmeticKind::Add => binary("M=D+M"),
            ArithmeticKind::Sub => binary("M=M-D"),
            ArithmeticKind::And => binary("M=D&M"),
            ArithmeticKind::Or => binary("M=D|M"),
            ArithmeticKind::Neg => lines(&["@SP", "A=M-1", "M=-M"]),
            ArithmeticKind::Not => lines(&["@SP", "A=M-1", "M=!M"]),
            ArithmeticKind::Eq => self.compare("D;JNE"),
            ArithmeticKind::Gt => self.compare("D;JLE"),
            ArithmeticKind::Lt => self.compare("D;JGE"),
        }
    }

    // D := second - top, prime the result cell with false, then skip the
    // true-overwrite on the negated condition. One label per comparison.
    fn compare(&mut self, negated_jump: &'static str) -> Asm {
        let label = self.fresh_label("AR");

        let mut asm = lines(&["@SP", "AM=M-1", "D=M", "A=A-1", "D=M-D", "M=0"]);
        asm.push(format!("@{}", label).into());
        asm.extend(lines(&[negated_jump, "@SP", "A=M-1", "M=-1"]));
        asm.push(format!("({})", label).into());
        asm
    }

    fn push(&mut self, segment: Segment, index: u16) -> Asm {
        let mut asm: Asm = match segment {
            Segment::Constant => {
                vec![format!("@{}", index).into(), "D=A".into()]
            }
            Segment::Static => {
                vec![format!("@{}.{}", self.unit, index).into(), "D=M".into()]
            }
            Segment::Pointer => vec![format!("@R{}", 3 + index).into(), "D=M".into()],
            Segment::Temp => vec![format!("@R{}", 5 + index).into(), "D=M".into()],
            _ => vec![
                format!("@{}", index).into(),
                "D=A".into(),
                format!("@{}", base_register(segment)).into(),
                "A=D+M".into(),
                "D=M".into(),
            ],
        };

        asm.extend(lines(&PUSH_D));
        asm
    }

    fn pop(&mut self, segment: Segment, index: u16) -> Asm {
        match segment {
            Segment::Static => {
                let mut asm = lines(&POP_D);
                asm.push(format!("@{}.{}", self.unit, index).into());
                asm.push("M=D".into());
                asm
            }
            Segment::Pointer | Segment::Temp => {
                let register = if segment == Segment::Pointer { 3 } else { 5 };
                let mut asm = lines(&POP_D);
                asm.push(format!("@R{}", register + index).into());
                asm.push("M=D".into());
                asm
            }
            Segment::Constant => unreachable!("pop constant is rejected by the parser"),
            // materialize base+index in R13 first so the pop is a plain sequence
            _ => {
                let mut asm = vec![format!("@{}", index).into(), "D=A".into()];
                asm.push(format!("@{}", base_register(segment)).into());
                asm.extend(lines(&["D=D+M", "@R13", "M=D"]));
                asm.extend(lines(&POP_D));
                asm.extend(lines(&["@R13", "A=M", "M=D"]));
                asm
            }
        }
    }

    fn function(&mut self, name: &str, n_locals: u16) -> Asm {
        let mut asm: Asm = vec![format!("({})", name).into()];

        for _ in 0..n_locals {
            asm.extend(self.push(Segment::Constant, 0));
        }

        asm
    }

    fn call(&mut self, name: &str, n_args: u16) -> Asm {
        let ret = self.fresh_label("RETURN_ADDRESS");

        // return address is pushed as an address, the caller frame as values
        let mut asm: Asm = vec![format!("@{}", ret).into(), "D=A".into()];
        asm.extend(lines(&PUSH_D));

        for register in ["LCL", "ARG", "THIS", "THAT"] {
            asm.push(format!("@{}", register).into());
            asm.push("D=M".into());
            asm.extend(lines(&PUSH_D));
        }

        // ARG := SP - 5 - nArgs, LCL := SP
        asm.push(format!("@{}", 5 + n_args).into());
        asm.extend(lines(&[
            "D=A", "@SP", "D=M-D", "@ARG", "M=D", "@SP", "D=M", "@LCL", "M=D",
        ]));

        asm.extend(goto(name));
        asm.push(format!("({})", ret).into());
        asm
    }

    fn ret(&mut self) -> Asm {
        // R15 := frame, R14 := return address. R14 must be read before the
        // result is popped: with zero arguments *ARG aliases the slot that
        // holds the return address.
        let mut asm = lines(&[
            "@LCL", "D=M", "@R15", "M=D", "@5", "A=D-A", "D=M", "@R14", "M=D",
        ]);

        // *ARG := result, SP := ARG + 1
        asm.extend(self.pop(Segment::Argument, 0));
        asm.extend(lines(&["@ARG", "D=M+1", "@SP", "M=D"]));

        for (offset, register) in [("1", "THAT"), ("2", "THIS"), ("3", "ARG"), ("4", "LCL")] {
            asm.push(format!("@{}", offset).into());
            asm.extend(lines(&["D=A", "@R15", "A=M-D", "D=M"]));
            asm.push(format!("@{}", register).into());
            asm.push("M=D".into());
        }

        asm.extend(lines(&["@R14", "A=M", "0;JMP"]));
        asm
    }
}

fn binary(op: &'static str) -> Asm {
    let mut asm = lines(&["@SP", "AM=M-1", "D=M", "A=A-1"]);
    asm.push(op.into());
    asm
}

fn goto(label: &str) -> Asm {
    vec![format!("@{}", label).into(), "0;JMP".into()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Parser;

    fn translate(unit: &str, src: &str) -> Vec<String> {
        let mut writer = CodeWriter::new(Vec::new());
        writer.set_unit(unit);

        let mut parser = Parser::new(src.as_bytes()).unwrap();
        while let Some(command) = parser.advance().unwrap() {
            writer.write(&command).unwrap();
        }

        text(writer)
    }

    fn text(writer: CodeWriter<Vec<u8>>) -> Vec<String> {
        String::from_utf8(writer.finish().unwrap())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    fn instructions(lines: &[String]) -> Vec<&str> {
        lines
            .iter()
            .map(String::as_str)
            .filter(|l| !l.starts_with("//"))
            .collect()
    }

    #[test]
    fn push_constant_then_add() {
        let out = translate("Test", "push constant 7\npush constant 8\nadd\n");

        assert_eq!(
            instructions(&out),
            vec![
                "@7", "D=A", "@SP", "AM=M+1", "A=A-1", "M=D", // push constant 7
                "@8", "D=A", "@SP", "AM=M+1", "A=A-1", "M=D", // push constant 8
                "@SP", "AM=M-1", "D=M", "A=A-1", "M=D+M", // add
            ]
        );
    }

    #[test]
    fn comparison_uses_negated_jump_and_fresh_label() {
        let out = translate("Test", "eq\ngt\nlt\n");
        let asm = instructions(&out);

        let eq = &asm[..12];
        assert_eq!(
            eq,
            [
                "@SP", "AM=M-1", "D=M", "A=A-1", "D=M-D", "M=0", "@AR_1", "D;JNE", "@SP", "A=M-1",
                "M=-1", "(AR_1)",
            ]
        );
        assert!(asm.contains(&"D;JLE") && asm.contains(&"@AR_2"));
        assert!(asm.contains(&"D;JGE") && asm.contains(&"@AR_3"));
    }

    #[test]
    fn static_references_carry_the_unit_stem() {
        let out = translate("StaticsTest", "push static 3\npop static 8\n");
        let asm = instructions(&out);

        assert_eq!(asm[0], "@StaticsTest.3");
        assert!(asm.contains(&"@StaticsTest.8"));
    }

    #[test]
    fn indirect_segments_compute_base_plus_index() {
        let out = translate("Test", "push local 2\n");

        assert_eq!(
            instructions(&out),
            vec!["@2", "D=A", "@LCL", "A=D+M", "D=M", "@SP", "AM=M+1", "A=A-1", "M=D"]
        );
    }

    #[test]
    fn pop_indirect_stages_address_in_r13() {
        let out = translate("Test", "pop argument 1\n");

        assert_eq!(
            instructions(&out),
            vec![
                "@1", "D=A", "@ARG", "D=D+M", "@R13", "M=D", // R13 := ARG + 1
                "@SP", "AM=M-1", "D=M", "@R13", "A=M", "M=D",
            ]
        );
    }

    #[test]
    fn pop_direct_segments() {
        let out = translate("Test", "pop temp 6\npop pointer 1\n");
        let asm = instructions(&out);

        assert_eq!(&asm[..5], ["@SP", "AM=M-1", "D=M", "@R11", "M=D"]);
        assert_eq!(&asm[5..], ["@SP", "AM=M-1", "D=M", "@R4", "M=D"]);
    }

    #[test]
    fn branching_commands() {
        let out = translate("Test", "label LOOP\ngoto LOOP\nif-goto LOOP\n");

        assert_eq!(
            instructions(&out),
            vec![
                "(LOOP)",
                "@LOOP",
                "0;JMP",
                "@SP",
                "AM=M-1",
                "D=M",
                "@LOOP",
                "D;JNE",
            ]
        );
    }

    #[test]
    fn function_emits_label_and_zeroed_locals() {
        let out = translate("Test", "function Foo.bar 2\n");
        let asm = instructions(&out);

        assert_eq!(asm[0], "(Foo.bar)");
        assert_eq!(
            asm.iter().filter(|l| **l == "@0").count(),
            2,
            "one zero push per local"
        );
    }

    #[test]
    fn call_builds_the_return_frame() {
        let out = translate("Test", "call Foo.bar 1\n");
        let asm = instructions(&out);

        assert_eq!(&asm[..6], ["@RETURN_ADDRESS_1", "D=A", "@SP", "AM=M+1", "A=A-1", "M=D"]);
        for register in ["@LCL", "@ARG", "@THIS", "@THAT"] {
            assert!(asm.contains(&register), "{} saved", register);
        }

        // ARG := SP - 5 - 1, LCL := SP, then transfer
        let arg = asm.iter().position(|l| *l == "@6").unwrap();
        assert_eq!(
            &asm[arg..arg + 9],
            ["@6", "D=A", "@SP", "D=M-D", "@ARG", "M=D", "@SP", "D=M", "@LCL"]
        );
        assert_eq!(&asm[asm.len() - 3..], ["@Foo.bar", "0;JMP", "(RETURN_ADDRESS_1)"]);
    }

    #[test]
    fn return_restores_the_caller_frame() {
        let out = translate("Test", "return\n");
        let asm = instructions(&out);

        // frame and return address are stashed first
        assert_eq!(
            &asm[..9],
            ["@LCL", "D=M", "@R15", "M=D", "@5", "A=D-A", "D=M", "@R14", "M=D"]
        );
        // result lands in *ARG before SP is rebound
        let sp = asm.iter().position(|l| *l == "D=M+1").unwrap();
        assert_eq!(&asm[sp - 1..sp + 3], ["@ARG", "D=M+1", "@SP", "M=D"]);
        assert_eq!(&asm[asm.len() - 3..], ["@R14", "A=M", "0;JMP"]);
        for register in ["@THAT", "@THIS", "@ARG", "@LCL"] {
            assert!(asm.contains(&register));
        }
    }

    #[test]
    fn label_counter_persists_across_units() {
        let mut writer = CodeWriter::new(Vec::new());

        writer.set_unit("First");
        writer
            .write(&Command::Arithmetic(ArithmeticKind::Eq))
            .unwrap();
        writer.set_unit("Second");
        writer
            .write(&Command::Arithmetic(ArithmeticKind::Lt))
            .unwrap();

        let out = text(writer);
        let asm = instructions(&out);
        assert!(asm.contains(&"(AR_1)"));
        assert!(asm.contains(&"(AR_2)"));
    }

    #[test]
    fn bootstrap_sets_sp_then_calls_sys_init() {
        let mut writer = CodeWriter::new(Vec::new());
        writer.write_bootstrap().unwrap();

        let out = text(writer);
        let asm = instructions(&out);
        assert_eq!(&asm[..4], ["@256", "D=A", "@SP", "M=D"]);
        assert!(asm.contains(&"@Sys.init"));
        assert!(asm.contains(&"(RETURN_ADDRESS_1)"));
    }
}
