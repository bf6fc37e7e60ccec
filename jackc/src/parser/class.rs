use crate::codegen::{Codegen, CodegenContext};
use crate::lexer::{JackTokenizer, KeywordKind, SymbolKind, Token};
use crate::parser::statement::Statement;
use crate::parser::Parse;
use crate::symbols::Kind;
use crate::vmwriter::{Segment, VmWriter};
use crate::JackcError;
use std::io::{Read, Write};

/// One translation unit: exactly one class per `.jack` file.
#[derive(Debug)]
pub struct Class {
    name: String,
    var_decs: Vec<ClassVarDec>,
    subroutines: Vec<Subroutine>,
}

impl Class {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Parse for Class {
    fn parse<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Class, JackcError> {
        if tokenizer.advance()? != Token::Keyword(KeywordKind::Class) {
            return Err(JackcError::Expected("class"));
        }

        let name = tokenizer.advance()?.expect_identifier()?;
        tokenizer.advance()?.expect_given_symbol(b'{')?;

        let mut var_decs = vec![];
        while let Some(dec) = Option::<ClassVarDec>::parse(tokenizer)? {
            var_decs.push(dec);
        }

        let mut subroutines = vec![];
        while let Some(subroutine) = Option::<Subroutine>::parse(tokenizer)? {
            subroutines.push(subroutine);
        }

        tokenizer.advance()?.expect_given_symbol(b'}')?;

        if tokenizer.advance()? != Token::EndOfFile {
            Err(JackcError::InvalidSyntax)
        } else {
            Ok(Class {
                name,
                var_decs,
                subroutines,
            })
        }
    }
}

impl Codegen for Class {
    fn generate<W: Write>(
        &self,
        out: &mut VmWriter<W>,
        ctx: &mut CodegenContext,
    ) -> Result<(), JackcError> {
        ctx.class_name = self.name.clone();

        for dec in &self.var_decs {
            for name in &dec.names {
                ctx.symbols.define(name, dec.v_type.clone(), dec.kind.into());
            }
        }

        for subroutine in &self.subroutines {
            subroutine.generate(out, ctx)?;
        }

        Ok(())
    }
}

impl std::fmt::Display for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "<class>")?;
        writeln!(f, "<keyword> class </keyword>")?;
        writeln!(f, "<identifier> {} </identifier>", self.name)?;
        writeln!(f, "<symbol> {{ </symbol>")?;
        for dec in &self.var_decs {
            writeln!(f, "{}", dec)?;
        }
        for subroutine in &self.subroutines {
            writeln!(f, "{}", subroutine)?;
        }
        writeln!(f, "<symbol> }} </symbol>")?;
        write!(f, "</class>")?;
        Ok(())
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
enum ClassVarKind {
    Static,
    Field,
}

impl From<ClassVarKind> for Kind {
    fn from(kind: ClassVarKind) -> Kind {
        match kind {
            ClassVarKind::Static => Kind::Static,
            ClassVarKind::Field => Kind::Field,
        }
    }
}

impl std::fmt::Display for ClassVarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassVarKind::Static => write!(f, "<keyword> static </keyword>"),
            ClassVarKind::Field => write!(f, "<keyword> field </keyword>"),
        }
    }
}

/// One `static`/`field` declaration line, possibly naming several variables.
#[derive(Debug)]
struct ClassVarDec {
    kind: ClassVarKind,
    v_type: Type,
    names: Vec<String>,
}

impl Parse for Option<ClassVarDec> {
    fn parse<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Self, JackcError> {
        let kind = match tokenizer.advance()? {
            Token::Keyword(KeywordKind::Static) => ClassVarKind::Static,
            Token::Keyword(KeywordKind::Field) => ClassVarKind::Field,
            token => {
                tokenizer.unread_token(token);
                return Ok(None);
            }
        };

        let v_type = Type::parse_no_void(tokenizer)?;
        let names = declared_names(tokenizer)?;

        Ok(Some(ClassVarDec {
            kind,
            v_type,
            names,
        }))
    }
}

impl std::fmt::Display for ClassVarDec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "<classVarDec>")?;
        writeln!(f, "{}", self.kind)?;
        fmt_names(&self.v_type, &self.names, f)?;
        write!(f, "</classVarDec>")?;
        Ok(())
    }
}

// type name (, name)* ;
fn fmt_names(v_type: &Type, names: &[String], f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    writeln!(f, "{}", v_type)?;
    writeln!(f, "<identifier> {} </identifier>", names[0])?;
    for name in &names[1..] {
        writeln!(f, "<symbol> , </symbol>")?;
        writeln!(f, "<identifier> {} </identifier>", name)?;
    }
    writeln!(f, "<symbol> ; </symbol>")?;
    Ok(())
}

fn declared_names<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Vec<String>, JackcError> {
    let mut names = vec![tokenizer.advance()?.expect_identifier()?];

    loop {
        match tokenizer.advance()?.expect_symbol()? {
            b';' => break,
            b',' => names.push(tokenizer.advance()?.expect_identifier()?),
            _ => return Err(JackcError::InvalidSyntax),
        }
    }

    Ok(names)
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Type {
    Int,
    Char,
    Boolean,
    Void,
    Class(String),
}

impl Type {
    fn parse_no_void<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Type, JackcError> {
        match Type::parse(tokenizer)? {
            Type::Void => Err(JackcError::InvalidSyntax),
            v_type => Ok(v_type),
        }
    }
}

impl Parse for Type {
    fn parse<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Type, JackcError> {
        match tokenizer.advance()? {
            Token::Keyword(KeywordKind::Int) => Ok(Type::Int),
            Token::Keyword(KeywordKind::Char) => Ok(Type::Char),
            Token::Keyword(KeywordKind::Boolean) => Ok(Type::Boolean),
            Token::Keyword(KeywordKind::Void) => Ok(Type::Void),
            Token::Identifier(name) => Ok(Type::Class(name)),
            _ => Err(JackcError::Expected("type")),
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "<keyword> int </keyword>"),
            Type::Char => write!(f, "<keyword> char </keyword>"),
            Type::Boolean => write!(f, "<keyword> boolean </keyword>"),
            Type::Void => write!(f, "<keyword> void </keyword>"),
            Type::Class(name) => write!(f, "<identifier> {} </identifier>", name),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

impl std::fmt::Display for SubroutineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubroutineKind::Constructor => write!(f, "<keyword> constructor </keyword>"),
            SubroutineKind::Function => write!(f, "<keyword> function </keyword>"),
            SubroutineKind::Method => write!(f, "<keyword> method </keyword>"),
        }
    }
}

#[derive(Debug)]
struct Subroutine {
    kind: SubroutineKind,
    ret: Type,
    name: String,
    params: Vec<Parameter>,
    body: SubroutineBody,
}

impl Parse for Option<Subroutine> {
    fn parse<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Self, JackcError> {
        let kind = match tokenizer.advance()? {
            Token::Keyword(KeywordKind::Constructor) => SubroutineKind::Constructor,
            Token::Keyword(KeywordKind::Function) => SubroutineKind::Function,
            Token::Keyword(KeywordKind::Method) => SubroutineKind::Method,
            token => {
                tokenizer.unread_token(token);
                return Ok(None);
            }
        };

        let ret = Type::parse(tokenizer)?;
        let name = tokenizer.advance()?.expect_identifier()?;
        let params = Vec::<Parameter>::parse(tokenizer)?;
        let body = SubroutineBody::parse(tokenizer)?;

        Ok(Some(Subroutine {
            kind,
            ret,
            name,
            params,
            body,
        }))
    }
}

impl Codegen for Subroutine {
    fn generate<W: Write>(
        &self,
        out: &mut VmWriter<W>,
        ctx: &mut CodegenContext,
    ) -> Result<(), JackcError> {
        ctx.symbols.start_subroutine();

        // a method's receiver is argument 0, before any declared parameter
        if self.kind == SubroutineKind::Method {
            ctx.symbols
                .define("this", Type::Class(ctx.class_name.clone()), Kind::Arg);
        }
        for param in &self.params {
            ctx.symbols.define(&param.name, param.v_type.clone(), Kind::Arg);
        }
        for dec in &self.body.var_decs {
            for name in &dec.names {
                ctx.symbols.define(name, dec.v_type.clone(), Kind::Var);
            }
        }

        let qualified = format!("{}.{}", ctx.class_name, self.name);
        out.function(&qualified, ctx.symbols.var_count(Kind::Var))?;

        match self.kind {
            SubroutineKind::Constructor => {
                out.push(Segment::Constant, ctx.symbols.var_count(Kind::Field))?;
                out.call("Memory.alloc", 1)?;
                out.pop(Segment::Pointer, 0)?;
            }
            SubroutineKind::Method => {
                out.push(Segment::Argument, 0)?;
                out.pop(Segment::Pointer, 0)?;
            }
            SubroutineKind::Function => {}
        }

        for statement in &self.body.statements {
            statement.generate(out, ctx)?;
        }

        Ok(())
    }
}

impl std::fmt::Display for Subroutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "<subroutineDec>")?;
        writeln!(f, "{}", self.kind)?;
        writeln!(f, "{}", self.ret)?;
        writeln!(f, "<identifier> {} </identifier>", self.name)?;
        writeln!(f, "<symbol> ( </symbol>")?;
        writeln!(f, "<parameterList>")?;
        for (n, param) in self.params.iter().enumerate() {
            if n != 0 {
                writeln!(f, "<symbol> , </symbol>")?;
            }
            writeln!(f, "{}", param)?;
        }
        writeln!(f, "</parameterList>")?;
        writeln!(f, "<symbol> ) </symbol>")?;
        writeln!(f, "{}", self.body)?;
        write!(f, "</subroutineDec>")?;
        Ok(())
    }
}

#[derive(Debug)]
struct Parameter {
    v_type: Type,
    name: String,
}

impl Parse for Vec<Parameter> {
    fn parse<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Self, JackcError> {
        tokenizer.advance()?.expect_given_symbol(b'(')?;

        let mut params = vec![];
        let mut token = tokenizer.advance()?;

        while token != Token::Symbol(SymbolKind(b')')) {
            if token != Token::Symbol(SymbolKind(b',')) {
                tokenizer.unread_token(token);
            }

            params.push(Parameter {
                v_type: Type::parse_no_void(tokenizer)?,
                name: tokenizer.advance()?.expect_identifier()?,
            });

            token = tokenizer.advance()?;
        }

        Ok(params)
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.v_type)?;
        write!(f, "<identifier> {} </identifier>", self.name)?;
        Ok(())
    }
}

#[derive(Debug)]
struct SubroutineBody {
    var_decs: Vec<VarDec>,
    statements: Vec<Statement>,
}

impl Parse for SubroutineBody {
    fn parse<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Self, JackcError> {
        tokenizer.advance()?.expect_given_symbol(b'{')?;

        let mut var_decs = vec![];
        while let Some(dec) = Option::<VarDec>::parse(tokenizer)? {
            var_decs.push(dec);
        }

        let statements = Vec::<Statement>::parse(tokenizer)?;
        tokenizer.advance()?.expect_given_symbol(b'}')?;

        Ok(SubroutineBody {
            var_decs,
            statements,
        })
    }
}

impl std::fmt::Display for SubroutineBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "<subroutineBody>")?;
        writeln!(f, "<symbol> {{ </symbol>")?;
        for dec in &self.var_decs {
            writeln!(f, "{}", dec)?;
        }
        writeln!(f, "<statements>")?;
        for statement in &self.statements {
            writeln!(f, "{}", statement)?;
        }
        writeln!(f, "</statements>")?;
        writeln!(f, "<symbol> }} </symbol>")?;
        write!(f, "</subroutineBody>")?;
        Ok(())
    }
}

/// One `var` declaration line inside a subroutine body.
#[derive(Debug)]
struct VarDec {
    v_type: Type,
    names: Vec<String>,
}

impl Parse for Option<VarDec> {
    fn parse<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Self, JackcError> {
        match tokenizer.advance()? {
            Token::Keyword(KeywordKind::Var) => {}
            token => {
                tokenizer.unread_token(token);
                return Ok(None);
            }
        }

        let v_type = Type::parse_no_void(tokenizer)?;
        let names = declared_names(tokenizer)?;

        Ok(Some(VarDec { v_type, names }))
    }
}

impl std::fmt::Display for VarDec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "<varDec>")?;
        writeln!(f, "<keyword> var </keyword>")?;
        fmt_names(&self.v_type, &self.names, f)?;
        write!(f, "</varDec>")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(src: &str) -> Vec<String> {
        let mut tokenizer = JackTokenizer::new(src.as_bytes());
        let class = Class::parse(&mut tokenizer).unwrap();

        let mut out = VmWriter::new(Vec::new());
        let mut ctx = CodegenContext::new();
        class.generate(&mut out, &mut ctx).unwrap();

        String::from_utf8(out.finish().unwrap())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn method_call_on_the_current_object() {
        let out = compile(
            "class Square {
                 field int size;
                 method void draw() { return; }
                 method void run() { do draw(); return; }
             }",
        );

        let run = out.iter().position(|l| l == "function Square.run 0").unwrap();
        assert_eq!(
            &out[run + 1..run + 6],
            [
                "push argument 0",
                "pop pointer 0",
                "push pointer 0",
                "call Square.draw 1",
                "pop temp 0",
            ]
        );
    }

    #[test]
    fn string_literals_build_through_the_os() {
        let out = compile(
            "class Main {
                 function void main() { do Output.printString(\"Hi\"); return; }
             }",
        );

        assert_eq!(
            &out[1..9],
            [
                "push constant 2",
                "call String.new 1",
                "push constant 72",
                "call String.appendChar 2",
                "push constant 105",
                "call String.appendChar 2",
                "call Output.printString 1",
                "pop temp 0",
            ]
        );
    }

    #[test]
    fn array_to_array_assignment() {
        let out = compile(
            "class Main {
                 function void main() {
                     var Array a;
                     var int i, j;
                     let a[i] = a[j];
                     return;
                 }
             }",
        );

        assert_eq!(
            &out[1..13],
            [
                "push local 0",
                "push local 1",
                "add",
                "push local 0",
                "push local 2",
                "add",
                "pop pointer 1",
                "push that 0",
                "pop temp 0",
                "pop pointer 1",
                "push temp 0",
                "pop that 0",
            ]
        );
    }

    #[test]
    fn constructor_allocates_one_cell_per_field() {
        let out = compile(
            "class Point {
                 field int x, y;
                 static int count;
                 constructor Point new(int ax, int ay) {
                     let x = ax;
                     let y = ay;
                     return this;
                 }
             }",
        );

        assert_eq!(
            out,
            vec![
                "function Point.new 0",
                "push constant 2",
                "call Memory.alloc 1",
                "pop pointer 0",
                "push argument 0",
                "pop this 0",
                "push argument 1",
                "pop this 1",
                "push pointer 0",
                "return",
            ]
        );
    }

    #[test]
    fn functions_have_no_prologue_and_see_statics() {
        let out = compile(
            "class Counter {
                 static int total;
                 function void bump() { let total = total + 1; return; }
             }",
        );

        assert_eq!(
            out,
            vec![
                "function Counter.bump 0",
                "push static 0",
                "push constant 1",
                "add",
                "pop static 0",
                "push constant 0",
                "return",
            ]
        );
    }

    #[test]
    fn control_labels_are_unique_per_class() {
        let out = compile(
            "class Main {
                 function int main() {
                     var int n;
                     let n = 0;
                     while (n < 10) {
                         if (n = 5) { let n = n + 2; }
                         else { let n = n + 1; }
                     }
                     return n;
                 }
             }",
        );

        let while_start = out.iter().position(|l| l == "label WHILE_START_1").unwrap();
        assert_eq!(
            &out[while_start..while_start + 6],
            [
                "label WHILE_START_1",
                "push local 0",
                "push constant 10",
                "lt",
                "not",
                "if-goto WHILE_END_1",
            ]
        );

        assert!(out.contains(&"if-goto IF_FALSE_2".to_owned()));
        assert!(out.contains(&"goto IF_END_2".to_owned()));
        assert!(out.contains(&"label IF_FALSE_2".to_owned()));
        assert!(out.contains(&"label IF_END_2".to_owned()));
        assert!(out.contains(&"goto WHILE_START_1".to_owned()));
        assert!(out.contains(&"label WHILE_END_1".to_owned()));
    }

    #[test]
    fn operators_apply_left_to_right() {
        let out = compile("class Main { function int main() { return 2 + 3 * 4 / 6; } }");

        assert_eq!(
            &out[1..9],
            [
                "push constant 2",
                "push constant 3",
                "add",
                "push constant 4",
                "call Math.multiply 2",
                "push constant 6",
                "call Math.divide 2",
                "return",
            ]
        );
    }

    #[test]
    fn if_without_else_still_emits_the_end_label() {
        let out = compile(
            "class Main {
                 function void main(boolean b) { if (b) { return; } return; }
             }",
        );

        assert_eq!(
            &out[1..],
            [
                "push argument 0",
                "not",
                "if-goto IF_FALSE_1",
                "push constant 0",
                "return",
                "goto IF_END_1",
                "label IF_FALSE_1",
                "label IF_END_1",
                "push constant 0",
                "return",
            ]
        );
    }

    #[test]
    fn unknown_variables_are_fatal() {
        let mut tokenizer = JackTokenizer::new(
            "class Main { function void main() { let ghost = 1; return; } }".as_bytes(),
        );
        let class = Class::parse(&mut tokenizer).unwrap();

        let mut out = VmWriter::new(Vec::new());
        let mut ctx = CodegenContext::new();
        let err = class.generate(&mut out, &mut ctx).unwrap_err();

        assert!(matches!(err, JackcError::UnknownVariable(name) if name == "ghost"));
    }

    #[test]
    fn parse_tree_renders_the_grammar_shape() {
        let mut tokenizer =
            JackTokenizer::new("class Tiny { field int x; method int get() { return x; } }".as_bytes());
        let class = Class::parse(&mut tokenizer).unwrap();
        let xml = class.to_string();

        for fragment in [
            "<class>",
            "<classVarDec>",
            "<keyword> field </keyword>",
            "<subroutineDec>",
            "<parameterList>",
            "<subroutineBody>",
            "<returnStatement>",
            "</class>",
        ] {
            assert!(xml.contains(fragment), "missing {}", fragment);
        }
    }

    #[test]
    fn a_class_must_fill_its_file() {
        let mut tokenizer = JackTokenizer::new("class A { } class B { }".as_bytes());
        assert!(Class::parse(&mut tokenizer).is_err());
    }
}
