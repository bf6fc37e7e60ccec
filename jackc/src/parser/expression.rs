use crate::codegen::{Codegen, CodegenContext};
use crate::lexer::{JackTokenizer, KeywordKind, SymbolKind, Token};
use crate::parser::{Parse, Type};
use crate::vmwriter::{Segment, VmWriter};
use crate::{escape_xml, JackcError};
use std::io::{Read, Write};

/// A term followed by any number of `(op term)` pairs, applied strictly
/// left to right.
#[derive(Debug)]
pub(crate) struct Expression {
    term: Term,
    ops: Vec<(Op, Term)>,
}

impl Parse for Expression {
    fn parse<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Expression, JackcError> {
        let term = Term::parse(tokenizer)?;
        let mut ops = vec![];
        let mut next = tokenizer.advance()?;

        while let Ok(op) = Op::try_from(&next) {
            ops.push((op, Term::parse(tokenizer)?));
            next = tokenizer.advance()?;
        }

        tokenizer.unread_token(next);

        Ok(Expression { term, ops })
    }
}

// a parenthesized, comma-separated argument list
impl Parse for Vec<Expression> {
    fn parse<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Self, JackcError> {
        tokenizer.advance()?.expect_given_symbol(b'(')?;

        let mut args = vec![];
        let mut next = tokenizer.advance()?;

        while next != Token::Symbol(SymbolKind(b')')) {
            if next != Token::Symbol(SymbolKind(b',')) {
                tokenizer.unread_token(next);
            }
            args.push(Expression::parse(tokenizer)?);
            next = tokenizer.advance()?;
        }

        Ok(args)
    }
}

impl Codegen for Expression {
    fn generate<W: Write>(
        &self,
        out: &mut VmWriter<W>,
        ctx: &mut CodegenContext,
    ) -> Result<(), JackcError> {
        self.term.generate(out, ctx)?;

        for (op, term) in &self.ops {
            term.generate(out, ctx)?;

            match op.0 {
                b'+' => out.arithmetic("add")?,
                b'-' => out.arithmetic("sub")?,
                b'&' => out.arithmetic("and")?,
                b'|' => out.arithmetic("or")?,
                b'<' => out.arithmetic("lt")?,
                b'>' => out.arithmetic("gt")?,
                b'=' => out.arithmetic("eq")?,
                b'*' => out.call("Math.multiply", 2)?,
                b'/' => out.call("Math.divide", 2)?,
                _ => unreachable!("Op admits no other symbol"),
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "<expression>")?;
        writeln!(f, "{}", self.term)?;
        for (op, term) in &self.ops {
            writeln!(f, "{}", op)?;
            writeln!(f, "{}", term)?;
        }
        write!(f, "</expression>")?;
        Ok(())
    }
}

#[derive(Debug)]
enum Term {
    IntConst(u16),
    StringConst(String),
    True,
    False,
    Null,
    This,
    Var(String),
    IndexedVar(String, Box<Expression>),
    Call(SubroutineCall),
    Parenthesized(Box<Expression>),
    Unary(UnaryOp, Box<Term>),
}

impl Parse for Term {
    fn parse<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Term, JackcError> {
        match tokenizer.advance()? {
            Token::IntConst(value) => Ok(Term::IntConst(value)),
            Token::StringConst(value) => Ok(Term::StringConst(value)),
            Token::Keyword(KeywordKind::True) => Ok(Term::True),
            Token::Keyword(KeywordKind::False) => Ok(Term::False),
            Token::Keyword(KeywordKind::Null) => Ok(Term::Null),
            Token::Keyword(KeywordKind::This) => Ok(Term::This),
            Token::Identifier(ident) => match tokenizer.advance()? {
                Token::Symbol(SymbolKind(b'[')) => {
                    let index = Box::new(Expression::parse(tokenizer)?);
                    tokenizer.advance()?.expect_given_symbol(b']')?;
                    Ok(Term::IndexedVar(ident, index))
                }
                token @ Token::Symbol(SymbolKind(b'(' | b'.')) => {
                    tokenizer.unread_token(token);
                    Ok(Term::Call(SubroutineCall::parse_with_first_ident(
                        ident, tokenizer,
                    )?))
                }
                token => {
                    tokenizer.unread_token(token);
                    Ok(Term::Var(ident))
                }
            },
            Token::Symbol(SymbolKind(b'(')) => {
                let inner = Expression::parse(tokenizer)?;
                tokenizer.advance()?.expect_given_symbol(b')')?;
                Ok(Term::Parenthesized(Box::new(inner)))
            }
            token @ Token::Symbol(_) => {
                let op = UnaryOp::try_from(&token).map_err(|_| JackcError::Expected("term"))?;
                Ok(Term::Unary(op, Box::new(Term::parse(tokenizer)?)))
            }
            _ => Err(JackcError::Expected("term")),
        }
    }
}

impl Codegen for Term {
    fn generate<W: Write>(
        &self,
        out: &mut VmWriter<W>,
        ctx: &mut CodegenContext,
    ) -> Result<(), JackcError> {
        match self {
            Term::IntConst(value) => out.push(Segment::Constant, *value)?,
            Term::StringConst(value) => {
                let bytes = value.as_bytes();
                out.push(Segment::Constant, bytes.len() as u16)?;
                out.call("String.new", 1)?;

                for byte in bytes {
                    out.push(Segment::Constant, u16::from(*byte))?;
                    out.call("String.appendChar", 2)?;
                }
            }
            Term::True => {
                out.push(Segment::Constant, 1)?;
                out.arithmetic("neg")?;
            }
            Term::False | Term::Null => out.push(Segment::Constant, 0)?,
            Term::This => out.push(Segment::Pointer, 0)?,
            Term::Var(name) => {
                let (segment, index) = resolve_var(ctx, name)?;
                out.push(segment, index)?;
            }
            Term::IndexedVar(name, index) => {
                let (segment, var_index) = resolve_var(ctx, name)?;
                out.push(segment, var_index)?;
                index.generate(out, ctx)?;
                out.arithmetic("add")?;
                out.pop(Segment::Pointer, 1)?;
                out.push(Segment::That, 0)?;
            }
            Term::Call(call) => call.generate(out, ctx)?,
            Term::Parenthesized(inner) => inner.generate(out, ctx)?,
            Term::Unary(op, term) => {
                term.generate(out, ctx)?;
                match op.0 {
                    b'-' => out.arithmetic("neg")?,
                    b'~' => out.arithmetic("not")?,
                    _ => unreachable!("UnaryOp admits no other symbol"),
                }
            }
        }

        Ok(())
    }
}

fn resolve_var(ctx: &CodegenContext, name: &str) -> Result<(Segment, u16), JackcError> {
    ctx.resolve(name)
        .map(|(segment, _, index)| (segment, index))
        .ok_or_else(|| JackcError::UnknownVariable(name.to_owned()))
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "<term>")?;
        match self {
            Term::IntConst(value) => {
                writeln!(f, "<integerConstant> {} </integerConstant>", value)?;
            }
            Term::StringConst(value) => {
                writeln!(f, "<stringConstant> {} </stringConstant>", escape_xml(value))?;
            }
            Term::True => writeln!(f, "<keyword> true </keyword>")?,
            Term::False => writeln!(f, "<keyword> false </keyword>")?,
            Term::Null => writeln!(f, "<keyword> null </keyword>")?,
            Term::This => writeln!(f, "<keyword> this </keyword>")?,
            Term::Var(name) => writeln!(f, "<identifier> {} </identifier>", name)?,
            Term::IndexedVar(name, index) => {
                writeln!(f, "<identifier> {} </identifier>", name)?;
                writeln!(f, "<symbol> [ </symbol>")?;
                writeln!(f, "{}", index)?;
                writeln!(f, "<symbol> ] </symbol>")?;
            }
            Term::Call(call) => writeln!(f, "{}", call)?,
            Term::Parenthesized(inner) => {
                writeln!(f, "<symbol> ( </symbol>")?;
                writeln!(f, "{}", inner)?;
                writeln!(f, "<symbol> ) </symbol>")?;
            }
            Term::Unary(op, term) => {
                writeln!(f, "<symbol> {} </symbol>", op.0 as char)?;
                writeln!(f, "{}", term)?;
            }
        }
        write!(f, "</term>")?;
        Ok(())
    }
}

#[derive(Debug)]
enum CallKind {
    /// `name(args)` — a method call on the current object.
    OnThis,
    /// `receiver.name(args)` — a method call through a variable, or a
    /// function call on another class, decided at generation time.
    Qualified(String),
}

#[derive(Debug)]
pub(crate) struct SubroutineCall {
    kind: CallKind,
    name: String,
    args: Vec<Expression>,
}

impl SubroutineCall {
    pub(crate) fn parse_with_first_ident<T: Read>(
        first: String,
        tokenizer: &mut JackTokenizer<T>,
    ) -> Result<SubroutineCall, JackcError> {
        match tokenizer.advance()? {
            token @ Token::Symbol(SymbolKind(b'(')) => {
                tokenizer.unread_token(token);
                Ok(SubroutineCall {
                    kind: CallKind::OnThis,
                    name: first,
                    args: Vec::<Expression>::parse(tokenizer)?,
                })
            }
            Token::Symbol(SymbolKind(b'.')) => {
                let name = tokenizer.advance()?.expect_identifier()?;
                Ok(SubroutineCall {
                    kind: CallKind::Qualified(first),
                    name,
                    args: Vec::<Expression>::parse(tokenizer)?,
                })
            }
            _ => Err(JackcError::ExpectedChar('(')),
        }
    }
}

impl Codegen for SubroutineCall {
    fn generate<W: Write>(
        &self,
        out: &mut VmWriter<W>,
        ctx: &mut CodegenContext,
    ) -> Result<(), JackcError> {
        let (target, n_args) = match &self.kind {
            CallKind::OnThis => {
                out.push(Segment::Pointer, 0)?;
                (
                    format!("{}.{}", ctx.class_name, self.name),
                    self.args.len() + 1,
                )
            }
            CallKind::Qualified(receiver) => {
                let resolved = ctx
                    .resolve(receiver)
                    .map(|(segment, v_type, index)| (segment, v_type.clone(), index));

                match resolved {
                    Some((segment, Type::Class(class), index)) => {
                        out.push(segment, index)?;
                        (format!("{}.{}", class, self.name), self.args.len() + 1)
                    }
                    Some(_) => return Err(JackcError::PrimitiveReceiver(receiver.clone())),
                    None => (
                        format!("{}.{}", receiver, self.name),
                        self.args.len(),
                    ),
                }
            }
        };

        for arg in &self.args {
            arg.generate(out, ctx)?;
        }

        out.call(&target, n_args as u16)?;

        Ok(())
    }
}

impl std::fmt::Display for SubroutineCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let CallKind::Qualified(receiver) = &self.kind {
            writeln!(f, "<identifier> {} </identifier>", receiver)?;
            writeln!(f, "<symbol> . </symbol>")?;
        }
        writeln!(f, "<identifier> {} </identifier>", self.name)?;
        writeln!(f, "<symbol> ( </symbol>")?;
        writeln!(f, "<expressionList>")?;
        for (n, arg) in self.args.iter().enumerate() {
            if n != 0 {
                writeln!(f, "<symbol> , </symbol>")?;
            }
            writeln!(f, "{}", arg)?;
        }
        writeln!(f, "</expressionList>")?;
        write!(f, "<symbol> ) </symbol>")?;
        Ok(())
    }
}

#[derive(Debug, Eq, PartialEq)]
struct Op(u8);

impl TryFrom<&Token> for Op {
    type Error = ();

    fn try_from(token: &Token) -> Result<Op, ()> {
        match token {
            Token::Symbol(SymbolKind(
                c @ (b'+' | b'-' | b'*' | b'/' | b'&' | b'|' | b'<' | b'>' | b'='),
            )) => Ok(Op(*c)),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<symbol> {} </symbol>",
            escape_xml(&(self.0 as char).to_string())
        )
    }
}

#[derive(Debug, Eq, PartialEq)]
struct UnaryOp(u8);

impl TryFrom<&Token> for UnaryOp {
    type Error = ();

    fn try_from(token: &Token) -> Result<UnaryOp, ()> {
        match token {
            Token::Symbol(SymbolKind(c @ (b'-' | b'~'))) => Ok(UnaryOp(*c)),
            _ => Err(()),
        }
    }
}
