use crate::codegen::{Codegen, CodegenContext};
use crate::lexer::{JackTokenizer, KeywordKind, SymbolKind, Token};
use crate::parser::expression::{Expression, SubroutineCall};
use crate::parser::Parse;
use crate::vmwriter::{Segment, VmWriter};
use crate::JackcError;
use std::io::{Read, Write};

#[derive(Debug)]
pub(crate) enum Statement {
    Let {
        var_name: String,
        index: Option<Expression>,
        rhs: Expression,
    },
    If {
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    Do {
        call: SubroutineCall,
    },
    Return {
        value: Option<Expression>,
    },
}

impl Parse for Statement {
    fn parse<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Statement, JackcError> {
        match tokenizer.advance()?.expect_keyword()? {
            KeywordKind::Let => {
                let var_name = tokenizer.advance()?.expect_identifier()?;

                let index = match tokenizer.advance()?.expect_symbol()? {
                    b'[' => {
                        let index = Expression::parse(tokenizer)?;
                        tokenizer.advance()?.expect_given_symbol(b']')?;
                        tokenizer.advance()?.expect_given_symbol(b'=')?;
                        Some(index)
                    }
                    b'=' => None,
                    _ => return Err(JackcError::ExpectedChar('=')),
                };

                let rhs = Expression::parse(tokenizer)?;
                tokenizer.advance()?.expect_given_symbol(b';')?;

                Ok(Statement::Let {
                    var_name,
                    index,
                    rhs,
                })
            }
            KeywordKind::If => {
                tokenizer.advance()?.expect_given_symbol(b'(')?;
                let condition = Expression::parse(tokenizer)?;
                tokenizer.advance()?.expect_given_symbol(b')')?;

                tokenizer.advance()?.expect_given_symbol(b'{')?;
                let then_branch = Vec::<Statement>::parse(tokenizer)?;
                tokenizer.advance()?.expect_given_symbol(b'}')?;

                let token = tokenizer.advance()?;
                let else_branch = if token == Token::Keyword(KeywordKind::Else) {
                    tokenizer.advance()?.expect_given_symbol(b'{')?;
                    let statements = Vec::<Statement>::parse(tokenizer)?;
                    tokenizer.advance()?.expect_given_symbol(b'}')?;
                    statements
                } else {
                    tokenizer.unread_token(token);
                    vec![]
                };

                Ok(Statement::If {
                    condition,
                    then_branch,
                    else_branch,
                })
            }
            KeywordKind::While => {
                tokenizer.advance()?.expect_given_symbol(b'(')?;
                let condition = Expression::parse(tokenizer)?;
                tokenizer.advance()?.expect_given_symbol(b')')?;

                tokenizer.advance()?.expect_given_symbol(b'{')?;
                let body = Vec::<Statement>::parse(tokenizer)?;
                tokenizer.advance()?.expect_given_symbol(b'}')?;

                Ok(Statement::While { condition, body })
            }
            KeywordKind::Do => {
                let first = tokenizer.advance()?.expect_identifier()?;
                let call = SubroutineCall::parse_with_first_ident(first, tokenizer)?;
                tokenizer.advance()?.expect_given_symbol(b';')?;

                Ok(Statement::Do { call })
            }
            KeywordKind::Return => {
                let token = tokenizer.advance()?;

                if token == Token::Symbol(SymbolKind(b';')) {
                    Ok(Statement::Return { value: None })
                } else {
                    tokenizer.unread_token(token);
                    let value = Expression::parse(tokenizer)?;
                    tokenizer.advance()?.expect_given_symbol(b';')?;
                    Ok(Statement::Return { value: Some(value) })
                }
            }
            _ => Err(JackcError::Expected("statement")),
        }
    }
}

impl Parse for Vec<Statement> {
    fn parse<T: Read>(tokenizer: &mut JackTokenizer<T>) -> Result<Self, JackcError> {
        let mut statements = vec![];
        let mut token = tokenizer.advance()?;

        while token != Token::Symbol(SymbolKind(b'}')) {
            tokenizer.unread_token(token);
            statements.push(Statement::parse(tokenizer)?);
            token = tokenizer.advance()?;
        }

        tokenizer.unread_token(token);

        Ok(statements)
    }
}

impl Codegen for Statement {
    fn generate<W: Write>(
        &self,
        out: &mut VmWriter<W>,
        ctx: &mut CodegenContext,
    ) -> Result<(), JackcError> {
        match self {
            Statement::Let {
                var_name,
                index,
                rhs,
            } => {
                let (segment, var_index) = ctx
                    .resolve(var_name)
                    .map(|(segment, _, index)| (segment, index))
                    .ok_or_else(|| JackcError::UnknownVariable(var_name.clone()))?;

                if let Some(index) = index {
                    // target address first, then the RHS, so an array read
                    // on the RHS is free to go through THAT in between
                    out.push(segment, var_index)?;
                    index.generate(out, ctx)?;
                    out.arithmetic("add")?;
                    rhs.generate(out, ctx)?;
                    out.pop(Segment::Temp, 0)?;
                    out.pop(Segment::Pointer, 1)?;
                    out.push(Segment::Temp, 0)?;
                    out.pop(Segment::That, 0)?;
                } else {
                    rhs.generate(out, ctx)?;
                    out.pop(segment, var_index)?;
                }
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let control = ctx.fresh_control();
                let false_label = format!("IF_FALSE_{}", control);
                let end_label = format!("IF_END_{}", control);

                condition.generate(out, ctx)?;
                out.arithmetic("not")?;
                out.if_goto(&false_label)?;
                for statement in then_branch {
                    statement.generate(out, ctx)?;
                }
                out.goto(&end_label)?;
                out.label(&false_label)?;
                for statement in else_branch {
                    statement.generate(out, ctx)?;
                }
                out.label(&end_label)?;
            }
            Statement::While { condition, body } => {
                let control = ctx.fresh_control();
                let start_label = format!("WHILE_START_{}", control);
                let end_label = format!("WHILE_END_{}", control);

                out.label(&start_label)?;
                condition.generate(out, ctx)?;
                out.arithmetic("not")?;
                out.if_goto(&end_label)?;
                for statement in body {
                    statement.generate(out, ctx)?;
                }
                out.goto(&start_label)?;
                out.label(&end_label)?;
            }
            Statement::Do { call } => {
                call.generate(out, ctx)?;
                out.pop(Segment::Temp, 0)?;
            }
            Statement::Return { value } => {
                match value {
                    Some(value) => value.generate(out, ctx)?,
                    None => out.push(Segment::Constant, 0)?,
                }
                out.ret()?;
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::Let {
                var_name,
                index,
                rhs,
            } => {
                writeln!(f, "<letStatement>")?;
                writeln!(f, "<keyword> let </keyword>")?;
                writeln!(f, "<identifier> {} </identifier>", var_name)?;
                if let Some(index) = index {
                    writeln!(f, "<symbol> [ </symbol>")?;
                    writeln!(f, "{}", index)?;
                    writeln!(f, "<symbol> ] </symbol>")?;
                }
                writeln!(f, "<symbol> = </symbol>")?;
                writeln!(f, "{}", rhs)?;
                writeln!(f, "<symbol> ; </symbol>")?;
                write!(f, "</letStatement>")?;
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                writeln!(f, "<ifStatement>")?;
                writeln!(f, "<keyword> if </keyword>")?;
                writeln!(f, "<symbol> ( </symbol>")?;
                writeln!(f, "{}", condition)?;
                writeln!(f, "<symbol> ) </symbol>")?;
                fmt_block(then_branch, f)?;
                if !else_branch.is_empty() {
                    writeln!(f, "<keyword> else </keyword>")?;
                    fmt_block(else_branch, f)?;
                }
                write!(f, "</ifStatement>")?;
            }
            Statement::While { condition, body } => {
                writeln!(f, "<whileStatement>")?;
                writeln!(f, "<keyword> while </keyword>")?;
                writeln!(f, "<symbol> ( </symbol>")?;
                writeln!(f, "{}", condition)?;
                writeln!(f, "<symbol> ) </symbol>")?;
                fmt_block(body, f)?;
                write!(f, "</whileStatement>")?;
            }
            Statement::Do { call } => {
                writeln!(f, "<doStatement>")?;
                writeln!(f, "<keyword> do </keyword>")?;
                writeln!(f, "{}", call)?;
                writeln!(f, "<symbol> ; </symbol>")?;
                write!(f, "</doStatement>")?;
            }
            Statement::Return { value } => {
                writeln!(f, "<returnStatement>")?;
                writeln!(f, "<keyword> return </keyword>")?;
                if let Some(value) = value {
                    writeln!(f, "{}", value)?;
                }
                writeln!(f, "<symbol> ; </symbol>")?;
                write!(f, "</returnStatement>")?;
            }
        }

        Ok(())
    }
}

fn fmt_block(statements: &[Statement], f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    writeln!(f, "<symbol> {{ </symbol>")?;
    writeln!(f, "<statements>")?;
    for statement in statements {
        writeln!(f, "{}", statement)?;
    }
    writeln!(f, "</statements>")?;
    writeln!(f, "<symbol> }} </symbol>")?;
    Ok(())
}
