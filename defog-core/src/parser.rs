//! Recursive-descent parser for the target-language subset.
//!
//! Permissive: accepts the constructs machine-generated programs use and
//! reports a spanned parse error for everything else. Parenthesization is
//! not stored in the tree; the printer reconstructs it from precedence.

use crate::ast::*;
use crate::error::Result;
use crate::lexer::{LocatedToken, Token};
use crate::{bail_parse_at, err_parse_at};
use log::trace;

#[cfg(test)]
mod tests;

pub struct Parser<'a> {
    tokens: Vec<LocatedToken>,
    current: usize,
    node_counter: &'a mut NodeCounter,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<LocatedToken>, node_counter: &'a mut NodeCounter) -> Self {
        Parser {
            tokens,
            current: 0,
            node_counter,
        }
    }

    /// Get the span of the current token
    fn current_span(&self) -> Span {
        self.tokens.get(self.current).map(|t| t.span).unwrap_or(Span::dummy())
    }

    /// Get the span of the previous token
    fn previous_span(&self) -> Span {
        if self.current > 0 {
            self.tokens.get(self.current - 1).map(|t| t.span).unwrap_or(Span::dummy())
        } else {
            Span::dummy()
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.current + offset).map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.current).map(|t| &t.token);
        if token.is_some() {
            self.current += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(err_parse_at!(
                self.current_span(),
                "Expected {:?}, got {:?}",
                token,
                self.peek()
            ))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(err_parse_at!(
                self.current_span(),
                "Expected identifier, got {:?}",
                self.peek()
            )),
        }
    }

    fn mk_expr(&mut self, kind: ExprKind, start: Span) -> Expression {
        let span = start.merge(&self.previous_span());
        self.node_counter.mk_node(kind, span)
    }

    fn mk_stmt(&mut self, kind: StmtKind, start: Span) -> Statement {
        let span = start.merge(&self.previous_span());
        self.node_counter.mk_node(kind, span)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub fn parse(&mut self) -> Result<Program> {
        let mut body = Vec::new();
        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        trace!("parse_statement: next token = {:?}", self.peek());
        let start = self.current_span();
        match self.peek() {
            Some(Token::LeftBrace) => {
                let stmts = self.parse_block()?;
                Ok(self.mk_stmt(StmtKind::Block(stmts), start))
            }
            Some(Token::Var) | Some(Token::Let) | Some(Token::Const) => {
                let stmt = self.parse_var_decl()?;
                self.eat(&Token::Semicolon);
                Ok(stmt)
            }
            Some(Token::Function) => self.parse_function_decl(),
            Some(Token::Return) => {
                self.advance();
                let value = if self.check(&Token::Semicolon)
                    || self.check(&Token::RightBrace)
                    || self.is_at_end()
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.eat(&Token::Semicolon);
                Ok(self.mk_stmt(StmtKind::Return(value), start))
            }
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => {
                self.advance();
                self.expect(Token::LeftParen)?;
                let cond = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(self.mk_stmt(StmtKind::While { cond, body }, start))
            }
            Some(Token::Do) => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect(Token::While)?;
                self.expect(Token::LeftParen)?;
                let cond = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                self.eat(&Token::Semicolon);
                Ok(self.mk_stmt(StmtKind::DoWhile { body, cond }, start))
            }
            Some(Token::For) => self.parse_for(),
            Some(Token::Try) => self.parse_try(),
            Some(Token::Throw) => {
                self.advance();
                let value = self.parse_expression()?;
                self.eat(&Token::Semicolon);
                Ok(self.mk_stmt(StmtKind::Throw(value), start))
            }
            Some(Token::Break) => {
                self.advance();
                self.eat(&Token::Semicolon);
                Ok(self.mk_stmt(StmtKind::Break, start))
            }
            Some(Token::Continue) => {
                self.advance();
                self.eat(&Token::Semicolon);
                Ok(self.mk_stmt(StmtKind::Continue, start))
            }
            Some(Token::Semicolon) => {
                self.advance();
                Ok(self.mk_stmt(StmtKind::Empty, start))
            }
            Some(Token::Export) => self.parse_export(),
            _ => {
                let expr = self.parse_expression()?;
                self.eat(&Token::Semicolon);
                Ok(self.mk_stmt(StmtKind::Expr(expr), start))
            }
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>> {
        self.expect(Token::LeftBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RightBrace) {
            if self.is_at_end() {
                bail_parse_at!(self.previous_span(), "Unterminated block");
            }
            stmts.push(self.parse_statement()?);
        }
        self.expect(Token::RightBrace)?;
        Ok(stmts)
    }

    fn parse_var_decl(&mut self) -> Result<Statement> {
        let start = self.current_span();
        let keyword = match self.advance() {
            Some(Token::Var) => DeclKeyword::Var,
            Some(Token::Let) => DeclKeyword::Let,
            Some(Token::Const) => DeclKeyword::Const,
            other => bail_parse_at!(start, "Expected declaration keyword, got {:?}", other),
        };

        let mut declarators = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let init = if self.eat(&Token::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            declarators.push(Declarator { name, init });
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        Ok(self.mk_stmt(StmtKind::VarDecl { keyword, declarators }, start))
    }

    fn parse_function_decl(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.expect(Token::Function)?;
        let name = self.expect_identifier()?;
        let params = self.parse_param_list()?;
        let body = self.parse_block()?;
        Ok(self.mk_stmt(
            StmtKind::FunctionDecl(Function {
                name: Some(name),
                params,
                body,
            }),
            start,
        ))
    }

    fn parse_param_list(&mut self) -> Result<Vec<String>> {
        self.expect(Token::LeftParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RightParen) {
            loop {
                params.push(self.expect_identifier()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RightParen)?;
        Ok(params)
    }

    fn parse_if(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.expect(Token::If)?;
        self.expect(Token::LeftParen)?;
        let cond = self.parse_expression()?;
        self.expect(Token::RightParen)?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(self.mk_stmt(
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
            start,
        ))
    }

    fn parse_for(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.expect(Token::For)?;
        self.expect(Token::LeftParen)?;

        // for-in: `for (x in obj)` or `for (var x in obj)`
        let forin_decl = match (self.peek(), self.peek_at(1), self.peek_at(2)) {
            (Some(Token::Identifier(_)), Some(Token::In), _) => Some(None),
            (Some(Token::Var), Some(Token::Identifier(_)), Some(Token::In)) => {
                Some(Some(DeclKeyword::Var))
            }
            (Some(Token::Let), Some(Token::Identifier(_)), Some(Token::In)) => {
                Some(Some(DeclKeyword::Let))
            }
            (Some(Token::Const), Some(Token::Identifier(_)), Some(Token::In)) => {
                Some(Some(DeclKeyword::Const))
            }
            _ => None,
        };
        if let Some(keyword) = forin_decl {
            if keyword.is_some() {
                self.advance();
            }
            let name = self.expect_identifier()?;
            self.expect(Token::In)?;
            let object = self.parse_expression()?;
            self.expect(Token::RightParen)?;
            let body = Box::new(self.parse_statement()?);
            return Ok(self.mk_stmt(
                StmtKind::ForIn {
                    keyword,
                    name,
                    object,
                    body,
                },
                start,
            ));
        }

        let init = if self.check(&Token::Semicolon) {
            self.advance();
            None
        } else if matches!(self.peek(), Some(Token::Var) | Some(Token::Let) | Some(Token::Const)) {
            let decl = self.parse_var_decl()?;
            self.expect(Token::Semicolon)?;
            Some(Box::new(decl))
        } else {
            let init_start = self.current_span();
            let expr = self.parse_expression()?;
            self.expect(Token::Semicolon)?;
            Some(Box::new(self.mk_stmt(StmtKind::Expr(expr), init_start)))
        };

        let cond = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::Semicolon)?;

        let update = if self.check(&Token::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::RightParen)?;

        let body = Box::new(self.parse_statement()?);
        Ok(self.mk_stmt(
            StmtKind::For {
                init,
                cond,
                update,
                body,
            },
            start,
        ))
    }

    fn parse_try(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.expect(Token::Try)?;
        let block = self.parse_block()?;

        let mut catch_param = None;
        let mut handler = None;
        if self.eat(&Token::Catch) {
            if self.eat(&Token::LeftParen) {
                catch_param = Some(self.expect_identifier()?);
                self.expect(Token::RightParen)?;
            }
            handler = Some(self.parse_block()?);
        }

        let finalizer = if self.eat(&Token::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            bail_parse_at!(start, "try statement requires a catch or finally clause");
        }

        Ok(self.mk_stmt(
            StmtKind::Try {
                block,
                catch_param,
                handler,
                finalizer,
            },
            start,
        ))
    }

    fn parse_export(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.expect(Token::Export)?;
        match self.peek() {
            Some(Token::Default) => {
                self.advance();
                let value = self.parse_assignment()?;
                self.eat(&Token::Semicolon);
                Ok(self.mk_stmt(StmtKind::ExportDefault(value), start))
            }
            Some(Token::Function) => {
                let decl = self.parse_function_decl()?;
                Ok(self.mk_stmt(StmtKind::Export(Box::new(decl)), start))
            }
            Some(Token::Var) | Some(Token::Let) | Some(Token::Const) => {
                let decl = self.parse_var_decl()?;
                self.eat(&Token::Semicolon);
                Ok(self.mk_stmt(StmtKind::Export(Box::new(decl)), start))
            }
            other => Err(err_parse_at!(
                self.current_span(),
                "Expected declaration after 'export', got {:?}",
                other
            )),
        }
    }

    // =========================================================================
    // Expressions (precedence cascade, lowest binding first)
    // =========================================================================

    pub fn parse_expression(&mut self) -> Result<Expression> {
        let start = self.current_span();
        let first = self.parse_assignment()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(&Token::Comma) {
            exprs.push(self.parse_assignment()?);
        }
        Ok(self.mk_expr(ExprKind::Sequence(exprs), start))
    }

    fn parse_assignment(&mut self) -> Result<Expression> {
        // Arrow functions bind at assignment level
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }

        let start = self.current_span();
        let target = self.parse_conditional()?;

        let op = match self.peek() {
            Some(Token::Assign) => Some(AssignOp::Assign),
            Some(Token::AssignOp(text)) => Some(assign_op_from_str(text)),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(target);
        };

        if !matches!(target.kind, ExprKind::Identifier(_) | ExprKind::Member { .. }) {
            bail_parse_at!(target.h.span, "Invalid assignment target");
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(self.mk_expr(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            start,
        ))
    }

    /// Detect `ident => ...` and `(a, b) => ...` with bounded lookahead,
    /// backtracking to the saved position when the shape does not match.
    fn try_parse_arrow(&mut self) -> Result<Option<Expression>> {
        let start = self.current_span();

        // Single-parameter form
        if let (Some(Token::Identifier(_)), Some(Token::Arrow)) = (self.peek(), self.peek_at(1)) {
            let param = self.expect_identifier()?;
            self.expect(Token::Arrow)?;
            let body = self.parse_arrow_body()?;
            return Ok(Some(self.mk_expr(
                ExprKind::Arrow {
                    params: vec![param],
                    body,
                },
                start,
            )));
        }

        // Parenthesized parameter list: attempt, then backtrack on mismatch
        if self.check(&Token::LeftParen) {
            let saved_pos = self.current;
            if let Ok(params) = self.parse_param_list() {
                if self.eat(&Token::Arrow) {
                    let body = self.parse_arrow_body()?;
                    return Ok(Some(self.mk_expr(ExprKind::Arrow { params, body }, start)));
                }
            }
            self.current = saved_pos;
        }

        Ok(None)
    }

    fn parse_arrow_body(&mut self) -> Result<ArrowBody> {
        if self.check(&Token::LeftBrace) {
            Ok(ArrowBody::Block(self.parse_block()?))
        } else {
            Ok(ArrowBody::Expr(Box::new(self.parse_assignment()?)))
        }
    }

    fn parse_conditional(&mut self) -> Result<Expression> {
        let start = self.current_span();
        let cond = self.parse_logical_or()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let consequent = self.parse_assignment()?;
        self.expect(Token::Colon)?;
        let alternate = self.parse_assignment()?;
        Ok(self.mk_expr(
            ExprKind::Conditional {
                cond: Box::new(cond),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            start,
        ))
    }

    fn parse_logical_or(&mut self) -> Result<Expression> {
        let start = self.current_span();
        let mut lhs = self.parse_logical_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_logical_and()?;
            lhs = self.mk_expr(
                ExprKind::Logical {
                    op: LogicalOp::Or,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                start,
            );
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> Result<Expression> {
        let start = self.current_span();
        let mut lhs = self.parse_bitwise_or()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_bitwise_or()?;
            lhs = self.mk_expr(
                ExprKind::Logical {
                    op: LogicalOp::And,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                start,
            );
        }
        Ok(lhs)
    }

    fn parse_binary_level<F>(
        &mut self,
        ops: &[(&str, BinaryOp)],
        mut next: F,
    ) -> Result<Expression>
    where
        F: FnMut(&mut Self) -> Result<Expression>,
    {
        let start = self.current_span();
        let mut lhs = next(self)?;
        loop {
            let op = match self.peek() {
                Some(Token::BinOp(text)) => {
                    ops.iter().find(|(s, _)| s == text).map(|(_, op)| *op)
                }
                Some(Token::In) => ops.iter().find(|(s, _)| *s == "in").map(|(_, op)| *op),
                Some(Token::InstanceOf) => {
                    ops.iter().find(|(s, _)| *s == "instanceof").map(|(_, op)| *op)
                }
                _ => None,
            };
            let Some(op) = op else { break };
            self.advance();
            let rhs = next(self)?;
            lhs = self.mk_expr(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                start,
            );
        }
        Ok(lhs)
    }

    fn parse_bitwise_or(&mut self) -> Result<Expression> {
        self.parse_binary_level(&[("|", BinaryOp::BitOr)], Self::parse_bitwise_xor)
    }

    fn parse_bitwise_xor(&mut self) -> Result<Expression> {
        self.parse_binary_level(&[("^", BinaryOp::BitXor)], Self::parse_bitwise_and)
    }

    fn parse_bitwise_and(&mut self) -> Result<Expression> {
        self.parse_binary_level(&[("&", BinaryOp::BitAnd)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expression> {
        self.parse_binary_level(
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNotEq),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::NotEq),
            ],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> Result<Expression> {
        self.parse_binary_level(
            &[
                ("<", BinaryOp::Lt),
                ("<=", BinaryOp::LtEq),
                (">", BinaryOp::Gt),
                (">=", BinaryOp::GtEq),
                ("in", BinaryOp::In),
                ("instanceof", BinaryOp::InstanceOf),
            ],
            Self::parse_shift,
        )
    }

    fn parse_shift(&mut self) -> Result<Expression> {
        self.parse_binary_level(
            &[
                ("<<", BinaryOp::Shl),
                (">>", BinaryOp::Shr),
                (">>>", BinaryOp::UShr),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        self.parse_binary_level(
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        self.parse_binary_level(
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
            Self::parse_exponent,
        )
    }

    fn parse_exponent(&mut self) -> Result<Expression> {
        let start = self.current_span();
        let base = self.parse_unary()?;
        if matches!(self.peek(), Some(Token::BinOp(op)) if op == "**") {
            self.advance();
            // Right-associative
            let exp = self.parse_exponent()?;
            return Ok(self.mk_expr(
                ExprKind::Binary {
                    op: BinaryOp::Pow,
                    lhs: Box::new(base),
                    rhs: Box::new(exp),
                },
                start,
            ));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        let start = self.current_span();
        let op = match self.peek() {
            Some(Token::BinOp(text)) if text == "-" => Some(UnaryOp::Minus),
            Some(Token::BinOp(text)) if text == "+" => Some(UnaryOp::Plus),
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Tilde) => Some(UnaryOp::BitNot),
            Some(Token::TypeOf) => Some(UnaryOp::TypeOf),
            Some(Token::Void) => Some(UnaryOp::Void),
            Some(Token::Delete) => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(self.mk_expr(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                start,
            ));
        }

        if matches!(self.peek(), Some(Token::PlusPlus) | Some(Token::MinusMinus)) {
            let op = if self.eat(&Token::PlusPlus) {
                UpdateOp::Incr
            } else {
                self.advance();
                UpdateOp::Decr
            };
            let target = self.parse_unary()?;
            return Ok(self.mk_expr(
                ExprKind::Update {
                    op,
                    prefix: true,
                    target: Box::new(target),
                },
                start,
            ));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression> {
        let start = self.current_span();
        let expr = self.parse_call_member()?;
        let op = match self.peek() {
            Some(Token::PlusPlus) => Some(UpdateOp::Incr),
            Some(Token::MinusMinus) => Some(UpdateOp::Decr),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            return Ok(self.mk_expr(
                ExprKind::Update {
                    op,
                    prefix: false,
                    target: Box::new(expr),
                },
                start,
            ));
        }
        Ok(expr)
    }

    /// Member/call chain: primary followed by `.prop`, `[expr]`, `(args)`.
    fn parse_call_member(&mut self) -> Result<Expression> {
        let start = self.current_span();
        let mut expr = if self.check(&Token::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let name = self.expect_property_name()?;
                    expr = self.mk_expr(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property: MemberProp::Ident(name),
                        },
                        start,
                    );
                }
                Some(Token::LeftBracket) => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(Token::RightBracket)?;
                    expr = self.mk_expr(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property: MemberProp::Computed(Box::new(index)),
                        },
                        start,
                    );
                }
                Some(Token::LeftParen) => {
                    let args = self.parse_arguments()?;
                    expr = self.mk_expr(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        start,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Property names after '.' may be keywords (`obj.default`).
    fn expect_property_name(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            Some(token) => {
                if let Some(name) = token.keyword_name() {
                    let name = name.to_string();
                    self.advance();
                    Ok(name)
                } else {
                    Err(err_parse_at!(
                        self.current_span(),
                        "Expected property name, got {:?}",
                        self.peek()
                    ))
                }
            }
            None => Err(err_parse_at!(self.previous_span(), "Expected property name")),
        }
    }

    fn parse_new(&mut self) -> Result<Expression> {
        let start = self.current_span();
        self.expect(Token::New)?;
        // Callee is a member chain without calls; `new f()(x)` then chains
        let mut callee = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let name = self.expect_property_name()?;
                    callee = self.mk_expr(
                        ExprKind::Member {
                            object: Box::new(callee),
                            property: MemberProp::Ident(name),
                        },
                        start,
                    );
                }
                Some(Token::LeftBracket) => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(Token::RightBracket)?;
                    callee = self.mk_expr(
                        ExprKind::Member {
                            object: Box::new(callee),
                            property: MemberProp::Computed(Box::new(index)),
                        },
                        start,
                    );
                }
                _ => break,
            }
        }
        let args = if self.check(&Token::LeftParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(self.mk_expr(
            ExprKind::New {
                callee: Box::new(callee),
                args,
            },
            start,
        ))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>> {
        self.expect(Token::LeftParen)?;
        let mut args = Vec::new();
        if !self.check(&Token::RightParen) {
            loop {
                args.push(self.parse_assignment()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RightParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        let start = self.current_span();
        match self.peek() {
            Some(Token::IntLiteral(n)) => {
                let n = *n;
                self.advance();
                Ok(self.mk_expr(ExprKind::Literal(Literal::Int(n)), start))
            }
            Some(Token::FloatLiteral(f)) => {
                let f = *f;
                self.advance();
                Ok(self.mk_expr(ExprKind::Literal(Literal::Float(f)), start))
            }
            Some(Token::StringLiteral(s)) => {
                let s = s.clone();
                self.advance();
                Ok(self.mk_expr(ExprKind::Literal(Literal::String(s)), start))
            }
            Some(Token::True) => {
                self.advance();
                Ok(self.mk_expr(ExprKind::Literal(Literal::Bool(true)), start))
            }
            Some(Token::False) => {
                self.advance();
                Ok(self.mk_expr(ExprKind::Literal(Literal::Bool(false)), start))
            }
            Some(Token::Null) => {
                self.advance();
                Ok(self.mk_expr(ExprKind::Literal(Literal::Null), start))
            }
            Some(Token::Undefined) => {
                self.advance();
                Ok(self.mk_expr(ExprKind::Literal(Literal::Undefined), start))
            }
            Some(Token::This) => {
                self.advance();
                Ok(self.mk_expr(ExprKind::This, start))
            }
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Ok(self.mk_expr(ExprKind::Identifier(name), start))
            }
            Some(Token::LeftParen) => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }
            Some(Token::LeftBracket) => self.parse_array_literal(),
            Some(Token::LeftBrace) => self.parse_object_literal(),
            Some(Token::Function) => self.parse_function_expr(),
            other => Err(err_parse_at!(
                self.current_span(),
                "Expected expression, got {:?}",
                other
            )),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expression> {
        let start = self.current_span();
        self.expect(Token::LeftBracket)?;
        let mut elements = Vec::new();
        if !self.check(&Token::RightBracket) {
            loop {
                elements.push(self.parse_assignment()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
                // Trailing comma
                if self.check(&Token::RightBracket) {
                    break;
                }
            }
        }
        self.expect(Token::RightBracket)?;
        Ok(self.mk_expr(ExprKind::Array(elements), start))
    }

    fn parse_object_literal(&mut self) -> Result<Expression> {
        let start = self.current_span();
        self.expect(Token::LeftBrace)?;
        let mut properties = Vec::new();
        if !self.check(&Token::RightBrace) {
            loop {
                let key = match self.peek() {
                    Some(Token::Identifier(name)) => {
                        let key = PropKey::Ident(name.clone());
                        self.advance();
                        key
                    }
                    Some(Token::StringLiteral(s)) => {
                        let key = PropKey::Str(s.clone());
                        self.advance();
                        key
                    }
                    Some(Token::IntLiteral(n)) => {
                        let key = PropKey::Num(*n as f64);
                        self.advance();
                        key
                    }
                    Some(Token::FloatLiteral(f)) => {
                        let key = PropKey::Num(*f);
                        self.advance();
                        key
                    }
                    Some(token) => {
                        if let Some(name) = token.keyword_name() {
                            let key = PropKey::Ident(name.to_string());
                            self.advance();
                            key
                        } else {
                            bail_parse_at!(
                                self.current_span(),
                                "Expected property key, got {:?}",
                                self.peek()
                            );
                        }
                    }
                    None => bail_parse_at!(self.previous_span(), "Unterminated object literal"),
                };
                self.expect(Token::Colon)?;
                let value = self.parse_assignment()?;
                properties.push((key, value));
                if !self.eat(&Token::Comma) {
                    break;
                }
                if self.check(&Token::RightBrace) {
                    break;
                }
            }
        }
        self.expect(Token::RightBrace)?;
        Ok(self.mk_expr(ExprKind::Object(properties), start))
    }

    fn parse_function_expr(&mut self) -> Result<Expression> {
        let start = self.current_span();
        self.expect(Token::Function)?;
        let name = match self.peek() {
            Some(Token::Identifier(n)) => {
                let n = n.clone();
                self.advance();
                Some(n)
            }
            _ => None,
        };
        let params = self.parse_param_list()?;
        let body = self.parse_block()?;
        Ok(self.mk_expr(ExprKind::Function(Function { name, params, body }), start))
    }
}

fn assign_op_from_str(text: &str) -> AssignOp {
    match text {
        "+=" => AssignOp::Add,
        "-=" => AssignOp::Sub,
        "*=" => AssignOp::Mul,
        "/=" => AssignOp::Div,
        "%=" => AssignOp::Rem,
        "&=" => AssignOp::BitAnd,
        "|=" => AssignOp::BitOr,
        "^=" => AssignOp::BitXor,
        "<<=" => AssignOp::Shl,
        ">>=" => AssignOp::Shr,
        ">>>=" => AssignOp::UShr,
        // The lexer only emits the forms above
        other => unreachable!("unknown assignment operator {:?}", other),
    }
}
