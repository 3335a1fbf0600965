//! Rewriting: replace qualifying call nodes with literal nodes encoding
//! their captured results.
//!
//! The traversal mirrors the extractor's initializer-context tracking so a
//! call inside an initializer is never rewritten even when its printed form
//! happens to match a result key.

use crate::ast::*;
use crate::classify::Helpers;
use crate::config::Config;
use crate::extract::{is_iife, resolve_callee_name};
use crate::harness::CapturedValue;
use crate::printer;
use indexmap::IndexMap;
use log::{debug, trace};

#[derive(Debug, Clone, Default)]
pub struct RewriteStats {
    /// Successful replacements per helper name.
    pub replaced_by_name: IndexMap<String, usize>,
    pub total: usize,
}

/// Rewrite the tree in place. Earlier phases are read-only; this is the
/// first mutation of the program.
pub fn rewrite(
    program: &mut Program,
    helpers: &Helpers,
    results: &IndexMap<String, CapturedValue>,
    config: &Config,
    counter: &mut NodeCounter,
) -> RewriteStats {
    let mut rewriter = Rewriter {
        helpers,
        results,
        config,
        counter,
        stats: RewriteStats::default(),
    };
    for stmt in &mut program.body {
        rewriter.rewrite_stmt(stmt, false);
    }
    debug!("rewrote {} call site(s)", rewriter.stats.total);
    rewriter.stats
}

struct Rewriter<'a> {
    helpers: &'a Helpers,
    results: &'a IndexMap<String, CapturedValue>,
    config: &'a Config,
    counter: &'a mut NodeCounter,
    stats: RewriteStats,
}

impl Rewriter<'_> {
    fn rewrite_stmt(&mut self, stmt: &mut Statement, in_init: bool) {
        match &mut stmt.kind {
            StmtKind::Expr(expr) | StmtKind::Throw(expr) | StmtKind::ExportDefault(expr) => {
                self.rewrite_expr(expr, in_init);
            }
            StmtKind::VarDecl { declarators, .. } => {
                for decl in declarators {
                    if let Some(init) = &mut decl.init {
                        self.rewrite_expr(init, in_init);
                    }
                }
            }
            StmtKind::FunctionDecl(func) => self.rewrite_stmts(&mut func.body, in_init),
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.rewrite_expr(value, in_init);
                }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.rewrite_expr(cond, in_init);
                self.rewrite_stmt(then_branch, in_init);
                if let Some(els) = else_branch {
                    self.rewrite_stmt(els, in_init);
                }
            }
            StmtKind::While { cond, body } => {
                self.rewrite_expr(cond, true);
                self.rewrite_stmt(body, true);
            }
            StmtKind::DoWhile { body, cond } => {
                self.rewrite_stmt(body, true);
                self.rewrite_expr(cond, true);
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.rewrite_stmt(init, in_init);
                }
                if let Some(cond) = cond {
                    self.rewrite_expr(cond, in_init);
                }
                if let Some(update) = update {
                    self.rewrite_expr(update, in_init);
                }
                self.rewrite_stmt(body, in_init);
            }
            StmtKind::ForIn { object, body, .. } => {
                self.rewrite_expr(object, in_init);
                self.rewrite_stmt(body, in_init);
            }
            StmtKind::Block(stmts) => self.rewrite_stmts(stmts, in_init),
            StmtKind::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.rewrite_stmts(block, true);
                if let Some(handler) = handler {
                    self.rewrite_stmts(handler, true);
                }
                if let Some(finalizer) = finalizer {
                    self.rewrite_stmts(finalizer, true);
                }
            }
            StmtKind::Export(inner) => self.rewrite_stmt(inner, in_init),
            StmtKind::Break | StmtKind::Continue | StmtKind::Empty | StmtKind::EmittedComment(_) => {}
        }
    }

    fn rewrite_stmts(&mut self, stmts: &mut [Statement], in_init: bool) {
        for stmt in stmts {
            self.rewrite_stmt(stmt, in_init);
        }
    }

    fn rewrite_expr(&mut self, expr: &mut Expression, in_init: bool) {
        // The node itself first: a replaced call has no children left
        if !in_init {
            if let Some(replacement) = self.replacement_for(expr) {
                trace!("rewriting {}", printer::print_expression(expr));
                *expr = replacement;
                return;
            }
        }

        match &mut expr.kind {
            ExprKind::Call { callee, args } => {
                let inner_init = in_init || is_iife(callee);
                self.rewrite_expr(callee, inner_init);
                for arg in args {
                    self.rewrite_expr(arg, inner_init);
                }
            }
            ExprKind::New { callee, args } => {
                self.rewrite_expr(callee, in_init);
                for arg in args {
                    self.rewrite_expr(arg, in_init);
                }
            }
            ExprKind::Member { object, property } => {
                self.rewrite_expr(object, in_init);
                if let MemberProp::Computed(index) = property {
                    self.rewrite_expr(index, in_init);
                }
            }
            ExprKind::Array(elements) => {
                for elem in elements {
                    self.rewrite_expr(elem, in_init);
                }
            }
            ExprKind::Object(properties) => {
                for (_key, value) in properties {
                    self.rewrite_expr(value, in_init);
                }
            }
            ExprKind::Function(func) => self.rewrite_stmts(&mut func.body, in_init),
            ExprKind::Arrow { body, .. } => match body {
                ArrowBody::Expr(inner) => self.rewrite_expr(inner, in_init),
                ArrowBody::Block(stmts) => self.rewrite_stmts(stmts, in_init),
            },
            ExprKind::Unary { operand, .. } => self.rewrite_expr(operand, in_init),
            ExprKind::Update { target, .. } => self.rewrite_expr(target, in_init),
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Logical { lhs, rhs, .. } => {
                self.rewrite_expr(lhs, in_init);
                self.rewrite_expr(rhs, in_init);
            }
            ExprKind::Assign { target, value, .. } => {
                self.rewrite_expr(target, in_init);
                self.rewrite_expr(value, in_init);
            }
            ExprKind::Conditional {
                cond,
                consequent,
                alternate,
            } => {
                self.rewrite_expr(cond, in_init);
                self.rewrite_expr(consequent, in_init);
                self.rewrite_expr(alternate, in_init);
            }
            ExprKind::Sequence(exprs) => {
                for e in exprs {
                    self.rewrite_expr(e, in_init);
                }
            }
            ExprKind::Literal(_) | ExprKind::Identifier(_) | ExprKind::This => {}
        }
    }

    /// The literal node replacing `expr`, when it is a qualifying call
    /// with a captured result.
    fn replacement_for(&mut self, expr: &Expression) -> Option<Expression> {
        let ExprKind::Call { callee, args } = &expr.kind else {
            return None;
        };
        let name = resolve_callee_name(callee)?;
        if !self.helpers.contains(&name) || !self.config.arg_count_in_window(args.len()) {
            return None;
        }

        let key = printer::print_expression(expr);
        let captured = self.results.get(&key)?;
        let replacement = self.literal_node(captured, expr.h.span)?;

        *self.stats.replaced_by_name.entry(name).or_insert(0) += 1;
        self.stats.total += 1;
        Some(replacement)
    }

    fn literal_node(&mut self, captured: &CapturedValue, span: Span) -> Option<Expression> {
        let kind = match captured {
            CapturedValue::Str(s) => ExprKind::Literal(Literal::String(s.clone())),
            CapturedValue::Int(n) => {
                if *n < 0 {
                    let magnitude = n.checked_neg()?;
                    let operand = self.counter.mk_node(ExprKind::Literal(Literal::Int(magnitude)), span);
                    ExprKind::Unary {
                        op: UnaryOp::Minus,
                        operand: Box::new(operand),
                    }
                } else {
                    ExprKind::Literal(Literal::Int(*n))
                }
            }
            CapturedValue::Float(f) => {
                if *f < 0.0 {
                    let operand = self.counter.mk_node(ExprKind::Literal(Literal::Float(-f)), span);
                    ExprKind::Unary {
                        op: UnaryOp::Minus,
                        operand: Box::new(operand),
                    }
                } else {
                    ExprKind::Literal(Literal::Float(*f))
                }
            }
            CapturedValue::Bool(b) => ExprKind::Literal(Literal::Bool(*b)),
            CapturedValue::Null => ExprKind::Literal(Literal::Null),
            CapturedValue::Undefined => ExprKind::Literal(Literal::Undefined),
            // Should not appear: dropped before the result map is built
            CapturedValue::Unrepresentable => return None,
        };
        Some(self.counter.mk_node(kind, span))
    }
}
