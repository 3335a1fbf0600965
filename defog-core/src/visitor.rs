//! AST visitor for read-only traversals.
//!
//! Centralized traversal: passes implement [`Visitor`] and override only the
//! hooks they need, while the `walk_*` functions handle the actual descent.
//! The `Break` associated type lets a visitor short-circuit with a result.

use crate::ast::*;
use std::ops::ControlFlow;

pub trait Visitor: Sized {
    type Break;

    fn visit_program(&mut self, p: &Program) -> ControlFlow<Self::Break> {
        walk_program(self, p)
    }

    fn visit_statement(&mut self, s: &Statement) -> ControlFlow<Self::Break> {
        walk_statement(self, s)
    }

    fn visit_expression(&mut self, e: &Expression) -> ControlFlow<Self::Break> {
        walk_expression(self, e)
    }

    fn visit_expr_call(
        &mut self,
        _id: NodeId,
        callee: &Expression,
        args: &[Expression],
    ) -> ControlFlow<Self::Break> {
        walk_expr_call(self, callee, args)
    }

    fn visit_expr_identifier(&mut self, _id: NodeId, _name: &str) -> ControlFlow<Self::Break> {
        ControlFlow::Continue(())
    }

    fn visit_function(&mut self, f: &Function) -> ControlFlow<Self::Break> {
        walk_function(self, f)
    }
}

// --- Walk functions: canonical traversal ---

pub fn walk_program<V: Visitor>(v: &mut V, p: &Program) -> ControlFlow<V::Break> {
    for stmt in &p.body {
        v.visit_statement(stmt)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_statements<V: Visitor>(v: &mut V, stmts: &[Statement]) -> ControlFlow<V::Break> {
    for stmt in stmts {
        v.visit_statement(stmt)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_statement<V: Visitor>(v: &mut V, s: &Statement) -> ControlFlow<V::Break> {
    match &s.kind {
        StmtKind::Expr(expr) => v.visit_expression(expr),
        StmtKind::VarDecl { declarators, .. } => {
            for decl in declarators {
                if let Some(init) = &decl.init {
                    v.visit_expression(init)?;
                }
            }
            ControlFlow::Continue(())
        }
        StmtKind::FunctionDecl(func) => v.visit_function(func),
        StmtKind::Return(value) => {
            if let Some(value) = value {
                v.visit_expression(value)?;
            }
            ControlFlow::Continue(())
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            v.visit_expression(cond)?;
            v.visit_statement(then_branch)?;
            if let Some(els) = else_branch {
                v.visit_statement(els)?;
            }
            ControlFlow::Continue(())
        }
        StmtKind::While { cond, body } => {
            v.visit_expression(cond)?;
            v.visit_statement(body)
        }
        StmtKind::DoWhile { body, cond } => {
            v.visit_statement(body)?;
            v.visit_expression(cond)
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            if let Some(init) = init {
                v.visit_statement(init)?;
            }
            if let Some(cond) = cond {
                v.visit_expression(cond)?;
            }
            if let Some(update) = update {
                v.visit_expression(update)?;
            }
            v.visit_statement(body)
        }
        StmtKind::ForIn { object, body, .. } => {
            v.visit_expression(object)?;
            v.visit_statement(body)
        }
        StmtKind::Block(stmts) => walk_statements(v, stmts),
        StmtKind::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            walk_statements(v, block)?;
            if let Some(handler) = handler {
                walk_statements(v, handler)?;
            }
            if let Some(finalizer) = finalizer {
                walk_statements(v, finalizer)?;
            }
            ControlFlow::Continue(())
        }
        StmtKind::Throw(value) => v.visit_expression(value),
        StmtKind::Break | StmtKind::Continue | StmtKind::Empty | StmtKind::EmittedComment(_) => {
            ControlFlow::Continue(())
        }
        StmtKind::Export(inner) => v.visit_statement(inner),
        StmtKind::ExportDefault(value) => v.visit_expression(value),
    }
}

pub fn walk_expression<V: Visitor>(v: &mut V, e: &Expression) -> ControlFlow<V::Break> {
    let id = e.h.id;
    match &e.kind {
        ExprKind::Literal(_) | ExprKind::This => ControlFlow::Continue(()),
        ExprKind::Identifier(name) => v.visit_expr_identifier(id, name),
        ExprKind::Array(elements) => {
            for elem in elements {
                v.visit_expression(elem)?;
            }
            ControlFlow::Continue(())
        }
        ExprKind::Object(properties) => {
            for (_key, value) in properties {
                v.visit_expression(value)?;
            }
            ControlFlow::Continue(())
        }
        ExprKind::Function(func) => v.visit_function(func),
        ExprKind::Arrow { body, .. } => match body {
            ArrowBody::Expr(expr) => v.visit_expression(expr),
            ArrowBody::Block(stmts) => walk_statements(v, stmts),
        },
        ExprKind::Call { callee, args } => v.visit_expr_call(id, callee, args),
        ExprKind::New { callee, args } => {
            v.visit_expression(callee)?;
            for arg in args {
                v.visit_expression(arg)?;
            }
            ControlFlow::Continue(())
        }
        ExprKind::Member { object, property } => {
            v.visit_expression(object)?;
            if let MemberProp::Computed(index) = property {
                v.visit_expression(index)?;
            }
            ControlFlow::Continue(())
        }
        ExprKind::Unary { operand, .. } => v.visit_expression(operand),
        ExprKind::Update { target, .. } => v.visit_expression(target),
        ExprKind::Binary { lhs, rhs, .. } | ExprKind::Logical { lhs, rhs, .. } => {
            v.visit_expression(lhs)?;
            v.visit_expression(rhs)
        }
        ExprKind::Assign { target, value, .. } => {
            v.visit_expression(target)?;
            v.visit_expression(value)
        }
        ExprKind::Conditional {
            cond,
            consequent,
            alternate,
        } => {
            v.visit_expression(cond)?;
            v.visit_expression(consequent)?;
            v.visit_expression(alternate)
        }
        ExprKind::Sequence(exprs) => {
            for expr in exprs {
                v.visit_expression(expr)?;
            }
            ControlFlow::Continue(())
        }
    }
}

pub fn walk_expr_call<V: Visitor>(
    v: &mut V,
    callee: &Expression,
    args: &[Expression],
) -> ControlFlow<V::Break> {
    v.visit_expression(callee)?;
    for arg in args {
        v.visit_expression(arg)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_function<V: Visitor>(v: &mut V, f: &Function) -> ControlFlow<V::Break> {
    walk_statements(v, &f.body)
}
