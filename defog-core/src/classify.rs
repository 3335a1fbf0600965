//! Helper classification: find every definition whose name matches the
//! configured intercept pattern.
//!
//! Two definition kinds are recognized: function declarations and
//! function-valued bindings (`var h = function(...) {...}` or an arrow).
//! Parameter-count constraints do not gate classification; they gate
//! rewriting.

use crate::ast::*;
use crate::config::Config;
use indexmap::IndexMap;
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperKind {
    Declaration,
    Binding,
}

#[derive(Debug, Clone)]
pub struct HelperDef {
    pub name: String,
    pub kind: HelperKind,
    /// Id of the statement that defines the helper.
    pub stmt_id: NodeId,
    /// Printable definition for the evaluation harness. For bindings in a
    /// multi-declarator statement this is a synthesized single-declarator
    /// statement.
    pub def_stmt: Statement,
    pub top_level: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Helpers {
    map: IndexMap<String, HelperDef>,
}

impl Helpers {
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&HelperDef> {
        self.map.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &HelperDef> {
        self.map.values()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn insert(&mut self, def: HelperDef) {
        if self.map.contains_key(&def.name) {
            // First definition wins; later ones would shadow at run time,
            // which the evaluator cannot model faithfully.
            warn!("helper {} defined more than once; keeping the first definition", def.name);
            return;
        }
        self.map.insert(def.name.clone(), def);
    }
}

/// Collect every helper definition in one traversal.
pub fn classify(program: &Program, config: &Config) -> Helpers {
    let mut helpers = Helpers::default();
    for stmt in &program.body {
        classify_stmt(stmt, true, config, &mut helpers);
    }
    helpers
}

fn classify_stmt(stmt: &Statement, top_level: bool, config: &Config, out: &mut Helpers) {
    match &stmt.kind {
        StmtKind::FunctionDecl(func) => {
            if let Some(name) = &func.name {
                if config.matches_helper(name) {
                    out.insert(HelperDef {
                        name: name.clone(),
                        kind: HelperKind::Declaration,
                        stmt_id: stmt.h.id,
                        def_stmt: stmt.clone(),
                        top_level,
                    });
                }
            }
            classify_stmts(&func.body, config, out);
        }
        StmtKind::VarDecl { keyword, declarators } => {
            for decl in declarators {
                let Some(init) = &decl.init else { continue };
                if init.is_function_like() && config.matches_helper(&decl.name) {
                    let def_stmt = Statement {
                        h: stmt.h.clone(),
                        kind: StmtKind::VarDecl {
                            keyword: *keyword,
                            declarators: vec![decl.clone()],
                        },
                    };
                    out.insert(HelperDef {
                        name: decl.name.clone(),
                        kind: HelperKind::Binding,
                        stmt_id: stmt.h.id,
                        def_stmt,
                        top_level,
                    });
                }
                classify_expr(init, config, out);
            }
        }
        StmtKind::Expr(expr) | StmtKind::Throw(expr) | StmtKind::ExportDefault(expr) => {
            classify_expr(expr, config, out);
        }
        StmtKind::Return(value) => {
            if let Some(value) = value {
                classify_expr(value, config, out);
            }
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            classify_expr(cond, config, out);
            classify_stmt(then_branch, false, config, out);
            if let Some(els) = else_branch {
                classify_stmt(els, false, config, out);
            }
        }
        StmtKind::While { cond, body } => {
            classify_expr(cond, config, out);
            classify_stmt(body, false, config, out);
        }
        StmtKind::DoWhile { body, cond } => {
            classify_stmt(body, false, config, out);
            classify_expr(cond, config, out);
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            if let Some(init) = init {
                classify_stmt(init, false, config, out);
            }
            if let Some(cond) = cond {
                classify_expr(cond, config, out);
            }
            if let Some(update) = update {
                classify_expr(update, config, out);
            }
            classify_stmt(body, false, config, out);
        }
        StmtKind::ForIn { object, body, .. } => {
            classify_expr(object, config, out);
            classify_stmt(body, false, config, out);
        }
        StmtKind::Block(stmts) => classify_stmts(stmts, config, out),
        StmtKind::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            classify_stmts(block, config, out);
            if let Some(handler) = handler {
                classify_stmts(handler, config, out);
            }
            if let Some(finalizer) = finalizer {
                classify_stmts(finalizer, config, out);
            }
        }
        // `export function h(...)` still defines a top-level name
        StmtKind::Export(inner) => classify_stmt(inner, top_level, config, out),
        StmtKind::Break | StmtKind::Continue | StmtKind::Empty | StmtKind::EmittedComment(_) => {}
    }
}

fn classify_stmts(stmts: &[Statement], config: &Config, out: &mut Helpers) {
    for stmt in stmts {
        classify_stmt(stmt, false, config, out);
    }
}

fn classify_expr(expr: &Expression, config: &Config, out: &mut Helpers) {
    match &expr.kind {
        ExprKind::Function(func) => {
            classify_stmts(&func.body, config, out);
        }
        ExprKind::Arrow { body, .. } => match body {
            ArrowBody::Expr(inner) => classify_expr(inner, config, out),
            ArrowBody::Block(stmts) => classify_stmts(stmts, config, out),
        },
        ExprKind::Array(elements) => {
            for elem in elements {
                classify_expr(elem, config, out);
            }
        }
        ExprKind::Object(properties) => {
            for (_key, value) in properties {
                classify_expr(value, config, out);
            }
        }
        ExprKind::Call { callee, args } | ExprKind::New { callee, args } => {
            classify_expr(callee, config, out);
            for arg in args {
                classify_expr(arg, config, out);
            }
        }
        ExprKind::Member { object, property } => {
            classify_expr(object, config, out);
            if let MemberProp::Computed(index) = property {
                classify_expr(index, config, out);
            }
        }
        ExprKind::Unary { operand, .. } => classify_expr(operand, config, out),
        ExprKind::Update { target, .. } => classify_expr(target, config, out),
        ExprKind::Binary { lhs, rhs, .. } | ExprKind::Logical { lhs, rhs, .. } => {
            classify_expr(lhs, config, out);
            classify_expr(rhs, config, out);
        }
        ExprKind::Assign { target, value, .. } => {
            classify_expr(target, config, out);
            classify_expr(value, config, out);
        }
        ExprKind::Conditional {
            cond,
            consequent,
            alternate,
        } => {
            classify_expr(cond, config, out);
            classify_expr(consequent, config, out);
            classify_expr(alternate, config, out);
        }
        ExprKind::Sequence(exprs) => {
            for e in exprs {
                classify_expr(e, config, out);
            }
        }
        ExprKind::Literal(_) | ExprKind::Identifier(_) | ExprKind::This => {}
    }
}
