//! Cleanup analysis: find helper definitions and initializer blocks that
//! are provably dead after rewriting, then comment or remove them.
//!
//! Liveness iterates to a fixed point so a dead caller no longer pins its
//! callees. A helper's own definition never counts as a live use of
//! itself. Cleanup never introduces identifier references and never
//! reorders statements.

use crate::ast::*;
use crate::classify::{HelperKind, Helpers};
use crate::config::CleanupMode;
use crate::extract::{is_initializer_stmt, resolve_callee_name, stmt_calls_helper};
use crate::harness::CapturedValue;
use crate::printer;
use crate::visitor::{self, Visitor};
use indexmap::{IndexMap, IndexSet};
use log::debug;
use std::ops::ControlFlow;

#[derive(Debug, Clone, Default)]
pub struct CleanupStats {
    pub dead_helpers: Vec<String>,
    pub dead_init_blocks: usize,
}

#[derive(Debug, Default)]
struct DeadSet {
    /// Whole statements marked dead.
    stmts: IndexSet<NodeId>,
    /// Individual declarators marked dead inside multi-declarator
    /// statements: (statement id, declarator name).
    declarators: IndexSet<(NodeId, String)>,
}

/// Run cleanup over the rewritten tree.
pub fn cleanup(
    program: &mut Program,
    helpers: &Helpers,
    results: &IndexMap<String, CapturedValue>,
    mode: CleanupMode,
) -> CleanupStats {
    let mut stats = CleanupStats::default();
    if mode == CleanupMode::None {
        return stats;
    }

    let exported = exported_names(program);
    let mut dead = DeadSet::default();

    // Initializer blocks first: their references stop pinning helpers
    for stmt in &program.body {
        if is_initializer_stmt(stmt) && stmt_calls_helper(stmt, helpers) {
            if all_helper_calls_keyed(stmt, helpers, results) {
                dead.stmts.insert(stmt.h.id);
                stats.dead_init_blocks += 1;
            }
        }
    }

    // Helper liveness to a fixed point
    loop {
        let mut changed = false;
        for def in helpers.iter() {
            if exported.contains(&def.name) {
                continue;
            }
            let own = own_definition(def);
            if is_marked(&dead, &own) {
                continue;
            }
            let live_uses = count_references(program, &def.name, &dead, &own);
            if live_uses == 0 {
                mark(&mut dead, own);
                stats.dead_helpers.push(def.name.clone());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    debug!(
        "cleanup: {} dead helper(s), {} dead initializer block(s)",
        stats.dead_helpers.len(),
        stats.dead_init_blocks
    );

    apply(&mut program.body, &dead, mode);
    stats
}

enum OwnDef {
    Stmt(NodeId),
    Declarator(NodeId, String),
}

fn own_definition(def: &crate::classify::HelperDef) -> OwnDef {
    match def.kind {
        HelperKind::Declaration => OwnDef::Stmt(def.stmt_id),
        // The synthesized def_stmt shares the original statement's id;
        // liveness must skip only this helper's declarator.
        HelperKind::Binding => OwnDef::Declarator(def.stmt_id, def.name.clone()),
    }
}

fn is_marked(dead: &DeadSet, own: &OwnDef) -> bool {
    match own {
        OwnDef::Stmt(id) => dead.stmts.contains(id),
        OwnDef::Declarator(id, name) => {
            dead.stmts.contains(id) || dead.declarators.contains(&(*id, name.clone()))
        }
    }
}

fn mark(dead: &mut DeadSet, own: OwnDef) {
    match own {
        OwnDef::Stmt(id) => {
            dead.stmts.insert(id);
        }
        OwnDef::Declarator(id, name) => {
            dead.declarators.insert((id, name));
        }
    }
}

/// Names exported at the top level of the program.
fn exported_names(program: &Program) -> IndexSet<String> {
    let mut names = IndexSet::new();
    for stmt in &program.body {
        match &stmt.kind {
            StmtKind::Export(inner) => match &inner.kind {
                StmtKind::FunctionDecl(func) => {
                    if let Some(name) = &func.name {
                        names.insert(name.clone());
                    }
                }
                StmtKind::VarDecl { declarators, .. } => {
                    for decl in declarators {
                        names.insert(decl.name.clone());
                    }
                }
                _ => {}
            },
            StmtKind::ExportDefault(value) => {
                if let ExprKind::Identifier(name) = &value.kind {
                    names.insert(name.clone());
                }
            }
            _ => {}
        }
    }
    names
}

/// True when every call to a helper inside `stmt` has its printed form in
/// the result map. Blocks with no helper calls are handled by the caller.
fn all_helper_calls_keyed(
    stmt: &Statement,
    helpers: &Helpers,
    results: &IndexMap<String, CapturedValue>,
) -> bool {
    struct Checker<'a> {
        helpers: &'a Helpers,
        results: &'a IndexMap<String, CapturedValue>,
    }
    impl Visitor for Checker<'_> {
        type Break = ();

        fn visit_expr_call(
            &mut self,
            _id: NodeId,
            callee: &Expression,
            args: &[Expression],
        ) -> ControlFlow<()> {
            if let Some(name) = resolve_callee_name(callee) {
                if self.helpers.contains(&name) {
                    // Reconstruct the full call node for its printed form
                    let call = Expression {
                        h: Header {
                            id: NodeId(0),
                            span: Span::dummy(),
                        },
                        kind: ExprKind::Call {
                            callee: Box::new(callee.clone()),
                            args: args.to_vec(),
                        },
                    };
                    if !self.results.contains_key(&printer::print_expression(&call)) {
                        return ControlFlow::Break(());
                    }
                }
            }
            visitor::walk_expr_call(self, callee, args)
        }
    }

    !Checker { helpers, results }.visit_statement(stmt).is_break()
}

// =============================================================================
// Reference counting
// =============================================================================

fn count_references(program: &Program, name: &str, dead: &DeadSet, own: &OwnDef) -> usize {
    let mut counter = RefCounter {
        name,
        dead,
        own,
        count: 0,
    };
    counter.count_stmts(&program.body);
    counter.count
}

struct RefCounter<'a> {
    name: &'a str,
    dead: &'a DeadSet,
    own: &'a OwnDef,
    count: usize,
}

impl RefCounter<'_> {
    fn count_stmts(&mut self, stmts: &[Statement]) {
        for stmt in stmts {
            self.count_stmt(stmt);
        }
    }

    fn count_stmt(&mut self, stmt: &Statement) {
        if self.dead.stmts.contains(&stmt.h.id) {
            return;
        }
        if let OwnDef::Stmt(id) = self.own {
            if *id == stmt.h.id {
                return;
            }
        }
        match &stmt.kind {
            StmtKind::VarDecl { declarators, .. } => {
                for decl in declarators {
                    let entry = (stmt.h.id, decl.name.clone());
                    if self.dead.declarators.contains(&entry) {
                        continue;
                    }
                    if let OwnDef::Declarator(id, name) = self.own {
                        if *id == stmt.h.id && name == &decl.name {
                            continue;
                        }
                    }
                    if let Some(init) = &decl.init {
                        self.count_expr(init);
                    }
                }
            }
            StmtKind::Expr(expr) | StmtKind::Throw(expr) | StmtKind::ExportDefault(expr) => {
                self.count_expr(expr)
            }
            StmtKind::FunctionDecl(func) => self.count_stmts(&func.body),
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.count_expr(value);
                }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.count_expr(cond);
                self.count_stmt(then_branch);
                if let Some(els) = else_branch {
                    self.count_stmt(els);
                }
            }
            StmtKind::While { cond, body } => {
                self.count_expr(cond);
                self.count_stmt(body);
            }
            StmtKind::DoWhile { body, cond } => {
                self.count_stmt(body);
                self.count_expr(cond);
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.count_stmt(init);
                }
                if let Some(cond) = cond {
                    self.count_expr(cond);
                }
                if let Some(update) = update {
                    self.count_expr(update);
                }
                self.count_stmt(body);
            }
            StmtKind::ForIn { object, body, .. } => {
                self.count_expr(object);
                self.count_stmt(body);
            }
            StmtKind::Block(stmts) => self.count_stmts(stmts),
            StmtKind::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.count_stmts(block);
                if let Some(handler) = handler {
                    self.count_stmts(handler);
                }
                if let Some(finalizer) = finalizer {
                    self.count_stmts(finalizer);
                }
            }
            StmtKind::Export(inner) => self.count_stmt(inner),
            StmtKind::Break | StmtKind::Continue | StmtKind::Empty | StmtKind::EmittedComment(_) => {}
        }
    }

    fn count_expr(&mut self, expr: &Expression) {
        match &expr.kind {
            ExprKind::Identifier(name) => {
                if name == self.name {
                    self.count += 1;
                }
            }
            ExprKind::Function(func) => {
                // A function expression named like the helper shadows it
                if func.name.as_deref() != Some(self.name) {
                    self.count_stmts(&func.body);
                }
            }
            ExprKind::Arrow { body, .. } => match body {
                ArrowBody::Expr(inner) => self.count_expr(inner),
                ArrowBody::Block(stmts) => self.count_stmts(stmts),
            },
            ExprKind::Array(elements) => {
                for elem in elements {
                    self.count_expr(elem);
                }
            }
            ExprKind::Object(properties) => {
                for (_key, value) in properties {
                    self.count_expr(value);
                }
            }
            ExprKind::Call { callee, args } | ExprKind::New { callee, args } => {
                self.count_expr(callee);
                for arg in args {
                    self.count_expr(arg);
                }
            }
            ExprKind::Member { object, property } => {
                self.count_expr(object);
                if let MemberProp::Computed(index) = property {
                    self.count_expr(index);
                }
            }
            ExprKind::Unary { operand, .. } => self.count_expr(operand),
            ExprKind::Update { target, .. } => self.count_expr(target),
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Logical { lhs, rhs, .. } => {
                self.count_expr(lhs);
                self.count_expr(rhs);
            }
            ExprKind::Assign { target, value, .. } => {
                self.count_expr(target);
                self.count_expr(value);
            }
            ExprKind::Conditional {
                cond,
                consequent,
                alternate,
            } => {
                self.count_expr(cond);
                self.count_expr(consequent);
                self.count_expr(alternate);
            }
            ExprKind::Sequence(exprs) => {
                for e in exprs {
                    self.count_expr(e);
                }
            }
            ExprKind::Literal(_) | ExprKind::This => {}
        }
    }
}

// =============================================================================
// Applying the marks
// =============================================================================

fn apply(stmts: &mut Vec<Statement>, dead: &DeadSet, mode: CleanupMode) {
    let mut index = 0;
    while index < stmts.len() {
        let id = stmts[index].h.id;
        if dead.stmts.contains(&id) {
            match mode {
                CleanupMode::Comment => {
                    let text = format!("[cleanup] {}", printer::print_statement(&stmts[index]));
                    stmts[index] = Statement {
                        h: stmts[index].h.clone(),
                        kind: StmtKind::EmittedComment(text),
                    };
                    index += 1;
                }
                CleanupMode::Remove => {
                    stmts.remove(index);
                }
                CleanupMode::None => index += 1,
            }
            continue;
        }

        let (any_dead, all_dead) = match &stmts[index].kind {
            StmtKind::VarDecl { declarators, .. } => {
                let any = declarators
                    .iter()
                    .any(|d| dead.declarators.contains(&(id, d.name.clone())));
                let all = any
                    && declarators
                        .iter()
                        .all(|d| dead.declarators.contains(&(id, d.name.clone())));
                (any, all)
            }
            _ => (false, false),
        };
        if any_dead {
            match mode {
                CleanupMode::Remove => {
                    if let StmtKind::VarDecl { declarators, .. } = &mut stmts[index].kind {
                        declarators.retain(|d| !dead.declarators.contains(&(id, d.name.clone())));
                        if declarators.is_empty() {
                            stmts.remove(index);
                            continue;
                        }
                    }
                }
                CleanupMode::Comment => {
                    if all_dead {
                        let text = format!("[cleanup] {}", printer::print_statement(&stmts[index]));
                        stmts[index] = Statement {
                            h: stmts[index].h.clone(),
                            kind: StmtKind::EmittedComment(text),
                        };
                    }
                    // A partially-dead declaration list stays intact:
                    // commenting part of a statement is not expressible
                }
                CleanupMode::None => {}
            }
        }

        apply_nested(&mut stmts[index], dead, mode);
        index += 1;
    }
}

fn apply_nested(stmt: &mut Statement, dead: &DeadSet, mode: CleanupMode) {
    match &mut stmt.kind {
        StmtKind::FunctionDecl(func) => apply(&mut func.body, dead, mode),
        StmtKind::Block(stmts) => apply(stmts, dead, mode),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            apply_nested(then_branch, dead, mode);
            if let Some(els) = else_branch {
                apply_nested(els, dead, mode);
            }
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
            apply_nested(body, dead, mode)
        }
        StmtKind::For { body, .. } | StmtKind::ForIn { body, .. } => apply_nested(body, dead, mode),
        StmtKind::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            apply(block, dead, mode);
            if let Some(handler) = handler {
                apply(handler, dead, mode);
            }
            if let Some(finalizer) = finalizer {
                apply(finalizer, dead, mode);
            }
        }
        StmtKind::Expr(expr) => apply_in_expr(expr, dead, mode),
        StmtKind::VarDecl { declarators, .. } => {
            for decl in declarators {
                if let Some(init) = &mut decl.init {
                    apply_in_expr(init, dead, mode);
                }
            }
        }
        StmtKind::Export(inner) => apply_nested(inner, dead, mode),
        _ => {}
    }
}

/// Helper definitions can hide inside function expression bodies.
fn apply_in_expr(expr: &mut Expression, dead: &DeadSet, mode: CleanupMode) {
    match &mut expr.kind {
        ExprKind::Function(func) => apply(&mut func.body, dead, mode),
        ExprKind::Arrow { body, .. } => match body {
            ArrowBody::Expr(inner) => apply_in_expr(inner, dead, mode),
            ArrowBody::Block(stmts) => apply(stmts, dead, mode),
        },
        ExprKind::Call { callee, args } | ExprKind::New { callee, args } => {
            apply_in_expr(callee, dead, mode);
            for arg in args {
                apply_in_expr(arg, dead, mode);
            }
        }
        ExprKind::Assign { value, .. } => apply_in_expr(value, dead, mode),
        ExprKind::Sequence(exprs) => {
            for e in exprs {
                apply_in_expr(e, dead, mode);
            }
        }
        _ => {}
    }
}
