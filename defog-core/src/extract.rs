//! Call-site extraction: find helper calls whose every argument is a
//! compile-time literal and which sit outside any initializer context.
//!
//! Also collects, for the harness, the initializer blocks that could
//! mutate helper behavior, and the seed names the dependency resolver
//! starts from.

use crate::ast::*;
use crate::classify::Helpers;
use crate::config::Config;
use crate::printer;
use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};

/// A pure constant-argument call site.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub node_id: NodeId,
    pub name: String,
    pub args: Vec<Literal>,
    /// Printed form of the call node; the result map is keyed by this.
    pub key: String,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Pure call sites keyed by their printed form. Textually identical
    /// calls collapse into one entry.
    pub pure_calls: IndexMap<String, CallSite>,
    /// Callee names seeding the dependency closure: helpers invoked in
    /// initializer contexts plus every pure-call name (including calls
    /// rejected only by the argument-count window).
    pub seed_names: IndexSet<String>,
    /// Initializer statements that invoke helpers and run at load time,
    /// cloned in source order for the harness context body. Each is
    /// collected where the traversal first enters it, however deeply it
    /// nests in the statement structure.
    pub init_blocks: Vec<Statement>,
}

/// Resolve a callee expression to the helper name it targets.
///
/// Plain identifiers resolve to themselves; member accesses resolve to the
/// property name unless that name is a reserved word, which rejects the
/// call outright. Everything else is unresolvable.
pub fn resolve_callee_name(callee: &Expression) -> Option<String> {
    match &callee.kind {
        ExprKind::Identifier(name) => Some(name.clone()),
        ExprKind::Member {
            property: MemberProp::Ident(prop),
            ..
        } => {
            if is_reserved_word(prop) {
                None
            } else {
                Some(prop.clone())
            }
        }
        _ => None,
    }
}

/// Capture the literal value of an argument expression, if it has one.
/// Unary negation of a numeric literal yields the negated value.
pub fn literal_of(expr: &Expression) -> Option<Literal> {
    match &expr.kind {
        ExprKind::Literal(lit) => Some(lit.clone()),
        ExprKind::Unary {
            op: UnaryOp::Minus,
            operand,
        } => match &operand.kind {
            ExprKind::Literal(Literal::Int(n)) => Some(Literal::Int(-n)),
            ExprKind::Literal(Literal::Float(f)) => Some(Literal::Float(-f)),
            _ => None,
        },
        _ => None,
    }
}

/// Whether a call node is an immediately-invoked routine block.
pub fn is_iife(callee: &Expression) -> bool {
    callee.is_function_like()
}

/// Whether a statement opens an initializer context: an immediately-
/// invoked block, a `do`/`while` loop, or a structured error-handling
/// block.
pub fn is_initializer_stmt(stmt: &Statement) -> bool {
    match &stmt.kind {
        StmtKind::DoWhile { .. } | StmtKind::While { .. } | StmtKind::Try { .. } => true,
        StmtKind::Expr(expr) => expr_contains_iife(expr),
        _ => false,
    }
}

fn expr_contains_iife(expr: &Expression) -> bool {
    use crate::visitor::{self, Visitor};
    use std::ops::ControlFlow;

    struct Finder;
    impl Visitor for Finder {
        type Break = ();

        fn visit_expr_call(
            &mut self,
            _id: NodeId,
            callee: &Expression,
            args: &[Expression],
        ) -> ControlFlow<()> {
            if is_iife(callee) {
                return ControlFlow::Break(());
            }
            visitor::walk_expr_call(self, callee, args)
        }
    }

    Finder.visit_expression(expr).is_break()
}

/// Whether any call under `stmt` resolves to a helper name.
pub fn stmt_calls_helper(stmt: &Statement, helpers: &Helpers) -> bool {
    use crate::visitor::{self, Visitor};
    use std::ops::ControlFlow;

    struct Finder<'a> {
        helpers: &'a Helpers,
    }
    impl Visitor for Finder<'_> {
        type Break = ();

        fn visit_expr_call(
            &mut self,
            _id: NodeId,
            callee: &Expression,
            args: &[Expression],
        ) -> ControlFlow<()> {
            if let Some(name) = resolve_callee_name(callee) {
                if self.helpers.contains(&name) {
                    return ControlFlow::Break(());
                }
            }
            visitor::walk_expr_call(self, callee, args)
        }
    }

    Finder { helpers }.visit_statement(stmt).is_break()
}

/// Run extraction over the whole tree.
pub fn extract(program: &Program, helpers: &Helpers, config: &Config) -> Extraction {
    let mut ex = Extractor {
        helpers,
        config,
        out: Extraction::default(),
    };
    for stmt in &program.body {
        ex.walk_stmt(stmt, false, false);
    }
    debug!(
        "extracted {} pure call site(s), {} seed name(s), {} initializer block(s)",
        ex.out.pure_calls.len(),
        ex.out.seed_names.len(),
        ex.out.init_blocks.len()
    );
    ex.out
}

struct Extractor<'a> {
    helpers: &'a Helpers,
    config: &'a Config,
    out: Extraction,
}

impl Extractor<'_> {
    /// `in_init` tracks the spec's initializer contexts along the ancestor
    /// chain. `in_fn` tracks enclosing function bodies that are not
    /// immediately invoked: statements inside them run only if the
    /// function is called, so they are never hoisted into the harness
    /// context body even when they open an initializer context.
    fn walk_stmt(&mut self, stmt: &Statement, in_init: bool, in_fn: bool) {
        // Collect an initializer block where the walk first enters it;
        // anything nested deeper is already covered by this block.
        if !in_init
            && !in_fn
            && is_initializer_stmt(stmt)
            && stmt_calls_helper(stmt, self.helpers)
        {
            self.out.init_blocks.push(stmt.clone());
        }

        match &stmt.kind {
            // A statement expression is a candidate position
            StmtKind::Expr(expr) => self.walk_expr(expr, in_init, in_fn, true),
            StmtKind::VarDecl { declarators, .. } => {
                for decl in declarators {
                    if let Some(init) = &decl.init {
                        // Right-hand side of a binding is a candidate position
                        self.walk_expr(init, in_init, in_fn, true);
                    }
                }
            }
            StmtKind::FunctionDecl(func) => self.walk_stmts(&func.body, in_init, true),
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.walk_expr(value, in_init, in_fn, false);
                }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.walk_expr(cond, in_init, in_fn, false);
                self.walk_stmt(then_branch, in_init, in_fn);
                if let Some(els) = else_branch {
                    self.walk_stmt(els, in_init, in_fn);
                }
            }
            // Loops are initializer contexts for everything inside them
            StmtKind::While { cond, body } => {
                self.walk_expr(cond, true, in_fn, false);
                self.walk_stmt(body, true, in_fn);
            }
            StmtKind::DoWhile { body, cond } => {
                self.walk_stmt(body, true, in_fn);
                self.walk_expr(cond, true, in_fn, false);
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.walk_stmt(init, in_init, in_fn);
                }
                if let Some(cond) = cond {
                    self.walk_expr(cond, in_init, in_fn, false);
                }
                if let Some(update) = update {
                    self.walk_expr(update, in_init, in_fn, false);
                }
                self.walk_stmt(body, in_init, in_fn);
            }
            StmtKind::ForIn { object, body, .. } => {
                self.walk_expr(object, in_init, in_fn, false);
                self.walk_stmt(body, in_init, in_fn);
            }
            StmtKind::Block(stmts) => self.walk_stmts(stmts, in_init, in_fn),
            // Structured error handling is an initializer context
            StmtKind::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.walk_stmts(block, true, in_fn);
                if let Some(handler) = handler {
                    self.walk_stmts(handler, true, in_fn);
                }
                if let Some(finalizer) = finalizer {
                    self.walk_stmts(finalizer, true, in_fn);
                }
            }
            StmtKind::Throw(value) => self.walk_expr(value, in_init, in_fn, false),
            StmtKind::Export(inner) => self.walk_stmt(inner, in_init, in_fn),
            StmtKind::ExportDefault(value) => self.walk_expr(value, in_init, in_fn, false),
            StmtKind::Break | StmtKind::Continue | StmtKind::Empty | StmtKind::EmittedComment(_) => {}
        }
    }

    fn walk_stmts(&mut self, stmts: &[Statement], in_init: bool, in_fn: bool) {
        for stmt in stmts {
            self.walk_stmt(stmt, in_init, in_fn);
        }
    }

    /// `candidate` marks the syntactic positions from which a call may be
    /// rewritten: statement expression, binding/assignment right-hand
    /// side, object-field value, array element, or call argument.
    fn walk_expr(&mut self, expr: &Expression, in_init: bool, in_fn: bool, candidate: bool) {
        match &expr.kind {
            ExprKind::Call { callee, args } => {
                let iife = is_iife(callee);
                let inner_init = in_init || iife;
                if !iife {
                    self.consider_call(expr, callee, args, in_init, candidate);
                }
                match &callee.kind {
                    // An invoked body runs when the statement runs, so it
                    // does not count as an enclosing function
                    ExprKind::Function(func) => self.walk_stmts(&func.body, inner_init, in_fn),
                    ExprKind::Arrow { body, .. } => match body {
                        ArrowBody::Expr(inner) => self.walk_expr(inner, inner_init, in_fn, false),
                        ArrowBody::Block(stmts) => self.walk_stmts(stmts, inner_init, in_fn),
                    },
                    _ => self.walk_expr(callee, inner_init, in_fn, false),
                }
                for arg in args {
                    // Nested call arguments remain candidate positions
                    self.walk_expr(arg, inner_init, in_fn, true);
                }
            }
            ExprKind::New { callee, args } => {
                self.walk_expr(callee, in_init, in_fn, false);
                for arg in args {
                    self.walk_expr(arg, in_init, in_fn, false);
                }
            }
            ExprKind::Member { object, property } => {
                self.walk_expr(object, in_init, in_fn, false);
                if let MemberProp::Computed(index) = property {
                    self.walk_expr(index, in_init, in_fn, false);
                }
            }
            ExprKind::Assign { target, value, .. } => {
                self.walk_expr(target, in_init, in_fn, false);
                // Right-hand side of an assignment is a candidate position
                self.walk_expr(value, in_init, in_fn, true);
            }
            ExprKind::Array(elements) => {
                for elem in elements {
                    self.walk_expr(elem, in_init, in_fn, true);
                }
            }
            ExprKind::Object(properties) => {
                for (_key, value) in properties {
                    self.walk_expr(value, in_init, in_fn, true);
                }
            }
            ExprKind::Function(func) => self.walk_stmts(&func.body, in_init, true),
            ExprKind::Arrow { body, .. } => match body {
                ArrowBody::Expr(inner) => self.walk_expr(inner, in_init, true, false),
                ArrowBody::Block(stmts) => self.walk_stmts(stmts, in_init, true),
            },
            ExprKind::Unary { operand, .. } => self.walk_expr(operand, in_init, in_fn, false),
            ExprKind::Update { target, .. } => self.walk_expr(target, in_init, in_fn, false),
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Logical { lhs, rhs, .. } => {
                self.walk_expr(lhs, in_init, in_fn, false);
                self.walk_expr(rhs, in_init, in_fn, false);
            }
            ExprKind::Conditional {
                cond,
                consequent,
                alternate,
            } => {
                self.walk_expr(cond, in_init, in_fn, false);
                self.walk_expr(consequent, in_init, in_fn, false);
                self.walk_expr(alternate, in_init, in_fn, false);
            }
            ExprKind::Sequence(exprs) => {
                for e in exprs {
                    self.walk_expr(e, in_init, in_fn, false);
                }
            }
            ExprKind::Literal(_) | ExprKind::Identifier(_) | ExprKind::This => {}
        }
    }

    fn consider_call(
        &mut self,
        call: &Expression,
        callee: &Expression,
        args: &[Expression],
        in_init: bool,
        candidate: bool,
    ) {
        let Some(name) = resolve_callee_name(callee) else {
            return;
        };
        if !self.config.matches_helper(&name) {
            return;
        }
        if !self.helpers.contains(&name) {
            // A call references a helper-shaped name with no definition in
            // the tree. Reported, left untouched.
            warn!("call to {} matches the intercept pattern but has no definition", name);
            return;
        }
        if in_init {
            // Initializer-context calls seed the closure but are never
            // rewritten. The evaluation filter does not apply to them.
            self.out.seed_names.insert(name);
            return;
        }
        if !candidate || !self.config.matches_evaluated(&name) {
            return;
        }

        let mut literals = Vec::with_capacity(args.len());
        for arg in args {
            match literal_of(arg) {
                Some(lit) => literals.push(lit),
                None => return,
            }
        }

        // Outside the argument-count window the call is not rewritten,
        // but its callee still seeds the dependency closure.
        self.out.seed_names.insert(name.clone());
        if !self.config.arg_count_in_window(args.len()) {
            return;
        }

        let key = printer::print_expression(call);
        self.out.pure_calls.entry(key.clone()).or_insert(CallSite {
            node_id: call.h.id,
            name,
            args: literals,
            key,
        });
    }
}
