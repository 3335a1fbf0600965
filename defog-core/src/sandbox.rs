//! Sandboxed evaluator for assembled helper programs.
//!
//! A tree-walking interpreter over the same syntax tree the pipeline uses.
//! It provides only the ambient values helpers may reference without
//! observable external effect: a discarding `console`, safe numeric and
//! string intrinsics, a stable clock, an opaque `require`, and a seeded
//! `Math.random`. Filesystem, network and process effects simply do not
//! exist in here.
//!
//! Resource policy: a wall-clock deadline, an evaluation step budget and a
//! call-depth cap. Exceeding any of them fails the whole evaluation rather
//! than hanging; a thrown value is the only abort a `try` statement can
//! catch.

use crate::ast::*;
use crate::lexer;
use crate::parser::Parser;
use indexmap::IndexMap;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

// =============================================================================
// Values
// =============================================================================

pub type ObjRef = Rc<RefCell<IndexMap<String, Value>>>;
pub type ArrRef = Rc<RefCell<Vec<Value>>>;

#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Object(ObjRef),
    Array(ArrRef),
    Function(Rc<Closure>),
}

pub struct Closure {
    pub name: Option<String>,
    params: Vec<String>,
    body: ClosureBody,
    scope: ScopeRef,
}

// Scopes can hold the closure that owns them; a derived Debug would chase
// that cycle forever.
impl std::fmt::Debug for Closure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

enum ClosureBody {
    Block(Rc<Vec<Statement>>),
    Expr(Rc<Expression>),
}

impl Value {
    fn type_of(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Undefined => "undefined",
            Value::Null | Value::Object(_) | Value::Array(_) => "object",
            Value::Function(_) => "function",
        }
    }
}

// =============================================================================
// Scopes
// =============================================================================

type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Debug)]
struct Scope {
    vars: HashMap<String, Value>,
    parent: Option<ScopeRef>,
}

impl Scope {
    fn root() -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: None,
        }))
    }

    fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(parent.clone()),
        }))
    }
}

fn scope_lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
    let mut current = scope.clone();
    loop {
        if let Some(value) = current.borrow().vars.get(name) {
            return Some(value.clone());
        }
        let parent = current.borrow().parent.clone();
        match parent {
            Some(p) => current = p,
            None => return None,
        }
    }
}

fn scope_declare(scope: &ScopeRef, name: &str, value: Value) {
    scope.borrow_mut().vars.insert(name.to_string(), value);
}

/// Assign through the chain; undeclared names land on the outermost scope,
/// matching the sloppy-mode global fallback.
fn scope_assign(scope: &ScopeRef, name: &str, value: Value) {
    let mut current = scope.clone();
    loop {
        if current.borrow().vars.contains_key(name) {
            current.borrow_mut().vars.insert(name.to_string(), value);
            return;
        }
        let parent = current.borrow().parent.clone();
        match parent {
            Some(p) => current = p,
            None => {
                current.borrow_mut().vars.insert(name.to_string(), value);
                return;
            }
        }
    }
}

// =============================================================================
// Outcome and limits
// =============================================================================

#[derive(Debug)]
pub enum SandboxStatus {
    Ok,
    Timeout,
    Fatal(String),
}

#[derive(Debug)]
pub struct SandboxOutcome {
    pub status: SandboxStatus,
    /// Contents of the `__results` global after the run, insertion order.
    pub results: Vec<(String, Value)>,
    /// Contents of the `__calls` global after the run.
    pub calls: Vec<Value>,
}

impl SandboxOutcome {
    fn failed(status: SandboxStatus) -> Self {
        SandboxOutcome {
            status,
            results: Vec::new(),
            calls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Limits {
    pub timeout: Duration,
    pub max_steps: u64,
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            timeout: Duration::from_secs(30),
            max_steps: 50_000_000,
            max_depth: 256,
        }
    }
}

/// Run an assembled program and return whatever `__results` and `__calls`
/// hold afterwards.
pub fn evaluate(program_text: &str, limits: &Limits) -> SandboxOutcome {
    let tokens = match lexer::tokenize(program_text) {
        Ok(tokens) => tokens,
        Err(e) => return SandboxOutcome::failed(SandboxStatus::Fatal(e)),
    };
    let mut counter = NodeCounter::new();
    let mut parser = Parser::new(tokens, &mut counter);
    let program = match parser.parse() {
        Ok(program) => program,
        Err(e) => return SandboxOutcome::failed(SandboxStatus::Fatal(e.to_string())),
    };

    let global = Scope::root();
    let mut interp = Interp {
        deadline: Instant::now() + limits.timeout,
        epoch: Instant::now(),
        steps_left: limits.max_steps,
        depth: 0,
        max_depth: limits.max_depth,
        rng: 0x2545f4914f6cdd1d,
    };

    match interp.exec_body(&program.body, &global) {
        Ok(_) => {}
        Err(Abort::Timeout) => return SandboxOutcome::failed(SandboxStatus::Timeout),
        Err(Abort::Budget) => {
            return SandboxOutcome::failed(SandboxStatus::Fatal("step budget exceeded".into()))
        }
        Err(Abort::DepthExceeded) => {
            return SandboxOutcome::failed(SandboxStatus::Fatal("call depth exceeded".into()))
        }
        Err(Abort::Thrown(v)) => {
            return SandboxOutcome::failed(SandboxStatus::Fatal(format!(
                "uncaught exception: {}",
                to_js_string(&v)
            )))
        }
        Err(Abort::Unsupported(msg)) => {
            return SandboxOutcome::failed(SandboxStatus::Fatal(msg))
        }
    }

    let results = match scope_lookup(&global, "__results") {
        Some(Value::Object(map)) => map.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => Vec::new(),
    };
    let calls = match scope_lookup(&global, "__calls") {
        Some(Value::Array(items)) => items.borrow().clone(),
        _ => Vec::new(),
    };
    debug!("sandbox finished with {} result(s)", results.len());

    SandboxOutcome {
        status: SandboxStatus::Ok,
        results,
        calls,
    }
}

// =============================================================================
// Interpreter
// =============================================================================

enum Abort {
    Timeout,
    Budget,
    DepthExceeded,
    Thrown(Value),
    Unsupported(String),
}

type EResult<T> = Result<T, Abort>;

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

fn throw_type_error(message: impl Into<String>) -> Abort {
    Abort::Thrown(Value::Str(format!("TypeError: {}", message.into())))
}

struct Interp {
    deadline: Instant,
    epoch: Instant,
    steps_left: u64,
    depth: usize,
    max_depth: usize,
    rng: u64,
}

impl Interp {
    fn tick(&mut self) -> EResult<()> {
        if self.steps_left == 0 {
            return Err(Abort::Budget);
        }
        self.steps_left -= 1;
        if self.steps_left % 4096 == 0 && Instant::now() > self.deadline {
            return Err(Abort::Timeout);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------------------

    /// Execute a program or function body: hoist, then run.
    fn exec_body(&mut self, stmts: &[Statement], scope: &ScopeRef) -> EResult<Flow> {
        self.hoist_stmts(stmts, scope)?;
        self.exec_stmts(stmts, scope)
    }

    /// Hoisting pass: `var` names come into scope as undefined, function
    /// declarations bind eagerly so forward references work. Does not
    /// descend into nested functions.
    fn hoist_stmts(&mut self, stmts: &[Statement], scope: &ScopeRef) -> EResult<()> {
        for stmt in stmts {
            self.hoist_stmt(stmt, scope)?;
        }
        Ok(())
    }

    fn hoist_stmt(&mut self, stmt: &Statement, scope: &ScopeRef) -> EResult<()> {
        match &stmt.kind {
            StmtKind::VarDecl { declarators, .. } => {
                for decl in declarators {
                    if !scope.borrow().vars.contains_key(&decl.name) {
                        scope_declare(scope, &decl.name, Value::Undefined);
                    }
                }
            }
            StmtKind::FunctionDecl(func) => {
                let closure = Closure {
                    name: func.name.clone(),
                    params: func.params.clone(),
                    body: ClosureBody::Block(Rc::new(func.body.clone())),
                    scope: scope.clone(),
                };
                if let Some(name) = &func.name {
                    scope_declare(scope, name, Value::Function(Rc::new(closure)));
                }
            }
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.hoist_stmt(then_branch, scope)?;
                if let Some(els) = else_branch {
                    self.hoist_stmt(els, scope)?;
                }
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                self.hoist_stmt(body, scope)?;
            }
            StmtKind::For { init, body, .. } => {
                if let Some(init) = init {
                    self.hoist_stmt(init, scope)?;
                }
                self.hoist_stmt(body, scope)?;
            }
            StmtKind::ForIn { name, body, .. } => {
                if !scope.borrow().vars.contains_key(name) {
                    scope_declare(scope, name, Value::Undefined);
                }
                self.hoist_stmt(body, scope)?;
            }
            StmtKind::Block(stmts) => self.hoist_stmts(stmts, scope)?,
            StmtKind::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.hoist_stmts(block, scope)?;
                if let Some(handler) = handler {
                    self.hoist_stmts(handler, scope)?;
                }
                if let Some(finalizer) = finalizer {
                    self.hoist_stmts(finalizer, scope)?;
                }
            }
            StmtKind::Export(inner) => self.hoist_stmt(inner, scope)?,
            _ => {}
        }
        Ok(())
    }

    fn exec_stmts(&mut self, stmts: &[Statement], scope: &ScopeRef) -> EResult<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Statement, scope: &ScopeRef) -> EResult<Flow> {
        self.tick()?;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
            StmtKind::VarDecl { declarators, .. } => {
                for decl in declarators {
                    if let Some(init) = &decl.init {
                        let value = self.eval(init, scope)?;
                        scope_assign(scope, &decl.name, value);
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::FunctionDecl(_) => Ok(Flow::Normal), // bound during hoisting
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.eval(cond, scope)?;
                if truthy(&cond) {
                    self.exec_stmt(then_branch, scope)
                } else if let Some(els) = else_branch {
                    self.exec_stmt(els, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While { cond, body } => {
                loop {
                    self.tick()?;
                    let c = self.eval(cond, scope)?;
                    if !truthy(&c) {
                        break;
                    }
                    match self.exec_stmt(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::DoWhile { body, cond } => {
                loop {
                    self.tick()?;
                    match self.exec_stmt(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                    let c = self.eval(cond, scope)?;
                    if !truthy(&c) {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.exec_stmt(init, scope)?;
                }
                loop {
                    self.tick()?;
                    if let Some(cond) = cond {
                        let c = self.eval(cond, scope)?;
                        if !truthy(&c) {
                            break;
                        }
                    }
                    match self.exec_stmt(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                    if let Some(update) = update {
                        self.eval(update, scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::ForIn {
                name, object, body, ..
            } => {
                let object = self.eval(object, scope)?;
                let keys: Vec<String> = match &object {
                    Value::Object(map) => map.borrow().keys().cloned().collect(),
                    Value::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
                    _ => Vec::new(),
                };
                for key in keys {
                    self.tick()?;
                    scope_assign(scope, name, Value::Str(key));
                    match self.exec_stmt(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Block(stmts) => self.exec_stmts(stmts, scope),
            StmtKind::Try {
                block,
                catch_param,
                handler,
                finalizer,
            } => {
                let outcome = match self.exec_stmts(block, scope) {
                    // Only thrown values are catchable; resource aborts
                    // fail the whole evaluation
                    Err(Abort::Thrown(thrown)) => match handler {
                        Some(handler) => {
                            if let Some(param) = catch_param {
                                scope_declare(scope, param, thrown);
                            }
                            self.exec_stmts(handler, scope)
                        }
                        None => Err(Abort::Thrown(thrown)),
                    },
                    other => other,
                };
                if let Some(finalizer) = finalizer {
                    match self.exec_stmts(finalizer, scope)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                outcome
            }
            StmtKind::Throw(value) => {
                let value = self.eval(value, scope)?;
                Err(Abort::Thrown(value))
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Empty | StmtKind::EmittedComment(_) => Ok(Flow::Normal),
            StmtKind::Export(inner) => self.exec_stmt(inner, scope),
            StmtKind::ExportDefault(value) => {
                self.eval(value, scope)?;
                Ok(Flow::Normal)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Expressions
    // -------------------------------------------------------------------------

    fn eval(&mut self, expr: &Expression, scope: &ScopeRef) -> EResult<Value> {
        self.tick()?;
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal_value(lit)),
            ExprKind::Identifier(name) => Ok(self.lookup_ident(name, scope)),
            ExprKind::This => Ok(Value::Undefined),
            ExprKind::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for elem in elements {
                    values.push(self.eval(elem, scope)?);
                }
                Ok(Value::Array(Rc::new(RefCell::new(values))))
            }
            ExprKind::Object(properties) => {
                let mut map = IndexMap::new();
                for (key, value) in properties {
                    let key = match key {
                        PropKey::Ident(name) => name.clone(),
                        PropKey::Str(s) => s.clone(),
                        PropKey::Num(n) => js_number_string(*n),
                    };
                    let value = self.eval(value, scope)?;
                    map.insert(key, value);
                }
                Ok(Value::Object(Rc::new(RefCell::new(map))))
            }
            ExprKind::Function(func) => Ok(Value::Function(Rc::new(Closure {
                name: func.name.clone(),
                params: func.params.clone(),
                body: ClosureBody::Block(Rc::new(func.body.clone())),
                scope: scope.clone(),
            }))),
            ExprKind::Arrow { params, body } => {
                let body = match body {
                    ArrowBody::Block(stmts) => ClosureBody::Block(Rc::new(stmts.clone())),
                    ArrowBody::Expr(expr) => ClosureBody::Expr(Rc::new((**expr).clone())),
                };
                Ok(Value::Function(Rc::new(Closure {
                    name: None,
                    params: params.clone(),
                    body,
                    scope: scope.clone(),
                })))
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args, scope),
            ExprKind::New { callee, args } => self.eval_new(callee, args, scope),
            ExprKind::Member { object, property } => {
                if let (ExprKind::Identifier(ns), MemberProp::Ident(prop)) =
                    (&object.kind, property)
                {
                    if scope_lookup(scope, ns).is_none() {
                        if let Some(value) = namespace_constant(ns, prop) {
                            return Ok(value);
                        }
                    }
                }
                let object = self.eval(object, scope)?;
                let key = self.property_key(property, scope)?;
                self.get_property(&object, &key)
            }
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            ExprKind::Update { op, prefix, target } => {
                let old = to_number(&self.eval(target, scope)?);
                let new = match op {
                    UpdateOp::Incr => old + 1.0,
                    UpdateOp::Decr => old - 1.0,
                };
                self.assign_to(target, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, scope)?;
                let rhs = self.eval(rhs, scope)?;
                self.apply_binary(*op, &lhs, &rhs)
            }
            ExprKind::Logical { op, lhs, rhs } => {
                let lhs = self.eval(lhs, scope)?;
                match op {
                    LogicalOp::And => {
                        if truthy(&lhs) {
                            self.eval(rhs, scope)
                        } else {
                            Ok(lhs)
                        }
                    }
                    LogicalOp::Or => {
                        if truthy(&lhs) {
                            Ok(lhs)
                        } else {
                            self.eval(rhs, scope)
                        }
                    }
                }
            }
            ExprKind::Assign { op, target, value } => {
                let value = match op.binary_op() {
                    None => self.eval(value, scope)?,
                    Some(binop) => {
                        let old = self.eval(target, scope)?;
                        let rhs = self.eval(value, scope)?;
                        self.apply_binary(binop, &old, &rhs)?
                    }
                };
                self.assign_to(target, value.clone(), scope)?;
                Ok(value)
            }
            ExprKind::Conditional {
                cond,
                consequent,
                alternate,
            } => {
                let cond = self.eval(cond, scope)?;
                if truthy(&cond) {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            ExprKind::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
        }
    }

    fn lookup_ident(&mut self, name: &str, scope: &ScopeRef) -> Value {
        if let Some(value) = scope_lookup(scope, name) {
            return value;
        }
        match name {
            "NaN" => Value::Number(f64::NAN),
            "Infinity" => Value::Number(f64::INFINITY),
            // Unresolved names stay undefined; calling one still raises a
            // contained TypeError at the call site.
            _ => Value::Undefined,
        }
    }

    fn property_key(&mut self, property: &MemberProp, scope: &ScopeRef) -> EResult<String> {
        match property {
            MemberProp::Ident(name) => Ok(name.clone()),
            MemberProp::Computed(index) => {
                let index = self.eval(index, scope)?;
                Ok(to_js_string(&index))
            }
        }
    }

    fn get_property(&mut self, object: &Value, key: &str) -> EResult<Value> {
        match object {
            Value::Object(map) => Ok(map.borrow().get(key).cloned().unwrap_or(Value::Undefined)),
            Value::Array(items) => {
                if key == "length" {
                    return Ok(Value::Number(items.borrow().len() as f64));
                }
                match key.parse::<usize>() {
                    Ok(index) => Ok(items.borrow().get(index).cloned().unwrap_or(Value::Undefined)),
                    Err(_) => Ok(Value::Undefined),
                }
            }
            Value::Str(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                match key.parse::<usize>() {
                    Ok(index) => Ok(s
                        .chars()
                        .nth(index)
                        .map(|c| Value::Str(c.to_string()))
                        .unwrap_or(Value::Undefined)),
                    Err(_) => Ok(Value::Undefined),
                }
            }
            Value::Null | Value::Undefined => Err(throw_type_error(format!(
                "cannot read property '{}' of {}",
                key,
                object.type_of()
            ))),
            _ => Ok(Value::Undefined),
        }
    }

    fn assign_to(&mut self, target: &Expression, value: Value, scope: &ScopeRef) -> EResult<()> {
        match &target.kind {
            ExprKind::Identifier(name) => {
                scope_assign(scope, name, value);
                Ok(())
            }
            ExprKind::Member { object, property } => {
                let object = self.eval(object, scope)?;
                let key = self.property_key(property, scope)?;
                match object {
                    Value::Object(map) => {
                        map.borrow_mut().insert(key, value);
                        Ok(())
                    }
                    Value::Array(items) => {
                        if key == "length" {
                            let new_len = to_number(&value).max(0.0) as usize;
                            items.borrow_mut().resize(new_len, Value::Undefined);
                            return Ok(());
                        }
                        match key.parse::<usize>() {
                            Ok(index) => {
                                let mut items = items.borrow_mut();
                                if index >= items.len() {
                                    items.resize(index + 1, Value::Undefined);
                                }
                                items[index] = value;
                                Ok(())
                            }
                            Err(_) => Ok(()),
                        }
                    }
                    Value::Null | Value::Undefined => Err(throw_type_error(format!(
                        "cannot set property '{}' of {}",
                        key,
                        object.type_of()
                    ))),
                    _ => Ok(()),
                }
            }
            _ => Err(Abort::Unsupported("invalid assignment target".into())),
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expression, scope: &ScopeRef) -> EResult<Value> {
        // `delete obj.prop` needs the reference, not the value
        if op == UnaryOp::Delete {
            if let ExprKind::Member { object, property } = &operand.kind {
                let object = self.eval(object, scope)?;
                let key = self.property_key(property, scope)?;
                if let Value::Object(map) = object {
                    map.borrow_mut().shift_remove(&key);
                }
                return Ok(Value::Bool(true));
            }
            self.eval(operand, scope)?;
            return Ok(Value::Bool(true));
        }

        let value = self.eval(operand, scope)?;
        Ok(match op {
            UnaryOp::Minus => Value::Number(-to_number(&value)),
            UnaryOp::Plus => Value::Number(to_number(&value)),
            UnaryOp::Not => Value::Bool(!truthy(&value)),
            UnaryOp::BitNot => Value::Number(!to_int32(&value) as f64),
            UnaryOp::TypeOf => Value::Str(value.type_of().to_string()),
            UnaryOp::Void => Value::Undefined,
            UnaryOp::Delete => unreachable!("handled above"),
        })
    }

    fn apply_binary(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value) -> EResult<Value> {
        use BinaryOp::*;
        Ok(match op {
            Add => {
                let l = to_primitive(lhs);
                let r = to_primitive(rhs);
                if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) {
                    Value::Str(format!("{}{}", to_js_string(&l), to_js_string(&r)))
                } else {
                    Value::Number(to_number(&l) + to_number(&r))
                }
            }
            Sub => Value::Number(to_number(lhs) - to_number(rhs)),
            Mul => Value::Number(to_number(lhs) * to_number(rhs)),
            Div => Value::Number(to_number(lhs) / to_number(rhs)),
            Rem => Value::Number(to_number(lhs) % to_number(rhs)),
            Pow => Value::Number(to_number(lhs).powf(to_number(rhs))),
            Eq => Value::Bool(loose_eq(lhs, rhs)),
            NotEq => Value::Bool(!loose_eq(lhs, rhs)),
            StrictEq => Value::Bool(strict_eq(lhs, rhs)),
            StrictNotEq => Value::Bool(!strict_eq(lhs, rhs)),
            Lt | LtEq | Gt | GtEq => {
                let result = match (lhs, rhs) {
                    (Value::Str(a), Value::Str(b)) => match op {
                        Lt => a < b,
                        LtEq => a <= b,
                        Gt => a > b,
                        _ => a >= b,
                    },
                    _ => {
                        let a = to_number(lhs);
                        let b = to_number(rhs);
                        if a.is_nan() || b.is_nan() {
                            false
                        } else {
                            match op {
                                Lt => a < b,
                                LtEq => a <= b,
                                Gt => a > b,
                                _ => a >= b,
                            }
                        }
                    }
                };
                Value::Bool(result)
            }
            BitAnd => Value::Number((to_int32(lhs) & to_int32(rhs)) as f64),
            BitOr => Value::Number((to_int32(lhs) | to_int32(rhs)) as f64),
            BitXor => Value::Number((to_int32(lhs) ^ to_int32(rhs)) as f64),
            Shl => Value::Number((to_int32(lhs) << (to_uint32(rhs) & 31)) as f64),
            Shr => Value::Number((to_int32(lhs) >> (to_uint32(rhs) & 31)) as f64),
            UShr => Value::Number((to_uint32(lhs) >> (to_uint32(rhs) & 31)) as f64),
            In => {
                let key = to_js_string(lhs);
                match rhs {
                    Value::Object(map) => Value::Bool(map.borrow().contains_key(&key)),
                    Value::Array(items) => Value::Bool(
                        key.parse::<usize>()
                            .map(|i| i < items.borrow().len())
                            .unwrap_or(false),
                    ),
                    _ => return Err(throw_type_error("'in' on a non-object")),
                }
            }
            InstanceOf => Value::Bool(false),
        })
    }

    // -------------------------------------------------------------------------
    // Calls
    // -------------------------------------------------------------------------

    fn eval_call(
        &mut self,
        callee: &Expression,
        args: &[Expression],
        scope: &ScopeRef,
    ) -> EResult<Value> {
        // Namespace intrinsics (Math.floor, console.log, ...) dispatch on
        // the unshadowed global identifier, never on a value.
        if let ExprKind::Member { object, property } = &callee.kind {
            if let (ExprKind::Identifier(ns), MemberProp::Ident(method)) = (&object.kind, property)
            {
                if scope_lookup(scope, ns).is_none() {
                    if let Some(result) = self.call_namespace(ns, method, args, scope)? {
                        return Ok(result);
                    }
                }
            }

            // Method call on a receiver value; computed properties
            // (`s["charAt"](0)`) resolve to the same dispatch
            let receiver = self.eval(object, scope)?;
            let method = self.property_key(property, scope)?;
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(self.eval(arg, scope)?);
            }
            return self.call_method(&receiver, &method, &values);
        }

        let function = self.eval(callee, scope)?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scope)?);
        }

        match function {
            Value::Function(closure) => self.call_closure(&closure, &values),
            Value::Undefined => {
                // Unshadowed global functions
                if let ExprKind::Identifier(name) = &callee.kind {
                    if let Some(result) = self.call_global(name, &values)? {
                        return Ok(result);
                    }
                }
                Err(throw_type_error(format!(
                    "{} is not a function",
                    crate::printer::print_expression(callee)
                )))
            }
            other => Err(throw_type_error(format!("{} is not a function", other.type_of()))),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: &[Value]) -> EResult<Value> {
        if self.depth >= self.max_depth {
            return Err(Abort::DepthExceeded);
        }
        self.depth += 1;

        let scope = Scope::child(&closure.scope);
        for (i, param) in closure.params.iter().enumerate() {
            scope_declare(&scope, param, args.get(i).cloned().unwrap_or(Value::Undefined));
        }
        scope_declare(
            &scope,
            "arguments",
            Value::Array(Rc::new(RefCell::new(args.to_vec()))),
        );

        let result = match &closure.body {
            ClosureBody::Block(stmts) => match self.exec_body(stmts, &scope) {
                Ok(Flow::Return(value)) => Ok(value),
                Ok(_) => Ok(Value::Undefined),
                Err(e) => Err(e),
            },
            ClosureBody::Expr(expr) => self.eval(expr, &scope),
        };

        self.depth -= 1;
        result
    }

    /// Intrinsics reached as `Namespace.method(...)`. Returns Ok(None) when
    /// the namespace/method pair is not an intrinsic.
    fn call_namespace(
        &mut self,
        ns: &str,
        method: &str,
        args: &[Expression],
        scope: &ScopeRef,
    ) -> EResult<Option<Value>> {
        match ns {
            "console" => {
                // Diagnostic output inside the sandbox is discarded
                for arg in args {
                    self.eval(arg, scope)?;
                }
                Ok(Some(Value::Undefined))
            }
            "Math" => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, scope)?);
                }
                Ok(self.call_math(method, &values))
            }
            "String" if method == "fromCharCode" => {
                let mut out = String::new();
                for arg in args {
                    let code = to_number(&self.eval(arg, scope)?) as u32;
                    out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                }
                Ok(Some(Value::Str(out)))
            }
            "Date" if method == "now" => {
                // Stable current-time source: monotonic from sandbox start
                Ok(Some(Value::Number(self.epoch.elapsed().as_secs_f64() * 1000.0)))
            }
            "Object" if method == "keys" => {
                let value = match args.first() {
                    Some(arg) => self.eval(arg, scope)?,
                    None => Value::Undefined,
                };
                let keys: Vec<Value> = match value {
                    Value::Object(map) => {
                        map.borrow().keys().map(|k| Value::Str(k.clone())).collect()
                    }
                    Value::Array(items) => {
                        (0..items.borrow().len()).map(|i| Value::Str(i.to_string())).collect()
                    }
                    _ => Vec::new(),
                };
                Ok(Some(Value::Array(Rc::new(RefCell::new(keys)))))
            }
            _ => Ok(None),
        }
    }

    fn call_math(&mut self, method: &str, args: &[Value]) -> Option<Value> {
        let arg = |i: usize| args.get(i).map(to_number).unwrap_or(f64::NAN);
        let result = match method {
            "floor" => arg(0).floor(),
            "ceil" => arg(0).ceil(),
            "round" => (arg(0) + 0.5).floor(),
            "trunc" => arg(0).trunc(),
            "abs" => arg(0).abs(),
            "sqrt" => arg(0).sqrt(),
            "pow" => arg(0).powf(arg(1)),
            "exp" => arg(0).exp(),
            "log" => arg(0).ln(),
            "sin" => arg(0).sin(),
            "cos" => arg(0).cos(),
            "tan" => arg(0).tan(),
            "atan" => arg(0).atan(),
            "atan2" => arg(0).atan2(arg(1)),
            "min" => args.iter().map(to_number).fold(f64::INFINITY, f64::min),
            "max" => args.iter().map(to_number).fold(f64::NEG_INFINITY, f64::max),
            "random" => {
                // Deterministic xorshift-style generator: sandboxed code
                // sees the shape of randomness without nondeterminism
                self.rng ^= self.rng << 13;
                self.rng ^= self.rng >> 7;
                self.rng ^= self.rng << 17;
                return Some(Value::Number((self.rng >> 11) as f64 / (1u64 << 53) as f64));
            }
            _ => return None,
        };
        Some(Value::Number(result))
    }

    /// Global intrinsic functions reached as bare identifiers.
    fn call_global(&mut self, name: &str, args: &[Value]) -> EResult<Option<Value>> {
        let first = args.first();
        let result = match name {
            "parseInt" => {
                let radix = args.get(1).map(to_number).unwrap_or(f64::NAN);
                let radix = if radix.is_finite() && radix >= 2.0 && radix <= 36.0 {
                    Some(radix as u32)
                } else {
                    None
                };
                Value::Number(js_parse_int(
                    &first.map(to_js_string).unwrap_or_default(),
                    radix,
                ))
            }
            "parseFloat" => Value::Number(js_parse_float(
                &first.map(to_js_string).unwrap_or_default(),
            )),
            "isNaN" => Value::Bool(first.map(to_number).unwrap_or(f64::NAN).is_nan()),
            "isFinite" => Value::Bool(first.map(to_number).unwrap_or(f64::NAN).is_finite()),
            "String" => Value::Str(first.map(to_js_string).unwrap_or_default()),
            "Number" => Value::Number(first.map(to_number).unwrap_or(0.0)),
            "Boolean" => Value::Bool(first.map(truthy).unwrap_or(false)),
            // Opaque module loader: returns its argument
            "require" => first.cloned().unwrap_or(Value::Undefined),
            _ => return Ok(None),
        };
        Ok(Some(result))
    }

    fn eval_new(
        &mut self,
        callee: &Expression,
        args: &[Expression],
        scope: &ScopeRef,
    ) -> EResult<Value> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scope)?);
        }

        if let ExprKind::Identifier(name) = &callee.kind {
            if scope_lookup(scope, name).is_none() {
                match name.as_str() {
                    "Array" => {
                        // `new Array(n)` preallocates; other shapes wrap args
                        if values.len() == 1 {
                            if let Value::Number(n) = values[0] {
                                let len = if n.is_finite() && n >= 0.0 { n as usize } else { 0 };
                                return Ok(Value::Array(Rc::new(RefCell::new(vec![
                                    Value::Undefined;
                                    len
                                ]))));
                            }
                        }
                        return Ok(Value::Array(Rc::new(RefCell::new(values))));
                    }
                    "Object" => return Ok(Value::Object(Rc::new(RefCell::new(IndexMap::new())))),
                    "Error" | "TypeError" | "RangeError" => {
                        let message = values.first().map(to_js_string).unwrap_or_default();
                        let mut map = IndexMap::new();
                        map.insert("message".to_string(), Value::Str(message));
                        map.insert("name".to_string(), Value::Str(name.clone()));
                        return Ok(Value::Object(Rc::new(RefCell::new(map))));
                    }
                    "String" => {
                        return Ok(Value::Str(values.first().map(to_js_string).unwrap_or_default()))
                    }
                    "Number" => {
                        return Ok(Value::Number(values.first().map(to_number).unwrap_or(0.0)))
                    }
                    "Date" => return Ok(Value::Object(Rc::new(RefCell::new(IndexMap::new())))),
                    _ => {}
                }
            }
        }

        let function = self.eval(callee, scope)?;
        match function {
            // Constructor calls run the function; helpers built this way
            // return their value or an empty object
            Value::Function(closure) => match self.call_closure(&closure, &values)? {
                Value::Undefined => Ok(Value::Object(Rc::new(RefCell::new(IndexMap::new())))),
                value => Ok(value),
            },
            other => Err(throw_type_error(format!("{} is not a constructor", other.type_of()))),
        }
    }

    // -------------------------------------------------------------------------
    // Methods on receiver values
    // -------------------------------------------------------------------------

    fn call_method(&mut self, receiver: &Value, method: &str, args: &[Value]) -> EResult<Value> {
        match receiver {
            Value::Str(s) => self.string_method(s, method, args),
            Value::Array(items) => self.array_method(items, method, args),
            Value::Number(n) => self.number_method(*n, method, args),
            Value::Function(closure) => match method {
                "apply" => {
                    let call_args: Vec<Value> = match args.get(1) {
                        Some(Value::Array(items)) => items.borrow().clone(),
                        Some(Value::Null) | Some(Value::Undefined) | None => Vec::new(),
                        Some(other) => {
                            return Err(throw_type_error(format!(
                                "apply expects an array, got {}",
                                other.type_of()
                            )))
                        }
                    };
                    self.call_closure(closure, &call_args)
                }
                "call" => {
                    let call_args: &[Value] = if args.is_empty() { &[] } else { &args[1..] };
                    self.call_closure(closure, call_args)
                }
                "toString" => Ok(Value::Str(format!(
                    "function {}() {{ ... }}",
                    closure.name.as_deref().unwrap_or("")
                ))),
                _ => Err(throw_type_error(format!("function has no method '{}'", method))),
            },
            Value::Object(map) => {
                match method {
                    "hasOwnProperty" => {
                        let key = args.first().map(to_js_string).unwrap_or_default();
                        return Ok(Value::Bool(map.borrow().contains_key(&key)));
                    }
                    "toString" => return Ok(Value::Str("[object Object]".to_string())),
                    _ => {}
                }
                // A stored function property is an ordinary call
                let property = map.borrow().get(method).cloned();
                match property {
                    Some(Value::Function(closure)) => self.call_closure(&closure, args),
                    Some(other) => {
                        Err(throw_type_error(format!("{} is not a function", other.type_of())))
                    }
                    None => Err(throw_type_error(format!("object has no method '{}'", method))),
                }
            }
            Value::Null | Value::Undefined => Err(throw_type_error(format!(
                "cannot call '{}' on {}",
                method,
                receiver.type_of()
            ))),
            Value::Bool(_) => match method {
                "toString" => Ok(Value::Str(to_js_string(receiver))),
                _ => Err(throw_type_error(format!("boolean has no method '{}'", method))),
            },
        }
    }

    fn string_method(&mut self, s: &str, method: &str, args: &[Value]) -> EResult<Value> {
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len() as i64;
        let arg_num = |i: usize| args.get(i).map(to_number).unwrap_or(f64::NAN);
        let arg_str = |i: usize| args.get(i).map(to_js_string);

        let result = match method {
            "charAt" => {
                let i = arg_num(0);
                let i = if i.is_nan() { 0 } else { i as i64 };
                chars
                    .get(usize::try_from(i).unwrap_or(usize::MAX))
                    .map(|c| Value::Str(c.to_string()))
                    .unwrap_or(Value::Str(String::new()))
            }
            "charCodeAt" => {
                let i = arg_num(0);
                let i = if i.is_nan() { 0 } else { i as i64 };
                chars
                    .get(usize::try_from(i).unwrap_or(usize::MAX))
                    .map(|c| Value::Number(*c as u32 as f64))
                    .unwrap_or(Value::Number(f64::NAN))
            }
            "indexOf" => {
                let needle = arg_str(0).unwrap_or_default();
                Value::Number(char_index_of(&chars, &needle, 0))
            }
            "lastIndexOf" => {
                let needle: Vec<char> = arg_str(0).unwrap_or_default().chars().collect();
                let mut found = -1i64;
                let mut start = 0usize;
                while start + needle.len() <= chars.len() {
                    if chars[start..start + needle.len()] == needle[..] {
                        found = start as i64;
                    }
                    start += 1;
                }
                Value::Number(found as f64)
            }
            "slice" => {
                let (start, end) = slice_bounds(arg_num(0), arg_num(1), len, args.len() < 2);
                Value::Str(chars[start..end].iter().collect())
            }
            "substring" => {
                let a = clamp_index(arg_num(0), len);
                let b = if args.len() < 2 { len as usize } else { clamp_index(arg_num(1), len) };
                let (start, end) = if a <= b { (a, b) } else { (b, a) };
                Value::Str(chars[start..end].iter().collect())
            }
            "substr" => {
                let start = clamp_signed_index(arg_num(0), len);
                let count = if args.len() < 2 {
                    len as usize - start
                } else {
                    (arg_num(1).max(0.0) as usize).min(len as usize - start)
                };
                Value::Str(chars[start..start + count].iter().collect())
            }
            "split" => {
                let parts: Vec<Value> = match arg_str(0) {
                    None => vec![Value::Str(s.to_string())],
                    Some(sep) if sep.is_empty() => {
                        chars.iter().map(|c| Value::Str(c.to_string())).collect()
                    }
                    Some(sep) => s.split(&sep).map(|p| Value::Str(p.to_string())).collect(),
                };
                Value::Array(Rc::new(RefCell::new(parts)))
            }
            "concat" => {
                let mut out = s.to_string();
                for arg in args {
                    out.push_str(&to_js_string(arg));
                }
                Value::Str(out)
            }
            "replace" => {
                let pattern = arg_str(0).unwrap_or_default();
                let replacement = arg_str(1).unwrap_or_default();
                Value::Str(s.replacen(&pattern, &replacement, 1))
            }
            "toUpperCase" => Value::Str(s.to_uppercase()),
            "toLowerCase" => Value::Str(s.to_lowercase()),
            "trim" => Value::Str(s.trim().to_string()),
            "toString" => Value::Str(s.to_string()),
            _ => {
                return Err(throw_type_error(format!("string has no method '{}'", method)));
            }
        };
        Ok(result)
    }

    fn array_method(&mut self, items: &ArrRef, method: &str, args: &[Value]) -> EResult<Value> {
        let result = match method {
            "push" => {
                let mut items = items.borrow_mut();
                items.extend(args.iter().cloned());
                Value::Number(items.len() as f64)
            }
            "pop" => items.borrow_mut().pop().unwrap_or(Value::Undefined),
            "shift" => {
                let mut items = items.borrow_mut();
                if items.is_empty() {
                    Value::Undefined
                } else {
                    items.remove(0)
                }
            }
            "unshift" => {
                let mut items = items.borrow_mut();
                for (i, arg) in args.iter().enumerate() {
                    items.insert(i, arg.clone());
                }
                Value::Number(items.len() as f64)
            }
            "join" => {
                let sep = args.first().map(to_js_string).unwrap_or_else(|| ",".to_string());
                let parts: Vec<String> = items
                    .borrow()
                    .iter()
                    .map(|v| match v {
                        Value::Null | Value::Undefined => String::new(),
                        v => to_js_string(v),
                    })
                    .collect();
                Value::Str(parts.join(&sep))
            }
            "reverse" => {
                items.borrow_mut().reverse();
                Value::Array(items.clone())
            }
            "slice" => {
                let len = items.borrow().len() as i64;
                let a = args.first().map(to_number).unwrap_or(0.0);
                let b = args.get(1).map(to_number).unwrap_or(f64::NAN);
                let (start, end) = slice_bounds(a, b, len, args.len() < 2);
                Value::Array(Rc::new(RefCell::new(items.borrow()[start..end].to_vec())))
            }
            "indexOf" => {
                let needle = args.first().cloned().unwrap_or(Value::Undefined);
                let found = items
                    .borrow()
                    .iter()
                    .position(|v| strict_eq(v, &needle))
                    .map(|i| i as f64)
                    .unwrap_or(-1.0);
                Value::Number(found)
            }
            "concat" => {
                let mut out = items.borrow().clone();
                for arg in args {
                    match arg {
                        Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                        other => out.push(other.clone()),
                    }
                }
                Value::Array(Rc::new(RefCell::new(out)))
            }
            "toString" => Value::Str(to_js_string(&Value::Array(items.clone()))),
            _ => {
                return Err(throw_type_error(format!("array has no method '{}'", method)));
            }
        };
        Ok(result)
    }

    fn number_method(&mut self, n: f64, method: &str, args: &[Value]) -> EResult<Value> {
        let result = match method {
            "toString" => {
                let radix = args.first().map(to_number).unwrap_or(10.0);
                if (radix - 10.0).abs() < f64::EPSILON || !radix.is_finite() {
                    Value::Str(js_number_string(n))
                } else {
                    Value::Str(format_radix(n, radix as u32))
                }
            }
            "toFixed" => {
                let digits = args.first().map(to_number).unwrap_or(0.0).max(0.0) as usize;
                Value::Str(format!("{:.*}", digits, n))
            }
            _ => {
                return Err(throw_type_error(format!("number has no method '{}'", method)));
            }
        };
        Ok(result)
    }
}

/// Constant properties of the ambient namespaces.
fn namespace_constant(ns: &str, prop: &str) -> Option<Value> {
    let n = match (ns, prop) {
        ("Math", "PI") => std::f64::consts::PI,
        ("Math", "E") => std::f64::consts::E,
        ("Math", "LN2") => std::f64::consts::LN_2,
        ("Math", "LN10") => std::f64::consts::LN_10,
        ("Number", "MAX_SAFE_INTEGER") => 9007199254740991.0,
        ("Number", "MIN_SAFE_INTEGER") => -9007199254740991.0,
        ("Number", "EPSILON") => f64::EPSILON,
        ("Number", "NaN") => f64::NAN,
        _ => return None,
    };
    Some(Value::Number(n))
}

// =============================================================================
// Coercions
// =============================================================================

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::String(s) => Value::Str(s.clone()),
        Literal::Int(n) => Value::Number(*n as f64),
        Literal::Float(f) => Value::Number(*f),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
        Literal::Undefined => Value::Undefined,
    }
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::Str(s) => !s.is_empty(),
        Value::Null | Value::Undefined => false,
        Value::Object(_) | Value::Array(_) | Value::Function(_) => true,
    }
}

pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Bool(true) => 1.0,
        Value::Bool(false) | Value::Null => 0.0,
        Value::Undefined => f64::NAN,
        Value::Str(s) => {
            let t = s.trim();
            if t.is_empty() {
                0.0
            } else if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
                i64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN)
            } else {
                t.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Array(items) => {
            // Single-element arrays coerce through their element
            let items = items.borrow();
            match items.len() {
                0 => 0.0,
                1 => to_number(&items[0]),
                _ => f64::NAN,
            }
        }
        Value::Object(_) | Value::Function(_) => f64::NAN,
    }
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) | Value::Function(_) => Value::Str(to_js_string(value)),
        other => other.clone(),
    }
}

pub fn to_js_string(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Number(n) => js_number_string(*n),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Undefined => "undefined".to_string(),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .borrow()
                .iter()
                .map(|v| match v {
                    Value::Null | Value::Undefined => String::new(),
                    v => to_js_string(v),
                })
                .collect();
            parts.join(",")
        }
        Value::Object(_) => "[object Object]".to_string(),
        Value::Function(closure) => {
            format!("function {}() {{ ... }}", closure.name.as_deref().unwrap_or(""))
        }
    }
}

pub fn js_number_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n.fract() == 0.0 && n.abs() < 9e18 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn to_int32(value: &Value) -> i32 {
    let n = to_number(value);
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let m = n.trunc() % 4_294_967_296.0;
    let m = if m < 0.0 { m + 4_294_967_296.0 } else { m };
    m as u32 as i32
}

fn to_uint32(value: &Value) -> u32 {
    to_int32(value) as u32
}

pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Undefined) | (Value::Undefined, Value::Null) => true,
        (Value::Number(_), Value::Str(_))
        | (Value::Str(_), Value::Number(_))
        | (Value::Bool(_), _)
        | (_, Value::Bool(_)) => {
            let an = to_number(a);
            let bn = to_number(b);
            !an.is_nan() && !bn.is_nan() && an == bn
        }
        (Value::Object(_) | Value::Array(_), Value::Str(_) | Value::Number(_)) => {
            loose_eq(&to_primitive(a), b)
        }
        (Value::Str(_) | Value::Number(_), Value::Object(_) | Value::Array(_)) => {
            loose_eq(a, &to_primitive(b))
        }
        _ => strict_eq(a, b),
    }
}

fn js_parse_int(s: &str, radix: Option<u32>) -> f64 {
    let t = s.trim();
    let (negative, t) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let (radix, t) = match radix {
        Some(16) | None if t.starts_with("0x") || t.starts_with("0X") => (16, &t[2..]),
        Some(r) => (r, t),
        None => (10, t),
    };
    let digits: String = t.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = i64::from_str_radix(&digits, radix).map(|n| n as f64).unwrap_or(f64::NAN);
    if negative { -value } else { value }
}

fn js_parse_float(s: &str) -> f64 {
    let t = s.trim();
    let mut end = 0;
    let bytes = t.as_bytes();
    let mut seen_dot = false;
    let mut seen_e = false;
    while end < bytes.len() {
        let c = bytes[end] as char;
        let ok = c.is_ascii_digit()
            || (end == 0 && (c == '+' || c == '-'))
            || (c == '.' && !seen_dot && !seen_e)
            || ((c == 'e' || c == 'E') && !seen_e && end > 0)
            || ((c == '+' || c == '-') && end > 0 && matches!(bytes[end - 1] as char, 'e' | 'E'));
        if !ok {
            break;
        }
        if c == '.' {
            seen_dot = true;
        }
        if c == 'e' || c == 'E' {
            seen_e = true;
        }
        end += 1;
    }
    t[..end].parse().unwrap_or(f64::NAN)
}

fn char_index_of(haystack: &[char], needle: &str, from: usize) -> f64 {
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() {
        return from.min(haystack.len()) as f64;
    }
    let mut start = from;
    while start + needle.len() <= haystack.len() {
        if haystack[start..start + needle.len()] == needle[..] {
            return start as f64;
        }
        start += 1;
    }
    -1.0
}

fn clamp_index(n: f64, len: i64) -> usize {
    if n.is_nan() {
        return 0;
    }
    (n.max(0.0) as i64).min(len) as usize
}

fn clamp_signed_index(n: f64, len: i64) -> usize {
    if n.is_nan() {
        return 0;
    }
    let i = n as i64;
    if i < 0 {
        (len + i).max(0) as usize
    } else {
        i.min(len) as usize
    }
}

fn slice_bounds(a: f64, b: f64, len: i64, open_end: bool) -> (usize, usize) {
    let start = if a.is_nan() { 0 } else { clamp_signed_index(a, len) };
    let end = if open_end || b.is_nan() { len as usize } else { clamp_signed_index(b, len) };
    (start, end.max(start))
}

fn format_radix(n: f64, radix: u32) -> String {
    if !n.is_finite() || !(2..=36).contains(&radix) {
        return js_number_string(n);
    }
    let negative = n < 0.0;
    let mut value = n.abs().trunc() as u64;
    let digits = "0123456789abcdefghijklmnopqrstuvwxyz".as_bytes();
    let mut out = Vec::new();
    loop {
        out.push(digits[(value % radix as u64) as usize]);
        value /= radix as u64;
        if value == 0 {
            break;
        }
    }
    if negative {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Convert a sandbox value to JSON for the debug trace. Recursion is
/// depth-limited so self-referential structures cannot loop.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    value_to_json_depth(value, 8)
}

fn value_to_json_depth(value: &Value, depth: usize) -> serde_json::Value {
    use serde_json::json;
    if depth == 0 {
        return json!("[depth limit]");
    }
    match value {
        Value::Number(n) => {
            if n.fract() == 0.0 && n.is_finite() && n.abs() < 9e18 {
                json!(*n as i64)
            } else if n.is_finite() {
                json!(n)
            } else {
                json!(js_number_string(*n))
            }
        }
        Value::Str(s) => json!(s),
        Value::Bool(b) => json!(b),
        Value::Null => serde_json::Value::Null,
        Value::Undefined => json!("undefined"),
        Value::Array(items) => serde_json::Value::Array(
            items.borrow().iter().map(|v| value_to_json_depth(v, depth - 1)).collect(),
        ),
        Value::Object(map) => serde_json::Value::Object(
            map.borrow()
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json_depth(v, depth - 1)))
                .collect(),
        ),
        Value::Function(_) => json!("[function]"),
    }
}
