//! Deterministic printer for the syntax tree.
//!
//! The printed form of a call node keys the result map, so output must be
//! stable: one statement per line, two-space indentation, single spaces
//! around binary operators and after commas, parentheses reconstructed
//! from precedence. Reparsing printed output yields a structurally equal
//! tree.

use crate::ast::*;

/// Print a whole program.
pub fn print_program(program: &Program) -> String {
    let mut p = Printer::new();
    for stmt in &program.body {
        p.write_stmt(stmt);
    }
    p.out
}

/// Print a single statement (used for harness emission and cleanup text).
pub fn print_statement(stmt: &Statement) -> String {
    let mut p = Printer::new();
    p.push_indent();
    p.write_stmt_bare(stmt);
    p.out
}

/// Print a single expression. This is the canonical key form for call sites.
pub fn print_expression(expr: &Expression) -> String {
    let mut p = Printer::new();
    p.write_expr(expr, 0);
    p.out
}

/// Print a literal value in source form, with the same escaping the full
/// printer uses.
pub fn print_literal(lit: &Literal) -> String {
    let mut p = Printer::new();
    p.write_literal(lit);
    p.out
}

struct Printer {
    out: String,
    indent: usize,
}

// Precedence levels, higher binds tighter
const PREC_SEQUENCE: u8 = 1;
const PREC_ASSIGN: u8 = 2;
const PREC_CONDITIONAL: u8 = 3;
const PREC_OR: u8 = 4;
const PREC_AND: u8 = 5;
const PREC_BITOR: u8 = 6;
const PREC_BITXOR: u8 = 7;
const PREC_BITAND: u8 = 8;
const PREC_EQUALITY: u8 = 9;
const PREC_RELATIONAL: u8 = 10;
const PREC_SHIFT: u8 = 11;
const PREC_ADDITIVE: u8 = 12;
const PREC_MULTIPLICATIVE: u8 = 13;
const PREC_POW: u8 = 14;
const PREC_UNARY: u8 = 15;
const PREC_POSTFIX: u8 = 16;
const PREC_CALL: u8 = 17;
const PREC_PRIMARY: u8 = 18;

fn binary_prec(op: BinaryOp) -> u8 {
    use BinaryOp::*;
    match op {
        BitOr => PREC_BITOR,
        BitXor => PREC_BITXOR,
        BitAnd => PREC_BITAND,
        Eq | NotEq | StrictEq | StrictNotEq => PREC_EQUALITY,
        Lt | LtEq | Gt | GtEq | In | InstanceOf => PREC_RELATIONAL,
        Shl | Shr | UShr => PREC_SHIFT,
        Add | Sub => PREC_ADDITIVE,
        Mul | Div | Rem => PREC_MULTIPLICATIVE,
        Pow => PREC_POW,
    }
}

fn expr_prec(e: &Expression) -> u8 {
    match &e.kind {
        ExprKind::Sequence(_) => PREC_SEQUENCE,
        ExprKind::Assign { .. } => PREC_ASSIGN,
        ExprKind::Arrow { .. } => PREC_ASSIGN,
        ExprKind::Conditional { .. } => PREC_CONDITIONAL,
        ExprKind::Logical { op: LogicalOp::Or, .. } => PREC_OR,
        ExprKind::Logical { op: LogicalOp::And, .. } => PREC_AND,
        ExprKind::Binary { op, .. } => binary_prec(*op),
        ExprKind::Unary { .. } => PREC_UNARY,
        ExprKind::Update { prefix: true, .. } => PREC_UNARY,
        ExprKind::Update { prefix: false, .. } => PREC_POSTFIX,
        ExprKind::Call { .. } | ExprKind::New { .. } | ExprKind::Member { .. } => PREC_CALL,
        _ => PREC_PRIMARY,
    }
}

/// Whether an expression statement would start with `function` or `{`
/// and therefore needs wrapping parentheses. Positions where the
/// expression writer already inserts its own parentheses (IIFE callees,
/// function-valued member objects) are not ambiguous.
fn starts_ambiguously(e: &Expression) -> bool {
    match &e.kind {
        ExprKind::Function(_) | ExprKind::Object(_) => true,
        ExprKind::Call { callee, .. } => {
            !callee.is_function_like() && starts_ambiguously(callee)
        }
        ExprKind::Member { object, .. } => {
            !object.is_function_like() && starts_ambiguously(object)
        }
        ExprKind::Binary { lhs, .. } => starts_ambiguously(lhs),
        ExprKind::Logical { lhs, .. } => starts_ambiguously(lhs),
        ExprKind::Assign { target, .. } => starts_ambiguously(target),
        ExprKind::Conditional { cond, .. } => starts_ambiguously(cond),
        ExprKind::Update { prefix: false, target, .. } => starts_ambiguously(target),
        ExprKind::Sequence(exprs) => exprs.first().map(starts_ambiguously).unwrap_or(false),
        _ => false,
    }
}

/// True when the member spine of `e` contains a call, forcing parentheses
/// in `new` callee position.
fn spine_has_call(e: &Expression) -> bool {
    match &e.kind {
        ExprKind::Call { .. } => true,
        ExprKind::Member { object, .. } => spine_has_call(object),
        _ => false,
    }
}

impl Printer {
    fn new() -> Self {
        Printer {
            out: String::new(),
            indent: 0,
        }
    }

    fn push_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Write a statement as full lines: leading indent, trailing newline.
    fn write_stmt(&mut self, stmt: &Statement) {
        self.push_indent();
        self.write_stmt_bare(stmt);
        self.out.push('\n');
    }

    /// Write a statement without leading indent or trailing newline.
    /// Multi-line statements indent their continuation lines themselves.
    fn write_stmt_bare(&mut self, stmt: &Statement) {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                if starts_ambiguously(expr) {
                    self.out.push('(');
                    self.write_expr(expr, 0);
                    self.out.push(')');
                } else {
                    self.write_expr(expr, 0);
                }
                self.out.push(';');
            }
            StmtKind::VarDecl { keyword, declarators } => {
                self.out.push_str(keyword.as_str());
                self.out.push(' ');
                for (i, decl) in declarators.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&decl.name);
                    if let Some(init) = &decl.init {
                        self.out.push_str(" = ");
                        self.write_expr(init, PREC_ASSIGN);
                    }
                }
                self.out.push(';');
            }
            StmtKind::FunctionDecl(func) => {
                self.write_function(func);
            }
            StmtKind::Return(value) => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.write_expr(value, 0);
                }
                self.out.push(';');
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.out.push_str("if (");
                self.write_expr(cond, 0);
                self.out.push(')');
                self.write_sub_stmt(then_branch);
                if let Some(els) = else_branch {
                    self.out.push_str(" else");
                    self.write_sub_stmt(els);
                }
            }
            StmtKind::While { cond, body } => {
                self.out.push_str("while (");
                self.write_expr(cond, 0);
                self.out.push(')');
                self.write_sub_stmt(body);
            }
            StmtKind::DoWhile { body, cond } => {
                self.out.push_str("do");
                self.write_sub_stmt(body);
                self.out.push_str(" while (");
                self.write_expr(cond, 0);
                self.out.push_str(");");
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                self.out.push_str("for (");
                match init {
                    Some(init) => self.write_stmt_bare(init),
                    None => self.out.push(';'),
                }
                if let Some(cond) = cond {
                    self.out.push(' ');
                    self.write_expr(cond, 0);
                }
                self.out.push(';');
                if let Some(update) = update {
                    self.out.push(' ');
                    self.write_expr(update, 0);
                }
                self.out.push(')');
                self.write_sub_stmt(body);
            }
            StmtKind::ForIn {
                keyword,
                name,
                object,
                body,
            } => {
                self.out.push_str("for (");
                if let Some(keyword) = keyword {
                    self.out.push_str(keyword.as_str());
                    self.out.push(' ');
                }
                self.out.push_str(name);
                self.out.push_str(" in ");
                self.write_expr(object, 0);
                self.out.push(')');
                self.write_sub_stmt(body);
            }
            StmtKind::Block(stmts) => {
                self.write_block(stmts);
            }
            StmtKind::Try {
                block,
                catch_param,
                handler,
                finalizer,
            } => {
                self.out.push_str("try ");
                self.write_block(block);
                if let Some(handler) = handler {
                    self.out.push_str(" catch ");
                    if let Some(param) = catch_param {
                        self.out.push('(');
                        self.out.push_str(param);
                        self.out.push_str(") ");
                    }
                    self.write_block(handler);
                }
                if let Some(finalizer) = finalizer {
                    self.out.push_str(" finally ");
                    self.write_block(finalizer);
                }
            }
            StmtKind::Throw(value) => {
                self.out.push_str("throw ");
                self.write_expr(value, 0);
                self.out.push(';');
            }
            StmtKind::Break => self.out.push_str("break;"),
            StmtKind::Continue => self.out.push_str("continue;"),
            StmtKind::Empty => self.out.push(';'),
            StmtKind::Export(inner) => {
                self.out.push_str("export ");
                self.write_stmt_bare(inner);
            }
            StmtKind::ExportDefault(value) => {
                self.out.push_str("export default ");
                self.write_expr(value, PREC_ASSIGN);
                self.out.push(';');
            }
            StmtKind::EmittedComment(text) => {
                self.out.push_str("/*");
                // Keep the comment well-formed whatever the wrapped text held
                self.out.push_str(&text.replace("*/", "* /"));
                self.out.push_str("*/");
            }
        }
    }

    /// Write a statement that follows a control-flow header: blocks open
    /// on the same line, other statements follow after a space.
    fn write_sub_stmt(&mut self, stmt: &Statement) {
        self.out.push(' ');
        self.write_stmt_bare(stmt);
    }

    fn write_block(&mut self, stmts: &[Statement]) {
        if stmts.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push_str("{\n");
        self.indent += 1;
        for stmt in stmts {
            self.write_stmt(stmt);
        }
        self.indent -= 1;
        self.push_indent();
        self.out.push('}');
    }

    fn write_function(&mut self, func: &Function) {
        self.out.push_str("function");
        if let Some(name) = &func.name {
            self.out.push(' ');
            self.out.push_str(name);
        }
        self.out.push('(');
        self.out.push_str(&func.params.join(", "));
        self.out.push_str(") ");
        self.write_block(&func.body);
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn write_expr(&mut self, e: &Expression, min_prec: u8) {
        if expr_prec(e) < min_prec {
            self.out.push('(');
            self.write_expr_inner(e);
            self.out.push(')');
        } else {
            self.write_expr_inner(e);
        }
    }

    fn write_expr_inner(&mut self, e: &Expression) {
        match &e.kind {
            ExprKind::Literal(lit) => self.write_literal(lit),
            ExprKind::Identifier(name) => self.out.push_str(name),
            ExprKind::This => self.out.push_str("this"),
            ExprKind::Array(elements) => {
                self.out.push('[');
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.write_expr(elem, PREC_ASSIGN);
                }
                self.out.push(']');
            }
            ExprKind::Object(properties) => {
                if properties.is_empty() {
                    self.out.push_str("{}");
                    return;
                }
                self.out.push_str("{ ");
                for (i, (key, value)) in properties.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    match key {
                        PropKey::Ident(name) => self.out.push_str(name),
                        PropKey::Str(s) => self.write_string(s),
                        PropKey::Num(n) => self.write_number(*n),
                    }
                    self.out.push_str(": ");
                    self.write_expr(value, PREC_ASSIGN);
                }
                self.out.push_str(" }");
            }
            ExprKind::Function(func) => {
                self.write_function(func);
            }
            ExprKind::Arrow { params, body } => {
                self.out.push('(');
                self.out.push_str(&params.join(", "));
                self.out.push_str(") => ");
                match body {
                    ArrowBody::Expr(expr) => {
                        if matches!(expr.kind, ExprKind::Object(_)) {
                            self.out.push('(');
                            self.write_expr(expr, 0);
                            self.out.push(')');
                        } else {
                            self.write_expr(expr, PREC_ASSIGN);
                        }
                    }
                    ArrowBody::Block(stmts) => self.write_block(stmts),
                }
            }
            ExprKind::Call { callee, args } => {
                if callee.is_function_like() {
                    self.out.push('(');
                    self.write_expr(callee, 0);
                    self.out.push(')');
                } else {
                    self.write_expr(callee, PREC_CALL);
                }
                self.out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.write_expr(arg, PREC_ASSIGN);
                }
                self.out.push(')');
            }
            ExprKind::New { callee, args } => {
                self.out.push_str("new ");
                if spine_has_call(callee) || callee.is_function_like() {
                    self.out.push('(');
                    self.write_expr(callee, 0);
                    self.out.push(')');
                } else {
                    self.write_expr(callee, PREC_CALL);
                }
                self.out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.write_expr(arg, PREC_ASSIGN);
                }
                self.out.push(')');
            }
            ExprKind::Member { object, property } => {
                let numeric_object =
                    matches!(object.kind, ExprKind::Literal(Literal::Int(_) | Literal::Float(_)));
                if numeric_object || object.is_function_like() {
                    self.out.push('(');
                    self.write_expr(object, 0);
                    self.out.push(')');
                } else {
                    self.write_expr(object, PREC_CALL);
                }
                match property {
                    MemberProp::Ident(name) => {
                        self.out.push('.');
                        self.out.push_str(name);
                    }
                    MemberProp::Computed(index) => {
                        self.out.push('[');
                        self.write_expr(index, 0);
                        self.out.push(']');
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                self.out.push_str(op.as_str());
                if op.is_word() {
                    self.out.push(' ');
                }
                // Nested sign operators would glue into ++/--
                let min = if matches!(op, UnaryOp::Minus | UnaryOp::Plus) {
                    PREC_POSTFIX
                } else {
                    PREC_UNARY
                };
                self.write_expr(operand, min);
            }
            ExprKind::Update { op, prefix, target } => {
                if *prefix {
                    self.out.push_str(op.as_str());
                    self.write_expr(target, PREC_POSTFIX);
                } else {
                    self.write_expr(target, PREC_POSTFIX);
                    self.out.push_str(op.as_str());
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let prec = binary_prec(*op);
                if *op == BinaryOp::Pow {
                    // Right-associative
                    self.write_expr(lhs, prec + 1);
                    self.out.push_str(" ** ");
                    self.write_expr(rhs, prec);
                } else {
                    self.write_expr(lhs, prec);
                    self.out.push(' ');
                    self.out.push_str(op.as_str());
                    self.out.push(' ');
                    self.write_expr(rhs, prec + 1);
                }
            }
            ExprKind::Logical { op, lhs, rhs } => {
                let prec = expr_prec(e);
                self.write_expr(lhs, prec);
                self.out.push(' ');
                self.out.push_str(op.as_str());
                self.out.push(' ');
                self.write_expr(rhs, prec + 1);
            }
            ExprKind::Assign { op, target, value } => {
                self.write_expr(target, PREC_POSTFIX);
                self.out.push(' ');
                self.out.push_str(op.as_str());
                self.out.push(' ');
                self.write_expr(value, PREC_ASSIGN);
            }
            ExprKind::Conditional {
                cond,
                consequent,
                alternate,
            } => {
                self.write_expr(cond, PREC_OR);
                self.out.push_str(" ? ");
                self.write_expr(consequent, PREC_ASSIGN);
                self.out.push_str(" : ");
                self.write_expr(alternate, PREC_ASSIGN);
            }
            ExprKind::Sequence(exprs) => {
                for (i, expr) in exprs.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.write_expr(expr, PREC_ASSIGN);
                }
            }
        }
    }

    fn write_literal(&mut self, lit: &Literal) {
        match lit {
            Literal::String(s) => self.write_string(s),
            Literal::Int(n) => {
                use std::fmt::Write;
                let _ = write!(self.out, "{}", n);
            }
            Literal::Float(f) => self.write_number(*f),
            Literal::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Literal::Null => self.out.push_str("null"),
            Literal::Undefined => self.out.push_str("undefined"),
        }
    }

    fn write_number(&mut self, f: f64) {
        use std::fmt::Write;
        if f.fract() == 0.0 && f.is_finite() && f.abs() < 9e18 {
            // Keep the decimal point so the literal reparses as fractional
            let _ = write!(self.out, "{:.1}", f);
        } else {
            let _ = write!(self.out, "{}", f);
        }
    }

    fn write_string(&mut self, s: &str) {
        self.out.push('"');
        for c in s.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\t' => self.out.push_str("\\t"),
                '\r' => self.out.push_str("\\r"),
                '\0' => self.out.push_str("\\0"),
                c if (c as u32) < 0x20 => {
                    use std::fmt::Write;
                    let _ = write!(self.out, "\\x{:02x}", c as u32);
                }
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }
}
