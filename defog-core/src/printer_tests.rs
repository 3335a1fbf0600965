//! Tests for the deterministic printer.

use crate::ast::*;
use crate::lexer;
use crate::parser::Parser;
use crate::printer::{print_expression, print_literal, print_program};

fn parse_src(src: &str) -> Program {
    let tokens = lexer::tokenize(src).expect("tokenize failed");
    let mut counter = NodeCounter::new();
    let mut parser = Parser::new(tokens, &mut counter);
    parser.parse().expect("parse failed")
}

fn first_expr(program: &Program) -> &Expression {
    match &program.body[0].kind {
        StmtKind::Expr(expr) => expr,
        StmtKind::VarDecl { declarators, .. } => declarators[0].init.as_ref().unwrap(),
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn call_keys_are_canonical() {
    let program = parse_src("f123( 1 ,2,  3,4 );");
    assert_eq!(print_expression(first_expr(&program)), "f123(1, 2, 3, 4)");
}

#[test]
fn negative_arguments_print_compactly() {
    let program = parse_src("f123(-1, -2.5, 3, 4);");
    assert_eq!(print_expression(first_expr(&program)), "f123(-1, -2.5, 3, 4)");
}

#[test]
fn string_escapes() {
    assert_eq!(print_literal(&Literal::String("a\"b".into())), r#""a\"b""#);
    assert_eq!(print_literal(&Literal::String("line\nbreak".into())), r#""line\nbreak""#);
    assert_eq!(print_literal(&Literal::String("tab\there".into())), r#""tab\there""#);
    assert_eq!(print_literal(&Literal::String("back\\slash".into())), r#""back\\slash""#);
}

#[test]
fn float_literals_keep_their_kind() {
    // A whole-valued float must not print as an integer
    assert_eq!(print_literal(&Literal::Float(2.0)), "2.0");
    assert_eq!(print_literal(&Literal::Float(0.5)), "0.5");
    assert_eq!(print_literal(&Literal::Int(2)), "2");
}

#[test]
fn nested_unary_minus_never_glues() {
    let program = parse_src("var x = -(-1);");
    assert_eq!(print_expression(first_expr(&program)), "-(-1)");
}

#[test]
fn sequence_and_assignment() {
    let out = print_program(&parse_src("a = 1, b = 2;"));
    assert_eq!(out, "a = 1, b = 2;\n");
}

#[test]
fn computed_member_and_chains() {
    let out = print_program(&parse_src("var v = table[i + 1].value;"));
    assert_eq!(out, "var v = table[i + 1].value;\n");
}

#[test]
fn emitted_comment_statement() {
    let mut counter = NodeCounter::new();
    let stmt = counter.mk_node(
        StmtKind::EmittedComment("[cleanup] function f1() {}".into()),
        Span::dummy(),
    );
    let program = Program { body: vec![stmt] };
    assert_eq!(print_program(&program), "/*[cleanup] function f1() {}*/\n");
}

#[test]
fn emitted_comment_never_breaks_out() {
    let mut counter = NodeCounter::new();
    let stmt = counter.mk_node(StmtKind::EmittedComment("evil */ code".into()), Span::dummy());
    let program = Program { body: vec![stmt] };
    let out = print_program(&program);
    assert!(!out.contains("evil */"), "comment terminator must be defanged: {}", out);
}

#[test]
fn deeply_mixed_expression() {
    let src = "var r = a + b * (c - d) % e << 2 & mask | flag ^ bits;";
    let program = parse_src(src);
    let printed = print_program(&program);
    assert_eq!(program, parse_src(&printed), "round trip changed structure");
}
