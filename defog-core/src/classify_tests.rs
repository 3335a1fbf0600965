//! Tests for helper classification.

use crate::ast::NodeCounter;
use crate::classify::{classify, HelperKind};
use crate::config::Config;
use crate::lexer;
use crate::parser::Parser;
use crate::printer::print_statement;

fn helpers_of(src: &str) -> crate::classify::Helpers {
    let tokens = lexer::tokenize(src).expect("tokenize failed");
    let mut counter = NodeCounter::new();
    let mut parser = Parser::new(tokens, &mut counter);
    let program = parser.parse().expect("parse failed");
    classify(&program, &Config::default())
}

#[test]
fn finds_function_declarations() {
    let helpers = helpers_of("function f1(x) { return x; }\nfunction helper(x) { return x; }");
    assert_eq!(helpers.len(), 1);
    let def = helpers.get("f1").unwrap();
    assert_eq!(def.kind, HelperKind::Declaration);
    assert!(def.top_level);
}

#[test]
fn finds_function_valued_bindings() {
    let helpers = helpers_of("var f2 = function(x) { return x + 1; };");
    let def = helpers.get("f2").unwrap();
    assert_eq!(def.kind, HelperKind::Binding);
}

#[test]
fn finds_arrow_bindings() {
    let helpers = helpers_of("var f3 = (x) => x * 2;");
    assert_eq!(helpers.get("f3").unwrap().kind, HelperKind::Binding);
}

#[test]
fn plain_value_bindings_are_not_helpers() {
    let helpers = helpers_of("var f4 = 42;");
    assert!(helpers.is_empty());
}

#[test]
fn nested_definitions_are_found() {
    let helpers = helpers_of("function outer() { function f9(x) { return x; } return f9; }");
    let def = helpers.get("f9").unwrap();
    assert!(!def.top_level);
}

#[test]
fn definitions_inside_iifes_are_found() {
    let helpers = helpers_of("(function() { var f7 = function(a) { return a; }; })();");
    assert!(helpers.contains("f7"));
}

#[test]
fn first_definition_wins() {
    let helpers =
        helpers_of("function f1(x) { return 1; }\nfunction f1(x) { return 2; }");
    assert_eq!(helpers.len(), 1);
    let printed = print_statement(&helpers.get("f1").unwrap().def_stmt);
    assert!(printed.contains("return 1"), "kept the wrong definition: {}", printed);
}

#[test]
fn binding_def_stmt_is_self_contained() {
    let helpers = helpers_of("var keep = 1, f5 = function(x) { return x; }, other = 2;");
    let printed = print_statement(&helpers.get("f5").unwrap().def_stmt);
    assert_eq!(printed, "var f5 = function(x) {\n  return x;\n};");
}

#[test]
fn exported_declarations_stay_top_level() {
    let helpers = helpers_of("export function f6(x) { return x; }");
    assert!(helpers.get("f6").unwrap().top_level);
}
