//! Tests for the rewriter.

use crate::ast::{NodeCounter, Program};
use crate::classify::{classify, Helpers};
use crate::config::Config;
use crate::harness::CapturedValue;
use crate::lexer;
use crate::parser::Parser;
use crate::printer::print_program;
use crate::rewrite::rewrite;
use indexmap::IndexMap;

fn parse_with_counter(src: &str) -> (Program, NodeCounter) {
    let tokens = lexer::tokenize(src).expect("tokenize failed");
    let mut counter = NodeCounter::new();
    let program = {
        let mut parser = Parser::new(tokens, &mut counter);
        parser.parse().expect("parse failed")
    };
    (program, counter)
}

fn rewrite_src(
    src: &str,
    results: &IndexMap<String, CapturedValue>,
    config: &Config,
) -> (String, crate::rewrite::RewriteStats) {
    let (mut program, mut counter) = parse_with_counter(src);
    let helpers = classify(&program, config);
    let stats = rewrite(&mut program, &helpers, results, config, &mut counter);
    (print_program(&program), stats)
}

fn helpers_of(src: &str, config: &Config) -> Helpers {
    let (program, _) = parse_with_counter(src);
    classify(&program, config)
}

fn results_of(entries: &[(&str, CapturedValue)]) -> IndexMap<String, CapturedValue> {
    entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn replaces_a_keyed_call_with_its_result() {
    let src = "function f123(a, b, c, d) { return a + b + c + d; }\nvar x = f123(1, 2, 3, 4);";
    let results = results_of(&[("f123(1, 2, 3, 4)", CapturedValue::Int(10))]);
    let (out, stats) = rewrite_src(src, &results, &Config::default());
    assert!(out.contains("var x = 10;"), "unexpected output: {}", out);
    assert_eq!(stats.total, 1);
    assert_eq!(stats.replaced_by_name["f123"], 1);
}

#[test]
fn every_result_kind_becomes_a_literal() {
    let config = Config {
        min_args: 1,
        max_args: 6,
        ..Config::default()
    };
    let src = "function f1(x) { return x; }\n\
               var a = f1(1);\nvar b = f1(2);\nvar c = f1(3);\n\
               var d = f1(4);\nvar e = f1(5);\nvar f = f1(6);";
    let results = results_of(&[
        ("f1(1)", CapturedValue::Str("s".into())),
        ("f1(2)", CapturedValue::Int(-7)),
        ("f1(3)", CapturedValue::Float(2.5)),
        ("f1(4)", CapturedValue::Bool(false)),
        ("f1(5)", CapturedValue::Null),
        ("f1(6)", CapturedValue::Undefined),
    ]);
    let (out, stats) = rewrite_src(src, &results, &config);
    assert_eq!(stats.total, 6);
    assert!(out.contains("var a = \"s\";"));
    assert!(out.contains("var b = -7;"));
    assert!(out.contains("var c = 2.5;"));
    assert!(out.contains("var d = false;"));
    assert!(out.contains("var e = null;"));
    assert!(out.contains("var f = undefined;"));
}

#[test]
fn unkeyed_calls_are_left_alone() {
    let src = "function f123(a, b, c, d) { return a; }\nvar x = f123(1, 2, 3, 4);";
    let results = IndexMap::new();
    let (out, stats) = rewrite_src(src, &results, &Config::default());
    assert!(out.contains("f123(1, 2, 3, 4)"));
    assert_eq!(stats.total, 0);
}

#[test]
fn window_gates_rewriting() {
    let src = "function f1(a, b) { return a + b; }\nvar x = f1(1, 2);";
    let results = results_of(&[("f1(1, 2)", CapturedValue::Int(3))]);
    // Default window is 4..=6 arguments
    let (out, stats) = rewrite_src(src, &results, &Config::default());
    assert!(out.contains("f1(1, 2)"));
    assert_eq!(stats.total, 0);
}

#[test]
fn initializer_context_calls_are_never_rewritten() {
    let config = Config {
        min_args: 1,
        max_args: 6,
        ..Config::default()
    };
    let src = "function f2(x) { return x; }\n\
               (function() { f2(10); })();\n\
               var y = f2(10);";
    let results = results_of(&[("f2(10)", CapturedValue::Int(21))]);
    let (out, stats) = rewrite_src(src, &results, &config);
    assert_eq!(stats.total, 1, "only the pure site is rewritten");
    assert!(out.contains("(function() {\n  f2(10);\n})();"), "unexpected output: {}", out);
    assert!(out.contains("var y = 21;"));
}

#[test]
fn member_call_sites_are_rewritten() {
    let config = Config {
        min_args: 1,
        max_args: 6,
        ..Config::default()
    };
    let src = "function f5(x) { return x; }\nvar r = util.f5(7);";
    let results = results_of(&[("util.f5(7)", CapturedValue::Int(7))]);
    let (out, stats) = rewrite_src(src, &results, &config);
    assert_eq!(stats.total, 1);
    assert!(out.contains("var r = 7;"));
}

#[test]
fn unrepresentable_results_are_skipped() {
    let src = "function f123(a, b, c, d) { return a; }\nvar x = f123(1, 2, 3, 4);";
    let results = results_of(&[("f123(1, 2, 3, 4)", CapturedValue::Unrepresentable)]);
    let (out, stats) = rewrite_src(src, &results, &Config::default());
    assert!(out.contains("f123(1, 2, 3, 4)"));
    assert_eq!(stats.total, 0);
}

#[test]
fn helpers_map_is_authoritative() {
    // g99 matches no helper definition, so even a keyed call stays
    let src = "var x = g99(1, 2, 3, 4);";
    let config = Config::default();
    assert!(helpers_of(src, &config).is_empty());
    let results = results_of(&[("g99(1, 2, 3, 4)", CapturedValue::Int(1))]);
    let (out, stats) = rewrite_src(src, &results, &config);
    assert!(out.contains("g99(1, 2, 3, 4)"));
    assert_eq!(stats.total, 0);
}
