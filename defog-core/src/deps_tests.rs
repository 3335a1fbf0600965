//! Tests for the dependency resolver.

use crate::ast::NodeCounter;
use crate::classify::classify;
use crate::config::Config;
use crate::deps::resolve;
use crate::extract::extract;
use crate::lexer;
use crate::parser::Parser;

fn resolve_src(src: &str, config: &Config) -> crate::deps::Resolution {
    let tokens = lexer::tokenize(src).expect("tokenize failed");
    let mut counter = NodeCounter::new();
    let mut parser = Parser::new(tokens, &mut counter);
    let program = parser.parse().expect("parse failed");
    let helpers = classify(&program, config);
    let extraction = extract(&program, &helpers, config);
    resolve(&helpers, &extraction)
}

fn config_min1() -> Config {
    Config {
        min_args: 1,
        max_args: 6,
        ..Config::default()
    }
}

#[test]
fn transitive_closure_through_initializer() {
    let src = "function f1(x) { return x * 2; }\n\
               function f2(x) { return f1(x) + 1; }\n\
               (function() { f2(3); })();\n\
               var y = f2(10);";
    let resolution = resolve_src(src, &config_min1());
    assert!(resolution.contains("f1"), "f1 must be pulled in transitively");
    assert!(resolution.contains("f2"));
    assert!(!resolution.had_cycle);
    // Post order: callee before caller
    let f1_pos = resolution.extracted.iter().position(|n| n == "f1").unwrap();
    let f2_pos = resolution.extracted.iter().position(|n| n == "f2").unwrap();
    assert!(f1_pos < f2_pos);
}

#[test]
fn unreferenced_helpers_stay_out() {
    let src = "function f1(x) { return x; }\n\
               function f2(x) { return x; }\n\
               var y = f1(1);";
    let resolution = resolve_src(src, &config_min1());
    assert!(resolution.contains("f1"));
    assert!(!resolution.contains("f2"));
}

#[test]
fn cycles_are_tolerated_and_reported() {
    let src = "function f1(x) { return x < 1 ? 0 : f2(x - 1); }\n\
               function f2(x) { return f1(x); }\n\
               var y = f1(5);";
    let resolution = resolve_src(src, &config_min1());
    assert!(resolution.contains("f1"));
    assert!(resolution.contains("f2"));
    assert!(resolution.had_cycle);
}

#[test]
fn self_recursion_is_not_a_cycle() {
    let src = "function f1(x) { return x < 1 ? 0 : f1(x - 1); }\nvar y = f1(3);";
    let resolution = resolve_src(src, &config_min1());
    assert!(resolution.contains("f1"));
    assert!(!resolution.had_cycle, "a self-edge is silently absorbed");
}

#[test]
fn window_rejected_calls_still_seed() {
    // Seven arguments is outside the default window, but the name still
    // reaches the extracted set
    let src = "function f1(a, b, c, d, e, f, g) { return a; }\nvar y = f1(1, 2, 3, 4, 5, 6, 7);";
    let resolution = resolve_src(src, &Config::default());
    assert!(resolution.contains("f1"));
}

#[test]
fn empty_program_resolves_to_nothing() {
    let resolution = resolve_src("var x = 1;", &Config::default());
    assert!(resolution.extracted.is_empty());
}
