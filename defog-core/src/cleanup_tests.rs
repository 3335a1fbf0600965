//! Tests for the cleanup analyzer.

use crate::ast::{NodeCounter, Program};
use crate::classify::classify;
use crate::cleanup::cleanup;
use crate::config::{CleanupMode, Config};
use crate::harness::CapturedValue;
use crate::lexer;
use crate::parser::Parser;
use crate::printer::print_program;
use indexmap::IndexMap;

fn parse_src(src: &str) -> Program {
    let tokens = lexer::tokenize(src).expect("tokenize failed");
    let mut counter = NodeCounter::new();
    let mut parser = Parser::new(tokens, &mut counter);
    parser.parse().expect("parse failed")
}

fn cleanup_src(
    src: &str,
    results: &[(&str, CapturedValue)],
    mode: CleanupMode,
) -> (String, crate::cleanup::CleanupStats) {
    let mut program = parse_src(src);
    let helpers = classify(&program, &Config::default());
    let results: IndexMap<String, CapturedValue> =
        results.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    let stats = cleanup(&mut program, &helpers, &results, mode);
    (print_program(&program), stats)
}

#[test]
fn mode_none_leaves_everything() {
    let src = "function f1(x) { return x; }\nvar y = 2;";
    let (out, stats) = cleanup_src(src, &[], CleanupMode::None);
    assert!(out.contains("function f1"));
    assert!(stats.dead_helpers.is_empty());
}

#[test]
fn unreferenced_helper_is_removed() {
    // After rewriting, no references to f123 remain
    let src = "function f123(a, b, c, d) { return a + b + c + d; }\nvar x = 10;";
    let (out, stats) = cleanup_src(src, &[], CleanupMode::Remove);
    assert!(!out.contains("f123"), "definition should be gone: {}", out);
    assert_eq!(stats.dead_helpers, vec!["f123".to_string()]);
}

#[test]
fn referenced_helper_survives() {
    let src = "function f123(a, b, c, d) { return a; }\nvar x = f123(1, 2, 3, k);";
    let (out, stats) = cleanup_src(src, &[], CleanupMode::Remove);
    assert!(out.contains("function f123"), "live helper removed: {}", out);
    assert!(stats.dead_helpers.is_empty());
}

#[test]
fn comment_mode_wraps_the_printed_form() {
    let src = "function f1(x) { return x; }\nvar y = 1;";
    let (out, _) = cleanup_src(src, &[], CleanupMode::Comment);
    assert!(
        out.contains("/*[cleanup] function f1(x) {"),
        "expected cleanup comment: {}",
        out
    );
    // The commented text is inert for a reparse
    parse_src(&out);
}

#[test]
fn exported_helpers_are_retained() {
    let src = "export function f1(x) { return x; }";
    let (out, stats) = cleanup_src(src, &[], CleanupMode::Remove);
    assert!(out.contains("function f1"));
    assert!(stats.dead_helpers.is_empty());
}

#[test]
fn self_recursion_does_not_keep_a_helper_alive() {
    let src = "function f1(x) { return x < 1 ? 0 : f1(x - 1); }\nvar y = 0;";
    let (out, stats) = cleanup_src(src, &[], CleanupMode::Remove);
    assert!(!out.contains("function f1"), "self-reference pinned the helper: {}", out);
    assert_eq!(stats.dead_helpers, vec!["f1".to_string()]);
}

#[test]
fn dead_caller_unpins_its_callee() {
    // f2 calls f1; nothing calls f2. Both must go.
    let src = "function f1(x) { return x; }\nfunction f2(x) { return f1(x); }\nvar y = 0;";
    let (out, stats) = cleanup_src(src, &[], CleanupMode::Remove);
    assert!(!out.contains("function f1"));
    assert!(!out.contains("function f2"));
    assert_eq!(stats.dead_helpers.len(), 2);
}

#[test]
fn binding_helper_is_removed_from_its_declaration() {
    let src = "var keep = 1, f5 = function(x) { return x; };\nvar y = keep;";
    let (out, stats) = cleanup_src(src, &[], CleanupMode::Remove);
    assert!(out.contains("var keep = 1;"), "other declarators must stay: {}", out);
    assert!(!out.contains("f5"));
    assert_eq!(stats.dead_helpers, vec!["f5".to_string()]);
}

#[test]
fn satisfied_initializer_block_is_removed() {
    let src = "function f2(x) { return x; }\n(function() { f2(10); })();\nvar y = 21;";
    let (out, stats) = cleanup_src(
        src,
        &[("f2(10)", CapturedValue::Int(21))],
        CleanupMode::Remove,
    );
    assert!(!out.contains("(function()"), "satisfied block should be gone: {}", out);
    assert_eq!(stats.dead_init_blocks, 1);
    // With the block gone nothing references f2 either
    assert!(stats.dead_helpers.contains(&"f2".to_string()));
}

#[test]
fn unsatisfied_initializer_block_stays() {
    // f2(3) has no key in the result map, so the block must stay
    let src = "function f2(x) { return x; }\n(function() { f2(3); })();\nvar y = 21;";
    let (out, stats) = cleanup_src(
        src,
        &[("f2(10)", CapturedValue::Int(21))],
        CleanupMode::Remove,
    );
    assert!(out.contains("f2(3)"), "unsatisfied block removed: {}", out);
    assert_eq!(stats.dead_init_blocks, 0);
    assert!(out.contains("function f2"), "block reference must pin the helper");
}

#[test]
fn unrelated_initializer_blocks_are_untouched() {
    let src = "function f1(x) { return x; }\n(function() { setup(); })();\nvar y = f1(1, 2, 3, k);";
    let (out, _) = cleanup_src(src, &[], CleanupMode::Remove);
    assert!(out.contains("setup()"), "unrelated block removed: {}", out);
}

#[test]
fn cleanup_never_leaves_dangling_references() {
    // f1 is used by live code, f2 only by f1. Nothing may be removed.
    let src = "function f1(x) { return f2(x); }\nfunction f2(x) { return x; }\nvar y = f1(5, 6, 7, k);";
    let (out, stats) = cleanup_src(src, &[], CleanupMode::Remove);
    assert!(out.contains("function f1"));
    assert!(out.contains("function f2"));
    assert!(stats.dead_helpers.is_empty());
}
