//! Tests for the sandboxed evaluator.

use crate::sandbox::{evaluate, Limits, SandboxStatus, Value};
use std::time::Duration;

fn run(src: &str) -> crate::sandbox::SandboxOutcome {
    evaluate(src, &Limits::default())
}

fn run_ok(src: &str) -> Vec<(String, Value)> {
    let outcome = run(src);
    assert!(
        matches!(outcome.status, SandboxStatus::Ok),
        "expected Ok, got {:?}",
        outcome.status
    );
    outcome.results
}

fn result_of(src: &str, key: &str) -> Value {
    let results = run_ok(src);
    results
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
        .unwrap_or_else(|| panic!("no result under {:?}", key))
}

fn assert_number(value: &Value, expected: f64) {
    match value {
        Value::Number(n) => assert_eq!(*n, expected),
        other => panic!("expected number {}, got {:?}", expected, other),
    }
}

fn assert_string(value: &Value, expected: &str) {
    match value {
        Value::Str(s) => assert_eq!(s, expected),
        other => panic!("expected string {:?}, got {:?}", expected, other),
    }
}

#[test]
fn constant_arithmetic() {
    let v = result_of(
        "var __results = {};\nfunction f(a, b) { return a * b + 1; }\n__results[\"k\"] = f(6, 7);",
        "k",
    );
    assert_number(&v, 43.0);
}

#[test]
fn string_concatenation_and_methods() {
    let v = result_of(
        "var __results = {};\n\
         var s = \"hello\" + \" \" + \"world\";\n\
         __results[\"k\"] = s.toUpperCase().charAt(0) + s.length;",
        "k",
    );
    assert_string(&v, "H11");
}

#[test]
fn char_code_round_trip() {
    let v = result_of(
        "var __results = {};\n\
         __results[\"k\"] = String.fromCharCode(\"A\".charCodeAt(0) + 1);",
        "k",
    );
    assert_string(&v, "B");
}

#[test]
fn split_reverse_join() {
    let v = result_of(
        "var __results = {};\n\
         __results[\"k\"] = \"dcba\".split(\"\").reverse().join(\"\");",
        "k",
    );
    assert_string(&v, "abcd");
}

#[test]
fn forward_references_between_functions() {
    let v = result_of(
        "var __results = {};\n\
         function f2(x) { return f1(x) + 1; }\n\
         function f1(x) { return x * 2; }\n\
         __results[\"k\"] = f2(10);",
        "k",
    );
    assert_number(&v, 21.0);
}

#[test]
fn closures_capture_their_scope() {
    let v = result_of(
        "var __results = {};\n\
         function make(n) { return function(x) { return x + n; }; }\n\
         var add5 = make(5);\n\
         __results[\"k\"] = add5(3);",
        "k",
    );
    assert_number(&v, 8.0);
}

#[test]
fn initializer_mutation_is_visible() {
    let v = result_of(
        "var __results = {};\n\
         var table = [1, 2, 3];\n\
         (function() { table.reverse(); })();\n\
         __results[\"k\"] = table[0];",
        "k",
    );
    assert_number(&v, 3.0);
}

#[test]
fn try_catch_contains_throws() {
    let v = result_of(
        "var __results = {};\n\
         var r;\n\
         try { throw \"boom\"; } catch (e) { r = \"caught \" + e; }\n\
         __results[\"k\"] = r;",
        "k",
    );
    assert_string(&v, "caught boom");
}

#[test]
fn apply_spreads_an_argument_array() {
    let v = result_of(
        "var __results = {};\n\
         function sum(a, b, c) { return a + b + c; }\n\
         __results[\"k\"] = sum.apply(null, [1, 2, 3]);",
        "k",
    );
    assert_number(&v, 6.0);
}

#[test]
fn bitwise_operators_use_int32_semantics() {
    let v = result_of(
        "var __results = {};\n__results[\"k\"] = (0xFF & 0x0F) | (1 << 4);",
        "k",
    );
    assert_number(&v, 31.0);
}

#[test]
fn uncaught_throw_is_fatal() {
    let outcome = run("throw \"unhandled\";");
    match outcome.status {
        SandboxStatus::Fatal(message) => assert!(message.contains("unhandled")),
        other => panic!("expected fatal, got {:?}", other),
    }
}

#[test]
fn syntax_error_is_fatal() {
    let outcome = run("function ( {");
    assert!(matches!(outcome.status, SandboxStatus::Fatal(_)));
}

#[test]
fn infinite_loop_hits_the_wall_clock() {
    let limits = Limits {
        timeout: Duration::from_millis(50),
        max_steps: u64::MAX,
        ..Limits::default()
    };
    let outcome = evaluate("while (true) {}", &limits);
    assert!(matches!(outcome.status, SandboxStatus::Timeout), "got {:?}", outcome.status);
}

#[test]
fn step_budget_is_a_backstop() {
    let limits = Limits {
        timeout: Duration::from_secs(30),
        max_steps: 10_000,
        ..Limits::default()
    };
    let outcome = evaluate("while (true) {}", &limits);
    assert!(matches!(outcome.status, SandboxStatus::Fatal(_)));
}

#[test]
fn runaway_recursion_fails_the_evaluation() {
    let outcome = run("function f(x) { return f(x + 1); }\nf(0);");
    assert!(matches!(outcome.status, SandboxStatus::Fatal(_)));
}

#[test]
fn console_is_discarded() {
    let v = result_of(
        "var __results = {};\nconsole.log(\"noise\");\n__results[\"k\"] = 1;",
        "k",
    );
    assert_number(&v, 1.0);
}

#[test]
fn require_returns_its_argument() {
    let v = result_of(
        "var __results = {};\n__results[\"k\"] = require(\"fs\");",
        "k",
    );
    assert_string(&v, "fs");
}

#[test]
fn date_now_is_monotonic_and_numeric() {
    let v = result_of(
        "var __results = {};\nvar a = Date.now();\nvar b = Date.now();\n__results[\"k\"] = b >= a;",
        "k",
    );
    match v {
        Value::Bool(b) => assert!(b),
        other => panic!("expected bool, got {:?}", other),
    }
}

#[test]
fn math_random_is_deterministic_across_runs() {
    let src = "var __results = {};\n__results[\"k\"] = Math.random();";
    let a = result_of(src, "k");
    let b = result_of(src, "k");
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            assert_eq!(x, y, "seeded generator must repeat across runs");
            assert!((0.0..1.0).contains(&x));
        }
        other => panic!("expected numbers, got {:?}", other),
    }
}

#[test]
fn parse_int_handles_radix_and_prefix() {
    let v = result_of(
        "var __results = {};\n__results[\"k\"] = parseInt(\"ff\", 16) + parseInt(\"0x10\") + parseInt(\"12px\");",
        "k",
    );
    assert_number(&v, 255.0 + 16.0 + 12.0);
}

#[test]
fn safe_call_preamble_contains_per_call_failures() {
    let src = "var __results = {};\n\
               var __calls = [];\n\
               function __safeCall(f, args, key) {\n\
                 var start = Date.now();\n\
                 try {\n\
                   var value = f.apply(null, args);\n\
                   __results[key] = value;\n\
                   __calls.push({ call: key, args: args, result: value, elapsedMs: Date.now() - start });\n\
                 } catch (e) {\n\
                   __calls.push({ call: key, args: args, error: \"\" + e, elapsedMs: Date.now() - start });\n\
                 }\n\
               }\n\
               function ok(x) { return x + 1; }\n\
               function bad(x) { throw \"nope\"; }\n\
               __safeCall(ok, [1], \"ok(1)\");\n\
               __safeCall(bad, [1], \"bad(1)\");";
    let outcome = run(src);
    assert!(matches!(outcome.status, SandboxStatus::Ok));
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].0, "ok(1)");
    assert_eq!(outcome.calls.len(), 2);
}
