use crate::ast::*;
use crate::lexer;
use crate::parser::Parser;
use crate::printer::print_program;

fn parse_src(src: &str) -> Program {
    let tokens = lexer::tokenize(src).expect("tokenize failed");
    let mut counter = NodeCounter::new();
    let mut parser = Parser::new(tokens, &mut counter);
    parser.parse().expect("parse failed")
}

fn roundtrip(src: &str) -> String {
    print_program(&parse_src(src))
}

#[test]
fn parse_var_declaration() {
    let program = parse_src("var x = 1, y;");
    assert_eq!(program.body.len(), 1);
    match &program.body[0].kind {
        StmtKind::VarDecl { keyword, declarators } => {
            assert_eq!(*keyword, DeclKeyword::Var);
            assert_eq!(declarators.len(), 2);
            assert_eq!(declarators[0].name, "x");
            assert!(declarators[1].init.is_none());
        }
        other => panic!("expected var decl, got {:?}", other),
    }
}

#[test]
fn parse_function_declaration() {
    let program = parse_src("function f123(a, b, c, d) { return a + b + c + d; }");
    match &program.body[0].kind {
        StmtKind::FunctionDecl(func) => {
            assert_eq!(func.name.as_deref(), Some("f123"));
            assert_eq!(func.params, vec!["a", "b", "c", "d"]);
            assert_eq!(func.body.len(), 1);
        }
        other => panic!("expected function decl, got {:?}", other),
    }
}

#[test]
fn precedence_respects_parentheses() {
    assert_eq!(roundtrip("var x = 1 + 2 * 3;"), "var x = 1 + 2 * 3;\n");
    assert_eq!(roundtrip("var x = (1 + 2) * 3;"), "var x = (1 + 2) * 3;\n");
}

#[test]
fn member_property_may_be_keyword() {
    let program = parse_src("obj.default(1, 2, 3, 4);");
    match &program.body[0].kind {
        StmtKind::Expr(expr) => match &expr.kind {
            ExprKind::Call { callee, args } => {
                assert_eq!(args.len(), 4);
                match &callee.kind {
                    ExprKind::Member {
                        property: MemberProp::Ident(name),
                        ..
                    } => assert_eq!(name, "default"),
                    other => panic!("expected member callee, got {:?}", other),
                }
            }
            other => panic!("expected call, got {:?}", other),
        },
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn iife_keeps_its_shape() {
    let out = roundtrip("(function() { f2(3); })();");
    assert_eq!(out, "(function() {\n  f2(3);\n})();\n");
}

#[test]
fn bang_wrapped_iife() {
    let out = roundtrip("!function() { setup(); }();");
    assert_eq!(out, "!(function() {\n  setup();\n})();\n");
}

#[test]
fn arrow_functions() {
    assert_eq!(roundtrip("var f = (a, b) => a + b;"), "var f = (a, b) => a + b;\n");
    // Single-parameter arrows normalize to the parenthesized form
    assert_eq!(roundtrip("var id = x => x;"), "var id = (x) => x;\n");
}

#[test]
fn object_and_array_literals() {
    assert_eq!(
        roundtrip("var o = { a: 1, \"b\": 2, 3: x };"),
        "var o = { a: 1, \"b\": 2, 3.0: x };\n"
    );
    assert_eq!(roundtrip("var a = [1, 2, [3]];"), "var a = [1, 2, [3]];\n");
}

#[test]
fn conditional_and_logical() {
    assert_eq!(
        roundtrip("var r = a && b ? c || d : e;"),
        "var r = a && b ? c || d : e;\n"
    );
}

#[test]
fn do_while_loop() {
    let out = roundtrip("do { x--; } while (x > 0);");
    assert_eq!(out, "do {\n  x--;\n} while (x > 0);\n");
}

#[test]
fn try_catch_finally() {
    let out = roundtrip("try { risky(); } catch (e) { handle(e); } finally { done(); }");
    assert_eq!(
        out,
        "try {\n  risky();\n} catch (e) {\n  handle(e);\n} finally {\n  done();\n}\n"
    );
}

#[test]
fn classic_for_loop() {
    let out = roundtrip("for (var i = 0; i < 10; i++) { work(i); }");
    assert_eq!(out, "for (var i = 0; i < 10; i++) {\n  work(i);\n}\n");
}

#[test]
fn for_in_loop() {
    let out = roundtrip("for (var k in obj) { use(k); }");
    assert_eq!(out, "for (var k in obj) {\n  use(k);\n}\n");
}

#[test]
fn export_declarations() {
    let out = roundtrip("export function f1(x) { return x; }");
    assert_eq!(out, "export function f1(x) {\n  return x;\n}\n");
    let out = roundtrip("export default f1;");
    assert_eq!(out, "export default f1;\n");
}

#[test]
fn new_expressions() {
    assert_eq!(roundtrip("var e = new Error(\"boom\");"), "var e = new Error(\"boom\");\n");
}

#[test]
fn parse_error_carries_location() {
    let tokens = lexer::tokenize("var = 3;").unwrap();
    let mut counter = NodeCounter::new();
    let mut parser = Parser::new(tokens, &mut counter);
    let err = parser.parse().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Parse error"), "unexpected message: {}", message);
    assert!(message.contains("at 1:"), "expected an offset in: {}", message);
}

#[test]
fn print_parse_roundtrip_is_stable() {
    let sources = [
        "function f1(x) { return x * 2; }\nvar y = f1(10);",
        "(function() { f2(3); })();",
        "var s = \"a\\nb\" + 'c';",
        "if (a) b(); else { c(); }",
        "var neg = f123(-1, 2.5, \"x\", true);",
        "while (i < 10) i += 1;",
    ];
    for src in sources {
        let once = parse_src(src);
        let printed = print_program(&once);
        let twice = parse_src(&printed);
        assert_eq!(once, twice, "round-trip changed structure for {:?}", src);
        // Printing is a fixed point after one pass
        assert_eq!(printed, print_program(&twice));
    }
}
