//! Tests for the reversed-string-literal normalizer.

use crate::normalize::normalize_string_reverse;

#[test]
fn rewrites_the_reverse_idiom() {
    let src = r#"var s = "dlrow olleh".split("").reverse().join("");"#;
    assert_eq!(normalize_string_reverse(src), r#"var s = "hello world";"#);
}

#[test]
fn handles_single_quotes() {
    let src = "var s = 'cba'.split('').reverse().join('');";
    assert_eq!(normalize_string_reverse(src), "var s = 'abc';");
}

#[test]
fn tolerates_whitespace_in_the_chain() {
    let src = "var s = \"ba\" . split( \"\" ) . reverse( ) . join( \"\" );";
    assert_eq!(normalize_string_reverse(src), "var s = \"ab\";");
}

#[test]
fn is_idempotent() {
    let src = r#"var s = "dlrow".split("").reverse().join("");"#;
    let once = normalize_string_reverse(src);
    let twice = normalize_string_reverse(&once);
    assert_eq!(once, twice);
}

#[test]
fn leaves_escaped_literals_alone() {
    // Reversing raw text would corrupt the escape sequence
    let src = r#"var s = "a\"b".split("").reverse().join("");"#;
    assert_eq!(normalize_string_reverse(src), src);
}

#[test]
fn leaves_unrelated_chains_alone() {
    let src = r#"var s = name.split("").reverse().join("");"#;
    assert_eq!(normalize_string_reverse(src), src);
    let src = r#"var s = "ab".split(",").reverse().join("");"#;
    assert_eq!(normalize_string_reverse(src), src);
}

#[test]
fn rewrites_every_occurrence() {
    let src = r#"var a = "ba".split("").reverse().join(""); var b = "dc".split("").reverse().join("");"#;
    assert_eq!(normalize_string_reverse(src), r#"var a = "ab"; var b = "cd";"#);
}

#[test]
fn reverses_multibyte_text_by_character() {
    let src = r#"var s = "ßa".split("").reverse().join("");"#;
    assert_eq!(normalize_string_reverse(src), r#"var s = "aß";"#);
}
