//! Textual normalization of well-known constant idioms, applied to the raw
//! source before parsing.
//!
//! The one idiom handled today is the reversed string literal:
//!
//! ```text
//! "dlrow olleh".split("").reverse().join("")   =>   "hello world"
//! ```
//!
//! Rewriting it early lets the call-site extractor see a plain literal
//! argument where the obfuscator left a method chain.

use log::debug;
use regex::{Captures, Regex};
use std::sync::OnceLock;

static REVERSE_IDIOM: OnceLock<Regex> = OnceLock::new();

fn reverse_idiom() -> &'static Regex {
    REVERSE_IDIOM.get_or_init(|| {
        // A quoted literal (either quote style) followed by the exact
        // .split("").reverse().join("") chain, whitespace-tolerant. The
        // leading capture keeps a match from starting at an escaped quote
        // inside a larger literal.
        Regex::new(
            r#"(?x)
            (?P<pre>^|[^\\])
            (?: "(?P<dq>[^"\\]*)" | '(?P<sq>[^'\\]*)' )
            \s*\.\s*split\s*\(\s*(?:""|'')\s*\)
            \s*\.\s*reverse\s*\(\s*\)
            \s*\.\s*join\s*\(\s*(?:""|'')\s*\)
            "#,
        )
        .unwrap()
    })
}

/// Rewrite every occurrence of the reversed-string idiom in `source`.
///
/// Literals containing backslash escapes are excluded by the pattern:
/// reversing their raw text would corrupt the escapes, and leaving the
/// idiom intact only costs a missed extraction. Applying the rewrite twice
/// is the same as applying it once, because the method chain is consumed.
pub fn normalize_string_reverse(source: &str) -> String {
    let re = reverse_idiom();
    let mut replaced = 0usize;
    let out = re.replace_all(source, |caps: &Captures| {
        replaced += 1;
        let pre = caps.name("pre").map(|m| m.as_str()).unwrap_or("");
        let (quote, chars) = match (caps.name("dq"), caps.name("sq")) {
            (Some(m), _) => ('"', m.as_str()),
            (_, Some(m)) => ('\'', m.as_str()),
            _ => unreachable!("one alternative always matches"),
        };
        let reversed: String = chars.chars().rev().collect();
        format!("{}{}{}{}", pre, quote, reversed, quote)
    });
    if replaced > 0 {
        debug!("normalized {} reversed string literal(s)", replaced);
    }
    out.into_owned()
}
