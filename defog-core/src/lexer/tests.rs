use super::*;

fn tokens_only(input: &str) -> Vec<Token> {
    tokenize(input).expect("tokenize failed").into_iter().map(|t| t.token).collect()
}

#[test]
fn tokenize_keywords_and_identifiers() {
    let input = "function f123 var x undefined $tmp _y";
    assert_eq!(
        tokens_only(input),
        vec![
            Token::Function,
            Token::Identifier("f123".to_string()),
            Token::Var,
            Token::Identifier("x".to_string()),
            Token::Undefined,
            Token::Identifier("$tmp".to_string()),
            Token::Identifier("_y".to_string()),
        ]
    );
}

#[test]
fn tokenize_numbers() {
    let input = "42 3.14 0xFF 1e3 2.5e-2";
    assert_eq!(
        tokens_only(input),
        vec![
            Token::IntLiteral(42),
            Token::FloatLiteral(3.14),
            Token::IntLiteral(255),
            Token::FloatLiteral(1000.0),
            Token::FloatLiteral(0.025),
        ]
    );
}

#[test]
fn number_followed_by_member_access() {
    // The dot must stay a member-access dot when no digits follow
    let input = "x.length";
    assert_eq!(
        tokens_only(input),
        vec![
            Token::Identifier("x".to_string()),
            Token::Dot,
            Token::Identifier("length".to_string()),
        ]
    );
}

#[test]
fn tokenize_strings_with_escapes() {
    assert_eq!(
        tokens_only(r#""hello\nworld""#),
        vec![Token::StringLiteral("hello\nworld".to_string())]
    );
    assert_eq!(
        tokens_only(r#"'it\'s'"#),
        vec![Token::StringLiteral("it's".to_string())]
    );
    assert_eq!(
        tokens_only(r#""\x41B""#),
        vec![Token::StringLiteral("AB".to_string())]
    );
}

#[test]
fn unterminated_string_is_an_error() {
    assert!(tokenize("\"abc").is_err());
}

#[test]
fn tokenize_operators_longest_match() {
    let input = "=== !== == != >>> >> << <= >= => ** && || ++ -- +=";
    assert_eq!(
        tokens_only(input),
        vec![
            Token::BinOp("===".to_string()),
            Token::BinOp("!==".to_string()),
            Token::BinOp("==".to_string()),
            Token::BinOp("!=".to_string()),
            Token::BinOp(">>>".to_string()),
            Token::BinOp(">>".to_string()),
            Token::BinOp("<<".to_string()),
            Token::BinOp("<=".to_string()),
            Token::BinOp(">=".to_string()),
            Token::Arrow,
            Token::BinOp("**".to_string()),
            Token::AndAnd,
            Token::OrOr,
            Token::PlusPlus,
            Token::MinusMinus,
            Token::AssignOp("+=".to_string()),
        ]
    );
}

#[test]
fn comments_are_skipped() {
    let input = "a // line comment\n/* block\ncomment */ b";
    assert_eq!(
        tokens_only(input),
        vec![
            Token::Identifier("a".to_string()),
            Token::Identifier("b".to_string()),
        ]
    );
}

#[test]
fn tokenize_call_shape() {
    let input = "f123(1, 2);";
    assert_eq!(
        tokens_only(input),
        vec![
            Token::Identifier("f123".to_string()),
            Token::LeftParen,
            Token::IntLiteral(1),
            Token::Comma,
            Token::IntLiteral(2),
            Token::RightParen,
            Token::Semicolon,
        ]
    );
}

#[test]
fn spans_are_one_indexed() {
    let tokens = tokenize("var x").unwrap();
    assert_eq!(tokens[0].span.start_line, 1);
    assert_eq!(tokens[0].span.start_col, 1);
    assert_eq!(tokens[1].span.start_col, 5);
}

#[test]
fn unexpected_character_reports_position() {
    let err = tokenize("var #").unwrap_err();
    assert!(err.contains("1:5"), "error should name the offset: {}", err);
}
