//! Scanner integration tests.

use etsc_scanner::{Scanner, TokenFlags, TokenKind};

/// Helper: scan all tokens from source and return as (kind, value) pairs.
fn scan_all(source: &str) -> Vec<(TokenKind, String)> {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    loop {
        let kind = scanner.scan();
        if kind == TokenKind::EndOfFile {
            break;
        }
        tokens.push((kind, scanner.token_value().to_string()));
    }
    tokens
}

fn scan_kinds(source: &str) -> Vec<TokenKind> {
    scan_all(source).into_iter().map(|(k, _)| k).collect()
}

// ============================================================================
// Trivia
// ============================================================================

#[test]
fn test_empty_and_whitespace() {
    assert!(scan_all("").is_empty());
    assert!(scan_all("  \n\t // comment\n /* block */ ").is_empty());
}

#[test]
fn test_line_break_flag() {
    let mut scanner = Scanner::new("a\nb");
    scanner.scan();
    assert!(!scanner.has_preceding_line_break());
    scanner.scan();
    assert!(scanner.has_preceding_line_break());
}

#[test]
fn test_unterminated_block_comment() {
    let mut scanner = Scanner::new("/* never closed");
    assert_eq!(scanner.scan(), TokenKind::EndOfFile);
    assert!(scanner.take_diagnostics().has_errors());
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_numeric_literals() {
    let tokens = scan_all("42 3.14 0xFF 0b101 1_000 2.5f 1e3");
    let values: Vec<_> = tokens.iter().map(|(_, v)| v.as_str()).collect();
    assert_eq!(values, vec!["42", "3.14", "FF", "101", "1000", "2.5", "1e3"]);
    assert!(tokens.iter().all(|(k, _)| *k == TokenKind::NumericLiteral));
}

#[test]
fn test_float_suffix_flag() {
    let mut scanner = Scanner::new("2.5f");
    scanner.scan();
    assert!(scanner.token_flags().contains(TokenFlags::FLOAT_SUFFIX));
    assert!(scanner.token_flags().contains(TokenFlags::FLOATING));
}

#[test]
fn test_string_escapes() {
    let tokens = scan_all(r#""a\nb" 'it\'s' "A""#);
    assert_eq!(tokens[0].1, "a\nb");
    assert_eq!(tokens[1].1, "it's");
    assert_eq!(tokens[2].1, "A");
}

#[test]
fn test_unterminated_string() {
    let mut scanner = Scanner::new("\"abc\n");
    assert_eq!(scanner.scan(), TokenKind::StringLiteral);
    assert!(scanner.token_flags().contains(TokenFlags::UNTERMINATED));
    assert_eq!(scanner.take_diagnostics().len(), 1);
}

#[test]
fn test_char_literal() {
    let tokens = scan_all("c'x' c'\\n'");
    assert_eq!(tokens[0], (TokenKind::CharLiteral, "x".to_string()));
    assert_eq!(tokens[1], (TokenKind::CharLiteral, "\n".to_string()));
}

// ============================================================================
// Keywords, identifiers and operators
// ============================================================================

#[test]
fn test_keywords_and_identifiers() {
    assert_eq!(
        scan_kinds("let x instanceof undefined of"),
        vec![TokenKind::Let, TokenKind::Identifier, TokenKind::Instanceof, TokenKind::Undefined, TokenKind::Identifier]
    );
}

#[test]
fn test_unicode_identifier() {
    let tokens = scan_all("переменная");
    assert_eq!(tokens, vec![(TokenKind::Identifier, "переменная".to_string())]);
}

#[test]
fn test_operators() {
    assert_eq!(
        scan_kinds("=== !== ?? ?. => ... <<= ++ && ||"),
        vec![
            TokenKind::EqualsEqualsEquals,
            TokenKind::ExclamationEqualsEquals,
            TokenKind::QuestionQuestion,
            TokenKind::QuestionDot,
            TokenKind::Arrow,
            TokenKind::DotDotDot,
            TokenKind::LessLessEquals,
            TokenKind::PlusPlus,
            TokenKind::AmpersandAmpersand,
            TokenKind::BarBar,
        ]
    );
}

#[test]
fn test_greater_is_scanned_alone() {
    assert_eq!(scan_kinds(">>"), vec![TokenKind::Greater, TokenKind::Greater]);
}

#[test]
fn test_invalid_character() {
    let mut scanner = Scanner::new("#");
    assert_eq!(scanner.scan(), TokenKind::Unknown);
    assert!(scanner.take_diagnostics().has_errors());
}
