//! The ETS scanner.

use crate::char_codes::*;
use crate::token::{TokenFlags, TokenKind};
use etsc_core::text::TextSpan;
use etsc_diagnostics::{messages, Diagnostic, DiagnosticCollection, DiagnosticMessage};

/// Saved scanner state for lookahead.
#[derive(Debug, Clone)]
pub struct ScannerState {
    pos: usize,
    token_start: usize,
    token: TokenKind,
    token_value: String,
    token_flags: TokenFlags,
    diagnostic_count: usize,
}

/// Converts ETS source text into tokens.
pub struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    token_start: usize,
    token: TokenKind,
    /// Identifier text, or the decoded value of a string/char literal, or the
    /// digits of a numeric literal.
    token_value: String,
    token_flags: TokenFlags,
    diagnostics: DiagnosticCollection,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            token_start: 0,
            token: TokenKind::Unknown,
            token_value: String::new(),
            token_flags: TokenFlags::NONE,
            diagnostics: DiagnosticCollection::new(),
        }
    }

    #[inline]
    pub fn token(&self) -> TokenKind {
        self.token
    }

    #[inline]
    pub fn token_value(&self) -> &str {
        &self.token_value
    }

    #[inline]
    pub fn token_flags(&self) -> TokenFlags {
        self.token_flags
    }

    #[inline]
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    #[inline]
    pub fn token_end(&self) -> usize {
        self.pos
    }

    pub fn token_span(&self) -> TextSpan {
        TextSpan::from_bounds(self.token_start as u32, self.pos as u32)
    }

    /// Raw source text of the current token.
    pub fn token_text(&self) -> &'a str {
        &self.text[self.token_start..self.pos]
    }

    #[inline]
    pub fn has_preceding_line_break(&self) -> bool {
        self.token_flags.contains(TokenFlags::PRECEDING_LINE_BREAK)
    }

    pub fn take_diagnostics(&mut self) -> DiagnosticCollection {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn save_state(&self) -> ScannerState {
        ScannerState {
            pos: self.pos,
            token_start: self.token_start,
            token: self.token,
            token_value: self.token_value.clone(),
            token_flags: self.token_flags,
            diagnostic_count: self.diagnostics.len(),
        }
    }

    pub fn restore_state(&mut self, state: ScannerState) {
        self.pos = state.pos;
        self.token_start = state.token_start;
        self.token = state.token;
        self.token_value = state.token_value;
        self.token_flags = state.token_flags;
        if self.diagnostics.len() > state.diagnostic_count {
            let mut kept = DiagnosticCollection::new();
            for d in self.diagnostics.diagnostics().iter().take(state.diagnostic_count) {
                kept.add(d.clone());
            }
            self.diagnostics = kept;
        }
    }

    /// Run `f` and rewind to the current token afterwards.
    pub fn look_ahead<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let state = self.save_state();
        let result = f(self);
        self.restore_state(state);
        result
    }

    fn error(&mut self, message: &DiagnosticMessage, args: &[&str]) {
        let span = TextSpan::from_bounds(self.token_start as u32, self.pos.max(self.token_start) as u32);
        let mut diag = Diagnostic::new(message, args);
        diag.span = Some(span);
        self.diagnostics.add(diag);
    }

    // ========================================================================
    // Core scanning
    // ========================================================================

    #[inline]
    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn char_at_pos(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    #[inline]
    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn skip_trivia(&mut self) {
        while let Some(b) = self.byte_at(0) {
            match b {
                b'\n' | b'\r' => {
                    self.token_flags |= TokenFlags::PRECEDING_LINE_BREAK;
                    self.pos += 1;
                }
                b' ' | b'\t' | 0x0B | 0x0C => self.pos += 1,
                b'/' if self.byte_at(1) == Some(b'/') => {
                    self.pos = match memchr::memchr(b'\n', &self.bytes[self.pos..]) {
                        Some(offset) => self.pos + offset,
                        None => self.bytes.len(),
                    };
                }
                b'/' if self.byte_at(1) == Some(b'*') => {
                    let body = &self.bytes[self.pos + 2..];
                    match memchr::memmem::find(body, b"*/") {
                        Some(offset) => {
                            if memchr::memchr(b'\n', &body[..offset]).is_some() {
                                self.token_flags |= TokenFlags::PRECEDING_LINE_BREAK;
                            }
                            self.pos += 2 + offset + 2;
                        }
                        None => {
                            self.token_start = self.pos;
                            self.pos = self.bytes.len();
                            self.error(&messages::ASTERISK_SLASH_EXPECTED, &[]);
                        }
                    }
                }
                0x80..=0xFF => match self.char_at_pos() {
                    Some(ch) if is_white_space_single_line(ch) || is_line_break(ch) => {
                        if is_line_break(ch) {
                            self.token_flags |= TokenFlags::PRECEDING_LINE_BREAK;
                        }
                        self.pos += ch.len_utf8();
                    }
                    _ => return,
                },
                _ => return,
            }
        }
    }

    /// Scan the next token and return its kind.
    pub fn scan(&mut self) -> TokenKind {
        self.token_flags = TokenFlags::NONE;
        self.token_value.clear();
        self.skip_trivia();
        self.token_start = self.pos;

        let Some(b) = self.byte_at(0) else {
            self.token = TokenKind::EndOfFile;
            return self.token;
        };

        self.token = match b {
            b'(' => self.single(TokenKind::OpenParen),
            b')' => self.single(TokenKind::CloseParen),
            b'{' => self.single(TokenKind::OpenBrace),
            b'}' => self.single(TokenKind::CloseBrace),
            b'[' => self.single(TokenKind::OpenBracket),
            b']' => self.single(TokenKind::CloseBracket),
            b';' => self.single(TokenKind::Semicolon),
            b',' => self.single(TokenKind::Comma),
            b':' => self.single(TokenKind::Colon),
            b'~' => self.single(TokenKind::Tilde),
            b'@' => self.single(TokenKind::At),
            b'.' => {
                if self.byte_at(1) == Some(b'.') && self.byte_at(2) == Some(b'.') {
                    self.pos += 3;
                    TokenKind::DotDotDot
                } else if self.byte_at(1).map_or(false, |c| c.is_ascii_digit()) {
                    self.scan_number()
                } else {
                    self.single(TokenKind::Dot)
                }
            }
            b'?' => match (self.byte_at(1), self.byte_at(2)) {
                (Some(b'?'), Some(b'=')) => self.multi(3, TokenKind::QuestionQuestionEquals),
                (Some(b'?'), _) => self.multi(2, TokenKind::QuestionQuestion),
                (Some(b'.'), next) if !next.map_or(false, |c| c.is_ascii_digit()) => {
                    self.multi(2, TokenKind::QuestionDot)
                }
                _ => self.single(TokenKind::Question),
            },
            b'<' => match (self.byte_at(1), self.byte_at(2)) {
                (Some(b'<'), Some(b'=')) => self.multi(3, TokenKind::LessLessEquals),
                (Some(b'<'), _) => self.multi(2, TokenKind::LessLess),
                (Some(b'='), _) => self.multi(2, TokenKind::LessEquals),
                _ => self.single(TokenKind::Less),
            },
            // `>>`, `>=` and friends come from `rescan_greater`.
            b'>' => self.single(TokenKind::Greater),
            b'=' => match (self.byte_at(1), self.byte_at(2)) {
                (Some(b'='), Some(b'=')) => self.multi(3, TokenKind::EqualsEqualsEquals),
                (Some(b'='), _) => self.multi(2, TokenKind::EqualsEquals),
                (Some(b'>'), _) => self.multi(2, TokenKind::Arrow),
                _ => self.single(TokenKind::Equals),
            },
            b'!' => match (self.byte_at(1), self.byte_at(2)) {
                (Some(b'='), Some(b'=')) => self.multi(3, TokenKind::ExclamationEqualsEquals),
                (Some(b'='), _) => self.multi(2, TokenKind::ExclamationEquals),
                _ => self.single(TokenKind::Exclamation),
            },
            b'+' => match self.byte_at(1) {
                Some(b'+') => self.multi(2, TokenKind::PlusPlus),
                Some(b'=') => self.multi(2, TokenKind::PlusEquals),
                _ => self.single(TokenKind::Plus),
            },
            b'-' => match self.byte_at(1) {
                Some(b'-') => self.multi(2, TokenKind::MinusMinus),
                Some(b'=') => self.multi(2, TokenKind::MinusEquals),
                _ => self.single(TokenKind::Minus),
            },
            b'*' => match self.byte_at(1) {
                Some(b'=') => self.multi(2, TokenKind::AsteriskEquals),
                _ => self.single(TokenKind::Asterisk),
            },
            b'/' => match self.byte_at(1) {
                Some(b'=') => self.multi(2, TokenKind::SlashEquals),
                _ => self.single(TokenKind::Slash),
            },
            b'%' => match self.byte_at(1) {
                Some(b'=') => self.multi(2, TokenKind::PercentEquals),
                _ => self.single(TokenKind::Percent),
            },
            b'&' => match self.byte_at(1) {
                Some(b'&') => self.multi(2, TokenKind::AmpersandAmpersand),
                Some(b'=') => self.multi(2, TokenKind::AmpersandEquals),
                _ => self.single(TokenKind::Ampersand),
            },
            b'|' => match self.byte_at(1) {
                Some(b'|') => self.multi(2, TokenKind::BarBar),
                Some(b'=') => self.multi(2, TokenKind::BarEquals),
                _ => self.single(TokenKind::Bar),
            },
            b'^' => match self.byte_at(1) {
                Some(b'=') => self.multi(2, TokenKind::CaretEquals),
                _ => self.single(TokenKind::Caret),
            },
            b'\'' | b'"' => self.scan_string(b),
            b'c' if self.byte_at(1) == Some(b'\'') => self.scan_char(),
            b'0'..=b'9' => self.scan_number(),
            _ => match self.char_at_pos() {
                Some(ch) if is_identifier_start(ch) => self.scan_identifier(),
                Some(ch) => {
                    self.pos += ch.len_utf8();
                    self.error(&messages::INVALID_CHARACTER, &[]);
                    TokenKind::Unknown
                }
                None => TokenKind::EndOfFile,
            },
        };
        self.token
    }

    /// Re-read a `>` token as the longest operator starting at it.
    pub fn rescan_greater(&mut self) -> TokenKind {
        if self.token != TokenKind::Greater {
            return self.token;
        }
        self.token = match (self.byte_at(0), self.byte_at(1), self.byte_at(2)) {
            (Some(b'>'), Some(b'>'), Some(b'=')) => self.multi(3, TokenKind::GreaterGreaterGreaterEquals),
            (Some(b'>'), Some(b'>'), _) => self.multi(2, TokenKind::GreaterGreaterGreater),
            (Some(b'>'), Some(b'='), _) => self.multi(2, TokenKind::GreaterGreaterEquals),
            (Some(b'>'), _, _) => self.multi(1, TokenKind::GreaterGreater),
            (Some(b'='), _, _) => self.multi(1, TokenKind::GreaterEquals),
            _ => TokenKind::Greater,
        };
        self.token
    }

    #[inline]
    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    #[inline]
    fn multi(&mut self, len: usize, kind: TokenKind) -> TokenKind {
        self.pos += len;
        kind
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(ch) = self.char_at_pos() {
            if !is_identifier_part(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        let text = &self.text[start..self.pos];
        self.token_value.push_str(text);
        TokenKind::keyword(text).unwrap_or(TokenKind::Identifier)
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;
        if self.byte_at(0) == Some(b'0') {
            let radix = match self.byte_at(1) {
                Some(b'x' | b'X') => Some((TokenFlags::HEX, 16)),
                Some(b'b' | b'B') => Some((TokenFlags::BINARY, 2)),
                Some(b'o' | b'O') => Some((TokenFlags::OCTAL, 8)),
                _ => None,
            };
            if let Some((flag, radix)) = radix {
                self.pos += 2;
                let digits_start = self.pos;
                while let Some(b) = self.byte_at(0) {
                    if (b as char).is_digit(radix) || b == b'_' {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                self.token_flags |= flag;
                let digits: String = self.text[digits_start..self.pos].chars().filter(|&c| c != '_').collect();
                if digits.is_empty() {
                    let text = self.text;
                    let end = self.pos;
                    self.error(&messages::INVALID_NUMERIC_LITERAL_0, &[&text[start..end]]);
                }
                self.token_value = digits;
                return TokenKind::NumericLiteral;
            }
        }

        self.eat_digits();
        if self.byte_at(0) == Some(b'.') && self.byte_at(1).map_or(false, |c| c.is_ascii_digit()) {
            self.pos += 1;
            self.eat_digits();
            self.token_flags |= TokenFlags::FLOATING;
        }
        if matches!(self.byte_at(0), Some(b'e' | b'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.byte_at(0), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if self.byte_at(0).map_or(false, |c| c.is_ascii_digit()) {
                self.eat_digits();
                self.token_flags |= TokenFlags::FLOATING;
            } else {
                self.pos = save;
            }
        }
        self.token_value = self.text[start..self.pos].chars().filter(|&c| c != '_').collect();
        if self.byte_at(0) == Some(b'f') && !self.byte_at(1).map_or(false, |c| is_identifier_part(c as char)) {
            self.pos += 1;
            self.token_flags |= TokenFlags::FLOAT_SUFFIX;
        }
        TokenKind::NumericLiteral
    }

    fn eat_digits(&mut self) {
        while let Some(b) = self.byte_at(0) {
            if b.is_ascii_digit() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn scan_escape(&mut self) -> Option<char> {
        // Positioned after the backslash.
        let ch = self.char_at_pos()?;
        self.pos += ch.len_utf8();
        Some(match ch {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' => '\0',
            'u' => {
                let braced = self.byte_at(0) == Some(b'{');
                if braced {
                    self.pos += 1;
                }
                let start = self.pos;
                while self.byte_at(0).map_or(false, |b| is_hex_digit(b as char)) && (braced || self.pos - start < 4) {
                    self.pos += 1;
                }
                let code = u32::from_str_radix(&self.text[start..self.pos], 16).ok();
                if braced && self.byte_at(0) == Some(b'}') {
                    self.pos += 1;
                }
                code.and_then(char::from_u32).unwrap_or('\u{FFFD}')
            }
            other => other,
        })
    }

    fn scan_string(&mut self, quote: u8) -> TokenKind {
        self.pos += 1;
        loop {
            match self.byte_at(0) {
                None | Some(b'\n') | Some(b'\r') => {
                    self.token_flags |= TokenFlags::UNTERMINATED;
                    self.error(&messages::UNTERMINATED_STRING_LITERAL, &[]);
                    break;
                }
                Some(b) if b == quote => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    if let Some(ch) = self.scan_escape() {
                        self.token_value.push(ch);
                    }
                }
                Some(_) => {
                    if let Some(ch) = self.char_at_pos() {
                        self.token_value.push(ch);
                        self.pos += ch.len_utf8();
                    }
                }
            }
        }
        TokenKind::StringLiteral
    }

    /// `c'x'`
    fn scan_char(&mut self) -> TokenKind {
        self.pos += 2;
        let value = match self.byte_at(0) {
            Some(b'\\') => {
                self.pos += 1;
                self.scan_escape()
            }
            Some(b'\'') | None => None,
            Some(_) => {
                let ch = self.char_at_pos();
                if let Some(ch) = ch {
                    self.pos += ch.len_utf8();
                }
                ch
            }
        };
        let closed = self.byte_at(0) == Some(b'\'');
        if closed {
            self.pos += 1;
        }
        match value {
            Some(ch) if closed && (ch as u32) <= 0xFFFF => self.token_value.push(ch),
            _ => self.error(&messages::INVALID_CHAR_LITERAL, &[]),
        }
        TokenKind::CharLiteral
    }

    pub fn is_eof_token(&self) -> bool {
        self.token == TokenKind::EndOfFile && self.is_eof()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescan_greater() {
        let mut scanner = Scanner::new("a >>= 2");
        scanner.scan();
        assert_eq!(scanner.scan(), TokenKind::Greater);
        assert_eq!(scanner.rescan_greater(), TokenKind::GreaterGreaterEquals);
        assert_eq!(scanner.scan(), TokenKind::NumericLiteral);
    }

    #[test]
    fn test_look_ahead_restores_position() {
        let mut scanner = Scanner::new("foo bar");
        scanner.scan();
        let next = scanner.look_ahead(|s| {
            s.scan();
            s.token_value().to_string()
        });
        assert_eq!(next, "bar");
        assert_eq!(scanner.token_value(), "foo");
    }
}
