//! Token kinds produced by the scanner.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TokenFlags: u16 {
        const NONE                 = 0;
        const PRECEDING_LINE_BREAK = 1 << 0;
        /// Numeric literal with a fraction or exponent.
        const FLOATING             = 1 << 1;
        /// Numeric literal with an `f` suffix.
        const FLOAT_SUFFIX         = 1 << 2;
        const HEX                  = 1 << 3;
        const BINARY               = 1 << 4;
        const OCTAL                = 1 << 5;
        const UNTERMINATED         = 1 << 6;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    EndOfFile,
    Unknown,

    Identifier,
    NumericLiteral,
    StringLiteral,
    CharLiteral,

    // Punctuation
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Semicolon,
    Comma,
    Dot,
    DotDotDot,
    Question,
    QuestionDot,
    QuestionQuestion,
    Colon,
    Arrow,
    At,

    // Operators
    Less,
    Greater,
    LessEquals,
    GreaterEquals,
    LessLess,
    GreaterGreater,
    GreaterGreaterGreater,
    EqualsEquals,
    ExclamationEquals,
    EqualsEqualsEquals,
    ExclamationEqualsEquals,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Ampersand,
    Bar,
    Caret,
    Exclamation,
    Tilde,
    AmpersandAmpersand,
    BarBar,

    // Assignment
    Equals,
    PlusEquals,
    MinusEquals,
    AsteriskEquals,
    SlashEquals,
    PercentEquals,
    LessLessEquals,
    GreaterGreaterEquals,
    GreaterGreaterGreaterEquals,
    AmpersandEquals,
    BarEquals,
    CaretEquals,
    QuestionQuestionEquals,

    // Reserved words
    Await,
    Break,
    Catch,
    Class,
    Const,
    Continue,
    Do,
    Else,
    Enum,
    Export,
    Extends,
    False,
    Finally,
    For,
    Function,
    If,
    Implements,
    Import,
    Instanceof,
    Interface,
    Let,
    New,
    Null,
    Return,
    Super,
    This,
    Throw,
    True,
    Try,
    Typeof,
    Undefined,
    While,
}

impl TokenKind {
    pub fn keyword(text: &str) -> Option<TokenKind> {
        Some(match text {
            "await" => TokenKind::Await,
            "break" => TokenKind::Break,
            "catch" => TokenKind::Catch,
            "class" => TokenKind::Class,
            "const" => TokenKind::Const,
            "continue" => TokenKind::Continue,
            "do" => TokenKind::Do,
            "else" => TokenKind::Else,
            "enum" => TokenKind::Enum,
            "export" => TokenKind::Export,
            "extends" => TokenKind::Extends,
            "false" => TokenKind::False,
            "finally" => TokenKind::Finally,
            "for" => TokenKind::For,
            "function" => TokenKind::Function,
            "if" => TokenKind::If,
            "implements" => TokenKind::Implements,
            "import" => TokenKind::Import,
            "instanceof" => TokenKind::Instanceof,
            "interface" => TokenKind::Interface,
            "let" => TokenKind::Let,
            "new" => TokenKind::New,
            "null" => TokenKind::Null,
            "return" => TokenKind::Return,
            "super" => TokenKind::Super,
            "this" => TokenKind::This,
            "throw" => TokenKind::Throw,
            "true" => TokenKind::True,
            "try" => TokenKind::Try,
            "typeof" => TokenKind::Typeof,
            "undefined" => TokenKind::Undefined,
            "while" => TokenKind::While,
            _ => return None,
        })
    }

    pub fn is_keyword(self) -> bool {
        self >= TokenKind::Await
    }

    pub fn is_assignment(self) -> bool {
        (TokenKind::Equals..=TokenKind::QuestionQuestionEquals).contains(&self)
    }

    /// Source text of a fixed token, used in "expected" diagnostics.
    pub fn text(self) -> &'static str {
        match self {
            TokenKind::EndOfFile => "end of file",
            TokenKind::Unknown => "unknown",
            TokenKind::Identifier => "identifier",
            TokenKind::NumericLiteral => "number",
            TokenKind::StringLiteral => "string",
            TokenKind::CharLiteral => "char",
            TokenKind::OpenParen => "(",
            TokenKind::CloseParen => ")",
            TokenKind::OpenBrace => "{",
            TokenKind::CloseBrace => "}",
            TokenKind::OpenBracket => "[",
            TokenKind::CloseBracket => "]",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::DotDotDot => "...",
            TokenKind::Question => "?",
            TokenKind::QuestionDot => "?.",
            TokenKind::QuestionQuestion => "??",
            TokenKind::Colon => ":",
            TokenKind::Arrow => "=>",
            TokenKind::At => "@",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::LessEquals => "<=",
            TokenKind::GreaterEquals => ">=",
            TokenKind::LessLess => "<<",
            TokenKind::GreaterGreater => ">>",
            TokenKind::GreaterGreaterGreater => ">>>",
            TokenKind::EqualsEquals => "==",
            TokenKind::ExclamationEquals => "!=",
            TokenKind::EqualsEqualsEquals => "===",
            TokenKind::ExclamationEqualsEquals => "!==",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Ampersand => "&",
            TokenKind::Bar => "|",
            TokenKind::Caret => "^",
            TokenKind::Exclamation => "!",
            TokenKind::Tilde => "~",
            TokenKind::AmpersandAmpersand => "&&",
            TokenKind::BarBar => "||",
            TokenKind::Equals => "=",
            TokenKind::PlusEquals => "+=",
            TokenKind::MinusEquals => "-=",
            TokenKind::AsteriskEquals => "*=",
            TokenKind::SlashEquals => "/=",
            TokenKind::PercentEquals => "%=",
            TokenKind::LessLessEquals => "<<=",
            TokenKind::GreaterGreaterEquals => ">>=",
            TokenKind::GreaterGreaterGreaterEquals => ">>>=",
            TokenKind::AmpersandEquals => "&=",
            TokenKind::BarEquals => "|=",
            TokenKind::CaretEquals => "^=",
            TokenKind::QuestionQuestionEquals => "??=",
            TokenKind::Await => "await",
            TokenKind::Break => "break",
            TokenKind::Catch => "catch",
            TokenKind::Class => "class",
            TokenKind::Const => "const",
            TokenKind::Continue => "continue",
            TokenKind::Do => "do",
            TokenKind::Else => "else",
            TokenKind::Enum => "enum",
            TokenKind::Export => "export",
            TokenKind::Extends => "extends",
            TokenKind::False => "false",
            TokenKind::Finally => "finally",
            TokenKind::For => "for",
            TokenKind::Function => "function",
            TokenKind::If => "if",
            TokenKind::Implements => "implements",
            TokenKind::Import => "import",
            TokenKind::Instanceof => "instanceof",
            TokenKind::Interface => "interface",
            TokenKind::Let => "let",
            TokenKind::New => "new",
            TokenKind::Null => "null",
            TokenKind::Return => "return",
            TokenKind::Super => "super",
            TokenKind::This => "this",
            TokenKind::Throw => "throw",
            TokenKind::True => "true",
            TokenKind::Try => "try",
            TokenKind::Typeof => "typeof",
            TokenKind::Undefined => "undefined",
            TokenKind::While => "while",
        }
    }
}
