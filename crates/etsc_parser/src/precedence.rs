//! Operator precedence for binary operators.

use etsc_ast::BinaryOp;
use etsc_scanner::TokenKind;

/// Precedence levels from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum OperatorPrecedence {
    Lowest = 0,
    NullishCoalescing = 1,
    LogicalOr = 2,
    LogicalAnd = 3,
    BitwiseOr = 4,
    BitwiseXor = 5,
    BitwiseAnd = 6,
    Equality = 7,
    /// Comparisons plus `instanceof` and `as`.
    Relational = 8,
    Shift = 9,
    Additive = 10,
    Multiplicative = 11,
    Invalid = 255,
}

/// Precedence of `kind` when it appears between two operands.
pub fn get_binary_operator_precedence(kind: TokenKind) -> OperatorPrecedence {
    match kind {
        TokenKind::QuestionQuestion => OperatorPrecedence::NullishCoalescing,
        TokenKind::BarBar => OperatorPrecedence::LogicalOr,
        TokenKind::AmpersandAmpersand => OperatorPrecedence::LogicalAnd,
        TokenKind::Bar => OperatorPrecedence::BitwiseOr,
        TokenKind::Caret => OperatorPrecedence::BitwiseXor,
        TokenKind::Ampersand => OperatorPrecedence::BitwiseAnd,
        TokenKind::EqualsEquals
        | TokenKind::ExclamationEquals
        | TokenKind::EqualsEqualsEquals
        | TokenKind::ExclamationEqualsEquals => OperatorPrecedence::Equality,
        TokenKind::Less
        | TokenKind::Greater
        | TokenKind::LessEquals
        | TokenKind::GreaterEquals
        | TokenKind::Instanceof => OperatorPrecedence::Relational,
        TokenKind::LessLess | TokenKind::GreaterGreater | TokenKind::GreaterGreaterGreater => OperatorPrecedence::Shift,
        TokenKind::Plus | TokenKind::Minus => OperatorPrecedence::Additive,
        TokenKind::Asterisk | TokenKind::Slash | TokenKind::Percent => OperatorPrecedence::Multiplicative,
        _ => OperatorPrecedence::Invalid,
    }
}

pub fn binary_operator(kind: TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::QuestionQuestion => BinaryOp::Nullish,
        TokenKind::BarBar => BinaryOp::LogicalOr,
        TokenKind::AmpersandAmpersand => BinaryOp::LogicalAnd,
        TokenKind::Bar => BinaryOp::BitOr,
        TokenKind::Caret => BinaryOp::BitXor,
        TokenKind::Ampersand => BinaryOp::BitAnd,
        TokenKind::EqualsEquals => BinaryOp::Eq,
        TokenKind::ExclamationEquals => BinaryOp::NotEq,
        TokenKind::EqualsEqualsEquals => BinaryOp::StrictEq,
        TokenKind::ExclamationEqualsEquals => BinaryOp::StrictNotEq,
        TokenKind::Less => BinaryOp::Lt,
        TokenKind::Greater => BinaryOp::Gt,
        TokenKind::LessEquals => BinaryOp::Le,
        TokenKind::GreaterEquals => BinaryOp::Ge,
        TokenKind::LessLess => BinaryOp::Shl,
        TokenKind::GreaterGreater => BinaryOp::Shr,
        TokenKind::GreaterGreaterGreater => BinaryOp::UShr,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Asterisk => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        _ => return None,
    })
}

/// The binary operator a compound assignment token applies.
pub fn compound_assignment_operator(kind: TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::PlusEquals => BinaryOp::Add,
        TokenKind::MinusEquals => BinaryOp::Sub,
        TokenKind::AsteriskEquals => BinaryOp::Mul,
        TokenKind::SlashEquals => BinaryOp::Div,
        TokenKind::PercentEquals => BinaryOp::Mod,
        TokenKind::LessLessEquals => BinaryOp::Shl,
        TokenKind::GreaterGreaterEquals => BinaryOp::Shr,
        TokenKind::GreaterGreaterGreaterEquals => BinaryOp::UShr,
        TokenKind::AmpersandEquals => BinaryOp::BitAnd,
        TokenKind::BarEquals => BinaryOp::BitOr,
        TokenKind::CaretEquals => BinaryOp::BitXor,
        TokenKind::QuestionQuestionEquals => BinaryOp::Nullish,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplicative_binds_tighter_than_additive() {
        assert!(
            get_binary_operator_precedence(TokenKind::Asterisk) > get_binary_operator_precedence(TokenKind::Plus)
        );
        assert_eq!(get_binary_operator_precedence(TokenKind::Comma), OperatorPrecedence::Invalid);
    }
}
