//! etsc_diagnostics: Diagnostic messages and error reporting infrastructure.
//!
//! Every user-facing error the compiler can produce is declared once in
//! [`messages`] as a templated [`DiagnosticMessage`]. Stages render a
//! template with positional `{0}` arguments and attach a file position.

use etsc_core::text::{SourcePosition, TextSpan};
use std::fmt;

/// The stage that produced a diagnostic. Rendered as the message prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    SyntaxError,
    SemanticError,
    TypeError,
    Warning,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::SyntaxError => write!(f, "SyntaxError"),
            DiagnosticCategory::SemanticError => write!(f, "SemanticError"),
            DiagnosticCategory::TypeError => write!(f, "TypeError"),
            DiagnosticCategory::Warning => write!(f, "Warning"),
        }
    }
}

/// A diagnostic message template with a code and category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    /// May contain `{0}`, `{1}`, ... placeholders.
    pub message: &'static str,
}

impl DiagnosticMessage {
    pub fn format(&self, args: &[&str]) -> String {
        format_message(self.message, args)
    }
}

/// A realized diagnostic with location information and resolved message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: Option<String>,
    pub span: Option<TextSpan>,
    /// Line and column of `span.start`, when the file text was available.
    pub position: Option<SourcePosition>,
    pub message_text: String,
    pub code: u32,
    pub category: DiagnosticCategory,
}

impl Diagnostic {
    /// Create a diagnostic without location info.
    pub fn new(message: &DiagnosticMessage, args: &[&str]) -> Self {
        Self {
            file: None,
            span: None,
            position: None,
            message_text: message.format(args),
            code: message.code,
            category: message.category,
        }
    }

    pub fn with_location(
        file: impl Into<String>,
        span: TextSpan,
        position: SourcePosition,
        message: &DiagnosticMessage,
        args: &[&str],
    ) -> Self {
        Self {
            file: Some(file.into()),
            span: Some(span),
            position: Some(position),
            message_text: message.format(args),
            code: message.code,
            category: message.category,
        }
    }

    /// Build a diagnostic from text that was already rendered elsewhere.
    pub fn from_rendered(
        category: DiagnosticCategory,
        code: u32,
        message_text: String,
        file: Option<String>,
        span: Option<TextSpan>,
        position: Option<SourcePosition>,
    ) -> Self {
        Self { file, span, position, message_text, code, category }
    }

    pub fn is_error(&self) -> bool {
        self.category != DiagnosticCategory::Warning
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message_text)?;
        match (&self.file, self.position) {
            (Some(file), Some(pos)) => write!(f, " [{}:{}:{}]", file, pos.line, pos.column),
            (Some(file), None) => write!(f, " [{}]", file),
            _ => Ok(()),
        }
    }
}

/// Replace `{0}`, `{1}`, ... in `template` with `args`.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}');
        let index = close.and_then(|c| after[..c].parse::<usize>().ok());
        match (close, index) {
            (Some(c), Some(i)) if i < args.len() => {
                result.push_str(args[i]);
                rest = &after[c + 1..];
            }
            _ => {
                result.push('{');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

/// Diagnostics accumulated by the parser and binder, which keep going after
/// an error. The checker stops at its first error instead.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCollection {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self { diagnostics: Vec::new() }
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.diagnostics.iter().find(|d| d.is_error())
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn extend(&mut self, other: DiagnosticCollection) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// Sort by file, then by position.
    pub fn sort(&mut self) {
        self.diagnostics.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then_with(|| a.span.map(|s| s.start).cmp(&b.span.map(|s| s.start)))
        });
    }
}

// ============================================================================
// Diagnostic Messages
// ============================================================================

pub mod messages {
    use super::*;

    macro_rules! diag {
        ($code:expr, Syntax, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::SyntaxError, message: $msg }
        };
        ($code:expr, Semantic, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::SemanticError, message: $msg }
        };
        ($code:expr, Type, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::TypeError, message: $msg }
        };
    }

    // ========================================================================
    // Scanner and parser errors (1000-1099)
    // ========================================================================
    pub const _0_EXPECTED: DiagnosticMessage = diag!(1002, Syntax, "'{0}' expected.");
    pub const IDENTIFIER_EXPECTED: DiagnosticMessage = diag!(1003, Syntax, "Identifier expected.");
    pub const UNTERMINATED_STRING_LITERAL: DiagnosticMessage = diag!(1004, Syntax, "Unterminated string literal.");
    pub const INVALID_CHARACTER: DiagnosticMessage = diag!(1005, Syntax, "Invalid character.");
    pub const EXPRESSION_EXPECTED: DiagnosticMessage = diag!(1006, Syntax, "Expression expected.");
    pub const TYPE_EXPECTED: DiagnosticMessage = diag!(1007, Syntax, "Type expected.");
    pub const ASTERISK_SLASH_EXPECTED: DiagnosticMessage = diag!(1008, Syntax, "'*/' expected.");
    pub const INVALID_NUMERIC_LITERAL_0: DiagnosticMessage = diag!(1009, Syntax, "Invalid numeric literal '{0}'.");
    pub const INVALID_CHAR_LITERAL: DiagnosticMessage = diag!(1010, Syntax, "Invalid character literal.");
    pub const A_REST_PARAMETER_MUST_BE_LAST: DiagnosticMessage = diag!(1011, Syntax, "A rest parameter must be last in a parameter list.");
    pub const INVALID_ASSIGNMENT_TARGET: DiagnosticMessage = diag!(1012, Syntax, "Invalid left-hand side in assignment expression.");
    pub const DECLARATION_OR_STATEMENT_EXPECTED: DiagnosticMessage = diag!(1013, Syntax, "Declaration or statement expected.");
    pub const CONST_WITHOUT_INITIALIZER: DiagnosticMessage = diag!(1014, Syntax, "Missing initializer in const declaration.");
    pub const TRY_WITHOUT_CATCH_OR_FINALLY: DiagnosticMessage = diag!(1015, Syntax, "A try statement should contain either finally clause or at least one catch clause.");

    // ========================================================================
    // Binder errors (2000-2099)
    // ========================================================================
    pub const VARIABLE_0_ALREADY_DECLARED: DiagnosticMessage = diag!(2001, Semantic, "Variable '{0}' has already been declared.");
    pub const CANNOT_FIND_MODULE_0: DiagnosticMessage = diag!(2002, Semantic, "Cannot find module '{0}'.");
    pub const MODULE_0_HAS_NO_EXPORTED_MEMBER_1: DiagnosticMessage = diag!(2003, Semantic, "Module '{0}' has no exported member '{1}'.");
    pub const CONTROL_FLOW_OUTSIDE_LOOP: DiagnosticMessage = diag!(2004, Semantic, "Control flow redirection statement can not be used out of loop.");
    pub const RETURN_OUTSIDE_FUNCTION: DiagnosticMessage = diag!(2005, Semantic, "Return statement is not allowed outside of a function.");

    // ========================================================================
    // Name and member resolution (3000-3049)
    // ========================================================================
    pub const UNRESOLVED_REFERENCE_0: DiagnosticMessage = diag!(3001, Type, "Unresolved reference {0}");
    pub const PROPERTY_0_DOES_NOT_EXIST_ON_TYPE_1: DiagnosticMessage = diag!(3002, Type, "Property '{0}' does not exist on type '{1}'");
    pub const MEMBER_TYPE_MUST_BE_SAME_FOR_UNION: DiagnosticMessage = diag!(3003, Type, "Member type must be the same for all union objects.");
    pub const VALUE_IS_POSSIBLY_NULLISH: DiagnosticMessage = diag!(3004, Type, "Value is possibly nullish.");
    pub const _0_IS_NOT_A_TYPE: DiagnosticMessage = diag!(3005, Type, "'{0}' is not a type.");
    pub const _0_IS_A_STATIC_PROPERTY_OF_1: DiagnosticMessage = diag!(3006, Type, "'{0}' is a static property of '{1}'");
    pub const _0_IS_AN_INSTANCE_PROPERTY_OF_1: DiagnosticMessage = diag!(3007, Type, "'{0}' is an instance property of '{1}'");
    pub const PROPERTY_0_IS_NOT_VISIBLE_HERE: DiagnosticMessage = diag!(3008, Type, "Property {0} is not visible here.");
    pub const CIRCULAR_DEPENDENCY_FOR_0: DiagnosticMessage = diag!(3009, Type, "Circular dependency detected for identifier: {0}");
    pub const CANNOT_REFERENCE_THIS: DiagnosticMessage = diag!(3010, Type, "Cannot reference 'this' in this context.");
    pub const CANNOT_INFER_TYPE_OF_0: DiagnosticMessage = diag!(3011, Type, "Cannot deduce type of '{0}' without an initializer.");
    pub const CIRCULAR_TYPE_ALIAS_0: DiagnosticMessage = diag!(3012, Type, "Circular type alias reference: {0}");
    pub const VALUE_0_USED_AS_TYPE: DiagnosticMessage = diag!(3013, Type, "'{0}' refers to a value, but is being used as a type here.");
    pub const TYPE_0_USED_AS_VALUE: DiagnosticMessage = diag!(3014, Type, "'{0}' only refers to a type, but is being used as a value here.");

    // ========================================================================
    // Assignability and calls (3050-3099)
    // ========================================================================
    pub const TYPE_0_NOT_COMPATIBLE_WITH_1: DiagnosticMessage = diag!(3050, Type, "Type '{0}' is not compatible with type '{1}'");
    pub const REFERENCE_TO_0_IS_AMBIGUOUS: DiagnosticMessage = diag!(3052, Type, "Reference to {0} is ambiguous");
    pub const NO_MATCHING_CALL_SIGNATURE_FOR_0: DiagnosticMessage = diag!(3053, Type, "No matching call signature for {0}");
    pub const TYPE_0_HAS_NO_CALL_SIGNATURES: DiagnosticMessage = diag!(3054, Type, "Type '{0}' has no call signatures.");
    pub const EXPECTED_0_TYPE_ARGUMENTS_GOT_1: DiagnosticMessage = diag!(3055, Type, "Expected {0} type arguments, got {1}.");
    pub const TYPE_ARGUMENT_0_NOT_ASSIGNABLE_TO_CONSTRAINT_1: DiagnosticMessage = diag!(3056, Type, "Type '{0}' is not assignable to constraint type '{1}'.");
    pub const CANNOT_INFER_TYPE_ARGUMENT_0: DiagnosticMessage = diag!(3057, Type, "Cannot infer type argument '{0}' from the call arguments.");
    pub const CANNOT_CAST_0_TO_1: DiagnosticMessage = diag!(3058, Type, "Cannot cast type '{0}' to '{1}'");
    pub const CANNOT_ASSIGN_TO_CONSTANT_0: DiagnosticMessage = diag!(3059, Type, "Cannot assign to a constant variable {0}");
    pub const CANNOT_ASSIGN_TO_READONLY_0: DiagnosticMessage = diag!(3060, Type, "Cannot assign to a readonly property {0}");
    pub const TYPE_0_IS_NOT_GENERIC: DiagnosticMessage = diag!(3061, Type, "Type '{0}' is not generic.");
    pub const _0_IS_ABSTRACT_CANNOT_BE_INSTANTIATED: DiagnosticMessage = diag!(3062, Type, "{0} is abstract therefore cannot be instantiated.");
    pub const EXPRESSION_NOT_CONSTRUCTIBLE: DiagnosticMessage = diag!(3063, Type, "This expression is not constructible.");
    pub const TYPE_0_CANNOT_BE_USED_AS_INDEX: DiagnosticMessage = diag!(3064, Type, "Type '{0}' cannot be used as an index type. Only integral types are allowed.");
    pub const INDEXED_ACCESS_NOT_SUPPORTED: DiagnosticMessage = diag!(3065, Type, "Indexed access is not supported for such expression type.");
    pub const CANNOT_INFER_LAMBDA_PARAMETER_0: DiagnosticMessage = diag!(3066, Type, "The type of parameter '{0}' cannot be inferred");
    pub const VOID_USED_AS_VALUE: DiagnosticMessage = diag!(3067, Type, "Cannot use type 'void' as value.");
    pub const FOR_OF_NOT_ITERABLE: DiagnosticMessage = diag!(3068, Type, "'For-of' statement source expression is not of iterable type.");
    pub const MISSING_RETURN_VALUE: DiagnosticMessage = diag!(3069, Type, "Missing return value.");
    pub const UNEXPECTED_RETURN_VALUE: DiagnosticMessage = diag!(3070, Type, "Unexpected return value, enclosing method return type is void.");
    pub const SUPER_OUTSIDE_DERIVED_CLASS: DiagnosticMessage = diag!(3071, Type, "Call to 'super' is only allowed in the constructor of a derived class.");
    pub const FUNCTION_0_USED_AS_VALUE: DiagnosticMessage = diag!(3072, Type, "Function '{0}' cannot be used as a value.");
    pub const CANNOT_ASSIGN_TO_0: DiagnosticMessage = diag!(3073, Type, "Cannot assign to '{0}'.");

    // ========================================================================
    // Operators (3100-3149)
    // ========================================================================
    pub const BAD_OPERAND_UNIONS_NOT_ALLOWED: DiagnosticMessage = diag!(3100, Type, "Bad operand type, unions are not allowed in binary expressions except equality.");
    pub const BAD_OPERAND_MUST_BE_NUMERIC: DiagnosticMessage = diag!(3101, Type, "Bad operand type, the types of the operands must be numeric type.");
    pub const BAD_OPERAND_MUST_BE_NUMERIC_OR_STRING: DiagnosticMessage = diag!(3102, Type, "Bad operand type, the types of the operands must be numeric type or String.");
    pub const DIVISION_BY_ZERO: DiagnosticMessage = diag!(3103, Type, "Division by zero.");
    pub const BOTH_OPERANDS_MUST_BE_REFERENCES: DiagnosticMessage = diag!(3104, Type, "Both operands have to be reference types");
    pub const STRICT_EQUALITY_NOT_COMPATIBLE: DiagnosticMessage = diag!(3105, Type, "The operands of strict equality are not compatible with each other");
    pub const BAD_OPERAND_MUST_BE_SAME_ENUM: DiagnosticMessage = diag!(3106, Type, "Bad operand type, the types of the operands must be the same enum type.");
    pub const BAD_OPERAND_MUST_BE_SAME_TYPE: DiagnosticMessage = diag!(3107, Type, "Bad operand type, the types of the operands must be same type.");
    pub const LEFT_HAND_SIDE_MUST_BE_REFERENCE: DiagnosticMessage = diag!(3108, Type, "Left-hand side expression must be a reference type.");
    pub const CONDITION_MUST_BE_CONDITION_TYPE: DiagnosticMessage = diag!(3109, Type, "Condition must be of possible condition type");
    pub const VOID_CANNOT_BE_TESTED: DiagnosticMessage = diag!(3110, Type, "An expression of type 'void' cannot be tested for truthiness");
    pub const BAD_OPERAND_OPERAND_MUST_BE_NUMERIC: DiagnosticMessage = diag!(3111, Type, "Bad operand type, the type of the operand must be numeric type.");
    pub const BAD_OPERAND_OPERAND_MUST_BE_INTEGRAL: DiagnosticMessage = diag!(3112, Type, "Bad operand type, the type of the operand must be integral type.");
    pub const INVALID_UPDATE_TARGET: DiagnosticMessage = diag!(3113, Type, "Invalid left-hand side of update expression.");
    pub const BAD_OPERAND_MUST_BE_INTEGRAL: DiagnosticMessage = diag!(3114, Type, "Bad operand type, the types of the operands must be integral type.");

    // ========================================================================
    // Statements and control flow (3150-3199)
    // ========================================================================
    pub const UNREACHABLE_STATEMENT: DiagnosticMessage = diag!(3150, Type, "Unreachable statement.");
    pub const FUNCTION_MUST_RETURN_VALUE: DiagnosticMessage = diag!(3151, Type, "Function with a non void return type must return a value.");
    pub const ARGUMENT_MUST_BE_EXCEPTION: DiagnosticMessage = diag!(3152, Type, "Argument must be an instance of 'Exception' or 'Error'");
    pub const REDECLARATION_OF_EXCEPTION_TYPE: DiagnosticMessage = diag!(3153, Type, "Redeclaration of exception type");

    // ========================================================================
    // Declarations (3200-3249)
    // ========================================================================
    pub const ENUM_MEMBERS_MUST_BE_SAME_KIND_0: DiagnosticMessage = diag!(3200, Type, "Enumeration '{0}' mixes numeric and string members.");
    pub const INVALID_ENUM_INITIALIZER: DiagnosticMessage = diag!(3201, Type, "Invalid enum initialization value");
    pub const _0_NOT_ABSTRACT_DOES_NOT_OVERRIDE_1_IN_2: DiagnosticMessage = diag!(3202, Type, "{0} is not abstract and does not override abstract method {1} in {2}");
    pub const _0_IN_1_CANNOT_OVERRIDE_0_IN_2: DiagnosticMessage = diag!(3203, Type, "{0} in {1} cannot override {0} in {2}");
    pub const CYCLIC_INHERITANCE_INVOLVING_0: DiagnosticMessage = diag!(3204, Type, "Cyclic inheritance involving {0}.");
    pub const ASYNC_MUST_RETURN_PROMISE: DiagnosticMessage = diag!(3205, Type, "Return type of async function must be 'Promise'.");
    pub const AWAIT_REQUIRES_PROMISE: DiagnosticMessage = diag!(3206, Type, "'await' expressions require Promise object as argument.");
    pub const CLASS_COMPOSITE_NEEDS_OBJECT_TYPE: DiagnosticMessage = diag!(3207, Type, "Target type for class composite needs to be an object type");
    pub const TYPE_0_HAS_NO_PARAMETERLESS_CONSTRUCTOR: DiagnosticMessage = diag!(3208, Type, "type {0} has no parameterless constructor");
    pub const TYPE_0_HAS_NO_PROPERTY_NAMED_1: DiagnosticMessage = diag!(3209, Type, "type {0} has no property named {1}");
    pub const EXTENDS_MUST_BE_CLASS: DiagnosticMessage = diag!(3210, Type, "The super type of '{0}' class is not extensible.");
    pub const IMPLEMENTS_MUST_BE_INTERFACE: DiagnosticMessage = diag!(3211, Type, "Interface expected here.");
    pub const NATIVE_WITH_BODY_0: DiagnosticMessage = diag!(3212, Type, "Native method '{0}' cannot have a body.");
    pub const MISSING_BODY_0: DiagnosticMessage = diag!(3213, Type, "Only abstract or native methods can't have body: '{0}'.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_message() {
        let text = format_message("Type '{0}' is not compatible with type '{1}'", &["int", "String"]);
        assert_eq!(text, "Type 'int' is not compatible with type 'String'");
    }

    #[test]
    fn test_format_message_leaves_unknown_placeholders() {
        assert_eq!(format_message("a {1} {x}", &["z"]), "a {1} {x}");
        assert_eq!(format_message("{0}{0}", &["ab"]), "abab");
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::with_location(
            "main.ets",
            TextSpan::new(10, 5),
            SourcePosition { line: 2, column: 3, offset: 10 },
            &messages::UNRESOLVED_REFERENCE_0,
            &["foo"],
        );
        assert_eq!(format!("{}", diag), "TypeError: Unresolved reference foo [main.ets:2:3]");
        assert_eq!(diag.code, 3001);
    }

    #[test]
    fn test_diagnostic_without_location() {
        let diag = Diagnostic::new(&messages::EXPRESSION_EXPECTED, &[]);
        assert!(diag.file.is_none());
        assert!(diag.span.is_none());
        assert_eq!(format!("{}", diag), "SyntaxError: Expression expected.");
        assert!(diag.is_error());
    }

    #[test]
    fn test_diagnostic_collection_sort() {
        let mut collection = DiagnosticCollection::new();
        let pos = SourcePosition::default();
        collection.add(Diagnostic::with_location("b.ets", TextSpan::new(10, 1), pos, &messages::IDENTIFIER_EXPECTED, &[]));
        collection.add(Diagnostic::with_location("a.ets", TextSpan::new(5, 1), pos, &messages::IDENTIFIER_EXPECTED, &[]));
        collection.sort();
        assert_eq!(collection.diagnostics()[0].file.as_deref(), Some("a.ets"));
        assert_eq!(collection.error_count(), 2);
        assert!(collection.first_error().is_some());
    }
}
