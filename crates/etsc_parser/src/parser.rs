//! The ETS parser implementation.
//!
//! Recursive descent over the scanner's tokens, with precedence climbing
//! for binary operators. Speculative parses (arrow functions, explicit
//! type arguments, function types) save the scanner state and rewind when
//! the shape does not match.

use etsc_ast::*;
use etsc_core::text::TextSpan;
use etsc_diagnostics::{messages, Diagnostic, DiagnosticCollection, DiagnosticMessage};
use etsc_scanner::{Scanner, ScannerState, TokenFlags, TokenKind};

use crate::precedence::{binary_operator, compound_assignment_operator, get_binary_operator_precedence, OperatorPrecedence};

/// Maximum recursion depth to prevent stack overflow on deeply nested input.
const MAX_RECURSION_DEPTH: u32 = 200;

/// Result of parsing one file.
#[derive(Debug)]
pub struct ParseResult {
    pub program: NodeId,
    pub diagnostics: DiagnosticCollection,
}

/// Register `text` as a file of `ast` and parse it into a program.
pub fn parse_program(
    ast: &mut Ast,
    file_name: &str,
    text: &str,
    kind: ProgramKind,
    module_name: &str,
) -> ParseResult {
    let _span = tracing::debug_span!("parse", file = file_name).entered();
    let file = ast.add_file(file_name, text);
    let parser = Parser::new(ast, text, file, file_name);
    let result = parser.parse(kind, module_name);
    tracing::debug!(errors = result.diagnostics.len(), "parsed");
    result
}

struct Speculation {
    scanner: ScannerState,
    prev_end: u32,
    diagnostic_count: usize,
    errors_reported: usize,
}

/// Parses one source file into nodes of the shared arena.
pub struct Parser<'a> {
    ast: &'a mut Ast,
    scanner: Scanner<'a>,
    file: FileId,
    file_name: String,
    diagnostics: DiagnosticCollection,
    /// End of the previous token, used to close node spans.
    prev_end: u32,
    recursion_depth: u32,
    /// Counts every reported error, including ones deduplicated away.
    errors_reported: usize,
}

impl<'a> Parser<'a> {
    pub fn new(ast: &'a mut Ast, text: &'a str, file: FileId, file_name: &str) -> Self {
        Self {
            ast,
            scanner: Scanner::new(text),
            file,
            file_name: file_name.to_string(),
            diagnostics: DiagnosticCollection::new(),
            prev_end: 0,
            recursion_depth: 0,
            errors_reported: 0,
        }
    }

    pub fn parse(mut self, kind: ProgramKind, module_name: &str) -> ParseResult {
        self.next_token();
        let mut statements = Vec::new();
        while self.current_token() != TokenKind::EndOfFile {
            let before = self.token_pos();
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => self.skip_to_next_statement(before),
            }
        }
        let end = self.scanner.token_end() as u32;
        let program = self.ast.alloc_with_parents(
            NodeKind::Program { file: self.file, module_name: module_name.to_string(), kind, statements },
            TextSpan::new(0, end),
        );
        self.ast.set_parents_recursive(program);
        self.ast.add_program(program);

        let mut diagnostics = self.scanner.take_diagnostics();
        diagnostics.extend(std::mem::take(&mut self.diagnostics));
        let line_index = &self.ast.file(self.file).line_index;
        let mut located = DiagnosticCollection::new();
        for mut diag in diagnostics.into_diagnostics() {
            diag.file = Some(self.file_name.clone());
            if let Some(span) = diag.span {
                diag.position = Some(line_index.position(span.start));
            }
            located.add(diag);
        }
        located.sort();
        ParseResult { program, diagnostics: located }
    }

    // ========================================================================
    // Token management
    // ========================================================================

    #[inline]
    fn current_token(&self) -> TokenKind {
        self.scanner.token()
    }

    fn next_token(&mut self) -> TokenKind {
        self.prev_end = self.scanner.token_end() as u32;
        self.scanner.scan()
    }

    #[inline]
    fn token_pos(&self) -> u32 {
        self.scanner.token_start() as u32
    }

    #[inline]
    fn token_value(&self) -> &str {
        self.scanner.token_value()
    }

    fn span_from(&self, start: u32) -> TextSpan {
        TextSpan::from_bounds(start, self.prev_end.max(start))
    }

    fn is_identifier_text(&self, text: &str) -> bool {
        self.current_token() == TokenKind::Identifier && self.token_value() == text
    }

    fn error(&mut self, message: &DiagnosticMessage, args: &[&str]) {
        let span = self.scanner.token_span();
        self.error_at(span, message, args);
    }

    fn error_at(&mut self, span: TextSpan, message: &DiagnosticMessage, args: &[&str]) {
        self.errors_reported += 1;
        // One error per position keeps cascades out of the output.
        if self.diagnostics.diagnostics().last().and_then(|d| d.span).map(|s| s.start) == Some(span.start) {
            return;
        }
        let mut diag = Diagnostic::new(message, args);
        diag.span = Some(span);
        self.diagnostics.add(diag);
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.current_token() == kind {
            self.next_token();
            true
        } else {
            self.error(&messages::_0_EXPECTED, &[kind.text()]);
            false
        }
    }

    fn optional(&mut self, kind: TokenKind) -> bool {
        if self.current_token() == kind {
            self.next_token();
            true
        } else {
            false
        }
    }

    /// `>` that may be glued to a following `>` or `=` by the scanner later.
    fn expect_greater(&mut self) -> bool {
        self.expect(TokenKind::Greater)
    }

    fn parse_semicolon(&mut self) {
        if self.optional(TokenKind::Semicolon) {
            return;
        }
        if matches!(self.current_token(), TokenKind::CloseBrace | TokenKind::EndOfFile)
            || self.scanner.has_preceding_line_break()
        {
            return;
        }
        self.error(&messages::_0_EXPECTED, &[";"]);
    }

    fn speculate(&self) -> Speculation {
        Speculation {
            scanner: self.scanner.save_state(),
            prev_end: self.prev_end,
            diagnostic_count: self.diagnostics.len(),
            errors_reported: self.errors_reported,
        }
    }

    fn rewind(&mut self, saved: Speculation) {
        self.scanner.restore_state(saved.scanner);
        self.prev_end = saved.prev_end;
        self.errors_reported = saved.errors_reported;
        if self.diagnostics.len() > saved.diagnostic_count {
            let mut kept = DiagnosticCollection::new();
            for d in self.diagnostics.diagnostics().iter().take(saved.diagnostic_count) {
                kept.add(d.clone());
            }
            self.diagnostics = kept;
        }
    }

    fn skip_to_next_statement(&mut self, before: u32) {
        if self.token_pos() == before && self.current_token() != TokenKind::EndOfFile {
            self.next_token();
        }
        loop {
            match self.current_token() {
                TokenKind::EndOfFile => return,
                TokenKind::Semicolon => {
                    self.next_token();
                    return;
                }
                TokenKind::CloseBrace
                | TokenKind::Let
                | TokenKind::Const
                | TokenKind::Function
                | TokenKind::Class
                | TokenKind::Interface
                | TokenKind::Enum
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Import
                | TokenKind::Export => return,
                _ => {
                    self.next_token();
                }
            }
        }
    }

    fn enter(&mut self) -> bool {
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            self.error(&messages::EXPRESSION_EXPECTED, &[]);
            return false;
        }
        true
    }

    fn leave(&mut self) {
        self.recursion_depth -= 1;
    }

    // ========================================================================
    // Identifiers
    // ========================================================================

    fn parse_identifier(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        if self.current_token() != TokenKind::Identifier {
            self.error(&messages::IDENTIFIER_EXPECTED, &[]);
            return None;
        }
        let name = self.ast.interner.intern(self.scanner.token_value());
        self.next_token();
        Some(self.ast.alloc(NodeKind::Identifier { name, variable: None }, self.span_from(start)))
    }

    /// Member names may be reserved words: `a.new`, `{ default: 1 }`.
    fn parse_identifier_name(&mut self) -> Option<NodeId> {
        if self.current_token().is_keyword() {
            let start = self.token_pos();
            let name = self.ast.interner.intern(self.current_token().text());
            self.next_token();
            return Some(self.ast.alloc(NodeKind::Identifier { name, variable: None }, self.span_from(start)));
        }
        self.parse_identifier()
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_statement(&mut self) -> Option<NodeId> {
        if !self.enter() {
            self.leave();
            return None;
        }
        let result = self.parse_statement_inner();
        self.leave();
        result
    }

    fn parse_statement_inner(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        match self.current_token() {
            TokenKind::OpenBrace => self.parse_block(),
            TokenKind::Semicolon => {
                self.next_token();
                Some(self.ast.alloc(NodeKind::Empty, self.span_from(start)))
            }
            TokenKind::Let | TokenKind::Const => self.parse_variable_declaration(start, ModifierFlags::NONE),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break | TokenKind::Continue => {
                let is_break = self.current_token() == TokenKind::Break;
                self.next_token();
                self.parse_semicolon();
                let kind = if is_break { NodeKind::Break } else { NodeKind::Continue };
                Some(self.ast.alloc(kind, self.span_from(start)))
            }
            TokenKind::Return => {
                self.next_token();
                let argument = if matches!(self.current_token(), TokenKind::Semicolon | TokenKind::CloseBrace | TokenKind::EndOfFile)
                    || self.scanner.has_preceding_line_break()
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.parse_semicolon();
                Some(self.ast.alloc_with_parents(NodeKind::Return { argument }, self.span_from(start)))
            }
            TokenKind::Throw => {
                self.next_token();
                let argument = self.parse_expression()?;
                self.parse_semicolon();
                Some(self.ast.alloc_with_parents(NodeKind::Throw { argument }, self.span_from(start)))
            }
            TokenKind::Try => self.parse_try(),
            TokenKind::Import => self.parse_import(),
            TokenKind::Function | TokenKind::Class | TokenKind::Interface | TokenKind::Enum | TokenKind::Export => {
                self.parse_declaration()
            }
            TokenKind::Identifier if self.is_start_of_modified_declaration() => self.parse_declaration(),
            _ => {
                let expression = self.parse_expression()?;
                self.parse_semicolon();
                Some(self.ast.alloc_with_parents(NodeKind::ExpressionStatement { expression }, self.span_from(start)))
            }
        }
    }

    /// `abstract class`, `async function`, `type X = ...` and similar.
    fn is_start_of_modified_declaration(&mut self) -> bool {
        let text = self.token_value().to_string();
        match text.as_str() {
            "type" => self.scanner.look_ahead(|s| s.scan() == TokenKind::Identifier),
            "abstract" | "final" | "native" | "async" | "declare" => self.scanner.look_ahead(|s| {
                matches!(s.scan(), TokenKind::Class | TokenKind::Function | TokenKind::Identifier)
            }),
            _ => false,
        }
    }

    fn parse_declaration_modifiers(&mut self) -> ModifierFlags {
        let mut modifiers = ModifierFlags::NONE;
        loop {
            let flag = match self.current_token() {
                TokenKind::Export => ModifierFlags::EXPORT,
                TokenKind::Identifier => match self.token_value() {
                    "abstract" => ModifierFlags::ABSTRACT,
                    "final" => ModifierFlags::FINAL,
                    "native" => ModifierFlags::NATIVE,
                    "async" => ModifierFlags::ASYNC,
                    "declare" => ModifierFlags::DECLARE,
                    "default" => ModifierFlags::DEFAULT,
                    _ => return modifiers,
                },
                _ => return modifiers,
            };
            let is_modifier = self.scanner.look_ahead(|s| {
                matches!(
                    s.scan(),
                    TokenKind::Class
                        | TokenKind::Function
                        | TokenKind::Interface
                        | TokenKind::Enum
                        | TokenKind::Let
                        | TokenKind::Const
                        | TokenKind::Identifier
                )
            });
            if !is_modifier {
                return modifiers;
            }
            modifiers |= flag;
            self.next_token();
        }
    }

    fn parse_declaration(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        let modifiers = self.parse_declaration_modifiers();
        match self.current_token() {
            TokenKind::Function => self.parse_function_declaration(start, modifiers),
            TokenKind::Class => self.parse_class(start, modifiers),
            TokenKind::Interface => self.parse_interface(start, modifiers),
            TokenKind::Enum => self.parse_enum(start, modifiers),
            TokenKind::Let | TokenKind::Const => self.parse_variable_declaration(start, modifiers),
            TokenKind::Identifier if self.token_value() == "type" => self.parse_type_alias(start, modifiers),
            _ => {
                self.error(&messages::DECLARATION_OR_STATEMENT_EXPECTED, &[]);
                None
            }
        }
    }

    fn parse_block(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        self.expect(TokenKind::OpenBrace);
        let mut statements = Vec::new();
        while !matches!(self.current_token(), TokenKind::CloseBrace | TokenKind::EndOfFile) {
            let before = self.token_pos();
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => self.skip_to_next_statement(before),
            }
        }
        self.expect(TokenKind::CloseBrace);
        Some(self.ast.alloc_with_parents(NodeKind::Block { statements }, self.span_from(start)))
    }

    fn parse_variable_declaration(&mut self, start: u32, modifiers: ModifierFlags) -> Option<NodeId> {
        let declaration = self.parse_variable_declaration_list(start, modifiers, true)?;
        self.parse_semicolon();
        self.ast.node_mut(declaration).span = self.span_from(start);
        Some(declaration)
    }

    fn parse_variable_declaration_list(
        &mut self,
        start: u32,
        modifiers: ModifierFlags,
        require_const_init: bool,
    ) -> Option<NodeId> {
        let kind = if self.current_token() == TokenKind::Const { VariableKind::Const } else { VariableKind::Let };
        self.next_token();
        let mut declarators = Vec::new();
        loop {
            let decl_start = self.token_pos();
            let name = self.parse_identifier()?;
            let type_annotation = if self.optional(TokenKind::Colon) { Some(self.parse_type()?) } else { None };
            let init = if self.optional(TokenKind::Equals) { Some(self.parse_assignment_expression()?) } else { None };
            if require_const_init && kind == VariableKind::Const && init.is_none() && !modifiers.contains(ModifierFlags::DECLARE) {
                let span = self.span_from(decl_start);
                self.error_at(span, &messages::CONST_WITHOUT_INITIALIZER, &[]);
            }
            declarators.push(self.ast.alloc_with_parents(
                NodeKind::VariableDeclarator { name, type_annotation, init },
                self.span_from(decl_start),
            ));
            if !self.optional(TokenKind::Comma) {
                break;
            }
        }
        Some(self.ast.alloc_with_parents(
            NodeKind::VariableDeclaration { kind, declarators, modifiers },
            self.span_from(start),
        ))
    }

    fn parse_if(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        self.next_token();
        self.expect(TokenKind::OpenParen);
        let test = self.parse_expression()?;
        self.expect(TokenKind::CloseParen);
        let consequent = self.parse_statement()?;
        let alternate = if self.optional(TokenKind::Else) { Some(self.parse_statement()?) } else { None };
        Some(self.ast.alloc_with_parents(NodeKind::If { test, consequent, alternate }, self.span_from(start)))
    }

    fn parse_while(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        self.next_token();
        self.expect(TokenKind::OpenParen);
        let test = self.parse_expression()?;
        self.expect(TokenKind::CloseParen);
        let body = self.parse_statement()?;
        Some(self.ast.alloc_with_parents(NodeKind::While { test, body }, self.span_from(start)))
    }

    fn parse_do_while(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        self.next_token();
        let body = self.parse_statement()?;
        self.expect(TokenKind::While);
        self.expect(TokenKind::OpenParen);
        let test = self.parse_expression()?;
        self.expect(TokenKind::CloseParen);
        self.optional(TokenKind::Semicolon);
        Some(self.ast.alloc_with_parents(NodeKind::DoWhile { body, test }, self.span_from(start)))
    }

    fn parse_for(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        self.next_token();
        self.expect(TokenKind::OpenParen);

        let init = match self.current_token() {
            TokenKind::Semicolon => None,
            TokenKind::Let | TokenKind::Const => {
                let decl_start = self.token_pos();
                Some(self.parse_variable_declaration_list(decl_start, ModifierFlags::NONE, false)?)
            }
            _ => {
                let expr_start = self.token_pos();
                let expression = self.parse_expression()?;
                Some(self.ast.alloc_with_parents(NodeKind::ExpressionStatement { expression }, self.span_from(expr_start)))
            }
        };

        if let Some(left) = init {
            if self.is_identifier_text("of") {
                self.next_token();
                let right = self.parse_expression()?;
                self.expect(TokenKind::CloseParen);
                let body = self.parse_statement()?;
                return Some(self.ast.alloc_with_parents(NodeKind::ForOf { left, right, body }, self.span_from(start)));
            }
        }

        self.expect(TokenKind::Semicolon);
        let test = if self.current_token() == TokenKind::Semicolon { None } else { Some(self.parse_expression()?) };
        self.expect(TokenKind::Semicolon);
        let update = if self.current_token() == TokenKind::CloseParen { None } else { Some(self.parse_expression()?) };
        self.expect(TokenKind::CloseParen);
        let body = self.parse_statement()?;
        Some(self.ast.alloc_with_parents(NodeKind::For { init, test, update, body }, self.span_from(start)))
    }

    fn parse_try(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        self.next_token();
        let block = self.parse_block()?;
        let mut handlers = Vec::new();
        while self.current_token() == TokenKind::Catch {
            let catch_start = self.token_pos();
            self.next_token();
            let (param, type_annotation) = if self.optional(TokenKind::OpenParen) {
                let param = self.parse_identifier()?;
                let type_annotation = if self.optional(TokenKind::Colon) { Some(self.parse_type()?) } else { None };
                self.expect(TokenKind::CloseParen);
                (Some(param), type_annotation)
            } else {
                (None, None)
            };
            let body = self.parse_block()?;
            handlers.push(self.ast.alloc_with_parents(
                NodeKind::CatchClause { param, type_annotation, body },
                self.span_from(catch_start),
            ));
        }
        let finalizer = if self.optional(TokenKind::Finally) { Some(self.parse_block()?) } else { None };
        if handlers.is_empty() && finalizer.is_none() {
            let span = self.span_from(start);
            self.error_at(span, &messages::TRY_WITHOUT_CATCH_OR_FINALLY, &[]);
        }
        Some(self.ast.alloc_with_parents(NodeKind::Try { block, handlers, finalizer }, self.span_from(start)))
    }

    fn parse_import(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        self.next_token();
        let mut specifiers = Vec::new();
        self.expect(TokenKind::OpenBrace);
        while !matches!(self.current_token(), TokenKind::CloseBrace | TokenKind::EndOfFile) {
            let spec_start = self.token_pos();
            let imported = self.parse_identifier()?;
            let local = if self.is_identifier_text("as") {
                self.next_token();
                self.parse_identifier()?
            } else {
                let name = self.ast.name_of(imported)?;
                let span = self.ast.span(imported);
                self.ast.alloc(NodeKind::Identifier { name, variable: None }, span)
            };
            specifiers.push(self.ast.alloc_with_parents(
                NodeKind::ImportSpecifier { imported, local },
                self.span_from(spec_start),
            ));
            if !self.optional(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBrace);
        if !self.is_identifier_text("from") {
            self.error(&messages::_0_EXPECTED, &["from"]);
            return None;
        }
        self.next_token();
        if self.current_token() != TokenKind::StringLiteral {
            self.error(&messages::_0_EXPECTED, &["string"]);
            return None;
        }
        let source = self.token_value().to_string();
        self.next_token();
        self.parse_semicolon();
        Some(self.ast.alloc_with_parents(NodeKind::ImportDeclaration { source, specifiers }, self.span_from(start)))
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn parse_function_declaration(&mut self, start: u32, modifiers: ModifierFlags) -> Option<NodeId> {
        self.expect(TokenKind::Function);
        let name = self.parse_identifier()?;
        let mut flags = ScriptFunctionFlags::NONE;
        if modifiers.contains(ModifierFlags::ASYNC) {
            flags |= ScriptFunctionFlags::ASYNC;
        }
        let function = self.parse_function_rest(start, Some(name), flags, modifiers)?;
        Some(self.ast.alloc_with_parents(NodeKind::FunctionDeclaration { function }, self.span_from(start)))
    }

    /// Type parameters, parameters, return type and body.
    fn parse_function_rest(
        &mut self,
        start: u32,
        name: Option<NodeId>,
        flags: ScriptFunctionFlags,
        modifiers: ModifierFlags,
    ) -> Option<NodeId> {
        let type_params = self.parse_type_parameters()?;
        let params = self.parse_parameters()?;
        let return_type = if self.optional(TokenKind::Colon) { Some(self.parse_type()?) } else { None };
        let body = if self.current_token() == TokenKind::OpenBrace {
            Some(self.parse_block()?)
        } else {
            self.parse_semicolon();
            None
        };
        Some(self.ast.alloc_with_parents(
            NodeKind::ScriptFunction {
                name,
                type_params,
                params,
                return_type,
                body,
                flags,
                modifiers,
                signature: None,
                async_impl: None,
            },
            self.span_from(start),
        ))
    }

    fn parse_type_parameters(&mut self) -> Option<Vec<NodeId>> {
        let mut params = Vec::new();
        if !self.optional(TokenKind::Less) {
            return Some(params);
        }
        loop {
            let start = self.token_pos();
            let name = self.parse_identifier()?;
            let constraint = if self.optional(TokenKind::Extends) { Some(self.parse_type()?) } else { None };
            params.push(self.ast.alloc_with_parents(NodeKind::TypeParameter { name, constraint }, self.span_from(start)));
            if !self.optional(TokenKind::Comma) {
                break;
            }
        }
        self.expect_greater();
        Some(params)
    }

    fn parse_parameters(&mut self) -> Option<Vec<NodeId>> {
        let mut params = Vec::new();
        self.expect(TokenKind::OpenParen);
        while !matches!(self.current_token(), TokenKind::CloseParen | TokenKind::EndOfFile) {
            let start = self.token_pos();
            let rest = self.optional(TokenKind::DotDotDot);
            let name = self.parse_identifier()?;
            let optional = self.optional(TokenKind::Question);
            let type_annotation = if self.optional(TokenKind::Colon) { Some(self.parse_type()?) } else { None };
            let init = if self.optional(TokenKind::Equals) { Some(self.parse_assignment_expression()?) } else { None };
            let param = self.ast.alloc_with_parents(
                NodeKind::Parameter { name, type_annotation, init, optional: optional || init.is_some(), rest },
                self.span_from(start),
            );
            params.push(param);
            if !self.optional(TokenKind::Comma) {
                break;
            }
            if rest {
                let span = self.span_from(start);
                self.error_at(span, &messages::A_REST_PARAMETER_MUST_BE_LAST, &[]);
            }
        }
        self.expect(TokenKind::CloseParen);
        Some(params)
    }

    // ========================================================================
    // Classes, interfaces, enums, aliases
    // ========================================================================

    fn parse_class(&mut self, start: u32, modifiers: ModifierFlags) -> Option<NodeId> {
        self.expect(TokenKind::Class);
        let name = self.parse_identifier()?;
        let type_params = self.parse_type_parameters()?;
        let super_class = if self.optional(TokenKind::Extends) { Some(self.parse_type_reference()?) } else { None };
        let mut implements = Vec::new();
        if self.optional(TokenKind::Implements) {
            loop {
                implements.push(self.parse_type_reference()?);
                if !self.optional(TokenKind::Comma) {
                    break;
                }
            }
        }
        let members = self.parse_class_body(false)?;
        Some(self.ast.alloc_with_parents(
            NodeKind::ClassDeclaration { name, type_params, super_class, implements, members, modifiers },
            self.span_from(start),
        ))
    }

    fn parse_class_body(&mut self, is_interface: bool) -> Option<Vec<NodeId>> {
        self.expect(TokenKind::OpenBrace);
        let mut members = Vec::new();
        while !matches!(self.current_token(), TokenKind::CloseBrace | TokenKind::EndOfFile) {
            if self.optional(TokenKind::Semicolon) {
                continue;
            }
            let before = self.token_pos();
            match self.parse_class_member(is_interface) {
                Some(member) => members.push(member),
                None => {
                    if self.token_pos() == before {
                        self.next_token();
                    }
                }
            }
        }
        self.expect(TokenKind::CloseBrace);
        Some(members)
    }

    fn parse_member_modifiers(&mut self) -> ModifierFlags {
        let mut modifiers = ModifierFlags::NONE;
        while self.current_token() == TokenKind::Identifier {
            let flag = match self.token_value() {
                "public" => ModifierFlags::PUBLIC,
                "private" => ModifierFlags::PRIVATE,
                "protected" => ModifierFlags::PROTECTED,
                "static" => ModifierFlags::STATIC,
                "readonly" => ModifierFlags::READONLY,
                "abstract" => ModifierFlags::ABSTRACT,
                "native" => ModifierFlags::NATIVE,
                "async" => ModifierFlags::ASYNC,
                "override" => ModifierFlags::OVERRIDE,
                "final" => ModifierFlags::FINAL,
                _ => break,
            };
            // A modifier keyword directly followed by `(`, `:`, `=` or `;` is a member name.
            let followed_by_name = self.scanner.look_ahead(|s| {
                matches!(s.scan(), TokenKind::Identifier) || s.token().is_keyword()
            });
            if !followed_by_name {
                break;
            }
            modifiers |= flag;
            self.next_token();
        }
        modifiers
    }

    fn parse_class_member(&mut self, is_interface: bool) -> Option<NodeId> {
        let start = self.token_pos();
        let mut modifiers = self.parse_member_modifiers();
        if is_interface {
            modifiers |= ModifierFlags::PUBLIC;
        }

        let mut kind = MethodKind::Method;
        if self.current_token() == TokenKind::Identifier && matches!(self.token_value(), "get" | "set") {
            let is_accessor = self.scanner.look_ahead(|s| {
                let next = s.scan();
                next == TokenKind::Identifier || next.is_keyword()
            });
            if is_accessor {
                kind = if self.token_value() == "get" { MethodKind::Get } else { MethodKind::Set };
                self.next_token();
            }
        }
        if kind == MethodKind::Method && self.is_identifier_text("constructor") {
            kind = MethodKind::Constructor;
        }

        let name = self.parse_identifier_name()?;
        let is_method = kind != MethodKind::Method || matches!(self.current_token(), TokenKind::OpenParen | TokenKind::Less);
        if is_method {
            let mut flags = match kind {
                MethodKind::Constructor => ScriptFunctionFlags::CONSTRUCTOR,
                MethodKind::Get => ScriptFunctionFlags::METHOD | ScriptFunctionFlags::GETTER,
                MethodKind::Set => ScriptFunctionFlags::METHOD | ScriptFunctionFlags::SETTER,
                MethodKind::Method => ScriptFunctionFlags::METHOD,
            };
            if modifiers.contains(ModifierFlags::ASYNC) {
                flags |= ScriptFunctionFlags::ASYNC;
            }
            if is_interface {
                modifiers |= ModifierFlags::ABSTRACT;
            }
            let fn_name = self.ast.name_of(name)?;
            let fn_span = self.ast.span(name);
            let fn_ident = self.ast.alloc(NodeKind::Identifier { name: fn_name, variable: None }, fn_span);
            let function = self.parse_function_rest(start, Some(fn_ident), flags, modifiers)?;
            return Some(self.ast.alloc_with_parents(
                NodeKind::MethodDefinition { name, kind, function, modifiers },
                self.span_from(start),
            ));
        }

        // Field, or interface property.
        self.optional(TokenKind::Question);
        let type_annotation = if self.optional(TokenKind::Colon) { Some(self.parse_type()?) } else { None };
        let init = if self.optional(TokenKind::Equals) { Some(self.parse_assignment_expression()?) } else { None };
        self.parse_semicolon();
        Some(self.ast.alloc_with_parents(
            NodeKind::ClassProperty { name, type_annotation, init, modifiers },
            self.span_from(start),
        ))
    }

    fn parse_interface(&mut self, start: u32, modifiers: ModifierFlags) -> Option<NodeId> {
        self.expect(TokenKind::Interface);
        let name = self.parse_identifier()?;
        let type_params = self.parse_type_parameters()?;
        let mut extends = Vec::new();
        if self.optional(TokenKind::Extends) {
            loop {
                extends.push(self.parse_type_reference()?);
                if !self.optional(TokenKind::Comma) {
                    break;
                }
            }
        }
        let members = self.parse_class_body(true)?;
        Some(self.ast.alloc_with_parents(
            NodeKind::InterfaceDeclaration { name, type_params, extends, members, modifiers },
            self.span_from(start),
        ))
    }

    fn parse_enum(&mut self, start: u32, modifiers: ModifierFlags) -> Option<NodeId> {
        self.expect(TokenKind::Enum);
        let name = self.parse_identifier()?;
        self.expect(TokenKind::OpenBrace);
        let mut members = Vec::new();
        while !matches!(self.current_token(), TokenKind::CloseBrace | TokenKind::EndOfFile) {
            let member_start = self.token_pos();
            let member_name = self.parse_identifier()?;
            let init = if self.optional(TokenKind::Equals) { Some(self.parse_assignment_expression()?) } else { None };
            members.push(self.ast.alloc_with_parents(
                NodeKind::EnumMember { name: member_name, init },
                self.span_from(member_start),
            ));
            if !self.optional(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBrace);
        Some(self.ast.alloc_with_parents(NodeKind::EnumDeclaration { name, members, modifiers }, self.span_from(start)))
    }

    fn parse_type_alias(&mut self, start: u32, modifiers: ModifierFlags) -> Option<NodeId> {
        self.next_token();
        let name = self.parse_identifier()?;
        let type_params = self.parse_type_parameters()?;
        self.expect(TokenKind::Equals);
        let aliased = self.parse_type()?;
        self.parse_semicolon();
        Some(self.ast.alloc_with_parents(
            NodeKind::TypeAlias { name, type_params, aliased, modifiers },
            self.span_from(start),
        ))
    }

    // ========================================================================
    // Types
    // ========================================================================

    fn parse_type(&mut self) -> Option<NodeId> {
        if !self.enter() {
            self.leave();
            return None;
        }
        let result = self.parse_union_type();
        self.leave();
        result
    }

    fn parse_union_type(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        self.optional(TokenKind::Bar);
        let first = self.parse_postfix_type()?;
        if self.current_token() != TokenKind::Bar {
            return Some(first);
        }
        let mut types = vec![first];
        while self.optional(TokenKind::Bar) {
            types.push(self.parse_postfix_type()?);
        }
        Some(self.ast.alloc_with_parents(NodeKind::UnionType { types }, self.span_from(start)))
    }

    fn parse_postfix_type(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        let mut ty = self.parse_primary_type()?;
        while self.current_token() == TokenKind::OpenBracket
            && !self.scanner.has_preceding_line_break()
            && self.scanner.look_ahead(|s| s.scan() == TokenKind::CloseBracket)
        {
            self.next_token();
            self.next_token();
            ty = self.ast.alloc_with_parents(NodeKind::ArrayType { element: ty }, self.span_from(start));
        }
        Some(ty)
    }

    fn parse_primary_type(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        match self.current_token() {
            TokenKind::Null => {
                self.next_token();
                Some(self.ast.alloc(NodeKind::PrimitiveType(TypeKeyword::Null), self.span_from(start)))
            }
            TokenKind::Undefined => {
                self.next_token();
                Some(self.ast.alloc(NodeKind::PrimitiveType(TypeKeyword::Undefined), self.span_from(start)))
            }
            TokenKind::OpenParen => {
                if let Some(function) = self.try_parse_function_type() {
                    return Some(function);
                }
                self.next_token();
                let inner = self.parse_type()?;
                self.expect(TokenKind::CloseParen);
                Some(inner)
            }
            TokenKind::Identifier => {
                if let Some(keyword) = TypeKeyword::from_str(self.token_value()) {
                    self.next_token();
                    return Some(self.ast.alloc(NodeKind::PrimitiveType(keyword), self.span_from(start)));
                }
                self.parse_type_reference()
            }
            _ => {
                self.error(&messages::TYPE_EXPECTED, &[]);
                None
            }
        }
    }

    fn parse_type_reference(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        let name = self.parse_identifier()?;
        let type_args = if self.current_token() == TokenKind::Less { self.parse_type_arguments()? } else { Vec::new() };
        Some(self.ast.alloc_with_parents(NodeKind::TypeReference { name, type_args }, self.span_from(start)))
    }

    fn parse_type_arguments(&mut self) -> Option<Vec<NodeId>> {
        self.expect(TokenKind::Less);
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type()?);
            if !self.optional(TokenKind::Comma) {
                break;
            }
        }
        if !self.expect_greater() {
            return None;
        }
        Some(args)
    }

    /// `(a: A, b: B) => R`
    fn try_parse_function_type(&mut self) -> Option<NodeId> {
        let saved = self.speculate();
        let start = self.token_pos();
        let params = match self.parse_parameters() {
            Some(params) if self.errors_reported == saved.errors_reported && self.current_token() == TokenKind::Arrow => params,
            _ => {
                self.rewind(saved);
                return None;
            }
        };
        self.next_token();
        let return_type = self.parse_type()?;
        Some(self.ast.alloc_with_parents(NodeKind::FunctionType { params, return_type }, self.span_from(start)))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expression(&mut self) -> Option<NodeId> {
        self.parse_assignment_expression()
    }

    fn parse_assignment_expression(&mut self) -> Option<NodeId> {
        if !self.enter() {
            self.leave();
            return None;
        }
        let result = self.parse_assignment_expression_inner();
        self.leave();
        result
    }

    fn parse_assignment_expression_inner(&mut self) -> Option<NodeId> {
        if let Some(arrow) = self.try_parse_arrow_function() {
            return Some(arrow);
        }
        let start = self.token_pos();
        let target = self.parse_conditional_expression()?;
        self.scanner.rescan_greater();
        let token = self.current_token();
        if !token.is_assignment() {
            return Some(target);
        }
        let op = if token == TokenKind::Equals {
            AssignOp::Assign
        } else {
            AssignOp::Compound(compound_assignment_operator(token)?)
        };
        if !matches!(self.ast.kind(target), NodeKind::Identifier { .. } | NodeKind::Member { .. }) {
            let span = self.ast.span(target);
            self.error_at(span, &messages::INVALID_ASSIGNMENT_TARGET, &[]);
        }
        self.next_token();
        let value = self.parse_assignment_expression()?;
        Some(self.ast.alloc_with_parents(
            NodeKind::Assignment { op, target, value, operation_type: None },
            self.span_from(start),
        ))
    }

    fn try_parse_arrow_function(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        let is_async = self.is_identifier_text("async")
            && self.scanner.look_ahead(|s| matches!(s.scan(), TokenKind::OpenParen | TokenKind::Identifier));
        match self.current_token() {
            TokenKind::Identifier if !is_async => {
                if !self.scanner.look_ahead(|s| s.scan() == TokenKind::Arrow) {
                    return None;
                }
                let name = self.parse_identifier()?;
                let span = self.ast.span(name);
                let param = self.ast.alloc_with_parents(
                    NodeKind::Parameter { name, type_annotation: None, init: None, optional: false, rest: false },
                    span,
                );
                self.expect(TokenKind::Arrow);
                self.finish_arrow_function(start, Vec::new(), vec![param], None, ScriptFunctionFlags::ARROW)
            }
            TokenKind::OpenParen | TokenKind::Less | TokenKind::Identifier => {
                let saved = self.speculate();
                if is_async {
                    self.next_token();
                }
                let parsed = self.parse_type_parameters().and_then(|type_params| {
                    let params = self.parse_parameters()?;
                    let return_type = if self.optional(TokenKind::Colon) { Some(self.parse_type()?) } else { None };
                    Some((type_params, params, return_type))
                });
                match parsed {
                    Some((type_params, params, return_type))
                        if self.current_token() == TokenKind::Arrow && self.errors_reported == saved.errors_reported =>
                    {
                        self.next_token();
                        let mut flags = ScriptFunctionFlags::ARROW;
                        if is_async {
                            flags |= ScriptFunctionFlags::ASYNC;
                        }
                        self.finish_arrow_function(start, type_params, params, return_type, flags)
                    }
                    _ => {
                        self.rewind(saved);
                        None
                    }
                }
            }
            _ => None,
        }
    }

    fn finish_arrow_function(
        &mut self,
        start: u32,
        type_params: Vec<NodeId>,
        params: Vec<NodeId>,
        return_type: Option<NodeId>,
        flags: ScriptFunctionFlags,
    ) -> Option<NodeId> {
        let body = if self.current_token() == TokenKind::OpenBrace {
            self.parse_block()?
        } else {
            // Expression body becomes `{ return expr; }`.
            let expr_start = self.token_pos();
            let argument = self.parse_assignment_expression()?;
            let span = self.span_from(expr_start);
            let ret = self.ast.alloc_with_parents(NodeKind::Return { argument: Some(argument) }, span);
            self.ast.alloc_with_parents(NodeKind::Block { statements: vec![ret] }, span)
        };
        let mut modifiers = ModifierFlags::NONE;
        if flags.contains(ScriptFunctionFlags::ASYNC) {
            modifiers |= ModifierFlags::ASYNC;
        }
        let function = self.ast.alloc_with_parents(
            NodeKind::ScriptFunction {
                name: None,
                type_params,
                params,
                return_type,
                body: Some(body),
                flags,
                modifiers,
                signature: None,
                async_impl: None,
            },
            self.span_from(start),
        );
        Some(self.ast.alloc_with_parents(
            NodeKind::ArrowFunction { function, captures: Vec::new(), proxy_class: None },
            self.span_from(start),
        ))
    }

    fn parse_conditional_expression(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        let test = self.parse_binary_expression(OperatorPrecedence::Lowest)?;
        if !self.optional(TokenKind::Question) {
            return Some(test);
        }
        let consequent = self.parse_assignment_expression()?;
        self.expect(TokenKind::Colon);
        let alternate = self.parse_assignment_expression()?;
        Some(self.ast.alloc_with_parents(
            NodeKind::Conditional { test, consequent, alternate },
            self.span_from(start),
        ))
    }

    /// Precedence climbing: parse operators binding tighter than `min`.
    fn parse_binary_expression(&mut self, min: OperatorPrecedence) -> Option<NodeId> {
        let start = self.token_pos();
        let mut left = self.parse_unary_expression()?;
        loop {
            self.scanner.rescan_greater();
            let token = self.current_token();
            if self.is_identifier_text("as") && !self.scanner.has_preceding_line_break() {
                if OperatorPrecedence::Relational <= min {
                    break;
                }
                self.next_token();
                let type_annotation = self.parse_type()?;
                left = self.ast.alloc_with_parents(
                    NodeKind::As { expression: left, type_annotation },
                    self.span_from(start),
                );
                continue;
            }
            let precedence = get_binary_operator_precedence(token);
            if precedence == OperatorPrecedence::Invalid || precedence <= min {
                break;
            }
            self.next_token();
            if token == TokenKind::Instanceof {
                let type_annotation = self.parse_type()?;
                left = self.ast.alloc_with_parents(
                    NodeKind::InstanceOf { expression: left, type_annotation },
                    self.span_from(start),
                );
                continue;
            }
            let op = binary_operator(token)?;
            let right = self.parse_binary_expression(precedence)?;
            left = self.ast.alloc_with_parents(
                NodeKind::Binary { op, left, right, operation_type: None },
                self.span_from(start),
            );
        }
        Some(left)
    }

    fn parse_unary_expression(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        let op = match self.current_token() {
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Exclamation => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.next_token();
            let argument = self.parse_unary_expression()?;
            return Some(self.ast.alloc_with_parents(NodeKind::Unary { op, argument }, self.span_from(start)));
        }
        match self.current_token() {
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if self.current_token() == TokenKind::PlusPlus { UpdateOp::Increment } else { UpdateOp::Decrement };
                self.next_token();
                let argument = self.parse_unary_expression()?;
                Some(self.ast.alloc_with_parents(NodeKind::Update { op, prefix: true, argument }, self.span_from(start)))
            }
            TokenKind::Typeof => {
                self.next_token();
                let argument = self.parse_unary_expression()?;
                Some(self.ast.alloc_with_parents(NodeKind::TypeOf { argument }, self.span_from(start)))
            }
            TokenKind::Await => {
                self.next_token();
                let argument = self.parse_unary_expression()?;
                Some(self.ast.alloc_with_parents(NodeKind::Await { argument }, self.span_from(start)))
            }
            _ => self.parse_postfix_expression(),
        }
    }

    fn parse_postfix_expression(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        let expression = self.parse_left_hand_side_expression()?;
        if matches!(self.current_token(), TokenKind::PlusPlus | TokenKind::MinusMinus) && !self.scanner.has_preceding_line_break() {
            let op = if self.current_token() == TokenKind::PlusPlus { UpdateOp::Increment } else { UpdateOp::Decrement };
            self.next_token();
            return Some(self.ast.alloc_with_parents(
                NodeKind::Update { op, prefix: false, argument: expression },
                self.span_from(start),
            ));
        }
        Some(expression)
    }

    fn parse_left_hand_side_expression(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        let mut expr = if self.current_token() == TokenKind::New {
            self.parse_new_expression()?
        } else {
            self.parse_primary_expression()?
        };
        loop {
            match self.current_token() {
                TokenKind::Dot | TokenKind::QuestionDot => {
                    let optional = self.current_token() == TokenKind::QuestionDot;
                    self.next_token();
                    if optional && self.current_token() == TokenKind::OpenParen {
                        let arguments = self.parse_arguments()?;
                        expr = self.ast.alloc_with_parents(
                            NodeKind::Call { callee: expr, type_args: Vec::new(), arguments, optional: true, signature: None },
                            self.span_from(start),
                        );
                        continue;
                    }
                    let property = self.parse_identifier_name()?;
                    expr = self.ast.alloc_with_parents(
                        NodeKind::Member { object: expr, property, computed: false, optional, obj_type: None },
                        self.span_from(start),
                    );
                }
                TokenKind::OpenBracket => {
                    self.next_token();
                    let property = self.parse_expression()?;
                    self.expect(TokenKind::CloseBracket);
                    expr = self.ast.alloc_with_parents(
                        NodeKind::Member { object: expr, property, computed: true, optional: false, obj_type: None },
                        self.span_from(start),
                    );
                }
                TokenKind::OpenParen => {
                    let arguments = self.parse_arguments()?;
                    expr = self.ast.alloc_with_parents(
                        NodeKind::Call { callee: expr, type_args: Vec::new(), arguments, optional: false, signature: None },
                        self.span_from(start),
                    );
                }
                TokenKind::Less => match self.try_parse_type_arguments_for_call() {
                    Some(type_args) => {
                        let arguments = self.parse_arguments()?;
                        expr = self.ast.alloc_with_parents(
                            NodeKind::Call { callee: expr, type_args, arguments, optional: false, signature: None },
                            self.span_from(start),
                        );
                    }
                    None => break,
                },
                TokenKind::Exclamation if !self.scanner.has_preceding_line_break() => {
                    self.next_token();
                    expr = self.ast.alloc_with_parents(NodeKind::NonNull { expression: expr }, self.span_from(start));
                }
                _ => break,
            }
        }
        Some(expr)
    }

    /// `f<T>(...)`: type arguments only when directly followed by `(`.
    fn try_parse_type_arguments_for_call(&mut self) -> Option<Vec<NodeId>> {
        let saved = self.speculate();
        match self.parse_type_arguments() {
            Some(args) if self.current_token() == TokenKind::OpenParen && self.errors_reported == saved.errors_reported => {
                Some(args)
            }
            _ => {
                self.rewind(saved);
                None
            }
        }
    }

    fn parse_arguments(&mut self) -> Option<Vec<NodeId>> {
        self.expect(TokenKind::OpenParen);
        let mut arguments = Vec::new();
        while !matches!(self.current_token(), TokenKind::CloseParen | TokenKind::EndOfFile) {
            arguments.push(self.parse_assignment_expression()?);
            if !self.optional(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen);
        Some(arguments)
    }

    fn parse_new_expression(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        self.expect(TokenKind::New);
        let type_start = self.token_pos();
        let class = if self.current_token() == TokenKind::Identifier {
            if let Some(keyword) = TypeKeyword::from_str(self.token_value()) {
                self.next_token();
                self.ast.alloc(NodeKind::PrimitiveType(keyword), self.span_from(type_start))
            } else {
                self.parse_type_reference()?
            }
        } else {
            self.error(&messages::TYPE_EXPECTED, &[]);
            return None;
        };
        if self.optional(TokenKind::OpenBracket) {
            let dimension = self.parse_expression()?;
            self.expect(TokenKind::CloseBracket);
            return Some(self.ast.alloc_with_parents(
                NodeKind::NewArray { element_type: class, dimension },
                self.span_from(start),
            ));
        }
        let arguments = if self.current_token() == TokenKind::OpenParen { self.parse_arguments()? } else { Vec::new() };
        Some(self.ast.alloc_with_parents(NodeKind::New { class, arguments, signature: None }, self.span_from(start)))
    }

    fn parse_primary_expression(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        let kind = match self.current_token() {
            TokenKind::Identifier => return self.parse_identifier(),
            TokenKind::NumericLiteral => {
                let number = self.parse_number()?;
                return Some(self.ast.alloc(NodeKind::NumberLiteral(number), self.span_from(start)));
            }
            TokenKind::StringLiteral => NodeKind::StringLiteral(self.token_value().to_string()),
            TokenKind::CharLiteral => NodeKind::CharLiteral(self.token_value().chars().next().map_or(0, |c| c as u32 as u16)),
            TokenKind::True => NodeKind::BooleanLiteral(true),
            TokenKind::False => NodeKind::BooleanLiteral(false),
            TokenKind::Null => NodeKind::NullLiteral,
            TokenKind::Undefined => NodeKind::UndefinedLiteral,
            TokenKind::This => NodeKind::This,
            TokenKind::Super => NodeKind::Super,
            TokenKind::OpenParen => {
                self.next_token();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::CloseParen);
                return Some(inner);
            }
            TokenKind::OpenBracket => return self.parse_array_literal(),
            TokenKind::OpenBrace => return self.parse_object_literal(),
            _ => {
                self.error(&messages::EXPRESSION_EXPECTED, &[]);
                return None;
            }
        };
        self.next_token();
        Some(self.ast.alloc(kind, self.span_from(start)))
    }

    fn parse_number(&mut self) -> Option<Number> {
        let flags = self.scanner.token_flags();
        let text = self.token_value().to_string();
        let raw = self.scanner.token_text().to_string();
        self.next_token();
        let radix = if flags.contains(TokenFlags::HEX) {
            16
        } else if flags.contains(TokenFlags::BINARY) {
            2
        } else if flags.contains(TokenFlags::OCTAL) {
            8
        } else {
            10
        };
        let number = if flags.contains(TokenFlags::FLOAT_SUFFIX) {
            text.parse::<f32>().ok().map(Number::Float)
        } else if flags.contains(TokenFlags::FLOATING) {
            text.parse::<f64>().ok().map(Number::Double)
        } else {
            i64::from_str_radix(&text, radix).ok().map(|v| match i32::try_from(v) {
                Ok(small) => Number::Int(small),
                Err(_) => Number::Long(v),
            })
        };
        if number.is_none() {
            let span = TextSpan::new(self.prev_end.saturating_sub(raw.len() as u32), raw.len() as u32);
            self.error_at(span, &messages::INVALID_NUMERIC_LITERAL_0, &[&raw]);
        }
        number
    }

    fn parse_array_literal(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        self.expect(TokenKind::OpenBracket);
        let mut elements = Vec::new();
        while !matches!(self.current_token(), TokenKind::CloseBracket | TokenKind::EndOfFile) {
            elements.push(self.parse_assignment_expression()?);
            if !self.optional(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBracket);
        Some(self.ast.alloc_with_parents(
            NodeKind::ArrayLiteral { elements, preferred_type: None },
            self.span_from(start),
        ))
    }

    fn parse_object_literal(&mut self) -> Option<NodeId> {
        let start = self.token_pos();
        self.expect(TokenKind::OpenBrace);
        let mut properties = Vec::new();
        while !matches!(self.current_token(), TokenKind::CloseBrace | TokenKind::EndOfFile) {
            let prop_start = self.token_pos();
            let key = if self.current_token() == TokenKind::StringLiteral {
                let name = self.ast.interner.intern(self.token_value());
                self.next_token();
                self.ast.alloc(NodeKind::Identifier { name, variable: None }, self.span_from(prop_start))
            } else {
                self.parse_identifier_name()?
            };
            self.expect(TokenKind::Colon);
            let value = self.parse_assignment_expression()?;
            properties.push(self.ast.alloc_with_parents(NodeKind::Property { key, value }, self.span_from(prop_start)));
            if !self.optional(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBrace);
        Some(self.ast.alloc_with_parents(
            NodeKind::ObjectLiteral { properties, preferred_type: None },
            self.span_from(start),
        ))
    }
}
