//! Rendering errors and diagnostics to stderr.

use etsc_compiler::{CompileError, SourceText};
use etsc_diagnostics::Diagnostic;
use miette::{NamedSource, Report, SourceSpan};
use std::io::IsTerminal;

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// A diagnostic with the source excerpt it points into.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("{category}: {message}")]
struct SourceDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{category}")]
    span: SourceSpan,
    category: String,
    message: String,
}

fn use_color() -> bool {
    std::io::stderr().is_terminal()
}

pub fn print_error(message: &str) {
    if use_color() {
        eprintln!("{}{}error{}: {}", BOLD, RED, RESET, message);
    } else {
        eprintln!("error: {}", message);
    }
}

pub fn print_warning(diagnostic: &Diagnostic) {
    if use_color() {
        eprintln!("{}{}warning{}: {}", BOLD, YELLOW, RESET, diagnostic);
    } else {
        eprintln!("warning: {}", diagnostic);
    }
}

/// Render `diagnostic` with an excerpt of its source when both the file
/// and the span are known, as a single line otherwise.
fn print_diagnostic(diagnostic: &Diagnostic, sources: &[SourceText]) {
    let source = diagnostic.file.as_deref().and_then(|file| sources.iter().find(|s| s.name == file));
    match (source, diagnostic.span) {
        (Some(source), Some(span)) => {
            let start = (span.start as usize).min(source.text.len());
            let length = (span.length as usize).min(source.text.len() - start);
            let rendered = SourceDiagnostic {
                src: NamedSource::new(source.name.clone(), source.text.clone()),
                span: SourceSpan::from((start, length)),
                category: diagnostic.category.to_string(),
                message: diagnostic.message_text.clone(),
            };
            eprintln!("{:?}", Report::new(rendered));
        }
        _ => print_error(&diagnostic.to_string()),
    }
}

pub fn report_error(error: &CompileError) {
    match error {
        CompileError::User { diagnostics, sources } => {
            for diagnostic in diagnostics {
                print_diagnostic(diagnostic, sources);
            }
            let count = diagnostics.len();
            let summary = format!("Found {} error{}.", count, if count == 1 { "" } else { "s" });
            if use_color() {
                eprintln!("\n{}{}{}", RED, summary, RESET);
            } else {
                eprintln!("\n{}", summary);
            }
        }
        CompileError::Internal(message) => {
            eprintln!("internal compiler error: {}", message);
            eprintln!("note: this is a bug in etsc, not in the compiled program");
        }
        other => print_error(&other.to_string()),
    }
}
