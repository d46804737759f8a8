//! Dead-store elimination for a block-structured stack-machine IR.
//!
//! The crate parses a small Yul-like language over builtin calls, runs an
//! optimizer that deletes memory/storage stores and variable assignments
//! whose values are never observed, and prints the result back out. A
//! reference interpreter executes programs directly so optimizations can
//! be checked against observable behavior.

pub mod analysis;
pub mod diagnostic;
pub mod dialect;
pub mod interp;
pub mod ir;
pub mod optimize;
pub mod span;
pub mod syntax;

use diagnostic::Diagnostic;
use ir::Block;

/// Parse a program from source text.
pub fn parse_source(source: &str) -> Result<Block, Vec<Diagnostic>> {
    let (tokens, diagnostics) = syntax::lexer::Lexer::new(source).tokenize();
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }
    syntax::parser::Parser::new(tokens).parse_program()
}
