//! Text front end for the IR: lexer, parser, printer.
//!
//! The surface syntax is a small block language: `let` bindings, `:=`
//! assignments, `if`/`switch`/`for` control flow, `function` definitions,
//! and call expressions over the dialect's builtins. The printer emits a
//! canonical form that re-parses to the same tree (modulo spans and ids).

pub mod lexer;
pub mod parser;
pub mod printer;
