//! Parser for the template language

pub mod ast;
pub mod config;
mod grammar;
pub mod lexer;

pub use ast::*;
pub use config::ParserOptions;
pub use grammar::{parse, parse_with_options};
