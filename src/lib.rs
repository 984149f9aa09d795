use std::path::PathBuf;

use thiserror::Error;

mod config;
mod diagnostic;
pub mod interpreter;
pub mod parser;
mod stack;

pub use config::{ConfigError, LibraryConfig, CONFIG_FILE};
pub use diagnostic::Diagnostic;
pub use interpreter::{Interpreter, InterpreterError, Value};
pub use parser::{parse, tokenize, LexicalError, ParseError, ParserState, Token, Tokenizer};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Lexical(#[from] LexicalError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Scans, parses and executes `source` in `interpreter`.
pub fn run(source: &str, interpreter: &mut Interpreter) -> Result<Value, Error> {
    interpreter.run(source)
}
