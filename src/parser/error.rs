use thiserror::Error;

use super::locations::{Locatable, Location, Span};
use super::tokenizer::Token;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexicalError {
    #[error("unterminated string literal starting at {span}")]
    UnterminatedString { span: Span },
}

impl LexicalError {
    pub fn span(&self) -> Span {
        match self {
            Self::UnterminatedString { span } => *span,
        }
    }
}

/// A character the scanner did not recognize and skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalWarning {
    pub character: char,
    pub location: Location,
}

impl std::fmt::Display for LexicalWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "skipping unknown character '{}' at {}",
            self.character, self.location
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}: found '{}' at {}", .token.lexeme, .token.span)]
pub struct ParseError {
    message: String,
    token: Token,
}

impl ParseError {
    pub(crate) fn new(message: &str, input: &[Token]) -> Self {
        Self::at(message, input.first().cloned().unwrap_or_default())
    }

    pub(crate) fn at(message: &str, token: Token) -> Self {
        Self {
            message: message.to_string(),
            token,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn span(&self) -> Span {
        self.token.span()
    }
}
