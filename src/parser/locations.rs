use super::ast::*;
use super::tokenizer::Token;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

pub trait Locatable {
    fn span(&self) -> Span;
}

/// Source extent of a token or node. Nodes synthesized without a source
/// position (e.g. the statements of a built-in value) are `Indetermined`.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum Span {
    #[default]
    Indetermined,
    Determined(Extent),
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct Extent {
    pub start: Location,
    pub end: Location,
}

impl Span {
    pub(crate) fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self::Determined(Extent {
            start: Location {
                line: start_line,
                column: start_col,
            },
            end: Location {
                line: end_line,
                column: end_col,
            },
        })
    }

    pub fn start(&self) -> Option<Location> {
        match self {
            Self::Determined(extent) => Some(extent.start),
            Self::Indetermined => None,
        }
    }

    /// One past the last character of the extent.
    pub fn end(&self) -> Option<Location> {
        match self {
            Self::Determined(extent) => Some(extent.end),
            Self::Indetermined => None,
        }
    }

    pub fn line(&self) -> Option<usize> {
        self.start().map(|loc| loc.line)
    }

    pub fn column(&self) -> Option<usize> {
        self.start().map(|loc| loc.column)
    }

    pub(crate) fn till<R: Locatable + ?Sized>(&self, other: &R) -> Self {
        match (self, other.span()) {
            (Self::Indetermined, Self::Indetermined) => Self::Indetermined,
            (Self::Indetermined, Self::Determined(t)) => Self::Determined(t),
            (Self::Determined(s), Self::Indetermined) => Self::Determined(*s),
            (Self::Determined(s), Self::Determined(t)) => Self::Determined(Extent {
                start: s.start,
                end: t.end,
            }),
        }
    }

    pub(crate) fn till_block<R: Locatable>(&self, block: &[R]) -> Self {
        match block.last() {
            Some(last) => self.till(last),
            None => *self,
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Determined(extent) => write!(f, "{}", extent.start),
            Self::Indetermined => write!(f, "unknown position"),
        }
    }
}

impl Locatable for Token {
    fn span(&self) -> Span {
        self.span
    }
}

impl<R> Locatable for Box<R>
where
    R: Locatable,
{
    fn span(&self) -> Span {
        (**self).span()
    }
}

impl Locatable for Span {
    fn span(&self) -> Span {
        *self
    }
}

impl Locatable for Name {
    fn span(&self) -> Span {
        self.span
    }
}

impl Locatable for Node {
    fn span(&self) -> Span {
        match self {
            Self::Number(_, s) => *s,
            Self::String(_, s) => *s,
            Self::Variable(name) => name.span(),
            Self::BinaryOp(_, _, _, s) => *s,
            Self::Assign(_, _, s) => *s,
            Self::Print(_, s) => *s,
            Self::PrintNoNewline(_, s) => *s,
            Self::If(_, _, s) => *s,
            Self::For(_, s) => *s,
            Self::While(_, _, s) => *s,
            Self::FunctionDef(_, s) => *s,
            Self::Call(_, _, s) => *s,
            Self::Return(_, s) => *s,
            Self::NonStoppingReturn(_, s) => *s,
            Self::CodeBlock(_, s) => *s,
            Self::Import(_, s) => *s,
            Self::ArrayAccess(_, _, s) => *s,
            Self::DotAccess(_, _, s) => *s,
            Self::ClassDef(_, s) => *s,
            Self::Expr(_, s) => *s,
        }
    }
}

impl Locatable for FunctionDefinition {
    fn span(&self) -> Span {
        self.name.span.till_block(&self.body)
    }
}
