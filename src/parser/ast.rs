use std::rc::Rc;

use super::locations::Span;
use super::tokenizer::{Token, TokenType as TT};

/// A statement or expression. Statements and expressions share one node
/// type since every statement evaluates to a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Number(i64, Span),
    String(Rc<str>, Span),
    Variable(Name),
    BinaryOp(Box<Node>, Operator, Box<Node>, Span),
    Assign(Target, Box<Node>, Span),
    Print(Option<Box<Node>>, Span),
    PrintNoNewline(Option<Box<Node>>, Span),
    If(Box<Node>, Vec<Node>, Span),
    For(Box<ForLoop>, Span),
    While(Box<Node>, Vec<Node>, Span),
    FunctionDef(Rc<FunctionDefinition>, Span),
    Call(Callee, Vec<Node>, Span),
    Return(Box<Node>, Span),
    NonStoppingReturn(Box<Node>, Span),
    CodeBlock(Rc<[Node]>, Span),
    Import(Import, Span),
    ArrayAccess(Name, Box<Node>, Span),
    DotAccess(Name, Name, Span),
    ClassDef(Rc<ClassDefinition>, Span),
    Expr(Rc<Node>, Span),
}

#[derive(Clone, PartialEq)]
pub struct Name {
    pub(crate) name: Rc<str>,
    pub(crate) span: Span,
}

impl Name {
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Name(\"{}\")", self.name)
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<Token> for Name {
    fn from(value: Token) -> Self {
        Self {
            name: value.lexeme.into(),
            span: value.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(Name),
    Attribute(Name, Name),
    Index(Name, Box<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Function(Name),
    Method(Name, Name),
}

impl std::fmt::Display for Callee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Function(name) => write!(f, "{name}"),
            Self::Method(object, method) => write!(f, "{object}.{method}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub(crate) init: Option<Node>,
    pub(crate) condition: Option<Node>,
    pub(crate) update: Option<Node>,
    pub(crate) body: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub(crate) visibility: Visibility,
    pub(crate) name: Name,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) body: Vec<Node>,
}

impl FunctionDefinition {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Value,
    /// Declared as `name: BCC.Codeblock`.
    CodeBlock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub(crate) name: Name,
    pub(crate) kind: ParameterKind,
}

impl From<Name> for Parameter {
    fn from(value: Name) -> Self {
        Self {
            name: value,
            kind: ParameterKind::Value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDefinition {
    pub(crate) name: Name,
    pub(crate) attributes: Vec<(Name, Node)>,
    pub(crate) methods: Vec<Rc<FunctionDefinition>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub(crate) path: Rc<str>,
    /// `from "path" import a, b` restricts the merge to the listed functions.
    pub(crate) items: Option<Vec<Name>>,
    /// `import "path" as m` keeps the functions behind the `m.` prefix.
    pub(crate) alias: Option<Name>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Times,
    Divide,
    Equal,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
}

impl From<Token> for Operator {
    fn from(value: Token) -> Self {
        match value.typ {
            TT::PLUS => Self::Plus,
            TT::MINUS => Self::Minus,
            TT::STAR => Self::Times,
            TT::SLASH => Self::Divide,
            TT::EQEQUAL => Self::Equal,
            TT::LESS => Self::LessThan,
            TT::GREATER => Self::GreaterThan,
            TT::LESSEQUAL => Self::LessThanEqual,
            TT::GREATEREQUAL => Self::GreaterThanEqual,
            _ => unreachable!(),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Times => "*",
            Self::Divide => "/",
            Self::Equal => "==",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessThanEqual => "<=",
            Self::GreaterThanEqual => ">=",
        };
        f.write_str(symbol)
    }
}
