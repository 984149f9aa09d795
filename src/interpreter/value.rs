use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::error::InterpreterError;
use crate::parser::{FunctionDefinition, Node, Operator, Span};
use crate::stack::ensure_sufficient_stack;

/// Upper bound in bytes for a string built by repetition.
pub const MAX_STRING_LENGTH: usize = 1 << 28;

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    CodeBlock(CodeBlock),
    Class(Rc<Class>),
    Instance(Rc<RefCell<Instance>>),
    /// A deferred expression created by `expr(...)`, evaluated by `eval`.
    Expr(Rc<Node>),
}

impl Value {
    pub fn list(values: Vec<Value>) -> Self {
        Self::List(Rc::new(RefCell::new(values)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::CodeBlock(_) => "codeblock",
            Self::Class(_) => "class",
            Self::Instance(_) => "instance",
            Self::Expr(_) => "expr",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
            Self::Float(value) => *value != 0.0,
            Self::Str(value) => !value.is_empty(),
            Self::List(values) => !values.borrow().is_empty(),
            _ => true,
        }
    }

    /// `==` semantics: numbers compare across int/float, strings by
    /// content, shared objects by identity.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.as_float() == other.as_float()
            }
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::CodeBlock(a), Self::CodeBlock(b)) => Rc::ptr_eq(&a.statements, &b.statements),
            (Self::Class(a), Self::Class(b)) => Rc::ptr_eq(a, b),
            (Self::Instance(a), Self::Instance(b)) => Rc::ptr_eq(a, b),
            (Self::Expr(a), Self::Expr(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_to(f, &mut Vec::new())
    }
}

impl Value {
    /// `open` holds the lists currently being written; meeting one of them
    /// again prints `[...]`.
    fn write_to(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        open: &mut Vec<*const RefCell<Vec<Value>>>,
    ) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) if value.is_finite() && value.fract() == 0.0 => {
                write!(f, "{value:.1}")
            }
            Self::Float(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
            Self::List(values) => {
                let id = Rc::as_ptr(values);
                if open.contains(&id) {
                    return f.write_str("[...]");
                }
                open.push(id);
                f.write_str("[")?;
                for (i, value) in values.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    ensure_sufficient_stack(|| value.write_to(f, open))?;
                }
                open.pop();
                f.write_str("]")
            }
            Self::CodeBlock(block) => write!(f, "<codeblock ({} statements)>", block.len()),
            Self::Class(class) => write!(f, "<class {}>", class.name),
            Self::Instance(instance) => write!(f, "<{} instance>", instance.borrow().class.name),
            Self::Expr(_) => f.write_str("<expr>"),
        }
    }
}

/// A first-class statement list. Executing it runs the statements in the
/// environment of the caller.
#[derive(Debug, Clone)]
pub struct CodeBlock {
    pub(crate) statements: Rc<[Node]>,
}

impl CodeBlock {
    pub(crate) fn new(statements: Rc<[Node]>) -> Self {
        Self { statements }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// The `index`-th statement wrapped in a block of its own.
    pub fn statement(&self, index: usize) -> Option<CodeBlock> {
        self.statements
            .get(index)
            .map(|node| CodeBlock::new(Rc::from(vec![node.clone()])))
    }

    pub fn lines(&self) -> Vec<Value> {
        (0..self.len())
            .filter_map(|index| self.statement(index))
            .map(Value::CodeBlock)
            .collect()
    }
}

#[derive(Debug)]
pub struct Class {
    pub(crate) name: Rc<str>,
    pub(crate) attributes: Vec<(Rc<str>, Value)>,
    pub(crate) methods: HashMap<Rc<str>, Rc<FunctionDefinition>>,
}

impl Class {
    /// Creates an instance holding its own copy of the default attributes.
    pub fn instantiate(self: &Rc<Self>) -> Instance {
        Instance {
            class: Rc::clone(self),
            attributes: self.attributes.iter().cloned().collect(),
        }
    }

    pub fn method(&self, name: &str) -> Option<&Rc<FunctionDefinition>> {
        self.methods.get(name)
    }
}

#[derive(Debug)]
pub struct Instance {
    pub(crate) class: Rc<Class>,
    pub(crate) attributes: HashMap<Rc<str>, Value>,
}

impl Instance {
    pub fn get(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }

    pub fn set(&mut self, name: Rc<str>, value: Value) {
        self.attributes.insert(name, value);
    }
}

/// Applies a binary operator to two evaluated operands.
pub(crate) fn binary_operation(
    op: Operator,
    left: &Value,
    right: &Value,
    span: Span,
) -> Result<Value, InterpreterError> {
    use Value::*;

    let mismatch = || InterpreterError::TypeMismatch {
        operator: op.to_string(),
        left: left.type_name(),
        right: right.type_name(),
        span,
    };
    let overflow = || InterpreterError::IntegerOverflow {
        operator: op.to_string(),
        span,
    };

    match op {
        Operator::Plus => match (left, right) {
            (Int(a), Int(b)) => a.checked_add(*b).map(Int).ok_or_else(overflow),
            (Str(a), Str(b)) => Ok(Str(format!("{a}{b}").into())),
            (List(a), List(b)) => {
                let mut values = a.borrow().clone();
                values.extend(b.borrow().iter().cloned());
                Ok(Value::list(values))
            }
            _ => float_operation(left, right, |a, b| a + b).ok_or_else(mismatch),
        },
        Operator::Minus => match (left, right) {
            (Int(a), Int(b)) => a.checked_sub(*b).map(Int).ok_or_else(overflow),
            _ => float_operation(left, right, |a, b| a - b).ok_or_else(mismatch),
        },
        Operator::Times => match (left, right) {
            (Int(a), Int(b)) => a.checked_mul(*b).map(Int).ok_or_else(overflow),
            (Str(s), Int(n)) | (Int(n), Str(s)) => {
                let count = usize::try_from(*n).unwrap_or(0);
                let length = s.len() as u128 * count as u128;
                if length > MAX_STRING_LENGTH as u128 {
                    return Err(InterpreterError::StringTooLong {
                        length,
                        limit: MAX_STRING_LENGTH,
                        span,
                    });
                }
                Ok(Str(s.repeat(count).into()))
            }
            _ => float_operation(left, right, |a, b| a * b).ok_or_else(mismatch),
        },
        Operator::Divide => match (left.as_float(), right.as_float()) {
            (Some(_), Some(divisor)) if divisor == 0.0 => {
                Err(InterpreterError::DivisionByZero { span })
            }
            (Some(a), Some(b)) => Ok(Float(a / b)),
            _ => Err(mismatch()),
        },
        Operator::Equal => Ok(Bool(left.equals(right))),
        Operator::LessThan
        | Operator::GreaterThan
        | Operator::LessThanEqual
        | Operator::GreaterThanEqual => {
            let ordering = match (left, right) {
                (Int(a), Int(b)) => a.partial_cmp(b),
                (Str(a), Str(b)) => a.partial_cmp(b),
                _ => match (left.as_float(), right.as_float()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => return Err(mismatch()),
                },
            };
            // NaN compares false under every ordering operator
            let Some(ordering) = ordering else {
                return Ok(Bool(false));
            };
            let result = match op {
                Operator::LessThan => ordering.is_lt(),
                Operator::GreaterThan => ordering.is_gt(),
                Operator::LessThanEqual => ordering.is_le(),
                _ => ordering.is_ge(),
            };
            Ok(Bool(result))
        }
    }
}

fn float_operation(left: &Value, right: &Value, op: impl Fn(f64, f64) -> f64) -> Option<Value> {
    Some(Value::Float(op(left.as_float()?, right.as_float()?)))
}
