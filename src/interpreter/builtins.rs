use std::io::Write;

use super::error::InterpreterError;
use super::value::Value;
use super::{FlowControl, Interpreter};
use crate::parser::Span;

pub(crate) type BuiltinFn = fn(&mut Interpreter, Vec<Value>, Span) -> Result<Value, InterpreterError>;

/// A native function. Arguments are evaluated before `func` runs and the
/// argument count has already been checked against `arity`.
#[derive(Clone, Copy)]
pub(crate) struct Builtin {
    pub(crate) name: &'static str,
    pub(crate) arity: usize,
    pub(crate) func: BuiltinFn,
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

pub(crate) fn lookup(name: &str) -> Option<Builtin> {
    let (name, func): (&'static str, BuiltinFn) = match name {
        "len" => ("len", builtin_len),
        "eval" => ("eval", builtin_eval),
        "str" => ("str", builtin_str),
        "int" => ("int", builtin_int),
        "float" => ("float", builtin_float),
        "bool" => ("bool", builtin_bool),
        "type" => ("type", builtin_type),
        "println" => ("println", builtin_println),
        _ => return None,
    };
    Some(Builtin {
        name,
        arity: 1,
        func,
    })
}

fn unsupported(function: &str, value: &Value, span: Span) -> InterpreterError {
    InterpreterError::Builtin {
        message: format!("{function}() does not support {}", value.type_name()),
        span,
    }
}

fn single(args: Vec<Value>) -> Value {
    args.into_iter().next().unwrap_or(Value::None)
}

fn builtin_len(_: &mut Interpreter, args: Vec<Value>, span: Span) -> Result<Value, InterpreterError> {
    let length = match single(args) {
        Value::Str(text) => text.chars().count(),
        Value::List(values) => values.borrow().len(),
        Value::CodeBlock(block) => block.len(),
        other => return Err(unsupported("len", &other, span)),
    };
    i64::try_from(length)
        .map(Value::Int)
        .map_err(|_| InterpreterError::IntegerOverflow {
            operator: "len".to_string(),
            span,
        })
}

fn builtin_eval(
    interpreter: &mut Interpreter,
    args: Vec<Value>,
    span: Span,
) -> Result<Value, InterpreterError> {
    match single(args) {
        Value::Expr(node) => match interpreter.interpret(&node)? {
            FlowControl::Next(value) => Ok(value),
            FlowControl::Return(_, span) => Err(InterpreterError::ReturnOutsideFunction { span }),
        },
        other => Err(InterpreterError::NotAnExpression {
            type_name: other.type_name(),
            span,
        }),
    }
}

fn builtin_str(_: &mut Interpreter, args: Vec<Value>, _: Span) -> Result<Value, InterpreterError> {
    Ok(Value::Str(single(args).to_string().into()))
}

fn builtin_int(_: &mut Interpreter, args: Vec<Value>, span: Span) -> Result<Value, InterpreterError> {
    match single(args) {
        Value::Int(value) => Ok(Value::Int(value)),
        Value::Bool(value) => Ok(Value::Int(i64::from(value))),
        Value::Float(value) if value.is_finite() && value.abs() < i64::MAX as f64 => {
            Ok(Value::Int(value.trunc() as i64))
        }
        Value::Str(text) => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| InterpreterError::Builtin {
                message: format!("int() cannot convert '{text}'"),
                span,
            }),
        other => Err(unsupported("int", &other, span)),
    }
}

fn builtin_float(_: &mut Interpreter, args: Vec<Value>, span: Span) -> Result<Value, InterpreterError> {
    match single(args) {
        Value::Int(value) => Ok(Value::Float(value as f64)),
        Value::Float(value) => Ok(Value::Float(value)),
        Value::Bool(value) => Ok(Value::Float(f64::from(u8::from(value)))),
        Value::Str(text) => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| InterpreterError::Builtin {
                message: format!("float() cannot convert '{text}'"),
                span,
            }),
        other => Err(unsupported("float", &other, span)),
    }
}

fn builtin_bool(_: &mut Interpreter, args: Vec<Value>, _: Span) -> Result<Value, InterpreterError> {
    Ok(Value::Bool(single(args).is_truthy()))
}

fn builtin_type(_: &mut Interpreter, args: Vec<Value>, _: Span) -> Result<Value, InterpreterError> {
    Ok(Value::Str(single(args).type_name().into()))
}

/// Prints its argument without a trailing newline.
fn builtin_println(
    interpreter: &mut Interpreter,
    args: Vec<Value>,
    _: Span,
) -> Result<Value, InterpreterError> {
    let text = single(args).to_string();
    let mut output = interpreter.output.borrow_mut();
    write!(output, "{text}")?;
    output.flush()?;
    Ok(Value::None)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn call(name: &str, argument: Value) -> Result<Value, InterpreterError> {
        let builtin = lookup(name).expect("builtin exists");
        let mut interpreter = Interpreter::new();
        (builtin.func)(&mut interpreter, vec![argument], Span::default())
    }

    #[test]
    fn test_lookup() {
        assert!(lookup("len").is_some());
        assert!(lookup("print").is_none());
        assert!(lookup("execute").is_none());
        assert_eq!(lookup("eval").map(|builtin| builtin.arity), Some(1));
    }

    #[test]
    fn test_len() {
        assert!(matches!(call("len", Value::Str("héllo".into())), Ok(Value::Int(5))));
        assert!(matches!(
            call("len", Value::list(vec![Value::Int(1), Value::None])),
            Ok(Value::Int(2))
        ));
        let err = call("len", Value::Int(3)).unwrap_err();
        assert_eq!(err.to_string(), "len() does not support int");
    }

    #[test]
    fn test_conversions() {
        assert!(matches!(call("int", Value::Str(" 42 ".into())), Ok(Value::Int(42))));
        assert!(matches!(call("int", Value::Float(-2.7)), Ok(Value::Int(-2))));
        assert!(matches!(call("int", Value::Bool(true)), Ok(Value::Int(1))));
        assert_eq!(
            call("int", Value::Str("abc".into())).unwrap_err().to_string(),
            "int() cannot convert 'abc'"
        );
        assert!(matches!(call("float", Value::Int(2)), Ok(Value::Float(f)) if f == 2.0));
        assert_eq!(call("str", Value::Float(2.0)).unwrap().to_string(), "2.0");
        assert!(matches!(call("bool", Value::Str("".into())), Ok(Value::Bool(false))));
        assert_eq!(call("type", Value::None).unwrap().to_string(), "none");
    }

    #[test]
    fn test_eval_requires_expression() {
        let err = call("eval", Value::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "eval() requires an expr(...) value, got int");
    }
}
