use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use derivative::Derivative;
use tracing::trace;

mod builtins;
mod environment;
mod error;
mod modules;
mod value;

pub use environment::Environment;
pub use error::InterpreterError;
pub use modules::{Module, ModuleRegistry, DEFAULT_LIB_PATH};
pub use value::{Class, CodeBlock, Instance, Value};

use crate::parser::{
    Callee, ClassDefinition, ForLoop, FunctionDefinition, Locatable, Name, Node, ParameterKind,
    Span, Target,
};
use crate::stack::ensure_sufficient_stack;
use builtins::Builtin;
use modules::exported;

/// Calls nested deeper than this fail with `RecursionLimit`.
pub const MAX_CALL_DEPTH: usize = 256;

/// Result of executing a statement: either continue with the statement's
/// value, or unwind to the nearest call boundary with a returned value.
#[derive(Debug)]
pub enum FlowControl {
    Next(Value),
    Return(Value, Span),
}

/// Unwraps the value of a `FlowControl::Next`, and returns early from the
/// enclosing function when a `return` is unwinding.
macro_rules! value {
    ($flow:expr) => {
        match $flow {
            FlowControl::Next(value) => value,
            flow @ FlowControl::Return(..) => return Ok(flow),
        }
    };
}

#[derive(Debug, Clone)]
pub(crate) struct Function {
    pub(crate) definition: Rc<FunctionDefinition>,
    /// The module the function was imported from; while it runs, calls
    /// resolve against that module's functions first.
    pub(crate) module: Option<Rc<Module>>,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Interpreter {
    environment: Environment,
    functions: HashMap<Rc<str>, Function>,
    aliases: HashMap<Rc<str>, Rc<Module>>,
    modules: Rc<RefCell<ModuleRegistry>>,
    scope: Vec<Rc<Module>>,
    #[derivative(Debug = "ignore")]
    output: Rc<RefCell<dyn Write>>,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter printing to stdout and loading library modules from
    /// `./lib/bcc`.
    pub fn new() -> Self {
        Self {
            environment: Environment::new(),
            functions: HashMap::new(),
            aliases: HashMap::new(),
            modules: Rc::new(RefCell::new(ModuleRegistry::new(DEFAULT_LIB_PATH))),
            scope: vec![],
            output: Rc::new(RefCell::new(std::io::stdout())),
            depth: 0,
        }
    }

    pub fn with_output(mut self, output: Rc<RefCell<dyn Write>>) -> Self {
        self.output = output;
        self
    }

    pub fn with_lib_path(self, lib_path: impl Into<PathBuf>) -> Self {
        self.modules.borrow_mut().set_lib_path(lib_path.into());
        self
    }

    /// An interpreter for a module body: its own namespace, but the
    /// registry and output of `self`.
    fn child(&self) -> Self {
        Self {
            modules: Rc::clone(&self.modules),
            output: Rc::clone(&self.output),
            ..Self::new()
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn variable(&self, name: &str) -> Option<Value> {
        self.environment.get(name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn lib_path(&self) -> PathBuf {
        self.modules.borrow().lib_path().to_path_buf()
    }

    /// Scans, parses and executes `source`. Returns the value of the last
    /// top-level statement.
    pub fn run(&mut self, source: &str) -> Result<Value, crate::Error> {
        let tokens = crate::parser::tokenize(source)?;
        let program = crate::parser::parse(&tokens)?;
        Ok(self.execute(&program)?)
    }

    pub fn execute(&mut self, program: &[Node]) -> Result<Value, InterpreterError> {
        let mut last = Value::None;
        for statement in program {
            last = self.evaluate(statement)?;
        }
        Ok(last)
    }

    /// Executes one top-level statement.
    pub fn evaluate(&mut self, node: &Node) -> Result<Value, InterpreterError> {
        match self.execute_statement(node)? {
            FlowControl::Next(value) => Ok(value),
            FlowControl::Return(_, span) => Err(InterpreterError::ReturnOutsideFunction { span }),
        }
    }

    fn execute_statement(&mut self, node: &Node) -> Result<FlowControl, InterpreterError> {
        // A statement naming a code block runs it in place.
        if let Node::Variable(name) = node {
            if let Some(Value::CodeBlock(block)) = self.environment.get(name.as_str()) {
                return self.run_block(&block.statements);
            }
        }
        self.interpret(node)
    }

    pub(crate) fn run_block(&mut self, statements: &[Node]) -> Result<FlowControl, InterpreterError> {
        let mut last = Value::None;
        for statement in statements {
            last = value!(self.execute_statement(statement)?);
        }
        Ok(FlowControl::Next(last))
    }

    pub(crate) fn interpret(&mut self, node: &Node) -> Result<FlowControl, InterpreterError> {
        ensure_sufficient_stack(|| self.interpret_node(node))
    }

    fn interpret_node(&mut self, node: &Node) -> Result<FlowControl, InterpreterError> {
        let value = match node {
            Node::Number(value, _) => Value::Int(*value),
            Node::String(value, _) => Value::Str(Rc::clone(value)),
            Node::Variable(name) => self.lookup(name)?,
            Node::BinaryOp(left, op, right, span) => {
                let left = value!(self.interpret(left)?);
                let right = value!(self.interpret(right)?);
                value::binary_operation(*op, &left, &right, *span)?
            }
            Node::Assign(target, value, span) => match target {
                Target::Name(name) => {
                    let value = value!(self.interpret(value)?);
                    self.environment.set(Rc::clone(&name.name), value.clone());
                    value
                }
                Target::Attribute(object, attribute) => {
                    let value = value!(self.interpret(value)?);
                    self.set_attribute(object, attribute, value.clone(), *span)?;
                    value
                }
                Target::Index(name, index) => {
                    let index = value!(self.interpret(index)?);
                    let value = value!(self.interpret(value)?);
                    self.set_index(name, &index, value.clone(), *span)?;
                    value
                }
            },
            Node::Print(value, _) => {
                let text = match value {
                    Some(value) => value!(self.interpret(value)?).to_string(),
                    None => String::new(),
                };
                writeln!(self.output.borrow_mut(), "{text}")?;
                Value::None
            }
            Node::PrintNoNewline(value, _) => {
                let text = match value {
                    Some(value) => value!(self.interpret(value)?).to_string(),
                    None => String::new(),
                };
                let mut output = self.output.borrow_mut();
                write!(output, "{text}")?;
                output.flush()?;
                Value::None
            }
            Node::If(condition, body, _) => {
                if !value!(self.interpret(condition)?).is_truthy() {
                    return Ok(FlowControl::Next(Value::None));
                }
                return self.run_block(body);
            }
            Node::While(condition, body, _) => {
                while value!(self.interpret(condition)?).is_truthy() {
                    value!(self.run_block(body)?);
                }
                Value::None
            }
            Node::For(for_loop, _) => return self.run_for(for_loop),
            Node::FunctionDef(definition, _) => {
                let function = Function {
                    definition: Rc::clone(definition),
                    module: None,
                };
                self.functions
                    .insert(Rc::clone(&definition.name.name), function);
                Value::None
            }
            Node::Call(callee, arguments, span) => return self.call(callee, arguments, *span),
            Node::Return(value, span) => {
                let value = value!(self.interpret(value)?);
                return Ok(FlowControl::Return(value, *span));
            }
            Node::NonStoppingReturn(value, _) => match value!(self.interpret(value)?) {
                Value::CodeBlock(block) => match self.run_block(&block.statements)? {
                    FlowControl::Next(value) | FlowControl::Return(value, _) => value,
                },
                value => value,
            },
            Node::CodeBlock(statements, _) => {
                Value::CodeBlock(CodeBlock::new(Rc::clone(statements)))
            }
            Node::Import(import, span) => {
                self.import(import, *span)?;
                Value::None
            }
            Node::ArrayAccess(name, index, span) => {
                let index = value!(self.interpret(index)?);
                self.index(name, &index, *span)?
            }
            Node::DotAccess(object, member, span) => self.member(object, member, *span)?,
            Node::ClassDef(class, _) => return self.define_class(class),
            Node::Expr(node, _) => Value::Expr(Rc::clone(node)),
        };
        Ok(FlowControl::Next(value))
    }

    fn run_for(&mut self, for_loop: &ForLoop) -> Result<FlowControl, InterpreterError> {
        if let Some(init) = &for_loop.init {
            value!(self.execute_statement(init)?);
        }
        loop {
            if let Some(condition) = &for_loop.condition {
                if !value!(self.interpret(condition)?).is_truthy() {
                    break;
                }
            }
            value!(self.run_block(&for_loop.body)?);
            if let Some(update) = &for_loop.update {
                value!(self.execute_statement(update)?);
            }
        }
        Ok(FlowControl::Next(Value::None))
    }

    fn lookup(&self, name: &Name) -> Result<Value, InterpreterError> {
        self.environment
            .get(name.as_str())
            .ok_or_else(|| InterpreterError::UndefinedVariable {
                name: name.to_string(),
                span: name.span(),
            })
    }

    fn define_class(&mut self, definition: &ClassDefinition) -> Result<FlowControl, InterpreterError> {
        let mut attributes = Vec::with_capacity(definition.attributes.len());
        for (name, initializer) in &definition.attributes {
            let value = value!(self.interpret(initializer)?);
            attributes.push((Rc::clone(&name.name), value));
        }
        let methods = definition
            .methods
            .iter()
            .map(|method| (Rc::clone(&method.name.name), Rc::clone(method)))
            .collect();
        let class = Class {
            name: Rc::clone(&definition.name.name),
            attributes,
            methods,
        };
        self.environment
            .set(Rc::clone(&definition.name.name), Value::Class(Rc::new(class)));
        Ok(FlowControl::Next(Value::None))
    }

    fn member(&self, object: &Name, member: &Name, span: Span) -> Result<Value, InterpreterError> {
        let Some(value) = self.environment.get(object.as_str()) else {
            if object.as_str() == "BCC" && member.as_str() == "Codeblock" {
                return Ok(Value::Str("BCC.Codeblock".into()));
            }
            return Err(InterpreterError::UndefinedVariable {
                name: object.to_string(),
                span: object.span(),
            });
        };
        let result = match &value {
            Value::CodeBlock(block) if member.as_str() == "lines" => Ok(Value::list(block.lines())),
            Value::Instance(instance) => {
                let instance = instance.borrow();
                instance
                    .get(member.as_str())
                    .ok_or_else(|| unknown_attribute(&instance.class.name, member, span))
            }
            Value::Class(class) => class
                .attributes
                .iter()
                .find(|(name, _)| name.as_ref() == member.as_str())
                .map(|(_, value)| value.clone())
                .ok_or_else(|| unknown_attribute(&class.name, member, span)),
            other => Err(unknown_attribute(other.type_name(), member, span)),
        };
        result
    }

    fn set_attribute(
        &mut self,
        object: &Name,
        attribute: &Name,
        value: Value,
        span: Span,
    ) -> Result<(), InterpreterError> {
        match self.lookup(object)? {
            Value::Instance(instance) => {
                instance
                    .borrow_mut()
                    .set(Rc::clone(&attribute.name), value);
                Ok(())
            }
            other => Err(unknown_attribute(other.type_name(), attribute, span)),
        }
    }

    fn index(&self, name: &Name, index: &Value, span: Span) -> Result<Value, InterpreterError> {
        match self.lookup(name)? {
            Value::CodeBlock(block) => {
                let position = checked_index(index, block.len(), span)?;
                Ok(block.statement(position).map_or(Value::None, Value::CodeBlock))
            }
            Value::List(values) => {
                let values = values.borrow();
                let position = checked_index(index, values.len(), span)?;
                let value = values[position].clone();
                Ok(value)
            }
            Value::Str(text) => {
                let position = checked_index(index, text.chars().count(), span)?;
                let character = text.chars().nth(position).map(String::from);
                Ok(character.map_or(Value::None, |c| Value::Str(c.into())))
            }
            other => Err(InterpreterError::NotIndexable {
                name: name.to_string(),
                type_name: other.type_name(),
                span,
            }),
        }
    }

    fn set_index(
        &mut self,
        name: &Name,
        index: &Value,
        value: Value,
        span: Span,
    ) -> Result<(), InterpreterError> {
        match self.lookup(name)? {
            Value::List(values) => {
                let mut values = values.borrow_mut();
                let position = checked_index(index, values.len(), span)?;
                values[position] = value;
                Ok(())
            }
            other @ (Value::Str(_) | Value::CodeBlock(_)) => Err(InterpreterError::ImmutableValue {
                name: name.to_string(),
                type_name: other.type_name(),
                span,
            }),
            other => Err(InterpreterError::NotIndexable {
                name: name.to_string(),
                type_name: other.type_name(),
                span,
            }),
        }
    }

    fn call(
        &mut self,
        callee: &Callee,
        arguments: &[Node],
        span: Span,
    ) -> Result<FlowControl, InterpreterError> {
        trace!(callee = %callee, arguments = arguments.len(), depth = self.depth, "call");
        match callee {
            Callee::Function(name) => self.call_function(name, arguments, span),
            Callee::Method(object, method) => self.call_method(object, method, arguments, span),
        }
    }

    // Resolution order: builtin, user function, class, code block.
    fn call_function(
        &mut self,
        name: &Name,
        arguments: &[Node],
        span: Span,
    ) -> Result<FlowControl, InterpreterError> {
        if let Some(builtin) = builtins::lookup(name.as_str()) {
            return self.call_builtin(builtin, arguments, span);
        }
        if let Some(function) = self.resolve_function(name.as_str()) {
            return self.call_user_function(&function, None, arguments, span);
        }
        match self.environment.get(name.as_str()) {
            Some(Value::Class(class)) => {
                let instance = class.instantiate();
                Ok(FlowControl::Next(Value::Instance(Rc::new(RefCell::new(
                    instance,
                )))))
            }
            Some(Value::CodeBlock(block)) if arguments.is_empty() => {
                self.run_block(&block.statements)
            }
            _ => Err(InterpreterError::UndefinedFunction {
                name: name.to_string(),
                span: name.span(),
            }),
        }
    }

    fn call_method(
        &mut self,
        object: &Name,
        method: &Name,
        arguments: &[Node],
        span: Span,
    ) -> Result<FlowControl, InterpreterError> {
        match self.environment.get(object.as_str()) {
            Some(Value::CodeBlock(block)) => match method.as_str() {
                "execute" if arguments.is_empty() => self.run_block(&block.statements),
                "execute" => Err(InterpreterError::ArityMismatch {
                    function: "execute".to_string(),
                    expected: 0,
                    actual: arguments.len(),
                    span,
                }),
                _ => Err(unknown_attribute("codeblock", method, span)),
            },
            Some(Value::Instance(instance)) => {
                let (class_name, definition) = {
                    let instance = instance.borrow();
                    let definition = instance.class.method(method.as_str()).cloned();
                    (Rc::clone(&instance.class.name), definition)
                };
                let Some(definition) = definition else {
                    return Err(unknown_attribute(&class_name, method, span));
                };
                let function = Function {
                    definition,
                    module: None,
                };
                let receiver = Value::Instance(instance);
                self.call_user_function(&function, Some(receiver), arguments, span)
            }
            Some(other) => Err(unknown_attribute(other.type_name(), method, span)),
            None => {
                let Some(module) = self.aliases.get(object.as_str()).cloned() else {
                    return Err(InterpreterError::UndefinedVariable {
                        name: object.to_string(),
                        span: object.span(),
                    });
                };
                let Some(function) = module.functions.get(method.as_str()) else {
                    return Err(InterpreterError::MissingExport {
                        module: module.path.clone(),
                        name: method.to_string(),
                        span: method.span(),
                    });
                };
                let function = exported(&module, function);
                self.call_user_function(&function, None, arguments, span)
            }
        }
    }

    fn resolve_function(&self, name: &str) -> Option<Function> {
        self.scope
            .last()
            .and_then(|module| module.functions.get(name))
            .or_else(|| self.functions.get(name))
            .cloned()
    }

    fn call_builtin(
        &mut self,
        builtin: Builtin,
        arguments: &[Node],
        span: Span,
    ) -> Result<FlowControl, InterpreterError> {
        if arguments.len() != builtin.arity {
            return Err(InterpreterError::ArityMismatch {
                function: builtin.name.to_string(),
                expected: builtin.arity,
                actual: arguments.len(),
                span,
            });
        }
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(value!(self.interpret(argument)?));
        }
        (builtin.func)(self, values, span).map(FlowControl::Next)
    }

    /// Calls a user-defined function or method. Arguments are evaluated in
    /// the caller's bindings, then bound over a snapshot of the environment
    /// that is restored when the call ends, whether it returns or fails.
    fn call_user_function(
        &mut self,
        function: &Function,
        receiver: Option<Value>,
        arguments: &[Node],
        span: Span,
    ) -> Result<FlowControl, InterpreterError> {
        let definition = Rc::clone(&function.definition);
        // A method's first parameter receives the instance.
        let implicit = usize::from(receiver.is_some() && !definition.parameters.is_empty());
        let (receiver_parameter, parameters) = definition.parameters.split_at(implicit);
        if arguments.len() != parameters.len() {
            return Err(InterpreterError::ArityMismatch {
                function: definition.name().to_string(),
                expected: parameters.len(),
                actual: arguments.len(),
                span,
            });
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(InterpreterError::RecursionLimit {
                limit: MAX_CALL_DEPTH,
                span,
            });
        }

        let mut bindings = Vec::with_capacity(definition.parameters.len());
        if let (Some(parameter), Some(receiver)) = (receiver_parameter.first(), receiver) {
            bindings.push((Rc::clone(&parameter.name.name), receiver));
        }
        for (parameter, argument) in parameters.iter().zip(arguments) {
            let value = match (parameter.kind, argument) {
                (ParameterKind::CodeBlock, Node::CodeBlock(statements, _)) => {
                    Value::CodeBlock(CodeBlock::new(Rc::clone(statements)))
                }
                (ParameterKind::CodeBlock, _) => {
                    return Err(InterpreterError::CodeBlockRequired {
                        function: definition.name().to_string(),
                        parameter: parameter.name.to_string(),
                        span: argument.span(),
                    })
                }
                (ParameterKind::Value, argument) => value!(self.interpret(argument)?),
            };
            bindings.push((Rc::clone(&parameter.name.name), value));
        }

        let snapshot = self.environment.snapshot();
        for (name, value) in bindings {
            self.environment.set(name, value);
        }
        if let Some(module) = &function.module {
            self.scope.push(Rc::clone(module));
        }
        self.depth += 1;
        let result = ensure_sufficient_stack(|| self.run_block(&definition.body));
        self.depth -= 1;
        if function.module.is_some() {
            self.scope.pop();
        }
        self.environment.restore(snapshot);

        match result? {
            FlowControl::Next(value) | FlowControl::Return(value, _) => Ok(FlowControl::Next(value)),
        }
    }
}

fn unknown_attribute(type_name: &str, attribute: &Name, span: Span) -> InterpreterError {
    InterpreterError::UnknownAttribute {
        type_name: type_name.to_string(),
        attribute: attribute.to_string(),
        span,
    }
}

fn checked_index(index: &Value, length: usize, span: Span) -> Result<usize, InterpreterError> {
    let Value::Int(index) = index else {
        return Err(InterpreterError::NonIntegerIndex {
            type_name: index.type_name(),
            span,
        });
    };
    usize::try_from(*index)
        .ok()
        .filter(|position| *position < length)
        .ok_or(InterpreterError::IndexOutOfBounds {
            index: *index,
            length,
            span,
        })
}

#[cfg(test)]
mod test;
