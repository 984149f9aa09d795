use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use super::{Interpreter, InterpreterError, Value};

struct Session {
    interpreter: Interpreter,
    output: Rc<RefCell<Vec<u8>>>,
}

impl Session {
    fn new() -> Self {
        let output = Rc::new(RefCell::new(Vec::<u8>::new()));
        let sink: Rc<RefCell<dyn std::io::Write>> = output.clone();
        let interpreter = Interpreter::new().with_output(sink);
        Self {
            interpreter,
            output,
        }
    }

    fn run(&mut self, source: &str) -> Result<Value, crate::Error> {
        self.interpreter.run(source)
    }

    fn output(&self) -> String {
        String::from_utf8_lossy(&self.output.borrow()).into_owned()
    }
}

fn output_of(source: &str) -> String {
    let mut session = Session::new();
    if let Err(err) = session.run(source) {
        panic!("\nFailed to run \"{source}\": {err}\n");
    }
    session.output()
}

fn runtime_error(source: &str) -> InterpreterError {
    let mut session = Session::new();
    match session.run(source) {
        Err(crate::Error::Interpreter(err)) => err,
        Err(err) => panic!("\nExpected \"{source}\" to fail at runtime, got {err:?}\n"),
        Ok(value) => panic!("\nExpected \"{source}\" to fail, got {value:?}\n"),
    }
}

fn assert_runtime_error(source: &str, msg: &str) {
    assert_eq!(msg, runtime_error(source).to_string());
}

#[test]
fn test_println_without_newline() {
    assert_eq!(
        output_of("x = 5\ny = 3\nif (x > y) {\nprintln(\"x>y\")\n}"),
        "x>y"
    );
}

#[test]
fn test_function_return() {
    assert_eq!(
        output_of("def public add(a, b) {\nreturn a + b\n}\nprint(add(2,3))"),
        "5\n"
    );
}

#[test]
fn test_undefined_variable() {
    let err = runtime_error("print(undefined_var)");
    assert!(matches!(
        &err,
        InterpreterError::UndefinedVariable { name, .. } if name == "undefined_var"
    ));
    assert_eq!(err.span().line(), Some(1));
    assert_eq!(err.span().column(), Some(7));
}

#[test]
fn test_for_loop() {
    assert_eq!(
        output_of("for (i = 0, i < 3, i = i + 1) { print(i) }"),
        "0\n1\n2\n"
    );
    assert_eq!(output_of("i = 5\nfor (, i < 7, i = i + 1) { printnln(i) }"), "56");
}

#[test]
fn test_while_loop() {
    assert_eq!(
        output_of("n = 3\nwhile (n > 0) {\n  printnln(n)\n  n = n - 1\n}\nprint()"),
        "321\n"
    );
}

#[test]
fn test_last_statement_value() {
    let mut session = Session::new();
    assert!(matches!(session.run("1 + 2"), Ok(Value::Int(3))));
    assert!(matches!(session.run("x = 4"), Ok(Value::Int(4))));
    assert!(matches!(session.run("x > 3"), Ok(Value::Bool(true))));
    assert!(matches!(session.run("print(x)"), Ok(Value::None)));
}

#[test]
fn test_arithmetic() {
    assert_eq!(output_of("print(1 + 2 * 3)"), "7\n");
    assert_eq!(output_of("print((1 + 2) * 3)"), "9\n");
    assert_eq!(output_of("print(7 / 2)"), "3.5\n");
    assert_eq!(output_of("print(4 / 2)"), "2.0\n");
    assert_eq!(output_of("print(8 - 3 - 1)"), "4\n");
    assert_eq!(output_of("print(1 + float(5) / 2)"), "3.5\n");
    assert_eq!(output_of("print(\"ab\" + \"cd\")"), "abcd\n");
    assert_eq!(output_of("print(\"ab\" * 3)"), "ababab\n");
    assert_eq!(output_of("print(2 == 4 / 2)"), "true\n");
    assert_eq!(output_of("print(\"a\" < \"b\")"), "true\n");
    assert_eq!(output_of("print(3 >= 4)"), "false\n");
}

#[test]
fn test_arithmetic_errors() {
    assert_runtime_error("x = 1 / 0", "division by zero");
    assert_runtime_error(
        "x = \"a\" - 1",
        "unsupported operand types for '-': str and int",
    );
    assert_runtime_error(
        "x = 9223372036854775807 + 1",
        "integer overflow in '+'",
    );
    assert_runtime_error(
        "x = \"a\" < 1",
        "unsupported operand types for '<': str and int",
    );
}

#[test]
fn test_string_repetition() {
    assert_eq!(output_of("print(2 * \"c\")"), "cc\n");
    assert_runtime_error(
        "x = \"ab\" * 9223372036854775807",
        "string of 18446744073709551614 bytes exceeds the limit of 268435456",
    );
}

#[test]
fn test_recursion() {
    let source = "def public fact(n) {\n  if (n < 2) { return 1 }\n  return n * fact(n - 1)\n}\nprint(fact(10))";
    assert_eq!(output_of(source), "3628800\n");
}

#[test]
fn test_implicit_result() {
    assert_eq!(
        output_of("def public last() {\n  a = 1\n  a + 41\n}\nprint(last())"),
        "42\n"
    );
    assert_eq!(output_of("def public empty() { }\nprint(empty())"), "none\n");
}

#[test]
fn test_call_restores_environment() {
    let mut session = Session::new();
    let source = "x = 1\ndef public f(x) {\n  x = 99\n  y = 5\n}\nf(2)\nprint(x)";
    session.run(source).expect("script runs");
    assert_eq!(session.output(), "1\n");
    assert!(!session.interpreter.environment().contains("y"));
}

#[test]
fn test_failed_call_restores_environment() {
    let mut session = Session::new();
    session
        .run("x = 1\ndef public g(x) {\n  x = 50\n  print(missing)\n}")
        .expect("definitions run");
    assert!(session.run("g(3)").is_err());
    assert!(matches!(session.interpreter.variable("x"), Some(Value::Int(1))));
    assert!(session.interpreter.variable("missing").is_none());
}

#[test]
fn test_globals_visible_in_calls() {
    assert_eq!(
        output_of("base = 10\ndef public shift(n) { return base + n }\nprint(shift(5))"),
        "15\n"
    );
}

#[test]
fn test_arity_mismatch() {
    let mut session = Session::new();
    session
        .run("def public add(a, b) {\n  print(\"ran\")\n  return a + b\n}")
        .expect("definition runs");
    let err = session.run("add(1)").unwrap_err();
    assert_eq!(err.to_string(), "add() expects 2 argument(s), got 1");
    assert_eq!(session.output(), "");

    assert_runtime_error("len(1, 2)", "len() expects 1 argument(s), got 2");
    assert_runtime_error("x = str()", "str() expects 1 argument(s), got 0");
}

#[test]
fn test_undefined_function() {
    assert_runtime_error("nothing(1)", "undefined function 'nothing'");
}

#[test]
fn test_builtins() {
    assert_eq!(output_of("print(len(\"hello\"))"), "5\n");
    assert_eq!(output_of("print(int(\"12\") + 1)"), "13\n");
    assert_eq!(output_of("print(float(3))"), "3.0\n");
    assert_eq!(output_of("print(str(12) + \"!\")"), "12!\n");
    assert_eq!(output_of("print(bool(0))"), "false\n");
    assert_eq!(output_of("print(type(1 / 2))"), "float\n");
}

#[test]
fn test_code_block_parameters() {
    let source = "def public twice(cb: BCC.Codeblock) {\n  cb\n  cb.execute()\n}\ntwice { printnln(\"hi \") }";
    assert_eq!(output_of(source), "hi hi ");

    let source = "def public run(n, cb: BCC.Codeblock) {\n  cb\n}\nrun(1) { print(\"trailing\") }";
    assert_eq!(output_of(source), "trailing\n");
}

#[test]
fn test_code_block_required() {
    assert_runtime_error(
        "def public run(cb: BCC.Codeblock) { cb }\nrun(1)",
        "parameter 'cb' of run() requires a code block",
    );
}

#[test]
fn test_code_block_indexing() {
    let source = "def public show(cb: BCC.Codeblock) {\n  print(len(cb))\n  first = cb[1]\n  first\n  print(cb)\n  lines = cb.lines\n  print(len(lines))\n}\nshow { print(\"a\"); print(\"b\") }";
    assert_eq!(output_of(source), "2\nb\n<codeblock (2 statements)>\n2\n");
}

#[test]
fn test_code_block_runs_in_caller_environment() {
    let source = "def public apply(cb: BCC.Codeblock) {\n  x = 7\n  cb\n}\nx = 1\napply { print(x) }\nprint(x)";
    assert_eq!(output_of(source), "7\n1\n");
}

#[test]
fn test_bare_code_block_is_a_value() {
    let mut session = Session::new();
    let value = session.run("{ print(1) }").expect("block evaluates");
    assert!(matches!(value, Value::CodeBlock(ref block) if block.len() == 1));
    assert_eq!(session.output(), "");
}

#[test]
fn test_return_in_inline_block_unwinds_call() {
    let mut session = Session::new();
    let source = "def public first(cb: BCC.Codeblock) {\n  cb\n  print(\"unreachable\")\n}\nfirst { return 3 }";
    assert!(matches!(session.run(source), Ok(Value::Int(3))));
    assert_eq!(session.output(), "");
}

#[test]
fn test_nsreturn() {
    let source = "def public run(cb: BCC.Codeblock) {\n  nsreturn cb\n  print(\"after\")\n}\nrun { print(\"inside\") }";
    assert_eq!(output_of(source), "inside\nafter\n");

    let mut session = Session::new();
    let source = "def public run(cb: BCC.Codeblock) {\n  nsreturn cb\n}\nrun { return 5\nprint(\"skipped\") }";
    assert!(matches!(session.run(source), Ok(Value::Int(5))));
    assert_eq!(session.output(), "");

    let source = "def public run(cb: BCC.Codeblock) {\n  nsreturn cb\n  print(\"after\")\n}\nrun { return 5 }";
    assert_eq!(output_of(source), "after\n");
}

#[test]
fn test_classes() {
    let source = "class Counter {\n  count = 0\n  def public increment(self) {\n    self.count = self.count + 1\n  }\n}\nc = Counter()\nc.increment()\nc.increment()\nprint(c.count)\nd = Counter(1, 2)\nprint(d.count)\nprint(d)";
    assert_eq!(output_of(source), "2\n0\n<Counter instance>\n");
}

#[test]
fn test_method_arguments() {
    let source = "class Greeter {\n  greeting = \"hello \"\n  def public greet(self, name) { return self.greeting + name }\n}\ng = Greeter()\nprint(g.greet(\"bob\"))";
    assert_eq!(output_of(source), "hello bob\n");
    assert_runtime_error(
        "class A {\n  def public m(self, x) { }\n}\na = A()\na.m()",
        "m() expects 1 argument(s), got 0",
    );
}

#[test]
fn test_attribute_errors() {
    assert_runtime_error(
        "class A { x = 1 }\na = A()\nprint(a.y)",
        "A has no attribute 'y'",
    );
    assert_runtime_error("n = 1\nn.x = 2", "int has no attribute 'x'");
    assert_runtime_error("class A { }\na = A()\na.go()", "A has no attribute 'go'");
}

#[test]
fn test_indexing() {
    assert_eq!(output_of("s = \"hey\"\nprint(s[1])"), "e\n");
    assert_runtime_error("s = \"hey\"\nprint(s[3])", "index 3 out of bounds for length 3");
    assert_runtime_error("s = \"hey\"\nprint(s[\"a\"])", "index must be an integer, got str");
    assert_runtime_error("n = 5\nprint(n[0])", "'n' is a int and cannot be indexed");
    assert_runtime_error(
        "s = \"hey\"\ns[0] = \"b\"",
        "'s' is a str and does not support item assignment",
    );
}

#[test]
fn test_list_assignment() {
    let source = "def public edit(cb: BCC.Codeblock) {\n  l = cb.lines\n  l[0] = 42\n  print(l)\n}\nedit { x = 1; y = 2 }";
    assert_eq!(output_of(source), "[42, <codeblock (1 statements)>]\n");
}

#[test]
fn test_list_containing_itself() {
    let source = "def public nest(cb: BCC.Codeblock) {\n  l = cb.lines\n  l[0] = l\n  print(l)\n}\nnest { x = 1; y = 2 }";
    assert_eq!(output_of(source), "[[...], <codeblock (1 statements)>]\n");
}

#[test]
fn test_expr_and_eval() {
    assert_eq!(
        output_of("a = 1\ne = expr(a + 1)\na = 10\nprint(eval(e))\nprint(e)"),
        "11\n<expr>\n"
    );
    assert_runtime_error(
        "x = eval(3)",
        "eval() requires an expr(...) value, got int",
    );
}

#[test]
fn test_return_outside_function() {
    let err = runtime_error("x = 1\nreturn x");
    assert!(matches!(err, InterpreterError::ReturnOutsideFunction { .. }));
    assert_eq!(err.span().line(), Some(2));
}

#[test]
fn test_codeblock_marker_without_bcc() {
    assert_eq!(output_of("print(BCC.Codeblock)"), "BCC.Codeblock\n");
}

#[test]
fn test_recursion_limit() {
    let err = runtime_error("def public down(n) { return down(n + 1) }\ndown(0)");
    assert_eq!(err.to_string(), "maximum call depth of 256 exceeded");
}

#[test]
fn test_deep_recursion_below_limit() {
    let source = "def public down(n) {\n  if (n > 0) { return down(n - 1) }\n  return 0\n}\nprint(down(250))";
    assert_eq!(output_of(source), "0\n");
}

#[test]
fn test_state_persists_between_runs() {
    let mut session = Session::new();
    session.run("def public sq(n) { return n * n }").expect("definition runs");
    session.run("x = sq(4)").expect("call runs");
    assert!(session.interpreter.has_function("sq"));
    assert!(matches!(session.interpreter.variable("x"), Some(Value::Int(16))));
}
