use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use bcc::{Diagnostic, Error, Interpreter, InterpreterError, LibraryConfig};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct Script {
    interpreter: Interpreter,
    output: Rc<RefCell<Vec<u8>>>,
}

impl Script {
    fn new(lib_path: &Path) -> Self {
        let output = Rc::new(RefCell::new(Vec::<u8>::new()));
        let sink: Rc<RefCell<dyn Write>> = output.clone();
        let interpreter = Interpreter::new().with_lib_path(lib_path).with_output(sink);
        Self {
            interpreter,
            output,
        }
    }

    fn run(&mut self, source: &str) -> Result<bcc::Value, Error> {
        bcc::run(source, &mut self.interpreter)
    }

    fn output(&self) -> String {
        String::from_utf8_lossy(&self.output.borrow()).into_owned()
    }
}

fn library(modules: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    for (name, source) in modules {
        std::fs::write(dir.path().join(name), source).expect("write module");
    }
    dir
}

const MATH: &str = "\
def private helper() {
  return 2
}
def public double(n) {
  return n * helper()
}
";

#[test]
fn test_scenarios() {
    let dir = library(&[]);
    let mut script = Script::new(dir.path());
    script
        .run("x = 5\ny = 3\nif (x > y) {\nprintln(\"x>y\")\n}")
        .expect("script runs");
    script
        .run("\ndef public add(a, b) {\nreturn a + b\n}\nprint(add(2,3))")
        .expect("script runs");
    script
        .run("for (i = 0, i < 3, i = i + 1) { print(i) }")
        .expect("script runs");
    assert_eq!(script.output(), "x>y5\n0\n1\n2\n");
}

#[test]
fn test_module_evaluated_once() {
    let dir = library(&[(
        "greet.bcm",
        "print(\"loading\")\ndef public hello() { print(\"hello\") }",
    )]);
    let mut script = Script::new(dir.path());
    script
        .run("import \"greet.bcm\"\nimport \"greet.bcm\"\nhello()")
        .expect("script runs");
    script.run("import \"greet.bcm\"").expect("import runs");
    assert_eq!(script.output(), "loading\nhello\n");
}

#[test]
fn test_import_by_path() {
    let dir = library(&[("math.bcm", MATH)]);
    let path = dir.path().join("math.bcm");
    let mut script = Script::new(Path::new("does-not-exist"));
    script
        .run(&format!("import \"{}\"\nprint(double(21))", path.display()))
        .expect("script runs");
    assert_eq!(script.output(), "42\n");
}

#[test]
fn test_private_helpers_resolve_in_module() {
    let dir = library(&[("math.bcm", MATH)]);
    let mut script = Script::new(dir.path());
    script
        .run("from \"math.bcm\" import double\nprint(double(4))")
        .expect("script runs");
    assert_eq!(script.output(), "8\n");
    assert!(script.interpreter.has_function("double"));
    assert!(!script.interpreter.has_function("helper"));
}

#[test]
fn test_import_alias() {
    let dir = library(&[("math.bcm", MATH)]);
    let mut script = Script::new(dir.path());
    script
        .run("import \"math.bcm\" as m\nprint(m.double(3))")
        .expect("script runs");
    assert_eq!(script.output(), "6\n");
    assert!(!script.interpreter.has_function("double"));
}

#[test]
fn test_variables_are_not_merged() {
    let dir = library(&[("vars.bcm", "x = 5\ndef public f() { return 1 }")]);
    let mut script = Script::new(dir.path());
    let err = script.run("import \"vars.bcm\"\nprint(x)").unwrap_err();
    assert_eq!(err.to_string(), "undefined variable 'x'");
    assert!(script.interpreter.has_function("f"));
}

#[test]
fn test_module_not_found() {
    let dir = library(&[]);
    let mut script = Script::new(dir.path());
    let err = script.run("import \"missing.bcm\"").unwrap_err();
    assert_eq!(err.to_string(), "module not found: missing.bcm");
}

#[test]
fn test_missing_export() {
    let dir = library(&[("math.bcm", MATH)]);
    let mut script = Script::new(dir.path());
    let err = script.run("from \"math.bcm\" import triple").unwrap_err();
    assert!(matches!(
        err,
        Error::Interpreter(InterpreterError::MissingExport { ref name, .. }) if name == "triple"
    ));
}

#[test]
fn test_circular_import() {
    let dir = library(&[
        ("a.bcm", "import \"b.bcm\"\ndef public a() { return 1 }"),
        ("b.bcm", "import \"a.bcm\"\ndef public b() { return 2 }"),
    ]);
    let mut script = Script::new(dir.path());
    let err = script.run("import \"a.bcm\"").unwrap_err();

    let Error::Interpreter(InterpreterError::ModuleFailed { module, source, .. }) = &err else {
        panic!("expected a module failure, got {err:?}");
    };
    assert!(module.ends_with("a.bcm"));
    let Error::Interpreter(InterpreterError::ModuleFailed { module, source, .. }) = source.as_ref()
    else {
        panic!("expected a nested module failure, got {source:?}");
    };
    assert!(module.ends_with("b.bcm"));
    assert!(matches!(
        source.as_ref(),
        Error::Interpreter(InterpreterError::CircularImport { module, .. }) if module.ends_with("a.bcm")
    ));

    let diagnostic = Diagnostic::new("main.bcs", &err);
    assert!(diagnostic.file().ends_with("b.bcm"));
    assert_eq!(diagnostic.line, 1);
}

#[test]
fn test_error_inside_module() {
    let dir = library(&[("broken.bcm", "def public f() { return 1 }\nprint(nothing)")]);
    let mut script = Script::new(dir.path());
    let err = script.run("x = 1\nimport \"broken.bcm\"").unwrap_err();
    let diagnostic = Diagnostic::new("main.bcs", &err);
    assert!(diagnostic.file().ends_with("broken.bcm"));
    assert_eq!(diagnostic.line, 2);
    assert_eq!(diagnostic.column, Some(7));
    assert_eq!(diagnostic.message, "undefined variable 'nothing'");
    assert!(!script.interpreter.has_function("f"));
}

#[test]
fn test_failed_module_can_be_retried() {
    let dir = library(&[("late.bcm", "print(missing)")]);
    let mut script = Script::new(dir.path());
    assert!(script.run("import \"late.bcm\"").is_err());
    std::fs::write(dir.path().join("late.bcm"), "def public ok() { print(\"ok\") }")
        .expect("rewrite module");
    script.run("import \"late.bcm\"\nok()").expect("script runs");
    assert_eq!(script.output(), "ok\n");
}

#[test]
fn test_configure_autoload() {
    let dir = library(&[
        ("math.bcm", MATH),
        ("config.json", r#"{ "autoload": ["math.bcm"] }"#),
    ]);
    let config = LibraryConfig::load(dir.path()).expect("valid configuration");
    let mut script = Script::new(Path::new("elsewhere"));
    script.interpreter.configure(&config).expect("autoload succeeds");
    assert!(script.interpreter.has_function("double"));
    assert_eq!(script.interpreter.lib_path(), dir.path());
    script.run("print(double(5))").expect("script runs");
    assert_eq!(script.output(), "10\n");
}

#[test]
fn test_configure_lib_path_override() {
    let modules = library(&[("math.bcm", MATH)]);
    let config = LibraryConfig {
        lib_path: modules.path().to_path_buf(),
        autoload: vec![],
    };
    let mut script = Script::new(Path::new("elsewhere"));
    script.interpreter.configure(&config).expect("configuration applies");
    script
        .run("import \"math.bcm\"\nprint(double(1))")
        .expect("script runs");
    assert_eq!(script.output(), "2\n");
}

#[test]
fn test_autoload_missing_module() {
    let dir = library(&[]);
    let mut script = Script::new(dir.path());
    let err = script.interpreter.autoload(&["nowhere.bcm"]).unwrap_err();
    assert_eq!(err.to_string(), "module not found: nowhere.bcm");
}
