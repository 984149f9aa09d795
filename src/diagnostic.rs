use std::fmt;
use std::path::{Path, PathBuf};

use crate::interpreter::InterpreterError;
use crate::parser::{Span, Token};
use crate::Error;

/// Lines of source shown on each side of the offending line.
const CONTEXT_LINES: usize = 2;

/// A reportable error pinned to a source file. Errors raised inside an
/// imported module are attributed to the module file.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub file: PathBuf,
    pub line: usize,
    pub column: Option<usize>,
    pub message: String,
    pub token: Option<Token>,
    width: usize,
}

impl Diagnostic {
    pub fn new(file: impl Into<PathBuf>, error: &Error) -> Self {
        let file = file.into();
        match error {
            Error::Interpreter(InterpreterError::ModuleFailed { module, source, .. }) => {
                Self::new(module.clone(), source)
            }
            Error::Parse(err) => {
                let token = err.token().clone();
                let mut diagnostic = Self::at(file, err.message().to_string(), err.span());
                if token.lexeme().is_empty() {
                    diagnostic.width = 1;
                }
                diagnostic.token = Some(token);
                diagnostic
            }
            Error::Lexical(err) => Self::at(file, err.to_string(), err.span()),
            Error::Interpreter(err) => Self::at(file, err.to_string(), err.span()),
            Error::Config(_) | Error::Io { .. } => Self::at(file, error.to_string(), Span::Indetermined),
        }
    }

    fn at(file: PathBuf, message: String, span: Span) -> Self {
        let width = match (span.start(), span.end()) {
            (Some(start), Some(end)) if start.line == end.line => {
                end.column.saturating_sub(start.column).max(1)
            }
            _ => 1,
        };
        Self {
            file,
            line: span.line().unwrap_or(1),
            column: span.column(),
            message,
            token: None,
            width,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Renders the diagnostic with the surrounding lines of `source` and a
    /// caret marker under the offending token.
    pub fn render(&self, source: &str) -> String {
        Report {
            diagnostic: self,
            source,
        }
        .to_string()
    }
}

/// A diagnostic together with the source it points into.
struct Report<'a> {
    diagnostic: &'a Diagnostic,
    source: &'a str,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostic {
            file,
            line,
            column,
            message,
            width,
            ..
        } = self.diagnostic;
        writeln!(f, "error: {message}")?;
        match column {
            Some(column) => writeln!(f, " --> {}:{line}:{column}", file.display())?,
            None => writeln!(f, " --> {}:{line}", file.display())?,
        }

        let lines: Vec<&str> = self.source.lines().collect();
        if lines.is_empty() {
            return Ok(());
        }
        let line = (*line).clamp(1, lines.len());
        let first = line.saturating_sub(CONTEXT_LINES).max(1);
        let last = (line + CONTEXT_LINES).min(lines.len());
        let gutter = last.to_string().len();

        writeln!(f, "{:gutter$} |", "")?;
        for number in first..=last {
            writeln!(f, "{number:>gutter$} | {}", lines[number - 1])?;
            if let (true, Some(column)) = (number == line, column) {
                writeln!(
                    f,
                    "{:gutter$} | {}{}",
                    "",
                    " ".repeat(column.saturating_sub(1)),
                    "^".repeat(*width)
                )?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)?;
        if let Some(column) = self.column {
            write!(f, ":{column}")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(token) = &self.token {
            write!(f, " (found '{}')", token.lexeme())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::Interpreter;

    fn diagnose(source: &str) -> Diagnostic {
        let mut interpreter = Interpreter::new();
        let err = interpreter.run(source).unwrap_err();
        Diagnostic::new("main.bcs", &err)
    }

    #[test]
    fn test_runtime_position() {
        let diagnostic = diagnose("x = 1\nprint(undefined_var)");
        assert_eq!(diagnostic.line, 2);
        assert_eq!(diagnostic.column, Some(7));
        assert_eq!(diagnostic.message, "undefined variable 'undefined_var'");
        assert_eq!(
            diagnostic.to_string(),
            "main.bcs:2:7: undefined variable 'undefined_var'"
        );
    }

    #[test]
    fn test_parse_token() {
        let diagnostic = diagnose("while (x) print(x)");
        assert_eq!(diagnostic.line, 1);
        assert_eq!(diagnostic.column, Some(11));
        assert_eq!(diagnostic.token.as_ref().map(Token::lexeme), Some("print"));
        assert_eq!(
            diagnostic.to_string(),
            "main.bcs:1:11: expected '{' to open while body (found 'print')"
        );
    }

    #[test]
    fn test_unterminated_string() {
        let diagnostic = diagnose("x = 1\ny = \"open");
        assert_eq!(diagnostic.line, 2);
        assert_eq!(diagnostic.column, Some(5));
        assert!(diagnostic.token.is_none());
    }

    #[test]
    fn test_render() {
        let source = "a = 1\nb = 2\nc = 3\nprint(missing)\nd = 4\ne = 5\nf = 6";
        let diagnostic = diagnose(source);
        let expected = "\
error: undefined variable 'missing'
 --> main.bcs:4:7
  |
2 | b = 2
3 | c = 3
4 | print(missing)
  |       ^^^^^^^
5 | d = 4
6 | e = 5
";
        assert_eq!(diagnostic.render(source), expected);
    }

    #[test]
    fn test_unknown_position() {
        let err = Error::Io {
            path: PathBuf::from("gone.bcs"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let diagnostic = Diagnostic::new("gone.bcs", &err);
        assert_eq!(diagnostic.line, 1);
        assert_eq!(diagnostic.column, None);
        assert_eq!(
            diagnostic.render("x = 1"),
            "error: failed to read gone.bcs: not found\n --> gone.bcs:1\n  |\n1 | x = 1\n"
        );
    }
}
