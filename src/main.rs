use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bcc::interpreter::DEFAULT_LIB_PATH;
use bcc::{parse, Diagnostic, Interpreter, LibraryConfig, ParserState, Tokenizer};
use clap::Parser;
use const_format::formatcp;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;

const PROMPT: &str = ">> ";
const CONTINUATION_PROMPT: &str = ".. ";
const REPL_SOURCE: &str = "<stdin>";

const HELP: &str = formatcp!(
    "\
BCC quick reference

  x = 1 + 2 * 3                   assignment (int, string, arithmetic)
  print(x)  printnln(x)           print with / without a newline
  println(x)                      built-in, prints without a newline
  if (x > 1) {{ ... }}              conditional, no else
  while (x < 3) {{ ... }}           loop
  for (i = 0, i < 3, i = i + 1) {{ ... }}
  def public f(a, b) {{ return a + b }}
  def public run(cb: BCC.Codeblock) {{ cb }}
  run {{ print(1) }}                 pass a code block
  nsreturn cb                     run a block without leaving the function
  class P {{ x = 1  def public show(self) {{ print(self.x) }} }}
  e = expr(x + 1)  eval(e)        deferred expressions
  import \"m.bcm\"  from \"m.bcm\" import f  import \"m.bcm\" as m

Built-ins: len eval str int float bool type println
Modules are looked up in {lib} unless given as a path.
Type `exit` to leave the REPL.
",
    lib = DEFAULT_LIB_PATH
);

/// Interpreter for BCC scripts (.bcs). Starts a REPL when no file is given.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Script to run
    file: Option<PathBuf>,
    /// Print the token stream instead of running
    #[arg(long)]
    tokens: bool,
    /// Print the syntax tree instead of running
    #[arg(long)]
    ast: bool,
    /// Only check that the script parses
    #[arg(long)]
    check_syntax: bool,
    /// Directory holding library modules and config.json
    #[arg(long, value_name = "DIR")]
    lib_path: Option<PathBuf>,
    /// Log module loading and configuration
    #[arg(short, long)]
    verbose: bool,
    /// Print a language summary
    #[arg(long)]
    bcchelp: bool,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("bcc=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bcc=warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.bcchelp {
        print!("{HELP}");
        return ExitCode::SUCCESS;
    }

    let result = match &cli.file {
        Some(path) => run_script(path, &cli),
        None => run_repl(&cli),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

/// Builds the root interpreter and applies the library configuration.
fn root_interpreter(cli: &Cli) -> Result<Interpreter, String> {
    let lib_dir = cli
        .lib_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LIB_PATH));
    let config = LibraryConfig::load(&lib_dir).map_err(|err| err.to_string())?;
    let mut interpreter = Interpreter::new();
    interpreter
        .configure(&config)
        .map_err(|err| Diagnostic::new(lib_dir.join(bcc::CONFIG_FILE), &err).to_string())?;
    Ok(interpreter)
}

fn run_script(path: &Path, cli: &Cli) -> Result<(), String> {
    if path.extension().is_some_and(|ext| ext == "bcm") {
        return Err(format!(
            "{} is a module; import it from a .bcs script instead",
            path.display()
        ));
    }
    let source = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    debug!(path = %path.display(), "running script");
    let report = |err: bcc::Error| {
        let diagnostic = Diagnostic::new(path, &err);
        match std::fs::read_to_string(diagnostic.file()) {
            Ok(text) => diagnostic.render(&text),
            Err(_) => diagnostic.render(&source),
        }
    };

    let tokens = bcc::tokenize(&source).map_err(|err| report(err.into()))?;
    if cli.tokens {
        for token in &tokens {
            println!("{token}");
        }
        return Ok(());
    }
    let program = parse(&tokens).map_err(|err| report(err.into()))?;
    if cli.ast {
        for statement in &program {
            println!("{statement:?}");
        }
        return Ok(());
    }
    if cli.check_syntax {
        println!("{}: syntax OK", path.display());
        return Ok(());
    }

    let mut interpreter = root_interpreter(cli)?;
    interpreter
        .execute(&program)
        .map_err(|err| report(err.into()))?;
    Ok(())
}

fn run_repl(cli: &Cli) -> Result<(), String> {
    let mut interpreter = root_interpreter(cli)?;
    let mut rl = DefaultEditor::new().map_err(|err| err.to_string())?;
    let mut tokenizer = Tokenizer::new();
    let mut buffer = String::new();
    println!("BCC {} (type `bcchelp` for help, `exit` to quit)", env!("CARGO_PKG_VERSION"));

    loop {
        let prompt = if buffer.is_empty() {
            PROMPT
        } else {
            CONTINUATION_PROMPT
        };
        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C drops the pending input.
                tokenizer = Tokenizer::new();
                buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.to_string()),
        };

        if buffer.is_empty() {
            match line.trim() {
                "" => continue,
                "exit" => break,
                "bcchelp" => {
                    print!("{HELP}");
                    continue;
                }
                _ => {}
            }
        }
        let _ = rl.add_history_entry(line.as_str());
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(&line);

        if tokenizer.tokenize(std::iter::once(line.as_str())) == ParserState::ContinuationNeeded {
            continue;
        }
        let finished = std::mem::take(&mut tokenizer);
        let source = std::mem::take(&mut buffer);
        if let Err(err) = evaluate_input(&mut interpreter, finished) {
            eprint!("{}", Diagnostic::new(REPL_SOURCE, &err).render(&source));
        }
    }
    Ok(())
}

fn evaluate_input(interpreter: &mut Interpreter, tokenizer: Tokenizer) -> Result<(), bcc::Error> {
    let tokens = tokenizer.finalize()?;
    let program = parse(&tokens)?;
    interpreter.execute(&program)?;
    Ok(())
}
