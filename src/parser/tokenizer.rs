use super::error::{LexicalError, LexicalWarning};
use super::locations::{Location, Span};
use const_format::concatcp;
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Clone, Default, Debug, PartialEq)]
pub struct Token {
    pub(crate) typ: TokenType,
    pub(crate) lexeme: String,
    pub(crate) span: Span,
}

impl Token {
    pub fn kind(&self) -> TokenType {
        self.typ
    }

    /// The literal text of the token. For strings this is the content
    /// between the quotes.
    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    pub fn line(&self) -> usize {
        self.span.line().unwrap_or(1)
    }

    pub fn column(&self) -> usize {
        self.span.column().unwrap_or(0)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}('{}') at {}:{}",
            self.typ,
            self.lexeme,
            self.line(),
            self.column()
        )
    }
}

#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TokenType {
    #[default]
    ENDMARKER,
    NAME,
    NUMBER,
    STRING,
    KEYWORD,
    LPAR,
    RPAR,
    LSQB,
    RSQB,
    LBRACE,
    RBRACE,
    COLON,
    COMMA,
    SEMI,
    DOT,
    PLUS,
    MINUS,
    STAR,
    SLASH,
    EQUAL,
    EQEQUAL,
    LESS,
    GREATER,
    LESSEQUAL,
    GREATEREQUAL,
}

const EQEQUAL: (&str, TokenType) = ("==", TokenType::EQEQUAL);
const LESSEQUAL: (&str, TokenType) = ("<=", TokenType::LESSEQUAL);
const GREATEREQUAL: (&str, TokenType) = (">=", TokenType::GREATEREQUAL);
const LPAR: (&str, TokenType) = ("(", TokenType::LPAR);
const RPAR: (&str, TokenType) = (")", TokenType::RPAR);
const LSQB: (&str, TokenType) = ("[", TokenType::LSQB);
const RSQB: (&str, TokenType) = ("]", TokenType::RSQB);
const LBRACE: (&str, TokenType) = ("{", TokenType::LBRACE);
const RBRACE: (&str, TokenType) = ("}", TokenType::RBRACE);
const COLON: (&str, TokenType) = (":", TokenType::COLON);
const COMMA: (&str, TokenType) = (",", TokenType::COMMA);
const SEMI: (&str, TokenType) = (";", TokenType::SEMI);
const DOT: (&str, TokenType) = (".", TokenType::DOT);
const PLUS: (&str, TokenType) = ("+", TokenType::PLUS);
const MINUS: (&str, TokenType) = ("-", TokenType::MINUS);
const STAR: (&str, TokenType) = ("*", TokenType::STAR);
const SLASH: (&str, TokenType) = ("/", TokenType::SLASH);
const LESS: (&str, TokenType) = ("<", TokenType::LESS);
const GREATER: (&str, TokenType) = (">", TokenType::GREATER);
const EQUAL: (&str, TokenType) = ("=", TokenType::EQUAL);

// Two-character operators come first so that a single lookahead decides
// between `=`/`==`, `<`/`<=` and `>`/`>=`.
const SIMPLE_TOKENS: [(&str, TokenType); 20] = [
    EQEQUAL,
    LESSEQUAL,
    GREATEREQUAL,
    LPAR,
    RPAR,
    LSQB,
    RSQB,
    LBRACE,
    RBRACE,
    COLON,
    COMMA,
    SEMI,
    DOT,
    PLUS,
    MINUS,
    STAR,
    SLASH,
    LESS,
    GREATER,
    EQUAL,
];

pub(crate) const KEYWORDS: [&str; 15] = [
    "print", "printnln", "if", "for", "while", "def", "public", "private", "return", "nsreturn",
    "expr", "class", "import", "from", "as",
];

const S_WHITESPACE: &str = r"^\s+";
const S_COMMENT: &str = r"^//";
const S_NUMBER: &str = r"^[0-9]+";
const S_NAME_START: &str = r"[\p{Alphabetic}_]";
const S_NAME_CONTINUE: &str = r"[\p{Alphabetic}\p{Nd}_]";
const S_NAME: &str = concatcp!("^", S_NAME_START, S_NAME_CONTINUE, "*");

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(S_WHITESPACE).expect("Error compiling regex."));
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(S_COMMENT).expect("Error compiling regex."));
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(S_NUMBER).expect("Error compiling regex."));
static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(S_NAME).expect("Error compiling regex."));

/// An open string literal, carried across line boundaries.
struct OpenString {
    start: Location,
    contents: String,
}

pub struct Tokenizer {
    tokens: Vec<Token>,
    warnings: Vec<LexicalWarning>,
    start: usize,
    lineno: usize,
    last_column: usize,
    paren_lvl: isize,
    open_string: Option<OpenString>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            tokens: vec![],
            warnings: vec![],
            start: 0,
            lineno: 0,
            last_column: 1,
            paren_lvl: 0,
            open_string: None,
        }
    }

    /// Feeds lines of source to the tokenizer. Reports whether the input
    /// seen so far is complete or still inside a string or bracket pair.
    pub fn tokenize<'s>(&mut self, input: impl Iterator<Item = &'s str>) -> ParserState {
        for line in input {
            self.lineno += 1;
            self.tokenize_line(line);
        }
        if self.open_string.is_some() || self.paren_lvl > 0 {
            return ParserState::ContinuationNeeded;
        }
        ParserState::Ok
    }

    pub fn warnings(&self) -> &[LexicalWarning] {
        &self.warnings
    }

    pub fn finalize(mut self) -> Result<Vec<Token>, LexicalError> {
        if let Some(open) = self.open_string.take() {
            return Err(LexicalError::UnterminatedString {
                span: Span::new(
                    open.start.line,
                    open.start.column,
                    open.start.line,
                    open.start.column + 1,
                ),
            });
        }
        let line = self.lineno.max(1);
        self.tokens.push(Token {
            typ: TokenType::ENDMARKER,
            lexeme: String::new(),
            span: Span::new(line, self.last_column, line, self.last_column),
        });
        Ok(self.tokens)
    }

    fn tokenize_line(&mut self, line: &str) {
        self.start = 0;
        self.last_column = line.chars().count() + 1;

        while self.start < line.len() {
            let rest = &line[self.start..];

            if self.open_string.is_some() {
                self.continue_string(line);
                continue;
            }
            if let Some(m) = WHITESPACE.find(rest) {
                self.start += m.end();
                continue;
            }
            if COMMENT.is_match(rest) {
                break;
            }
            if let Some(m) = NUMBER.find(rest) {
                let lexeme = m.as_str().to_string();
                self.push(TokenType::NUMBER, lexeme, line, m.end());
                continue;
            }
            if let Some(m) = NAME.find(rest) {
                let typ = if KEYWORDS.contains(&m.as_str()) {
                    TokenType::KEYWORD
                } else {
                    TokenType::NAME
                };
                self.push(typ, m.as_str().to_string(), line, m.end());
                continue;
            }
            if rest.starts_with('"') {
                self.open_string = Some(OpenString {
                    start: self.location(line, self.start),
                    contents: String::new(),
                });
                self.start += 1;
                continue;
            }
            if let Some((lexeme, tok_type)) = SIMPLE_TOKENS
                .iter()
                .find(|(lexeme, _)| rest.starts_with(lexeme))
            {
                match tok_type {
                    TokenType::LPAR | TokenType::LSQB | TokenType::LBRACE => self.paren_lvl += 1,
                    TokenType::RPAR | TokenType::RSQB | TokenType::RBRACE => self.paren_lvl -= 1,
                    _ => {}
                }
                self.push(*tok_type, lexeme.to_string(), line, lexeme.len());
                continue;
            }

            let chr = rest.chars().next().unwrap_or_default();
            let location = self.location(line, self.start);
            tracing::warn!(
                character = %chr,
                line = location.line,
                column = location.column,
                "skipping unknown character"
            );
            self.warnings.push(LexicalWarning {
                character: chr,
                location,
            });
            self.start += chr.len_utf8().max(1);
        }

        if let Some(open) = self.open_string.as_mut() {
            open.contents.push('\n');
        }
    }

    fn continue_string(&mut self, line: &str) {
        let rest = &line[self.start..];
        let Some(open) = self.open_string.as_mut() else {
            return;
        };
        match rest.find('"') {
            Some(end) => {
                open.contents.push_str(&rest[..end]);
                let start = open.start;
                let contents = std::mem::take(&mut open.contents);
                self.open_string = None;
                self.start += end + 1;
                let end_column = self.location(line, self.start).column;
                self.tokens.push(Token {
                    typ: TokenType::STRING,
                    lexeme: contents,
                    span: Span::new(start.line, start.column, self.lineno, end_column),
                });
            }
            None => {
                open.contents.push_str(rest);
                self.start = line.len();
            }
        }
    }

    fn push(&mut self, typ: TokenType, lexeme: String, line: &str, len: usize) {
        let start = self.location(line, self.start);
        self.start += len;
        let end = self.location(line, self.start);
        self.tokens.push(Token {
            typ,
            lexeme,
            span: Span::new(start.line, start.column, end.line, end.column),
        });
    }

    fn location(&self, line: &str, byte_offset: usize) -> Location {
        Location {
            line: self.lineno,
            column: line[..byte_offset].chars().count() + 1,
        }
    }
}

/// Scans a complete source text. Unknown characters are skipped (and
/// logged); only an unterminated string literal is fatal.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexicalError> {
    let mut tokenizer = Tokenizer::new();
    tokenizer.tokenize(source.split('\n'));
    tokenizer.finalize()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Ok,
    ContinuationNeeded,
}
