// # ========================= START OF THE GRAMMAR =========================

// # Notation:
// #
// # * Strings with single quotes ('def') denote KEYWORDS
// # * Upper case names (NAME) denote tokens
// # e1 e2      Match e1, then match e2.
// # e1 | e2    Match e1 or e2 (first match wins).
// # [ e ]      Optionally match e.
// # e*         Match zero or more occurrences of e.
// # ~          Commit to the current alternative: a failure after this point
// #            is reported as a parse error instead of trying the next one.

use std::rc::Rc;

use super::ast::*;
use super::combinators::*;
use super::error::ParseError;
use super::locations::{Locatable, Span};
use super::tokenizer::{Token, TokenType as TT};
use crate::stack::ensure_sufficient_stack;

pub fn parse(input: &[Token]) -> Result<Vec<Node>, ParseError> {
    match file_.parse(input) {
        ParseResult::Ok((statements, _)) => Ok(statements),
        ParseResult::Err => Err(ParseError::new("invalid statement", input)),
        ParseResult::Fatal(error) => Err(error),
    }
}

// # STARTING RULES
// # ==============

// file: statements ENDMARKER
fn file_(input: &[Token]) -> ParseResult<Vec<Node>> {
    left(statements, cut(tok(TT::ENDMARKER), "invalid statement")).parse(input)
}

// statements: (';'* statement)* ';'*
fn statements(input: &[Token]) -> ParseResult<Vec<Node>> {
    left(
        zero_or_more(right(zero_or_more(tok(TT::SEMI)), statement)),
        zero_or_more(tok(TT::SEMI)),
    )
    .parse(input)
}

// statement:
//     | while_stmt
//     | import_stmt
//     | from_stmt
//     | code_block
//     | function_def
//     | class_def
//     | if_stmt
//     | for_stmt
//     | print_stmt
//     | printnln_stmt
//     | nsreturn_stmt
//     | return_stmt
//     | identifier_stmt
//     | comparison
fn statement(input: &[Token]) -> ParseResult<Node> {
    ensure_sufficient_stack(|| {
        while_stmt
            .or(import_stmt)
            .or(from_stmt)
            .or(code_block)
            .or(function_def)
            .or(class_def)
            .or(if_stmt)
            .or(for_stmt)
            .or(print_stmt)
            .or(printnln_stmt)
            .or(nsreturn_stmt)
            .or(return_stmt)
            .or(identifier_stmt)
            .or(comparison)
            .parse(input)
    })
}

// # Common elements
// # ---------------

// name: NAME
fn name(input: &[Token]) -> ParseResult<Name> {
    tok(TT::NAME).map(Name::from).parse(input)
}

// block: '{' ~ block_body
fn block<'a>(construct: &'static str) -> impl Parser<'a, Vec<Node>> {
    right(
        cut(tok(TT::LBRACE), format!("expected '{{' to open {construct}")),
        block_body(construct),
    )
}

// block_body: statements '}'
fn block_body<'a>(construct: &'static str) -> impl Parser<'a, Vec<Node>> {
    left(
        statements,
        cut(tok(TT::RBRACE), format!("missing '}}' to close {construct}")),
    )
}

// condition: '(' ~ comparison ')'
fn condition<'a>(keyword: &'static str) -> impl Parser<'a, Node> {
    right(
        cut(
            tok(TT::LPAR),
            format!("{keyword} condition must be wrapped in parentheses"),
        ),
        left(
            cut(comparison, format!("expected a condition after '{keyword} ('")),
            cut(tok(TT::RPAR), "missing ')'"),
        ),
    )
}

// # SIMPLE STATEMENTS
// # =================

// import_stmt: 'import' ~ STRING ['as' ~ NAME]
fn import_stmt(input: &[Token]) -> ParseResult<Node> {
    pair(
        token(TT::KEYWORD, "import"),
        pair(
            cut(tok(TT::STRING), "import requires a module path string"),
            maybe(right(
                token(TT::KEYWORD, "as"),
                cut(name, "expected a module alias after 'as'"),
            )),
        ),
    )
    .map(|(keyword, (path, alias))| {
        let mut span = keyword.span().till(&path);
        if let Some(alias) = &alias {
            span = span.till(alias);
        }
        let import = Import {
            path: path.lexeme.into(),
            items: None,
            alias,
        };
        Node::Import(import, span)
    })
    .parse(input)
}

// from_stmt: 'from' ~ STRING 'import' NAME (',' ~ NAME)*
fn from_stmt(input: &[Token]) -> ParseResult<Node> {
    pair(
        pair(
            token(TT::KEYWORD, "from"),
            cut(tok(TT::STRING), "from requires a module path string"),
        ),
        right(
            cut(
                token(TT::KEYWORD, "import"),
                "expected 'import' after the module path",
            ),
            cut(
                sep_by(name, TT::COMMA, "expected a function name after ','"),
                "expected a function name to import",
            ),
        ),
    )
    .map(|((keyword, path), items)| {
        let span = keyword.span().till_block(&items);
        let import = Import {
            path: path.lexeme.into(),
            items: Some(items),
            alias: None,
        };
        Node::Import(import, span)
    })
    .parse(input)
}

// print_stmt: 'print' ~ '(' [comparison] ')'
fn print_stmt(input: &[Token]) -> ParseResult<Node> {
    pair(token(TT::KEYWORD, "print"), print_operand("print"))
        .map(|(keyword, value)| {
            let span = operand_span(&keyword, &value);
            Node::Print(value.map(Box::new), span)
        })
        .parse(input)
}

// printnln_stmt: 'printnln' ~ '(' [comparison] ')'
fn printnln_stmt(input: &[Token]) -> ParseResult<Node> {
    pair(token(TT::KEYWORD, "printnln"), print_operand("printnln"))
        .map(|(keyword, value)| {
            let span = operand_span(&keyword, &value);
            Node::PrintNoNewline(value.map(Box::new), span)
        })
        .parse(input)
}

fn print_operand<'a>(keyword: &'static str) -> impl Parser<'a, Option<Node>> {
    right(
        cut(tok(TT::LPAR), format!("{keyword} requires parentheses")),
        left(maybe(comparison), cut(tok(TT::RPAR), "missing ')'")),
    )
}

fn operand_span(keyword: &Token, value: &Option<Node>) -> Span {
    match value {
        Some(value) => keyword.span().till(value),
        None => keyword.span(),
    }
}

// nsreturn_stmt: 'nsreturn' ~ comparison
fn nsreturn_stmt(input: &[Token]) -> ParseResult<Node> {
    pair(
        token(TT::KEYWORD, "nsreturn"),
        cut(comparison, "expected a value after 'nsreturn'"),
    )
    .map(|(keyword, value)| {
        let span = keyword.span().till(&value);
        Node::NonStoppingReturn(Box::new(value), span)
    })
    .parse(input)
}

// return_stmt: 'return' ~ comparison
fn return_stmt(input: &[Token]) -> ParseResult<Node> {
    pair(
        token(TT::KEYWORD, "return"),
        cut(comparison, "expected a value after 'return'"),
    )
    .map(|(keyword, value)| {
        let span = keyword.span().till(&value);
        Node::Return(Box::new(value), span)
    })
    .parse(input)
}

// # Identifier-led statements
// # -------------------------

// identifier_stmt:
//     | NAME '{' ~ block_body                          # callback call
//     | NAME '.' ~ NAME member_tail
//     | NAME '[' ~ expr ']' ['=' ~ comparison]
//     | NAME statement_arguments
//     | NAME '=' ~ comparison
// # NOTE: a bare NAME is left to `comparison`, so `x > 3` is a statement.
fn identifier_stmt(input: &[Token]) -> ParseResult<Node> {
    callback_call
        .or(member_stmt)
        .or(index_stmt)
        .or(call_stmt)
        .or(assignment)
        .parse(input)
}

fn callback_call(input: &[Token]) -> ParseResult<Node> {
    pair(name, right(tok(TT::LBRACE), block_body("code block")))
        .map(|(name, statements)| {
            let span = name.span().till_block(&statements);
            let block = Node::CodeBlock(statements.into(), span);
            Node::Call(Callee::Function(name), vec![block], span)
        })
        .parse(input)
}

enum MemberTail {
    Assign(Node),
    Call(Vec<Node>),
}

// member_tail:
//     | '=' ~ comparison
//     | statement_arguments
//     | <nothing>
fn member_stmt(input: &[Token]) -> ParseResult<Node> {
    pair(
        pair(
            left(name, tok(TT::DOT)),
            cut(name, "expected an identifier after '.'"),
        ),
        maybe(
            right(
                tok(TT::EQUAL),
                cut(comparison, "expected a value after '='"),
            )
            .map(MemberTail::Assign)
            .or(statement_arguments.map(MemberTail::Call)),
        ),
    )
    .map(|((object, member), tail)| {
        let span = object.span().till(&member);
        match tail {
            Some(MemberTail::Assign(value)) => {
                let span = span.till(&value);
                Node::Assign(Target::Attribute(object, member), Box::new(value), span)
            }
            Some(MemberTail::Call(arguments)) => {
                let span = span.till_block(&arguments);
                Node::Call(Callee::Method(object, member), arguments, span)
            }
            None => Node::DotAccess(object, member, span),
        }
    })
    .parse(input)
}

fn index_stmt(input: &[Token]) -> ParseResult<Node> {
    pair(
        pair(left(name, tok(TT::LSQB)), index_tail),
        maybe(right(
            tok(TT::EQUAL),
            cut(comparison, "expected a value after '='"),
        )),
    )
    .map(|((name, index), value)| {
        let span = name.span().till(&index);
        match value {
            Some(value) => {
                let span = span.till(&value);
                Node::Assign(Target::Index(name, Box::new(index)), Box::new(value), span)
            }
            None => Node::ArrayAccess(name, Box::new(index), span),
        }
    })
    .parse(input)
}

// index_tail: ~ expr ']'
fn index_tail(input: &[Token]) -> ParseResult<Node> {
    left(
        cut(expr, "expected an index expression"),
        cut(tok(TT::RSQB), "missing ']'"),
    )
    .parse(input)
}

fn call_stmt(input: &[Token]) -> ParseResult<Node> {
    pair(name, statement_arguments)
        .map(|(name, arguments)| {
            let span = name.span().till_block(&arguments);
            Node::Call(Callee::Function(name), arguments, span)
        })
        .parse(input)
}

// # NOTE: arguments of a call in statement position are comparisons, so a
// # bare `a < b` can be passed. A trailing block becomes the last argument.
// statement_arguments: '(' ~ [comparison (',' ~ comparison)*] ')' [code_block]
fn statement_arguments(input: &[Token]) -> ParseResult<Vec<Node>> {
    pair(
        right(
            tok(TT::LPAR),
            left(
                maybe(sep_by(
                    comparison,
                    TT::COMMA,
                    "expected an argument after ','",
                )),
                cut(tok(TT::RPAR), "missing ')'"),
            ),
        ),
        maybe(code_block),
    )
    .map(|(arguments, block)| {
        let mut arguments = arguments.unwrap_or_default();
        arguments.extend(block);
        arguments
    })
    .parse(input)
}

// assignment: NAME '=' ~ comparison
fn assignment(input: &[Token]) -> ParseResult<Node> {
    pair(
        left(name, tok(TT::EQUAL)),
        cut(comparison, "expected a value after '='"),
    )
    .map(|(name, value)| {
        let span = name.span().till(&value);
        Node::Assign(Target::Name(name), Box::new(value), span)
    })
    .parse(input)
}

// # COMPOUND STATEMENTS
// # ===================

// code_block: '{' ~ block_body
fn code_block(input: &[Token]) -> ParseResult<Node> {
    pair(tok(TT::LBRACE), block_body("code block"))
        .map(|(brace, statements)| {
            let span = brace.span().till_block(&statements);
            Node::CodeBlock(statements.into(), span)
        })
        .parse(input)
}

// if_stmt: 'if' ~ condition block
fn if_stmt(input: &[Token]) -> ParseResult<Node> {
    pair(
        token(TT::KEYWORD, "if"),
        pair(condition("if"), block("if body")),
    )
    .map(|(keyword, (condition, body))| {
        let span = keyword.span().till_block(&body);
        Node::If(Box::new(condition), body, span)
    })
    .parse(input)
}

// while_stmt: 'while' ~ condition block
fn while_stmt(input: &[Token]) -> ParseResult<Node> {
    pair(
        token(TT::KEYWORD, "while"),
        pair(condition("while"), block("while body")),
    )
    .map(|(keyword, (condition, body))| {
        let span = keyword.span().till_block(&body);
        Node::While(Box::new(condition), body, span)
    })
    .parse(input)
}

// for_stmt:
//     | 'for' ~ '(' [statement] ',' [comparison] ',' [statement] ')' block
fn for_stmt(input: &[Token]) -> ParseResult<Node> {
    const CLAUSES: &str = "for loop requires three comma-separated clauses";
    pair(
        left(
            token(TT::KEYWORD, "for"),
            cut(tok(TT::LPAR), "for loop clauses must be wrapped in parentheses"),
        ),
        pair(
            pair(
                left(maybe(statement), cut(tok(TT::COMMA), CLAUSES)),
                left(maybe(comparison), cut(tok(TT::COMMA), CLAUSES)),
            ),
            pair(
                left(maybe(statement), cut(tok(TT::RPAR), "missing ')'")),
                block("for body"),
            ),
        ),
    )
    .map(|(keyword, ((init, condition), (update, body)))| {
        let span = keyword.span().till_block(&body);
        let for_loop = ForLoop {
            init,
            condition,
            update,
            body,
        };
        Node::For(Box::new(for_loop), span)
    })
    .parse(input)
}

// # Function definitions
// # --------------------

// function_def: function_definition
fn function_def(input: &[Token]) -> ParseResult<Node> {
    function_definition
        .map(|(span, function)| Node::FunctionDef(function, span))
        .parse(input)
}

// function_definition:
//     | 'def' ~ visibility NAME '(' [parameter (',' ~ parameter)*] ')' block
fn function_definition(input: &[Token]) -> ParseResult<(Span, Rc<FunctionDefinition>)> {
    pair(
        pair(
            token(TT::KEYWORD, "def"),
            pair(
                cut(
                    visibility,
                    "function definition requires 'public' or 'private'",
                ),
                cut(name, "expected a function name"),
            ),
        ),
        pair(
            right(
                cut(tok(TT::LPAR), "function definition requires a parameter list"),
                left(
                    maybe(sep_by(parameter, TT::COMMA, "invalid parameter name")),
                    cut(tok(TT::RPAR), "missing ')' after parameter list"),
                ),
            ),
            block("function body"),
        ),
    )
    .map(|((keyword, (visibility, name)), (parameters, body))| {
        let span = keyword.span().till_block(&body);
        let function = FunctionDefinition {
            visibility,
            name,
            parameters: parameters.unwrap_or_default(),
            body,
        };
        (span, Rc::new(function))
    })
    .parse(input)
}

// visibility: 'public' | 'private'
fn visibility(input: &[Token]) -> ParseResult<Visibility> {
    token(TT::KEYWORD, "public")
        .map(|_| Visibility::Public)
        .or(token(TT::KEYWORD, "private").map(|_| Visibility::Private))
        .parse(input)
}

// parameter: NAME [':' ~ codeblock_type]
fn parameter(input: &[Token]) -> ParseResult<Parameter> {
    pair(
        name,
        maybe(right(
            tok(TT::COLON),
            cut(codeblock_type, "invalid parameter type, expected BCC.Codeblock"),
        )),
    )
    .map(|(name, annotation)| match annotation {
        Some(_) => Parameter {
            name,
            kind: ParameterKind::CodeBlock,
        },
        None => Parameter::from(name),
    })
    .parse(input)
}

// codeblock_type: 'BCC' '.' 'Codeblock'
fn codeblock_type(input: &[Token]) -> ParseResult<Token> {
    left(
        token(TT::NAME, "BCC"),
        pair(tok(TT::DOT), token(TT::NAME, "Codeblock")),
    )
    .parse(input)
}

// # Class definitions
// # -----------------

enum ClassMember {
    Attribute(Name, Node),
    Method(Rc<FunctionDefinition>),
}

// class_def: 'class' ~ NAME '{' (';'* class_member)* ';'* '}'
fn class_def(input: &[Token]) -> ParseResult<Node> {
    pair(
        pair(
            token(TT::KEYWORD, "class"),
            cut(name, "expected a class name"),
        ),
        right(
            cut(tok(TT::LBRACE), "expected '{' to open class body"),
            left(
                zero_or_more(right(zero_or_more(tok(TT::SEMI)), class_member)),
                pair(
                    zero_or_more(tok(TT::SEMI)),
                    cut(
                        tok(TT::RBRACE),
                        "missing '}' to close class body (only attributes and methods may appear in it)",
                    ),
                ),
            ),
        ),
    )
    .map(|((keyword, name), members)| {
        let span = keyword.span().till(&name);
        let mut attributes = vec![];
        let mut methods = vec![];
        for member in members {
            match member {
                ClassMember::Attribute(name, value) => attributes.push((name, value)),
                ClassMember::Method(method) => methods.push(method),
            }
        }
        let class = ClassDefinition {
            name,
            attributes,
            methods,
        };
        Node::ClassDef(Rc::new(class), span)
    })
    .parse(input)
}

// class_member:
//     | function_definition
//     | NAME '=' ~ comparison
fn class_member(input: &[Token]) -> ParseResult<ClassMember> {
    function_definition
        .map(|(_, method)| ClassMember::Method(method))
        .or(pair(
            left(name, tok(TT::EQUAL)),
            cut(comparison, "expected an attribute value after '='"),
        )
        .map(|(name, value)| ClassMember::Attribute(name, value)))
        .parse(input)
}

// # EXPRESSIONS
// # ===========

// comparison: expr [('==' | '<' | '>' | '<=' | '>=') ~ expr]
fn comparison(input: &[Token]) -> ParseResult<Node> {
    pair(
        expr,
        maybe(pair(
            comparison_operator,
            cut(expr, "expected an expression after the comparison operator"),
        )),
    )
    .map(|(left, rhs)| match rhs {
        Some((op, right)) => binary(left, op, right),
        None => left,
    })
    .parse(input)
}

fn comparison_operator(input: &[Token]) -> ParseResult<Token> {
    tok(TT::EQEQUAL)
        .or(tok(TT::LESS))
        .or(tok(TT::GREATER))
        .or(tok(TT::LESSEQUAL))
        .or(tok(TT::GREATEREQUAL))
        .parse(input)
}

// expr: term (('+' | '-') ~ term)*
fn expr(input: &[Token]) -> ParseResult<Node> {
    pair(
        term,
        zero_or_more(pair(
            tok(TT::PLUS).or(tok(TT::MINUS)),
            cut(term, "expected an expression after the operator"),
        )),
    )
    .map(|(first, rest)| {
        rest.into_iter()
            .fold(first, |left, (op, right)| binary(left, op, right))
    })
    .parse(input)
}

// term: factor (('*' | '/') ~ factor)*
fn term(input: &[Token]) -> ParseResult<Node> {
    pair(
        factor,
        zero_or_more(pair(
            tok(TT::STAR).or(tok(TT::SLASH)),
            cut(factor, "expected an expression after the operator"),
        )),
    )
    .map(|(first, rest)| {
        rest.into_iter()
            .fold(first, |left, (op, right)| binary(left, op, right))
    })
    .parse(input)
}

fn binary(left: Node, op: Token, right: Node) -> Node {
    let span = left.span().till(&right);
    Node::BinaryOp(Box::new(left), op.into(), Box::new(right), span)
}

// factor:
//     | NUMBER
//     | STRING
//     | 'expr' ~ '(' comparison ')'
//     | NAME '.' ~ NAME [expression_arguments]
//     | NAME '[' ~ expr ']'
//     | NAME expression_arguments
//     | NAME
//     | '(' ~ comparison ')'
// # NOTE: every nested expression passes through here.
fn factor(input: &[Token]) -> ParseResult<Node> {
    ensure_sufficient_stack(|| {
        number
            .or(string)
            .or(expr_literal)
            .or(member_expr)
            .or(index_expr)
            .or(call_expr)
            .or(name.map(Node::Variable))
            .or(group)
            .parse(input)
    })
}

fn number(input: &[Token]) -> ParseResult<Node> {
    tok(TT::NUMBER)
        .parse(input)
        .and_then(|(token, rest)| match token.lexeme.parse::<i64>() {
            Ok(value) => ParseResult::Ok((Node::Number(value, token.span), rest)),
            Err(_) => ParseResult::Fatal(ParseError::at("integer literal out of range", token)),
        })
}

fn string(input: &[Token]) -> ParseResult<Node> {
    tok(TT::STRING)
        .map(|token| Node::String(token.lexeme.into(), token.span))
        .parse(input)
}

fn expr_literal(input: &[Token]) -> ParseResult<Node> {
    pair(
        token(TT::KEYWORD, "expr"),
        right(
            cut(tok(TT::LPAR), "expr requires parentheses"),
            left(
                cut(comparison, "expected an expression inside expr(...)"),
                cut(tok(TT::RPAR), "missing ')'"),
            ),
        ),
    )
    .map(|(keyword, inner)| {
        let span = keyword.span().till(&inner);
        Node::Expr(Rc::new(inner), span)
    })
    .parse(input)
}

fn member_expr(input: &[Token]) -> ParseResult<Node> {
    pair(
        pair(
            left(name, tok(TT::DOT)),
            cut(name, "expected an identifier after '.'"),
        ),
        maybe(expression_arguments),
    )
    .map(|((object, member), arguments)| {
        let span = object.span().till(&member);
        match arguments {
            Some(arguments) => {
                let span = span.till_block(&arguments);
                Node::Call(Callee::Method(object, member), arguments, span)
            }
            None => Node::DotAccess(object, member, span),
        }
    })
    .parse(input)
}

fn index_expr(input: &[Token]) -> ParseResult<Node> {
    pair(left(name, tok(TT::LSQB)), index_tail)
        .map(|(name, index)| {
            let span = name.span().till(&index);
            Node::ArrayAccess(name, Box::new(index), span)
        })
        .parse(input)
}

fn call_expr(input: &[Token]) -> ParseResult<Node> {
    pair(name, expression_arguments)
        .map(|(name, arguments)| {
            let span = name.span().till_block(&arguments);
            Node::Call(Callee::Function(name), arguments, span)
        })
        .parse(input)
}

// # NOTE: inside an expression, call arguments are plain sums (no bare
// # comparisons); wrap a comparison in parentheses to pass it.
// expression_arguments: '(' ~ [expr (',' ~ expr)*] ')'
fn expression_arguments(input: &[Token]) -> ParseResult<Vec<Node>> {
    right(
        tok(TT::LPAR),
        left(
            maybe(sep_by(expr, TT::COMMA, "expected an argument after ','")),
            cut(tok(TT::RPAR), "missing ')'"),
        ),
    )
    .map(|arguments| arguments.unwrap_or_default())
    .parse(input)
}

// group: '(' ~ comparison ')'
fn group(input: &[Token]) -> ParseResult<Node> {
    right(
        tok(TT::LPAR),
        left(
            cut(comparison, "expected an expression after '('"),
            cut(tok(TT::RPAR), "missing ')'"),
        ),
    )
    .parse(input)
}
