use super::error::ParseError;
use super::tokenizer::{Token, TokenType};

/// Outcome of a grammar rule. `Err` means the rule did not match and the
/// caller may try another alternative; `Fatal` means the rule committed to
/// a construct and found it malformed.
#[derive(Debug)]
pub(crate) enum ParseResult<'a, Output> {
    Ok((Output, &'a [Token])),
    Err,
    Fatal(ParseError),
}

impl<'a, T> ParseResult<'a, T> {
    pub(super) fn or_else<O>(self, op: O) -> Self
    where
        O: FnOnce() -> Self,
    {
        match self {
            Self::Err => op(),
            other => other,
        }
    }
    pub(super) fn map<U, F>(self, op: F) -> ParseResult<'a, U>
    where
        F: FnOnce((T, &'a [Token])) -> (U, &'a [Token]),
    {
        match self {
            Self::Ok(inner) => ParseResult::Ok(op(inner)),
            Self::Err => ParseResult::Err,
            Self::Fatal(error) => ParseResult::Fatal(error),
        }
    }
    pub(super) fn and_then<U, F>(self, op: F) -> ParseResult<'a, U>
    where
        F: FnOnce((T, &'a [Token])) -> ParseResult<'a, U>,
    {
        match self {
            Self::Ok(inner) => op(inner),
            Self::Err => ParseResult::Err,
            Self::Fatal(error) => ParseResult::Fatal(error),
        }
    }
}

pub(super) trait Parser<'a, Output> {
    fn parse(&self, input: &'a [Token]) -> ParseResult<'a, Output>;
    fn map<F, MappedOutput>(self, map_fn: F) -> BoxedParser<'a, MappedOutput>
    where
        Self: Sized + 'a,
        Output: 'a,
        MappedOutput: 'a,
        F: Fn(Output) -> MappedOutput + 'a,
    {
        BoxedParser::new(map(self, map_fn))
    }
    fn or(self, parser: impl Parser<'a, Output> + 'a) -> BoxedParser<'a, Output>
    where
        Self: Sized + 'a,
        Output: 'a,
    {
        let alternative = move |input: &'a [Token]| self.parse(input).or_else(|| parser.parse(input));
        BoxedParser::new(alternative)
    }
}

impl<'a, F, Output> Parser<'a, Output> for F
where
    F: Fn(&'a [Token]) -> ParseResult<'a, Output>,
{
    fn parse(&self, input: &'a [Token]) -> ParseResult<'a, Output> {
        self(input)
    }
}

pub(super) struct BoxedParser<'a, Output> {
    parser: Box<dyn Parser<'a, Output> + 'a>,
}

impl<'a, Output> BoxedParser<'a, Output> {
    fn new(parser: impl Parser<'a, Output> + 'a) -> Self {
        Self {
            parser: Box::new(parser),
        }
    }
}

impl<'a, Output> Parser<'a, Output> for BoxedParser<'a, Output> {
    fn parse(&self, input: &'a [Token]) -> ParseResult<'a, Output> {
        self.parser.parse(input)
    }
}

pub(super) fn pair<'a, R1, R2>(
    parser1: impl Parser<'a, R1>,
    parser2: impl Parser<'a, R2>,
) -> impl Parser<'a, (R1, R2)> {
    move |input: &'a [Token]| {
        parser1.parse(input).and_then(|(result1, next_input)| {
            parser2
                .parse(next_input)
                .map(|(result2, rest)| ((result1, result2), rest))
        })
    }
}

pub(super) fn map<'a, F, A, B>(parser: impl Parser<'a, A>, map_fn: F) -> impl Parser<'a, B>
where
    F: Fn(A) -> B,
{
    move |input: &'a [Token]| {
        parser
            .parse(input)
            .map(|(result, rest)| (map_fn(result), rest))
    }
}

pub(super) fn left<'a, A, B>(
    left_parser: impl Parser<'a, A>,
    right_parser: impl Parser<'a, B>,
) -> impl Parser<'a, A> {
    map(pair(left_parser, right_parser), |(left, _right)| left)
}

pub(super) fn right<'a, A, B>(
    left_parser: impl Parser<'a, A>,
    right_parser: impl Parser<'a, B>,
) -> impl Parser<'a, B> {
    map(pair(left_parser, right_parser), |(_left, right)| right)
}

pub(super) fn zero_or_more<'a, R>(parser: impl Parser<'a, R>) -> impl Parser<'a, Vec<R>> {
    move |input: &'a [Token]| {
        let mut result = Vec::new();
        let mut tmp_input = input;
        loop {
            match parser.parse(tmp_input) {
                ParseResult::Ok((next, rest)) => {
                    tmp_input = rest;
                    result.push(next);
                }
                ParseResult::Err => return ParseResult::Ok((result, tmp_input)),
                ParseResult::Fatal(error) => return ParseResult::Fatal(error),
            }
        }
    }
}

pub(super) fn maybe<'a, R>(parser: impl Parser<'a, R>) -> impl Parser<'a, Option<R>> {
    move |input: &'a [Token]| match parser.parse(input) {
        ParseResult::Ok((value, rest)) => ParseResult::Ok((Some(value), rest)),
        ParseResult::Err => ParseResult::Ok((None, input)),
        ParseResult::Fatal(error) => ParseResult::Fatal(error),
    }
}

/// Commits to `parser`: a soft failure becomes a `ParseError` pointing at
/// the token where the parser gave up.
pub(super) fn cut<'a, R, M>(parser: impl Parser<'a, R>, message: M) -> impl Parser<'a, R>
where
    M: AsRef<str>,
{
    move |input: &'a [Token]| match parser.parse(input) {
        ParseResult::Err => ParseResult::Fatal(ParseError::new(message.as_ref(), input)),
        other => other,
    }
}

pub(super) fn tok<'a>(expected_type: TokenType) -> impl Parser<'a, Token> {
    move |input: &'a [Token]| match input.first() {
        Some(token) if token.typ == expected_type => {
            ParseResult::Ok((token.clone(), &input[1..]))
        }
        _ => ParseResult::Err,
    }
}

pub(super) fn token<'a>(
    expected_type: TokenType,
    expected_lexeme: &'static str,
) -> impl Parser<'a, Token> {
    move |input: &'a [Token]| match input.first() {
        Some(token) if token.typ == expected_type && token.lexeme.as_str() == expected_lexeme => {
            ParseResult::Ok((token.clone(), &input[1..]))
        }
        _ => ParseResult::Err,
    }
}

/// `element (sep ~ element)*`: a separator must be followed by an element.
pub(super) fn sep_by<'a, R>(
    parser: impl Parser<'a, R> + Copy,
    sep: TokenType,
    message: &'static str,
) -> impl Parser<'a, Vec<R>> {
    move |input: &'a [Token]| {
        pair(parser, zero_or_more(right(tok(sep), cut(parser, message))))
            .parse(input)
            .map(|((first, rest_elems), rest)| {
                let mut result = vec![first];
                result.extend(rest_elems);
                (result, rest)
            })
    }
}
