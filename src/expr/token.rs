use std::collections::BTreeSet;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alphanumeric1, one_of},
    combinator::{map, recognize},
    multi::many0,
    sequence::pair,
    IResult,
};

use crate::error::Error;
use crate::expr::Resolver;

/// One of the three set operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Union,
    Intersection,
    Difference,
}

impl OpKind {
    /// Human-readable name, used in "Misplaced ... operator" errors.
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Union => "union",
            OpKind::Intersection => "intersection",
            OpKind::Difference => "difference",
        }
    }

    /// Single-character display symbol used in subject tags.
    pub fn symbol(self) -> char {
        match self {
            OpKind::Union => '|',
            OpKind::Intersection => '&',
            OpKind::Difference => '-',
        }
    }

    /// Whether `(A op B) op C == A op (B op C)` holds; associative operators
    /// may chain without braces and their surplus braces are elided from
    /// tags.
    pub fn associative(self) -> bool {
        !matches!(self, OpKind::Difference)
    }

    pub fn apply(self, left: &BTreeSet<String>, right: &BTreeSet<String>) -> BTreeSet<String> {
        match self {
            OpKind::Union => left | right,
            OpKind::Intersection => left & right,
            OpKind::Difference => left - right,
        }
    }
}

/// A lexed expression token. Leaves are resolved to their symbol and
/// recipient set as they are pulled from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Leaf {
        symbol: String,
        addrs: BTreeSet<String>,
    },
    Op(OpKind),
    OpenBrace,
    CloseBrace,
    End,
}

impl Token {
    /// Left binding power. The higher the value, the tighter the token binds
    /// to what follows; End binds to nothing so the parse loop always stops
    /// there.
    pub fn lbp(&self) -> u8 {
        match self {
            Token::Leaf { .. } => 3,
            Token::Op(_) => 2,
            Token::OpenBrace | Token::CloseBrace => 1,
            Token::End => 0,
        }
    }
}

/// `leaf = 1*alphanum *( ("_" / "." / "-") 1*alphanum )`
///
/// The separators only join two alphanumeric runs, so `alist_foo` is one
/// leaf while `alist_|_foo` lexes as three tokens.
fn leaf(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alphanumeric1,
        many0(pair(one_of("_.-"), alphanumeric1)),
    ))(input)
}

fn punctuation(input: &str) -> IResult<&str, Token> {
    alt((
        map(tag("_|_"), |_| Token::Op(OpKind::Union)),
        map(tag("_&_"), |_| Token::Op(OpKind::Intersection)),
        map(tag("_-_"), |_| Token::Op(OpKind::Difference)),
        map(tag("{"), |_| Token::OpenBrace),
        map(tag("}"), |_| Token::CloseBrace),
    ))(input)
}

/// Lazy token stream with one token of lookahead.
///
/// Tokens are lexed (and leaves resolved) on demand, one position ahead of
/// the parser, so resolver failures surface in input order interleaved with
/// syntax errors. Once the input is exhausted the stream yields [`Token::End`]
/// forever.
pub struct Tokens<'a, R> {
    resolver: &'a R,
    input: &'a str,
    rest: &'a str,
    head: Token,
}

impl<'a, R: Resolver> Tokens<'a, R> {
    pub fn new(input: &'a str, resolver: &'a R) -> Result<Self, Error> {
        let mut tokens = Tokens {
            resolver,
            input,
            rest: input,
            head: Token::End,
        };
        tokens.head = tokens.lex()?;
        Ok(tokens)
    }

    /// The next token, without consuming it.
    pub fn peek(&self) -> &Token {
        &self.head
    }

    /// Consumes and returns the next token, pulling its successor from the
    /// input.
    pub fn advance(&mut self) -> Result<Token, Error> {
        let next = self.lex()?;
        Ok(std::mem::replace(&mut self.head, next))
    }

    fn lex(&mut self) -> Result<Token, Error> {
        if self.rest.is_empty() {
            return Ok(Token::End);
        }
        if let Ok((rest, name)) = leaf(self.rest) {
            self.rest = rest;
            let (symbol, addrs) = self.resolver.resolve(name)?;
            return Ok(Token::Leaf { symbol, addrs });
        }
        if let Ok((rest, token)) = punctuation(self.rest) {
            self.rest = rest;
            return Ok(token);
        }
        Err(Error::syntax(format!(
            "Unrecognized syntax near character {}",
            self.input.len() - self.rest.len() + 1
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(name: &str) -> Result<(String, BTreeSet<String>), Error> {
        Ok((name.to_uppercase(), BTreeSet::from([format!("{name}@x")])))
    }

    fn lex_all(input: &str) -> Result<Vec<Token>, Error> {
        let mut tokens = Tokens::new(input, &resolver)?;
        let mut out = Vec::new();
        loop {
            let token = tokens.advance()?;
            if token == Token::End {
                return Ok(out);
            }
            out.push(token);
        }
    }

    #[test]
    fn separators_stay_inside_leaves() {
        let tokens = lex_all("a-b.c_d").unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(matches!(&tokens[0], Token::Leaf { symbol, .. } if symbol == "A-B.C_D"));
    }

    #[test]
    fn operators_split_leaves() {
        let tokens = lex_all("alist_|_foo").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1], Token::Op(OpKind::Union));
    }

    #[test]
    fn braces_lex_alone() {
        let tokens = lex_all("{a_&_b}").unwrap();
        assert_eq!(tokens[0], Token::OpenBrace);
        assert_eq!(tokens[2], Token::Op(OpKind::Intersection));
        assert_eq!(tokens[4], Token::CloseBrace);
    }

    #[test]
    fn bad_character_position_is_one_based() {
        assert_eq!(
            lex_all("a!b").unwrap_err().to_string(),
            "Unrecognized syntax near character 2"
        );
        assert_eq!(
            lex_all("?").unwrap_err().to_string(),
            "Unrecognized syntax near character 1"
        );
        // A lone separator cannot start a leaf nor an operator.
        assert_eq!(
            lex_all("alist_").unwrap_err().to_string(),
            "Unrecognized syntax near character 6"
        );
    }

    #[test]
    fn end_repeats_after_exhaustion() {
        let mut tokens = Tokens::new("a", &resolver).unwrap();
        tokens.advance().unwrap();
        assert_eq!(*tokens.peek(), Token::End);
        assert_eq!(tokens.advance().unwrap(), Token::End);
        assert_eq!(*tokens.peek(), Token::End);
    }
}
