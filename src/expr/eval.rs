use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::error::Error;
use crate::expr::token::{OpKind, Token, Tokens};
use crate::expr::Resolver;

/// Binding power of an operator token; kept as a named constant because the
/// tag builder compares child producers against it.
const OP_LBP: u8 = 2;
const LEAF_LBP: u8 = 3;

/// Result of evaluating a (sub)expression: the subject tag built so far, the
/// recipient set, and enough about the producing token to let an enclosing
/// operator decide whether the tag needs braces.
pub(crate) struct Node {
    pub tag: String,
    pub addrs: BTreeSet<String>,
    producer: Producer,
}

/// What produced a node: a leaf (high binding power, no symbol) or an
/// operator with its display symbol. Children are always built before their
/// parents, so this is a plain value, not a back-reference.
#[derive(Clone, Copy)]
struct Producer {
    lbp: u8,
    symbol: Option<char>,
}

/// Parses a stream of expression tokens.
///
/// A Pratt parser with one modification: operators adjoining at the same
/// level must all be of the same kind, otherwise the expression is ambiguous
/// to human readers and is rejected. Subexpressions are consumed while the
/// adjoining token binds tighter than `rbp`.
pub(crate) fn expression<R: Resolver>(
    tokens: &mut Tokens<'_, R>,
    rbp: u8,
) -> Result<Node, Error> {
    let token = tokens.advance()?;
    let mut left = prefix(token, tokens)?;

    // Most recent adjoining operator, for the same-kind check.
    let mut prev: Option<OpKind> = None;

    while rbp < tokens.peek().lbp() {
        if let Token::Op(kind) = tokens.peek() {
            if prev.is_some_and(|prev| prev.symbol() != kind.symbol()) {
                return Err(Error::syntax(
                    "Parentheses required when mixing different operators",
                ));
            }
        }
        match tokens.advance()? {
            Token::Op(kind) => {
                left = infix(kind, left, tokens)?;
                prev = Some(kind);
            }
            Token::Leaf { .. } => {
                return Err(Error::syntax("Misplaced list or person name"))
            }
            Token::OpenBrace => {
                return Err(Error::syntax("Misplaced opening parenthesis"))
            }
            Token::CloseBrace => {
                return Err(Error::syntax("Unmatched closing parenthesis"))
            }
            Token::End => return Err(Error::syntax("Unexpected end of set expression")),
        }
    }

    Ok(left)
}

/// Null denotation: the token opens a language construct.
fn prefix<R: Resolver>(token: Token, tokens: &mut Tokens<'_, R>) -> Result<Node, Error> {
    match token {
        Token::Leaf { symbol, addrs } => Ok(Node {
            tag: symbol,
            addrs,
            producer: Producer {
                lbp: LEAF_LBP,
                symbol: None,
            },
        }),
        Token::OpenBrace => {
            let inner = expression(tokens, Token::OpenBrace.lbp())?;
            // Everything up to the matching closing brace must be consumed.
            if !matches!(tokens.peek(), Token::CloseBrace) {
                return Err(Error::syntax("Unmatched opening parenthesis"));
            }
            tokens.advance()?;
            Ok(inner)
        }
        Token::Op(kind) => Err(Error::syntax(format!(
            "Misplaced {} operator",
            kind.name()
        ))),
        Token::CloseBrace => Err(Error::syntax("Misplaced closing parenthesis")),
        Token::End => Err(Error::syntax("Unexpected end of set expression")),
    }
}

/// Left denotation of an operator: parse the right-hand side, combine the
/// recipient sets, and merge the child tags with minimal parenthesization.
fn infix<R: Resolver>(
    kind: OpKind,
    left: Node,
    tokens: &mut Tokens<'_, R>,
) -> Result<Node, Error> {
    let right = expression(tokens, OP_LBP)?;
    let symbol = kind.symbol();
    let tag = format!(
        "{}{}{}",
        braced(&left, symbol, true),
        symbol,
        braced(&right, symbol, kind.associative()),
    );
    let addrs = kind.apply(&left.addrs, &right.addrs);
    Ok(Node {
        tag,
        addrs,
        producer: Producer {
            lbp: OP_LBP,
            symbol: Some(symbol),
        },
    })
}

/// Parenthesizes a child tag when omitting braces would change the meaning.
///
/// Three cases keep the child bare: it binds tighter than the operator (a
/// leaf), or it comes from the same operator and sits on the left, or it
/// comes from the same operator and the operator is associative (so
/// `A|(B|C)` may flatten to `A|B|C`, while `A-(B-C)` must keep its parens).
fn braced<'n>(node: &'n Node, symbol: char, left_or_assoc: bool) -> Cow<'n, str> {
    if node.producer.lbp > OP_LBP
        || (left_or_assoc && node.producer.symbol == Some(symbol))
    {
        Cow::Borrowed(node.tag.as_str())
    } else {
        Cow::Owned(format!("({})", node.tag))
    }
}
