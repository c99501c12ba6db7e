//! Set expressions over mailing lists and people.
//!
//! The local part of a recipient address is an expression in which leaves are
//! mailing-list names or person identifiers, and the operators are `_|_` for
//! set union, `_&_` for set intersection and `_-_` for set difference. Curly
//! braces `{` `}` group subexpressions, and grouping is REQUIRED whenever two
//! different operators would otherwise meet at the same level:
//!
//! ```text
//! sf_&_{dog_|_cat}        San Franciscans who own a dog or a cat.
//! {sf_&_dog}_|_cat        San Franciscan dog owners, and all cat owners.
//! sf_&_dog_|_cat          INVALID due to missing braces.
//! sf_&_dog_&_cat          Same operator, no braces needed.
//! sf_-_dog_-_cat          Difference is left associative.
//! ```
//!
//! Parsing is based on the classic Pratt top-down operator-precedence scheme,
//! modified to reject unparenthesized operator mixes.

mod eval;
mod token;

use std::collections::BTreeSet;

use crate::error::Error;

pub use token::{OpKind, Token, Tokens};

/// Resolves one leaf of an expression to its symbol and recipient set.
///
/// Implemented by [`crate::roster::Snapshot`] for production use and by any
/// `Fn(&str) -> Result<(String, BTreeSet<String>), Error>` closure, which lets
/// tests supply table-backed resolvers.
pub trait Resolver {
    /// Returns the pair of subject-tag symbol and recipient addresses for a
    /// mailing-list name or person identifier, [`Error::UnknownName`] if
    /// nothing matches, or [`Error::AmbiguousPerson`] if more than one person
    /// does.
    fn resolve(&self, name: &str) -> Result<(String, BTreeSet<String>), Error>;
}

impl<F> Resolver for F
where
    F: Fn(&str) -> Result<(String, BTreeSet<String>), Error>,
{
    fn resolve(&self, name: &str) -> Result<(String, BTreeSet<String>), Error> {
        self(name)
    }
}

/// The substrings whose presence makes an address a set expression rather
/// than a plain list or person reference.
const SET_SYNTAX: [&str; 5] = ["_|_", "_&_", "_-_", "{", "}"];

/// Parses and evaluates a set expression.
///
/// Returns the pair of subject tag and recipient address set. The tag is
/// built from the symbols handed out by the resolver, parenthesized only
/// where omitting braces would change the meaning.
///
/// Addresses containing no set syntax at all ("vanilla" addresses) behave
/// like the legacy single-list handler: the tag is the capitalized input and
/// an empty recipient set is not an error. For real set expressions an empty
/// result is rejected, since delivering to nobody is always a sender mistake.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use mailset::{parse, Error};
///
/// let resolver = |name: &str| match name {
///     "dog" => Ok(("DG".to_string(),
///                  BTreeSet::from(["ana@example.com".to_string(),
///                                  "bo@example.com".to_string()]))),
///     "cat" => Ok(("CT".to_string(),
///                  BTreeSet::from(["bo@example.com".to_string()]))),
///     other => Err(Error::UnknownName(other.to_string())),
/// };
///
/// let (tag, addrs) = parse(&resolver, "dog_&_cat").unwrap();
/// assert_eq!(tag, "DG&CT");
/// assert_eq!(addrs, BTreeSet::from(["bo@example.com".to_string()]));
///
/// let (tag, _) = parse(&resolver, "dog").unwrap();
/// assert_eq!(tag, "Dog");
/// ```
pub fn parse<R: Resolver>(
    resolver: &R,
    address: &str,
) -> Result<(String, BTreeSet<String>), Error> {
    let mut tokens = Tokens::new(address, resolver)?;
    let node = eval::expression(&mut tokens, 0)?;

    if !SET_SYNTAX.iter().any(|syntax| address.contains(syntax)) {
        // Vanilla address: single list or person, tagged like the legacy
        // handler would so it can act as a drop-in replacement.
        return Ok((capitalize(address), node.addrs));
    }
    if node.addrs.is_empty() {
        return Err(Error::NoRecipientsMatch);
    }
    Ok((node.tag, node.addrs))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.as_str().to_lowercase().chars())
            .collect(),
        None => String::new(),
    }
}
