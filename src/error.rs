use std::io;

/// Everything that can go wrong while loading membership or evaluating a set
/// expression.
///
/// The `Display` text of the first four variants is sent back to senders in
/// SMTP bounce responses and must stay stable. The remaining variants are
/// fatal at startup: a snapshot that cannot be built aborts initialization.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The recipient local-part is not a well-formed set expression. The
    /// message already is bounce-ready text ("Misplaced union operator", ...).
    #[error("{0}")]
    Syntax(String),

    /// No list or person matches a leaf of the expression.
    #[error("No such list or person: {0}")]
    UnknownName(String),

    /// A person identifier matches more than one member.
    #[error("Ambiguous person: {0}")]
    AmbiguousPerson(String),

    /// The expression is valid but evaluates to the empty set.
    #[error("No recipients match this set expression")]
    NoRecipientsMatch,

    /// List files nest deeper than the allowed limit, usually a cycle.
    #[error("Maximum recursion depth exceeded; lists might have a cycle")]
    NestingExceeded,

    /// One or more lists have no entry in the symbols file.
    #[error("These mailing lists are missing symbols: {0}")]
    MissingSymbol(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn syntax(msg: impl Into<String>) -> Self {
        Error::Syntax(msg.into())
    }
}
