#![doc = include_str!("../README.md")]

/// Closed error taxonomy whose messages end up in SMTP bounces
pub mod error;

/// Parse and evaluate set expressions over lists and people
pub mod expr;

/// Message header abstraction shared with the surrounding service
pub mod message;

/// Membership snapshot loaded from list files and the symbols file
pub mod roster;

/// Subject-prefix rewriting (RFC 2047 aware)
pub mod subject;

/// Low-level text handling: ASCII tables, charsets, encoded words
pub mod text;

pub use crate::error::Error;
pub use crate::expr::{parse, Resolver};
pub use crate::message::{decorate_list_headers, HeaderMap, HeaderValue, Message};
pub use crate::roster::Snapshot;
pub use crate::subject::{rewrite_subject, RewriteError};
