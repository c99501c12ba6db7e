use std::borrow::Cow;
use std::fmt;

use crate::text::charset::Charset;
use crate::text::encoding::q_encode;

/// The slice of a mail message the core needs: header access by
/// case-insensitive name. The body is never inspected.
pub trait Message {
    /// The wire form of the first header with this name, if any.
    fn get_header(&self, name: &str) -> Option<Cow<'_, str>>;

    /// Removes every header with this name.
    fn delete_header(&mut self, name: &str);

    /// Appends a header.
    fn set_header(&mut self, name: &str, value: HeaderValue);
}

/// A header value as produced by the subject rewriter: either a plain ASCII
/// string, or a sequence of charset-tagged chunks that serialize as RFC 2047
/// encoded words.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Plain(String),
    Encoded(EncodedText),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedText {
    pub chunks: Vec<Chunk>,
    /// Whitespace used after CRLF when an encoded word is folded, preserved
    /// from the header being rewritten.
    pub continuation_ws: char,
}

/// One run of text in a single charset.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub charset: Charset,
}

impl Chunk {
    pub fn new(text: impl Into<String>, charset: Charset) -> Self {
        Chunk {
            text: text.into(),
            charset,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Plain(text) => f.write_str(text),
            HeaderValue::Encoded(value) => f.write_str(&value.to_wire()),
        }
    }
}

impl EncodedText {
    /// Serializes the chunks to a header value. ASCII chunks pass through
    /// verbatim; anything else becomes Q-encoded words. A single space joins
    /// chunks whose boundary carries no whitespace of its own; two adjacent
    /// encoded words always get one, since decoders eat it back.
    fn to_wire(&self) -> String {
        let fold = format!("\r\n{}", self.continuation_ws);
        let mut out = String::new();
        let mut prev_plain: Option<bool> = None;

        for chunk in &self.chunks {
            if chunk.text.is_empty() {
                continue;
            }
            let plain = chunk.charset == Charset::Ascii && chunk.text.is_ascii();
            let rendered = if plain {
                chunk.text.clone()
            } else {
                q_encode(&chunk.text, effective_charset(chunk), &fold)
            };
            if let Some(was_plain) = prev_plain {
                let boundary_ws = (was_plain && out.ends_with([' ', '\t']))
                    || (plain && rendered.starts_with([' ', '\t']));
                if !boundary_ws {
                    out.push(' ');
                }
            }
            out.push_str(&rendered);
            prev_plain = Some(plain);
        }
        out
    }
}

// A chunk labelled us-ascii can still hold non-ASCII text when the subject
// arrived as raw unencoded UTF-8; such text is emitted as UTF-8.
fn effective_charset(chunk: &Chunk) -> Charset {
    match chunk.charset {
        Charset::Ascii if !chunk.text.is_ascii() => Charset::Encoding(encoding_rs::UTF_8),
        charset => charset,
    }
}

/// Ordered header collection with case-insensitive names; enough of a
/// message for the rewriter, the decoration step and tests.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    fields: Vec<(String, HeaderValue)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        HeaderMap::default()
    }

    /// The structured value of the first header with this name.
    pub fn value(&self, name: &str) -> Option<&HeaderValue> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl Message for HeaderMap {
    fn get_header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.value(name).map(|value| match value {
            HeaderValue::Plain(text) => Cow::Borrowed(text.as_str()),
            encoded => Cow::Owned(encoded.to_string()),
        })
    }

    fn delete_header(&mut self, name: &str) {
        self.fields
            .retain(|(field, _)| !field.eq_ignore_ascii_case(name));
    }

    fn set_header(&mut self, name: &str, value: HeaderValue) {
        self.fields.push((name.to_string(), value));
    }
}

/// Marks a message as mailing-list traffic: `Precedence: list` (unless the
/// sender already set one) and fresh `List-Id` / `List-Post` headers naming
/// the set expression it was sent to.
pub fn decorate_list_headers<M: Message>(msg: &mut M, address: &str, domain: &str) {
    if msg.get_header("precedence").is_none() {
        msg.set_header("Precedence", HeaderValue::Plain("list".into()));
    }
    msg.delete_header("list-id");
    msg.set_header(
        "List-Id",
        HeaderValue::Plain(format!("<{address}.mailingset.{domain}>")),
    );
    msg.delete_header("list-post");
    msg.set_header(
        "List-Post",
        HeaderValue::Plain(format!("<mailto:{address}@{domain}>")),
    );
}
