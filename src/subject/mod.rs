//! Subject-prefix munging.
//!
//! [`rewrite_subject`] prepends a list tag like `"[AA&BB] "` to a message's
//! `Subject:` header. Subjects come in three shapes, tried in order:
//! entirely ASCII (rewritten as plain text), encoded but in one single
//! charset (rewritten and re-encoded in that charset), and mixed charsets
//! (each chunk keeps its charset; only the first is rewritten). Along the
//! way, leading reply markers (`Re:`, `AW:`, `SV:`, `VS:`) collapse to a
//! single `Re: ` after the tag, and older copies of the tag (including ones
//! carrying a `%d` sequence number) are stripped so replies do not
//! accumulate prefixes.

use std::borrow::Cow;
use std::sync::OnceLock;

use memchr::memchr;
use memchr::memmem;
use regex::Regex;

use crate::message::{Chunk, EncodedText, HeaderValue, Message};
use crate::text::charset::Charset;
use crate::text::encoding::encoded_word;

/// Failures while decoding the existing Subject header. Callers treat these
/// as "forward the message with its subject untouched"; they never bounce.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("invalid base64 in encoded word")]
    Base64(#[from] base64::DecodeError),

    #[error("unknown charset in encoded word: {0}")]
    UnknownCharset(String),

    #[error("subject text is not valid {0}")]
    Decode(&'static str),
}

fn reply_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^((RE|AW|SV|VS)(\[\d+\])?:\s*)+").unwrap())
}

fn digit_directive() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"%\d*d").unwrap())
}

/// Prepends `prefix` to the message's Subject header, in place.
///
/// A whitespace-only prefix is a no-op. `post_id` is the list's running
/// sequence number, substituted for a `%d` / `%Nd` directive in the prefix
/// when one is present; without it the prefix is used literally.
pub fn rewrite_subject<M: Message>(
    msg: &mut M,
    prefix: &str,
    post_id: Option<u64>,
) -> Result<(), RewriteError> {
    if prefix.trim().is_empty() {
        return Ok(());
    }
    let raw = msg
        .get_header("subject")
        .map(Cow::into_owned)
        .unwrap_or_default();
    let ws = continuation_ws(&raw);
    // The pattern is built from the unsubstituted prefix so that any older
    // sequence number still matches and gets stripped.
    let pattern = prefix_pattern(prefix);
    let prefix = substitute_post_id(prefix, post_id);

    let chunks = decode_subject(&raw)?;
    let value = ascii_subject(&chunks, &prefix, &pattern)
        .or_else(|| uniform_subject(&chunks, &prefix, &pattern, ws))
        .unwrap_or_else(|| mixed_subject(chunks, &prefix, &pattern, ws));

    msg.delete_header("subject");
    msg.set_header("Subject", value);
    Ok(())
}

/// Continuation whitespace of a folded header: the first character of the
/// second line if there is one, tab otherwise.
fn continuation_ws(raw: &str) -> char {
    match memchr(b'\n', raw.as_bytes()) {
        Some(i) if raw.as_bytes().get(i + 1) == Some(&b' ') => ' ',
        _ => '\t',
    }
}

/// Escapes the prefix into a regex that matches prior occurrences of it.
/// A `%d` / `%Nd` directive past the first character widens into
/// `\s*\d+\s*` so earlier sequence numbers match too, and the trailing
/// whitespace is optional so a subject that is nothing but the bare tag
/// still normalizes.
fn prefix_pattern(prefix: &str) -> Regex {
    let mut pattern = regex::escape(prefix.trim_end());
    if digit_directive().find_at(prefix, 1).is_some() {
        pattern = digit_directive()
            .replace_all(&pattern, r"\s*\d+\s*")
            .into_owned();
    }
    pattern.push_str(r"\s*");
    Regex::new(&pattern).unwrap()
}

/// `prefix % post_id`: substitute when the prefix has exactly one numeric
/// directive and a post id was supplied; otherwise keep the prefix as-is.
fn substitute_post_id(prefix: &str, post_id: Option<u64>) -> String {
    let Some(id) = post_id else {
        return prefix.to_string();
    };
    let directives: Vec<_> = digit_directive().find_iter(prefix).collect();
    let [directive] = directives.as_slice() else {
        return prefix.to_string();
    };
    let width_spec = &prefix[directive.start() + 1..directive.end() - 1];
    let number = if width_spec.is_empty() {
        id.to_string()
    } else {
        let width: usize = width_spec.parse().unwrap_or(0);
        if width_spec.starts_with('0') {
            format!("{id:0width$}")
        } else {
            format!("{id:width$}")
        }
    };
    format!(
        "{}{}{}",
        &prefix[..directive.start()],
        number,
        &prefix[directive.end()..]
    )
}

/// Splits a raw Subject value into charset-tagged chunks, decoding RFC 2047
/// encoded words. Unencoded runs become `us-ascii` chunks (or UTF-8 when
/// they carry eight-bit text); whitespace that merely separates two encoded
/// words is dropped, and folds collapse to a single space, both as decoders
/// are required to do.
fn decode_subject(raw: &str) -> Result<Vec<Chunk>, RewriteError> {
    let bytes = raw.as_bytes();
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut prev_encoded = false;
    let mut plain_start = 0;
    let mut pos = 0;

    while let Some(offset) = memmem::find(&bytes[pos..], b"=?") {
        let at = pos + offset;
        match encoded_word(&bytes[at..]) {
            Ok((rest, word)) => {
                push_plain(&mut chunks, &raw[plain_start..at], prev_encoded);
                chunks.push(decode_word(&word)?);
                prev_encoded = true;
                pos = bytes.len() - rest.len();
                plain_start = pos;
            }
            Err(_) => pos = at + 2,
        }
    }
    push_plain(&mut chunks, &raw[plain_start..], prev_encoded);
    Ok(chunks)
}

fn push_plain(chunks: &mut Vec<Chunk>, text: &str, prev_encoded: bool) {
    if text.is_empty() || (prev_encoded && text.trim().is_empty()) {
        return;
    }
    let text = if chunks.is_empty() {
        text.trim_start()
    } else {
        text
    };
    let text = unfold(text);
    if text.is_empty() {
        return;
    }
    let charset = if text.is_ascii() {
        Charset::Ascii
    } else {
        Charset::Encoding(encoding_rs::UTF_8)
    };
    chunks.push(Chunk::new(text, charset));
}

// A fold plus the continuation whitespace reads back as one space.
fn unfold(text: &str) -> String {
    let mut lines = text.lines();
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        out.push(' ');
        out.push_str(line.trim_start());
    }
    out
}

fn decode_word(word: &crate::text::encoding::EncodedWord<'_>) -> Result<Chunk, RewriteError> {
    let label = String::from_utf8_lossy(word.charset());
    let charset = Charset::for_label(&label)
        .ok_or_else(|| RewriteError::UnknownCharset(label.into_owned()))?;
    let bytes = word.bytes()?;
    let text = charset
        .decode(&bytes)
        .ok_or(RewriteError::Decode(charset.as_str()))?;
    Ok(Chunk { text, charset })
}

/// Shared rewrite: flatten to one line, note and drop a leading reply
/// marker, strip prior prefixes, fall back to `(no subject)` when nothing
/// remains, and reassemble as `prefix ["Re: "] rest`.
fn retag(text: &str, prefix: &str, pattern: &Regex) -> String {
    let single: String = text.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();
    let (replied, remainder) = match reply_prefix().find(&single) {
        Some(found) => (true, &single[found.end()..]),
        None => (false, single.as_str()),
    };
    let mut body = pattern.replace_all(remainder, "").into_owned();
    if body.trim().is_empty() {
        body = "(no subject)".to_string();
    }
    let mut out = String::with_capacity(prefix.len() + 4 + body.len());
    out.push_str(prefix);
    if replied {
        out.push_str("Re: ");
    }
    out.push_str(&body);
    out
}

/// Strategy 1: everything decodes as plain ASCII, including an absent or
/// empty subject. The result is an ordinary unencoded header.
fn ascii_subject(chunks: &[Chunk], prefix: &str, pattern: &Regex) -> Option<HeaderValue> {
    chunks
        .iter()
        .all(|chunk| chunk.charset == Charset::Ascii)
        .then(|| HeaderValue::Plain(retag(&flattened(chunks), prefix, pattern)))
}

/// Strategy 2: every chunk shares one charset, so the whole subject can be
/// rewritten as text and re-encoded in that charset.
fn uniform_subject(
    chunks: &[Chunk],
    prefix: &str,
    pattern: &Regex,
    ws: char,
) -> Option<HeaderValue> {
    let charset = chunks.first()?.charset;
    chunks
        .iter()
        .all(|chunk| chunk.charset == charset)
        .then(|| {
            HeaderValue::Encoded(EncodedText {
                chunks: vec![Chunk::new(retag(&flattened(chunks), prefix, pattern), charset)],
                continuation_ws: ws,
            })
        })
}

/// Strategy 3: charsets differ, so chunks must be preserved as they are.
/// Only the first chunk is searched for reply markers and old prefixes; the
/// new prefix goes in front as a chunk of its own.
fn mixed_subject(mut chunks: Vec<Chunk>, prefix: &str, pattern: &Regex, ws: char) -> HeaderValue {
    if chunks.is_empty() {
        return HeaderValue::Encoded(EncodedText {
            chunks: vec![
                Chunk::new(prefix, Charset::Ascii),
                Chunk::new("(no subject)", Charset::Ascii),
            ],
            continuation_ws: ws,
        });
    }
    let stripped = pattern.replace_all(&chunks[0].text, "").into_owned();
    let stripped = stripped.trim_start();
    chunks[0].text = match reply_prefix().find(stripped) {
        Some(found) => format!("Re: {}", &stripped[found.end()..]),
        None => stripped.to_string(),
    };
    chunks.insert(0, Chunk::new(prefix, Charset::Ascii));
    HeaderValue::Encoded(EncodedText {
        chunks,
        continuation_ws: ws,
    })
}

fn flattened(chunks: &[Chunk]) -> String {
    chunks.iter().map(|chunk| chunk.text.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_prefix_is_a_noop() {
        let mut msg = crate::message::HeaderMap::new();
        msg.set_header("Subject", HeaderValue::Plain("hi".into()));
        rewrite_subject(&mut msg, "   ", None).unwrap();
        assert_eq!(msg.get_header("subject").unwrap(), "hi");
    }

    #[test]
    fn continuation_ws_detection() {
        assert_eq!(continuation_ws("one line"), '\t');
        assert_eq!(continuation_ws("two\r\n lines"), ' ');
        assert_eq!(continuation_ws("two\r\n\tlines"), '\t');
    }

    #[test]
    fn prefix_pattern_matches_bare_and_spaced_tags() {
        let pattern = prefix_pattern("[Named] ");
        assert_eq!(pattern.replace_all("[Named] subject", ""), "subject");
        assert_eq!(pattern.replace_all("[Named]", ""), "");
        assert_eq!(pattern.replace_all("a [Named] b", ""), "a b");
    }

    #[test]
    fn prefix_pattern_matches_old_sequence_numbers() {
        let pattern = prefix_pattern("[ML %d] ");
        assert!(pattern.is_match("[ML 7] subject"));
        assert!(pattern.is_match("[ML 12345] subject"));
        assert!(!pattern.is_match("[ML x] subject"));
    }

    #[test]
    fn post_id_substitution() {
        assert_eq!(substitute_post_id("[ML %d] ", Some(7)), "[ML 7] ");
        assert_eq!(substitute_post_id("[ML %05d] ", Some(7)), "[ML 00007] ");
        assert_eq!(substitute_post_id("[ML %3d] ", Some(7)), "[ML   7] ");
        // No post id, or nothing unambiguous to substitute: keep literal.
        assert_eq!(substitute_post_id("[ML %d] ", None), "[ML %d] ");
        assert_eq!(substitute_post_id("[%d %d] ", Some(7)), "[%d %d] ");
        assert_eq!(substitute_post_id("[ML] ", Some(7)), "[ML] ");
    }

    #[test]
    fn decode_splits_words_and_plain_runs() {
        let chunks = decode_subject("hello =?iso8859-1?Q?caf=E9?= world").unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "hello ");
        assert_eq!(chunks[0].charset, Charset::Ascii);
        assert_eq!(chunks[1].text, "café");
        assert_eq!(chunks[2].text, " world");
    }

    #[test]
    fn decode_drops_whitespace_between_encoded_words() {
        let chunks =
            decode_subject("=?iso8859-1?Q?a?= =?iso8859-1?Q?b?=").unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "a");
        assert_eq!(chunks[1].text, "b");

        let folded =
            decode_subject("=?iso8859-1?Q?a?=\r\n =?iso8859-1?Q?b?=").unwrap();
        assert_eq!(folded.len(), 2);
    }

    #[test]
    fn decode_surfaces_unknown_charsets() {
        let err = decode_subject("=?x-enigma?Q?a?=").unwrap_err();
        assert!(matches!(err, RewriteError::UnknownCharset(label) if label == "x-enigma"));
    }

    #[test]
    fn decode_surfaces_charset_mismatches() {
        let err = decode_subject("=?us-ascii?Q?caf=E9?=").unwrap_err();
        assert!(matches!(err, RewriteError::Decode("us-ascii")));
    }

    #[test]
    fn undecodable_words_stay_plain_text() {
        // Not a well-formed encoded word at all: kept verbatim as text.
        let chunks = decode_subject("price =? 100").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "price =? 100");
    }

    #[test]
    fn retag_strips_reply_markers_and_prior_tags() {
        let pattern = prefix_pattern("[Named] ");
        assert_eq!(retag("subject", "[Named] ", &pattern), "[Named] subject");
        assert_eq!(
            retag("Re: [Named] subject", "[Named] ", &pattern),
            "[Named] Re: subject",
        );
        assert_eq!(
            retag("AW[2]: sv: subject", "[Named] ", &pattern),
            "[Named] Re: subject",
        );
        assert_eq!(retag("[Named]", "[Named] ", &pattern), "[Named] (no subject)");
        assert_eq!(retag("  ", "[Named] ", &pattern), "[Named] (no subject)");
    }
}
