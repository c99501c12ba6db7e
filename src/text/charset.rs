use encoding_rs::Encoding;

/// Character set of a header chunk.
///
/// encoding_rs implements the WHATWG encoding standard, which has no
/// US-ASCII: the label resolves to windows-1252. Mail needs us-ascii as a
/// charset of its own, because unencoded header text and `us-ascii` encoded
/// words must compare equal when deciding how a subject can be re-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// us-ascii, or text that never carried a charset label.
    Ascii,
    /// Any charset encoding_rs knows under its IANA/WHATWG labels.
    Encoding(&'static Encoding),
}

impl Charset {
    /// Resolves an encoded-word charset label. `None` means the label is
    /// unknown; callers surface that instead of guessing a fallback, so a
    /// message with an unintelligible subject passes through untouched.
    pub fn for_label(label: &str) -> Option<Charset> {
        if label.eq_ignore_ascii_case("us-ascii") || label.eq_ignore_ascii_case("ascii") {
            return Some(Charset::Ascii);
        }
        Encoding::for_label(label.as_bytes()).map(Charset::Encoding)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Charset::Ascii => "us-ascii",
            Charset::Encoding(enc) => enc.name(),
        }
    }

    /// Strict decode: malformed sequences yield `None` rather than
    /// replacement characters.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Charset::Ascii => bytes
                .is_ascii()
                .then(|| String::from_utf8_lossy(bytes).into_owned()),
            Charset::Encoding(enc) => {
                let (text, had_errors) = enc.decode_without_bom_handling(bytes);
                (!had_errors).then(|| text.into_owned())
            }
        }
    }

    /// Encodes `text` in this charset. Unmappable characters follow
    /// encoding_rs semantics (numeric character references); the only text
    /// this crate ever adds to a foreign-charset chunk is ASCII, which every
    /// encoder maps cleanly.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Charset::Ascii => text.as_bytes().to_vec(),
            Charset::Encoding(enc) => enc.encode(text).0.into_owned(),
        }
    }
}
