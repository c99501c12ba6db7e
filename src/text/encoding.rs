use std::fmt::Write;

use base64::{engine::general_purpose, Engine as _};
use nom::{
    branch::alt,
    bytes::complete::{tag, take, take_while, take_while1},
    character::complete::one_of,
    character::is_alphanumeric,
    combinator::map,
    multi::{many0, many1},
    sequence::{preceded, terminated, tuple},
    IResult,
};

use crate::text::ascii;
use crate::text::charset::Charset;

// The parser is more lenient than RFC 2047: it accepts bytes inside the
// encoded text that the RFC forbids (e.g. space), matching what mail
// software produces in the wild. The printer is strictly compliant.

/// A single parsed `=?charset?Q|B?...?=` token.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedWord<'a> {
    Quoted(QuotedWord<'a>),
    Base64(Base64Word<'a>),
}

impl<'a> EncodedWord<'a> {
    /// The charset label, verbatim from the word.
    pub fn charset(&self) -> &'a [u8] {
        match self {
            EncodedWord::Quoted(word) => word.charset,
            EncodedWord::Base64(word) => word.charset,
        }
    }

    /// The payload bytes, still in the word's charset.
    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match self {
            EncodedWord::Quoted(word) => Ok(word.bytes()),
            EncodedWord::Base64(word) => word.bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuotedWord<'a> {
    pub charset: &'a [u8],
    pub chunks: Vec<QuotedChunk<'a>>,
}

impl QuotedWord<'_> {
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in &self.chunks {
            match chunk {
                QuotedChunk::Safe(bytes) => out.extend_from_slice(bytes),
                QuotedChunk::Encoded(bytes) => out.extend_from_slice(bytes),
                QuotedChunk::Space => out.push(ascii::SP),
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Base64Word<'a> {
    pub charset: &'a [u8],
    pub content: &'a [u8],
}

impl Base64Word<'_> {
    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        general_purpose::STANDARD_NO_PAD.decode(self.content)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuotedChunk<'a> {
    Safe(&'a [u8]),
    Encoded(Vec<u8>),
    Space,
}

pub fn encoded_word(input: &[u8]) -> IResult<&[u8], EncodedWord<'_>> {
    alt((quoted_word, base64_word))(input)
}

fn quoted_word(input: &[u8]) -> IResult<&[u8], EncodedWord<'_>> {
    let (rest, (_, charset, _, _, _, chunks, _)) = tuple((
        tag("=?"),
        token,
        tag("?"),
        one_of("Qq"),
        tag("?"),
        ptext,
        tag("?="),
    ))(input)?;
    Ok((rest, EncodedWord::Quoted(QuotedWord { charset, chunks })))
}

fn base64_word(input: &[u8]) -> IResult<&[u8], EncodedWord<'_>> {
    let (rest, (_, charset, _, _, _, content, _)) = tuple((
        tag("=?"),
        token,
        tag("?"),
        one_of("Bb"),
        tag("?"),
        btext,
        tag("?="),
    ))(input)?;
    Ok((rest, EncodedWord::Base64(Base64Word { charset, content })))
}

/// RFC 2047 token: printable ASCII except SPACE and the especials.
fn is_token_char(c: u8) -> bool {
    c.is_ascii_graphic() && !b"()<>@,;:\"/[]?.=".contains(&c)
}

fn token(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(is_token_char)(input)
}

/// `encoded-text` of a Q word, split into literal runs, `_` spaces and
/// `=XX` octet runs.
fn ptext(input: &[u8]) -> IResult<&[u8], Vec<QuotedChunk<'_>>> {
    many0(alt((safe_chunk, encoded_space, hex_octets)))(input)
}

// 8-bit values corresponding to printable characters other than "=", "?"
// and "_" may be represented as themselves (RFC 2047 section 4.2).
fn is_safe_char(c: u8) -> bool {
    c >= ascii::SP && c != ascii::UNDERSCORE && c != ascii::QUESTION && c != ascii::EQ
}

fn safe_chunk(input: &[u8]) -> IResult<&[u8], QuotedChunk<'_>> {
    map(take_while1(is_safe_char), QuotedChunk::Safe)(input)
}

fn encoded_space(input: &[u8]) -> IResult<&[u8], QuotedChunk<'_>> {
    map(tag("_"), |_| QuotedChunk::Space)(input)
}

fn hex_octet(input: &[u8]) -> IResult<&[u8], u8> {
    use nom::error::{Error, ErrorKind};

    let (rest, digits) = preceded(tag("="), take(2usize))(input)?;
    let text = String::from_utf8_lossy(digits);
    let value = u8::from_str_radix(text.as_ref(), 16)
        .map_err(|_| nom::Err::Error(Error::new(input, ErrorKind::Verify)))?;
    Ok((rest, value))
}

fn hex_octets(input: &[u8]) -> IResult<&[u8], QuotedChunk<'_>> {
    map(many1(hex_octet), QuotedChunk::Encoded)(input)
}

/// `encoded-text` of a B word; trailing padding is consumed and dropped.
fn btext(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_while(is_base64_char), many0(tag("=")))(input)
}

fn is_base64_char(c: u8) -> bool {
    is_alphanumeric(c) || c == ascii::PLUS || c == ascii::SLASH
}

/// Maximum length of one encoded word, specified in RFC 2047.
const MAX_ENCODED_WORD: usize = 75;

// Safe to display as-is inside encoded-text in any context: the general Q
// restrictions plus those for comments and phrases (RFC 2047 sections 4.2
// and 5).
fn is_q_safe(c: u8) -> bool {
    is_alphanumeric(c)
        || c == ascii::EXCLAMATION
        || c == ascii::ASTERISK
        || c == ascii::PLUS
        || c == ascii::MINUS
        || c == ascii::SLASH
}

/// Q-encodes `text` in `charset` as one or more encoded words, breaking at
/// the 75-byte limit with `fold` (CRLF plus continuation whitespace) between
/// words. Characters are charset-encoded one at a time so a split never lands
/// inside a multi-byte sequence.
pub fn q_encode(text: &str, charset: Charset, fold: &str) -> String {
    let header = format!("=?{}?Q?", charset.as_str());
    let mut out = String::new();
    let mut word = String::new();
    let mut encoded = String::new();
    let mut utf8 = [0u8; 4];

    for c in text.chars() {
        encoded.clear();
        if c == ' ' {
            // Space gets the special underscore treatment (RFC 2047, 4.2 (2)).
            encoded.push('_');
        } else if c.is_ascii() && is_q_safe(c as u8) {
            encoded.push(c);
        } else {
            for byte in charset.encode(c.encode_utf8(&mut utf8)) {
                write!(encoded, "={byte:02X}").unwrap();
            }
        }

        if header.len() + word.len() + encoded.len() + 2 > MAX_ENCODED_WORD {
            out.push_str(&header);
            out.push_str(&word);
            out.push_str("?=");
            out.push_str(fold);
            word.clear();
        }
        word.push_str(&encoded);
    }

    if !word.is_empty() {
        out.push_str(&header);
        out.push_str(&word);
        out.push_str("?=");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ptext() {
        assert_eq!(
            ptext(b"Accus=E9_de_r=E9ception"),
            Ok((
                &b""[..],
                vec![
                    QuotedChunk::Safe(b"Accus"),
                    QuotedChunk::Encoded(vec![0xe9]),
                    QuotedChunk::Space,
                    QuotedChunk::Safe(b"de"),
                    QuotedChunk::Space,
                    QuotedChunk::Safe(b"r"),
                    QuotedChunk::Encoded(vec![0xe9]),
                    QuotedChunk::Safe(b"ception"),
                ]
            ))
        );
    }

    fn decoded(input: &[u8]) -> String {
        let (rest, word) = encoded_word(input).unwrap();
        assert!(rest.is_empty());
        let charset = Charset::for_label(&String::from_utf8_lossy(word.charset())).unwrap();
        charset.decode(&word.bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_decode_quoted() {
        assert_eq!(
            decoded(b"=?iso8859-1?Q?Accus=E9_de_r=E9ception_(affich=E9)?="),
            "Accusé de réception (affiché)",
        );
        assert_eq!(decoded(b"=?UTF-8?Q?John_Sm=C3=AEth?="), "John Smîth");
    }

    #[test]
    fn test_decode_base64() {
        assert_eq!(
            decoded(b"=?ISO-8859-1?B?SWYgeW91IGNhbiByZWFkIHRoaXMgeW8=?="),
            "If you can read this yo",
        );
    }

    #[test]
    fn test_garbage_payload_is_not_a_word() {
        // '#' is neither base64 nor a Q token, so this never parses as an
        // encoded word and stays plain text for the caller.
        assert!(encoded_word(b"=?utf-8?B?###?=").is_err());
    }

    #[test]
    fn test_bad_base64_length_is_an_error() {
        let (_, word) = encoded_word(b"=?utf-8?B?S?=").unwrap();
        assert!(word.bytes().is_err());
    }

    #[test]
    fn test_stripped_padding_still_decodes() {
        let (_, word) = encoded_word(b"=?utf-8?B?SWY=?=").unwrap();
        assert_eq!(word.bytes().unwrap(), b"If");
        let (_, word) = encoded_word(b"=?utf-8?B?SWYx?=").unwrap();
        assert_eq!(word.bytes().unwrap(), b"If1");
    }

    #[test]
    fn test_encode() {
        assert_eq!(
            q_encode("Accusé de réception (affiché)", Charset::Encoding(encoding_rs::UTF_8), "\r\n "),
            "=?UTF-8?Q?Accus=C3=A9_de_r=C3=A9ception_=28affich=C3=A9=29?=",
        );
        assert_eq!(
            q_encode("John Smîth", Charset::Encoding(encoding_rs::UTF_8), "\r\n "),
            "=?UTF-8?Q?John_Sm=C3=AEth?=",
        );
    }

    #[test]
    fn test_encode_latin1() {
        assert_eq!(
            q_encode("café", Charset::Encoding(encoding_rs::WINDOWS_1252), "\r\n "),
            "=?windows-1252?Q?caf=E9?=",
        );
    }

    #[test]
    fn test_encode_folding() {
        assert_eq!(
            q_encode(
                "Accusé de réception (affiché) Accusé de réception (affiché)",
                Charset::Encoding(encoding_rs::UTF_8),
                "\r\n ",
            ),
            "=?UTF-8?Q?Accus=C3=A9_de_r=C3=A9ception_=28affich=C3=A9=29_Accus=C3=A9_de?=\r\n =?UTF-8?Q?_r=C3=A9ception_=28affich=C3=A9=29?=",
        );
    }
}
