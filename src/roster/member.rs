use std::borrow::Cow;

use bounded_static::ToStatic;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    combinator::{map, opt, rest},
    IResult,
};

/// One list-file line: an optional display name and the member address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, ToStatic)]
pub struct Member<'a> {
    pub name: Option<Cow<'a, str>>,
    pub addr: Cow<'a, str>,
}

/// Parses a member line in any of the forms produced by the usual
/// `list_members` tooling:
///
/// ```text
/// user@host
/// First Last <user@host>
/// "First Last" <user@host>
/// ```
///
/// Surrounding double quotes and backslashes are stripped from the name and
/// the address is lower-cased. No further validation happens here; a line
/// that is none of these forms yields garbage-in-garbage-out, as documented
/// for the list-file format.
pub fn member(input: &str) -> IResult<&str, Member<'_>> {
    alt((name_addr, bare_addr))(input)
}

/// `[display-name] "<" addr ">"`
fn name_addr(input: &str) -> IResult<&str, Member<'_>> {
    let (input, name) = take_until("<")(input)?;
    let (input, _) = tag("<")(input)?;
    let (input, addr) = take_while(|c| c != '>')(input)?;
    let (input, _) = opt(tag(">"))(input)?;
    Ok((
        input,
        Member {
            name: clean_name(name),
            addr: normalize_addr(addr),
        },
    ))
}

fn bare_addr(input: &str) -> IResult<&str, Member<'_>> {
    map(rest, |addr| Member {
        name: None,
        addr: normalize_addr(addr),
    })(input)
}

fn clean_name(raw: &str) -> Option<Cow<'_, str>> {
    let name = raw.trim().trim_matches('"').trim();
    let name: Cow<'_, str> = if name.contains('\\') {
        Cow::Owned(name.replace('\\', "").trim().to_string())
    } else {
        Cow::Borrowed(name)
    };
    (!name.is_empty()).then_some(name)
}

fn normalize_addr(raw: &str) -> Cow<'_, str> {
    let addr = raw.trim();
    if addr.chars().any(char::is_uppercase) {
        Cow::Owned(addr.to_lowercase())
    } else {
        Cow::Borrowed(addr)
    }
}
