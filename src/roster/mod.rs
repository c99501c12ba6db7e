//! Mailing-list membership, loaded once at startup and read-only afterwards.
//!
//! A mailing list is a file in the lists directory; the file name is the
//! list name and each non-blank line is one member (see [`member`]). The
//! symbols file assigns every list the short symbol that appears in subject
//! tags. Lists may contain other lists by address (`other-list@<domain>`);
//! those are flattened at load time, bounded by [`NEST_LIMIT`].

pub mod member;

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use bounded_static::ToBoundedStatic;

use crate::error::Error;
use crate::expr::Resolver;
use member::Member;

/// Mailing lists may not be nested more deeply than this. Anything deeper
/// almost certainly means two lists contain each other.
pub const NEST_LIMIT: u32 = 10;

/// An alias entry: either exactly one person answers to the identifier, or
/// several do and the identifier is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasValue {
    Unique(String),
    Ambiguous,
}

/// An immutable snapshot of every list on the server.
///
/// Built once from disk, then queried through [`Resolver::resolve`] by any
/// number of connection handlers; there is no reloading short of a restart.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// list name (lowercase) to fully flattened member addresses
    lists: BTreeMap<String, BTreeSet<String>>,
    /// person identifier to address, with ambiguity folded in
    aliases: BTreeMap<String, AliasValue>,
    /// list name or member address to subject-tag symbol
    symbols: BTreeMap<String, String>,
}

impl Snapshot {
    /// Loads membership from a directory of list files and a symbols file.
    ///
    /// `domain` is the server's mail domain; only members at this domain can
    /// refer to other lists. Fails when nesting exceeds [`NEST_LIMIT`] or
    /// when a list has no symbol.
    pub fn load(lists_dir: &Path, symbols_file: &Path, domain: &str) -> Result<Self, Error> {
        let domain = domain.to_lowercase();
        let rosters = read_rosters(lists_dir)?;

        let raw: BTreeMap<String, BTreeSet<String>> = rosters
            .iter()
            .map(|(name, members)| {
                let addrs = members.iter().map(|m| m.addr.to_string()).collect();
                (name.clone(), addrs)
            })
            .collect();
        let mut lists = BTreeMap::new();
        for name in rosters.keys() {
            lists.insert(name.clone(), flatten(name, &raw, &domain, 0)?);
        }

        let symbols = load_symbols(symbols_file, &rosters)?;
        let aliases = build_aliases(&rosters);

        let missing: Vec<&str> = lists
            .keys()
            .filter(|name| !symbols.contains_key(*name))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingSymbol(missing.join(", ")));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            lists = lists.len(),
            aliases = aliases.len(),
            symbols = symbols.len(),
            "membership snapshot loaded"
        );

        Ok(Snapshot {
            lists,
            aliases,
            symbols,
        })
    }

    pub fn lists(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.lists
    }

    pub fn aliases(&self) -> &BTreeMap<String, AliasValue> {
        &self.aliases
    }

    pub fn symbols(&self) -> &BTreeMap<String, String> {
        &self.symbols
    }

    fn symbol_for(&self, key: &str) -> String {
        // Construction guarantees a symbol for every list and for every
        // member reachable through an alias.
        self.symbols.get(key).cloned().unwrap_or_default()
    }
}

impl Resolver for Snapshot {
    /// Queries the symbol and recipient addresses of a list or person.
    ///
    /// The token may be a list name or a person identifier: first, middle or
    /// last name, username, or period-joined full name, as long as it is
    /// unique to one member. List lookup takes precedence so every list is
    /// always addressable even when a person shares its name.
    fn resolve(&self, token: &str) -> Result<(String, BTreeSet<String>), Error> {
        let key = token.to_lowercase();
        if let Some(addrs) = self.lists.get(&key) {
            return Ok((self.symbol_for(&key), addrs.clone()));
        }
        match self.aliases.get(&key) {
            Some(AliasValue::Unique(addr)) => {
                Ok((self.symbol_for(addr), BTreeSet::from([addr.clone()])))
            }
            Some(AliasValue::Ambiguous) => Err(Error::AmbiguousPerson(key)),
            None => Err(Error::UnknownName(key)),
        }
    }
}

/// Reads every regular file in the lists directory as one list.
fn read_rosters(dir: &Path) -> Result<BTreeMap<String, BTreeSet<Member<'static>>>, Error> {
    let mut rosters = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let text = fs::read_to_string(&path)?;
        let mut members = BTreeSet::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Ok((_, parsed)) = member::member(line) {
                members.insert(parsed.to_static());
            }
        }
        rosters.insert(name.to_lowercase(), members);
    }
    Ok(rosters)
}

/// Recursively replaces members that name another list on this server with
/// that list's members.
fn flatten(
    name: &str,
    raw: &BTreeMap<String, BTreeSet<String>>,
    domain: &str,
    depth: u32,
) -> Result<BTreeSet<String>, Error> {
    if depth > NEST_LIMIT {
        return Err(Error::NestingExceeded);
    }
    let mut out = BTreeSet::new();
    for addr in raw.get(name).into_iter().flatten() {
        match addr.split_once('@') {
            Some((local, addr_domain))
                if addr_domain == domain && raw.contains_key(local) =>
            {
                out.extend(flatten(local, raw, domain, depth + 1)?);
            }
            _ => {
                out.insert(addr.clone());
            }
        }
    }
    Ok(out)
}

/// List symbols come from the symbols file (`listname:SYMBOL` per line,
/// verbatim symbol, blank lines ignored); member symbols are the lowercase
/// initials of the display name. Later lists overwrite earlier ones for
/// members appearing under several display names.
fn load_symbols(
    path: &Path,
    rosters: &BTreeMap<String, BTreeSet<Member<'static>>>,
) -> Result<BTreeMap<String, String>, Error> {
    let mut symbols = BTreeMap::new();
    let text = fs::read_to_string(path)?;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((name, symbol)) = line.split_once(':') {
            symbols.insert(name.to_lowercase(), symbol.to_string());
        }
    }

    for members in rosters.values() {
        for member in members {
            if let Some(name) = &member.name {
                symbols.insert(member.addr.to_string(), initials(name));
            }
        }
    }
    Ok(symbols)
}

fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .collect::<String>()
        .to_lowercase()
}

/// Builds the person-identifier index over the union of all rosters.
///
/// Every *named* member is reachable by username (the address local part,
/// inserted as-is), by each word of the lowercased display name, and by the
/// period-joined full name; name-derived keys keep only `[a-z0-9.]`. A key
/// claimed by two different addresses turns ambiguous and stays that way.
fn build_aliases(
    rosters: &BTreeMap<String, BTreeSet<Member<'static>>>,
) -> BTreeMap<String, AliasValue> {
    let everyone: BTreeSet<&Member<'static>> = rosters.values().flatten().collect();

    let mut aliases = BTreeMap::new();
    for member in everyone {
        let Some(name) = &member.name else {
            continue;
        };

        let local = member
            .addr
            .split_once('@')
            .map(|(local, _)| local)
            .unwrap_or(&member.addr);
        insert_alias(&mut aliases, local.to_string(), &member.addr);

        let lowered = name.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        for word in &words {
            insert_alias(&mut aliases, clean_key(word), &member.addr);
        }
        insert_alias(&mut aliases, clean_key(&words.join(".")), &member.addr);
    }
    aliases
}

fn clean_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.')
        .collect()
}

fn insert_alias(aliases: &mut BTreeMap<String, AliasValue>, key: String, addr: &str) {
    match aliases.entry(key) {
        Entry::Vacant(entry) => {
            entry.insert(AliasValue::Unique(addr.to_string()));
        }
        Entry::Occupied(mut entry) => {
            let same = matches!(entry.get(), AliasValue::Unique(existing) if existing == addr);
            if !same {
                entry.insert(AliasValue::Ambiguous);
            }
        }
    }
}
