use crate::domain::model::Identifier;
use std::collections::HashSet;
use std::hash::Hash;

/// Strips every non-digit character. Returns an empty string when no digits remain.
pub fn canonicalize(token: &str) -> String {
    token.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn to_identifier(token: &str) -> Option<Identifier> {
    Identifier::from_digits(&canonicalize(token))
}

/// Removes repeats, keeping the first occurrence of each item.
pub fn dedupe<T, I>(items: I) -> Vec<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Splits free-form owner input on commas, pipes, semicolons and whitespace.
pub fn split_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == ',' || c == '|' || c == ';' || c.is_whitespace())
        .filter(|token| !token.is_empty())
}

/// Canonicalizes raw tokens, drops the ones without digits and dedupes.
pub fn identifiers<'a, I>(tokens: I) -> Vec<Identifier>
where
    I: IntoIterator<Item = &'a str>,
{
    dedupe(tokens.into_iter().filter_map(to_identifier))
}
