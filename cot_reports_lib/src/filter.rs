//! Contract alias sets and exact-name row selection.

use std::collections::HashSet;

use crate::error::CotError;
use crate::record::Record;

/// The historical names of one logical contract, in caller order, without
/// duplicates. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasSet {
    aliases: Vec<String>,
}

/// Order-independent cache key for an [`AliasSet`]: its distinct aliases,
/// sorted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AliasKey(Vec<String>);

impl AliasSet {
    /// Builds an alias set, dropping repeated names. Matching is exact, so
    /// names are kept byte-for-byte (no trimming or case folding).
    pub fn new<I, S>(aliases: I) -> Result<Self, CotError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for alias in aliases {
            let alias = alias.into();
            if seen.insert(alias.clone()) {
                out.push(alias);
            }
        }
        if out.is_empty() {
            return Err(CotError::InvalidInput(
                "at least one contract name is required".to_string(),
            ));
        }
        Ok(Self { aliases: out })
    }

    pub fn as_slice(&self) -> &[String] {
        &self.aliases
    }

    pub fn contains(&self, name: &str) -> bool {
        self.aliases.iter().any(|a| a == name)
    }

    pub fn key(&self) -> AliasKey {
        let mut sorted = self.aliases.clone();
        sorted.sort();
        AliasKey(sorted)
    }
}

impl AliasKey {
    pub fn aliases(&self) -> &[String] {
        &self.0
    }

    /// True when every alias of `self` also appears in `other`.
    pub fn is_subset_of(&self, other: &AliasKey) -> bool {
        self.0.iter().all(|a| other.0.binary_search(a).is_ok())
    }
}

/// Keeps records whose contract name is exactly one of `aliases`.
///
/// Zero matches is a valid outcome, not an error.
pub fn filter(records: Vec<Record>, aliases: &AliasSet) -> Vec<Record> {
    let wanted: HashSet<&str> = aliases.as_slice().iter().map(String::as_str).collect();
    records
        .into_iter()
        .filter(|r| wanted.contains(r.contract.as_str()))
        .collect()
}

/// Known contract names most similar to `name`, best first.
///
/// Only used to help callers fix a misspelled alias; selection itself never
/// matches approximately.
pub fn closest_contract_names<'a, I>(name: &str, universe: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    const MIN_SIMILARITY: f64 = 0.5;

    let needle = name.to_uppercase();
    let mut scored: Vec<(f64, &String)> = universe
        .into_iter()
        .map(|candidate| {
            let score = strsim::normalized_levenshtein(&needle, &candidate.to_uppercase());
            (score, candidate)
        })
        .filter(|(score, _)| *score >= MIN_SIMILARITY)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, c)| c.clone())
        .collect()
}
