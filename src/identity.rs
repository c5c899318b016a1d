//! Team identity resolution across providers.
//!
//! Provider spellings differ ("Beşiktaş" vs "Besiktas JK", "Man City" vs
//! "Manchester City"). Names are case-folded and diacritic-folded, then
//! matched exactly, then by substring containment in either direction.
//! Resolution never fails hard: `None` tells the caller to fall back to
//! neutral defaults.
//!
//! The resolver also keeps a persistent name → external-id cache so later
//! point lookups (e.g. head-to-head history) don't need to search again.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Case-fold and diacritic-fold a team name into its canonical key.
///
/// Punctuation becomes whitespace and runs of whitespace collapse, so
/// `"Paris Saint-Germain"` and `"paris saint germain"` share a key.
pub fn normalize_team_name(raw: &str) -> String {
    let folded: String = raw
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(fold_special)
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Letters that carry no decomposable diacritic but still need folding.
fn fold_special(c: char) -> Vec<char> {
    match c {
        'ı' => vec!['i'],
        'ø' | 'Ø' => vec!['o'],
        'ł' | 'Ł' => vec!['l'],
        'đ' | 'Đ' => vec!['d'],
        'ß' => vec!['s', 's'],
        'æ' | 'Æ' => vec!['a', 'e'],
        other => vec![other],
    }
}

/// Resolves provider team names to canonical keys and caches external ids.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    /// Canonical key → external (secondary-provider) team id.
    external_ids: BTreeMap<String, u64>,
    dirty: bool,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `name` against a set of known names.
    ///
    /// Returns the matching candidate, or `None` when nothing matches.
    /// Exact matches on the canonical key win; otherwise the first
    /// containment match wins, preferring the candidate whose length is
    /// closest to the query, then lexicographic order, so repeated calls on
    /// the same snapshot always agree.
    pub fn resolve<'a, I>(&self, name: &str, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let key = normalize_team_name(name);
        if key.is_empty() {
            return None;
        }

        let mut best: Option<(usize, String, &'a str)> = None;
        for candidate in candidates {
            let candidate_key = normalize_team_name(candidate);
            if candidate_key.is_empty() {
                continue;
            }
            if candidate_key == key {
                return Some(candidate);
            }
            if candidate_key.contains(&key) || key.contains(&candidate_key) {
                let distance = candidate_key.len().abs_diff(key.len());
                let better = match &best {
                    None => true,
                    Some((d, k, _)) => (distance, &candidate_key) < (*d, k),
                };
                if better {
                    best = Some((distance, candidate_key, candidate));
                }
            }
        }

        match best {
            Some((_, _, candidate)) => {
                debug!(name, matched = candidate, "Resolved by containment");
                Some(candidate)
            }
            None => None,
        }
    }

    /// Record the external id for a team name.
    pub fn remember(&mut self, name: &str, external_id: u64) {
        let key = normalize_team_name(name);
        if key.is_empty() {
            return;
        }
        if self.external_ids.get(&key) != Some(&external_id) {
            self.external_ids.insert(key, external_id);
            self.dirty = true;
        }
    }

    /// Cached external id for a team name, if one has been seen.
    pub fn external_id(&self, name: &str) -> Option<u64> {
        self.external_ids.get(&normalize_team_name(name)).copied()
    }

    pub fn len(&self) -> usize {
        self.external_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.external_ids.is_empty()
    }

    /// Whether new ids were learned since the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Load the id cache from a JSON file. A missing file yields an empty resolver.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            info!(path, "No identity cache found, starting empty");
            return Ok(Self::new());
        }
        let external_ids: BTreeMap<String, u64> = crate::storage::read_json(path)
            .with_context(|| format!("Failed to load identity cache from {path}"))?;
        info!(path, teams = external_ids.len(), "Identity cache loaded");
        Ok(Self { external_ids, dirty: false })
    }

    /// Persist the id cache to a JSON file.
    pub fn save(&mut self, path: &str) -> Result<()> {
        crate::storage::write_json(path, &self.external_ids)
            .with_context(|| format!("Failed to save identity cache to {path}"))?;
        self.dirty = false;
        Ok(())
    }
}
