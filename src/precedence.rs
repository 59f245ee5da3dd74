//! Ordering used to pick one canonical record when a lookup matches several.
//!
//! [`Ordering::Less`] means the left record is preferred.

use std::cmp::Ordering;

use serde_json::Value;

use crate::error::LoaderError;
use crate::record::{GraphRecord, Target};

pub const PREFERRED_DRUG_SOURCES: &[&str] =
    &["drugbank", "chembl", "gsc therapeutic ontology", "fda", "ncit"];
pub const PREFERRED_DISEASE_SOURCES: &[&str] = &["oncotree", "disease ontology"];
pub const PREFERRED_VOCABULARY_SOURCES: &[&str] =
    &["bcgsc", "sequence ontology", "variation ontology"];
pub const PREFERRED_FEATURE_SOURCES: &[&str] = &["hgnc", "entrez gene", "ensembl", "refseq"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Precedence {
    source_ranking: &'static [&'static str],
}

impl Precedence {
    /// Generic ontology term ordering without a source preference list.
    pub const TERMS: Precedence = Precedence {
        source_ranking: &[],
    };
    pub const DRUGS: Precedence = Precedence {
        source_ranking: PREFERRED_DRUG_SOURCES,
    };
    pub const DISEASES: Precedence = Precedence {
        source_ranking: PREFERRED_DISEASE_SOURCES,
    };
    pub const VOCABULARY: Precedence = Precedence {
        source_ranking: PREFERRED_VOCABULARY_SOURCES,
    };
    pub const FEATURES: Precedence = Precedence {
        source_ranking: PREFERRED_FEATURE_SOURCES,
    };

    pub fn ranked(source_ranking: &'static [&'static str]) -> Self {
        Self { source_ranking }
    }

    /// Rank of a source name; sources missing from the list rank after every listed one.
    pub fn source_rank(&self, source_name: Option<&str>) -> usize {
        source_name
            .and_then(|name| {
                self.source_ranking
                    .iter()
                    .position(|ranked| ranked.eq_ignore_ascii_case(name))
            })
            .unwrap_or(usize::MAX)
    }

    pub fn compare(&self, first: &GraphRecord, second: &GraphRecord) -> Ordering {
        order_preferred_terms(first, second)
            .then_with(|| self.compare_source_rank(first, second))
            .then_with(|| compare_source_sort(first, second))
    }

    fn compare_source_rank(&self, first: &GraphRecord, second: &GraphRecord) -> Ordering {
        if self.source_ranking.is_empty() {
            return Ordering::Equal;
        }
        let first_name = first.source().and_then(|source| source.name());
        let second_name = second.source().and_then(|source| source.name());
        if first_name == second_name {
            return Ordering::Equal;
        }
        self.source_rank(first_name)
            .cmp(&self.source_rank(second_name))
    }
}

/// Base ordering: live before deprecated, independent before dependent, and for
/// the same term of the same source the generic or most recent version.
pub fn order_preferred_terms(first: &GraphRecord, second: &GraphRecord) -> Ordering {
    let deprecated = first.is_deprecated().cmp(&second.is_deprecated());
    if deprecated != Ordering::Equal {
        return deprecated;
    }
    let dependent = first.has_dependency().cmp(&second.has_dependency());
    if dependent != Ordering::Equal {
        return dependent;
    }

    if !same_term(first, second) {
        return Ordering::Equal;
    }
    match (first.source_id_version(), second.source_id_version()) {
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(left), Some(right)) => {
            let by_version = compare_versions(right, left);
            if by_version != Ordering::Equal {
                return by_version;
            }
        }
        (None, None) => {}
    }
    if let (Some(left), Some(right)) = (
        first.source().and_then(|source| source.version()),
        second.source().and_then(|source| source.version()),
    ) {
        let by_version = compare_versions(right, left);
        if by_version != Ordering::Equal {
            return by_version;
        }
    }
    compare_description(first, second)
}

fn same_term(first: &GraphRecord, second: &GraphRecord) -> bool {
    let source_rid = |record: &GraphRecord| record.source().and_then(|source| source.rid().map(str::to_owned));
    first.source_id() == second.source_id() && source_rid(first) == source_rid(second)
}

fn compare_description(first: &GraphRecord, second: &GraphRecord) -> Ordering {
    match (first.description(), second.description()) {
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Last tie-break across different sources: the source's own sort rank, the later
/// source version, then description.
fn compare_source_sort(first: &GraphRecord, second: &GraphRecord) -> Ordering {
    let (Some(left), Some(right)) = (first.source(), second.source()) else {
        return Ordering::Equal;
    };
    if left.rid() == right.rid() {
        return Ordering::Equal;
    }
    match (left.sort(), right.sort()) {
        (Some(a), Some(b)) if a != b => return a.cmp(&b),
        _ => {}
    }
    if let (Some(a), Some(b)) = (left.version(), right.version()) {
        let by_version = compare_versions(b, a);
        if by_version != Ordering::Equal {
            return by_version;
        }
    }
    compare_description(first, second)
}

/// Compares dotted version strings segment by segment, numerically where both
/// segments are numbers.
pub fn compare_versions(first: &str, second: &str) -> Ordering {
    let mut left = first.split(['.', '-', '_']);
    let mut right = second.split(['.', '-', '_']);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(a), Some(b)) => {
                let order = match (a.parse::<u64>(), b.parse::<u64>()) {
                    (Ok(a), Ok(b)) => a.cmp(&b),
                    _ => a.cmp(b),
                };
                if order != Ordering::Equal {
                    return order;
                }
            }
        }
    }
}

/// Picks the single preferred record. Fails when nothing matched, or when the best
/// candidate does not strictly outrank every other one.
pub fn select_preferred(
    mut candidates: Vec<GraphRecord>,
    precedence: &Precedence,
    target: Target,
    filters: &Value,
) -> Result<GraphRecord, LoaderError> {
    if candidates.is_empty() {
        return Err(LoaderError::MissingRecord {
            target: target.to_string(),
            filters: filters.to_string(),
        });
    }

    let best = (1..candidates.len()).fold(0, |best, index| {
        if precedence.compare(&candidates[index], &candidates[best]) == Ordering::Less {
            index
        } else {
            best
        }
    });

    let tied: Vec<String> = candidates
        .iter()
        .enumerate()
        .filter(|(index, candidate)| {
            *index != best && precedence.compare(&candidates[best], candidate) != Ordering::Less
        })
        .map(|(_, candidate)| candidate.display_name())
        .collect();
    if !tied.is_empty() {
        let mut names = vec![candidates[best].display_name()];
        names.extend(tied);
        names.sort();
        return Err(LoaderError::AmbiguousRecord {
            target: target.to_string(),
            filters: filters.to_string(),
            candidates: names.join(", "),
        });
    }

    Ok(candidates.swap_remove(best))
}
