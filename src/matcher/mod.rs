//! Matches a namespace against the configured list of namespace policies.
//!
//! A policy may combine three independent criteria: `names` (an explicit
//! name list, entries may be literal or regex), `any` (at least one of a
//! list of label/annotation conditions holds) and `all` (every listed
//! condition holds). The criteria are independent additive contributions
//! to a specificity score, not a conjunction — a policy whose `names`
//! criterion fails to match still scores whatever its `any`/`all`
//! criteria contribute, and vice versa. `names` contributes 1, `any`
//! contributes 2, `all` contributes 4; the policy with the highest total
//! wins, and a policy whose total is 0 never matches at all. Ties go to
//! whichever policy was declared first.

use crate::adapter::NamespaceDto;
use crate::config::{MatchCondition, NamespacePolicy};
use regex::Regex;

const NAMES_WEIGHT: u32 = 1;
const ANY_WEIGHT: u32 = 2;
const ALL_WEIGHT: u32 = 4;

/// `names` entries may be literal or regex (§4.4).
fn name_matches(pattern: &str, value: &str) -> bool {
    match Regex::new(pattern) {
        Ok(re) => re.is_match(value),
        Err(_) => pattern == value,
    }
}

/// A label/annotation condition matches iff every listed key's value
/// **equals** the namespace's value for that key (§4.4) — exact
/// equality, not a pattern.
fn condition_matches(condition: &MatchCondition, ns: &NamespaceDto) -> bool {
    condition
        .labels
        .iter()
        .all(|(key, value)| ns.labels.get(key).map(|v| v == value).unwrap_or(false))
        && condition
            .annotations
            .iter()
            .all(|(key, value)| ns.annotations.get(key).map(|v| v == value).unwrap_or(false))
}

/// Computes the specificity score of `policy` against `ns`: each of
/// `names`/`any`/`all` that the policy specifies contributes its weight
/// independently when it matches, and contributes nothing when it
/// doesn't — a failing criterion never disqualifies the others.
fn score(policy: &NamespacePolicy, ns: &NamespaceDto) -> u32 {
    let mut total = 0u32;

    if let Some(names) = &policy.names {
        if names.iter().any(|pattern| name_matches(pattern, &ns.name)) {
            total += NAMES_WEIGHT;
        }
    }

    if let Some(conditions) = &policy.any {
        if conditions.iter().any(|c| condition_matches(c, ns)) {
            total += ANY_WEIGHT;
        }
    }

    if let Some(conditions) = &policy.all {
        if conditions.iter().all(|c| condition_matches(c, ns)) {
            total += ALL_WEIGHT;
        }
    }

    total
}

/// Finds the best-matching policy for `ns`, if any policy scores above 0.
/// A policy with no criteria at all (no `names`/`any`/`all`) always
/// scores 0 and therefore never matches anything.
pub fn match_namespace<'a>(
    policies: &'a [NamespacePolicy],
    ns: &NamespaceDto,
) -> Option<&'a NamespacePolicy> {
    let mut best: Option<(u32, &NamespacePolicy)> = None;

    for policy in policies {
        let policy_score = score(policy, ns);
        if policy_score == 0 {
            continue;
        }

        match best {
            Some((best_score, _)) if policy_score <= best_score => {}
            _ => best = Some((policy_score, policy)),
        }
    }

    best.map(|(_, policy)| policy)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
