//! Market groups: the mutually-exclusive outcomes of one event.

use serde::{Deserialize, Serialize};

use super::id::{MarketId, TokenId};

/// The outcome tokens belonging to one mutually-exclusive event.
///
/// For a binary market the group holds both tokens; for a negative-risk
/// multi-outcome event it holds the "yes" token of each sub-market. A valid
/// group always has at least two tokens, and their prices should sum to
/// approximately one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketGroup {
    pub condition_id: MarketId,
    pub token_ids: Vec<TokenId>,
}

impl MarketGroup {
    /// Create a group. Callers are responsible for the `len >= 2` invariant;
    /// the discovery service never emits smaller groups.
    #[must_use]
    pub fn new(condition_id: MarketId, token_ids: Vec<TokenId>) -> Self {
        Self {
            condition_id,
            token_ids,
        }
    }

    /// Number of outcomes in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    /// Canonical `condition_id:token0,token1,...` form used for change
    /// detection across discovery refreshes.
    #[must_use]
    pub fn canonical(&self) -> String {
        let tokens: Vec<&str> = self.token_ids.iter().map(TokenId::as_str).collect();
        format!("{}:{}", self.condition_id, tokens.join(","))
    }
}

/// Canonical serialization of a whole group list: sorted canonical forms
/// joined with `;`. Two lists serialize equally iff they describe the same
/// groups.
#[must_use]
pub fn canonical_group_list(groups: &[MarketGroup]) -> String {
    let mut keys: Vec<String> = groups.iter().map(MarketGroup::canonical).collect();
    keys.sort();
    keys.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, tokens: &[&str]) -> MarketGroup {
        MarketGroup::new(
            MarketId::from(id),
            tokens.iter().map(|t| TokenId::from(*t)).collect(),
        )
    }

    #[test]
    fn canonical_form() {
        let g = group("cond-1", &["a", "b"]);
        assert_eq!(g.canonical(), "cond-1:a,b");
    }

    #[test]
    fn list_serialization_is_order_independent() {
        let a = vec![group("c1", &["a", "b"]), group("c2", &["x", "y", "z"])];
        let b = vec![group("c2", &["x", "y", "z"]), group("c1", &["a", "b"])];
        assert_eq!(canonical_group_list(&a), canonical_group_list(&b));
    }

    #[test]
    fn token_order_within_group_matters() {
        let a = vec![group("c1", &["a", "b"])];
        let b = vec![group("c1", &["b", "a"])];
        assert_ne!(canonical_group_list(&a), canonical_group_list(&b));
    }
}
