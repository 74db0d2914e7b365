use crate::rules::RuleSet;

use anyhow::Result;

/// Deny-list shipped with the crate.
pub const DENYLIST_JSON: &str = include_str!("denylist.json");

pub fn denylist() -> Result<RuleSet> {
    RuleSet::from_json(DENYLIST_JSON)
}
