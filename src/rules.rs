//! Deny-list data and its compiled, matchable form.
//!
//! Rules live outside the pipeline code as versioned JSON so they can be
//! replaced and tested on their own. Two matching disciplines exist and each
//! rule kind uses exactly one of them:
//!
//! - keywords match whole identifier tokens (`[A-Za-z0-9_]+`), case-insensitively;
//! - patterns are case-insensitive, multi-line regular expressions matched
//!   anywhere in the text.

use crate::submission::RejectReason;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub version: u32,
    #[serde(default)]
    pub keywords: Vec<KeywordGroup>,
    #[serde(default)]
    pub patterns: Vec<PatternRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub category: String,
    pub words: Vec<String>,
    #[serde(default = "restricted_keyword")]
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub name: String,
    pub regex: String,
    #[serde(default = "exploit_pattern")]
    pub reason: RejectReason,
}

fn restricted_keyword() -> RejectReason {
    RejectReason::RestrictedKeyword
}

fn exploit_pattern() -> RejectReason {
    RejectReason::ExploitPattern
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Identifier tokens of `text`, in order of appearance.
pub fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_ascii() && is_ident_byte(c as u8)))
        .filter(|t| !t.is_empty())
}

impl RuleSet {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse rule set")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read rule set: path = {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid rule set: path = {}", path.display()))
    }

    pub fn compile(&self) -> Result<CompiledRules> {
        let mut keywords = HashMap::new();
        for group in &self.keywords {
            for word in &group.words {
                if word.is_empty() || !word.bytes().all(is_ident_byte) {
                    anyhow::bail!(
                        "keyword must be a single identifier: category = {}, word = {:?}",
                        group.category,
                        word
                    );
                }
                keywords
                    .entry(word.to_ascii_lowercase())
                    .or_insert_with(|| KeywordRule {
                        category: group.category.clone(),
                        reason: group.reason,
                    });
            }
        }

        let mut patterns = Vec::with_capacity(self.patterns.len());
        for rule in &self.patterns {
            let regex = RegexBuilder::new(&rule.regex)
                .case_insensitive(true)
                .multi_line(true)
                .build()
                .with_context(|| {
                    format!("invalid pattern: name = {}, regex = {:?}", rule.name, rule.regex)
                })?;
            patterns.push(CompiledPattern {
                name: rule.name.clone(),
                regex,
                reason: rule.reason,
            });
        }

        Ok(CompiledRules {
            version: self.version,
            keywords,
            patterns,
        })
    }
}

#[derive(Debug, Clone)]
struct KeywordRule {
    category: String,
    reason: RejectReason,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    name: String,
    regex: Regex,
    reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub reason: RejectReason,
    /// Keyword category or pattern name.
    pub rule: String,
    /// The offending text as written in the submission.
    pub matched: String,
}

#[derive(Debug, Clone)]
pub struct CompiledRules {
    version: u32,
    keywords: HashMap<String, KeywordRule>,
    patterns: Vec<CompiledPattern>,
}

impl CompiledRules {
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// First deny-listed token in `text`.
    pub fn find_keyword(&self, text: &str) -> Option<Hit> {
        tokens(text).find_map(|token| {
            self.keywords
                .get(&token.to_ascii_lowercase())
                .map(|rule| Hit {
                    reason: rule.reason,
                    rule: rule.category.clone(),
                    matched: token.to_owned(),
                })
        })
    }

    /// First pattern, in rule order, that matches anywhere in `text`.
    pub fn find_pattern(&self, text: &str) -> Option<Hit> {
        self.patterns.iter().find_map(|p| {
            p.regex.find(text).map(|m| Hit {
                reason: p.reason,
                rule: p.name.clone(),
                matched: m.as_str().to_owned(),
            })
        })
    }
}
