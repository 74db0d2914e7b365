use crate::built_in;
use crate::rules::{tokens, CompiledRules, RuleSet};
use crate::submission::{RejectReason, Rejection, Submission, Verdict};
use crate::Limits;

use anyhow::Result;
use memchr::memchr_iter;
use once_cell::sync::OnceCell;
use tracing::debug;

const BLOCK_OPENER: &str = "begin";

static BUILT_IN_RULES: OnceCell<CompiledRules> = OnceCell::new();

/// Static screen run before any process is spawned.
///
/// Stages run in a fixed order and the first failure wins:
/// sizes, charset, structure, keywords, patterns.
#[derive(Debug, Clone)]
pub struct Validator {
    limits: Limits,
    rules: CompiledRules,
}

impl Validator {
    pub fn new(limits: &Limits, rules: &RuleSet) -> Result<Self> {
        Ok(Self {
            limits: limits.clone(),
            rules: rules.compile()?,
        })
    }

    pub fn with_built_in_rules(limits: &Limits) -> Result<Self> {
        let rules = BUILT_IN_RULES.get_or_try_init(|| built_in::denylist()?.compile())?;
        Ok(Self {
            limits: limits.clone(),
            rules: rules.clone(),
        })
    }

    pub fn rules(&self) -> &CompiledRules {
        &self.rules
    }

    pub fn validate(&self, submission: &Submission) -> Verdict {
        let result = self
            .check_sizes(submission)
            .and_then(|()| self.check_charset(submission))
            .and_then(|()| self.check_structure(submission.source()))
            .and_then(|()| self.check_keywords(submission.source()))
            .and_then(|()| self.check_patterns(submission.source()));

        match result {
            Ok(()) => Verdict::Accepted,
            Err(rejection) => {
                debug!(reason = %rejection.reason, detail = %rejection.detail, "submission rejected");
                Verdict::Rejected(rejection)
            }
        }
    }

    fn check_sizes(&self, submission: &Submission) -> Result<(), Rejection> {
        let fields = [
            ("source", submission.source(), self.limits.max_source_bytes),
            ("program arguments", submission.args(), self.limits.max_args_bytes),
            ("input", submission.stdin(), self.limits.max_stdin_bytes),
        ];
        for (name, text, max) in fields {
            if text.len() > max {
                return Err(Rejection::new(
                    RejectReason::SizeExceeded,
                    format!("{} size exceeds limit of {} bytes", name, max),
                ));
            }
        }
        Ok(())
    }

    fn check_charset(&self, submission: &Submission) -> Result<(), Rejection> {
        fn allowed(c: char) -> bool {
            matches!(c, ' '..='~' | '\n' | '\r' | '\t')
        }

        let fields = [
            ("source", submission.source()),
            ("program arguments", submission.args()),
            ("input", submission.stdin()),
        ];
        for (name, text) in fields {
            if let Some((offset, c)) = text.char_indices().find(|&(_, c)| !allowed(c)) {
                return Err(Rejection::new(
                    RejectReason::InvalidCharset,
                    format!(
                        "{} contains invalid character U+{:04X} at byte {}",
                        name, c as u32, offset
                    ),
                ));
            }
        }
        Ok(())
    }

    fn check_structure(&self, source: &str) -> Result<(), Rejection> {
        let openers = tokens(source)
            .filter(|t| t.eq_ignore_ascii_case(BLOCK_OPENER))
            .count();
        let counts = [
            ("'begin' blocks", openers, self.limits.max_block_openers),
            (
                "parentheses",
                memchr_iter(b'(', source.as_bytes()).count(),
                self.limits.max_parentheses,
            ),
            (
                "brackets",
                memchr_iter(b'[', source.as_bytes()).count(),
                self.limits.max_brackets,
            ),
        ];
        for (name, count, max) in counts {
            if count > max {
                return Err(Rejection::new(
                    RejectReason::StructuralComplexity,
                    format!("code structure too complex: {} {} > {}", count, name, max),
                ));
            }
        }
        Ok(())
    }

    fn check_keywords(&self, source: &str) -> Result<(), Rejection> {
        match self.rules.find_keyword(source) {
            Some(hit) => Err(Rejection::new(
                hit.reason,
                format!("restricted keyword ({}): {}", hit.rule, hit.matched),
            )),
            None => Ok(()),
        }
    }

    fn check_patterns(&self, source: &str) -> Result<(), Rejection> {
        match self.rules.find_pattern(source) {
            Some(hit) => Err(Rejection::new(
                hit.reason,
                format!("exploit pattern ({}): {:?}", hit.rule, hit.matched),
            )),
            None => Ok(()),
        }
    }
}
