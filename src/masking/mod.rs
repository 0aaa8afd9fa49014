//! Sensitive-data masking engine.
//!
//! A [`PatternRegistry`] holds an ordered list of [`SensitivePattern`]s and
//! rewrites a message in a single left-to-right pass:
//!
//! - A [`RegexSet`] first decides which patterns can match at all. Clean input
//!   is returned borrowed without allocating.
//! - The scanner keeps one pending match per candidate pattern. At each step
//!   the leftmost match wins; matches starting at the same offset go to the
//!   pattern registered first.
//! - The cursor jumps past each replaced span, so replacement text is never
//!   scanned again.
//! - Zero-length matches emit their replacement and then advance by one
//!   character.
//!
//! A settling registry (see [`PatternRegistryBuilder::settle`]) repeats the
//! pass on its own output until nothing changes. Rules whose matches overlap,
//! such as an e-mail domain holding a card number, are then all applied and
//! masking an already masked string returns it unchanged.
//!
//! The registry is immutable once built and cheap to clone.
//!
//! ```rust,ignore
//! let registry = PatternRegistry::builder()
//!     .pattern("ticket", r"TCK-[0-9]+", Replacement::redact("TCK-****"))?
//!     .build()?;
//!
//! assert_eq!(registry.mask("see TCK-1234"), "see TCK-****");
//! ```

use std::borrow::Cow;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use regex::{Captures, Regex, RegexSet};
use serde::Deserialize;
use thiserror::Error;

use crate::error::{LogError, LogResult};
use crate::format::StringFormat;

pub mod rules;

/// Message emitted in place of the original when masking fails closed.
pub const WITHHELD_MESSAGE: &str = "[message withheld: masking failed]";

/// Upper bound on passes for a settling registry.
pub const MAX_SETTLE_PASSES: usize = 16;

type CustomReplacement = dyn Fn(&Captures<'_>) -> anyhow::Result<String> + Send + Sync;

/// How a matched span is rewritten.
#[derive(Clone)]
pub enum Replacement {
    /// Replace the whole match with a fixed token.
    Redact(String),
    /// Expand a template using capture groups (`${name}` / `$1`), see
    /// [`Captures::expand`].
    Template(String),
    /// Compute the replacement from the captures. May fail.
    Custom(Arc<CustomReplacement>),
}

impl Replacement {
    pub fn redact(token: impl Into<String>) -> Self {
        Replacement::Redact(token.into())
    }

    pub fn template(template: impl Into<String>) -> Self {
        Replacement::Template(template.into())
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Captures<'_>) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Replacement::Custom(Arc::new(f))
    }

    fn apply(&self, caps: &Captures<'_>, out: &mut String) -> anyhow::Result<()> {
        match self {
            Replacement::Redact(token) => out.push_str(token),
            Replacement::Template(template) => caps.expand(template, out),
            Replacement::Custom(f) => out.push_str(&f(caps)?),
        }

        Ok(())
    }
}

impl Debug for Replacement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Replacement::Redact(token) => f.debug_tuple("Redact").field(token).finish(),
            Replacement::Template(template) => f.debug_tuple("Template").field(template).finish(),
            Replacement::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A named detector plus its replacement rule.
#[derive(Debug, Clone)]
pub struct SensitivePattern {
    name: String,
    matcher: Regex,
    replacement: Replacement,
}

impl SensitivePattern {
    /// Compiles `pattern`. Fails fast on malformed expressions.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        replacement: Replacement,
    ) -> LogResult<Self> {
        let name = name.into();
        let matcher = Regex::new(pattern).map_err(|source| LogError::InvalidPattern {
            name: name.clone(),
            source,
        })?;

        Ok(Self {
            name,
            matcher,
            replacement,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &Regex {
        &self.matcher
    }
}

/// What to emit when a replacement fails at log time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskFailurePolicy {
    /// Withhold the whole message.
    #[default]
    Closed,
    /// Emit the unmasked message.
    Open,
}

/// A replacement rule failed while masking.
#[derive(Debug, Error)]
#[error("Masking with pattern '{pattern}' failed: {reason}")]
pub struct MaskError {
    pub pattern: String,
    pub reason: String,
}

/// Ordered, read-only set of sensitive patterns.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    patterns: Arc<[SensitivePattern]>,
    set: RegexSet,
    on_failure: MaskFailurePolicy,
    max_passes: usize,
}

/// Collects patterns for a [`PatternRegistry`].
#[derive(Debug)]
pub struct PatternRegistryBuilder {
    patterns: Vec<SensitivePattern>,
    on_failure: MaskFailurePolicy,
    max_passes: usize,
}

impl Default for PatternRegistryBuilder {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            on_failure: MaskFailurePolicy::default(),
            max_passes: 1,
        }
    }
}

impl PatternRegistryBuilder {
    /// Compiles and appends a pattern.
    pub fn pattern(
        mut self,
        name: impl Into<String>,
        pattern: &str,
        replacement: Replacement,
    ) -> LogResult<Self> {
        self.patterns
            .push(SensitivePattern::new(name, pattern, replacement)?);
        Ok(self)
    }

    /// Appends an already compiled pattern.
    pub fn push(mut self, pattern: SensitivePattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn on_failure(mut self, policy: MaskFailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Repeats the scan on its own output until it stops changing.
    ///
    /// Output still changing after [`MAX_SETTLE_PASSES`] passes is a masking
    /// failure and follows the failure policy.
    pub fn settle(mut self) -> Self {
        self.max_passes = MAX_SETTLE_PASSES;
        self
    }

    pub fn build(self) -> LogResult<PatternRegistry> {
        let set = RegexSet::new(self.patterns.iter().map(|p| p.matcher.as_str())).map_err(
            |source| LogError::InvalidPattern {
                name: "<set>".to_owned(),
                source,
            },
        )?;

        Ok(PatternRegistry {
            patterns: self.patterns.into(),
            set,
            on_failure: self.on_failure,
            max_passes: self.max_passes,
        })
    }
}

/// A pending match of one pattern.
struct Hit<'h> {
    pattern: usize,
    start: usize,
    end: usize,
    caps: Captures<'h>,
}

impl PatternRegistry {
    pub fn builder() -> PatternRegistryBuilder {
        PatternRegistryBuilder::default()
    }

    /// A registry without patterns. Masking is the identity.
    pub fn empty() -> Self {
        Self {
            patterns: Arc::from(Vec::new()),
            set: RegexSet::empty(),
            on_failure: MaskFailurePolicy::default(),
            max_passes: 1,
        }
    }

    /// Returns a copy using the given failure policy.
    pub fn with_failure_policy(mut self, policy: MaskFailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn failure_policy(&self) -> MaskFailurePolicy {
        self.on_failure
    }

    pub fn patterns(&self) -> &[SensitivePattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Masks `input`, applying the failure policy if a replacement fails.
    pub fn mask<'a>(&self, input: &'a str) -> Cow<'a, str> {
        match self.try_mask(input) {
            Ok(masked) => masked,
            Err(err) => match self.on_failure {
                MaskFailurePolicy::Closed => {
                    tracing::warn!(pattern = %err.pattern, reason = %err.reason, "Masking failed, message withheld");
                    Cow::Borrowed(WITHHELD_MESSAGE)
                }
                MaskFailurePolicy::Open => {
                    tracing::warn!(pattern = %err.pattern, reason = %err.reason, "Masking failed, message emitted unmasked");
                    Cow::Borrowed(input)
                }
            },
        }
    }

    /// Returns `true` if the registry repeats its scan until the output settles.
    pub fn settles(&self) -> bool {
        self.max_passes > 1
    }

    /// Masks `input`, reporting replacement failures.
    pub fn try_mask<'a>(&self, input: &'a str) -> Result<Cow<'a, str>, MaskError> {
        let mut masked = match self.scan(input)? {
            Cow::Borrowed(_) => return Ok(Cow::Borrowed(input)),
            Cow::Owned(masked) => masked,
        };

        for _ in 1..self.max_passes {
            let next = match self.scan(&masked)? {
                Cow::Borrowed(_) => None,
                Cow::Owned(next) => Some(next),
            };

            match next {
                Some(next) if next != masked => masked = next,
                _ => return Ok(Cow::Owned(masked)),
            }
        }

        if self.settles() {
            let unsettled: Vec<&str> = self
                .set
                .matches(&masked)
                .into_iter()
                .map(|index| self.patterns[index].name())
                .collect();

            return Err(MaskError {
                pattern: unsettled.join(","),
                reason: format!("output still changing after {} passes", self.max_passes),
            });
        }

        Ok(Cow::Owned(masked))
    }

    /// One left-to-right pass. Replacement text is never scanned again.
    fn scan<'a>(&self, input: &'a str) -> Result<Cow<'a, str>, MaskError> {
        if input.is_empty() || self.patterns.is_empty() {
            return Ok(Cow::Borrowed(input));
        }

        let candidates = self.set.matches(input);
        if !candidates.matched_any() {
            return Ok(Cow::Borrowed(input));
        }

        let mut pending: Vec<Option<Hit<'a>>> = candidates
            .into_iter()
            .map(|index| self.find_at(index, input, 0))
            .collect();

        let mut out = String::with_capacity(input.len());
        let mut cursor = 0;

        loop {
            // Matches overlapped by the previous replacement are recomputed
            for slot in pending.iter_mut() {
                let stale = slot
                    .as_ref()
                    .filter(|hit| hit.start < cursor)
                    .map(|hit| hit.pattern);

                if let Some(pattern) = stale {
                    *slot = self.find_at(pattern, input, cursor);
                }
            }

            // Leftmost start wins, ties go to the lowest pattern index
            let next = pending
                .iter()
                .enumerate()
                .filter_map(|(slot, hit)| hit.as_ref().map(|hit| (hit.start, hit.pattern, slot)))
                .min();

            let Some((_, _, slot)) = next else {
                break;
            };
            let Some(hit) = pending[slot].take() else {
                break;
            };

            let pattern = &self.patterns[hit.pattern];
            out.push_str(&input[cursor..hit.start]);
            pattern
                .replacement
                .apply(&hit.caps, &mut out)
                .map_err(|err| MaskError {
                    pattern: pattern.name.clone(),
                    reason: format!("{err:#}"),
                })?;
            cursor = hit.end;

            if hit.start == hit.end {
                match input[cursor..].chars().next() {
                    Some(ch) => {
                        out.push(ch);
                        cursor += ch.len_utf8();
                    }
                    None => break,
                }
            }

            pending[slot] = self.find_at(hit.pattern, input, cursor);
        }

        out.push_str(&input[cursor..]);

        Ok(Cow::Owned(out))
    }

    fn find_at<'h>(&self, pattern: usize, input: &'h str, at: usize) -> Option<Hit<'h>> {
        if at > input.len() {
            return None;
        }

        let caps = self.patterns[pattern].matcher.captures_at(input, at)?;
        let whole = caps.get(0)?;

        Some(Hit {
            pattern,
            start: whole.start(),
            end: whole.end(),
            caps,
        })
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl StringFormat for PatternRegistry {
    fn format<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        self.mask(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(patterns: &[(&str, &str, Replacement)]) -> PatternRegistry {
        patterns
            .iter()
            .fold(PatternRegistry::builder(), |builder, (name, pattern, replacement)| {
                builder.pattern(*name, pattern, replacement.clone()).unwrap()
            })
            .build()
            .unwrap()
    }

    #[test]
    fn empty_registry_is_identity() {
        let registry = PatternRegistry::empty();
        assert!(matches!(registry.mask("+84225898023"), Cow::Borrowed("+84225898023")));
    }

    #[test]
    fn empty_input_is_unchanged() {
        let registry = registry(&[("digits", "[0-9]+", Replacement::redact("#"))]);
        assert_eq!(registry.mask(""), "");
    }

    #[test]
    fn clean_input_is_borrowed() {
        let registry = registry(&[("digits", "[0-9]+", Replacement::redact("#"))]);
        assert!(matches!(registry.mask("no numbers here"), Cow::Borrowed(_)));
    }

    #[test]
    fn replaces_every_match() {
        let registry = registry(&[("digits", "[0-9]+", Replacement::redact("#"))]);
        assert_eq!(registry.mask("a1b22c333"), "a#b#c#");
    }

    #[test]
    fn expands_templates() {
        let registry = registry(&[(
            "pair",
            r"(?P<key>[a-z]+)=(?P<value>[0-9]+)",
            Replacement::template("${key}=<${value}>"),
        )]);
        assert_eq!(registry.mask("x=1, y=22"), "x=<1>, y=<22>");
    }

    #[test]
    fn replacement_text_is_not_rescanned() {
        let registry = registry(&[
            ("first", "secret", Replacement::redact("token")),
            ("second", "token", Replacement::redact("XXX")),
        ]);
        assert_eq!(registry.mask("secret token"), "token XXX");
    }

    #[test]
    fn leftmost_match_wins_over_registration_order() {
        let registry = registry(&[
            ("late", "bcd", Replacement::redact("[late]")),
            ("early", "abc", Replacement::redact("[early]")),
        ]);
        assert_eq!(registry.mask("abcd"), "[early]d");
    }

    #[test]
    fn first_registered_wins_at_same_offset() {
        let registry = registry(&[
            ("short", "ab", Replacement::redact("[short]")),
            ("long", "abcd", Replacement::redact("[long]")),
        ]);
        assert_eq!(registry.mask("abcd"), "[short]cd");
    }

    #[test]
    fn zero_length_matches_terminate() {
        let registry = registry(&[("empty", "x*", Replacement::redact("-"))]);
        assert_eq!(registry.mask("abc"), "-a-b-c-");
        assert_eq!(registry.mask("xxa"), "--a-");
    }

    #[test]
    fn handles_multibyte_text() {
        let registry = registry(&[("digits", "[0-9]+", Replacement::redact("#"))]);
        assert_eq!(registry.mask("Gọi số 0912 đã"), "Gọi số # đã");
    }

    #[test]
    fn malformed_pattern_fails_at_registration() {
        let err = PatternRegistry::builder()
            .pattern("broken", "(unclosed", Replacement::redact("x"))
            .unwrap_err();
        assert!(matches!(err, LogError::InvalidPattern { name, .. } if name == "broken"));
    }

    fn failing() -> PatternRegistry {
        registry(&[(
            "failing",
            "[0-9]+",
            Replacement::custom(|_| anyhow::bail!("lookup unavailable")),
        )])
    }

    #[test]
    fn try_mask_reports_failures() {
        let err = failing().try_mask("card 1234").unwrap_err();
        assert_eq!(err.pattern, "failing");
        assert!(err.reason.contains("lookup unavailable"));
    }

    #[test]
    fn fails_closed_by_default() {
        assert_eq!(failing().mask("card 1234"), WITHHELD_MESSAGE);
    }

    #[test]
    fn fails_open_when_configured() {
        let registry = failing().with_failure_policy(MaskFailurePolicy::Open);
        assert_eq!(registry.mask("card 1234"), "card 1234");
    }

    fn overlapping(builder: PatternRegistryBuilder) -> PatternRegistry {
        builder
            .pattern(
                "user",
                r"[a-z]+@(?P<host>[a-z0-9-]+)",
                Replacement::template("***@${host}"),
            )
            .unwrap()
            .pattern("digits", r"\b[0-9]{4}\b", Replacement::redact("####"))
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn single_pass_leaves_overlapped_matches() {
        let registry = overlapping(PatternRegistry::builder());

        assert!(!registry.settles());
        assert_eq!(registry.mask("bob@1234"), "***@1234");
        assert_eq!(registry.mask("***@1234"), "***@####");
    }

    #[test]
    fn settling_applies_overlapped_matches() {
        let registry = overlapping(PatternRegistry::builder().settle());

        assert!(registry.settles());
        assert_eq!(registry.mask("bob@1234"), "***@####");
        assert_eq!(registry.mask("***@####"), "***@####");
    }

    #[test]
    fn settling_keeps_clean_input_borrowed() {
        let registry = PatternRegistry::builder()
            .pattern("digits", "[0-9]+", Replacement::redact("#"))
            .unwrap()
            .settle()
            .build()
            .unwrap();

        assert!(matches!(registry.mask("no numbers"), Cow::Borrowed(_)));
        assert_eq!(registry.mask("a1b22"), "a#b#");
    }

    #[test]
    fn output_that_never_settles_is_a_failure() {
        let registry = PatternRegistry::builder()
            .pattern("grow", "a", Replacement::redact("aa"))
            .unwrap()
            .settle()
            .build()
            .unwrap();

        let err = registry.try_mask("a").unwrap_err();
        assert_eq!(err.pattern, "grow");
        assert_eq!(registry.mask("a"), WITHHELD_MESSAGE);
    }

    #[test]
    fn custom_replacements_see_captures() {
        let registry = registry(&[(
            "len",
            "[0-9]+",
            Replacement::custom(|caps| Ok("*".repeat(caps[0].len()))),
        )]);
        assert_eq!(registry.mask("pin 1234"), "pin ****");
    }
}
