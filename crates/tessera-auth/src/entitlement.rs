//! Entitlement rule matching.
//!
//! A rule `{prefix, values, suffix}` describes the anchored pattern
//! `^prefix(v1|v2|...)suffix$`. Every part is a regular-expression fragment,
//! so rules such as `prefix = "urn:geant:lifescience-ri\\.eu:"` with
//! `values = [".*:entitled:.*"]` are expressed directly.

use regex::Regex;
use tessera_types::{EntitlementRule, WorkflowDefinition};

use crate::error::{AuthError, Result};

/// A compiled entitlement rule.
#[derive(Debug, Clone)]
pub struct EntitlementPattern {
    source: String,
    // `None` when the rule has no values: the pattern matches nothing.
    regex: Option<Regex>,
}

impl EntitlementPattern {
    /// Rendered pattern text, e.g. `^urn:x:(a|b)$`.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `entitlement` fully matches this pattern.
    pub fn matches(&self, entitlement: &str) -> bool {
        self.regex
            .as_ref()
            .is_some_and(|regex| regex.is_match(entitlement))
    }
}

/// Render the anchored pattern for `rule`, preserving value order.
pub fn render_pattern(rule: &EntitlementRule) -> String {
    format!("^{}({}){}$", rule.prefix, rule.values.join("|"), rule.suffix)
}

/// Compile `rule` into a matcher.
///
/// A rule without values renders as `^prefix()suffix$` but never matches;
/// an empty alternation must not grant access to bare `prefix+suffix` strings.
pub fn build_entitlement_pattern(rule: &EntitlementRule) -> Result<EntitlementPattern> {
    let source = render_pattern(rule);
    if rule.values.is_empty() {
        return Ok(EntitlementPattern {
            source,
            regex: None,
        });
    }

    let regex = Regex::new(&source).map_err(|e| AuthError::InvalidEntitlementRule {
        pattern: source.clone(),
        reason: e.to_string(),
    })?;
    Ok(EntitlementPattern {
        source,
        regex: Some(regex),
    })
}

/// True iff some entitlement fully matches some rule of `definition`.
///
/// Rules that fail to compile are skipped with a warning so a single bad rule
/// does not lock everyone out of the definition.
pub fn is_entitlement_satisfied(definition: &WorkflowDefinition, entitlements: &[String]) -> bool {
    definition
        .allowed_entitlements
        .iter()
        .filter_map(|rule| match build_entitlement_pattern(rule) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!(definition_id = %definition.id, error = %e, "Skipping entitlement rule");
                None
            }
        })
        .any(|pattern| entitlements.iter().any(|e| pattern.matches(e)))
}
