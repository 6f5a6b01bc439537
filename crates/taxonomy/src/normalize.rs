use crate::config::{ClassifierConfig, Substitution};
use serde_json::Value;

/// Upper bound on pipeline passes. A validated table settles after the first or second pass.
const MAX_PASSES: usize = 4;

/// Canonicalizes surface forms so that lookups are stable.
///
/// Steps, in order: literal substitutions (left to right, non-overlapping), whitespace
/// removal, case folding. Overlapping patterns are applied in table order, so results
/// for overlapping tables depend on that order.
#[derive(Debug, Clone)]
pub struct Normalizer {
    substitutions: Vec<Substitution>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(ClassifierConfig::default().substitutions)
    }
}

impl Normalizer {
    #[must_use]
    pub fn new(substitutions: Vec<Substitution>) -> Self {
        Self { substitutions }
    }

    #[must_use]
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(config.substitutions.clone())
    }

    /// Normalize a string. Idempotent: `normalize(normalize(x)) == normalize(x)`.
    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        let mut current = self.pass(text);
        for _ in 1..MAX_PASSES {
            let next = self.pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }
        current
    }

    /// Normalize any JSON value; non-strings are stringified first
    #[must_use]
    pub fn normalize_value(&self, value: &Value) -> String {
        match value {
            Value::String(s) => self.normalize(s),
            Value::Null => String::new(),
            other => self.normalize(&other.to_string()),
        }
    }

    fn pass(&self, text: &str) -> String {
        let mut out = text.to_string();
        for sub in &self.substitutions {
            if out.contains(sub.from.as_str()) {
                out = out.replace(sub.from.as_str(), &sub.to);
            }
        }
        out.chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn folds_variants_whitespace_and_case() {
        let n = Normalizer::default();
        assert_eq!(n.normalize("台北 市"), "臺北市");
        assert_eq!(n.normalize("  Heavy Rain\t"), "heavyrain");
        assert_eq!(n.normalize("台风"), "臺風");
    }

    #[test]
    fn stringifies_non_strings() {
        let n = Normalizer::default();
        assert_eq!(n.normalize_value(&serde_json::json!(42)), "42");
        assert_eq!(n.normalize_value(&serde_json::json!(true)), "true");
        assert_eq!(n.normalize_value(&Value::Null), "");
    }

    #[test]
    fn whitespace_joined_pattern_settles() {
        let n = Normalizer::new(vec![Substitution {
            from: "ab".to_string(),
            to: "X".to_string(),
        }]);
        let once = n.normalize("a b");
        assert_eq!(once, "x");
        assert_eq!(n.normalize(&once), once);
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(input in "\\PC{0,24}") {
            let n = Normalizer::default();
            let once = n.normalize(&input);
            prop_assert_eq!(n.normalize(&once), once);
        }

        #[test]
        fn normalize_is_idempotent_on_cjk(input in "[台气风云雾區市 aAbB\\s]{0,16}") {
            let n = Normalizer::default();
            let once = n.normalize(&input);
            prop_assert_eq!(n.normalize(&once), once);
        }
    }
}
