// codeatlas-core/src/infrastructure/config/patterns.rs
//
// Compiles the `specialFilePatterns` list from `RunOptions` into matchable
// regexes once at startup rather than per file (spec.md §4.5 step 2:
// first-match-wins classification against a path).

use regex::Regex;

use crate::domain::file::{SpecialFilePatternSpec, SpecialType};
use crate::infrastructure::error::InfrastructureError;

pub struct CompiledPattern {
    regex: Regex,
    pub special_type: SpecialType,
}

pub struct PatternSet {
    patterns: Vec<CompiledPattern>,
}

impl PatternSet {
    pub fn compile(specs: &[SpecialFilePatternSpec]) -> Result<Self, InfrastructureError> {
        let mut patterns = Vec::with_capacity(specs.len());
        for spec in specs {
            let regex = Regex::new(&spec.regex)
                .map_err(|e| InfrastructureError::Config(format!(
                    "invalid specialFilePatterns regex '{}': {e}",
                    spec.regex
                )))?;
            patterns.push(CompiledPattern {
                regex,
                special_type: spec.special_type.clone(),
            });
        }
        Ok(Self { patterns })
    }

    /// Returns the type of the first pattern whose regex matches `path`,
    /// or `None` if the file is ordinary.
    pub fn classify(&self, path: &str) -> Option<SpecialType> {
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(path))
            .map(|p| p.special_type.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn spec(regex: &str, special_type: SpecialType) -> SpecialFilePatternSpec {
        SpecialFilePatternSpec {
            regex: regex.to_string(),
            special_type,
        }
    }

    #[test]
    fn test_first_match_wins() {
        let specs = vec![
            spec(r"package\.json$", SpecialType::Manifest),
            spec(r"\.json$", SpecialType::Config),
        ];
        let set = PatternSet::compile(&specs).unwrap();
        assert_eq!(set.classify("src/package.json"), Some(SpecialType::Manifest));
        assert_eq!(set.classify("src/tsconfig.json"), Some(SpecialType::Config));
    }

    #[test]
    fn test_no_match_returns_none() {
        let set = PatternSet::compile(&[spec(r"\.proto$", SpecialType::Schema)]).unwrap();
        assert_eq!(set.classify("src/main.rs"), None);
    }

    #[test]
    fn test_rejects_invalid_regex() {
        let result = PatternSet::compile(&[spec("(unclosed", SpecialType::Config)]);
        assert!(result.is_err());
    }
}
