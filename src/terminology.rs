use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One source → target entry, in the provider's wire shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermPair {
    pub source: String,
    pub target: String,
}

impl TermPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// A source term was given a second, different target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TermConflict {
    pub source: String,
    pub previous: String,
    pub replacement: String,
}

/// Fixed terminology sent with every request, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct Glossary {
    terms: Vec<TermPair>,
    index: HashMap<String, usize>,
}

impl Glossary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a glossary, logging every conflicting redefinition.
    pub fn from_pairs(pairs: impl IntoIterator<Item = TermPair>) -> Self {
        let mut glossary = Self::new();
        for conflict in glossary.extend(pairs) {
            tracing::warn!(
                source = %conflict.source,
                previous = %conflict.previous,
                replacement = %conflict.replacement,
                "glossary term redefined, keeping the later target"
            );
        }
        glossary
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    #[must_use]
    pub fn pairs(&self) -> &[TermPair] {
        &self.terms
    }

    #[cfg(test)]
    fn get(&self, source: &str) -> Option<&str> {
        self.index
            .get(source.trim())
            .map(|&i| self.terms[i].target.as_str())
    }

    /// Adds or replaces one term. Blank sources or targets are ignored.
    ///
    /// A repeated source keeps its original position and takes the new target.
    pub fn insert(&mut self, source: &str, target: &str) -> Option<TermConflict> {
        let source = source.trim();
        let target = target.trim();
        if source.is_empty() || target.is_empty() {
            return None;
        }

        match self.index.get(source) {
            None => {
                self.index.insert(source.to_string(), self.terms.len());
                self.terms.push(TermPair::new(source, target));
                None
            }
            Some(&i) => {
                let existing = &mut self.terms[i];
                if existing.target == target {
                    return None;
                }
                let previous = std::mem::replace(&mut existing.target, target.to_string());
                Some(TermConflict {
                    source: source.to_string(),
                    previous,
                    replacement: target.to_string(),
                })
            }
        }
    }

    pub fn extend(&mut self, pairs: impl IntoIterator<Item = TermPair>) -> Vec<TermConflict> {
        pairs
            .into_iter()
            .filter_map(|p| self.insert(&p.source, &p.target))
            .collect()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<TermPair> {
        self.terms.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let g = Glossary::from_pairs([
            TermPair::new("模型", "model"),
            TermPair::new("数据", "data"),
            TermPair::new("训练", "training"),
        ]);
        let sources: Vec<&str> = g.pairs().iter().map(|p| p.source.as_str()).collect();
        assert_eq!(sources, vec!["模型", "数据", "训练"]);
    }

    #[test]
    fn ignores_blank_entries_and_trims() {
        let mut g = Glossary::new();
        assert!(g.insert("  ", "x").is_none());
        assert!(g.insert("a", "").is_none());
        assert!(g.insert(" 模型 ", " model ").is_none());
        assert_eq!(g.len(), 1);
        assert_eq!(g.get("模型"), Some("model"));
    }

    #[test]
    fn later_target_wins_and_is_reported() {
        let mut g = Glossary::new();
        let conflicts = g.extend([
            TermPair::new("AI", "人工智能"),
            TermPair::new("GPU", "显卡"),
            TermPair::new("AI", "AI"),
            TermPair::new("GPU", "显卡"),
        ]);
        assert_eq!(
            conflicts,
            vec![TermConflict {
                source: "AI".into(),
                previous: "人工智能".into(),
                replacement: "AI".into(),
            }]
        );
        assert_eq!(g.len(), 2);
        assert_eq!(g.pairs()[0], TermPair::new("AI", "AI"));
    }

    #[test]
    fn pairs_serialize_in_wire_shape() {
        let v = serde_json::to_value(TermPair::new("a", "b")).expect("json");
        assert_eq!(v, serde_json::json!({"source": "a", "target": "b"}));
    }
}
