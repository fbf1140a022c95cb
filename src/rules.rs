//! Classification rules — which layer pairs produce which relation.
//!
//! A `RuleSet` is a closed table supplied by the domain. The hierarchy
//! builder, the reparent engine and the validation checks all read it; none
//! of them hard-code layers or relation names.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::model::Layer;

pub const FORM_HIERARCHY: &str = "form_hierarchy";
pub const PERFORMS_FUNCTION: &str = "performs_function";
pub const HAS_FAILURE: &str = "has_failure";
pub const FUNCTION_FLOW: &str = "function_flow";
pub const FAILURE_PROPAGATION: &str = "failure_propagation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub source_layer: Layer,
    pub target_layer: Layer,
    pub relation: String,
}

impl ClassificationRule {
    pub fn new(source_layer: Layer, target_layer: Layer, relation: impl Into<String>) -> Self {
        Self {
            source_layer,
            target_layer,
            relation: relation.into(),
        }
    }

    /// True when the relation connects nodes of the same layer (a peer network).
    pub fn is_peer(&self) -> bool {
        self.source_layer == self.target_layer
    }
}

/// On-disk shape of a rule table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetDocument {
    pub rules: Vec<ClassificationRule>,
    pub root_relation: String,
}

/// Indexed rule table.
///
/// Lookups are keyed by `(source_layer, target_layer)`; each layer pair and
/// each relation name appears at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleSetDocument", into = "RuleSetDocument")]
pub struct RuleSet {
    rules: Vec<ClassificationRule>,
    root: usize,
    by_pair: HashMap<(Layer, Layer), usize>,
    by_relation: HashMap<String, usize>,
}

impl RuleSet {
    /// Build a rule set. `root_relation` names the rule whose source layer is
    /// the root layer of the hierarchy.
    pub fn new(
        rules: Vec<ClassificationRule>,
        root_relation: impl Into<String>,
    ) -> Result<Self, RuleError> {
        let root_relation = root_relation.into();
        let mut by_pair = HashMap::new();
        let mut by_relation = HashMap::new();
        for (i, rule) in rules.iter().enumerate() {
            let pair = (rule.source_layer.clone(), rule.target_layer.clone());
            if by_pair.insert(pair, i).is_some() {
                return Err(RuleError::DuplicatePair {
                    source_layer: rule.source_layer.clone(),
                    target_layer: rule.target_layer.clone(),
                });
            }
            if by_relation.insert(rule.relation.clone(), i).is_some() {
                return Err(RuleError::DuplicateRelation(rule.relation.clone()));
            }
        }
        let root = *by_relation
            .get(&root_relation)
            .ok_or(RuleError::UnknownRootRelation(root_relation))?;
        Ok(Self {
            rules,
            root,
            by_pair,
            by_relation,
        })
    }

    /// The Form/Function/Failure table.
    pub fn reference() -> Self {
        let rules = vec![
            ClassificationRule::new(Layer::Form, Layer::Form, FORM_HIERARCHY),
            ClassificationRule::new(Layer::Form, Layer::Function, PERFORMS_FUNCTION),
            ClassificationRule::new(Layer::Form, Layer::Failure, HAS_FAILURE),
            ClassificationRule::new(Layer::Function, Layer::Function, FUNCTION_FLOW),
            ClassificationRule::new(Layer::Failure, Layer::Failure, FAILURE_PROPAGATION),
        ];
        let by_pair = rules
            .iter()
            .enumerate()
            .map(|(i, r)| ((r.source_layer.clone(), r.target_layer.clone()), i))
            .collect();
        let by_relation = rules
            .iter()
            .enumerate()
            .map(|(i, r)| (r.relation.clone(), i))
            .collect();
        Self {
            rules,
            root: 0,
            by_pair,
            by_relation,
        }
    }

    /// Load a `{rules, root_relation}` JSON document.
    pub fn from_json(src: &str) -> Result<Self, RuleError> {
        let doc: RuleSetDocument = serde_json::from_str(src)?;
        Self::try_from(doc)
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn root_rule(&self) -> &ClassificationRule {
        &self.rules[self.root]
    }

    pub fn root_relation(&self) -> &str {
        &self.root_rule().relation
    }

    pub fn root_layer(&self) -> &Layer {
        &self.root_rule().source_layer
    }

    pub fn rule_for_pair(&self, source: &Layer, target: &Layer) -> Option<&ClassificationRule> {
        self.by_pair
            .get(&(source.clone(), target.clone()))
            .map(|&i| &self.rules[i])
    }

    pub fn rule_for_relation(&self, relation: &str) -> Option<&ClassificationRule> {
        self.by_relation.get(relation).map(|&i| &self.rules[i])
    }

    /// True when an edge `source -> target` tagged `relation` is classified.
    pub fn classifies(&self, source: &Layer, target: &Layer, relation: &str) -> bool {
        self.rule_for_pair(source, target)
            .is_some_and(|rule| rule.relation == relation)
    }

    /// Layers targeted by at least one rule, in rule order.
    pub fn targeted_layers(&self) -> Vec<&Layer> {
        let mut layers: Vec<&Layer> = Vec::new();
        for rule in &self.rules {
            if !layers.contains(&&rule.target_layer) {
                layers.push(&rule.target_layer);
            }
        }
        layers
    }

    /// Non-root layers that can have orphans.
    pub fn orphan_layers(&self) -> Vec<&Layer> {
        let root = self.root_layer();
        self.targeted_layers()
            .into_iter()
            .filter(|layer| *layer != root)
            .collect()
    }

    /// Rules whose source is `layer`, root relation first.
    pub fn rules_from(&self, layer: &Layer) -> Vec<&ClassificationRule> {
        let mut out: Vec<&ClassificationRule> = self
            .rules
            .iter()
            .filter(|r| &r.source_layer == layer)
            .collect();
        out.sort_by_key(|r| r.relation != self.root_relation());
        out
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::reference()
    }
}

impl TryFrom<RuleSetDocument> for RuleSet {
    type Error = RuleError;

    fn try_from(doc: RuleSetDocument) -> Result<Self, Self::Error> {
        RuleSet::new(doc.rules, doc.root_relation)
    }
}

impl From<RuleSet> for RuleSetDocument {
    fn from(rules: RuleSet) -> Self {
        let root_relation = rules.root_relation().to_string();
        RuleSetDocument {
            rules: rules.rules,
            root_relation,
        }
    }
}
