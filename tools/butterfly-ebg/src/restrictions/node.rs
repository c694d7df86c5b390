use butterfly_common::NodeId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::{blocking_rule, TargetRule};

/// `from -> via -> to` over a single intersection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRestriction {
    pub from: NodeId,
    pub via: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub is_only: bool,
    /// Opening-hours style time window, e.g. `Mo-Fr 07:00-09:00`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl TargetRule for NodeRestriction {
    fn to(&self) -> NodeId {
        self.to
    }

    fn is_only(&self) -> bool {
        self.is_only
    }
}

/// Node restrictions indexed by `(from, via)`
#[derive(Debug, Clone, Default)]
pub struct RestrictionMap {
    restrictions: Vec<NodeRestriction>,
    index: FxHashMap<(NodeId, NodeId), Vec<usize>>,
}

impl RestrictionMap {
    pub fn new<I: IntoIterator<Item = NodeRestriction>>(restrictions: I) -> Self {
        let restrictions: Vec<NodeRestriction> = restrictions.into_iter().collect();
        let mut index: FxHashMap<(NodeId, NodeId), Vec<usize>> = FxHashMap::default();
        for (i, r) in restrictions.iter().enumerate() {
            index.entry((r.from, r.via)).or_default().push(i);
        }
        Self {
            restrictions,
            index,
        }
    }

    /// Restrictions that always apply.
    pub fn unconditional(all: &[NodeRestriction]) -> Self {
        Self::new(all.iter().filter(|r| r.condition.is_none()).cloned())
    }

    /// Restrictions bound to a time window.
    pub fn conditional(all: &[NodeRestriction]) -> Self {
        Self::new(all.iter().filter(|r| r.condition.is_some()).cloned())
    }

    pub fn len(&self) -> usize {
        self.restrictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.restrictions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeRestriction> {
        self.restrictions.iter()
    }

    /// The restriction forbidding `from -> via -> to`, if any.
    pub fn restriction_for(&self, from: NodeId, via: NodeId, to: NodeId) -> Option<&NodeRestriction> {
        let ids = self.index.get(&(from, via))?;
        blocking_rule(ids.iter().map(|&i| &self.restrictions[i]), to)
    }

    pub fn is_restricted(&self, from: NodeId, via: NodeId, to: NodeId) -> bool {
        self.restriction_for(from, via, to).is_some()
    }
}
