use crate::error::DriverError;
use crate::value::RawValue;

/// Identity of a compound value inside a [`RawGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Compound value stored in the arena.
#[derive(Debug, Clone)]
pub enum RawNode {
    Array(Vec<RawValue>),
    /// Members in driver order. Names are unique within one node.
    Object(Vec<(String, RawValue)>),
}

/// Arena of compound driver values.
///
/// Holds every array and structure of one result set. Values reference each
/// other by [`NodeId`], which is also the identity used for cycle detection.
/// Built once by the driver adapter, then shared read-only (usually behind an
/// `Arc`) for the duration of one sanitize call.
#[derive(Debug, Clone, Default)]
pub struct RawGraph {
    nodes: Vec<RawNode>,
}

impl RawGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an array node.
    pub fn array(&mut self, items: impl IntoIterator<Item = RawValue>) -> RawValue {
        let id = self.push_node(RawNode::Array(items.into_iter().collect()));
        RawValue::Array(id)
    }

    /// Add a structure node. A repeated name keeps its first position and
    /// takes the last value.
    pub fn object<K: Into<String>>(
        &mut self,
        members: impl IntoIterator<Item = (K, RawValue)>,
    ) -> RawValue {
        let mut fields = Vec::new();
        for (name, value) in members {
            set_member(&mut fields, name.into(), value);
        }
        RawValue::Object(self.push_node(RawNode::Object(fields)))
    }

    /// Set a member on an existing structure node (replacing it if present).
    ///
    /// This is how self-references are wired: create the node, then insert a
    /// member pointing back at it.
    pub fn insert(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        value: RawValue,
    ) -> Result<(), DriverError> {
        let name = name.into();
        match self.nodes.get_mut(id.0) {
            Some(RawNode::Object(members)) => {
                set_member(members, name, value);
                Ok(())
            }
            Some(RawNode::Array(_)) => Err(DriverError::logic(format!(
                "node {} is an array, cannot set member '{name}'",
                id.0
            ))),
            None => Err(DriverError::logic(format!("node {} does not exist", id.0))),
        }
    }

    /// Append an element to an existing array node.
    pub fn push(&mut self, id: NodeId, value: RawValue) -> Result<(), DriverError> {
        match self.nodes.get_mut(id.0) {
            Some(RawNode::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(RawNode::Object(_)) => Err(DriverError::logic(format!(
                "node {} is an object, cannot push",
                id.0
            ))),
            None => Err(DriverError::logic(format!("node {} does not exist", id.0))),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&RawNode> {
        self.nodes.get(id.0)
    }

    /// Look up a member of a structure node.
    pub fn member(&self, id: NodeId, name: &str) -> Option<&RawValue> {
        match self.nodes.get(id.0)? {
            RawNode::Object(members) => members.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            RawNode::Array(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push_node(&mut self, node: RawNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }
}

fn set_member(members: &mut Vec<(String, RawValue)>, name: String, value: RawValue) {
    match members.iter_mut().find(|(k, _)| *k == name) {
        Some(slot) => slot.1 = value,
        None => members.push((name, value)),
    }
}
