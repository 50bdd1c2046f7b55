//! Nodules and the per-volume registry handing out their indices.

use std::collections::BTreeMap;

use crate::common::AxisName;
use crate::error::{LesionError, Result};
use crate::scene::NodeId;

/// Nodes owned by one nodule.
#[derive(Debug, Clone)]
pub struct Nodule {
    pub index: u32,
    pub fiducials: NodeId,
    pub rulers: BTreeMap<AxisName, NodeId>,
    pub model: Option<NodeId>,
    pub labelmap: Option<NodeId>,
}

impl Nodule {
    pub fn new(index: u32, fiducials: NodeId) -> Self {
        Self {
            index,
            fiducials,
            rulers: BTreeMap::new(),
            model: None,
            labelmap: None,
        }
    }

    /// Fiducials, rulers, model and labelmap, in that order.
    pub fn owned_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(self.fiducials)
            .chain(self.rulers.values().copied())
            .chain(self.model)
            .chain(self.labelmap)
    }
}

/// Nodules of one volume. Indices start at 1 and only grow.
#[derive(Debug, Clone)]
pub struct NoduleRegistry {
    next_index: u32,
    nodules: BTreeMap<u32, Nodule>,
}

impl Default for NoduleRegistry {
    fn default() -> Self {
        Self {
            next_index: 1,
            nodules: BTreeMap::new(),
        }
    }
}

impl NoduleRegistry {
    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    /// Raises the next index, never lowering it.
    pub fn reserve(&mut self, next_index: u32) {
        self.next_index = self.next_index.max(next_index);
    }

    pub fn get(&self, index: u32) -> Option<&Nodule> {
        self.nodules.get(&index)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut Nodule> {
        self.nodules.get_mut(&index)
    }

    /// Ascending.
    pub fn indices(&self) -> Vec<u32> {
        self.nodules.keys().copied().collect()
    }

    /// Fails when `index` is taken or no index could follow it.
    pub fn check_free(&self, index: u32) -> Result<u32> {
        if self.nodules.contains_key(&index) {
            return Err(LesionError::InvalidMeasurement(format!(
                "nodule {index} already exists"
            )));
        }
        index.checked_add(1).ok_or_else(|| {
            LesionError::InvalidMeasurement(format!("nodule index {index} is out of range"))
        })
    }

    pub fn insert(&mut self, nodule: Nodule) -> Result<()> {
        let following = self.check_free(nodule.index)?;
        self.nodules.insert(nodule.index, nodule);
        self.reserve(following);
        Ok(())
    }

    pub fn remove(&mut self, index: u32) -> Option<Nodule> {
        self.nodules.remove(&index)
    }
}
