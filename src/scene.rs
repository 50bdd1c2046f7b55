//! The measurement document: volumes, center fiducials, rulers, models and
//! labelmaps, addressed by stable node ids.
//!
//! Nodules are registered per volume under a sequential index that is never
//! handed out again once the nodule is removed.

use log::{debug, info};
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::fmt;

use crate::axis::Axis;
use crate::common::{AxisName, SliceView, StructurePlane};
use crate::ellipsoid::{Ellipsoid, Mesh};
use crate::engine;
use crate::error::{LesionError, Result};
use crate::labelmap::{self, Labelmap, DEFAULT_OVERSAMPLING};
use crate::nodule::{Nodule, NoduleRegistry};
use crate::volume::Volume;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Volume,
    Fiducial,
    Ruler,
    Model,
    Labelmap,
}

/// Center markers placed by the user. The first one is the nodule center.
#[derive(Debug, Clone, Default)]
pub struct FiducialList {
    pub name: String,
    pub points: Vec<Point3<f64>>,
}

#[derive(Debug, Clone)]
pub struct Ruler {
    pub name: AxisName,
    pub axis: Axis,
}

#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub ellipsoid: Ellipsoid,
    pub mesh: Mesh,
}

#[derive(Debug, Clone)]
pub struct LabelmapNode {
    pub name: String,
    pub labelmap: Labelmap,
}

#[derive(Debug, Clone)]
pub enum SceneNode {
    Volume(Volume),
    Fiducial(FiducialList),
    Ruler(Ruler),
    Model(Model),
    Labelmap(LabelmapNode),
}

impl SceneNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            SceneNode::Volume(_) => NodeKind::Volume,
            SceneNode::Fiducial(_) => NodeKind::Fiducial,
            SceneNode::Ruler(_) => NodeKind::Ruler,
            SceneNode::Model(_) => NodeKind::Model,
            SceneNode::Labelmap(_) => NodeKind::Labelmap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    NodeAdded { id: NodeId, kind: NodeKind },
    NodeRemoved { id: NodeId, kind: NodeKind },
    NodeModified { id: NodeId, kind: NodeKind },
}

/// Where the slice viewer should jump after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceJump {
    pub view: SliceView,
    pub coordinate: f64,
}

type Observer = Box<dyn FnMut(&SceneEvent)>;

#[derive(Default)]
pub struct Scene {
    nodes: BTreeMap<NodeId, SceneNode>,
    next_id: u64,
    nodules: BTreeMap<NodeId, NoduleRegistry>,
    observers: Vec<Observer>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback invoked synchronously for every scene change.
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&SceneEvent) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, event: SceneEvent) {
        for observer in self.observers.iter_mut() {
            observer(&event);
        }
    }

    fn add_node(&mut self, node: SceneNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let kind = node.kind();
        self.nodes.insert(id, node);
        self.emit(SceneEvent::NodeAdded { id, kind });
        id
    }

    fn remove_node(&mut self, id: NodeId) -> Option<SceneNode> {
        let node = self.nodes.remove(&id)?;
        self.emit(SceneEvent::NodeRemoved {
            id,
            kind: node.kind(),
        });
        Some(node)
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_volume(&mut self, volume: Volume) -> NodeId {
        info!("Added volume '{}'", volume.name());
        let id = self.add_node(SceneNode::Volume(volume));
        self.nodules.insert(id, NoduleRegistry::default());
        id
    }

    pub fn volume(&self, id: NodeId) -> Result<&Volume> {
        match self.nodes.get(&id) {
            Some(SceneNode::Volume(volume)) => Ok(volume),
            _ => Err(LesionError::NotFound(format!("volume {id}"))),
        }
    }

    fn registry(&self, volume: NodeId) -> Result<&NoduleRegistry> {
        self.nodules
            .get(&volume)
            .ok_or_else(|| LesionError::NotFound(format!("volume {volume}")))
    }

    fn registry_mut(&mut self, volume: NodeId) -> Result<&mut NoduleRegistry> {
        self.nodules
            .get_mut(&volume)
            .ok_or_else(|| LesionError::NotFound(format!("volume {volume}")))
    }

    pub fn nodule(&self, volume: NodeId, index: u32) -> Result<&Nodule> {
        self.registry(volume)?
            .get(index)
            .ok_or_else(|| LesionError::NotFound(format!("nodule {index} of volume {volume}")))
    }

    fn nodule_mut(&mut self, volume: NodeId, index: u32) -> Result<&mut Nodule> {
        self.registry_mut(volume)?
            .get_mut(index)
            .ok_or_else(|| LesionError::NotFound(format!("nodule {index} of volume {volume}")))
    }

    /// Indices of the nodules of `volume`, ascending.
    pub fn nodule_indices(&self, volume: NodeId) -> Result<Vec<u32>> {
        Ok(self.registry(volume)?.indices())
    }

    /// Index the next call to `add_nodule` will hand out.
    pub fn next_nodule_index(&self, volume: NodeId) -> Result<u32> {
        Ok(self.registry(volume)?.next_index())
    }

    /// Raises the next nodule index, never lowering it.
    pub fn reserve_nodule_indices(&mut self, volume: NodeId, next_index: u32) -> Result<()> {
        self.registry_mut(volume)?.reserve(next_index);
        Ok(())
    }

    /// Creates a nodule with an empty fiducial list and returns its index.
    pub fn add_nodule(&mut self, volume: NodeId) -> Result<u32> {
        let index = self.registry(volume)?.next_index();
        self.insert_nodule(volume, index)?;
        Ok(index)
    }

    /// Creates a nodule under a given index, e.g. when restoring a session.
    pub fn insert_nodule(&mut self, volume: NodeId, index: u32) -> Result<()> {
        self.volume(volume)?;
        self.registry(volume)?.check_free(index)?;
        let fiducials = self.add_node(SceneNode::Fiducial(FiducialList {
            name: format!("NoduleCenter_{index}"),
            points: Vec::new(),
        }));
        self.registry_mut(volume)?
            .insert(Nodule::new(index, fiducials))?;
        info!("Added nodule {index}");
        Ok(())
    }

    /// Removes a nodule and every node it owns. Its index is not reused.
    pub fn remove_nodule(&mut self, volume: NodeId, index: u32) -> Result<()> {
        let nodule = self
            .registry_mut(volume)?
            .remove(index)
            .ok_or_else(|| LesionError::NotFound(format!("nodule {index} of volume {volume}")))?;
        for id in nodule.owned_nodes() {
            self.remove_node(id);
        }
        info!("Removed nodule {index}");
        Ok(())
    }

    pub fn fiducials(&self, volume: NodeId, index: u32) -> Result<&FiducialList> {
        let id = self.nodule(volume, index)?.fiducials;
        match self.nodes.get(&id) {
            Some(SceneNode::Fiducial(list)) => Ok(list),
            _ => Err(LesionError::NotFound(format!("fiducials of nodule {index}"))),
        }
    }

    /// The first fiducial of the nodule.
    pub fn center(&self, volume: NodeId, index: u32) -> Result<Point3<f64>> {
        self.fiducials(volume, index)?
            .points
            .first()
            .copied()
            .ok_or_else(|| LesionError::NotFound(format!("center of nodule {index}")))
    }

    /// Adds a center fiducial, then draws the default rulers around the
    /// nodule center and builds its model and labelmap.
    pub fn place_center(&mut self, volume: NodeId, index: u32, point: Point3<f64>) -> Result<()> {
        self.add_fiducial(volume, index, point)?;
        self.draw_axes(volume, index)?;
        self.update_model_labelmap(volume, index)
    }

    /// Appends a fiducial to the nodule without touching its rulers.
    pub fn add_fiducial(&mut self, volume: NodeId, index: u32, point: Point3<f64>) -> Result<()> {
        let id = self.nodule(volume, index)?.fiducials;
        match self.nodes.get_mut(&id) {
            Some(SceneNode::Fiducial(list)) => list.points.push(point),
            _ => return Err(LesionError::NotFound(format!("fiducials of nodule {index}"))),
        }
        self.emit(SceneEvent::NodeModified {
            id,
            kind: NodeKind::Fiducial,
        });
        Ok(())
    }

    /// Places Width along R, Height along A and Depth along S, centered on
    /// the nodule center, sized by the volume's working mode.
    pub fn draw_axes(&mut self, volume: NodeId, index: u32) -> Result<()> {
        let center = self.center(volume, index)?;
        let (a, b) = self.volume(volume)?.working_mode().default_half_axes();
        for (name, physical_index, half_length) in [
            (AxisName::Width, 0, a),
            (AxisName::Height, 1, b),
            (AxisName::Depth, 2, b),
        ] {
            let axis = Axis::centered(&center, physical_index, half_length);
            self.put_ruler(volume, index, name, axis)?;
        }
        debug!("Drew default axes of nodule {index} around {center}");
        Ok(())
    }

    fn put_ruler(&mut self, volume: NodeId, index: u32, name: AxisName, axis: Axis) -> Result<()> {
        match self.nodule(volume, index)?.rulers.get(&name).copied() {
            Some(id) => self.set_ruler_axis(id, axis),
            None => {
                let id = self.add_node(SceneNode::Ruler(Ruler { name, axis }));
                self.nodule_mut(volume, index)?.rulers.insert(name, id);
                Ok(())
            }
        }
    }

    fn set_ruler_axis(&mut self, id: NodeId, axis: Axis) -> Result<()> {
        match self.nodes.get_mut(&id) {
            Some(SceneNode::Ruler(ruler)) => ruler.axis = axis,
            _ => return Err(LesionError::NotFound(format!("ruler {id}"))),
        }
        self.emit(SceneEvent::NodeModified {
            id,
            kind: NodeKind::Ruler,
        });
        Ok(())
    }

    fn ruler_id(&self, volume: NodeId, index: u32, name: AxisName) -> Result<NodeId> {
        self.nodule(volume, index)?
            .rulers
            .get(&name)
            .copied()
            .ok_or_else(|| LesionError::NotFound(format!("{name} ruler of nodule {index}")))
    }

    pub fn axis_for_nodule(&self, volume: NodeId, index: u32, name: AxisName) -> Result<Axis> {
        let id = self.ruler_id(volume, index, name)?;
        match self.nodes.get(&id) {
            Some(SceneNode::Ruler(ruler)) => Ok(ruler.axis),
            _ => Err(LesionError::NotFound(format!("{name} ruler of nodule {index}"))),
        }
    }

    /// The two rulers that move together for `plane`, in plane order.
    pub fn axes_for_plane(
        &self,
        volume: NodeId,
        index: u32,
        plane: StructurePlane,
    ) -> Result<(Axis, Axis)> {
        let (first, second) = engine::resolve_axis_pair_for_plane(plane)?;
        Ok((
            self.axis_for_nodule(volume, index, first)?,
            self.axis_for_nodule(volume, index, second)?,
        ))
    }

    /// Moves a ruler's endpoints, as when the user drags it.
    pub fn set_axis_endpoints(
        &mut self,
        volume: NodeId,
        index: u32,
        name: AxisName,
        endpoint1: Point3<f64>,
        endpoint2: Point3<f64>,
    ) -> Result<()> {
        let id = self.ruler_id(volume, index, name)?;
        self.set_ruler_axis(id, Axis::new(endpoint1, endpoint2))
    }

    /// Moves both rulers of `plane` by `offset` slices along the plane normal.
    ///
    /// Fails with `UnselectedPlane` for `StructurePlane::None` and with
    /// `NotFound` when a ruler is missing; nothing is changed in either case.
    pub fn step_slice(
        &mut self,
        volume: NodeId,
        index: u32,
        plane: StructurePlane,
        offset: i32,
    ) -> Result<SliceJump> {
        let (first, second) = engine::resolve_axis_pair_for_plane(plane)?;
        let (direction, view) = engine::plane_voxel_axis(plane)?;
        let first_id = self.ruler_id(volume, index, first)?;
        let second_id = self.ruler_id(volume, index, second)?;
        let mut first_axis = self.axis_for_nodule(volume, index, first)?;
        let mut second_axis = self.axis_for_nodule(volume, index, second)?;

        let vol = self.volume(volume)?;
        engine::step_along_axis(vol, &mut first_axis, direction.to_usize(), offset)?;
        let coordinate =
            engine::step_along_axis(vol, &mut second_axis, direction.to_usize(), offset)?;

        self.set_ruler_axis(first_id, first_axis)?;
        self.set_ruler_axis(second_id, second_axis)?;
        info!(
            "Moved {first} and {second} of nodule {index} by {offset} slice(s), {view:?} view to {coordinate:.3}"
        );
        Ok(SliceJump { view, coordinate })
    }

    /// Ellipsoid spanned by the current ruler lengths around the center.
    /// Missing rulers count as zero length.
    pub fn nodule_ellipsoid(&self, volume: NodeId, index: u32) -> Result<Ellipsoid> {
        let center = self.center(volume, index)?;
        let length = |name| match self.axis_for_nodule(volume, index, name) {
            Ok(axis) => Ok(axis.length()),
            Err(LesionError::NotFound(_)) => Ok(0.0),
            Err(e) => Err(e),
        };
        Ellipsoid::from_measurements(
            length(AxisName::Width)?,
            length(AxisName::Height)?,
            length(AxisName::Depth)?,
            center,
        )
    }

    /// Replaces the nodule's model and labelmap with ones built from the
    /// current rulers.
    pub fn update_model_labelmap(&mut self, volume: NodeId, index: u32) -> Result<()> {
        let ellipsoid = self.nodule_ellipsoid(volume, index)?;
        let labelmap = labelmap::rasterize(&ellipsoid, self.volume(volume)?, DEFAULT_OVERSAMPLING)?;
        let mesh = ellipsoid.mesh();

        let nodule = self.nodule_mut(volume, index)?;
        let stale = [nodule.model.take(), nodule.labelmap.take()];
        for id in stale.into_iter().flatten() {
            self.remove_node(id);
        }

        let model = self.add_node(SceneNode::Model(Model {
            name: format!("NoduleModel_{index}"),
            ellipsoid,
            mesh,
        }));
        let labelmap = self.add_node(SceneNode::Labelmap(LabelmapNode {
            name: format!("NoduleLabelmap_{index}"),
            labelmap,
        }));
        let nodule = self.nodule_mut(volume, index)?;
        nodule.model = Some(model);
        nodule.labelmap = Some(labelmap);
        info!(
            "Rebuilt model and labelmap of nodule {index}: radii {:.3} x {:.3} x {:.3}",
            ellipsoid.radii.x, ellipsoid.radii.y, ellipsoid.radii.z
        );
        Ok(())
    }

    pub fn model(&self, volume: NodeId, index: u32) -> Result<&Model> {
        let id = self.nodule(volume, index)?.model;
        match id.and_then(|id| self.nodes.get(&id)) {
            Some(SceneNode::Model(model)) => Ok(model),
            _ => Err(LesionError::NotFound(format!("model of nodule {index}"))),
        }
    }

    pub fn labelmap(&self, volume: NodeId, index: u32) -> Result<&LabelmapNode> {
        let id = self.nodule(volume, index)?.labelmap;
        match id.and_then(|id| self.nodes.get(&id)) {
            Some(SceneNode::Labelmap(labelmap)) => Ok(labelmap),
            _ => Err(LesionError::NotFound(format!("labelmap of nodule {index}"))),
        }
    }
}
