//! Reach node (component C4): a pair of (lon, lat) polygons plus step and
//! parent/child back-references.

use std::rc::{Rc, Weak};
use std::cell::RefCell;

use crate::geom::{ConvexPolygon, Rect};

/// A node in the reachability graph. Parent/child links are non-owning:
/// nodes live in per-step arenas owned by the engine
/// ([`crate::reach::engine::ReachableSetEngine`]); `parents`/`children` are
/// lookup-only back-references, never the thing that keeps a node alive.
pub struct ReachNode {
    pub id: u64,
    pub step: i64,
    pub polygon_lon: ConvexPolygon,
    pub polygon_lat: ConvexPolygon,
    /// The unique pre-projection node this node was adapted from during
    /// propagation; used to recover velocity information after
    /// position-plane repartitioning. `None` only for the initial state.
    pub source_propagation: Option<NodeRef>,
    parents: RefCell<Vec<NodeRef>>,
    children: RefCell<Vec<Weak<ReachNode>>>,
}

/// A strong, shared reference to a reach node; cloning is cheap (refcount
/// bump) and is how the adapt phase records multiple contributors for one
/// drivable-area rectangle.
pub type NodeRef = Rc<ReachNode>;

impl ReachNode {
    pub fn new(id: u64, step: i64, polygon_lon: ConvexPolygon, polygon_lat: ConvexPolygon) -> NodeRef {
        Self::new_propagated(id, step, polygon_lon, polygon_lat, None)
    }

    pub fn new_propagated(
        id: u64,
        step: i64,
        polygon_lon: ConvexPolygon,
        polygon_lat: ConvexPolygon,
        source_propagation: Option<NodeRef>,
    ) -> NodeRef {
        Rc::new(ReachNode {
            id,
            step,
            polygon_lon,
            polygon_lat,
            source_propagation,
            parents: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
        })
    }

    pub fn parents(&self) -> Vec<NodeRef> {
        self.parents.borrow().clone()
    }

    pub fn children(&self) -> Vec<NodeRef> {
        self.children
            .borrow()
            .iter()
            .filter_map(|w| w.upgrade())
            .collect()
    }

    pub fn add_parent(&self, parent: NodeRef) {
        let mut parents = self.parents.borrow_mut();
        if !parents.iter().any(|p| p.id == parent.id) {
            parents.push(parent);
        }
    }

    pub fn add_child(&self, child: &NodeRef) {
        let mut children = self.children.borrow_mut();
        if !children.iter().any(|c| c.upgrade().map(|c| c.id) == Some(child.id)) {
            children.push(Rc::downgrade(child));
        }
    }

    pub fn remove_child(&self, child_id: u64) {
        self.children
            .borrow_mut()
            .retain(|c| c.upgrade().map(|c| c.id) != Some(child_id));
    }

    pub fn set_parents(&self, parents: Vec<NodeRef>) {
        *self.parents.borrow_mut() = parents;
    }

    /// Axis-aligned rectangle `[p_lon_min, p_lat_min] x [p_lon_max, p_lat_max]`
    /// read from the two polygons' bounds.
    pub fn position_rectangle(&self) -> Rect {
        let (p_lon_min, _, p_lon_max, _) = self.polygon_lon.bounds();
        let (p_lat_min, _, p_lat_max, _) = self.polygon_lat.bounds();
        Rect::new(p_lon_min, p_lat_min, p_lon_max, p_lat_max)
    }

    pub fn v_lon_bounds(&self) -> (f64, f64) {
        let (_, v_min, _, v_max) = self.polygon_lon.bounds();
        (v_min, v_max)
    }

    pub fn v_lat_bounds(&self) -> (f64, f64) {
        let (_, v_min, _, v_max) = self.polygon_lat.bounds();
        (v_min, v_max)
    }
}

impl std::fmt::Debug for ReachNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReachNode(step={}, id={})", self.step, self.id)
    }
}

impl PartialEq for ReachNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for ReachNode {}

impl std::hash::Hash for ReachNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Monotonic per-engine-instance node ID allocator.
#[derive(Default)]
pub struct NodeIdAllocator {
    next: u64,
}

impl NodeIdAllocator {
    pub fn next(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}
