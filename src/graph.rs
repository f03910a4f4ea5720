//! Host scene-graph capability.

use crate::emitter::ResolvedEmitter;
use crate::math::Mat4;
use std::rc::Rc;

/// Where a resolved emitter lives in the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachPoint {
    /// Attached to a node transform.
    Node(usize),
    /// Attached to the scene root (ambient emitter).
    Scene(usize),
}

/// Capability the host renderer provides: attaching resolved emitters to its
/// scene graph and answering world-transform queries for attached emitters.
///
/// Resona never walks the host's transform hierarchy itself; the accumulated
/// world matrix is the host's to compute.
pub trait SceneGraph {
    fn attach(&self, point: AttachPoint, emitter: &Rc<ResolvedEmitter>);

    /// Accumulated world matrix of an attachment point. Scene attachments are
    /// expected to return the scene root transform (usually identity).
    fn world_matrix(&self, point: AttachPoint) -> Mat4;
}
