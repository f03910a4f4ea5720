//! Autoplay gating behind the first user interaction.
//!
//! Browser-style audio policy: nothing marked autoplay may start before the
//! user has interacted once. The gate starts locked, queues playback requests
//! in arrival order, and a single one-way [`unlock`](AutoplayGate::unlock)
//! drains the queue FIFO.
//!
//! The gate is an ordinary injectable object, one per resolver by default.
//! Hosts that want one barrier across several document loads share a single
//! gate between resolvers explicitly.

use crate::emitter::ResolvedEmitter;
use crate::graph::{AttachPoint, SceneGraph};
use crate::math::WorldPose;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

struct PendingPlayback {
    emitter: Rc<ResolvedEmitter>,
    point: AttachPoint,
    graph: Rc<dyn SceneGraph>,
}

/// One-shot interaction barrier for autoplay emitters.
///
/// State machine: `Locked -> Unlocked`, a single one-way transition taken on
/// the first `unlock` call. Later calls are no-ops.
pub struct AutoplayGate {
    unlocked: Cell<bool>,
    pending: RefCell<VecDeque<PendingPlayback>>,
}

impl AutoplayGate {
    pub fn new() -> Self {
        Self {
            unlocked: Cell::new(false),
            pending: RefCell::new(VecDeque::new()),
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.get()
    }

    /// Number of playbacks waiting for the unlock.
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Request playback of an emitter. Plays immediately once the gate is
    /// unlocked; queues otherwise.
    pub fn schedule(
        &self,
        emitter: Rc<ResolvedEmitter>,
        point: AttachPoint,
        graph: Rc<dyn SceneGraph>,
    ) {
        let playback = PendingPlayback {
            emitter,
            point,
            graph,
        };
        if self.unlocked.get() {
            Self::play_now(&playback);
        } else {
            log::debug!(
                "autoplay gate locked, deferring playback of emitter {}",
                playback.emitter.definition_index()
            );
            self.pending.borrow_mut().push_back(playback);
        }
    }

    /// Report the first user interaction. Drains the pending queue in FIFO
    /// order, invoking each playback exactly once.
    pub fn unlock(&self) {
        if self.unlocked.replace(true) {
            return;
        }
        log::debug!(
            "autoplay gate unlocked, flushing {} pending playbacks",
            self.pending.borrow().len()
        );
        loop {
            let Some(playback) = self.pending.borrow_mut().pop_front() else {
                break;
            };
            Self::play_now(&playback);
        }
    }

    fn play_now(playback: &PendingPlayback) {
        // Snapshot the world transform and apply it as instantaneous panner
        // values before starting, so a positional emitter never renders a
        // frame at the origin.
        if playback.emitter.kind().is_positional() {
            let matrix = playback.graph.world_matrix(playback.point);
            playback
                .emitter
                .set_pose_instant(WorldPose::from_world_matrix(matrix));
        }
        playback.emitter.play();
    }
}

impl Default for AutoplayGate {
    fn default() -> Self {
        Self::new()
    }
}
