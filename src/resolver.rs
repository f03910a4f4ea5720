//! Reference resolution and instance caching.
//!
//! The resolver maps emitter definition indices to live [`ResolvedEmitter`]
//! instances. Because construction is asynchronous and several attachments
//! may reference the same index before the first build finishes, the cache
//! stores the *shared future* of the instance rather than the instance: the
//! entry is inserted synchronously, before the build's first suspension
//! point, so concurrent resolutions always join the same in-flight build.

use crate::builder::EmitterBuilder;
use crate::document::ResonaDocument;
use crate::emitter::ResolvedEmitter;
use crate::error::{ResonaError, Result};
use crate::graph::{AttachPoint, SceneGraph};
use crate::loader::SourceLoader;
use crate::scheduler::AutoplayGate;
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared, join_all};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A pending (or completed) emitter resolution. Cloning is cheap and every
/// clone resolves to the identical instance.
pub type EmitterFuture = Shared<LocalBoxFuture<'static, Result<Rc<ResolvedEmitter>>>>;

/// Outcome of resolving every attachment in a document.
///
/// Branch failures are isolated: a failed emitter omits sound for its
/// node or scene while the rest of the document loads normally.
#[derive(Debug)]
pub struct DocumentResolution {
    /// Unique resolved emitters, in attachment resolution order.
    pub emitters: Vec<Rc<ResolvedEmitter>>,
    /// Attachments whose resolution failed, with the failure.
    pub failures: Vec<(AttachPoint, ResonaError)>,
}

impl DocumentResolution {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolves emitter references for one document load.
pub struct EmitterResolver {
    document: Rc<ResonaDocument>,
    loader: Rc<SourceLoader>,
    builder: EmitterBuilder,
    graph: Rc<dyn SceneGraph>,
    gate: Rc<AutoplayGate>,
    cache: RefCell<HashMap<usize, EmitterFuture>>,
    uses: RefCell<HashMap<usize, usize>>,
}

impl EmitterResolver {
    pub fn new(
        document: Rc<ResonaDocument>,
        loader: Rc<SourceLoader>,
        graph: Rc<dyn SceneGraph>,
        gate: Rc<AutoplayGate>,
    ) -> Self {
        let builder = EmitterBuilder::new(document.variant());
        Self {
            document,
            loader,
            builder,
            graph,
            gate,
            cache: RefCell::new(HashMap::new()),
            uses: RefCell::new(HashMap::new()),
        }
    }

    pub fn document(&self) -> &Rc<ResonaDocument> {
        &self.document
    }

    pub fn gate(&self) -> &Rc<AutoplayGate> {
        &self.gate
    }

    /// Pre-scan pass over all node and scene attachments, counting how often
    /// each emitter index is referenced. Allocates no instances; the counts
    /// say which emitters will be shared rather than uniquely owned.
    pub fn mark_usages(&self) {
        let mut uses = self.uses.borrow_mut();
        uses.clear();
        for attachment in self.document.node_attachments() {
            *uses.entry(attachment.emitter).or_insert(0) += 1;
        }
        for attachment in self.document.scene_attachments() {
            for &emitter in &attachment.emitters {
                *uses.entry(emitter).or_insert(0) += 1;
            }
        }
    }

    /// How many attachments reference an emitter index (after
    /// [`mark_usages`](Self::mark_usages)).
    pub fn usage_count(&self, index: usize) -> usize {
        self.uses.borrow().get(&index).copied().unwrap_or(0)
    }

    /// Resolve an emitter index to its single shared instance, starting the
    /// build if no resolution is in flight yet.
    pub fn resolve_emitter(&self, index: usize) -> EmitterFuture {
        if let Some(pending) = self.cache.borrow().get(&index) {
            return pending.clone();
        }

        let document = self.document.clone();
        let loader = self.loader.clone();
        let builder = self.builder;
        let future = async move {
            let def = document.emitter_at(index)?.clone();
            log::debug!(
                "building emitter {index} ({} sources)",
                def.sources.len()
            );
            // Independent source loads fan out; the emitter waits for all.
            let loads = def.sources.iter().map(|&source| {
                let loader = loader.clone();
                async move { loader.load_source(source).await }
            });
            let loaded = join_all(loads)
                .await
                .into_iter()
                .collect::<Result<Vec<_>>>()?;
            let emitter = builder.build(&document, index, loaded)?;
            Ok(Rc::new(emitter))
        }
        .boxed_local()
        .shared();

        // The placeholder must land in the cache before the future is first
        // polled, or two callers racing past a suspension point would start
        // separate builds for the same index.
        self.cache.borrow_mut().insert(index, future.clone());
        future
    }

    /// Resolve the emitter a node declares, attaching it on completion.
    /// `None` when the node declares no attachment.
    pub fn resolve_node_attachment(&self, node: usize) -> Option<EmitterFuture> {
        let emitter = self.document.node_attachment(node)?;
        Some(self.resolve_attachment(AttachPoint::Node(node), emitter))
    }

    /// Resolve a scene's ambient emitters, attaching each on completion.
    /// Empty when the scene declares none.
    pub fn resolve_scene_attachments(&self, scene: usize) -> Vec<EmitterFuture> {
        self.document
            .scene_attachment(scene)
            .iter()
            .map(|&emitter| self.resolve_attachment(AttachPoint::Scene(scene), emitter))
            .collect()
    }

    fn resolve_attachment(&self, point: AttachPoint, emitter: usize) -> EmitterFuture {
        let pending = self.resolve_emitter(emitter);
        let graph = self.graph.clone();
        async move {
            let resolved = pending.await?;
            graph.attach(point, &resolved);
            Ok(resolved)
        }
        .boxed_local()
        .shared()
    }

    /// Resolve every node and scene attachment in the document, then hand
    /// autoplay-marked emitters to the gate.
    ///
    /// Failures never abort sibling branches; they are reported in the
    /// returned [`DocumentResolution`].
    pub async fn resolve_document(&self) -> DocumentResolution {
        self.mark_usages();

        let mut pending: Vec<(AttachPoint, EmitterFuture)> = Vec::new();
        for attachment in self.document.node_attachments() {
            pending.push((
                AttachPoint::Node(attachment.node),
                self.resolve_attachment(AttachPoint::Node(attachment.node), attachment.emitter),
            ));
        }
        for attachment in self.document.scene_attachments() {
            for &emitter in &attachment.emitters {
                pending.push((
                    AttachPoint::Scene(attachment.scene),
                    self.resolve_attachment(AttachPoint::Scene(attachment.scene), emitter),
                ));
            }
        }

        let results = join_all(
            pending
                .into_iter()
                .map(|(point, future)| async move { (point, future.await) }.boxed_local()),
        )
        .await;

        let mut emitters: Vec<Rc<ResolvedEmitter>> = Vec::new();
        let mut failures = Vec::new();
        for (point, result) in results {
            match result {
                Ok(emitter) => {
                    if !emitters.iter().any(|e| Rc::ptr_eq(e, &emitter)) {
                        if emitter.autoplay() {
                            self.gate
                                .schedule(emitter.clone(), point, self.graph.clone());
                        }
                        emitters.push(emitter);
                    }
                }
                Err(error) => {
                    log::warn!("attachment {point:?} failed to resolve: {error}");
                    failures.push((point, error));
                }
            }
        }

        DocumentResolution { emitters, failures }
    }
}
