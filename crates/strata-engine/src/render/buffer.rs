use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a static buffer; the executor keys its GPU copy on it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BufferId(u64);

/// Binding target of a static buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferKind {
    /// Per-vertex attribute stream (`f32` components).
    Vertex,
    /// `u32` element indices.
    Index,
}

/// Immutable buffer contents destined for a one-shot GPU upload.
///
/// The owning drawable holds the only long-lived handle. Clones exist only
/// inside recorded command streams and share the same [`BufferId`], so the GPU
/// copy is created once regardless of how often the buffer is bound.
#[derive(Clone)]
pub struct StaticBuffer {
    id: BufferId,
    kind: BufferKind,
    label: Arc<str>,
    contents: Arc<[u8]>,
}

impl StaticBuffer {
    pub fn vertex(label: &str, data: &[f32]) -> Self {
        Self::new(label, BufferKind::Vertex, bytemuck::cast_slice(data))
    }

    pub fn index(label: &str, data: &[u32]) -> Self {
        Self::new(label, BufferKind::Index, bytemuck::cast_slice(data))
    }

    fn new(label: &str, kind: BufferKind, bytes: &[u8]) -> Self {
        Self {
            id: BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed)),
            kind,
            label: label.into(),
            contents: bytes.into(),
        }
    }

    #[inline]
    pub fn id(&self) -> BufferId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Handle that stays valid only while some `StaticBuffer` clone is alive.
    pub(crate) fn liveness(&self) -> Weak<[u8]> {
        Arc::downgrade(&self.contents)
    }
}

impl std::fmt::Debug for StaticBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticBuffer")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("bytes", &self.contents.len())
            .finish()
    }
}
