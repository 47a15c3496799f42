use std::sync::Arc;

use glam::{Vec2, Vec3};
use rgb::RGBA8;

use crate::{select::SolidId, types::Material};

/// One vertex of a triangulated brush mesh, in the layout the renderer's
/// vertex buffer expects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexSolid {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub color: RGBA8,
}

/// Opaque handle to a GPU allocation returned by the external mesh
/// allocator. The geometry core never reads through it; it only holds and
/// releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Allocation(u64);

impl Allocation {
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// External GPU mesh allocator contract. Re-uploading replaces the handle
/// atomically from the renderer's perspective; a returned `None` means the
/// allocation failed and the mesh simply stays unuploaded.
pub trait MeshAllocator {
    fn allocate(
        &mut self,
        vertices: &[VertexSolid],
        indices: &[u32],
        material: &Arc<Material>,
    ) -> Option<Allocation>;

    /// Releases a handle the core no longer references. Reclamation timing
    /// is the allocator's policy.
    fn free(&mut self, allocation: Allocation);
}

/// GPU-ready triangle soup for the subset of a solid's faces sharing one
/// material. Rebuilt wholesale on every mesh update, never patched in place:
/// the previous buffers may still be read by the renderer this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushMesh {
    pub vertices: Vec<VertexSolid>,
    pub indices: Vec<u32>,
    pub material: Arc<Material>,
    pub alloc: Option<Allocation>,
    solid: SolidId,
}

impl BrushMesh {
    pub(crate) fn new(material: Arc<Material>, solid: SolidId) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            material,
            alloc: None,
            solid,
        }
    }

    /// Handle of the solid this mesh was generated from.
    #[must_use]
    pub fn solid(&self) -> SolidId {
        self.solid
    }

    pub fn upload(&mut self, allocator: &mut impl MeshAllocator) {
        self.alloc = allocator.allocate(&self.vertices, &self.indices, &self.material);
    }
}

/// Single-shot end-of-frame task queue. The geometry core enqueues work that
/// must run after the renderer has finished with this frame's data (eg.
/// object id readback); the render loop drains it once per frame.
#[derive(Default)]
pub struct FrameQueue {
    tasks: Vec<Box<dyn FnOnce() + Send>>,
}

impl FrameQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn once(&mut self, task: impl FnOnce() + Send + 'static) {
        self.tasks.push(Box::new(task));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn drain(&mut self) {
        for task in self.tasks.drain(..) {
            task();
        }
    }
}
