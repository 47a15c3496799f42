use std::collections::HashSet;

use crate::{mesh::MeshAllocator, solid::Side, solid::Solid, types::Aabb};

/// Stable handle to a selectable object. Handles are never reused within a
/// map session, so a stale handle resolves to nothing instead of to a
/// different object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SolidId(pub(crate) u32);

impl SolidId {
    /// Builds a handle from a raw id, for callers that manage ids themselves.
    /// [`BrushEntity`] issues its own sequential handles.
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Capability interface for objects participating in the editor's selection
/// and transform system.
pub trait Selectable {
    fn selectable_id(&self) -> SolidId;

    /// Cached bounds, `None` for degenerate geometry. Degenerate objects
    /// cannot be box-selected but remain selectable by id.
    fn bounds(&self) -> Option<Aabb>;
}

/// Process-wide registry of currently selected objects.
#[derive(Debug, Default)]
pub struct Selection {
    selected: HashSet<SolidId>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, id: SolidId) {
        self.selected.insert(id);
    }

    pub fn deselect(&mut self, id: SolidId) {
        self.selected.remove(&id);
    }

    pub fn toggle(&mut self, id: SolidId) {
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    #[must_use]
    pub fn is_selected(&self, id: SolidId) -> bool {
        self.selected.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SolidId> + '_ {
        self.selected.iter().copied()
    }
}

/// An entity owning a set of brush solids (the map world, or a brush-based
/// point of interest like a trigger volume).
#[derive(Debug, Default)]
pub struct BrushEntity {
    next_id: u32,
    solids: Vec<Solid>,
}

impl BrushEntity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a solid built from a raw side list and returns its handle.
    /// The caller is expected to rebuild its mesh before rendering.
    pub fn add_solid(&mut self, sides: Vec<Side>) -> SolidId {
        let id = SolidId(self.next_id);
        self.next_id += 1;
        self.solids.push(Solid::new(id, sides));
        id
    }

    #[must_use]
    pub fn solids(&self) -> &[Solid] {
        &self.solids
    }

    pub fn solids_mut(&mut self) -> &mut [Solid] {
        &mut self.solids
    }

    #[must_use]
    pub fn solid(&self, id: SolidId) -> Option<&Solid> {
        self.solids.iter().find(|s| s.selectable_id() == id)
    }

    pub fn solid_mut(&mut self, id: SolidId) -> Option<&mut Solid> {
        self.solids.iter_mut().find(|s| s.selectable_id() == id)
    }

    /// Deletes a solid: removes it from the selection registry and releases
    /// its GPU allocations through the external allocator.
    /// Returns whether the solid existed.
    pub fn remove_solid(
        &mut self,
        id: SolidId,
        selection: &mut Selection,
        allocator: &mut impl MeshAllocator,
    ) -> bool {
        let Some(index) = self.solids.iter().position(|s| s.selectable_id() == id) else {
            return false;
        };

        let mut solid = self.solids.remove(index);
        solid.release_meshes(allocator);
        selection.deselect(id);

        true
    }
}
