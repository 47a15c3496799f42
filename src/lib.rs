//! Brush geometry core of a map editor: convex solids defined by bounding
//! planes, derived face polygons, displacement terrain and GPU-ready meshes.

mod disp;
mod geometry;
mod mesh;
mod orientation;
mod select;
mod solid;
mod types;

pub use disp::{DispInfo, MAX_POWER, MIN_POWER};
pub use geometry::{GeometrySettings, TextureAlignment};
pub use mesh::{Allocation, BrushMesh, FrameQueue, MeshAllocator, VertexSolid};
pub use orientation::Orientation;
pub use select::{BrushEntity, Selectable, Selection, SolidId};
pub use solid::{
    cube_sides, BrushError, Face, Side, Solid, DEFAULT_LIGHTMAP_SCALE, DEFAULT_TEXTURE_SCALE,
};
pub use types::{
    Aabb, Material, Plane, PointClassification, PolygonClassification, TextureAxis,
};
