#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use std::sync::Arc;

use approx::{abs_diff_eq, relative_eq};
use glam::{Mat4, Vec2, Vec3};
use itertools::Itertools;
use rgb::RGBA8;
use thiserror::Error;
use tracing::warn;

use crate::{
    disp::{DispInfo, MAX_POWER, MIN_POWER},
    geometry::{self, GeometrySettings, TextureAlignment},
    mesh::{BrushMesh, MeshAllocator, VertexSolid},
    orientation::Orientation,
    select::{Selectable, Selection, SolidId},
    types::{Aabb, Material, Plane, PolygonClassification, TextureAxis},
};

#[cfg(test)]
mod tests;

pub const DEFAULT_TEXTURE_SCALE: f32 = 0.25;
pub const DEFAULT_LIGHTMAP_SCALE: f32 = 16.0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrushError {
    #[error("displacement side `{side}` is not valid: got {vertices} vertices, expected 4")]
    InvalidDisplacement { side: usize, vertices: usize },
    #[error("displacement power {power} is out of range ({MIN_POWER}..={MAX_POWER})")]
    InvalidDispPower { power: u8 },
}

/// One bounding half-space of a solid: the points of the solid satisfy
/// `plane.normal.dot(point) <= plane.distance`.
#[derive(Debug, Clone, PartialEq)]
pub struct Side {
    pub plane: Plane,
    pub material: Arc<Material>,
    pub u_axis: TextureAxis,
    pub v_axis: TextureAxis,
    pub scale: Vec2,
    pub rotation: f32,
    pub lightmap_scale: f32,
    pub smoothing_groups: u32,
    pub disp: Option<DispInfo>,
}

impl Side {
    /// Creates a side with texture axes seeded from the orientation of the
    /// plane. A degenerate plane normal leaves both axes zeroed, which
    /// downstream treats as "no projection".
    #[must_use]
    pub fn new(plane: Plane, material: Arc<Material>, settings: &GeometrySettings) -> Self {
        let (u_axis, v_axis) = seed_texture_axes(plane.normal, settings.texture_alignment);

        Self {
            plane,
            material,
            u_axis,
            v_axis,
            scale: Vec2::splat(DEFAULT_TEXTURE_SCALE),
            rotation: 0.0,
            lightmap_scale: DEFAULT_LIGHTMAP_SCALE,
            smoothing_groups: 0,
            disp: None,
        }
    }

    #[must_use]
    pub fn with_disp(mut self, disp: DispInfo) -> Self {
        self.disp = Some(disp);
        self
    }

    #[must_use]
    pub fn has_projection(&self) -> bool {
        !self.u_axis.is_degenerate() && !self.v_axis.is_degenerate()
    }

    /// Texture coordinates of a world position projected along the side's
    /// texture axes. `None` when the side has no valid projection.
    #[must_use]
    pub fn project_uv(&self, point: Vec3) -> Option<Vec2> {
        if !self.has_projection() {
            return None;
        }

        let texture_width = self.material.width() as f32;
        let texture_height = self.material.height() as f32;
        if texture_width == 0.0 || texture_height == 0.0 {
            return None;
        }
        if self.scale.x == 0.0 || self.scale.y == 0.0 {
            return None;
        }

        let u = point.dot(self.u_axis.axis) / (texture_width * self.scale.x)
            + self.u_axis.offset / texture_width;
        let v = point.dot(self.v_axis.axis) / (texture_height * self.scale.y)
            + self.v_axis.offset / texture_height;

        Some(Vec2::new(u, v))
    }
}

fn seed_texture_axes(normal: Vec3, alignment: TextureAlignment) -> (TextureAxis, TextureAxis) {
    let Some(orientation) = Orientation::classify(normal) else {
        return (TextureAxis::default(), TextureAxis::default());
    };

    let down = orientation.down();

    match alignment {
        TextureAlignment::World => (
            TextureAxis::new(orientation.right()),
            TextureAxis::new(down),
        ),
        TextureAlignment::Face => {
            // true U axis, orthogonal to the normal even for tilted planes
            let u = down.cross(normal);
            if u.length_squared() < 1e-8 {
                return (TextureAxis::default(), TextureAxis::default());
            }
            let u = u.normalize();
            let v = normal.cross(u).normalize();

            (TextureAxis::new(u), TextureAxis::new(v))
        }
    }
}

/// The boundary polygon a side contributes to its solid: a convex ccw loop
/// of points on the side's plane. Derived, never persisted; the side
/// back-reference is an index into the owning solid's side list and is
/// reassigned on every rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    side: usize,
    points: Vec<Vec3>,
}

impl Face {
    #[must_use]
    pub fn side_index(&self) -> usize {
        self.side
    }

    #[must_use]
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }
}

/// A convex polyhedron defined as the intersection of half-spaces.
///
/// `faces`, `meshes` and `bounds` are derived from `sides` by
/// [`update_mesh`](Self::update_mesh); every mutation of the side list
/// (clip, transform, grid alignment) invalidates them until the next
/// rebuild.
#[derive(Debug, Clone)]
pub struct Solid {
    id: SolidId,
    sides: Vec<Side>,
    faces: Vec<Face>,
    meshes: Vec<BrushMesh>,
    bounds: Option<Aabb>,
}

impl Solid {
    #[must_use]
    pub fn new(id: SolidId, sides: Vec<Side>) -> Self {
        Self {
            id,
            sides,
            faces: Vec::new(),
            meshes: Vec::new(),
            bounds: None,
        }
    }

    /// A cuboid brush of the given size centered at the origin, transformed
    /// by `transform`.
    #[must_use]
    pub fn cube(
        id: SolidId,
        material: &Arc<Material>,
        size: Vec3,
        transform: Mat4,
        settings: &GeometrySettings,
    ) -> Self {
        Self::new(id, cube_sides(material, size, transform, settings))
    }

    #[must_use]
    pub fn sides(&self) -> &[Side] {
        &self.sides
    }

    #[must_use]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    #[must_use]
    pub fn meshes(&self) -> &[BrushMesh] {
        &self.meshes
    }

    pub fn meshes_mut(&mut self) -> &mut [BrushMesh] {
        &mut self.meshes
    }

    #[must_use]
    pub fn has_displacement(&self) -> bool {
        self.sides.iter().any(|side| side.disp.is_some())
    }

    #[must_use]
    pub fn is_nodraw(&self) -> bool {
        self.sides.iter().all(|side| side.material.no_draw())
    }

    #[must_use]
    pub fn is_selected(&self, selection: &Selection) -> bool {
        selection.is_selected(self.id)
    }

    /// Volume enclosed by the last derived faces, by the divergence theorem.
    /// Zero until [`update_mesh`](Self::update_mesh) has run.
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.faces
            .iter()
            .map(|face| geometry::face_volume_contribution(face.points.iter().copied()))
            .sum()
    }

    /// Recomputes faces, bounds and material-grouped meshes from the side
    /// list. A side set whose intersection is empty or unbounded yields no
    /// faces and unset bounds. Previously held GPU allocation handles are
    /// dropped; new meshes stay unuploaded until the renderer uploads them.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a displacement side's face is not a quad. The solid
    /// is still left consistent: the offending side falls back to flat
    /// geometry.
    pub fn update_mesh(&mut self, settings: &GeometrySettings) -> Result<(), BrushError> {
        self.faces = derive_faces(&self.sides, settings);

        if !self.faces.is_empty() && !faces_enclose_volume(&self.faces, settings.epsilon) {
            warn!(
                "solid `{}`: side set does not enclose a bounded volume",
                self.id.raw()
            );
            self.faces.clear();
        }

        self.bounds = self
            .faces
            .iter()
            .flat_map(|face| face.points.iter().copied())
            .fold(None, |bounds: Option<Aabb>, point| {
                Some(match bounds {
                    Some(bounds) => bounds.extended(point),
                    None => Aabb::from_point(point),
                })
            });

        let mut result = Ok(());
        let mut meshes: Vec<BrushMesh> = Vec::new();

        for face in &self.faces {
            let side = &self.sides[face.side];

            let mesh_index = match meshes
                .iter()
                .position(|mesh| mesh.material.name() == side.material.name())
            {
                Some(index) => index,
                None => {
                    meshes.push(BrushMesh::new(Arc::clone(&side.material), self.id));
                    meshes.len() - 1
                }
            };
            let mesh = &mut meshes[mesh_index];

            if let Some(disp) = &side.disp {
                if let Err(err) = emit_displaced_face(mesh, side, disp, face) {
                    warn!(
                        "solid `{}`: {}, using flat geometry for the side",
                        self.id.raw(),
                        err
                    );
                    emit_flat_face(mesh, side, &face.points);
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            } else {
                emit_flat_face(mesh, side, &face.points);
            }
        }

        // swap in the fresh meshes; the old ones may still be referenced by
        // the renderer this frame and are never mutated in place
        self.meshes = meshes;

        result
    }

    /// Requests GPU upload for every mesh through the external allocator.
    pub fn upload_meshes(&mut self, allocator: &mut impl MeshAllocator) {
        for mesh in &mut self.meshes {
            mesh.upload(allocator);
        }
    }

    /// Hands all held GPU allocation handles back to the allocator.
    pub fn release_meshes(&mut self, allocator: &mut impl MeshAllocator) {
        for mesh in &mut self.meshes {
            if let Some(alloc) = mesh.alloc.take() {
                allocator.free(alloc);
            }
        }
    }

    /// Splits the solid by the cutting side's plane, keeping the region
    /// behind it. Sides whose polygon lies entirely in front are removed;
    /// spanning sides are kept and implicitly truncated by the next face
    /// derivation. A cut that separates nothing is a silent no-op (or
    /// silently discards every side when nothing is behind the plane).
    ///
    /// Only the side list is mutated; faces and meshes are invalid until
    /// [`update_mesh`](Self::update_mesh) runs.
    pub fn clip(&mut self, cutting_side: Side, settings: &GeometrySettings) {
        let faces = derive_faces(&self.sides, settings);
        let cutting_plane = cutting_side.plane;

        let mut discard = vec![false; self.sides.len()];
        for face in &faces {
            if cutting_plane.classify_polygon(face.points.iter().copied(), settings.epsilon)
                == PolygonClassification::Front
            {
                discard[face.side] = true;
            }
        }

        let mut discard_iter = discard.iter();
        self.sides.retain(|_| !discard_iter.next().unwrap());
        self.sides.push(cutting_side);

        self.invalidate_derived();
    }

    /// Applies an affine transform to every side's plane and displacement
    /// data. The matrix must be invertible. Faces and meshes are invalid
    /// until [`update_mesh`](Self::update_mesh) runs.
    pub fn transform(&mut self, matrix: Mat4) {
        let normal_matrix = matrix.inverse().transpose();

        for side in &mut self.sides {
            side.plane = side.plane.transformed(matrix);

            if let Some(disp) = &mut side.disp {
                disp.start_position = matrix.transform_point3(disp.start_position);

                for offset in disp.offsets.iter_mut() {
                    *offset = matrix.transform_vector3(*offset);
                }

                for normal in disp.normals.iter_mut() {
                    if normal.length_squared() > 1e-12 {
                        *normal = (normal_matrix * normal.extend(0.0)).truncate().normalize();
                    }
                }
            }
        }

        self.invalidate_derived();
    }

    /// Snaps the solid's derived vertices to the grid and refits each side's
    /// plane to its snapped polygon (centroid plus Newell normal). This is a
    /// best-fit, lossy operation: the exact shape may change at small scale.
    /// Sides that no longer contribute a polygon are dropped. Faces and
    /// meshes are invalid until [`update_mesh`](Self::update_mesh) runs.
    pub fn align_to_grid(&mut self, grid_size: Vec3, settings: &GeometrySettings) {
        let faces = derive_faces(&self.sides, settings);
        let mut aligned = Vec::with_capacity(faces.len());

        for face in faces {
            let snapped = face
                .points
                .iter()
                .map(|&point| snap_to_grid(point, grid_size))
                .collect_vec();

            let normal = geometry::polygon_normal(snapped.iter().copied());
            if !normal.is_finite() {
                // the polygon collapsed onto the grid
                continue;
            }
            let center = geometry::polygon_center(snapped.iter().copied());

            let mut side = self.sides[face.side].clone();
            side.plane = Plane::from_point_normal(center, normal);
            aligned.push(side);
        }

        self.sides = aligned;
        self.invalidate_derived();
    }

    fn invalidate_derived(&mut self) {
        self.faces.clear();
        self.meshes.clear();
        self.bounds = None;
    }
}

impl Selectable for Solid {
    fn selectable_id(&self) -> SolidId {
        self.id
    }

    fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }
}

/// The six axis-aligned sides of a cuboid of the given size centered at the
/// origin, transformed by `transform`.
#[must_use]
pub fn cube_sides(
    material: &Arc<Material>,
    size: Vec3,
    transform: Mat4,
    settings: &GeometrySettings,
) -> Vec<Side> {
    let half = size / 2.0;

    [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z]
        .into_iter()
        .map(|normal| {
            let point = normal * half.dot(normal.abs());
            let plane = Plane::from_point_normal(point, normal).transformed(transform);
            Side::new(plane, Arc::clone(material), settings)
        })
        .collect()
}

fn snap_to_grid(point: Vec3, grid: Vec3) -> Vec3 {
    let snap = |value: f32, step: f32| {
        if step == 0.0 {
            value
        } else {
            (value / step).round() * step
        }
    };

    Vec3::new(
        snap(point.x, grid.x),
        snap(point.y, grid.y),
        snap(point.z, grid.z),
    )
}

/// Derives the boundary polygon of every side from the arrangement of all
/// side planes. Coincident duplicate planes collapse into one effective
/// boundary; sides that end up with fewer than 3 points are absorbed and
/// yield no face.
fn derive_faces(sides: &[Side], settings: &GeometrySettings) -> Vec<Face> {
    // coincident duplicates would derive identical overlapping polygons,
    // only the first of them stays active
    let mut active = vec![true; sides.len()];
    for i in 1..sides.len() {
        for j in 0..i {
            if active[j]
                && relative_eq!(
                    sides[i].plane.normal,
                    sides[j].plane.normal,
                    epsilon = settings.epsilon
                )
                && abs_diff_eq!(
                    sides[i].plane.distance,
                    sides[j].plane.distance,
                    epsilon = settings.cut_threshold
                )
            {
                active[i] = false;
                break;
            }
        }
    }

    let mut side_points: Vec<Vec<Vec3>> = vec![Vec::new(); sides.len()];

    for (i1, i2, i3) in (0..sides.len()).tuple_combinations() {
        if !active[i1] || !active[i2] || !active[i3] {
            continue;
        }

        let Some(point) = Plane::intersect(
            &sides[i1].plane,
            &sides[i2].plane,
            &sides[i3].plane,
            settings.epsilon,
        ) else {
            continue;
        };

        // check if the candidate vertice is outside the brush
        if sides
            .iter()
            .enumerate()
            .filter(|&(i, _)| active[i] && i != i1 && i != i2 && i != i3)
            .any(|(_, side)| side.plane.distance_to_point(point) > settings.cut_threshold)
        {
            continue;
        }

        for side_i in [i1, i2, i3] {
            let points = &mut side_points[side_i];
            // check if the vertice already exists
            if !points
                .iter()
                .any(|&p| relative_eq!(p, point, epsilon = settings.epsilon))
            {
                points.push(point);
            }
        }
    }

    side_points
        .into_iter()
        .enumerate()
        .filter(|(_, points)| points.len() >= 3)
        .map(|(side_i, mut points)| {
            geometry::sort_polygon(&mut points, sides[side_i].plane.normal, |&p| p);
            Face {
                side: side_i,
                points,
            }
        })
        .collect()
}

/// Whether the derived faces form a closed polyhedron: the area-weighted
/// normals of a closed surface sum to zero. An open (unbounded) side set
/// fails this and is degraded to empty geometry by the caller.
fn faces_enclose_volume(faces: &[Face], epsilon: f32) -> bool {
    let mut area_sum = Vec3::ZERO;
    let mut total_area = 0.0;

    for face in faces {
        let mut area_vec = Vec3::ZERO;
        for (a, b) in face.points.iter().copied().circular_tuple_windows() {
            area_vec += a.cross(b);
        }
        area_vec *= 0.5;

        area_sum += area_vec;
        total_area += area_vec.length();
    }

    total_area > 0.0 && area_sum.length() <= (total_area * epsilon).max(epsilon)
}

fn emit_flat_face(mesh: &mut BrushMesh, side: &Side, points: &[Vec3]) {
    let base = mesh.vertices.len() as u32;
    let normal = side.plane.normal;

    for &point in points {
        mesh.vertices.push(VertexSolid {
            position: point,
            normal,
            uv: side.project_uv(point).unwrap_or(Vec2::ZERO),
            color: RGBA8::new(255, 255, 255, 255),
        });
    }

    for i in 1..points.len() as u32 - 1 {
        mesh.indices.extend_from_slice(&[base, base + i, base + i + 1]);
    }
}

fn emit_displaced_face(
    mesh: &mut BrushMesh,
    side: &Side,
    disp: &DispInfo,
    face: &Face,
) -> Result<(), BrushError> {
    let corners: [Vec3; 4] =
        face.points
            .as_slice()
            .try_into()
            .map_err(|_| BrushError::InvalidDisplacement {
                side: face.side,
                vertices: face.points.len(),
            })?;

    let corners = disp.order_corners(corners, |corner| corner);
    let corner_uvs = corners.map(|corner| side.project_uv(corner).unwrap_or(Vec2::ZERO));

    let positions = disp.grid_positions(corners, side.plane.normal);
    let uvs = disp.grid_uvs(corner_uvs);
    let normals = DispInfo::grid_normals(&positions, side.plane.normal);

    let dimension = disp.dimension();
    let base = mesh.vertices.len() as u32;

    for ((row_i, col_i), &position) in positions.indexed_iter() {
        let alpha = disp.alpha_at(row_i, col_i).clamp(0.0, 255.0) as u8;

        mesh.vertices.push(VertexSolid {
            position,
            normal: normals[(row_i, col_i)],
            uv: uvs[(row_i, col_i)],
            color: RGBA8::new(255, 255, 255, alpha),
        });
    }

    for nodes in disp.triangle_nodes() {
        for (row_i, col_i) in nodes {
            mesh.indices.push(base + (row_i * dimension + col_i) as u32);
        }
    }

    Ok(())
}
