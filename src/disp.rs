#![allow(clippy::cast_precision_loss)]

use glam::{Vec2, Vec3};
use ndarray::Array2;

use crate::solid::BrushError;

pub const MIN_POWER: u8 = 1;
pub const MAX_POWER: u8 = 4;

/// A power-of-two height field layered on one quad side of a solid, turning
/// its flat face into deformable terrain.
///
/// Per grid node it stores a free displacement offset, a displacement
/// direction with a distance along it, and a material blend alpha. The
/// subdivision scheme is a regular bilinear grid over the face's corners.
#[derive(Debug, Clone, PartialEq)]
pub struct DispInfo {
    power: u8,
    /// World position of the face corner the grid rows start from.
    pub start_position: Vec3,
    /// Uniform offset along the face normal applied to every node.
    pub elevation: f32,
    pub offsets: Array2<Vec3>,
    pub normals: Array2<Vec3>,
    pub distances: Array2<f32>,
    pub alphas: Array2<f32>,
}

impl DispInfo {
    /// Creates a flat displacement of the given subdivision power.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the power is outside `1..=4`.
    pub fn new(power: u8, start_position: Vec3) -> Result<Self, BrushError> {
        if !(MIN_POWER..=MAX_POWER).contains(&power) {
            return Err(BrushError::InvalidDispPower { power });
        }

        let dimension = Self::calculate_dimension(power);

        Ok(Self {
            power,
            start_position,
            elevation: 0.0,
            offsets: Array2::default((dimension, dimension)),
            normals: Array2::default((dimension, dimension)),
            distances: Array2::default((dimension, dimension)),
            alphas: Array2::default((dimension, dimension)),
        })
    }

    fn calculate_dimension(power: u8) -> usize {
        2_usize.pow(power.into()) + 1
    }

    #[must_use]
    pub fn power(&self) -> u8 {
        self.power
    }

    /// Nodes per grid side.
    #[must_use]
    pub fn dimension(&self) -> usize {
        Self::calculate_dimension(self.power)
    }

    #[must_use]
    pub fn offset_at(&self, row: usize, col: usize) -> Vec3 {
        self.offsets[(row, col)]
    }

    #[must_use]
    pub fn normal_at(&self, row: usize, col: usize) -> Vec3 {
        self.normals[(row, col)]
    }

    #[must_use]
    pub fn distance_at(&self, row: usize, col: usize) -> f32 {
        self.distances[(row, col)]
    }

    #[must_use]
    pub fn alpha_at(&self, row: usize, col: usize) -> f32 {
        self.alphas[(row, col)]
    }

    pub fn set_offset(&mut self, row: usize, col: usize, offset: Vec3) {
        self.offsets[(row, col)] = offset;
    }

    pub fn set_normal(&mut self, row: usize, col: usize, normal: Vec3) {
        self.normals[(row, col)] = normal;
    }

    pub fn set_distance(&mut self, row: usize, col: usize, distance: f32) {
        self.distances[(row, col)] = distance;
    }

    pub fn set_alpha(&mut self, row: usize, col: usize, alpha: f32) {
        self.alphas[(row, col)] = alpha;
    }

    /// Rotates the face's corner loop so the corner closest to
    /// `start_position` comes first. The loop order is preserved.
    pub(crate) fn order_corners<T: Copy>(&self, corners: [T; 4], position: impl Fn(T) -> Vec3) -> [T; 4] {
        let start_i = (0..4)
            .min_by(|&a, &b| {
                position(corners[a])
                    .distance(self.start_position)
                    .total_cmp(&position(corners[b]).distance(self.start_position))
            })
            .expect("corner range is never empty");

        [
            corners[start_i],
            corners[(start_i + 1) % 4],
            corners[(start_i + 2) % 4],
            corners[(start_i + 3) % 4],
        ]
    }

    /// Displaced node positions over an already ordered corner loop
    /// `[top left, top right, bottom right, bottom left]`.
    pub(crate) fn grid_positions(&self, corners: [Vec3; 4], face_normal: Vec3) -> Array2<Vec3> {
        let [top_left, top_right, btm_right, btm_left] = corners;

        let dimension = self.dimension();
        let last_i = dimension - 1;

        let mut positions = Array2::default((dimension, dimension));

        for ((row_i, col_i), position) in positions.indexed_iter_mut() {
            let row_blend = row_i as f32 / last_i as f32;
            let col_blend = col_i as f32 / last_i as f32;

            let left = top_left.lerp(btm_left, row_blend);
            let right = top_right.lerp(btm_right, row_blend);
            let base = left.lerp(right, col_blend);

            *position = base
                + self.offsets[(row_i, col_i)]
                + self.distances[(row_i, col_i)] * self.normals[(row_i, col_i)]
                + self.elevation * face_normal;
        }

        positions
    }

    /// Bilinearly interpolated node uvs from the ordered corner uvs.
    pub(crate) fn grid_uvs(&self, corner_uvs: [Vec2; 4]) -> Array2<Vec2> {
        let [top_left, top_right, btm_right, btm_left] = corner_uvs;

        let dimension = self.dimension();
        let last_i = dimension - 1;

        let mut uvs = Array2::default((dimension, dimension));

        for ((row_i, col_i), uv) in uvs.indexed_iter_mut() {
            let row_blend = row_i as f32 / last_i as f32;
            let col_blend = col_i as f32 / last_i as f32;

            let left = top_left.lerp(btm_left, row_blend);
            let right = top_right.lerp(btm_right, row_blend);
            *uv = left.lerp(right, col_blend);
        }

        uvs
    }

    /// Shading normals from the displaced grid, via neighbor differences.
    /// Oriented to agree with the face normal.
    pub(crate) fn grid_normals(positions: &Array2<Vec3>, face_normal: Vec3) -> Array2<Vec3> {
        let (rows, cols) = positions.dim();
        let mut normals = Array2::default((rows, cols));

        for ((row_i, col_i), normal) in normals.indexed_iter_mut() {
            let row_prev = row_i.saturating_sub(1);
            let row_next = (row_i + 1).min(rows - 1);
            let col_prev = col_i.saturating_sub(1);
            let col_next = (col_i + 1).min(cols - 1);

            let along_rows = positions[(row_next, col_i)] - positions[(row_prev, col_i)];
            let along_cols = positions[(row_i, col_next)] - positions[(row_i, col_prev)];

            let cross = along_cols.cross(along_rows);
            *normal = if cross.length_squared() < 1e-12 {
                face_normal
            } else if cross.dot(face_normal) < 0.0 {
                -cross.normalize()
            } else {
                cross.normalize()
            };
        }

        normals
    }

    /// Triangle corner coordinates for every grid cell, with the diagonal
    /// alternating in a checkerboard pattern.
    pub(crate) fn triangle_nodes(&self) -> Vec<[(usize, usize); 3]> {
        let dimension = self.dimension();
        let mut triangles = Vec::with_capacity(2 * (dimension - 1).pow(2));

        for r_i in 0..dimension - 1 {
            for c_i in 0..dimension - 1 {
                if r_i % 2 == c_i % 2 {
                    triangles.push([(r_i + 1, c_i), (r_i, c_i), (r_i + 1, c_i + 1)]);
                    triangles.push([(r_i, c_i), (r_i, c_i + 1), (r_i + 1, c_i + 1)]);
                } else {
                    triangles.push([(r_i + 1, c_i), (r_i, c_i), (r_i, c_i + 1)]);
                    triangles.push([(r_i + 1, c_i), (r_i, c_i + 1), (r_i + 1, c_i + 1)]);
                }
            }
        }

        triangles
    }
}
