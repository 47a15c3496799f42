use glam::Vec3;
use itertools::Itertools;

use crate::types::Plane;

/// How the texture axes of a newly constructed side are seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureAlignment {
    /// Use the canonical axis table unmodified.
    World,
    /// Recompute the axes as cross products with the plane normal so they
    /// stay orthogonal to it for non-axis-aligned planes.
    Face,
}

/// Tunable parameters for brush geometry derivation. Passed explicitly into
/// construction and meshing so geometry stays a pure function of its inputs.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct GeometrySettings {
    pub epsilon: f32,
    pub cut_threshold: f32,
    pub texture_alignment: TextureAlignment,
}

impl GeometrySettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epsilon(&mut self, epsilon: f32) {
        self.epsilon = epsilon;
    }

    pub fn cut_threshold(&mut self, cut_threshold: f32) {
        self.cut_threshold = cut_threshold;
    }

    pub fn texture_alignment(&mut self, alignment: TextureAlignment) {
        self.texture_alignment = alignment;
    }
}

impl Default for GeometrySettings {
    fn default() -> Self {
        Self {
            epsilon: 1e-3,
            cut_threshold: 1e-3,
            texture_alignment: TextureAlignment::World,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn polygon_center<I>(polygon: I) -> Vec3
where
    I: Iterator<Item = Vec3> + ExactSizeIterator,
{
    let len = polygon.len() as f32;
    polygon.fold(Vec3::ZERO, |a, b| a + b) / len
}

/// Newell's-method polygon normal.
pub(crate) fn polygon_normal<I>(polygon: I) -> Vec3
where
    I: Clone + Iterator<Item = Vec3> + ExactSizeIterator,
{
    let center = polygon_center(polygon.clone());
    let mut normal = Vec3::ZERO;

    for (a, b) in polygon.circular_tuple_windows() {
        normal += (a - center).cross(b - center);
    }

    normal.normalize()
}

/// Right-handed signed angle between vectors, based on a normal vector.
/// Returns an angle between [-PI, PI] radians.
pub(crate) fn signed_angle(n: Vec3, a: Vec3, b: Vec3) -> f32 {
    f32::atan2(a.cross(b).dot(n), a.dot(b))
}

/// Sorts polygon vertices into a consistent ccw winding around their center,
/// viewed against the given normal.
pub(crate) fn sort_polygon<T>(polygon: &mut [T], normal: Vec3, get_vert: impl Fn(&T) -> Vec3) {
    if polygon.len() < 3 {
        return;
    }

    let center = polygon_center(polygon.iter().map(&get_vert));

    for i in 0..polygon.len() - 2 {
        let vertice = get_vert(&polygon[i]);
        let to_current = (vertice - center).normalize();
        let Some(filter_plane) = Plane::from_points(vertice, center, center + normal) else {
            continue;
        };

        if let Some((next_idx, _)) = polygon[i + 1..]
            .iter()
            .enumerate()
            .filter(|(_, vi)| filter_plane.distance_to_point(get_vert(vi)) >= 0.0)
            .map(|(i, vi)| {
                let to_candidate = (get_vert(vi) - center).normalize();
                let dot = to_current.dot(to_candidate);
                (i, dot)
            })
            // max because smaller angle -> bigger dot product
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        {
            polygon.swap(i + 1, i + 1 + next_idx);
        }
    }

    // reverse if the normal is facing the wrong way
    if polygon_normal(polygon.iter().map(&get_vert)).dot(normal) < 0.0 {
        polygon.reverse();
    }
}

/// Signed volume contribution of a fan-triangulated face, for the
/// divergence-theorem volume of a closed ccw-wound polyhedron.
pub(crate) fn face_volume_contribution<I>(polygon: I) -> f32
where
    I: Clone + Iterator<Item = Vec3> + ExactSizeIterator,
{
    let mut iter = polygon;
    let Some(first) = iter.next() else {
        return 0.0;
    };

    iter.tuple_windows()
        .map(|(b, c)| first.dot(b.cross(c)) / 6.0)
        .sum()
}
