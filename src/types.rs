use std::sync::Arc;

use approx::abs_diff_eq;
use glam::{Mat4, Vec3};

/// A plane defined by a unit normal vector and a signed distance to the origin.
/// Points on the plane satisfy `normal.dot(point) == distance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    /// `normal` must be normalized.
    #[must_use]
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let distance = point.dot(normal);
        Self { normal, distance }
    }

    /// Builds a plane from three points in ccw winding order, the normal
    /// facing towards the viewer. Returns `None` for degenerate triangles.
    #[must_use]
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Option<Self> {
        let normal = (b - a).cross(c - a);
        if abs_diff_eq!(normal, Vec3::ZERO, epsilon = 1e-6) {
            return None;
        }
        let normal = normal.normalize();
        Some(Self {
            normal,
            distance: a.dot(normal),
        })
    }

    #[must_use]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.distance
    }

    /// A point on the plane, used when refitting after a transform.
    #[must_use]
    pub fn point(&self) -> Vec3 {
        self.normal * self.distance
    }

    pub fn classify_point(&self, point: Vec3, epsilon: f32) -> PointClassification {
        let distance = self.distance_to_point(point);

        if distance > epsilon {
            PointClassification::Front
        } else if distance < -epsilon {
            PointClassification::Back
        } else {
            PointClassification::OnPlane
        }
    }

    pub fn classify_polygon<I>(&self, polygon: I, epsilon: f32) -> PolygonClassification
    where
        I: Iterator<Item = Vec3> + ExactSizeIterator,
    {
        let points_len = polygon.len();
        let mut points_front = 0_usize;
        let mut points_back = 0_usize;
        let mut points_on_plane = 0_usize;

        for point in polygon {
            match self.classify_point(point, epsilon) {
                PointClassification::Front => points_front += 1,
                PointClassification::Back => points_back += 1,
                PointClassification::OnPlane => points_on_plane += 1,
            }
        }

        if points_front == points_len {
            return PolygonClassification::Front;
        }
        if points_back == points_len {
            return PolygonClassification::Back;
        }
        if points_on_plane == points_len {
            return PolygonClassification::OnPlane;
        }

        PolygonClassification::Spanning
    }

    /// Intersection point of three planes.
    /// Returns `None` when any two planes are parallel or the normals are
    /// linearly dependent, ie. there is no unique intersection point.
    #[must_use]
    pub fn intersect(a: &Plane, b: &Plane, c: &Plane, epsilon: f32) -> Option<Vec3> {
        let denominator = a.normal.dot(b.normal.cross(c.normal));
        if abs_diff_eq!(denominator, 0.0, epsilon = epsilon) {
            return None;
        }
        Some(
            (a.distance * b.normal.cross(c.normal)
                + b.distance * c.normal.cross(a.normal)
                + c.distance * a.normal.cross(b.normal))
                / denominator,
        )
    }

    /// Applies an affine transform: the normal goes through the
    /// inverse-transpose of the matrix and is renormalized, the distance is
    /// refit so the plane still passes through the transformed points.
    /// The matrix must be invertible.
    #[must_use]
    pub fn transformed(&self, matrix: Mat4) -> Self {
        let normal = (matrix.inverse().transpose() * self.normal.extend(0.0))
            .truncate()
            .normalize();
        let point = matrix.transform_point3(self.point());

        Self {
            normal,
            distance: normal.dot(point),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointClassification {
    Front,
    Back,
    OnPlane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonClassification {
    Front,
    Back,
    OnPlane,
    Spanning,
}

/// One texture projection axis of a side: a direction and a texel offset
/// along it. An all-zero `axis` means the side has no valid projection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextureAxis {
    pub axis: Vec3,
    pub offset: f32,
}

impl TextureAxis {
    #[must_use]
    pub fn new(axis: Vec3) -> Self {
        Self { axis, offset: 0.0 }
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.axis == Vec3::ZERO
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[must_use]
    pub fn from_point(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    #[must_use]
    pub fn extended(self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) / 2.0
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// A material resolved by the external asset system. Sides hold these behind
/// `Arc` so a solid can keep a material alive past its defining file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    name: String,
    width: u32,
    height: u32,
    no_draw: bool,
}

impl Material {
    #[must_use]
    pub fn new(name: impl Into<String>, width: u32, height: u32, no_draw: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            width,
            height,
            no_draw,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn no_draw(&self) -> bool {
        self.no_draw
    }
}
