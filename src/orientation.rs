use glam::Vec3;

/// The face of an enclosing cube a plane normal is closest to.
/// Seeds the canonical texture projection axes of a new side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Floor,
    Ceiling,
    NorthWall,
    SouthWall,
    EastWall,
    WestWall,
}

impl Orientation {
    /// Classifies a plane normal into a canonical orientation.
    /// Returns `None` for degenerate normals, which downstream treats as
    /// "leave the texture axes zeroed".
    #[must_use]
    pub fn classify(normal: Vec3) -> Option<Self> {
        if normal.length_squared() < 1e-8 {
            return None;
        }

        let candidates = [
            (Orientation::Floor, Vec3::Z),
            (Orientation::Ceiling, -Vec3::Z),
            (Orientation::NorthWall, Vec3::Y),
            (Orientation::SouthWall, -Vec3::Y),
            (Orientation::EastWall, Vec3::X),
            (Orientation::WestWall, -Vec3::X),
        ];

        let mut best = None;
        let mut best_dot = f32::MIN;

        for (orientation, axis) in candidates {
            let dot = normal.dot(axis);
            if dot > best_dot {
                best_dot = dot;
                best = Some(orientation);
            }
        }

        best
    }

    /// Canonical "down" direction, the seed for the V axis.
    #[must_use]
    pub fn down(self) -> Vec3 {
        match self {
            Orientation::Floor | Orientation::Ceiling => Vec3::new(0.0, -1.0, 0.0),
            _ => Vec3::new(0.0, 0.0, -1.0),
        }
    }

    /// Canonical "right" direction, the seed for the U axis.
    #[must_use]
    pub fn right(self) -> Vec3 {
        match self {
            Orientation::EastWall | Orientation::WestWall => Vec3::Y,
            _ => Vec3::X,
        }
    }
}
