use approx::assert_relative_eq;
use glam::{Mat4, Vec2, Vec3};

use super::*;
use crate::{
    mesh::Allocation,
    select::{BrushEntity, Selection},
};

fn test_material(name: &str) -> Arc<Material> {
    Material::new(name, 1024, 1024, false)
}

fn test_cube(size: f32) -> Solid {
    Solid::cube(
        SolidId(0),
        &test_material("dev/dev_measuregeneric01"),
        Vec3::splat(size),
        Mat4::IDENTITY,
        &GeometrySettings::default(),
    )
}

fn cutting_side(normal: Vec3, distance: f32) -> Side {
    Side::new(
        Plane { normal, distance },
        test_material("tools/toolsclip"),
        &GeometrySettings::default(),
    )
}

#[derive(Default)]
struct CountingAllocator {
    next: u64,
    freed: Vec<Allocation>,
}

impl MeshAllocator for CountingAllocator {
    fn allocate(
        &mut self,
        _vertices: &[VertexSolid],
        _indices: &[u32],
        _material: &Arc<Material>,
    ) -> Option<Allocation> {
        self.next += 1;
        Some(Allocation::new(self.next))
    }

    fn free(&mut self, allocation: Allocation) {
        self.freed.push(allocation);
    }
}

#[test]
fn cube_face_derivation() {
    let settings = GeometrySettings::default();
    let mut solid = test_cube(64.0);

    solid.update_mesh(&settings).unwrap();

    assert_eq!(solid.faces().len(), 6);
    for face in solid.faces() {
        assert_eq!(face.points().len(), 4);

        // every derived point must lie inside or on every side
        for &point in face.points() {
            for side in solid.sides() {
                assert!(
                    side.plane.distance_to_point(point) <= settings.cut_threshold,
                    "point {point} is outside side {:?}",
                    side.plane,
                );
            }
        }
    }

    let bounds = solid.bounds().unwrap();
    assert_relative_eq!(bounds.min, Vec3::splat(-32.0), epsilon = 1e-3);
    assert_relative_eq!(bounds.max, Vec3::splat(32.0), epsilon = 1e-3);

    assert_relative_eq!(solid.volume(), 262_144.0, max_relative = 1e-4);
}

#[test]
fn cube_mesh_layout() {
    let mut solid = test_cube(64.0);

    solid.update_mesh(&GeometrySettings::default()).unwrap();

    // one shared material, one mesh
    assert_eq!(solid.meshes().len(), 1);

    let mesh = &solid.meshes()[0];
    assert_eq!(mesh.material.name(), "dev/dev_measuregeneric01");
    assert_eq!(mesh.vertices.len(), 24);
    assert_eq!(mesh.indices.len(), 36);
    assert_eq!(mesh.alloc, None);
    assert_eq!(mesh.solid(), SolidId(0));
}

#[test]
fn meshes_group_by_material() {
    let settings = GeometrySettings::default();
    let mut sides = cube_sides(
        &test_material("dev/dev_measuregeneric01"),
        Vec3::splat(64.0),
        Mat4::IDENTITY,
        &settings,
    );
    sides[4].material = test_material("nature/dirtfloor001");
    sides[5].material = test_material("nature/dirtfloor001");

    let mut solid = Solid::new(SolidId(0), sides);
    solid.update_mesh(&settings).unwrap();

    assert_eq!(solid.meshes().len(), 2);
    // first-encountered side order determines mesh order
    assert_eq!(solid.meshes()[0].material.name(), "dev/dev_measuregeneric01");
    assert_eq!(solid.meshes()[1].material.name(), "nature/dirtfloor001");
    assert_eq!(solid.meshes()[0].vertices.len(), 16);
    assert_eq!(solid.meshes()[1].vertices.len(), 8);
}

#[test]
fn clip_keeps_back_half() {
    let settings = GeometrySettings::default();
    let mut solid = test_cube(64.0);

    solid.clip(cutting_side(Vec3::X, 0.0), &settings);

    // the +x side was discarded, the cutting side replaces it
    assert_eq!(solid.sides().len(), 6);
    assert!(solid.faces().is_empty());
    assert_eq!(solid.bounds(), None);

    solid.update_mesh(&settings).unwrap();

    assert_eq!(solid.faces().len(), 6);
    assert_relative_eq!(solid.volume(), 131_072.0, max_relative = 1e-4);

    let bounds = solid.bounds().unwrap();
    assert_relative_eq!(bounds.min, Vec3::new(-32.0, -32.0, -32.0), epsilon = 1e-3);
    assert_relative_eq!(bounds.max, Vec3::new(0.0, 32.0, 32.0), epsilon = 1e-3);
}

#[test]
fn clip_outside_is_noop() {
    let settings = GeometrySettings::default();
    let mut solid = test_cube(64.0);

    solid.clip(cutting_side(Vec3::X, 100.0), &settings);

    // nothing was in front of the plane, only the cut side was appended
    assert_eq!(solid.sides().len(), 7);

    solid.update_mesh(&settings).unwrap();

    // the appended side is absorbed: it contributes no face
    assert_eq!(solid.faces().len(), 6);
    assert_relative_eq!(solid.volume(), 262_144.0, max_relative = 1e-4);
}

#[test]
fn clip_can_discard_everything() {
    let settings = GeometrySettings::default();
    let mut solid = test_cube(64.0);

    solid.clip(cutting_side(Vec3::X, -100.0), &settings);

    assert_eq!(solid.sides().len(), 1);

    solid.update_mesh(&settings).unwrap();

    assert!(solid.faces().is_empty());
    assert_eq!(solid.bounds(), None);
    assert_relative_eq!(solid.volume(), 0.0);
}

#[test]
fn clip_is_idempotent() {
    let settings = GeometrySettings::default();
    let mut solid = test_cube(64.0);

    solid.clip(cutting_side(Vec3::X, 0.0), &settings);
    solid.update_mesh(&settings).unwrap();
    let volume_first = solid.volume();

    solid.clip(cutting_side(Vec3::X, 0.0), &settings);
    solid.update_mesh(&settings).unwrap();

    // the face on the cutting plane classifies on-plane, not in front,
    // and the repeated plane collapses into one boundary
    assert_eq!(solid.faces().len(), 6);
    assert_relative_eq!(solid.volume(), volume_first, max_relative = 1e-4);
}

#[test]
fn duplicate_plane_is_absorbed() {
    let settings = GeometrySettings::default();
    let mut sides = cube_sides(
        &test_material("dev/dev_measuregeneric01"),
        Vec3::splat(64.0),
        Mat4::IDENTITY,
        &settings,
    );
    sides.push(sides[0].clone());

    let mut solid = Solid::new(SolidId(0), sides);
    solid.update_mesh(&settings).unwrap();

    assert_eq!(solid.faces().len(), 6);
    assert_relative_eq!(solid.volume(), 262_144.0, max_relative = 1e-4);
}

#[test]
fn transform_translates_bounds() {
    let settings = GeometrySettings::default();
    let mut solid = test_cube(64.0);

    solid.transform(Mat4::from_translation(Vec3::new(16.0, 0.0, 0.0)));
    solid.update_mesh(&settings).unwrap();

    let bounds = solid.bounds().unwrap();
    assert_relative_eq!(bounds.min, Vec3::new(-16.0, -32.0, -32.0), epsilon = 1e-3);
    assert_relative_eq!(bounds.max, Vec3::new(48.0, 32.0, 32.0), epsilon = 1e-3);
}

#[test]
fn transform_round_trips() {
    let settings = GeometrySettings::default();
    let mut solid = test_cube(64.0);

    let matrix = Mat4::from_translation(Vec3::new(10.0, -4.0, 2.0)) * Mat4::from_rotation_z(0.3);

    solid.transform(matrix);
    solid.update_mesh(&settings).unwrap();
    assert_relative_eq!(solid.volume(), 262_144.0, max_relative = 1e-3);

    solid.transform(matrix.inverse());
    solid.update_mesh(&settings).unwrap();

    assert_relative_eq!(solid.volume(), 262_144.0, max_relative = 1e-3);

    let bounds = solid.bounds().unwrap();
    assert_relative_eq!(bounds.min, Vec3::splat(-32.0), epsilon = 1e-2);
    assert_relative_eq!(bounds.max, Vec3::splat(32.0), epsilon = 1e-2);
}

#[test]
fn align_to_grid_snaps_vertices() {
    let settings = GeometrySettings::default();
    let mut solid = test_cube(64.0);

    solid.transform(Mat4::from_translation(Vec3::new(3.0, 3.0, 3.0)));
    solid.align_to_grid(Vec3::new(8.0, 8.0, 0.0), &settings);
    solid.update_mesh(&settings).unwrap();

    let bounds = solid.bounds().unwrap();
    // x and y snap back onto the grid, the zero grid component leaves z
    assert_relative_eq!(bounds.min, Vec3::new(-32.0, -32.0, -29.0), epsilon = 1e-3);
    assert_relative_eq!(bounds.max, Vec3::new(32.0, 32.0, 35.0), epsilon = 1e-3);
}

#[test]
fn world_texture_axis_seeding() {
    let solid = test_cube(64.0);
    let sides = solid.sides();

    // +z floor
    assert_relative_eq!(sides[4].u_axis.axis, Vec3::X);
    assert_relative_eq!(sides[4].v_axis.axis, Vec3::new(0.0, -1.0, 0.0));
    // +y north wall
    assert_relative_eq!(sides[2].u_axis.axis, Vec3::X);
    assert_relative_eq!(sides[2].v_axis.axis, Vec3::new(0.0, 0.0, -1.0));
    // +x east wall
    assert_relative_eq!(sides[0].u_axis.axis, Vec3::Y);
    assert_relative_eq!(sides[0].v_axis.axis, Vec3::new(0.0, 0.0, -1.0));

    for side in sides {
        assert_relative_eq!(side.scale, Vec2::splat(DEFAULT_TEXTURE_SCALE));
        assert_eq!(side.u_axis.offset, 0.0);
    }
}

#[test]
fn face_texture_axes_stay_orthogonal() {
    let mut settings = GeometrySettings::default();
    settings.texture_alignment(TextureAlignment::Face);

    let normal = Vec3::new(1.0, 0.0, 1.0).normalize();
    let side = Side::new(
        Plane::from_point_normal(Vec3::ZERO, normal),
        test_material("nature/rockwall008"),
        &settings,
    );

    let u = side.u_axis.axis;
    let v = side.v_axis.axis;

    assert_relative_eq!(u.length(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(v.length(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(u.dot(normal), 0.0, epsilon = 1e-6);
    assert_relative_eq!(v.dot(normal), 0.0, epsilon = 1e-6);
    assert_relative_eq!(u.dot(v), 0.0, epsilon = 1e-6);
}

#[test]
fn degenerate_normal_has_no_projection() {
    let side = Side::new(
        Plane {
            normal: Vec3::ZERO,
            distance: 0.0,
        },
        test_material("dev/dev_measuregeneric01"),
        &GeometrySettings::default(),
    );

    assert!(!side.has_projection());
    assert_eq!(side.project_uv(Vec3::new(1.0, 2.0, 3.0)), None);
}

#[test]
fn uv_projection() {
    let solid = test_cube(64.0);
    // +z floor side, 1024x1024 texture at scale 0.25
    let side = &solid.sides()[4];

    let uv = side.project_uv(Vec3::new(32.0, 32.0, 32.0)).unwrap();
    assert_relative_eq!(uv, Vec2::new(0.125, -0.125), epsilon = 1e-6);
}

#[test]
fn displacement_meshing() {
    let settings = GeometrySettings::default();
    let mut solid = test_cube(64.0);

    let mut disp = DispInfo::new(2, Vec3::new(-32.0, -32.0, 32.0)).unwrap();
    for row_i in 0..disp.dimension() {
        for col_i in 0..disp.dimension() {
            disp.set_normal(row_i, col_i, Vec3::Z);
            disp.set_distance(row_i, col_i, 8.0);
        }
    }

    let mut sides = solid.sides().to_vec();
    sides[4] = sides[4].clone().with_disp(disp);
    solid = Solid::new(SolidId(0), sides);

    assert!(solid.has_displacement());
    solid.update_mesh(&settings).unwrap();

    assert_eq!(solid.meshes().len(), 1);
    let mesh = &solid.meshes()[0];

    // 5 flat quads and one 5x5 displaced grid
    assert_eq!(mesh.vertices.len(), 5 * 4 + 25);
    assert_eq!(mesh.indices.len(), 5 * 6 + 32 * 3);

    let max_z = mesh
        .vertices
        .iter()
        .map(|vertex| vertex.position.z)
        .fold(f32::MIN, f32::max);
    assert_relative_eq!(max_z, 40.0, epsilon = 1e-3);

    // bounds track the underlying brush faces, not the displaced terrain
    assert_relative_eq!(solid.bounds().unwrap().max.z, 32.0, epsilon = 1e-3);
}

#[test]
fn displacement_on_non_quad_falls_back_to_flat() {
    let settings = GeometrySettings::default();
    let mut solid = test_cube(64.0);

    let disp = DispInfo::new(2, Vec3::new(-32.0, -32.0, 32.0)).unwrap();
    let mut sides = solid.sides().to_vec();
    sides[4] = sides[4].clone().with_disp(disp);
    solid = Solid::new(SolidId(0), sides);

    // cut a corner off so the +z face becomes a pentagon
    let cut_normal = Vec3::new(1.0, 1.0, 0.0).normalize();
    solid.clip(cutting_side(cut_normal, 48.0 / 2.0_f32.sqrt()), &settings);

    let err = solid.update_mesh(&settings).unwrap_err();
    assert_eq!(
        err,
        BrushError::InvalidDisplacement {
            side: 4,
            vertices: 5
        }
    );

    // the solid stays consistent, the displaced side renders flat
    assert_eq!(solid.faces().len(), 7);
    assert!(solid.volume() < 262_144.0);
    assert!(!solid.meshes().is_empty());
}

#[test]
fn unbounded_side_set_yields_empty_geometry() {
    let settings = GeometrySettings::default();
    let mut sides = cube_sides(
        &test_material("dev/dev_measuregeneric01"),
        Vec3::splat(64.0),
        Mat4::IDENTITY,
        &settings,
    );
    // no +x side, the intersection is an open prism
    sides.remove(0);

    let mut solid = Solid::new(SolidId(0), sides);
    solid.update_mesh(&settings).unwrap();

    assert!(solid.faces().is_empty());
    assert_eq!(solid.bounds(), None);
    assert_relative_eq!(solid.volume(), 0.0);
}

#[test]
fn entity_lifecycle() {
    let settings = GeometrySettings::default();
    let mut entity = BrushEntity::new();
    let mut selection = Selection::new();
    let mut allocator = CountingAllocator::default();

    let id = entity.add_solid(cube_sides(
        &test_material("dev/dev_measuregeneric01"),
        Vec3::splat(64.0),
        Mat4::IDENTITY,
        &settings,
    ));

    let solid = entity.solid_mut(id).unwrap();
    solid.update_mesh(&settings).unwrap();
    solid.upload_meshes(&mut allocator);
    assert!(solid.meshes()[0].alloc.is_some());

    selection.select(id);
    assert!(entity.solid(id).unwrap().is_selected(&selection));

    assert!(entity.remove_solid(id, &mut selection, &mut allocator));
    assert_eq!(allocator.freed.len(), 1);
    assert!(selection.is_empty());
    assert!(entity.solids().is_empty());

    // stale handle
    assert!(!entity.remove_solid(id, &mut selection, &mut allocator));
}
