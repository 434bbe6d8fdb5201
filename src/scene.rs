//! Minimal scene graph for overlay assets.
//!
//! Only what the anchoring engine needs: named meshes with bounds and a
//! material, nodes with a transform, and bounding-box queries. Geometry and
//! textures are the renderer's business.

use crate::pose_estimation::FacialPose;
use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    #[must_use]
    pub const fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Box of the given size centered on the origin
    #[must_use]
    pub fn centered(size: Vector3<f64>) -> Self {
        let half = size / 2.0;
        Self::new(Point3::from(-half), Point3::from(half))
    }

    #[must_use]
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// The eight corners
    #[must_use]
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }

    /// Bounds of this box after an affine transform
    #[must_use]
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Self {
        let corners = self.corners().map(|c| matrix.transform_point(&c));
        corners[1..].iter().fold(Self::new(corners[0], corners[0]), |acc, c| {
            Self::new(acc.min.inf(c), acc.max.sup(c))
        })
    }
}

/// Surface appearance flags the engine toggles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub opacity: f32,
    pub transparent: bool,
    pub depth_write: bool,
    /// Display tint (RGB)
    #[serde(default)]
    pub color: Option<[u8; 3]>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            transparent: false,
            depth_write: true,
            color: None,
        }
    }
}

impl Material {
    /// Fully opaque, depth-writing
    pub fn make_opaque(&mut self) {
        self.opacity = 1.0;
        self.transparent = false;
        self.depth_write = true;
    }
}

/// A named mesh with local bounds
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub bounds: Aabb,
    pub material: Material,
    pub visible: bool,
}

impl Mesh {
    #[must_use]
    pub fn new(name: impl Into<String>, bounds: Aabb) -> Self {
        Self {
            name: name.into(),
            bounds,
            material: Material::default(),
            visible: true,
        }
    }
}

/// Position, Euler rotation (applied Y, then X, then Z) and per-axis scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f64>,
    /// Euler angles in radians about x, y, z
    pub rotation: Vector3<f64>,
    pub scale: Vector3<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Vector3::zeros(),
            scale: Vector3::repeat(1.0),
        }
    }
}

impl Transform {
    /// Rotation with intrinsic Y-X-Z order
    #[must_use]
    pub fn rotation_matrix(&self) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&Vector3::y_axis(), self.rotation.y)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), self.rotation.x)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), self.rotation.z)
    }

    /// Local-to-parent matrix: translate · rotate · scale
    #[must_use]
    pub fn matrix(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&self.position)
            * self.rotation_matrix().to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }

    /// Root transform for a facial pose.
    ///
    /// The overlay leans forward by `pitch_tilt` so eyewear sits on the nose
    /// bridge; yaw is negated for the mirrored view.
    #[must_use]
    pub fn from_pose(pose: &FacialPose, pitch_tilt: f64) -> Self {
        Self {
            position: pose.position,
            rotation: Vector3::new(-pose.rotation.pitch + pitch_tilt, -pose.rotation.yaw, pose.rotation.roll),
            scale: Vector3::repeat(pose.scale),
        }
    }
}

/// A node holding meshes and child nodes
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub meshes: Vec<Mesh>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            visible: true,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.meshes.push(mesh);
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Bounds of all meshes in this node's local space, `None` when empty
    #[must_use]
    pub fn local_bounds(&self) -> Option<Aabb> {
        let own = self.meshes.iter().map(|m| m.bounds);
        let children = self.children.iter().filter_map(Self::bounds_in_parent);
        own.chain(children).reduce(|acc, b| acc.union(&b))
    }

    /// Bounds in the parent's space, including this node's own transform
    #[must_use]
    pub fn bounds_in_parent(&self) -> Option<Aabb> {
        self.local_bounds().map(|b| b.transformed(&self.transform.matrix()))
    }

    /// Visit every mesh in this subtree
    pub fn for_each_mesh_mut(&mut self, f: &mut impl FnMut(&mut Mesh)) {
        for mesh in &mut self.meshes {
            f(mesh);
        }
        for child in &mut self.children {
            child.for_each_mesh_mut(f);
        }
    }

    /// Visit every visible mesh with its accumulated world matrix
    pub fn for_each_visible_mesh(&self, parent: &Matrix4<f64>, f: &mut impl FnMut(&Mesh, &Matrix4<f64>)) {
        if !self.visible {
            return;
        }
        let world = parent * self.transform.matrix();
        for mesh in self.meshes.iter().filter(|m| m.visible) {
            f(mesh, &world);
        }
        for child in &self.children {
            child.for_each_visible_mesh(&world, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose_estimation::HeadRotation;
    use std::f64::consts::PI;

    #[test]
    fn test_bounds_include_scale() {
        let mut node = SceneNode::new("glasses").with_mesh(Mesh::new("frame", Aabb::centered(Vector3::new(140.0, 40.0, 20.0))));
        assert!((node.bounds_in_parent().unwrap().size().x - 140.0).abs() < 1e-9);

        node.transform.scale = Vector3::repeat(0.5);
        assert!((node.bounds_in_parent().unwrap().size().x - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_child_bounds_merged() {
        let child = {
            let mut node = SceneNode::new("lens").with_mesh(Mesh::new("lens", Aabb::centered(Vector3::new(10.0, 10.0, 10.0))));
            node.transform.position = Vector3::new(100.0, 0.0, 0.0);
            node
        };
        let node = SceneNode::new("root")
            .with_mesh(Mesh::new("frame", Aabb::centered(Vector3::new(20.0, 20.0, 20.0))))
            .with_child(child);
        let bounds = node.local_bounds().unwrap();
        assert!((bounds.max.x - 105.0).abs() < 1e-9);
        assert!((bounds.min.x + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_node_has_no_bounds() {
        assert!(SceneNode::new("empty").bounds_in_parent().is_none());
    }

    #[test]
    fn test_half_turn_about_y_mirrors_x() {
        let mut transform = Transform::default();
        transform.rotation.y = PI;
        let p = transform.matrix().transform_point(&Point3::new(1.0, 2.0, 3.0));
        assert!((p.x + 1.0).abs() < 1e-9);
        assert!((p.y - 2.0).abs() < 1e-9);
        assert!((p.z + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_transform_from_pose() {
        let pose = FacialPose {
            position: Vector3::new(10.0, -20.0, 0.002),
            rotation: HeadRotation::new(0.2, 0.1, -0.05),
            scale: 1.5,
        };
        let transform = Transform::from_pose(&pose, PI / 7.0);
        assert!((transform.rotation.x - (-0.1 + PI / 7.0)).abs() < 1e-12);
        assert!((transform.rotation.y + 0.2).abs() < 1e-12);
        assert!((transform.rotation.z + 0.05).abs() < 1e-12);
        assert_eq!(transform.scale, Vector3::repeat(1.5));
        assert_eq!(transform.position, pose.position);
    }

    #[test]
    fn test_hidden_nodes_skip_meshes() {
        let mut node = SceneNode::new("root").with_mesh(Mesh::new("a", Aabb::centered(Vector3::repeat(1.0))));
        let mut count = 0;
        node.for_each_visible_mesh(&Matrix4::identity(), &mut |_, _| count += 1);
        assert_eq!(count, 1);

        node.visible = false;
        count = 0;
        node.for_each_visible_mesh(&Matrix4::identity(), &mut |_, _| count += 1);
        assert_eq!(count, 0);
    }
}
