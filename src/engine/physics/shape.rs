// Collision shapes built from geometry

use anyhow::{bail, Result};
use glam::{Mat4, Vec3};
use rapier3d::prelude::{Point, Real, SharedShape};
use std::fmt;

use crate::engine::assets::GeometryData;
use crate::engine::fetch::Resource;
use crate::fatal;

/// How a shape is derived from geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Axis-aligned box fitted to the bounds
    Box,
    /// Sphere enclosing the bounds
    Sphere,
    /// Upright capsule fitted to the bounds
    Capsule,
    /// Upright cylinder fitted to the bounds
    Cylinder,
    /// Upright cone fitted to the bounds
    Cone,
    /// Convex hull of the positions
    ConvexHull,
    /// Exact triangle mesh, for static colliders
    TriangleMesh,
}

impl ShapeKind {
    /// Stable name, used as a load parameter in resource keys
    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Box => "box",
            ShapeKind::Sphere => "sphere",
            ShapeKind::Capsule => "capsule",
            ShapeKind::Cylinder => "cylinder",
            ShapeKind::Cone => "cone",
            ShapeKind::ConvexHull => "convex_hull",
            ShapeKind::TriangleMesh => "triangle_mesh",
        }
    }

    /// True for shapes centered on the bounds rather than the model origin
    fn is_fitted(self) -> bool {
        !matches!(self, ShapeKind::ConvexHull | ShapeKind::TriangleMesh)
    }
}

/// Physics collision shape
///
/// Fitted shapes are centered on their own origin, so the shape remembers the
/// offset from the model origin (the feet) to its center.
#[derive(Clone, Default)]
pub struct Shape {
    shape: Option<SharedShape>,
    kind: Option<ShapeKind>,
    center: Vec3,
}

fn points(geometry: &GeometryData) -> Vec<Point<Real>> {
    geometry
        .positions
        .iter()
        .map(|p| Point::new(p[0], p[1], p[2]))
        .collect()
}

impl Shape {
    pub fn new(geometry: &GeometryData, kind: ShapeKind) -> Result<Self> {
        if geometry.positions.is_empty() {
            bail!("Cannot build a {} shape from empty geometry", kind.name());
        }

        let (min, max) = geometry.bounds();
        let half = ((max - min) * 0.5).max(Vec3::splat(1e-3));
        let radius = half.x.max(half.z);

        let shape = match kind {
            ShapeKind::Box => SharedShape::cuboid(half.x, half.y, half.z),
            ShapeKind::Sphere => SharedShape::ball(half.max_element()),
            ShapeKind::Capsule => SharedShape::capsule_y((half.y - radius).max(0.0), radius),
            ShapeKind::Cylinder => SharedShape::cylinder(half.y, radius),
            ShapeKind::Cone => SharedShape::cone(half.y, radius),
            ShapeKind::ConvexHull => match SharedShape::convex_hull(&points(geometry)) {
                Some(shape) => shape,
                None => bail!("Degenerate convex hull over {} points", geometry.positions.len()),
            },
            ShapeKind::TriangleMesh => {
                if geometry.indices.is_empty() {
                    bail!("Triangle mesh shape needs indices");
                }
                geometry.validate()?;
                SharedShape::trimesh(points(geometry), geometry.indices.clone())
            }
        };

        let center = if kind.is_fitted() { (min + max) * 0.5 } else { Vec3::ZERO };
        Ok(Self {
            shape: Some(shape),
            kind: Some(kind),
            center,
        })
    }

    pub fn transfer(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn is_owning(&self) -> bool {
        self.shape.is_some()
    }

    /// The rapier shape. Using a moved-from shape is fatal.
    pub fn shared(&self) -> &SharedShape {
        match &self.shape {
            Some(shape) => shape,
            None => fatal!("Handle of a moved-from shape used"),
        }
    }

    pub fn kind(&self) -> Option<ShapeKind> {
        self.kind
    }

    /// Offset from the model origin to the shape center
    pub fn feet_to_center(&self) -> Mat4 {
        Mat4::from_translation(self.center)
    }

    /// Offset from the shape center back to the model origin
    pub fn center_to_feet(&self) -> Mat4 {
        Mat4::from_translation(-self.center)
    }

    /// Distance from the center down to the lowest point of the shape
    pub fn half_height(&self) -> f32 {
        match &self.shape {
            Some(shape) => {
                let aabb = shape.compute_local_aabb();
                -aabb.mins.y
            }
            None => 0.0,
        }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("kind", &self.kind)
            .field("center", &self.center)
            .field("owning", &self.is_owning())
            .finish()
    }
}

impl Resource for Shape {
    type Context = ();
}
