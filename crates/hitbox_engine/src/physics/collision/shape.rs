//! Collision box primitives
//!
//! A [`CollisionBox`] is either circular or rectangular. Its absolute
//! `position` and `angle` are always derived from the parent's transform plus
//! the box's local `offset` and `relative_angle`; root boxes own their position
//! and use `relative_angle` as their absolute angle.
//!
//! Narrow-phase tests use the separating axis theorem. The returned overlap is
//! the minimum translation that pushes `self` out of `other`.

use crate::foundation::math::utils::rotate_vec2;
use crate::foundation::math::{Aabb, Vec2};

/// Circular box dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularBox {
    /// Unscaled radius
    pub radius: f32,
}

/// Rectangular box dimensions and cached world-space geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectangularBox {
    /// Unscaled width (local X extent)
    pub width: f32,
    /// Unscaled height (local Y extent)
    pub height: f32,
    vertices: [Vec2; 4],
    axes: [Vec2; 2],
}

impl RectangularBox {
    /// Create a rectangle; geometry is filled in by the owning box's update
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            vertices: [Vec2::zeros(); 4],
            axes: [Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
        }
    }

    /// World-space corners, counter-clockwise from bottom-left
    pub fn vertices(&self) -> &[Vec2; 4] {
        &self.vertices
    }

    /// World-space edge normals (local X and Y axes)
    pub fn axes(&self) -> &[Vec2; 2] {
        &self.axes
    }

    fn refresh(&mut self, position: Vec2, angle: f32, scale: f32) {
        let half_width = self.width * scale * 0.5;
        let half_height = self.height * scale * 0.5;
        let corners = [
            Vec2::new(-half_width, -half_height),
            Vec2::new(half_width, -half_height),
            Vec2::new(half_width, half_height),
            Vec2::new(-half_width, half_height),
        ];
        for (vertex, corner) in self.vertices.iter_mut().zip(corners) {
            *vertex = position + rotate_vec2(corner, angle);
        }
        self.axes = [
            rotate_vec2(Vec2::new(1.0, 0.0), angle),
            rotate_vec2(Vec2::new(0.0, 1.0), angle),
        ];
    }
}

/// Shape variant of a collision box
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoxShape {
    /// Circle
    Circular(CircularBox),
    /// Oriented rectangle
    Rectangular(RectangularBox),
}

/// Narrow-phase output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    /// Whether the shapes intersect
    pub is_colliding: bool,
    /// Minimum translation that separates the tested box from the other one
    pub overlap: Vec2,
}

impl CollisionResult {
    /// Result for a pair that does not intersect
    pub fn none() -> Self {
        Self {
            is_colliding: false,
            overlap: Vec2::zeros(),
        }
    }

    fn hit(overlap: Vec2) -> Self {
        Self {
            is_colliding: true,
            overlap,
        }
    }
}

/// A positioned shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionBox {
    /// Absolute position
    pub position: Vec2,
    /// Absolute angle
    pub angle: f32,
    /// Angle relative to the parent (absolute for root boxes)
    pub relative_angle: f32,
    /// Offset from the parent's position, in the parent's rotated frame
    pub offset: Vec2,
    /// Multiplier for the shape's dimensions
    pub scale: f32,
    /// Shape variant
    pub shape: BoxShape,
}

impl CollisionBox {
    /// Circular box centered on `position`
    pub fn circular(position: Vec2, radius: f32) -> Self {
        Self::with_shape(position, BoxShape::Circular(CircularBox { radius }))
    }

    /// Axis-aligned (until rotated) rectangular box centered on `position`
    pub fn rectangular(position: Vec2, width: f32, height: f32) -> Self {
        Self::with_shape(position, BoxShape::Rectangular(RectangularBox::new(width, height)))
    }

    fn with_shape(position: Vec2, shape: BoxShape) -> Self {
        let mut collision_box = Self {
            position,
            angle: 0.0,
            relative_angle: 0.0,
            offset: Vec2::zeros(),
            scale: 1.0,
            shape,
        };
        collision_box.refresh_geometry();
        collision_box
    }

    /// Builder pattern: Set the offset from the parent
    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// Builder pattern: Set the relative angle
    pub fn with_relative_angle(mut self, relative_angle: f32) -> Self {
        self.relative_angle = relative_angle;
        self.angle = relative_angle;
        self.refresh_geometry();
        self
    }

    /// Builder pattern: Set the dimension scale
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self.refresh_geometry();
        self
    }

    /// Recompute the absolute transform from the parent's current transform
    pub fn update_from_parent(&mut self, parent_position: Vec2, parent_angle: f32) {
        self.position = parent_position + rotate_vec2(self.offset, parent_angle);
        self.angle = parent_angle + self.relative_angle;
        self.refresh_geometry();
    }

    /// Refresh a root box whose absolute angle is its relative angle
    pub fn update_as_root(&mut self) {
        self.angle = self.relative_angle;
        self.refresh_geometry();
    }

    /// Recompute cached rectangle vertices and axes
    pub fn refresh_geometry(&mut self) {
        if let BoxShape::Rectangular(rectangle) = &mut self.shape {
            rectangle.refresh(self.position, self.angle, self.scale);
        }
    }

    /// Move the box without changing its rotation
    pub fn translate(&mut self, delta: Vec2) {
        self.position += delta;
        self.refresh_geometry();
    }

    /// Scaled radius for circles
    pub fn scaled_radius(&self) -> Option<f32> {
        match &self.shape {
            BoxShape::Circular(circle) => Some(circle.radius * self.scale),
            BoxShape::Rectangular(_) => None,
        }
    }

    /// Minimum X of the axis-aligned bounds
    pub fn calculate_bounds_min_x(&self) -> f32 {
        match &self.shape {
            BoxShape::Circular(circle) => self.position.x - circle.radius * self.scale,
            BoxShape::Rectangular(rect) => rect.vertices.iter().map(|v| v.x).fold(f32::INFINITY, f32::min),
        }
    }

    /// Maximum X of the axis-aligned bounds
    pub fn calculate_bounds_max_x(&self) -> f32 {
        match &self.shape {
            BoxShape::Circular(circle) => self.position.x + circle.radius * self.scale,
            BoxShape::Rectangular(rect) => rect.vertices.iter().map(|v| v.x).fold(f32::NEG_INFINITY, f32::max),
        }
    }

    /// Minimum Y of the axis-aligned bounds
    pub fn calculate_bounds_min_y(&self) -> f32 {
        match &self.shape {
            BoxShape::Circular(circle) => self.position.y - circle.radius * self.scale,
            BoxShape::Rectangular(rect) => rect.vertices.iter().map(|v| v.y).fold(f32::INFINITY, f32::min),
        }
    }

    /// Maximum Y of the axis-aligned bounds
    pub fn calculate_bounds_max_y(&self) -> f32 {
        match &self.shape {
            BoxShape::Circular(circle) => self.position.y + circle.radius * self.scale,
            BoxShape::Rectangular(rect) => rect.vertices.iter().map(|v| v.y).fold(f32::NEG_INFINITY, f32::max),
        }
    }

    /// Axis-aligned bounds of the box
    pub fn bounds(&self) -> Aabb {
        Aabb::new(
            Vec2::new(self.calculate_bounds_min_x(), self.calculate_bounds_min_y()),
            Vec2::new(self.calculate_bounds_max_x(), self.calculate_bounds_max_y()),
        )
    }

    /// Physical collision test
    pub fn collision_result(&self, other: &CollisionBox) -> CollisionResult {
        self.collision_result_with_epsilon(other, 0.0)
    }

    /// Collision test relaxed by `epsilon` world units, for proximity queries
    pub fn collision_result_with_epsilon(&self, other: &CollisionBox, epsilon: f32) -> CollisionResult {
        match (&self.shape, &other.shape) {
            (BoxShape::Circular(a), BoxShape::Circular(b)) => circles_collide(
                self.position,
                a.radius * self.scale,
                other.position,
                b.radius * other.scale,
                epsilon,
            ),
            (BoxShape::Circular(circle), BoxShape::Rectangular(rect)) => {
                circle_rectangle_collide(self.position, circle.radius * self.scale, other.position, rect, epsilon)
            }
            (BoxShape::Rectangular(rect), BoxShape::Circular(circle)) => {
                // Push-out is computed for the circle, so flip it back for the rectangle
                let result = circle_rectangle_collide(
                    other.position,
                    circle.radius * other.scale,
                    self.position,
                    rect,
                    epsilon,
                );
                CollisionResult {
                    is_colliding: result.is_colliding,
                    overlap: -result.overlap,
                }
            }
            (BoxShape::Rectangular(a), BoxShape::Rectangular(b)) => {
                let axes = [a.axes[0], a.axes[1], b.axes[0], b.axes[1]];
                separating_axis_test(
                    &axes,
                    self.position,
                    other.position,
                    |axis| project_vertices(&a.vertices, axis),
                    |axis| project_vertices(&b.vertices, axis),
                    epsilon,
                )
            }
        }
    }

    /// Boolean form of [`CollisionBox::collision_result_with_epsilon`]
    pub fn is_colliding_with(&self, other: &CollisionBox, epsilon: f32) -> bool {
        self.collision_result_with_epsilon(other, epsilon).is_colliding
    }
}

fn circles_collide(position_a: Vec2, radius_a: f32, position_b: Vec2, radius_b: f32, epsilon: f32) -> CollisionResult {
    let offset = position_a - position_b;
    let distance = offset.magnitude();
    let radius_sum = radius_a + radius_b;
    if distance >= radius_sum + epsilon {
        return CollisionResult::none();
    }

    let direction = if distance > f32::EPSILON {
        offset / distance
    } else {
        Vec2::new(0.0, 1.0)
    };
    CollisionResult::hit(direction * (radius_sum - distance).max(0.0))
}

fn circle_rectangle_collide(
    circle_position: Vec2,
    radius: f32,
    rect_position: Vec2,
    rect: &RectangularBox,
    epsilon: f32,
) -> CollisionResult {
    let closest_vertex = rect
        .vertices
        .iter()
        .copied()
        .min_by(|a, b| {
            (a - circle_position)
                .norm_squared()
                .total_cmp(&(b - circle_position).norm_squared())
        })
        .unwrap_or(rect_position);

    let mut axes = vec![rect.axes[0], rect.axes[1]];
    let to_vertex = closest_vertex - circle_position;
    if to_vertex.norm_squared() > f32::EPSILON {
        axes.push(to_vertex.normalize());
    }

    separating_axis_test(
        &axes,
        circle_position,
        rect_position,
        |axis| {
            let center = circle_position.dot(&axis);
            (center - radius, center + radius)
        },
        |axis| project_vertices(&rect.vertices, axis),
        epsilon,
    )
}

fn project_vertices(vertices: &[Vec2; 4], axis: Vec2) -> (f32, f32) {
    vertices.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), vertex| {
        let projection = vertex.dot(&axis);
        (min.min(projection), max.max(projection))
    })
}

/// Returns the minimum-overlap axis as a push-out vector for shape A,
/// or no collision if any axis separates the projections.
fn separating_axis_test(
    axes: &[Vec2],
    center_a: Vec2,
    center_b: Vec2,
    project_a: impl Fn(Vec2) -> (f32, f32),
    project_b: impl Fn(Vec2) -> (f32, f32),
    epsilon: f32,
) -> CollisionResult {
    let mut min_overlap = f32::INFINITY;
    let mut best_axis = Vec2::zeros();

    for &axis in axes {
        let (min_a, max_a) = project_a(axis);
        let (min_b, max_b) = project_b(axis);
        let overlap = max_a.min(max_b) - min_a.max(min_b);
        if overlap <= -epsilon {
            return CollisionResult::none();
        }
        if overlap < min_overlap {
            min_overlap = overlap;
            best_axis = axis;
        }
    }

    if (center_a - center_b).dot(&best_axis) < 0.0 {
        best_axis = -best_axis;
    }
    CollisionResult::hit(best_axis * min_overlap.max(0.0))
}
