//! Per-particle trails: a ring buffer of recent positions per trail slot and
//! camera-facing ribbon generation.

use crate::particle::pack_color;
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Slack allowed when comparing a step against `min_vertex_distance`, so
/// steps that land exactly on the threshold are not lost to rounding.
/// Consecutive points are therefore at least
/// `min_vertex_distance - DISTANCE_TOLERANCE` apart.
pub const DISTANCE_TOLERANCE: f32 = 1e-5;

/// Trail configuration for an emitter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailSettings {
    pub enabled: bool,
    /// Ring buffer size per particle
    pub max_points: usize,
    /// Minimum distance between consecutive recorded points
    pub min_vertex_distance: f32,
    /// Points older than this (seconds) are not rendered. `0` keeps all.
    pub max_age: f32,
    /// Ribbon width at the particle end
    pub width_start: f32,
    /// Ribbon width at the tail end
    pub width_end: f32,
    /// Multiply ribbon width by the particle's size at record time
    pub inherit_size: bool,
}

impl Default for TrailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_points: 16,
            min_vertex_distance: 0.1,
            max_age: 0.5,
            width_start: 0.1,
            width_end: 0.0,
            inherit_size: false,
        }
    }
}

/// One recorded trail sample
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrailPoint {
    pub position: Vec3,
    pub width: f32,
    pub color: Vec4,
    /// Simulation time at which the point was recorded
    pub time: f32,
    /// Unit travel direction from the previous point (zero for the first)
    pub direction: Vec3,
}

/// Trail vertex consumed by the ribbon renderer.
///
/// 24 bytes: position, uv (`u` along the trail, `v` across), RGBA8 color.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TrailVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub color: [u8; 4],
}

/// Vertex range of one trail inside the combined vertex buffer.
/// Each range is an independent triangle strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailStrip {
    pub first_vertex: u32,
    pub vertex_count: u32,
}

/// Fixed-size ring buffer of trail points for a single particle
#[derive(Debug, Clone)]
pub struct Trail {
    points: Vec<TrailPoint>,
    /// Index of the oldest point
    head: usize,
    len: usize,
    min_vertex_distance: f32,
}

impl Trail {
    pub fn new(max_points: usize, min_vertex_distance: f32) -> Self {
        Self {
            points: vec![TrailPoint::default(); max_points],
            head: 0,
            len: 0,
            min_vertex_distance: min_vertex_distance.max(0.0),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn max_points(&self) -> usize {
        self.points.len()
    }

    pub fn reset(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// i-th point, oldest first
    pub fn point(&self, i: usize) -> Option<&TrailPoint> {
        (i < self.len).then(|| &self.points[(self.head + i) % self.points.len()])
    }

    pub fn newest(&self) -> Option<&TrailPoint> {
        self.len.checked_sub(1).and_then(|i| self.point(i))
    }

    /// Points, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &TrailPoint> + '_ {
        (0..self.len).filter_map(move |i| self.point(i))
    }

    /// Append a point unless it is closer than `min_vertex_distance` to the
    /// newest one. The first point is always accepted. When full, the oldest
    /// point is overwritten.
    ///
    /// The comparison allows `DISTANCE_TOLERANCE` of slack: a step of
    /// `min_vertex_distance - 1e-6` (float noise on an exact step) is kept,
    /// one that falls short by more than the tolerance is rejected.
    pub fn try_add_point(&mut self, position: Vec3, width: f32, color: Vec4, time: f32) -> bool {
        let capacity = self.points.len();
        if capacity == 0 {
            return false;
        }

        let direction = match self.newest() {
            Some(last) => {
                let step = position - last.position;
                if step.length() + DISTANCE_TOLERANCE < self.min_vertex_distance {
                    return false;
                }
                step.normalize_or_zero()
            }
            None => Vec3::ZERO,
        };

        let point = TrailPoint {
            position,
            width,
            color,
            time,
            direction,
        };
        if self.len < capacity {
            self.points[(self.head + self.len) % capacity] = point;
            self.len += 1;
        } else {
            self.points[self.head] = point;
            self.head = (self.head + 1) % capacity;
        }
        true
    }

    /// Append a camera-facing ribbon to `out` (two vertices per visible
    /// point, newest first) and return the number of vertices written.
    ///
    /// Points older than `max_age` are skipped here rather than evicted. Alpha
    /// fades by `1 - age / max_age`. Fewer than two visible points produce no
    /// geometry.
    pub fn generate_vertices(
        &self,
        out: &mut Vec<TrailVertex>,
        camera: Vec3,
        width_start: f32,
        width_end: f32,
        time: f32,
        max_age: f32,
    ) -> usize {
        // Ages shrink towards the newest point, so visible points are a suffix
        let first_visible = if max_age > 0.0 {
            (0..self.len)
                .find(|&i| self.point(i).is_some_and(|p| time - p.time <= max_age))
                .unwrap_or(self.len)
        } else {
            0
        };
        let visible = self.len - first_visible;
        if visible < 2 {
            return 0;
        }

        let newest = self.len - 1;
        for n in 0..visible {
            let i = newest - n;
            let Some(point) = self.point(i) else {
                continue;
            };

            // Central difference along the visible span
            let ahead = if i < newest { i + 1 } else { i };
            let behind = if i > first_visible { i - 1 } else { i };
            let travel = match (self.point(ahead), self.point(behind)) {
                (Some(a), Some(b)) => (a.position - b.position).normalize_or(point.direction),
                _ => point.direction,
            };
            let right = ribbon_right(travel, camera - point.position);

            let u = n as f32 / (visible - 1) as f32;
            let half_width = 0.5 * point.width * (width_start + (width_end - width_start) * u);

            let mut color = point.color;
            if max_age > 0.0 {
                let age = (time - point.time).max(0.0);
                color.w *= (1.0 - age / max_age).clamp(0.0, 1.0);
            }
            let color = pack_color(color);

            out.push(TrailVertex {
                position: (point.position + right * half_width).to_array(),
                uv: [u, 0.0],
                color,
            });
            out.push(TrailVertex {
                position: (point.position - right * half_width).to_array(),
                uv: [u, 1.0],
                color,
            });
        }
        visible * 2
    }
}

/// Unit vector across the ribbon. Falls back to a world-axis perpendicular
/// when the travel direction is parallel to the view or zero.
fn ribbon_right(travel: Vec3, to_camera: Vec3) -> Vec3 {
    let right = travel.cross(to_camera);
    if right.length_squared() > 1e-12 {
        return right.normalize();
    }
    let fallback = travel.cross(Vec3::Y);
    if fallback.length_squared() > 1e-12 {
        return fallback.normalize();
    }
    let fallback = travel.cross(Vec3::X);
    if fallback.length_squared() > 1e-12 {
        return fallback.normalize();
    }
    Vec3::X
}

/// Owns one `Trail` per particle slot plus the combined vertex output.
///
/// Particles hold a slot index rather than the trail itself, so swap-remove
/// compaction and sorting of the pool never move trail buffers.
pub struct TrailRecorder {
    settings: TrailSettings,
    trails: Vec<Trail>,
    free: Vec<u32>,
    vertices: Vec<TrailVertex>,
    strips: Vec<TrailStrip>,
    dirty: bool,
}

impl TrailRecorder {
    /// Preallocate `slots` trails (one per pool slot). A disabled settings
    /// block allocates nothing.
    pub fn new(slots: usize, settings: TrailSettings) -> Self {
        let slots = if settings.enabled { slots } else { 0 };
        let points = settings.max_points.max(2);
        Self {
            settings,
            trails: (0..slots)
                .map(|_| Trail::new(points, settings.min_vertex_distance))
                .collect(),
            free: (0..slots as u32).rev().collect(),
            vertices: Vec::with_capacity(slots * points * 2),
            strips: Vec::with_capacity(slots),
            dirty: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn settings(&self) -> &TrailSettings {
        &self.settings
    }

    pub fn trail(&self, slot: u32) -> Option<&Trail> {
        self.trails.get(slot as usize)
    }

    /// Claim an empty trail for a new particle
    pub fn acquire(&mut self) -> Option<u32> {
        let slot = self.free.pop()?;
        self.trails[slot as usize].reset();
        Some(slot)
    }

    pub fn release(&mut self, slot: u32) {
        if let Some(trail) = self.trails.get_mut(slot as usize) {
            trail.reset();
            self.free.push(slot);
            self.dirty = true;
        }
    }

    /// Record a particle's current state into its trail
    pub fn record(&mut self, slot: u32, position: Vec3, size: f32, color: Vec4, time: f32) -> bool {
        let width = if self.settings.inherit_size { size } else { 1.0 };
        let added = self
            .trails
            .get_mut(slot as usize)
            .is_some_and(|t| t.try_add_point(position, width, color, time));
        self.dirty |= added;
        added
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Drop every trail and the generated geometry
    pub fn clear(&mut self) {
        for trail in &mut self.trails {
            trail.reset();
        }
        self.free.clear();
        self.free.extend((0..self.trails.len() as u32).rev());
        self.vertices.clear();
        self.strips.clear();
        self.dirty = false;
    }

    /// Regenerate ribbon geometry for the given slots if anything changed
    /// since the last build
    pub fn rebuild(&mut self, slots: impl Iterator<Item = u32>, camera: Vec3, time: f32) {
        if !self.dirty {
            return;
        }
        self.vertices.clear();
        self.strips.clear();
        let s = self.settings;
        for slot in slots {
            let Some(trail) = self.trails.get(slot as usize) else {
                continue;
            };
            let first_vertex = self.vertices.len() as u32;
            let count = trail.generate_vertices(
                &mut self.vertices,
                camera,
                s.width_start,
                s.width_end,
                time,
                s.max_age,
            );
            if count > 0 {
                self.strips.push(TrailStrip {
                    first_vertex,
                    vertex_count: count as u32,
                });
            }
        }
        self.dirty = false;
    }

    pub fn vertices(&self) -> &[TrailVertex] {
        &self.vertices
    }

    pub fn strips(&self) -> &[TrailStrip] {
        &self.strips
    }
}
