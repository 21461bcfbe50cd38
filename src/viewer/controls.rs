//! Pointer, wheel and resize input mapped onto the orbit target state.
//!
//! Everything here writes [`Spherical`] *targets* only; the damped state is
//! advanced by the frame tick.

use super::camera::Spherical;
use crate::config::ControlsConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input delivered to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputEvent {
    PointerDown { id: u32, x: f32, y: f32 },
    PointerMove { id: u32, x: f32, y: f32 },
    PointerUp { id: u32 },
    PointerCancel { id: u32 },
    /// Positive `delta_y` zooms out.
    Wheel { delta_y: f32 },
    Resize { width: u32, height: u32 },
}

/// Clamp a radius into the configured range.
pub fn clamp_radius(radius: f32, controls: &ControlsConfig) -> f32 {
    if radius.is_nan() {
        return controls.min_radius;
    }
    radius.clamp(controls.min_radius, controls.max_radius)
}

/// Exponential wheel zoom.
pub fn apply_wheel(target: &mut Spherical, delta_y: f32, controls: &ControlsConfig) {
    let factor = (delta_y * controls.zoom_delta_multiplier).exp();
    target.radius = clamp_radius(target.radius * factor, controls);
}

/// One-pointer drag: rotate around the orbit target.
pub fn apply_drag(target: &mut Spherical, dx: f32, dy: f32, controls: &ControlsConfig) {
    let (sx, sy) = controls.rotation_sensitivity;
    let sign = if controls.invert_horizontal_drag { -1.0 } else { 1.0 };
    target.azimuth += sign * dx * sx;
    target.polar = (target.polar - dy * sy).clamp(controls.polar_min, controls.polar_max);
}

/// Two-pointer pinch: scale the radius by the change in finger spread.
pub fn apply_pinch(target: &mut Spherical, previous: f32, current: f32, controls: &ControlsConfig) {
    if previous <= f32::EPSILON || current <= f32::EPSILON {
        return;
    }
    target.radius = clamp_radius(target.radius * (current / previous), controls);
}

/// Tracks active pointers and turns their motion into gestures.
#[derive(Debug, Default, Clone)]
pub struct PointerTracker {
    pointers: BTreeMap<u32, (f32, f32)>,
    pinch_distance: Option<f32>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        self.pointers.len()
    }

    pub fn clear(&mut self) {
        self.pointers.clear();
        self.pinch_distance = None;
    }

    /// Apply a pointer or wheel event to `target`. Resize is ignored here.
    pub fn handle(&mut self, event: InputEvent, target: &mut Spherical, controls: &ControlsConfig) {
        match event {
            InputEvent::PointerDown { id, x, y } => {
                self.pointers.insert(id, (x, y));
                self.pinch_distance = self.spread();
            }
            InputEvent::PointerMove { id, x, y } => {
                let Some(prev) = self.pointers.get(&id).copied() else {
                    return;
                };
                self.pointers.insert(id, (x, y));
                match self.pointers.len() {
                    1 => apply_drag(target, x - prev.0, y - prev.1, controls),
                    2 => {
                        let current = self.spread();
                        if let (Some(previous), Some(current)) = (self.pinch_distance, current) {
                            apply_pinch(target, previous, current, controls);
                        }
                        self.pinch_distance = current;
                    }
                    _ => {}
                }
            }
            InputEvent::PointerUp { id } | InputEvent::PointerCancel { id } => {
                self.pointers.remove(&id);
                self.pinch_distance = self.spread();
            }
            InputEvent::Wheel { delta_y } => apply_wheel(target, delta_y, controls),
            InputEvent::Resize { .. } => {}
        }
    }

    /// Distance between the two tracked pointers, when exactly two are down.
    fn spread(&self) -> Option<f32> {
        if self.pointers.len() != 2 {
            return None;
        }
        let mut it = self.pointers.values();
        let (a, b) = (it.next()?, it.next()?);
        Some(((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt())
    }
}
