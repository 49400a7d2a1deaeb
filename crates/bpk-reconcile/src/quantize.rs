//! Rotation / position quantizer.
//!
//! Every rotation or position comparison in the reconciler goes through this
//! module so that floating-point noise never reads as drift. Rotations are
//! Euler angles in degrees carried as one `u16` per axis (the resolution the
//! host replicates); positions sit on a 1/1024 world-unit grid.
//!
//! Round-tripping is idempotent:
//! `canonical_rotation(canonical_rotation(r)) == canonical_rotation(r)` for
//! every finite `r`. The step size (45/8192 degrees) is a dyadic rational, so
//! the dequantized value is exact in `f32` and re-quantizes to the same step.

use bpk_schemas::Vec3;

/// Discrete steps per full turn.
pub const ROTATION_STEPS: u32 = 65_536;

/// Degrees per rotation step (exactly 45/8192).
const DEGREES_PER_STEP: f64 = 360.0 / ROTATION_STEPS as f64;

/// Position grid steps per world unit. Round-tripping is exact for
/// coordinates up to ±16384 units.
pub const POSITION_STEPS_PER_UNIT: f64 = 1024.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuantizedRotation {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuantizedPosition {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Quantize one angle. Non-finite input maps to step 0.
pub fn quantize_angle(degrees: f32) -> u16 {
    if !degrees.is_finite() {
        return 0;
    }
    let wrapped = f64::from(degrees).rem_euclid(360.0);
    let steps = (wrapped / DEGREES_PER_STEP).round() as u32;
    (steps % ROTATION_STEPS) as u16
}

pub fn dequantize_angle(step: u16) -> f32 {
    (f64::from(step) * DEGREES_PER_STEP) as f32
}

pub fn quantize_rotation(r: Vec3) -> QuantizedRotation {
    QuantizedRotation {
        x: quantize_angle(r.x),
        y: quantize_angle(r.y),
        z: quantize_angle(r.z),
    }
}

pub fn dequantize_rotation(q: QuantizedRotation) -> Vec3 {
    Vec3::new(
        dequantize_angle(q.x),
        dequantize_angle(q.y),
        dequantize_angle(q.z),
    )
}

/// `dequantize(quantize(r))`: the only form a rotation is ever stored in.
pub fn canonical_rotation(r: Vec3) -> Vec3 {
    dequantize_rotation(quantize_rotation(r))
}

fn quantize_coord(v: f32) -> i32 {
    if !v.is_finite() {
        return 0;
    }
    // `as` saturates on overflow.
    (f64::from(v) * POSITION_STEPS_PER_UNIT).round() as i32
}

pub fn quantize_position(p: Vec3) -> QuantizedPosition {
    QuantizedPosition {
        x: quantize_coord(p.x),
        y: quantize_coord(p.y),
        z: quantize_coord(p.z),
    }
}

pub fn dequantize_position(q: QuantizedPosition) -> Vec3 {
    Vec3::new(
        (f64::from(q.x) / POSITION_STEPS_PER_UNIT) as f32,
        (f64::from(q.y) / POSITION_STEPS_PER_UNIT) as f32,
        (f64::from(q.z) / POSITION_STEPS_PER_UNIT) as f32,
    )
}

pub fn canonical_position(p: Vec3) -> Vec3 {
    dequantize_position(quantize_position(p))
}

pub fn same_rotation(a: Vec3, b: Vec3) -> bool {
    quantize_rotation(a) == quantize_rotation(b)
}

pub fn same_position(a: Vec3, b: Vec3) -> bool {
    quantize_position(a) == quantize_position(b)
}
