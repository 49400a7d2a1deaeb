//! Scenario: quantization is stable across save/load cycles.
//!
//! Rotations stored by capture are already canonical, so re-quantizing them
//! on every load must produce bit-identical values and never report drift.

use bpk_reconcile::quantize::{
    canonical_position, canonical_rotation, dequantize_angle, quantize_angle, same_position,
    same_rotation, ROTATION_STEPS,
};
use bpk_schemas::Vec3;

fn sweep() -> impl Iterator<Item = f32> {
    // -720..720 in odd steps so most samples sit between grid points.
    (0..4_000).map(|i| -720.0 + i as f32 * 0.3607)
}

#[test]
fn canonical_rotation_is_a_fixed_point() {
    for a in sweep() {
        let r = Vec3::new(a, a * 0.5, -a);
        let once = canonical_rotation(r);
        let twice = canonical_rotation(once);
        assert!(
            once.bits_eq(&twice),
            "rotation {a} not stable: {once:?} vs {twice:?}"
        );
        assert!(same_rotation(r, once));
    }
}

#[test]
fn every_step_round_trips_exactly() {
    for step in (0..ROTATION_STEPS).step_by(97) {
        let step = step as u16;
        assert_eq!(quantize_angle(dequantize_angle(step)), step);
    }
}

#[test]
fn full_turns_collapse_to_the_same_step() {
    for a in [0.0f32, 12.5, 90.0, 181.25, 359.0] {
        let q = quantize_angle(a);
        assert_eq!(quantize_angle(a + 360.0), q, "angle {a} + 360");
        assert_eq!(quantize_angle(a - 360.0), q, "angle {a} - 360");
    }
}

#[test]
fn many_save_load_cycles_do_not_walk() {
    let mut r = Vec3::new(33.3333, 271.77, -5.01);
    let first = canonical_rotation(r);
    for _ in 0..100 {
        r = canonical_rotation(r);
    }
    assert!(r.bits_eq(&first));

    let mut p = Vec3::new(1234.567, -8.125, 0.3333);
    let first = canonical_position(p);
    for _ in 0..100 {
        p = canonical_position(p);
    }
    assert!(p.bits_eq(&first));
    assert!(same_position(Vec3::new(1234.567, -8.125, 0.3333), p));
}
