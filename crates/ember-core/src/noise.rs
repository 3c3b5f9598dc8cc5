//! Deterministic 3D value noise
//!
//! Lattice values come from an integer hash, so the field is identical on
//! every run and needs no permutation table.

use glam::Vec3;

/// Offsets used to decorrelate the three axes of `noise_vector`
const AXIS_OFFSETS: [Vec3; 3] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(31.416, -47.853, 12.793),
    Vec3::new(-19.191, 27.183, 61.804),
];

/// Scalar value noise in [-1, 1], smooth in all three dimensions
pub fn value_noise3(p: Vec3) -> f32 {
    if !p.is_finite() {
        return 0.0;
    }
    let cell = p.floor();
    let f = p - cell;
    // Saturating casts far from the origin; neighbours wrap instead of overflowing
    let (x0, y0, z0) = (cell.x as i32, cell.y as i32, cell.z as i32);
    let (x1, y1, z1) = (x0.wrapping_add(1), y0.wrapping_add(1), z0.wrapping_add(1));

    // Smoothstep fade
    let u = f * f * (Vec3::splat(3.0) - 2.0 * f);

    let c000 = lattice(x0, y0, z0);
    let c100 = lattice(x1, y0, z0);
    let c010 = lattice(x0, y1, z0);
    let c110 = lattice(x1, y1, z0);
    let c001 = lattice(x0, y0, z1);
    let c101 = lattice(x1, y0, z1);
    let c011 = lattice(x0, y1, z1);
    let c111 = lattice(x1, y1, z1);

    let x00 = mix(c000, c100, u.x);
    let x10 = mix(c010, c110, u.x);
    let x01 = mix(c001, c101, u.x);
    let x11 = mix(c011, c111, u.x);
    mix(mix(x00, x10, u.y), mix(x01, x11, u.y), u.z)
}

/// Vector-valued noise, each component in [-1, 1]
pub fn noise_vector(p: Vec3) -> Vec3 {
    Vec3::new(
        value_noise3(p + AXIS_OFFSETS[0]),
        value_noise3(p + AXIS_OFFSETS[1]),
        value_noise3(p + AXIS_OFFSETS[2]),
    )
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Hash a lattice coordinate into [-1, 1]
fn lattice(x: i32, y: i32, z: i32) -> f32 {
    let mut h = (x as u32 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h ^= (y as u32 as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    h ^= (z as u32 as u64).wrapping_mul(0x1656_67B1_9E37_79F9);
    h = h.wrapping_mul(0x517c_c1b7_2722_0a95);
    h ^= h >> 32;
    ((h & 0xFFFF_FFFF) as f32 / u32::MAX as f32) * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_deterministic() {
        let p = Vec3::new(1.25, -3.5, 8.75);
        assert_eq!(value_noise3(p).to_bits(), value_noise3(p).to_bits());
    }

    #[test]
    fn noise_stays_in_range() {
        for i in 0..500 {
            let p = Vec3::new(i as f32 * 0.37, i as f32 * -0.21, i as f32 * 0.13);
            let n = value_noise3(p);
            assert!((-1.0..=1.0).contains(&n));
        }
    }

    #[test]
    fn noise_is_continuous() {
        let p = Vec3::new(2.3, 4.1, -0.7);
        let a = value_noise3(p);
        let b = value_noise3(p + Vec3::splat(1e-4));
        assert!((a - b).abs() < 1e-2);
    }

    #[test]
    fn far_and_non_finite_positions_stay_in_range() {
        for p in [
            Vec3::new(3.0e9, 0.5, -2.0),
            Vec3::new(-3.0e9, 3.0e9, 1.0e20),
            Vec3::splat(f32::MAX),
            Vec3::splat(f32::MIN),
        ] {
            let n = value_noise3(p);
            assert!((-1.0..=1.0).contains(&n), "{p}: {n}");
        }
        assert_eq!(value_noise3(Vec3::new(f32::NAN, 0.0, 0.0)), 0.0);
        assert_eq!(noise_vector(Vec3::splat(f32::INFINITY)), Vec3::ZERO);
    }

    #[test]
    fn vector_components_differ() {
        let v = noise_vector(Vec3::new(0.5, 0.5, 0.5));
        assert!(v.x != v.y || v.y != v.z);
    }
}
