//! Angle and planar helpers shared by the room and CVR transforms
//!
//! All yaw angles in this crate use one convention: a positive yaw rotates
//! the XZ plane counterclockwise, turning +X toward +Z. Planar vectors are
//! `Vec2(x, z)`.

use glam::{Vec2, Vec3};

/// Normalize an angle in degrees to `(-180, 180]`
pub fn normalize_yaw_deg(deg: f32) -> f32 {
    let mut a = deg % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}

/// Normalize an angle in degrees to `[0, 360)`
pub fn normalize_yaw_360(deg: f32) -> f32 {
    let a = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if a >= 360.0 {
        0.0
    } else {
        a
    }
}

/// Normalize an angle in radians to `(-PI, PI]`
pub fn normalize_yaw_rad(rad: f32) -> f32 {
    let (s, c) = rad.sin_cos();
    s.atan2(c)
}

/// Rotate a planar vector by `angle_rad`
pub fn rotate_xz(v: Vec2, angle_rad: f32) -> Vec2 {
    Vec2::from_angle(angle_rad).rotate(v)
}

/// Interpolate between two angles along the shortest arc
pub fn lerp_angle_deg(from: f32, to: f32, t: f32) -> f32 {
    from + normalize_yaw_deg(to - from) * t
}

/// Frame-rate independent exponential smoothing factor
///
/// Returns the fraction of the remaining distance to cover this tick when
/// approaching a target at `rate` per second.
pub fn smoothing_factor(rate: f32, dt: f32) -> f32 {
    if rate <= 0.0 || dt <= 0.0 {
        return 0.0;
    }
    1.0 - (-rate * dt).exp()
}

/// Planar (XZ) part of a 3D point
pub fn xz(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Build a 3D point from a planar XZ vector and a height
pub fn from_xz(v: Vec2, y: f32) -> Vec3 {
    Vec3::new(v.x, y, v.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_normalize_signed() {
        assert!((normalize_yaw_deg(190.0) - -170.0).abs() < EPS);
        assert!((normalize_yaw_deg(-180.0) - 180.0).abs() < EPS);
        assert!((normalize_yaw_deg(720.0 + 45.0) - 45.0).abs() < EPS);
        assert!((normalize_yaw_deg(-270.0) - 90.0).abs() < EPS);
    }

    #[test]
    fn test_normalize_unsigned() {
        assert!((normalize_yaw_360(-90.0) - 270.0).abs() < EPS);
        assert!((normalize_yaw_360(360.0)).abs() < EPS);
        let tiny = normalize_yaw_360(-1e-9);
        assert!((0.0..360.0).contains(&tiny));
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let v = rotate_xz(Vec2::new(1.0, 0.0), std::f32::consts::FRAC_PI_2);
        assert!(v.x.abs() < EPS);
        assert!((v.y - 1.0).abs() < EPS);
    }

    #[test]
    fn test_lerp_angle_wraps() {
        let mid = lerp_angle_deg(350.0, 10.0, 0.5);
        assert!((normalize_yaw_360(mid) - 0.0).abs() < EPS || (normalize_yaw_360(mid) - 360.0).abs() < EPS);
    }

    #[test]
    fn test_smoothing_factor_bounds() {
        assert_eq!(smoothing_factor(12.0, 0.0), 0.0);
        let a = smoothing_factor(12.0, 1.0 / 60.0);
        assert!(a > 0.0 && a < 1.0);
        assert!(smoothing_factor(12.0, 10.0) > 0.999);
    }
}
