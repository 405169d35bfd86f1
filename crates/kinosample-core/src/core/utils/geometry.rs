use nalgebra::{Isometry3, Point3, Translation3, Unit, UnitQuaternion, Vector3};

/// Builds an orthonormal pair of tangent vectors spanning the plane normal to
/// `normal`.
///
/// The seed axis is chosen as the coordinate axis least aligned with the
/// normal, so the construction is well-conditioned for any input direction
/// (no component of the normal is ever divided by).
pub fn orthonormal_tangents(normal: &Unit<Vector3<f64>>) -> (Vector3<f64>, Vector3<f64>) {
    let n = normal.into_inner();
    let seed = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let t1 = (seed - n * n.dot(&seed)).normalize();
    let t2 = n.cross(&t1);
    (t1, t2)
}

/// Rigid rotation by `angle` (radians, right-handed) about the axis through
/// `point`, i.e. `T(point) * R(axis, angle) * T(-point)`.
pub fn rotation_about_point(
    axis: &Unit<Vector3<f64>>,
    angle: f64,
    point: &Point3<f64>,
) -> Isometry3<f64> {
    let rotation = UnitQuaternion::from_axis_angle(axis, angle);
    let translation = Translation3::from(point.coords - rotation * point.coords);
    Isometry3::from_parts(translation, rotation)
}
