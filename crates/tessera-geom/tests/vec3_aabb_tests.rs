use tessera_geom::{Aabb, BlockPos, Vec3};

fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

fn vec3_approx_eq(a: Vec3, b: Vec3, eps: f32) -> bool {
    approx_eq(a.x, b.x, eps) && approx_eq(a.y, b.y, eps) && approx_eq(a.z, b.z, eps)
}

#[test]
fn vec3_add_sub() {
    let a = Vec3::new(1.0, 2.0, 3.0);
    let b = Vec3::new(-4.0, 5.0, -6.0);
    let c = a + b;
    assert!(vec3_approx_eq(c, Vec3::new(-3.0, 7.0, -3.0), 1e-6));
    assert!(vec3_approx_eq(c - a, b, 1e-6));
}

#[test]
fn vec3_assign_ops() {
    let mut v = Vec3::new(1.0, 1.0, 1.0);
    v += Vec3::new(2.0, 3.0, 4.0);
    assert!(vec3_approx_eq(v, Vec3::new(3.0, 4.0, 5.0), 1e-6));
    v -= Vec3::new(1.0, 2.0, 3.0);
    assert!(vec3_approx_eq(v, Vec3::new(2.0, 2.0, 2.0), 1e-6));
}

#[test]
fn distance_sq_matches_manual() {
    let a = Vec3::new(8.0, 8.0, 8.0);
    let b = Vec3::new(8.0, 8.0, 32.0);
    assert_eq!(a.distance_sq_f64(b), 576.0);
    assert_eq!(b.distance_sq_f64(a), 576.0);
    assert_eq!(a.distance_sq_f64(a), 0.0);
}

#[test]
fn aabb_center_and_contains() {
    let bb = Aabb::new(Vec3::new(16.0, 0.0, -16.0), Vec3::new(32.0, 16.0, 0.0));
    assert!(vec3_approx_eq(bb.center(), Vec3::new(24.0, 8.0, -8.0), 1e-6));
    assert!(bb.contains(Vec3::new(16.0, 0.0, -16.0)));
    assert!(!bb.contains(Vec3::new(32.0, 0.0, -16.0)));
}

#[test]
fn block_pos_offset_and_vec() {
    let p = BlockPos::new(16, 32, -48).offset(-1, 2, 3);
    assert_eq!(p, BlockPos::new(15, 34, -45));
    assert!(vec3_approx_eq(p.to_vec3(), Vec3::new(15.0, 34.0, -45.0), 1e-6));
}

#[test]
fn cross_follows_right_hand_rule() {
    let x = Vec3::new(1.0, 0.0, 0.0);
    let y = Vec3::new(0.0, 1.0, 0.0);
    assert!(vec3_approx_eq(x.cross(y), Vec3::new(0.0, 0.0, 1.0), 1e-6));
    assert!(vec3_approx_eq(y.cross(x), Vec3::new(0.0, 0.0, -1.0), 1e-6));
    assert!(vec3_approx_eq(x.cross(x), Vec3::ZERO, 1e-6));
}
