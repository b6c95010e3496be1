//! 2D joint geometry on normalized image coordinates.

use nalgebra::{distance, Point2};

/// Limb vectors shorter than this are treated as degenerate.
pub const DEGENERATE_EPSILON: f32 = 1e-6;

/// 頂点 `b` における角度（度）。`b→a` と `b→c` のなす角。
///
/// 結果は常に [0, 180]。どちらかのベクトル長が `DEGENERATE_EPSILON` 未満なら 0 を返す。
pub fn angle_at(a: Point2<f32>, b: Point2<f32>, c: Point2<f32>) -> f32 {
    let ba = a - b;
    let bc = c - b;

    let len_ba = ba.norm();
    let len_bc = bc.norm();
    if len_ba < DEGENERATE_EPSILON || len_bc < DEGENERATE_EPSILON {
        return 0.0;
    }

    let cosine = (ba.dot(&bc) / (len_ba * len_bc)).clamp(-1.0, 1.0);
    cosine.acos().to_degrees().min(180.0)
}

/// 2点間のユークリッド距離
pub fn stance_width(a: Point2<f32>, b: Point2<f32>) -> f32 {
    distance(&a, &b)
}

pub fn midpoint(a: Point2<f32>, b: Point2<f32>) -> Point2<f32> {
    nalgebra::center(&a, &b)
}
