// Planar distance helpers, in machine units.

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = f64::from(b.0 - a.0);
    let dy = f64::from(b.1 - a.1);
    dx.hypot(dy)
}

/// Distance from `p` to the closed segment `a`-`b`.
///
/// Points whose projection falls outside the segment measure to the nearer
/// endpoint, so a stitch that doubles back is never treated as collinear.
pub fn segment_distance(p: (i32, i32), a: (i32, i32), b: (i32, i32)) -> f64 {
    let (ax, ay) = (f64::from(a.0), f64::from(a.1));
    let (vx, vy) = (f64::from(b.0) - ax, f64::from(b.1) - ay);
    let (wx, wy) = (f64::from(p.0) - ax, f64::from(p.1) - ay);

    let len2 = vx * vx + vy * vy;
    if len2 == 0.0 {
        return wx.hypot(wy);
    }
    let t = ((wx * vx + wy * vy) / len2).clamp(0.0, 1.0);
    (wx - t * vx).hypot(wy - t * vy)
}
