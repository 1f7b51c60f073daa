//! Planar convex polygons for ZMP support regions.

use nalgebra::Vector2;

/// A half-plane `normal . p <= offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfPlane {
    pub normal: Vector2<f64>,
    pub offset: f64,
}

impl HalfPlane {
    /// Signed violation: positive outside, negative inside.
    pub fn violation(&self, p: &Vector2<f64>) -> f64 {
        self.normal.dot(p) - self.offset
    }
}

/// Convex hull of `points`, counter-clockwise, without collinear vertices.
///
/// Andrew's monotone chain.
pub fn convex_hull(points: &[Vector2<f64>]) -> Vec<Vector2<f64>> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let mut lower = monotone_chain(sorted.iter());
    let mut upper = monotone_chain(sorted.iter().rev());
    // the last point of each chain is the first of the other one
    lower.pop();
    upper.pop();
    lower.append(&mut upper);
    lower
}

fn monotone_chain<'a>(points: impl Iterator<Item = &'a Vector2<f64>>) -> Vec<Vector2<f64>> {
    let mut chain: Vec<Vector2<f64>> = Vec::new();
    for p in points {
        while chain.len() >= 2 && cross(&chain[chain.len() - 2], &chain[chain.len() - 1], p) <= 0.0 {
            chain.pop();
        }
        chain.push(*p);
    }
    chain
}

/// Half-planes bounding a counter-clockwise convex polygon, normals outwards.
pub fn half_planes(polygon: &[Vector2<f64>]) -> Vec<HalfPlane> {
    let n = polygon.len();
    if n < 3 {
        return Vec::new();
    }
    (0..n)
        .filter_map(|i| {
            let a = polygon[i];
            let b = polygon[(i + 1) % n];
            let edge = b - a;
            let length = edge.norm();
            if length < f64::EPSILON {
                return None;
            }
            // outward normal of a CCW edge
            let normal = Vector2::new(edge.y, -edge.x) / length;
            Some(HalfPlane {
                normal,
                offset: normal.dot(&a),
            })
        })
        .collect()
}

/// Whether `p` lies inside the polygon, up to `tolerance`.
pub fn contains(polygon: &[Vector2<f64>], p: &Vector2<f64>, tolerance: f64) -> bool {
    half_planes(polygon)
        .iter()
        .all(|h| h.violation(p) <= tolerance)
}

fn cross(o: &Vector2<f64>, a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    (a.x - o.x).mul_add(b.y - o.y, -((a.y - o.y) * (b.x - o.x)))
}
