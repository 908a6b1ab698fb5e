use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Parses a PAGE `points` attribute (`"x1,y1 x2,y2 ..."`).
///
/// Returns the offending token on failure.
pub fn parse_points(raw: &str) -> Result<Vec<Point>, String> {
    raw.split_whitespace()
        .map(|pair| {
            let (x, y) = pair.split_once(',').ok_or_else(|| pair.to_string())?;
            let x = parse_coordinate(x).ok_or_else(|| pair.to_string())?;
            let y = parse_coordinate(y).ok_or_else(|| pair.to_string())?;
            Ok(Point::new(x, y))
        })
        .collect()
}

fn parse_coordinate(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.round() as i64))
}

pub fn format_points(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A polygon repaired into a valid area, with its area cached.
#[derive(Debug, Clone)]
pub struct Shape {
    area: f64,
    geometry: MultiPolygon<f64>,
}

impl Shape {
    pub fn from_points(points: &[Point]) -> Self {
        let geometry = make_valid(points);
        Self {
            area: geometry.unsigned_area(),
            geometry,
        }
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn intersection_area(&self, other: &Shape) -> f64 {
        if self.area <= 0.0 || other.area <= 0.0 {
            return 0.0;
        }
        self.geometry.intersection(&other.geometry).unsigned_area()
    }

    /// Intersection over union, computed from an already known intersection.
    pub fn iou_with_intersection(&self, other: &Shape, intersection: f64) -> f64 {
        let union = self.area + other.area - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    pub fn iou(&self, other: &Shape) -> f64 {
        let inter = self.intersection_area(other);
        self.iou_with_intersection(other, inter)
    }
}

/// Repairs a possibly self-intersecting ring into a valid multipolygon
/// covering the same area. Rings with fewer than three distinct points have
/// no area and become empty.
pub fn make_valid(points: &[Point]) -> MultiPolygon<f64> {
    let mut distinct: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if !distinct.contains(p) {
            distinct.push(*p);
        }
    }
    if distinct.len() < 3 {
        return MultiPolygon::new(vec![]);
    }

    let ring: LineString<f64> = points
        .iter()
        .map(|p| Coord {
            x: p.x as f64,
            y: p.y as f64,
        })
        .collect();
    let polygon = Polygon::new(ring, vec![]);
    // Running the polygon through a boolean op resolves self-intersections.
    polygon.union(&MultiPolygon::<f64>::new(vec![]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn square(x0: i64, y0: i64, size: i64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x0 + size, y0),
            Point::new(x0 + size, y0 + size),
            Point::new(x0, y0 + size),
        ]
    }

    #[test]
    fn parses_points_attribute() {
        let points = parse_points("410,3137 410,3139 412,3141 410,3137").unwrap();
        assert_eq!(points.len(), 4);
        assert_eq!(points[2], Point::new(412, 3141));
        assert_eq!(parse_points("1,2 oops"), Err("oops".to_string()));
    }

    #[test]
    fn computes_iou() {
        let a = Shape::from_points(&square(0, 0, 10));
        let b = Shape::from_points(&square(5, 5, 10));
        let iou = a.iou(&b);
        assert!((iou - 25.0 / 175.0).abs() < 1e-6);
    }

    #[test]
    fn identical_shapes_have_unit_iou() {
        let a = Shape::from_points(&square(0, 0, 10));
        let b = Shape::from_points(&square(0, 0, 10));
        assert!((a.iou(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn repairs_bowtie() {
        // Self-intersecting ring: two triangles of area 25 each.
        let bowtie = vec![
            Point::new(0, 0),
            Point::new(10, 10),
            Point::new(10, 0),
            Point::new(0, 10),
        ];
        let shape = Shape::from_points(&bowtie);
        assert!((shape.area() - 50.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_ring_is_empty() {
        let shape = Shape::from_points(&[Point::new(0, 0), Point::new(5, 5), Point::new(0, 0)]);
        assert_eq!(shape.area(), 0.0);
    }
}
