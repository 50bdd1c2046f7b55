use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// A measurement ruler: two endpoints in physical (RAS) space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub endpoint1: [f64; 3],
    pub endpoint2: [f64; 3],
}

impl Axis {
    pub fn new(endpoint1: Point3<f64>, endpoint2: Point3<f64>) -> Self {
        Self {
            endpoint1: endpoint1.coords.into(),
            endpoint2: endpoint2.coords.into(),
        }
    }

    /// A ruler of length `2 * half_length` centered on `center` and parallel
    /// to the physical axis `physical_index`.
    pub fn centered(center: &Point3<f64>, physical_index: usize, half_length: f64) -> Self {
        let mut endpoint1 = *center;
        let mut endpoint2 = *center;
        endpoint1[physical_index] -= half_length;
        endpoint2[physical_index] += half_length;
        Self::new(endpoint1, endpoint2)
    }

    pub fn endpoint1(&self) -> Point3<f64> {
        Point3::from(self.endpoint1)
    }

    pub fn endpoint2(&self) -> Point3<f64> {
        Point3::from(self.endpoint2)
    }

    /// Distance between the endpoints, the ruler's measurement.
    pub fn length(&self) -> f64 {
        nalgebra::distance(&self.endpoint1(), &self.endpoint2())
    }

    /// `[[EP1:x,y,z],[EP2:x,y,z]]` with coordinates rounded to 3 decimals.
    pub fn to_report_string(&self) -> String {
        format!(
            "[[EP1:{},{},{}],[EP2:{},{},{}]]",
            fmt_round3(self.endpoint1[0]),
            fmt_round3(self.endpoint1[1]),
            fmt_round3(self.endpoint1[2]),
            fmt_round3(self.endpoint2[0]),
            fmt_round3(self.endpoint2[1]),
            fmt_round3(self.endpoint2[2]),
        )
    }
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Rounds to 3 decimals and always keeps a fractional part (`1` -> `1.0`).
pub fn fmt_round3(value: f64) -> String {
    format!("{:?}", round3(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn centered_axis_spans_both_sides() {
        let axis = Axis::centered(&Point3::new(1.0, 2.0, 3.0), 1, 5.0);
        assert_eq!(axis.endpoint1, [1.0, -3.0, 3.0]);
        assert_eq!(axis.endpoint2, [1.0, 7.0, 3.0]);
        assert_relative_eq!(axis.length(), 10.0);
    }

    #[test]
    fn report_string_rounds_endpoints() {
        let axis = Axis::new(Point3::new(1.0, 2.12349, -3.5), Point3::new(4.0, 5.0, 6.0006));
        assert_eq!(
            axis.to_report_string(),
            "[[EP1:1.0,2.123,-3.5],[EP2:4.0,5.0,6.001]]"
        );
    }
}
