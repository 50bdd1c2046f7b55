//! Ellipsoid approximation of a nodule and its surface model.

use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{LesionError, Result};

/// Resolution of the parametric surface along u (around S) and v (pole to pole).
pub const U_RESOLUTION: usize = 50;
pub const V_RESOLUTION: usize = 50;

/// Axis-aligned ellipsoid in physical space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub center: Point3<f64>,
    pub radii: Vector3<f64>,
}

impl Ellipsoid {
    /// Ellipsoid whose diameters along R, A and S are the width, height and
    /// depth measurements. Zero measurements are legal and collapse that axis.
    pub fn from_measurements(width: f64, height: f64, depth: f64, center: Point3<f64>) -> Result<Self> {
        for (name, value) in [("width", width), ("height", height), ("depth", depth)] {
            if !value.is_finite() || value < 0.0 {
                return Err(LesionError::InvalidMeasurement(format!(
                    "{name} must be a finite length >= 0, got {value}"
                )));
            }
        }
        Ok(Self {
            center,
            radii: Vector3::new(width / 2.0, height / 2.0, depth / 2.0),
        })
    }

    /// At least one radius is zero: the ellipsoid is a disk, a segment or a point.
    pub fn is_degenerate(&self) -> bool {
        self.radii.iter().any(|r| *r == 0.0)
    }

    /// Closed point-in-ellipsoid test. Degenerate ellipsoids enclose nothing.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        if self.is_degenerate() {
            return false;
        }
        let d = point - self.center;
        (d.x / self.radii.x).powi(2) + (d.y / self.radii.y).powi(2) + (d.z / self.radii.z).powi(2)
            <= 1.0
    }

    /// Enclosed volume in mm³.
    pub fn volume(&self) -> f64 {
        4.0 / 3.0 * PI * self.radii.x * self.radii.y * self.radii.z
    }

    pub fn bounds(&self) -> (Point3<f64>, Point3<f64>) {
        (self.center - self.radii, self.center + self.radii)
    }

    /// Point of the surface at parameters `u` in [0, 2π) and `v` in [0, π].
    pub fn surface_point(&self, u: f64, v: f64) -> Point3<f64> {
        self.center
            + Vector3::new(
                self.radii.x * v.sin() * u.cos(),
                self.radii.y * v.sin() * u.sin(),
                self.radii.z * v.cos(),
            )
    }

    pub fn mesh(&self) -> Mesh {
        self.mesh_with_resolution(U_RESOLUTION, V_RESOLUTION)
    }

    /// Triangulates the parametric surface. Rings run from the S pole (v = 0)
    /// to the I pole (v = π); the triangles that would collapse at the poles
    /// are left out.
    pub fn mesh_with_resolution(&self, u_resolution: usize, v_resolution: usize) -> Mesh {
        let u_resolution = u_resolution.max(3);
        let v_resolution = v_resolution.max(2);
        let mut vertices = Vec::with_capacity(u_resolution * (v_resolution + 1));
        for i in 0..=v_resolution {
            let v = PI * i as f64 / v_resolution as f64;
            for j in 0..u_resolution {
                let u = 2.0 * PI * j as f64 / u_resolution as f64;
                vertices.push(self.surface_point(u, v));
            }
        }

        let index = |i: usize, j: usize| i * u_resolution + (j % u_resolution);
        let mut faces = Vec::new();
        for i in 0..v_resolution {
            for j in 0..u_resolution {
                let a = index(i, j);
                let b = index(i, j + 1);
                let c = index(i + 1, j);
                let d = index(i + 1, j + 1);
                if i + 1 != v_resolution {
                    faces.push([a, c, d]);
                }
                if i != 0 {
                    faces.push([a, d, b]);
                }
            }
        }
        Mesh { vertices, faces }
    }
}

/// Triangle surface model.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<[usize; 3]>,
}

impl Mesh {
    /// Writes the mesh as a Wavefront OBJ file, creating parent directories.
    pub fn write_obj<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "o {}", name)?;
        for v in &self.vertices {
            writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
        }
        // OBJ indices are 1-based
        for f in &self.faces {
            writeln!(writer, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
        }
        writer.flush()?;
        Ok(())
    }
}
