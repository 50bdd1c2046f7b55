//! Reference volumes and their voxel (IJK) to physical (RAS) geometry.

use log::debug;
use nalgebra::{Matrix3, Matrix4, Point3, Vector4};
use nifti::{NiftiHeader, NiftiObject, ReaderOptions};
use std::path::Path;

use crate::common::WorkingMode;
use crate::error::{LesionError, Result};

const SINGULAR_EPSILON: f64 = 1e-12;
const OBLIQUE_TOLERANCE: f64 = 1e-6;

/// A scalar volume as seen by the measurement tools: only its grid and its
/// affine are needed, the intensities stay on disk.
#[derive(Debug, Clone)]
pub struct Volume {
    name: String,
    ijk_to_ras: Matrix4<f64>,
    ras_to_ijk: Matrix4<f64>,
    dims: [usize; 3],
    working_mode: WorkingMode,
    header: Option<NiftiHeader>,
}

impl Volume {
    /// Builds a volume from a voxel -> physical affine.
    ///
    /// Fails with `InvalidTransform` when the matrix has non-finite entries,
    /// a last row other than `[0, 0, 0, 1]`, or cannot be inverted.
    pub fn from_affine(name: &str, ijk_to_ras: Matrix4<f64>, dims: [usize; 3]) -> Result<Self> {
        if ijk_to_ras.iter().any(|v| !v.is_finite()) {
            return Err(LesionError::InvalidTransform(format!(
                "affine of volume '{name}' has non-finite entries"
            )));
        }
        let last_row = ijk_to_ras.row(3);
        if last_row[0] != 0.0 || last_row[1] != 0.0 || last_row[2] != 0.0 || last_row[3] != 1.0 {
            return Err(LesionError::InvalidTransform(format!(
                "affine of volume '{name}' is not affine, last row is {last_row}"
            )));
        }
        let linear: Matrix3<f64> = ijk_to_ras.fixed_slice::<3, 3>(0, 0).into_owned();
        if linear.determinant().abs() < SINGULAR_EPSILON {
            return Err(LesionError::InvalidTransform(format!(
                "affine of volume '{name}' is singular"
            )));
        }
        let ras_to_ijk = ijk_to_ras.try_inverse().ok_or_else(|| {
            LesionError::InvalidTransform(format!("affine of volume '{name}' cannot be inverted"))
        })?;
        if ras_to_ijk.iter().any(|v| !v.is_finite()) {
            return Err(LesionError::InvalidTransform(format!(
                "inverse affine of volume '{name}' has non-finite entries"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            ijk_to_ras,
            ras_to_ijk,
            dims,
            working_mode: WorkingMode::default(),
            header: None,
        })
    }

    /// Reads the geometry of a nifti file. The case name is the file name
    /// without its `.nii` / `.nii.gz` extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let obj = ReaderOptions::new().read_file(path)?;
        let header = obj.header().clone();
        if header.dim[0] < 3 {
            return Err(LesionError::InvalidTransform(format!(
                "{} has {} dimensions, a 3D volume is required",
                path.display(),
                header.dim[0]
            )));
        }
        let dims = [
            header.dim[1] as usize,
            header.dim[2] as usize,
            header.dim[3] as usize,
        ];
        let affine = header.affine::<f64>();
        debug!("Loaded {} with dims {:?}", path.display(), dims);

        let mut volume = Self::from_affine(&case_name(path), affine, dims)?;
        volume.header = Some(header);
        Ok(volume)
    }

    pub fn with_working_mode(mut self, working_mode: WorkingMode) -> Self {
        self.working_mode = working_mode;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn working_mode(&self) -> WorkingMode {
        self.working_mode
    }

    pub fn set_working_mode(&mut self, working_mode: WorkingMode) {
        self.working_mode = working_mode;
    }

    pub fn ijk_to_ras(&self) -> &Matrix4<f64> {
        &self.ijk_to_ras
    }

    pub fn ras_to_ijk(&self) -> &Matrix4<f64> {
        &self.ras_to_ijk
    }

    /// Header to write derived images with, carrying this volume's affine.
    pub fn reference_header(&self) -> NiftiHeader {
        let mut header = self.header.clone().unwrap_or_default();
        header.set_affine(&self.ijk_to_ras);
        header
    }

    /// Physical volume of a single voxel in mm³.
    pub fn voxel_volume(&self) -> f64 {
        let linear: Matrix3<f64> = self.ijk_to_ras.fixed_slice::<3, 3>(0, 0).into_owned();
        linear.determinant().abs()
    }

    /// True when every voxel axis maps onto the physical axis with the same
    /// index (no rotation and no axis permutation).
    pub fn is_axis_aligned(&self) -> bool {
        for col in 0..3 {
            let norm = (0..3)
                .map(|row| self.ijk_to_ras[(row, col)].powi(2))
                .sum::<f64>()
                .sqrt();
            for row in 0..3 {
                if row != col && self.ijk_to_ras[(row, col)].abs() > OBLIQUE_TOLERANCE * norm {
                    return false;
                }
            }
        }
        true
    }

    /// Applies the voxel -> physical affine to a voxel point with weight 1.
    pub fn voxel_to_physical(&self, ijk: &Point3<f64>) -> Vector4<f64> {
        self.ijk_to_ras * ijk.to_homogeneous()
    }

    /// Applies the physical -> voxel affine to a physical point with weight 1.
    pub fn physical_to_voxel(&self, ras: &Point3<f64>) -> Vector4<f64> {
        self.ras_to_ijk * ras.to_homogeneous()
    }
}

fn case_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name
        .strip_suffix(".gz")
        .unwrap_or(&file_name)
        .to_string();
    stem.strip_suffix(".nii").unwrap_or(&stem).to_string()
}
