//! Voxel labelmaps rasterized from a nodule ellipsoid on a reference grid.

use log::debug;
use nalgebra::Point3;
use ndarray::Array3;
use nifti::writer::WriterOptions;
use std::path::Path;

use crate::ellipsoid::Ellipsoid;
use crate::error::{LesionError, Result};
use crate::volume::Volume;

/// Sub-samples per voxel edge used by default.
pub const DEFAULT_OVERSAMPLING: usize = 2;

pub const LABEL_VALUE: u8 = 1;

#[derive(Debug, Clone)]
pub struct Labelmap {
    pub data: Array3<u8>,
    voxel_volume: f64,
}

impl Labelmap {
    /// Number of labelled voxels.
    pub fn voxel_count(&self) -> usize {
        self.data.iter().filter(|v| **v != 0).count()
    }

    /// Labelled volume in mm³.
    pub fn physical_volume(&self) -> f64 {
        self.voxel_count() as f64 * self.voxel_volume
    }

    /// Saves the labelmap on the reference volume's geometry.
    pub fn write_nifti<P: AsRef<Path>>(&self, path: P, reference: &Volume) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let header = reference.reference_header();
        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(&self.data)?;
        Ok(())
    }
}

/// Labels every voxel of `reference` whose sub-samples fall inside the
/// ellipsoid for at least half of the `oversampling³` samples.
///
/// Voxel centers sit at integer indices. Only the voxels covered by the
/// ellipsoid's bounding box are sampled.
pub fn rasterize(ellipsoid: &Ellipsoid, reference: &Volume, oversampling: usize) -> Result<Labelmap> {
    if oversampling == 0 {
        return Err(LesionError::InvalidMeasurement(
            "oversampling factor must be at least 1".to_string(),
        ));
    }
    let dims = reference.dims();
    let mut data = Array3::<u8>::zeros((dims[0], dims[1], dims[2]));
    let labelmap = |data: Array3<u8>| Labelmap {
        data,
        voxel_volume: reference.voxel_volume(),
    };
    if ellipsoid.is_degenerate() {
        return Ok(labelmap(data));
    }

    let Some(ranges) = voxel_ranges(ellipsoid, reference) else {
        debug!("Ellipsoid does not overlap volume '{}'", reference.name());
        return Ok(labelmap(data));
    };

    let n = oversampling;
    let offsets: Vec<f64> = (0..n).map(|s| (s as f64 + 0.5) / n as f64 - 0.5).collect();
    let total = n * n * n;

    for i in ranges[0].0..=ranges[0].1 {
        for j in ranges[1].0..=ranges[1].1 {
            for k in ranges[2].0..=ranges[2].1 {
                let mut inside = 0;
                for di in &offsets {
                    for dj in &offsets {
                        for dk in &offsets {
                            let ijk = Point3::new(i as f64 + di, j as f64 + dj, k as f64 + dk);
                            let ras = reference.voxel_to_physical(&ijk);
                            if ellipsoid.contains(&Point3::new(ras[0], ras[1], ras[2])) {
                                inside += 1;
                            }
                        }
                    }
                }
                if 2 * inside >= total {
                    data[(i, j, k)] = LABEL_VALUE;
                }
            }
        }
    }

    let labelmap = labelmap(data);
    debug!(
        "Rasterized ellipsoid into {} voxels ({:.3} mm³)",
        labelmap.voxel_count(),
        labelmap.physical_volume()
    );
    Ok(labelmap)
}

/// Inclusive voxel index ranges covering the ellipsoid, clamped to the grid.
fn voxel_ranges(ellipsoid: &Ellipsoid, reference: &Volume) -> Option<[(usize, usize); 3]> {
    let dims = reference.dims();
    if dims.iter().any(|d| *d == 0) {
        return None;
    }
    let (lo, hi) = ellipsoid.bounds();
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for corner in 0..8 {
        let ras = Point3::new(
            if corner & 1 == 0 { lo.x } else { hi.x },
            if corner & 2 == 0 { lo.y } else { hi.y },
            if corner & 4 == 0 { lo.z } else { hi.z },
        );
        let ijk = reference.physical_to_voxel(&ras);
        for a in 0..3 {
            min[a] = min[a].min(ijk[a]);
            max[a] = max[a].max(ijk[a]);
        }
    }

    let mut ranges = [(0, 0); 3];
    for a in 0..3 {
        // half a voxel of margin for the sub-samples
        let first = (min[a] - 0.5).floor().max(0.0);
        let last = (max[a] + 0.5).ceil().min((dims[a] - 1) as f64);
        if first > last {
            return None;
        }
        ranges[a] = (first as usize, last as usize);
    }
    Some(ranges)
}
