//! CSV measurement reports, one row per nodule per save.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;

use crate::axis::fmt_round3;
use crate::common::AxisName;
use crate::error::Result;
use crate::scene::{NodeId, Scene};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(rename = "CaseId")]
    pub case_id: String,
    #[serde(rename = "Nodule")]
    pub nodule: u32,
    #[serde(rename = "Center_RAS")]
    pub center_ras: String,
    #[serde(rename = "Width_RAS")]
    pub width_ras: String,
    #[serde(rename = "Height_RAS")]
    pub height_ras: String,
    #[serde(rename = "Depth_RAS")]
    pub depth_ras: String,
}

/// Rows for every nodule of `volume` that has its rulers drawn.
///
/// `case_id` defaults to the volume name.
pub fn rows_for_volume(scene: &Scene, volume: NodeId, case_id: Option<&str>) -> Result<Vec<ReportRow>> {
    let case_id = match case_id {
        Some(id) => id.to_string(),
        None => scene.volume(volume)?.name().to_string(),
    };
    let mut rows = Vec::new();
    for index in scene.nodule_indices(volume)? {
        let centers = &scene.fiducials(volume, index)?.points;
        let axes: Result<Vec<_>> = AxisName::ALL
            .iter()
            .map(|name| scene.axis_for_nodule(volume, index, *name))
            .collect();
        let axes = match axes {
            Ok(axes) if !centers.is_empty() => axes,
            _ => {
                warn!("Nodule {index} has no center or rulers yet, not reported");
                continue;
            }
        };
        let center_ras = format!(
            "[{}]",
            centers
                .iter()
                .map(|c| format!(
                    "[{}, {}, {}]",
                    fmt_round3(c.x),
                    fmt_round3(c.y),
                    fmt_round3(c.z)
                ))
                .collect::<Vec<_>>()
                .join(", ")
        );
        rows.push(ReportRow {
            case_id: case_id.clone(),
            nodule: index,
            center_ras,
            width_ras: axes[0].to_report_string(),
            height_ras: axes[1].to_report_string(),
            depth_ras: axes[2].to_report_string(),
        });
    }
    Ok(rows)
}

/// Appends rows to a report file. The header is only written to a new or
/// empty file.
pub fn append_rows<P: AsRef<Path>>(path: P, rows: &[ReportRow]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_empty = file.metadata()?.len() == 0;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_empty)
        .from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Saved {} report row(s) to {}", rows.len(), path.display());
    Ok(())
}

pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Vec<ReportRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
