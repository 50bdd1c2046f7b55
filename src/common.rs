use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LesionError;

/// Voxel axis of a volume: I -> X, J -> Y, K -> Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    X,
    Y,
    Z,
}

impl Direction {
    pub fn to_usize(&self) -> usize {
        match self {
            Direction::X => 0,
            Direction::Y => 1,
            Direction::Z => 2,
        }
    }

    pub fn from_usize(val: usize) -> Result<Self, LesionError> {
        match val {
            0 => Ok(Direction::X),
            1 => Ok(Direction::Y),
            2 => Ok(Direction::Z),
            _ => Err(LesionError::InvalidAxisIndex(val)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::X => write!(f, "0"),
            Direction::Y => write!(f, "1"),
            Direction::Z => write!(f, "2"),
        }
    }
}

/// One of the three measurement axes of a nodule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AxisName {
    Width,
    Height,
    Depth,
}

impl AxisName {
    pub const ALL: [AxisName; 3] = [AxisName::Width, AxisName::Height, AxisName::Depth];
}

impl fmt::Display for AxisName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisName::Width => write!(f, "Width"),
            AxisName::Height => write!(f, "Height"),
            AxisName::Depth => write!(f, "Depth"),
        }
    }
}

impl FromStr for AxisName {
    type Err = LesionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "width" | "w" => Ok(AxisName::Width),
            "height" | "h" => Ok(AxisName::Height),
            "depth" | "d" => Ok(AxisName::Depth),
            _ => Err(LesionError::NotFound(format!("axis named '{s}'"))),
        }
    }
}

/// Selects which two axes move together when stepping through slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructurePlane {
    None,
    /// Axial.
    WidthHeight,
    /// Sagittal.
    HeightDepth,
    /// Coronal.
    DepthWidth,
}

impl FromStr for StructurePlane {
    type Err = LesionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(StructurePlane::None),
            "axial" | "width-height" => Ok(StructurePlane::WidthHeight),
            "sagittal" | "height-depth" => Ok(StructurePlane::HeightDepth),
            "coronal" | "depth-width" => Ok(StructurePlane::DepthWidth),
            _ => Err(LesionError::NotFound(format!("structure plane '{s}'"))),
        }
    }
}

/// Slice viewer that follows a stepped plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceView {
    /// Axial viewer, moves along S.
    Red,
    /// Sagittal viewer, moves along R.
    Yellow,
    /// Coronal viewer, moves along A.
    Green,
}

/// Default ruler sizes depend on the kind of subject being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkingMode {
    #[default]
    Human,
    SmallAnimal,
}

impl WorkingMode {
    /// Half lengths `(a, b)` of the default rulers: Width spans `2a`,
    /// Height and Depth span `2b`.
    pub fn default_half_axes(&self) -> (f64, f64) {
        match self {
            WorkingMode::Human => (10.0, 5.0),
            WorkingMode::SmallAnimal => (2.0, 1.0),
        }
    }
}
