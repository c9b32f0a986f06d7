use std::fmt;

use thiserror::Error;

/// Run-level failures. Feature-level problems never surface here, see [`FeatureIssue`].
#[derive(Debug, Error)]
pub enum SapError {
    /// Rejected before any I/O happens (bad cell size, malformed CRS, unknown keys, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Input missing, unreadable, or without features.
    #[error("input error: {0}")]
    Input(String),

    /// Planned grid has zero width or height.
    #[error("degenerate grid: {0}")]
    DegenerateGrid(String),
}

impl SapError {
    #[inline] pub(crate) fn config(msg: impl Into<String>) -> Self { Self::Config(msg.into()) }
    #[inline] pub(crate) fn input(msg: impl Into<String>) -> Self { Self::Input(msg.into()) }
}

/// Reason a single feature was excluded or routed to the error collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureIssue {
    InvalidGeometry,
    RepairFailed,
    ZeroArea,
    NoCoordinates,
    ReprojectionFailed,
}

impl FeatureIssue {
    /// Unrecoverable issues send the raw feature to the error collection.
    #[inline]
    pub fn is_unrecoverable(self) -> bool {
        matches!(self, Self::InvalidGeometry | Self::RepairFailed | Self::ReprojectionFailed)
    }
}

impl fmt::Display for FeatureIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidGeometry => "Geometry is invalid",
            Self::RepairFailed => "Geometry is invalid or area is 0, attempted fix failed",
            Self::ZeroArea => "Area of geometry is zero",
            Self::NoCoordinates => "Geometry has no coordinates",
            Self::ReprojectionFailed => "Geometry could not be reprojected",
        })
    }
}
