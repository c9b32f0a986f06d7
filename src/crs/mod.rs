mod crs;
mod proj;

pub use crs::Crs;
pub use proj::Reprojector;
