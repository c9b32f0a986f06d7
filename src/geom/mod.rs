mod shape;
mod validity;

pub use shape::{exterior_length, has_coordinates, shape_index};
pub use validity::{GeometryOps, PlanarOps, Validity};
