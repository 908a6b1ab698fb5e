pub mod fuzzy;
pub mod geometry;
pub mod model;
