pub mod detector;
pub mod point;

pub use detector::LiveDetector;
pub use point::{GeoPosition, PointRecord};
