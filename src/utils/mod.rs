//! Various utilities functions and types

mod geometry;
mod serial;

pub use self::geometry::{Coordinate, Logical, Physical, Size};
pub use self::serial::Serial;
