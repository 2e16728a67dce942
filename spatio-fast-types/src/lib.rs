//! # spatio-fast-types
//!
//! Geometry primitives shared by the spatio-fast index.
//!
//! - **Point**: an immutable `(x, y)` coordinate pair
//! - **Rectangle**: an axis-aligned box with overlap, intersection and grid
//!   mapping helpers
//!
//! Both types wrap the `geo` crate's primitives and are serializable with Serde.
//!
//! ## Examples
//!
//! ```rust
//! use spatio_fast_types::point::Point;
//! use spatio_fast_types::rect::Rectangle;
//!
//! let area = Rectangle::new(0.0, 0.0, 10.0, 10.0);
//! assert!(area.contains_point(&Point::new(5.0, 5.0)));
//! assert_eq!(area.area(), 100.0);
//! ```

pub mod point;
pub mod rect;

pub use point::Point;
pub use rect::{CellSpan, OVERLAP_EPSILON, Rectangle};
