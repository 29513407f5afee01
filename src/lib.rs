//! A moving point charge whose field propagates with a finite speed.
//!
//! Instead of solving Maxwell's equations, the motion of the [`Source`] is
//! recorded into a [`MotionHistory`](history::MotionHistory) that is indexed
//! by distance. Since the propagation speed is constant, the retarded state
//! seen at some distance is just an offset into that buffer.
//!
//! ```
//! use nalgebra::Point2;
//! use radiating_charge::{
//!     movement::SinusoidalMovement,
//!     source::Source,
//! };
//!
//! let mut source = Source::new(Point2::origin(), 6.0, 2000, SinusoidalMovement::new(0.02, 50.0))?;
//! for tick in 1..=100 {
//!     source.update(tick as f64, 1.0);
//! }
//! let field = source.dynamic_field_at(&Point2::new(310.0, 0.0))?;
//! assert!(field.norm() > 0.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod executor;
pub mod field;
pub mod history;
pub mod movement;
pub mod physics;
pub mod source;

pub use crate::source::Source;
