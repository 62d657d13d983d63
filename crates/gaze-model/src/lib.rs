//! Gazefit Model
//!
//! Defines the data contracts shared by every stage of the gaze pipeline:
//! - **Landmarks:** per-frame facial landmark sets and recorded landmark streams
//! - **Features:** versioned feature layouts and the vectors they produce
//! - **Samples:** calibration samples and the sample file format
//! - **Model:** the trained two-axis ridge model artifact
//! - **Estimates:** gaze points and per-frame inference output
//!
//! All screen coordinates are normalized to `[0.0, 1.0]` so samples and
//! models survive resolution changes.

pub mod estimate;
pub mod feature;
pub mod landmark;
pub mod model;
pub mod sample;
pub mod screen;

pub use estimate::*;
pub use feature::*;
pub use landmark::*;
pub use model::*;
pub use sample::*;
pub use screen::*;
