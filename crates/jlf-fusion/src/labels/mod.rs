//! Label handling around the fusion core.
//!
//! * [`ClassMap`] maps dense class indices to the label ids they stand for.
//! * [`preprocess`] holds the optional pre-passes run on private copies of
//!   the atlas labels before fusion.
//! * [`resolve`] turns per-class probability maps into a segmentation.

pub mod class_map;
pub mod preprocess;
pub mod resolve;

pub use class_map::ClassMap;
pub use preprocess::{assign_background_label, collect_classes, exclude_zero_labels};
pub use resolve::{resolve_images, resolve_segmentation};
