pub mod blob;
pub mod blob_locator;
pub mod contour;
pub mod frame;
pub mod glyphs;
pub mod gesture;
pub mod hsv;
pub mod overlay;
pub mod segmenter;
pub mod smoother;
pub mod tracker;
