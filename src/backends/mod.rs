//! Segmentation backend implementations

#[cfg(feature = "onnx")]
pub mod onnx;
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmenter;
pub use test_utils::StaticSegmenter;
