//! ONNX Runtime segmentation backend
//!
//! Loads a YOLO-style instance segmentation graph via ONNX Runtime and
//! decodes its raw outputs into per-instance boolean masks with parallel
//! bounding boxes and class labels. The graph is expected to produce two
//! outputs: the prediction matrix `[1, 4 + classes + coefficients, anchors]`
//! and the mask prototype tensor `[1, coefficients, proto_h, proto_w]`.

use crate::config::CutoutConfig;
use crate::error::{Result, ShoecutError};
use crate::inference::Segmenter;
use crate::types::{BoundingBox, Detection, InstanceMask, Segmentation};
use crate::utils::ImagePreprocessor;
use image::RgbImage;
use ndarray::{Array3, Array4, Ix3, Ix4};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

/// ONNX Runtime backend for the trained shoe segmentation model
pub struct OnnxSegmenter {
    config: CutoutConfig,
    session: Option<Session>,
    initialized: bool,
}

/// One raw prediction column that survived the confidence threshold
#[derive(Debug, Clone)]
struct Candidate {
    bbox: BoundingBox,
    confidence: f32,
    class_id: usize,
    coefficients: Vec<f32>,
}

impl OnnxSegmenter {
    /// Create a new backend; the model is loaded on first use
    #[must_use]
    pub fn new(config: CutoutConfig) -> Self {
        Self {
            config,
            session: None,
            initialized: false,
        }
    }

    fn load_model(&mut self) -> Result<()> {
        let model_load_start = std::time::Instant::now();
        let model_path = &self.config.model_path;

        if !model_path.exists() {
            return Err(ShoecutError::model(format!(
                "weights file '{}' not found in the working directory",
                model_path.display()
            )));
        }

        let mut session_builder = Session::builder()
            .map_err(|e| ShoecutError::inference(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                ShoecutError::inference(format!("Failed to set optimization level: {e}"))
            })?;

        // CPU execution; intra-op threading is the only tunable
        let intra_threads = if self.config.intra_threads > 0 {
            self.config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
        };
        session_builder = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| ShoecutError::inference(format!("Failed to set intra threads: {e}")))?;

        let session = session_builder.commit_from_file(model_path).map_err(|e| {
            ShoecutError::model(format!(
                "Failed to load model '{}': {e}",
                model_path.display()
            ))
        })?;

        log::debug!("✅ ONNX Runtime session created successfully");
        log::debug!("  - Model: {}", model_path.display());
        log::debug!("  - Threading: {intra_threads} intra-op threads");
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            model_load_start.elapsed().as_secs_f64() * 1000.0
        );

        self.session = Some(session);
        self.initialized = true;
        Ok(())
    }

    /// Run the session and return owned prediction and prototype tensors
    fn run_session(&mut self, input: Array4<f32>) -> Result<(Array3<f32>, Array4<f32>)> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ShoecutError::inference("ONNX session not initialized"))?;

        let input_value = Value::from_array(input)
            .map_err(|e| ShoecutError::processing(format!("Failed to convert input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| ShoecutError::inference(format!("ONNX inference failed: {e}")))?;

        // Positional output access: predictions first, prototypes second
        let keys: Vec<_> = outputs.keys().collect();
        let (Some(pred_key), Some(proto_key)) = (keys.first().copied(), keys.get(1).copied())
        else {
            return Err(ShoecutError::inference(format!(
                "expected 2 output tensors (predictions, prototypes), got {}",
                keys.len()
            )));
        };

        let predictions = outputs
            .get(pred_key)
            .ok_or_else(|| ShoecutError::processing("Prediction tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| ShoecutError::processing(format!("Failed to extract predictions: {e}")))?
            .into_dimensionality::<Ix3>()
            .map_err(|e| ShoecutError::parse(format!("Unexpected prediction tensor rank: {e}")))?
            .to_owned();

        let prototypes = outputs
            .get(proto_key)
            .ok_or_else(|| ShoecutError::processing("Prototype tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| ShoecutError::processing(format!("Failed to extract prototypes: {e}")))?
            .into_dimensionality::<Ix4>()
            .map_err(|e| ShoecutError::parse(format!("Unexpected prototype tensor rank: {e}")))?
            .to_owned();

        Ok((predictions, prototypes))
    }
}

impl Segmenter for OnnxSegmenter {
    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.load_model()
    }

    fn segment(&mut self, image: &RgbImage) -> Result<Segmentation> {
        if !self.initialized {
            self.initialize()?;
        }

        let inference_start = std::time::Instant::now();
        let input = ImagePreprocessor::to_tensor(image);
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let (predictions, prototypes) = self.run_session(input)?;

        let segmentation = decode_segmentation(
            &predictions,
            &prototypes,
            self.config.confidence_threshold,
            self.config.iou_threshold,
            self.config.mask_threshold,
            self.config.canonical_size,
        )?;

        log::info!(
            "📊 Inference complete: {} instance(s) in {:.2}ms",
            segmentation.detections.len(),
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(segmentation)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Decode raw YOLO-seg outputs into thresholded, suppressed instances
///
/// Prediction columns are `[cx, cy, w, h, class scores.., mask coefficients..]`
/// where the coefficient count equals the prototype channel count. Columns
/// below `confidence_threshold` are dropped, the rest go through class-aware
/// non-maximum suppression, and each survivor gets a boolean mask built from
/// its coefficients against the prototype tensor.
pub(crate) fn decode_segmentation(
    predictions: &Array3<f32>,
    prototypes: &Array4<f32>,
    confidence_threshold: f32,
    iou_threshold: f32,
    mask_threshold: f32,
    canonical_size: u32,
) -> Result<Segmentation> {
    let pred_shape = predictions.shape();
    let channels = pred_shape.get(1).copied().unwrap_or(0);
    let anchors = pred_shape.get(2).copied().unwrap_or(0);
    let coefficient_count = prototypes.shape().get(1).copied().unwrap_or(0);

    let num_classes = channels
        .checked_sub(4 + coefficient_count)
        .filter(|&nc| nc > 0)
        .ok_or_else(|| {
            ShoecutError::parse(format!(
                "prediction tensor has {channels} channels but prototypes carry \
                 {coefficient_count} coefficients; no room for class scores"
            ))
        })?;

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let mut best_class = 0usize;
        let mut best_score = 0.0f32;
        for class in 0..num_classes {
            let score = predictions[[0, 4 + class, anchor]];
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }
        if best_score < confidence_threshold {
            continue;
        }

        let cx = predictions[[0, 0, anchor]];
        let cy = predictions[[0, 1, anchor]];
        let w = predictions[[0, 2, anchor]];
        let h = predictions[[0, 3, anchor]];
        let bbox = BoundingBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0);

        let coefficients = (0..coefficient_count)
            .map(|k| predictions[[0, 4 + num_classes + k, anchor]])
            .collect();

        candidates.push(Candidate {
            bbox,
            confidence: best_score,
            class_id: best_class,
            coefficients,
        });
    }

    let kept = non_maximum_suppression(candidates, iou_threshold);

    let mut detections = Vec::with_capacity(kept.len());
    let mut masks = Vec::with_capacity(kept.len());
    for candidate in kept {
        masks.push(instance_mask(
            &candidate,
            prototypes,
            mask_threshold,
            canonical_size,
        ));
        detections.push(Detection {
            class_id: candidate.class_id,
            confidence: candidate.confidence,
            bbox: candidate.bbox,
        });
    }

    Ok(Segmentation { detections, masks })
}

/// Greedy class-aware non-maximum suppression, highest confidence first
fn non_maximum_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut result = Vec::new();
    while !candidates.is_empty() {
        let best = candidates.remove(0);
        candidates.retain(|other| {
            other.class_id != best.class_id || best.bbox.iou(&other.bbox) < iou_threshold
        });
        result.push(best);
    }
    result
}

/// Build a boolean mask for one instance from its prototype coefficients
///
/// The coefficient/prototype dot product lives at the prototype resolution;
/// the sigmoid of each cell is thresholded and sampled nearest-neighbor up to
/// the canonical grid, restricted to the (clamped) detection box.
fn instance_mask(
    candidate: &Candidate,
    prototypes: &Array4<f32>,
    mask_threshold: f32,
    canonical_size: u32,
) -> InstanceMask {
    let proto_shape = prototypes.shape();
    let proto_h = proto_shape.get(2).copied().unwrap_or(0);
    let proto_w = proto_shape.get(3).copied().unwrap_or(0);

    let mut mask = InstanceMask::empty(canonical_size, canonical_size);
    if proto_h == 0 || proto_w == 0 {
        return mask;
    }

    // Low-resolution foreground scores for this instance
    let mut scores = vec![0.0f32; proto_h * proto_w];
    for (k, coefficient) in candidate.coefficients.iter().enumerate() {
        for py in 0..proto_h {
            for px in 0..proto_w {
                if let Some(cell) = scores.get_mut(py * proto_w + px) {
                    *cell += coefficient * prototypes[[0, k, py, px]];
                }
            }
        }
    }

    let Some(rect) = candidate.bbox.to_pixel_rect(canonical_size, canonical_size) else {
        return mask;
    };

    for y in rect.y_min..rect.y_max {
        let py = (y as usize * proto_h) / canonical_size as usize;
        for x in rect.x_min..rect.x_max {
            let px = (x as usize * proto_w) / canonical_size as usize;
            let score = scores.get(py * proto_w + px).copied().unwrap_or(f32::MIN);
            if sigmoid(score) > mask_threshold {
                mask.set(x, y);
            }
        }
    }

    mask
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    // Two classes, two coefficients, 4x4 prototype grid, 16px canonical size.
    const CHANNELS: usize = 4 + 2 + 2;

    fn prototypes_all_ones() -> Array4<f32> {
        Array4::from_elem((1, 2, 4, 4), 1.0)
    }

    fn prediction_column(
        predictions: &mut Array3<f32>,
        anchor: usize,
        bbox_cxcywh: [f32; 4],
        scores: [f32; 2],
        coefficients: [f32; 2],
    ) {
        for (i, v) in bbox_cxcywh.iter().enumerate() {
            predictions[[0, i, anchor]] = *v;
        }
        for (i, v) in scores.iter().enumerate() {
            predictions[[0, 4 + i, anchor]] = *v;
        }
        for (i, v) in coefficients.iter().enumerate() {
            predictions[[0, 6 + i, anchor]] = *v;
        }
    }

    #[test]
    fn test_decode_thresholds_low_confidence() {
        let mut predictions = Array3::zeros((1, CHANNELS, 2));
        prediction_column(&mut predictions, 0, [8.0, 8.0, 8.0, 8.0], [0.9, 0.1], [4.0, 4.0]);
        prediction_column(&mut predictions, 1, [4.0, 4.0, 4.0, 4.0], [0.3, 0.2], [4.0, 4.0]);

        let segmentation = decode_segmentation(
            &predictions,
            &prototypes_all_ones(),
            0.5,
            0.45,
            0.5,
            16,
        )
        .unwrap();

        assert_eq!(segmentation.detections.len(), 1);
        assert_eq!(segmentation.detections[0].class_id, 0);
        assert!((segmentation.detections[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_decode_box_conversion() {
        let mut predictions = Array3::zeros((1, CHANNELS, 1));
        prediction_column(&mut predictions, 0, [8.0, 8.0, 4.0, 6.0], [0.8, 0.0], [4.0, 4.0]);

        let segmentation = decode_segmentation(
            &predictions,
            &prototypes_all_ones(),
            0.5,
            0.45,
            0.5,
            16,
        )
        .unwrap();

        let bbox = segmentation.detections[0].bbox;
        assert_eq!((bbox.x1, bbox.y1, bbox.x2, bbox.y2), (6.0, 5.0, 10.0, 11.0));
    }

    #[test]
    fn test_decode_mask_restricted_to_box() {
        let mut predictions = Array3::zeros((1, CHANNELS, 1));
        // box covering the left half; strongly positive coefficients make
        // every in-box prototype cell foreground
        prediction_column(&mut predictions, 0, [4.0, 8.0, 8.0, 16.0], [0.9, 0.0], [4.0, 4.0]);

        let segmentation = decode_segmentation(
            &predictions,
            &prototypes_all_ones(),
            0.5,
            0.45,
            0.5,
            16,
        )
        .unwrap();

        let mask = &segmentation.masks[0];
        assert!(mask.is_set(0, 0));
        assert!(mask.is_set(7, 15));
        // outside the detection box
        assert!(!mask.is_set(8, 8));
        assert_eq!(mask.coverage(), 8 * 16);
    }

    #[test]
    fn test_nms_suppresses_same_class_overlap() {
        let mut predictions = Array3::zeros((1, CHANNELS, 3));
        prediction_column(&mut predictions, 0, [8.0, 8.0, 8.0, 8.0], [0.9, 0.0], [4.0, 4.0]);
        // near-identical box, lower confidence: suppressed
        prediction_column(&mut predictions, 1, [8.5, 8.0, 8.0, 8.0], [0.7, 0.0], [4.0, 4.0]);
        // same box, other class: kept
        prediction_column(&mut predictions, 2, [8.0, 8.0, 8.0, 8.0], [0.0, 0.8], [4.0, 4.0]);

        let segmentation = decode_segmentation(
            &predictions,
            &prototypes_all_ones(),
            0.5,
            0.45,
            0.5,
            16,
        )
        .unwrap();

        assert_eq!(segmentation.detections.len(), 2);
        let classes: Vec<usize> = segmentation
            .detections
            .iter()
            .map(|d| d.class_id)
            .collect();
        assert!(classes.contains(&0));
        assert!(classes.contains(&1));
    }

    #[test]
    fn test_decode_detections_sorted_by_confidence() {
        let mut predictions = Array3::zeros((1, CHANNELS, 2));
        prediction_column(&mut predictions, 0, [3.0, 3.0, 4.0, 4.0], [0.6, 0.0], [4.0, 4.0]);
        prediction_column(&mut predictions, 1, [12.0, 12.0, 4.0, 4.0], [0.95, 0.0], [4.0, 4.0]);

        let segmentation = decode_segmentation(
            &predictions,
            &prototypes_all_ones(),
            0.5,
            0.45,
            0.5,
            16,
        )
        .unwrap();

        assert_eq!(segmentation.detections.len(), 2);
        assert!(segmentation.detections[0].confidence >= segmentation.detections[1].confidence);
        assert_eq!(segmentation.masks.len(), 2);
    }

    #[test]
    fn test_decode_rejects_inconsistent_layout() {
        // 6 channels cannot hold 4 box values + 2 coefficients + any class
        let predictions = Array3::zeros((1, 6, 4));
        let result = decode_segmentation(
            &predictions,
            &prototypes_all_ones(),
            0.5,
            0.45,
            0.5,
            16,
        );
        assert!(matches!(result, Err(ShoecutError::Parse(_))));
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(8.0) > 0.99);
        assert!(sigmoid(-8.0) < 0.01);
    }
}
