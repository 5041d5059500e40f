use crate::common::{Config, FaceGateError, Result};
use image::{imageops::FilterType, DynamicImage};
use ndarray::{Array4, CowArray};
use ort::{Environment, Session, SessionBuilder, Value};
use std::sync::Arc;

const MIN_CANDIDATE_CONFIDENCE: f32 = 0.001;
const MIN_BOX_SIDE: f32 = 10.0;
const MAX_FACES: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

/// YOLO-style ONNX face detector.
pub struct FaceDetector {
    session: Session,
    _environment: Arc<Environment>,
    input_width: u32,
    input_height: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl FaceDetector {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = &config.models.detector_path;
        if !model_path.exists() {
            return Err(FaceGateError::Model(format!(
                "detector model not found at {}",
                model_path.display()
            )));
        }

        let environment = Arc::new(
            Environment::builder()
                .with_name("face_detector")
                .build()
                .map_err(|e| FaceGateError::Model(format!("failed to create environment: {}", e)))?,
        );

        let session = SessionBuilder::new(&environment)?
            .with_optimization_level(super::optimization_level(config.models.optimization_level))?
            .with_model_from_file(model_path)?;

        Ok(Self {
            session,
            _environment: environment,
            input_width: config.detector.input_width,
            input_height: config.detector.input_height,
            confidence_threshold: config.detector.confidence_threshold,
            iou_threshold: config.detector.iou_threshold,
        })
    }

    /// Detect faces, returned in original image coordinates, most confident
    /// first.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        let orig_width = image.width() as f32;
        let orig_height = image.height() as f32;

        let resized;
        let input = if image.width() == self.input_width && image.height() == self.input_height {
            image
        } else {
            resized = image.resize_exact(self.input_width, self.input_height, FilterType::Nearest);
            &resized
        };

        let array = image_to_array(input);
        let cow_array = CowArray::from(array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let mut faces = self.parse_detections(&outputs)?;

        let scale_x = orig_width / self.input_width as f32;
        let scale_y = orig_height / self.input_height as f32;
        for face in &mut faces {
            face.x1 *= scale_x;
            face.x2 *= scale_x;
            face.y1 *= scale_y;
            face.y2 *= scale_y;
        }

        Ok(faces)
    }

    fn parse_detections(&self, outputs: &[Value]) -> Result<Vec<FaceBox>> {
        let Some(output) = outputs.first() else {
            return Ok(Vec::new());
        };
        let tensor = output.try_extract::<f32>()?;
        let view = tensor.view();
        let shape = view.shape().to_vec();
        let data = view
            .as_slice()
            .ok_or_else(|| FaceGateError::Model("detector output is not contiguous".into()))?;

        // YOLO head: [1, N, 5] with per-box rows, or channel-first [1, 5, N].
        let (count, row_len, transposed) = match shape.as_slice() {
            [_, a, b] if b > a && *a <= 10 => (*b, *a, true),
            [_, a, b] => (*a, *b, false),
            [a, b] => (*a, *b, false),
            other => {
                tracing::warn!(shape = ?other, "unexpected detector output shape");
                return Ok(Vec::new());
            }
        };

        let mut faces = Vec::new();
        for i in 0..count {
            let at = |field: usize| {
                if transposed {
                    data[field * count + i]
                } else {
                    data[i * row_len + field]
                }
            };

            let confidence = if row_len > 4 { at(4) } else { 0.0 };
            if confidence <= MIN_CANDIDATE_CONFIDENCE {
                continue;
            }

            // Outputs may be normalized or already in input-pixel space.
            let scale = if at(0) > 1.0 || at(1) > 1.0 || at(2) > 1.0 || at(3) > 1.0 {
                1.0
            } else {
                self.input_width as f32
            };
            let x_center = at(0) * scale;
            let y_center = at(1) * scale;
            let width = at(2) * scale;
            let height = at(3) * scale;

            let x1 = (x_center - width / 2.0).max(0.0);
            let y1 = (y_center - height / 2.0).max(0.0);
            let x2 = (x_center + width / 2.0).min(self.input_width as f32);
            let y2 = (y_center + height / 2.0).min(self.input_height as f32);

            if x2 - x1 > MIN_BOX_SIDE && y2 - y1 > MIN_BOX_SIDE {
                faces.push(FaceBox {
                    x1,
                    y1,
                    x2,
                    y2,
                    confidence,
                });
            }
        }

        // NMS on all candidates, then the confidence cut.
        let mut faces = apply_nms(faces, self.iou_threshold);
        faces.retain(|face| face.confidence >= self.confidence_threshold);
        faces.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        faces.truncate(MAX_FACES);

        Ok(faces)
    }
}

fn image_to_array(img: &DynamicImage) -> Array4<f32> {
    let rgb = img.to_rgb8();
    let width = rgb.width() as usize;
    let height = rgb.height() as usize;
    let mut array = Array4::<f32>::zeros((1, 3, height, width));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            array[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    array
}

fn apply_nms(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if keep.iter().all(|kept| iou(kept, &candidate) < iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn face(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> FaceBox {
        FaceBox {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = face(0.0, 0.0, 10.0, 10.0, 0.9);
        assert_relative_eq!(iou(&a, &a), 1.0);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = face(0.0, 0.0, 10.0, 10.0, 0.9);
        let b = face(20.0, 20.0, 30.0, 30.0, 0.8);
        assert_relative_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn nms_suppresses_overlapping_duplicates() {
        let boxes = vec![
            face(0.0, 0.0, 100.0, 100.0, 0.9),
            face(5.0, 5.0, 105.0, 105.0, 0.7),
            face(200.0, 200.0, 300.0, 300.0, 0.8),
        ];

        let kept = apply_nms(boxes, 0.45);
        assert_eq!(kept.len(), 2);
        // survivor of the overlapping pair is the higher-confidence one
        assert_relative_eq!(kept[0].confidence, 0.9);
        assert_relative_eq!(kept[1].confidence, 0.8);
    }

    #[test]
    fn nms_keeps_disjoint_boxes() {
        let boxes = vec![
            face(0.0, 0.0, 50.0, 50.0, 0.6),
            face(60.0, 60.0, 110.0, 110.0, 0.5),
        ];
        assert_eq!(apply_nms(boxes, 0.45).len(), 2);
    }
}
