// ============================================================================
// ACTION PROCESSOR - dispatches an action to the strategy for its kind
// ============================================================================

use std::collections::HashMap;

use crate::actions::{
    Action, ActionKind, HoughCircleParams, HoughMethod, InRangeParams, MAX_ANCHOR, MorphParams, RawAction,
};
use crate::error::ActionError;
use crate::ops::Mat;
use crate::ops::color::{convert, gray_to_mat, in_range};
use crate::ops::hough::{draw_circles, hough_circles};
use crate::ops::morphology::{StructuringElement, morphology_ex};

/// Pure `(action, image) -> image` transform for one or more action kinds.
pub trait ActionStrategy {
    fn process(&self, action: &Action, src: &Mat) -> Result<Mat, ActionError>;
}

/// Shared by erosion, dilation, gradient, opening and closing; the action's
/// kind selects the operation.
#[derive(Default)]
pub struct MorphologyStrategy;

impl MorphologyStrategy {
    fn validate(params: &MorphParams) -> Result<(), ActionError> {
        if params.anchor > MAX_ANCHOR {
            return Err(ActionError::invalid(
                "anchor",
                format!("must be at most {}, got {}", MAX_ANCHOR, params.anchor),
            ));
        }
        Ok(())
    }
}

impl ActionStrategy for MorphologyStrategy {
    fn process(&self, action: &Action, src: &Mat) -> Result<Mat, ActionError> {
        let (op, params) = action.as_morphology().ok_or_else(|| {
            ActionError::UnsupportedAction(format!(
                "morphology strategy does not support {}",
                action.kind().tag()
            ))
        })?;
        Self::validate(params)?;
        let element = StructuringElement::new(params.shape, params.anchor);
        Ok(morphology_ex(src, op, &element))
    }
}

#[derive(Default)]
pub struct InRangeStrategy;

impl InRangeStrategy {
    fn validate(params: &InRangeParams) -> Result<(), ActionError> {
        for (name, bound) in [("lower_boundary", params.lower), ("upper_boundary", params.upper)] {
            if bound.iter().any(|v| !(0..=255).contains(v)) {
                return Err(ActionError::invalid(
                    name,
                    format!("values must lie in 0..=255, got {:?}", bound),
                ));
            }
        }
        Ok(())
    }
}

impl ActionStrategy for InRangeStrategy {
    fn process(&self, action: &Action, src: &Mat) -> Result<Mat, ActionError> {
        let Action::InRange(params) = action else {
            return Err(ActionError::UnsupportedAction(format!(
                "in-range strategy does not support {}",
                action.kind().tag()
            )));
        };
        Self::validate(params)?;
        let converted = convert(src, params.color_space);
        Ok(gray_to_mat(&in_range(&converted, params.lower, params.upper)))
    }
}

#[derive(Default)]
pub struct HoughCircleStrategy;

impl HoughCircleStrategy {
    fn validate(params: &HoughCircleParams) -> Result<(), ActionError> {
        let positive = [
            ("dp", params.dp),
            ("min_dist", params.min_dist),
            ("param1", params.param1),
            ("param2", params.param2),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ActionError::invalid(name, format!("must be a positive number, got {}", value)));
            }
        }
        // The accumulator has (w/dp)*(h/dp) cells.
        if params.dp < 1.0 {
            return Err(ActionError::invalid(
                "dp",
                format!("accumulator scale must be at least 1.0, got {}", params.dp),
            ));
        }
        if params.method == HoughMethod::GradientAlt && params.param2 > 1.0 {
            return Err(ActionError::invalid(
                "param2",
                format!("circle perfectness must be at most 1.0, got {}", params.param2),
            ));
        }
        if params.max_radius != 0 && params.max_radius < params.min_radius {
            return Err(ActionError::invalid(
                "max_radius",
                format!(
                    "must be 0 or at least min_radius ({}), got {}",
                    params.min_radius, params.max_radius
                ),
            ));
        }
        Ok(())
    }
}

impl ActionStrategy for HoughCircleStrategy {
    fn process(&self, action: &Action, src: &Mat) -> Result<Mat, ActionError> {
        let Action::HoughCircle(params) = action else {
            return Err(ActionError::UnsupportedAction(format!(
                "hough strategy does not support {}",
                action.kind().tag()
            )));
        };
        Self::validate(params)?;
        let gray = image::imageops::grayscale(src);
        let circles = hough_circles(&gray, params);
        Ok(draw_circles(src, &circles))
    }
}

/// Registry of strategies keyed by action kind.
pub struct ActionProcessor {
    strategies: HashMap<ActionKind, Box<dyn ActionStrategy>>,
}

impl Default for ActionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionProcessor {
    /// Processor with every built-in strategy registered. `ImageLoaded` has none.
    pub fn new() -> Self {
        let mut processor = Self::empty();
        for kind in [
            ActionKind::Erosion,
            ActionKind::Dilation,
            ActionKind::MorphGradient,
            ActionKind::MorphOpening,
            ActionKind::MorphClosing,
        ] {
            processor.register(kind, Box::new(MorphologyStrategy));
        }
        processor.register(ActionKind::InRange, Box::new(InRangeStrategy));
        processor.register(ActionKind::HoughCircle, Box::new(HoughCircleStrategy));
        processor
    }

    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Replaces any strategy already registered for `kind`.
    pub fn register(&mut self, kind: ActionKind, strategy: Box<dyn ActionStrategy>) {
        self.strategies.insert(kind, strategy);
    }

    pub fn supports(&self, kind: ActionKind) -> bool {
        self.strategies.contains_key(&kind)
    }

    /// Apply `action` to `src`, returning a new image. `src` is never modified.
    pub fn process(&self, action: &Action, src: &Mat) -> Result<Mat, ActionError> {
        let strategy = self
            .strategies
            .get(&action.kind())
            .ok_or_else(|| ActionError::UnsupportedAction(action.describe()))?;
        strategy.process(action, src)
    }

    /// Convert an untyped action, then process it.
    pub fn process_raw(&self, raw: &RawAction, src: &Mat) -> Result<Mat, ActionError> {
        let action = Action::try_from(raw)?;
        self.process(&action, src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ColorSpace, MorphShape};
    use image::Rgb;
    use serde_json::json;

    fn sample() -> Mat {
        Mat::from_fn(16, 12, |x, y| Rgb([(x * 16) as u8, (y * 20) as u8, 90]))
    }

    #[test]
    fn image_loaded_has_no_strategy() {
        let processor = ActionProcessor::new();
        let err = processor
            .process(&Action::image_loaded("a.png"), &sample())
            .unwrap_err();
        assert!(matches!(err, ActionError::UnsupportedAction(_)));
    }

    #[test]
    fn empty_processor_reports_unsupported() {
        let processor = ActionProcessor::empty();
        let action = Action::Erosion(MorphParams::new(MorphShape::Rect, 1));
        assert!(matches!(
            processor.process(&action, &sample()),
            Err(ActionError::UnsupportedAction(_))
        ));
    }

    fn dot(background: u8, dot: u8) -> Mat {
        Mat::from_fn(25, 25, |x, y| {
            let v = if (x, y) == (12, 12) { dot } else { background };
            Rgb([v, v, v])
        })
    }

    fn count(img: &Mat, value: u8) -> u32 {
        img.pixels().filter(|p| p.0 == [value; 3]).count() as u32
    }

    #[test]
    fn morphology_covers_a_square_of_two_anchor_plus_one() {
        let processor = ActionProcessor::new();
        for anchor in [0, 3, 9] {
            let side = 2 * anchor + 1;
            let params = MorphParams::new(MorphShape::Rect, anchor);

            let eroded = processor.process(&Action::Erosion(params), &dot(255, 0)).unwrap();
            assert_eq!(count(&eroded, 0), side * side);

            let dilated = processor.process(&Action::Dilation(params), &dot(0, 255)).unwrap();
            assert_eq!(count(&dilated, 255), side * side);
            assert_eq!(dilated.get_pixel(12 + anchor, 12 - anchor).0, [255; 3]);
        }
    }

    #[test]
    fn source_image_is_not_mutated() {
        let processor = ActionProcessor::new();
        let src = sample();
        let before = src.clone();
        let action = Action::MorphGradient(MorphParams::new(MorphShape::Cross, 2));
        let out = processor.process(&action, &src).unwrap();
        assert_eq!(src, before);
        assert_ne!(out, src);
    }

    #[test]
    fn unsupported_shape_value_is_invalid_for_every_morph_kind() {
        let processor = ActionProcessor::new();
        for tag in [
            "erosion",
            "dilation",
            "morphological_gradient",
            "morphological_opening",
            "morphological_closing",
        ] {
            let raw = RawAction::new(tag)
                .with_param("shape", json!(42))
                .with_param("anchor", json!(2));
            let err = processor.process_raw(&raw, &sample()).unwrap_err();
            assert!(matches!(err, ActionError::InvalidParameter { .. }), "{}: {:?}", tag, err);
        }
    }

    #[test]
    fn in_range_boundary_of_wrong_length_is_invalid() {
        let processor = ActionProcessor::new();
        let raw = RawAction::new("in_range")
            .with_param("color_space", json!("hsv"))
            .with_param("lower_boundary", json!([0, 0, 0]))
            .with_param("upper_boundary", json!([179, 255]));
        let err = processor.process_raw(&raw, &sample()).unwrap_err();
        assert!(matches!(err, ActionError::InvalidParameter { ref name, .. } if name == "upper_boundary"));
    }

    #[test]
    fn missing_color_space_is_reported_by_name() {
        let processor = ActionProcessor::new();
        let raw = RawAction::new("in_range")
            .with_param("lower_boundary", json!([0, 0, 0]))
            .with_param("upper_boundary", json!([179, 255, 255]));
        assert_eq!(
            processor.process_raw(&raw, &sample()).unwrap_err(),
            ActionError::MissingParameter("color_space".to_string())
        );
    }

    #[test]
    fn oversized_anchor_is_invalid() {
        let processor = ActionProcessor::new();
        let action = Action::Dilation(MorphParams::new(MorphShape::Rect, MAX_ANCHOR + 1));
        assert!(matches!(
            processor.process(&action, &sample()),
            Err(ActionError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn in_range_yields_a_binary_mask() {
        let processor = ActionProcessor::new();
        let action = Action::InRange(InRangeParams {
            color_space: ColorSpace::Hsv,
            lower: [0, 0, 0],
            upper: [179, 255, 255],
        });
        let out = processor.process(&action, &sample()).unwrap();
        assert!(out.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn hough_rejects_inverted_radius_range() {
        let processor = ActionProcessor::new();
        let action = Action::HoughCircle(HoughCircleParams {
            min_radius: 30,
            max_radius: 10,
            ..Default::default()
        });
        assert!(matches!(
            processor.process(&action, &sample()),
            Err(ActionError::InvalidParameter { ref name, .. }) if name == "max_radius"
        ));
    }

    #[test]
    fn hough_rejects_dp_below_one() {
        let processor = ActionProcessor::new();
        let disc = Mat::from_fn(64, 64, |x, y| {
            let (dx, dy) = (x as f32 - 32.0, y as f32 - 32.0);
            if dx.hypot(dy) < 20.0 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        });
        for dp in [0.0001, 0.5, 0.999] {
            let action = Action::HoughCircle(HoughCircleParams {
                dp,
                ..Default::default()
            });
            assert!(matches!(
                processor.process(&action, &disc),
                Err(ActionError::InvalidParameter { ref name, .. }) if name == "dp"
            ));
        }
        let action = Action::HoughCircle(HoughCircleParams {
            dp: 1.0,
            ..Default::default()
        });
        assert!(processor.process(&action, &disc).is_ok());
    }

    #[test]
    fn hough_on_a_flat_image_returns_a_copy() {
        let processor = ActionProcessor::new();
        let src = Mat::from_pixel(32, 32, Rgb([10, 10, 10]));
        let out = processor
            .process(&Action::HoughCircle(HoughCircleParams::default()), &src)
            .unwrap();
        assert_eq!(out, src);
    }
}
