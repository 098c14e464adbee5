// ============================================================================
// ACTIONS - immutable descriptions of one image-transforming operation
// ============================================================================
//
// `Action` is the typed form built by dialogs and the CLI. `RawAction` is the
// untyped `{"action_type": ..., "params": {...}}` form read from recipe
// files; converting it is the only place a parameter can be missing.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ActionError;

/// Largest anchor accepted by the morphology strategy (kernel side 255).
pub const MAX_ANCHOR: u32 = 127;

// ============================================================================
// ACTION KIND - the tag used for strategy dispatch
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Erosion,
    Dilation,
    MorphGradient,
    MorphOpening,
    MorphClosing,
    InRange,
    HoughCircle,
    ImageLoaded,
}

impl ActionKind {
    pub fn all() -> &'static [ActionKind] {
        &[
            ActionKind::Erosion,
            ActionKind::Dilation,
            ActionKind::MorphGradient,
            ActionKind::MorphOpening,
            ActionKind::MorphClosing,
            ActionKind::InRange,
            ActionKind::HoughCircle,
            ActionKind::ImageLoaded,
        ]
    }

    /// Stable tag used in recipe files.
    pub fn tag(&self) -> &'static str {
        match self {
            ActionKind::Erosion => "erosion",
            ActionKind::Dilation => "dilation",
            ActionKind::MorphGradient => "morphological_gradient",
            ActionKind::MorphOpening => "morphological_opening",
            ActionKind::MorphClosing => "morphological_closing",
            ActionKind::InRange => "in_range",
            ActionKind::HoughCircle => "hough_circle",
            ActionKind::ImageLoaded => "image_loaded",
        }
    }

    pub fn from_tag(tag: &str) -> Option<ActionKind> {
        Self::all().iter().copied().find(|k| k.tag() == tag)
    }

    /// Morphological sub-operation for the five morphology kinds.
    pub fn morph_op(&self) -> Option<MorphOp> {
        match self {
            ActionKind::Erosion => Some(MorphOp::Erode),
            ActionKind::Dilation => Some(MorphOp::Dilate),
            ActionKind::MorphGradient => Some(MorphOp::Gradient),
            ActionKind::MorphOpening => Some(MorphOp::Open),
            ActionKind::MorphClosing => Some(MorphOp::Close),
            _ => None,
        }
    }
}

// ============================================================================
// PARAMETER TYPES
// ============================================================================

/// Structuring element shape. Raw codes match OpenCV's `MORPH_*` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum MorphShape {
    #[default]
    Rect,
    Cross,
    Ellipse,
}

impl MorphShape {
    pub fn all() -> &'static [MorphShape] {
        &[MorphShape::Rect, MorphShape::Cross, MorphShape::Ellipse]
    }

    pub fn code(&self) -> i64 {
        match self {
            MorphShape::Rect => 0,
            MorphShape::Cross => 1,
            MorphShape::Ellipse => 2,
        }
    }

    pub fn from_code(code: i64) -> Result<MorphShape, ActionError> {
        match code {
            0 => Ok(MorphShape::Rect),
            1 => Ok(MorphShape::Cross),
            2 => Ok(MorphShape::Ellipse),
            other => Err(ActionError::invalid(
                "shape",
                format!("{} is not one of 0 (Rect), 1 (Cross), 2 (Ellipse)", other),
            )),
        }
    }

    pub fn from_name(name: &str) -> Result<MorphShape, ActionError> {
        match name.to_lowercase().as_str() {
            "rect" => Ok(MorphShape::Rect),
            "cross" => Ok(MorphShape::Cross),
            "ellipse" => Ok(MorphShape::Ellipse),
            other => Err(ActionError::invalid(
                "shape",
                format!("\"{}\" is not one of rect, cross, ellipse", other),
            )),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MorphShape::Rect => "Rect",
            MorphShape::Cross => "Cross",
            MorphShape::Ellipse => "Ellipse",
        }
    }
}

/// Morphological operation shared by the morphology strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum MorphOp {
    #[default]
    Erode,
    Dilate,
    Gradient,
    Open,
    Close,
}

impl MorphOp {
    pub fn all() -> &'static [MorphOp] {
        &[
            MorphOp::Erode,
            MorphOp::Dilate,
            MorphOp::Gradient,
            MorphOp::Open,
            MorphOp::Close,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            MorphOp::Erode => "Erode",
            MorphOp::Dilate => "Dilate",
            MorphOp::Gradient => "Morphological gradient",
            MorphOp::Open => "Opening: dilate(erode(src))",
            MorphOp::Close => "Closing: erode(dilate(src))",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MorphParams {
    pub shape: MorphShape,
    /// Kernel size is `2 * anchor + 1`.
    pub anchor: u32,
}

impl MorphParams {
    pub fn new(shape: MorphShape, anchor: u32) -> Self {
        Self { shape, anchor }
    }

    pub fn kernel_size(&self) -> u32 {
        2 * self.anchor + 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ColorSpace {
    #[default]
    Hsv,
}

impl ColorSpace {
    pub fn all() -> &'static [ColorSpace] {
        &[ColorSpace::Hsv]
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ColorSpace::Hsv => "hsv",
        }
    }

    pub fn from_tag(tag: &str) -> Result<ColorSpace, ActionError> {
        match tag.to_lowercase().as_str() {
            "hsv" => Ok(ColorSpace::Hsv),
            other => Err(ActionError::invalid(
                "color_space",
                format!("color space \"{}\" is not supported", other),
            )),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ColorSpace::Hsv => "HSV",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct InRangeParams {
    pub color_space: ColorSpace,
    pub lower: [i32; 3],
    pub upper: [i32; 3],
}

/// Hough transform variant. Raw codes match OpenCV's `HOUGH_GRADIENT*`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum HoughMethod {
    Gradient,
    #[default]
    GradientAlt,
}

impl HoughMethod {
    pub fn all() -> &'static [HoughMethod] {
        &[HoughMethod::Gradient, HoughMethod::GradientAlt]
    }

    pub fn code(&self) -> i64 {
        match self {
            HoughMethod::Gradient => 3,
            HoughMethod::GradientAlt => 4,
        }
    }

    pub fn from_code(code: i64) -> Result<HoughMethod, ActionError> {
        match code {
            3 => Ok(HoughMethod::Gradient),
            4 => Ok(HoughMethod::GradientAlt),
            other => Err(ActionError::invalid(
                "method",
                format!("{} is not one of 3 (HOUGH_GRADIENT), 4 (HOUGH_GRADIENT_ALT)", other),
            )),
        }
    }

    pub fn from_name(name: &str) -> Result<HoughMethod, ActionError> {
        match name.to_lowercase().as_str() {
            "gradient" | "hough_gradient" => Ok(HoughMethod::Gradient),
            "gradient_alt" | "hough_gradient_alt" => Ok(HoughMethod::GradientAlt),
            other => Err(ActionError::invalid(
                "method",
                format!("\"{}\" is not one of gradient, gradient_alt", other),
            )),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HoughMethod::Gradient => "HOUGH_GRADIENT",
            HoughMethod::GradientAlt => "HOUGH_GRADIENT_ALT",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HoughCircleParams {
    pub method: HoughMethod,
    /// Inverse ratio of accumulator resolution to image resolution.
    pub dp: f64,
    /// Minimum distance between detected centres.
    pub min_dist: f64,
    /// Upper Canny threshold.
    pub param1: f64,
    /// Accumulator threshold (votes), or circle perfectness for `GradientAlt`.
    pub param2: f64,
    pub min_radius: u32,
    /// `0` means no upper bound.
    pub max_radius: u32,
}

impl Default for HoughCircleParams {
    fn default() -> Self {
        Self {
            method: HoughMethod::GradientAlt,
            dp: 1.5,
            min_dist: 20.0,
            param1: 300.0,
            param2: 0.9,
            min_radius: 0,
            max_radius: 0,
        }
    }
}

// ============================================================================
// ACTION
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Erosion(MorphParams),
    Dilation(MorphParams),
    MorphGradient(MorphParams),
    MorphOpening(MorphParams),
    MorphClosing(MorphParams),
    InRange(InRangeParams),
    HoughCircle(HoughCircleParams),
    /// Sentinel for the first history entry of a session.
    ImageLoaded { path: PathBuf },
}

impl Action {
    /// Build the morphology variant matching `op`.
    pub fn morphology(op: MorphOp, params: MorphParams) -> Action {
        match op {
            MorphOp::Erode => Action::Erosion(params),
            MorphOp::Dilate => Action::Dilation(params),
            MorphOp::Gradient => Action::MorphGradient(params),
            MorphOp::Open => Action::MorphOpening(params),
            MorphOp::Close => Action::MorphClosing(params),
        }
    }

    pub fn image_loaded(path: impl AsRef<Path>) -> Action {
        Action::ImageLoaded {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Erosion(_) => ActionKind::Erosion,
            Action::Dilation(_) => ActionKind::Dilation,
            Action::MorphGradient(_) => ActionKind::MorphGradient,
            Action::MorphOpening(_) => ActionKind::MorphOpening,
            Action::MorphClosing(_) => ActionKind::MorphClosing,
            Action::InRange(_) => ActionKind::InRange,
            Action::HoughCircle(_) => ActionKind::HoughCircle,
            Action::ImageLoaded { .. } => ActionKind::ImageLoaded,
        }
    }

    /// Operation and parameters of a morphology action.
    pub fn as_morphology(&self) -> Option<(MorphOp, &MorphParams)> {
        match self {
            Action::Erosion(p)
            | Action::Dilation(p)
            | Action::MorphGradient(p)
            | Action::MorphOpening(p)
            | Action::MorphClosing(p) => self.kind().morph_op().map(|op| (op, p)),
            _ => None,
        }
    }

    pub fn is_image_loaded(&self) -> bool {
        matches!(self, Action::ImageLoaded { .. })
    }

    /// One-line label for the history list.
    pub fn describe(&self) -> String {
        if let Some((op, p)) = self.as_morphology() {
            let name = match op {
                MorphOp::Erode => "Erosion",
                MorphOp::Dilate => "Dilation",
                MorphOp::Gradient => "Morphological gradient",
                MorphOp::Open => "Opening",
                MorphOp::Close => "Closing",
            };
            return format!(
                "{}: {} {}x{} (anchor {})",
                name,
                p.shape.label(),
                p.kernel_size(),
                p.kernel_size(),
                p.anchor
            );
        }
        match self {
            Action::InRange(p) => format!(
                "inRange ({}): {:?} .. {:?}",
                p.color_space.label(),
                p.lower,
                p.upper
            ),
            Action::HoughCircle(p) => format!(
                "Hough circles ({}): dp={} minDist={} param1={} param2={} r={}..{}",
                p.method.label(),
                p.dp,
                p.min_dist,
                p.param1,
                p.param2,
                p.min_radius,
                p.max_radius
            ),
            Action::ImageLoaded { path } => {
                let name = path
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                format!("Image loaded: {}", name)
            }
            _ => self.kind().tag().to_string(),
        }
    }

    /// Untyped form, as written to recipe files.
    pub fn to_raw(&self) -> RawAction {
        let params = match self {
            Action::Erosion(p)
            | Action::Dilation(p)
            | Action::MorphGradient(p)
            | Action::MorphOpening(p)
            | Action::MorphClosing(p) => json!({
                "shape": p.shape.code(),
                "anchor": p.anchor,
            }),
            Action::InRange(p) => json!({
                "color_space": p.color_space.tag(),
                "lower_boundary": p.lower,
                "upper_boundary": p.upper,
            }),
            Action::HoughCircle(p) => json!({
                "method": p.method.code(),
                "dp": p.dp,
                "min_dist": p.min_dist,
                "param1": p.param1,
                "param2": p.param2,
                "min_radius": p.min_radius,
                "max_radius": p.max_radius,
            }),
            Action::ImageLoaded { path } => json!({
                "path": path.to_string_lossy(),
            }),
        };
        RawAction {
            action_type: self.kind().tag().to_string(),
            params: match params {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }
}

// ============================================================================
// RAW ACTION - untyped tag + parameter bag
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawAction {
    pub action_type: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl RawAction {
    pub fn new(action_type: &str) -> Self {
        Self {
            action_type: action_type.to_string(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: Value) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }

    fn param(&self, name: &str) -> Result<&Value, ActionError> {
        self.params
            .get(name)
            .ok_or_else(|| ActionError::missing(name))
    }

    fn int_param(&self, name: &str) -> Result<i64, ActionError> {
        let value = self.param(name)?;
        value
            .as_i64()
            .ok_or_else(|| ActionError::invalid(name, format!("expected an integer, got {}", value)))
    }

    fn uint_param(&self, name: &str) -> Result<u32, ActionError> {
        let value = self.int_param(name)?;
        u32::try_from(value)
            .map_err(|_| ActionError::invalid(name, format!("expected a non-negative integer, got {}", value)))
    }

    fn float_param(&self, name: &str) -> Result<f64, ActionError> {
        let value = self.param(name)?;
        value
            .as_f64()
            .ok_or_else(|| ActionError::invalid(name, format!("expected a number, got {}", value)))
    }

    fn triple_param(&self, name: &str) -> Result<[i32; 3], ActionError> {
        let value = self.param(name)?;
        let items = value.as_array().ok_or_else(|| {
            ActionError::invalid(name, format!("must be array with 3 int values. Provided value: {}", value))
        })?;
        if items.len() != 3 {
            return Err(ActionError::invalid(
                name,
                format!("must be array with 3 int values. Provided value: {}", value),
            ));
        }
        let mut out = [0i32; 3];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = item
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| ActionError::invalid(name, format!("{} is not an int value", item)))?;
        }
        Ok(out)
    }

    /// Enum parameters may be given as their numeric code or by name.
    fn shape_param(&self) -> Result<MorphShape, ActionError> {
        match self.param("shape")? {
            Value::String(s) => MorphShape::from_name(s),
            _ => MorphShape::from_code(self.int_param("shape")?),
        }
    }

    fn method_param(&self) -> Result<HoughMethod, ActionError> {
        match self.param("method")? {
            Value::String(s) => HoughMethod::from_name(s),
            _ => HoughMethod::from_code(self.int_param("method")?),
        }
    }

    fn morph_params(&self) -> Result<MorphParams, ActionError> {
        let anchor = self.uint_param("anchor")?;
        let shape = self.shape_param()?;
        Ok(MorphParams { shape, anchor })
    }
}

impl TryFrom<&RawAction> for Action {
    type Error = ActionError;

    fn try_from(raw: &RawAction) -> Result<Action, ActionError> {
        let kind = ActionKind::from_tag(&raw.action_type)
            .ok_or_else(|| ActionError::UnsupportedAction(raw.action_type.clone()))?;

        if let Some(op) = kind.morph_op() {
            return Ok(Action::morphology(op, raw.morph_params()?));
        }

        match kind {
            ActionKind::InRange => {
                let color_space = match raw.param("color_space")? {
                    Value::String(s) => ColorSpace::from_tag(s)?,
                    other => {
                        return Err(ActionError::invalid(
                            "color_space",
                            format!("expected a string, got {}", other),
                        ));
                    }
                };
                Ok(Action::InRange(InRangeParams {
                    color_space,
                    lower: raw.triple_param("lower_boundary")?,
                    upper: raw.triple_param("upper_boundary")?,
                }))
            }
            ActionKind::HoughCircle => Ok(Action::HoughCircle(HoughCircleParams {
                method: raw.method_param()?,
                dp: raw.float_param("dp")?,
                min_dist: raw.float_param("min_dist")?,
                param1: raw.float_param("param1")?,
                param2: raw.float_param("param2")?,
                min_radius: raw.uint_param("min_radius")?,
                max_radius: raw.uint_param("max_radius")?,
            })),
            ActionKind::ImageLoaded => match raw.param("path")? {
                Value::String(s) => Ok(Action::image_loaded(s)),
                other => Err(ActionError::invalid("path", format!("expected a string, got {}", other))),
            },
            _ => Err(ActionError::UnsupportedAction(raw.action_type.clone())),
        }
    }
}

impl TryFrom<RawAction> for Action {
    type Error = ActionError;

    fn try_from(raw: RawAction) -> Result<Action, ActionError> {
        Action::try_from(&raw)
    }
}
