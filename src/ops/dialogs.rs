// ============================================================================
// OPS DIALOG SYSTEM - modal dialogs that build actions
// ============================================================================
//
// Every dialog owns its parameters, draws itself once per frame and reports
// a `DialogResult<Action>`. The caller previews on `Changed`, applies on `Ok`
// and discards the preview on `Cancel`.

use eframe::egui;
use egui::{Color32, Pos2, Rect, Rounding, Sense, Stroke, Vec2};

use crate::actions::{
    Action, ColorSpace, HoughCircleParams, HoughMethod, InRangeParams, MorphOp, MorphParams, MorphShape,
};
use crate::ops::color::hsv_cv_to_rgb;

/// Largest anchor the morphology slider offers.
pub const ANCHOR_SLIDER_MAX: u32 = 40;

// ============================================================================
// ACTIVE-DIALOG ENUM - at most one modal dialog is open at a time
// ============================================================================

#[derive(Default)]
pub enum ActiveDialog {
    #[default]
    None,
    Morphology(MorphologyDialog),
    InRange(InRangeDialog),
    HoughCircle(HoughCircleDialog),
}

impl ActiveDialog {
    pub fn is_none(&self) -> bool {
        matches!(self, ActiveDialog::None)
    }

    /// Draw whichever dialog is open.
    pub fn show(&mut self, ctx: &egui::Context) -> DialogResult<Action> {
        match self {
            ActiveDialog::None => DialogResult::Open,
            ActiveDialog::Morphology(d) => d.show(ctx),
            ActiveDialog::InRange(d) => d.show(ctx),
            ActiveDialog::HoughCircle(d) => d.show(ctx),
        }
    }
}

/// Result returned by each dialog's `show()` method every frame.
#[derive(Debug, PartialEq)]
pub enum DialogResult<T> {
    /// Still open, nothing to do this frame.
    Open,
    /// Parameters changed; the caller should preview this value.
    Changed(T),
    /// User clicked OK with these final values.
    Ok(T),
    Cancel,
}

// ============================================================================
// SHARED DIALOG STYLING HELPERS
// ============================================================================

/// Colors extracted from the current egui visuals for dialog rendering.
pub(crate) struct DialogColors {
    pub accent: Color32,
    pub accent_faint: Color32,
    pub text_muted: Color32,
    pub error: Color32,
    pub separator: Color32,
}

impl DialogColors {
    pub(crate) fn from_ctx(ctx: &egui::Context) -> Self {
        let v = ctx.style().visuals.clone();
        let accent = v.selection.stroke.color;
        let alpha = if v.dark_mode { 35 } else { 25 };
        // Dark mode needs brighter muted text to stay readable
        let text_muted = if v.dark_mode {
            Color32::from_gray(160)
        } else {
            v.weak_text_color()
        };
        Self {
            accent,
            accent_faint: Color32::from_rgba_unmultiplied(accent.r(), accent.g(), accent.b(), alpha),
            text_muted,
            error: v.error_fg_color,
            separator: v.widgets.noninteractive.bg_stroke.color,
        }
    }
}

fn dialog_window(id: &str, ctx: &egui::Context, width: f32) -> egui::Window<'static> {
    egui::Window::new(id.to_string())
        .title_bar(false)
        .collapsible(false)
        .resizable(false)
        .default_pos(egui::pos2(ctx.screen_rect().center().x - width / 2.0, 60.0))
}

/// Paint the accent header bar with icon + title.
pub(crate) fn paint_dialog_header(ui: &mut egui::Ui, colors: &DialogColors, icon: &str, title: &str) {
    let available_width = ui.available_width();
    let header_height = 32.0;
    let (rect, _) = ui.allocate_exact_size(Vec2::new(available_width, header_height), Sense::hover());

    let painter = ui.painter();
    painter.rect_filled(rect, Rounding::ZERO, colors.accent_faint);
    painter.rect_filled(
        Rect::from_min_size(rect.min, Vec2::new(3.0, header_height)),
        Rounding::ZERO,
        colors.accent,
    );
    painter.text(
        Pos2::new(rect.min.x + 12.0, rect.center().y),
        egui::Align2::LEFT_CENTER,
        format!("{} {}", icon, title),
        egui::FontId::proportional(14.0),
        colors.accent,
    );
}

pub(crate) fn section_label(ui: &mut egui::Ui, colors: &DialogColors, text: &str) {
    ui.add_space(6.0);
    ui.horizontal(|ui| {
        ui.add_space(2.0);
        ui.label(egui::RichText::new(text).size(11.0).color(colors.text_muted).strong());
    });
    ui.add_space(2.0);
}

pub(crate) fn accent_separator(ui: &mut egui::Ui, colors: &DialogColors) {
    let available_width = ui.available_width();
    let (rect, _) = ui.allocate_exact_size(Vec2::new(available_width, 1.0), Sense::hover());
    ui.painter().rect_filled(rect, 0.0, colors.accent_faint);
}

/// Styled OK / Cancel footer. Returns (ok_clicked, cancel_clicked).
pub(crate) fn dialog_footer(ui: &mut egui::Ui, colors: &DialogColors) -> (bool, bool) {
    let mut ok = false;
    let mut cancel = false;
    ui.add_space(4.0);
    accent_separator(ui, colors);
    ui.add_space(6.0);
    ui.horizontal(|ui| {
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button("Cancel").clicked() {
                cancel = true;
            }
            let ok_btn = egui::Button::new(egui::RichText::new("  OK  ").color(Color32::WHITE).strong())
                .fill(colors.accent);
            if ui.add(ok_btn).clicked() {
                ok = true;
            }
        });
    });
    (ok, cancel)
}

/// "Show result immediately" toggle plus a manual Preview button.
/// Returns true if the manual button was clicked.
pub(crate) fn preview_controls(ui: &mut egui::Ui, live_preview: &mut bool) -> bool {
    let mut preview_clicked = false;
    ui.add_space(2.0);
    ui.horizontal(|ui| {
        ui.checkbox(live_preview, "Show result immediately");
        if !*live_preview && ui.button("Preview").clicked() {
            preview_clicked = true;
        }
    });
    preview_clicked
}

/// True once a slider drag finishes or on a non-drag change (keyboard, click).
pub(crate) fn track_slider(response: &egui::Response, dragging: &mut bool) -> bool {
    if response.dragged() {
        *dragging = true;
        return false;
    }
    if response.drag_released() {
        *dragging = false;
        return true;
    }
    response.changed()
}

fn swatch(ui: &mut egui::Ui, colors: &DialogColors, rgb: [u8; 3]) {
    let (rect, _) = ui.allocate_exact_size(Vec2::new(28.0, 16.0), Sense::hover());
    let painter = ui.painter();
    painter.rect_filled(rect, Rounding::same(2.0), Color32::from_rgb(rgb[0], rgb[1], rgb[2]));
    painter.rect_stroke(rect, Rounding::same(2.0), Stroke::new(1.0, colors.separator));
}

// ============================================================================
// MORPHOLOGY DIALOG - erosion, dilation, gradient, opening, closing
// ============================================================================

pub struct MorphologyDialog {
    pub op: MorphOp,
    pub shape: MorphShape,
    pub anchor: u32,
    pub live_preview: bool,
    dragging: bool,
}

impl MorphologyDialog {
    pub fn new(live_preview: bool) -> Self {
        Self {
            op: MorphOp::Erode,
            shape: MorphShape::Rect,
            anchor: 1,
            live_preview,
            dragging: false,
        }
    }

    pub fn action(&self) -> Action {
        Action::morphology(self.op, MorphParams::new(self.shape, self.anchor))
    }

    pub fn show(&mut self, ctx: &egui::Context) -> DialogResult<Action> {
        let mut result = DialogResult::Open;
        let colors = DialogColors::from_ctx(ctx);

        dialog_window("dialog_morphology", ctx, 340.0).show(ctx, |ui| {
            ui.set_min_width(340.0);
            paint_dialog_header(ui, &colors, "\u{25A3}", "Erosion and Dilation");
            ui.add_space(4.0);

            let mut changed = false;

            section_label(ui, &colors, "OPERATION");
            ui.horizontal_wrapped(|ui| {
                for op in MorphOp::all() {
                    if ui.selectable_value(&mut self.op, *op, op.label()).changed() {
                        changed = true;
                    }
                }
            });

            section_label(ui, &colors, "STRUCTURING ELEMENT");
            egui::Grid::new("morph_params")
                .num_columns(2)
                .spacing([8.0, 6.0])
                .show(ui, |ui| {
                    ui.label("Shape");
                    ui.horizontal(|ui| {
                        for shape in MorphShape::all() {
                            if ui.selectable_value(&mut self.shape, *shape, shape.label()).changed() {
                                changed = true;
                            }
                        }
                    });
                    ui.end_row();

                    ui.label("Anchor");
                    let r = ui.add(egui::Slider::new(&mut self.anchor, 0..=ANCHOR_SLIDER_MAX));
                    if track_slider(&r, &mut self.dragging) {
                        changed = true;
                    }
                    ui.end_row();

                    ui.label("");
                    let size = 2 * self.anchor + 1;
                    ui.label(
                        egui::RichText::new(format!("Kernel size = 2*Anchor+1 = {}x{}", size, size))
                            .size(11.0)
                            .color(colors.text_muted),
                    );
                    ui.end_row();
                });

            accent_separator(ui, &colors);
            let manual_preview = preview_controls(ui, &mut self.live_preview);
            if (changed && self.live_preview) || manual_preview {
                result = DialogResult::Changed(self.action());
            }

            let (ok, cancel) = dialog_footer(ui, &colors);
            if ok {
                result = DialogResult::Ok(self.action());
            }
            if cancel {
                result = DialogResult::Cancel;
            }
        });

        result
    }
}

// ============================================================================
// IN-RANGE DIALOG - per-channel thresholding in a colour space
// ============================================================================

pub struct InRangeDialog {
    pub color_space: ColorSpace,
    pub lower: [i32; 3],
    pub upper: [i32; 3],
    pub live_preview: bool,
    dragging: bool,
}

impl InRangeDialog {
    pub fn new(live_preview: bool) -> Self {
        Self {
            color_space: ColorSpace::Hsv,
            lower: [0, 0, 0],
            upper: Self::channel_max(ColorSpace::Hsv).map(|m| m as i32),
            live_preview,
            dragging: false,
        }
    }

    /// Slider maxima per channel.
    pub fn channel_max(space: ColorSpace) -> [u32; 3] {
        match space {
            ColorSpace::Hsv => [179, 255, 255],
        }
    }

    fn channel_names(space: ColorSpace) -> [&'static str; 3] {
        match space {
            ColorSpace::Hsv => ["H", "S", "V"],
        }
    }

    pub fn action(&self) -> Action {
        Action::InRange(InRangeParams {
            color_space: self.color_space,
            lower: self.lower,
            upper: self.upper,
        })
    }

    fn swatch_rgb(&self, bound: [i32; 3]) -> [u8; 3] {
        match self.color_space {
            ColorSpace::Hsv => {
                let [h, s, v] = bound.map(|c| c.clamp(0, 255) as u8);
                hsv_cv_to_rgb(h, s, v)
            }
        }
    }

    pub fn show(&mut self, ctx: &egui::Context) -> DialogResult<Action> {
        let mut result = DialogResult::Open;
        let colors = DialogColors::from_ctx(ctx);

        dialog_window("dialog_in_range", ctx, 360.0).show(ctx, |ui| {
            ui.set_min_width(360.0);
            paint_dialog_header(ui, &colors, "\u{25D1}", "Thresholding: inRange");
            ui.add_space(4.0);

            let mut changed = false;

            section_label(ui, &colors, "COLOUR SPACE");
            ui.horizontal(|ui| {
                for space in ColorSpace::all() {
                    if ui.selectable_value(&mut self.color_space, *space, space.label()).changed() {
                        changed = true;
                    }
                }
            });

            let max = Self::channel_max(self.color_space);
            let names = Self::channel_names(self.color_space);
            for (title, is_lower) in [("LOWER BOUNDARY", true), ("UPPER BOUNDARY", false)] {
                section_label(ui, &colors, title);
                ui.horizontal(|ui| {
                    let bound = if is_lower { self.lower } else { self.upper };
                    let rgb = self.swatch_rgb(bound);
                    egui::Grid::new(title)
                        .num_columns(2)
                        .spacing([8.0, 4.0])
                        .show(ui, |ui| {
                            for c in 0..3 {
                                ui.label(names[c]);
                                let value = if is_lower { &mut self.lower[c] } else { &mut self.upper[c] };
                                let r = ui.add(egui::Slider::new(value, 0..=max[c] as i32));
                                if track_slider(&r, &mut self.dragging) {
                                    changed = true;
                                }
                                ui.end_row();
                            }
                        });
                    swatch(ui, &colors, rgb);
                });
            }

            accent_separator(ui, &colors);
            let manual_preview = preview_controls(ui, &mut self.live_preview);
            if (changed && self.live_preview) || manual_preview {
                result = DialogResult::Changed(self.action());
            }

            let (ok, cancel) = dialog_footer(ui, &colors);
            if ok {
                result = DialogResult::Ok(self.action());
            }
            if cancel {
                result = DialogResult::Cancel;
            }
        });

        result
    }
}

// ============================================================================
// HOUGH CIRCLE DIALOG - free-text fields, validated on preview / OK
// ============================================================================

pub struct HoughCircleDialog {
    pub method: HoughMethod,
    pub dp: String,
    pub min_dist: String,
    pub param1: String,
    pub param2: String,
    pub min_radius: String,
    pub max_radius: String,
    /// Names of the fields that failed to parse last time.
    pub errors: Vec<String>,
}

impl Default for HoughCircleDialog {
    fn default() -> Self {
        Self::new()
    }
}

impl HoughCircleDialog {
    pub fn new() -> Self {
        let d = HoughCircleParams::default();
        Self {
            method: d.method,
            dp: d.dp.to_string(),
            min_dist: d.min_dist.to_string(),
            param1: d.param1.to_string(),
            param2: d.param2.to_string(),
            min_radius: d.min_radius.to_string(),
            max_radius: d.max_radius.to_string(),
            errors: Vec::new(),
        }
    }

    /// Parse every field; on failure lists each bad field by name.
    pub fn params(&self) -> Result<HoughCircleParams, Vec<String>> {
        let mut errors = Vec::new();
        let mut float = |name: &str, text: &str| match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => v,
            _ => {
                errors.push(name.to_string());
                0.0
            }
        };
        let dp = float("dp", &self.dp);
        let min_dist = float("minDist", &self.min_dist);
        let param1 = float("param1", &self.param1);
        let param2 = float("param2", &self.param2);

        let mut uint = |name: &str, text: &str| match text.trim().parse::<u32>() {
            Ok(v) => v,
            Err(_) => {
                errors.push(name.to_string());
                0
            }
        };
        let min_radius = uint("minRadius", &self.min_radius);
        let max_radius = uint("maxRadius", &self.max_radius);

        if dp < 1.0 && !errors.iter().any(|e| e == "dp") {
            errors.push("dp".to_string());
        }

        if self.method == HoughMethod::GradientAlt && param2 > 1.0 {
            errors.push("param2".to_string());
        }
        if max_radius != 0 && max_radius < min_radius {
            errors.push("maxRadius".to_string());
        }

        if errors.is_empty() {
            Ok(HoughCircleParams {
                method: self.method,
                dp,
                min_dist,
                param1,
                param2,
                min_radius,
                max_radius,
            })
        } else {
            errors.dedup();
            Err(errors)
        }
    }

    fn validated_action(&mut self) -> Option<Action> {
        match self.params() {
            Ok(p) => {
                self.errors.clear();
                Some(Action::HoughCircle(p))
            }
            Err(e) => {
                self.errors = e;
                None
            }
        }
    }

    pub fn show(&mut self, ctx: &egui::Context) -> DialogResult<Action> {
        let mut result = DialogResult::Open;
        let colors = DialogColors::from_ctx(ctx);

        dialog_window("dialog_hough", ctx, 340.0).show(ctx, |ui| {
            ui.set_min_width(340.0);
            paint_dialog_header(ui, &colors, "\u{25CE}", "Hough Circle");
            ui.add_space(4.0);

            section_label(ui, &colors, "METHOD");
            ui.horizontal(|ui| {
                for m in HoughMethod::all() {
                    ui.selectable_value(&mut self.method, *m, m.label());
                }
            });

            section_label(ui, &colors, "PARAMETERS");
            let param2_hint = match self.method {
                HoughMethod::Gradient => "accumulator votes",
                HoughMethod::GradientAlt => "perfectness, 0..1",
            };
            egui::Grid::new("hough_params")
                .num_columns(3)
                .spacing([8.0, 4.0])
                .show(ui, |ui| {
                    let rows: [(&str, &mut String, &str); 6] = [
                        ("dp", &mut self.dp, "accumulator scale"),
                        ("minDist", &mut self.min_dist, "pixels"),
                        ("param1", &mut self.param1, "Canny high threshold"),
                        ("param2", &mut self.param2, param2_hint),
                        ("minRadius", &mut self.min_radius, "pixels"),
                        ("maxRadius", &mut self.max_radius, "0 = unbounded"),
                    ];
                    for (name, text, hint) in rows {
                        let bad = self.errors.iter().any(|e| e == name);
                        let label = egui::RichText::new(name);
                        ui.label(if bad { label.color(colors.error) } else { label });
                        ui.add(egui::TextEdit::singleline(text).desired_width(90.0));
                        ui.label(egui::RichText::new(hint).size(11.0).color(colors.text_muted));
                        ui.end_row();
                    }
                });

            if !self.errors.is_empty() {
                ui.add_space(4.0);
                ui.label(
                    egui::RichText::new(format!("Invalid: {}", self.errors.join(", ")))
                        .color(colors.error)
                        .size(11.0),
                );
            }

            accent_separator(ui, &colors);
            ui.add_space(2.0);
            if ui.button("Preview").clicked()
                && let Some(action) = self.validated_action()
            {
                result = DialogResult::Changed(action);
            }

            let (ok, cancel) = dialog_footer(ui, &colors);
            if ok && let Some(action) = self.validated_action() {
                result = DialogResult::Ok(action);
            }
            if cancel {
                result = DialogResult::Cancel;
            }
        });

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn morphology_dialog_builds_the_selected_operation() {
        let mut d = MorphologyDialog::new(true);
        d.op = MorphOp::Close;
        d.shape = MorphShape::Ellipse;
        d.anchor = 6;
        assert_eq!(
            d.action(),
            Action::MorphClosing(MorphParams::new(MorphShape::Ellipse, 6))
        );
    }

    #[test]
    fn in_range_dialog_starts_fully_open() {
        let d = InRangeDialog::new(false);
        let Action::InRange(p) = d.action() else { panic!("expected in_range") };
        assert_eq!(p.lower, [0, 0, 0]);
        assert_eq!(p.upper, [179, 255, 255]);
    }

    #[test]
    fn hough_defaults_parse() {
        assert_eq!(HoughCircleDialog::new().params(), Ok(HoughCircleParams::default()));
    }

    #[test]
    fn hough_reports_every_bad_field() {
        let mut d = HoughCircleDialog::new();
        d.dp = "fast".into();
        d.min_radius = "-3".into();
        d.param1 = "0".into();
        assert_eq!(
            d.params(),
            Err(vec!["dp".to_string(), "param1".to_string(), "minRadius".to_string()])
        );
    }

    #[test]
    fn hough_dp_below_one_is_an_error() {
        let mut d = HoughCircleDialog::new();
        d.dp = "0.25".into();
        assert_eq!(d.params(), Err(vec!["dp".to_string()]));
        d.dp = "1".into();
        assert!(d.params().is_ok());
    }

    #[test]
    fn hough_alt_rejects_perfectness_above_one() {
        let mut d = HoughCircleDialog::new();
        d.param2 = "30".into();
        assert_eq!(d.params(), Err(vec!["param2".to_string()]));
        d.method = HoughMethod::Gradient;
        assert!(d.params().is_ok());
    }

    #[test]
    fn hough_rejects_inverted_radii() {
        let mut d = HoughCircleDialog::new();
        d.min_radius = "20".into();
        d.max_radius = "5".into();
        assert_eq!(d.params(), Err(vec!["maxRadius".to_string()]));
    }

    #[test]
    fn failed_validation_is_remembered_then_cleared() {
        let mut d = HoughCircleDialog::new();
        d.dp = "".into();
        assert!(d.validated_action().is_none());
        assert_eq!(d.errors, vec!["dp".to_string()]);
        d.dp = "2".into();
        assert!(d.validated_action().is_some());
        assert!(d.errors.is_empty());
    }
}
