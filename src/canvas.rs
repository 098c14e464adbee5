use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, Sense, TextureOptions, Vec2};

use crate::ops::Mat;
use crate::ops::color::rgb_to_hsv_cv;

/// Pixel under the cursor, for the status bar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelInfo {
    pub x: u32,
    pub y: u32,
    pub rgb: [u8; 3],
    /// OpenCV 8-bit HSV.
    pub hsv: [u8; 3],
}

impl PixelInfo {
    pub fn sample(image: &Mat, x: u32, y: u32) -> Option<Self> {
        if x >= image.width() || y >= image.height() {
            return None;
        }
        let rgb = image.get_pixel(x, y).0;
        Some(Self {
            x,
            y,
            rgb,
            hsv: rgb_to_hsv_cv(rgb[0], rgb[1], rgb[2]),
        })
    }

    pub fn status_text(&self) -> String {
        let [r, g, b] = self.rgb;
        let [h, s, v] = self.hsv;
        format!(
            "x = {}, y = {}, RGB: [r = {}, g = {}, b = {}], HSV (OpenCV format): [h = {}, s = {}, v = {}]",
            self.x, self.y, r, g, b, h, s, v
        )
    }
}

/// Zoomable, pannable view of one image. The texture is re-uploaded only
/// after [`Canvas::invalidate`].
pub struct Canvas {
    pub zoom: f32,
    pub pan_offset: Vec2,
    texture: Option<egui::TextureHandle>,
    dirty: bool,
    /// Fit the next image to the viewport instead of keeping the zoom.
    fit_pending: bool,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_offset: Vec2::ZERO,
            texture: None,
            dirty: true,
            fit_pending: true,
        }
    }
}

impl Canvas {
    /// The displayed image changed; upload it again next frame.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// New image: drop the texture and fit on the next frame.
    pub fn reset(&mut self) {
        self.texture = None;
        self.dirty = true;
        self.fit_pending = true;
        self.pan_offset = Vec2::ZERO;
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * 1.2).min(100.0);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / 1.2).max(0.1);
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
        self.pan_offset = Vec2::ZERO;
    }

    pub fn fit(&mut self) {
        self.fit_pending = true;
    }

    /// Zoom while keeping a screen-space point fixed (e.g. under the cursor).
    pub fn zoom_around_screen_point(&mut self, zoom_factor: f32, anchor: Pos2, view_rect: Rect) {
        let old_zoom = self.zoom;
        self.zoom = (self.zoom * zoom_factor).clamp(0.1, 100.0);
        let actual_factor = self.zoom / old_zoom;
        // new_center = anchor + (old_center - anchor) * factor
        let old_center = view_rect.center() + self.pan_offset;
        let new_center = anchor + (old_center - anchor) * actual_factor;
        self.pan_offset = new_center - view_rect.center();
    }

    fn image_rect(&self, view_rect: Rect, size: (u32, u32)) -> Rect {
        Rect::from_center_size(
            view_rect.center() + self.pan_offset,
            Vec2::new(size.0 as f32 * self.zoom, size.1 as f32 * self.zoom),
        )
    }

    /// Screen position to image pixel, or `None` outside the image.
    pub fn screen_to_image(&self, screen_pos: Pos2, view_rect: Rect, size: (u32, u32)) -> Option<(u32, u32)> {
        let image_rect = self.image_rect(view_rect, size);
        if !image_rect.contains(screen_pos) {
            return None;
        }
        let px = ((screen_pos.x - image_rect.min.x) / self.zoom) as u32;
        let py = ((screen_pos.y - image_rect.min.y) / self.zoom) as u32;
        (px < size.0 && py < size.1).then_some((px, py))
    }

    fn upload(&mut self, ctx: &egui::Context, image: &Mat) {
        let size = [image.width() as usize, image.height() as usize];
        let color_image = ColorImage::from_rgb(size, image.as_raw());
        // Nearest keeps single pixels crisp when zoomed in on masks.
        let options = TextureOptions::NEAREST;
        match &mut self.texture {
            Some(tex) => tex.set(color_image, options),
            None => self.texture = Some(ctx.load_texture("cv_image", color_image, options)),
        }
        self.dirty = false;
    }

    /// Draw `image` filling the available space. Returns the pixel under the cursor.
    pub fn show(&mut self, ui: &mut egui::Ui, image: &Mat) -> Option<PixelInfo> {
        let (view_rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let size = image.dimensions();

        if self.dirty || self.texture.is_none() {
            self.upload(ui.ctx(), image);
        }
        if self.fit_pending && size.0 > 0 && size.1 > 0 {
            let fit = (view_rect.width() / size.0 as f32).min(view_rect.height() / size.1 as f32);
            self.zoom = fit.clamp(0.1, 1.0);
            self.pan_offset = Vec2::ZERO;
            self.fit_pending = false;
        }

        if response.dragged() {
            self.pan_offset += response.drag_delta();
        }
        if let Some(hover) = response.hover_pos() {
            let scroll = ui.input(|i| i.scroll_delta.y);
            if scroll != 0.0 {
                let factor = if scroll > 0.0 { 1.1 } else { 1.0 / 1.1 };
                self.zoom_around_screen_point(factor, hover, view_rect);
            }
        }

        let painter = ui.painter_at(view_rect);
        painter.rect_filled(view_rect, 0.0, Color32::from_gray(32));
        if let Some(tex) = &self.texture {
            let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
            painter.image(tex.id(), self.image_rect(view_rect, size), uv, Color32::WHITE);
        }

        let pos = response.hover_pos()?;
        let (x, y) = self.screen_to_image(pos, view_rect, size)?;
        PixelInfo::sample(image, x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn view() -> Rect {
        Rect::from_min_size(Pos2::ZERO, Vec2::new(200.0, 100.0))
    }

    #[test]
    fn centre_of_view_maps_to_centre_of_image() {
        let canvas = Canvas::default();
        assert_eq!(canvas.screen_to_image(Pos2::new(100.0, 50.0), view(), (20, 10)), Some((10, 5)));
    }

    #[test]
    fn outside_the_image_is_none() {
        let canvas = Canvas::default();
        assert_eq!(canvas.screen_to_image(Pos2::new(5.0, 5.0), view(), (20, 10)), None);
    }

    #[test]
    fn zoom_scales_the_mapping() {
        let mut canvas = Canvas::default();
        canvas.zoom = 4.0;
        // Image spans x 60..140, y 30..70.
        assert_eq!(canvas.screen_to_image(Pos2::new(61.0, 31.0), view(), (20, 10)), Some((0, 0)));
        assert_eq!(canvas.screen_to_image(Pos2::new(139.0, 69.0), view(), (20, 10)), Some((19, 9)));
    }

    #[test]
    fn zoom_around_point_keeps_it_fixed() {
        let mut canvas = Canvas::default();
        let anchor = Pos2::new(95.0, 48.0);
        let before = canvas.screen_to_image(anchor, view(), (20, 10));
        canvas.zoom_around_screen_point(2.0, anchor, view());
        assert_eq!(canvas.screen_to_image(anchor, view(), (20, 10)), before);
    }

    #[test]
    fn status_text_matches_opencv_hsv() {
        let img = Mat::from_pixel(2, 2, Rgb([255, 0, 0]));
        let info = PixelInfo::sample(&img, 1, 0).unwrap();
        assert_eq!(
            info.status_text(),
            "x = 1, y = 0, RGB: [r = 255, g = 0, b = 0], HSV (OpenCV format): [h = 0, s = 255, v = 255]"
        );
        assert!(PixelInfo::sample(&img, 2, 0).is_none());
    }
}
