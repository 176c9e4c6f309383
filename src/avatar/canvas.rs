//! CPU drawing surface for the 2D avatar.
//!
//! A small immediate-mode canvas over an RGBA buffer: a save/restore stack of
//! affine transforms and elliptical clips, filled and stroked ellipses, and
//! sub-rectangle image copies. Every primitive is rasterized by walking the
//! device-space bounding box of its transformed shape and mapping each pixel
//! centre back into local space. Blending is source-over.

use glam::{Affine2, Vec2};
use image::{Rgba, RgbaImage};

/// Axis-aligned rectangle in the coordinate space it is used in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.x, self.y),
            Vec2::new(self.x + self.width, self.y),
            Vec2::new(self.x, self.y + self.height),
            Vec2::new(self.x + self.width, self.y + self.height),
        ]
    }

    fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }
}

/// Elliptical clip captured with the transform active when it was set.
#[derive(Debug, Clone, Copy)]
struct Clip {
    to_local: Affine2,
    center: Vec2,
    radii: Vec2,
}

impl Clip {
    fn contains(&self, device: Vec2) -> bool {
        let d = (self.to_local.transform_point2(device) - self.center) / self.radii;
        d.length_squared() <= 1.0
    }
}

#[derive(Debug, Clone)]
struct SavedState {
    transform: Affine2,
    clips: Vec<Clip>,
}

/// RGBA drawing surface
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
    transform: Affine2,
    clips: Vec<Clip>,
    stack: Vec<SavedState>,
}

impl Canvas {
    /// A fully transparent canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            transform: Affine2::IDENTITY,
            clips: Vec::new(),
            stack: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Reallocate to a new size if it differs. Contents are cleared.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width() != width || self.height() != height {
            self.image = RgbaImage::new(width, height);
        }
    }

    /// Clear every pixel to transparent. The transform stack is untouched.
    pub fn clear(&mut self) {
        for p in self.image.pixels_mut() {
            *p = Rgba([0, 0, 0, 0]);
        }
    }

    pub fn save(&mut self) {
        self.stack.push(SavedState {
            transform: self.transform,
            clips: self.clips.clone(),
        });
    }

    pub fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.transform = state.transform;
            self.clips = state.clips;
        }
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        self.transform = self.transform * Affine2::from_translation(Vec2::new(x, y));
    }

    /// Rotate by `radians`; positive is clockwise on screen (y points down).
    pub fn rotate(&mut self, radians: f32) {
        self.transform = self.transform * Affine2::from_angle(radians);
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.transform = self.transform * Affine2::from_scale(Vec2::new(sx, sy));
    }

    /// Intersect the clip region with an ellipse in current local space.
    pub fn clip_ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32) {
        self.clips.push(Clip {
            to_local: self.transform.inverse(),
            center: Vec2::new(cx, cy),
            radii: Vec2::new(rx.abs().max(f32::EPSILON), ry.abs().max(f32::EPSILON)),
        });
    }

    pub fn fill_ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32, color: Rgba<u8>) {
        let center = Vec2::new(cx, cy);
        let radii = Vec2::new(rx.abs().max(f32::EPSILON), ry.abs().max(f32::EPSILON));
        let bounds = Rect::new(cx - radii.x, cy - radii.y, radii.x * 2.0, radii.y * 2.0);
        self.shade(bounds, |local| {
            let d = (local - center) / radii;
            (d.length_squared() <= 1.0).then_some(color)
        });
    }

    /// Stroke an ellipse outline of the given width, centred on the path.
    pub fn stroke_ellipse(
        &mut self,
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
        line_width: f32,
        color: Rgba<u8>,
    ) {
        let center = Vec2::new(cx, cy);
        let half = line_width.abs() / 2.0;
        let outer = Vec2::new(rx.abs() + half, ry.abs() + half);
        let inner = Vec2::new(rx.abs() - half, ry.abs() - half);
        let bounds = Rect::new(cx - outer.x, cy - outer.y, outer.x * 2.0, outer.y * 2.0);
        self.shade(bounds, |local| {
            let p = local - center;
            let in_outer = (p / outer).length_squared() <= 1.0;
            let in_inner = inner.x > 0.0 && inner.y > 0.0 && (p / inner).length_squared() < 1.0;
            (in_outer && !in_inner).then_some(color)
        });
    }

    pub fn stroke_circle(&mut self, cx: f32, cy: f32, r: f32, line_width: f32, color: Rgba<u8>) {
        self.stroke_ellipse(cx, cy, r, r, line_width, color);
    }

    /// Copy `src_rect` of `src` (source pixels) into `dst_rect` (current
    /// local space), nearest-neighbour. Source pixels outside `src` are not
    /// drawn.
    pub fn draw_image(&mut self, src: &RgbaImage, src_rect: Rect, dst_rect: Rect) {
        if dst_rect.width == 0.0 || dst_rect.height == 0.0 {
            return;
        }
        let (sw, sh) = (src.width() as f32, src.height() as f32);
        self.shade(dst_rect, |local| {
            if !dst_rect.contains(local) {
                return None;
            }
            let u = (local.x - dst_rect.x) / dst_rect.width;
            let v = (local.y - dst_rect.y) / dst_rect.height;
            let sx = (src_rect.x + u * src_rect.width).floor();
            let sy = (src_rect.y + v * src_rect.height).floor();
            if sx < 0.0 || sy < 0.0 || sx >= sw || sy >= sh {
                return None;
            }
            Some(*src.get_pixel(sx as u32, sy as u32))
        });
    }

    /// Draw a whole image into `dst_rect`
    pub fn draw_image_fit(&mut self, src: &RgbaImage, dst_rect: Rect) {
        let src_rect = Rect::new(0.0, 0.0, src.width() as f32, src.height() as f32);
        self.draw_image(src, src_rect, dst_rect);
    }

    /// Rasterize a shape: `bounds` is its local-space bounding box and
    /// `coverage` returns the colour for a local-space point it covers.
    fn shade<F>(&mut self, bounds: Rect, mut coverage: F)
    where
        F: FnMut(Vec2) -> Option<Rgba<u8>>,
    {
        let (w, h) = (self.image.width(), self.image.height());
        if w == 0 || h == 0 {
            return;
        }

        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);
        for corner in bounds.corners() {
            let d = self.transform.transform_point2(corner);
            min = min.min(d);
            max = max.max(d);
        }
        if !(min.is_finite() && max.is_finite()) {
            return;
        }

        let x0 = min.x.floor().max(0.0) as u32;
        let y0 = min.y.floor().max(0.0) as u32;
        let x1 = (max.x.ceil().max(0.0) as u32).min(w);
        let y1 = (max.y.ceil().max(0.0) as u32).min(h);
        let to_local = self.transform.inverse();

        for y in y0..y1 {
            for x in x0..x1 {
                let device = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                if !self.clips.iter().all(|c| c.contains(device)) {
                    continue;
                }
                if let Some(color) = coverage(to_local.transform_point2(device)) {
                    blend_over(self.image.get_pixel_mut(x, y), color);
                }
            }
        }
    }
}

/// Source-over compositing of `src` onto `dst`, straight alpha.
fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    match src[3] {
        0 => {}
        255 => *dst = src,
        _ => {
            let sa = src[3] as f32 / 255.0;
            let da = dst[3] as f32 / 255.0;
            let out_a = sa + da * (1.0 - sa);
            for c in 0..3 {
                let s = src[c] as f32 / 255.0;
                let d = dst[c] as f32 / 255.0;
                let v = (s * sa + d * da * (1.0 - sa)) / out_a;
                dst[c] = (v * 255.0).round() as u8;
            }
            dst[3] = (out_a * 255.0).round() as u8;
        }
    }
}
