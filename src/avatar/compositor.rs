//! 2D avatar compositing.
//!
//! The avatar is drawn rotated about the tracked head anchor, then the live
//! eye and mouth crops from the video frame are pasted into fixed slots on
//! it through elliptical masks.

use image::{Rgba, RgbaImage};

use super::assets::AvatarAssets;
use super::canvas::{Canvas, Rect};
use crate::pose::HeadPose;
use crate::tracking::{FaceFeature, LandmarkLayout, LandmarkSet};

/// Fraction of the shorter frame side covered by the avatar at unit scale
pub const AVATAR_FRACTION: f32 = 0.85;

/// Side of the local box the placeholder is authored in
const PLACEHOLDER_BOX: f32 = 400.0;
const PLACEHOLDER_RADII: (f32, f32) = (192.0, 160.0);
const PLACEHOLDER_FILL: Rgba<u8> = Rgba([0x8B, 0x69, 0x14, 0xFF]);
const PLACEHOLDER_STROKE: Rgba<u8> = Rgba([0x5C, 0x46, 0x10, 0xFF]);
const PLACEHOLDER_LINE_WIDTH: f32 = 4.0;

const DEBUG_RADIUS: f32 = 2.0;
const DEBUG_COLOR: Rgba<u8> = Rgba([0x00, 0xFF, 0x00, 0xFF]);

/// Destination of a feature crop, as fractions of the avatar box.
/// `x`/`y` are the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Slot {
    pub fn for_feature(feature: FaceFeature) -> Slot {
        match feature {
            FaceFeature::LeftEye => Slot {
                x: 0.35,
                y: 0.38,
                width: 0.12,
                height: 0.10,
            },
            FaceFeature::RightEye => Slot {
                x: 0.65,
                y: 0.38,
                width: 0.12,
                height: 0.10,
            },
            FaceFeature::Mouth => Slot {
                x: 0.45,
                y: 0.62,
                width: 0.22,
                height: 0.14,
            },
        }
    }

    /// Canvas-space rectangle for an avatar of side `size` centred on
    /// `(anchor_x, anchor_y)`.
    pub fn place(&self, anchor_x: f32, anchor_y: f32, size: f32) -> Rect {
        let half = size / 2.0;
        Rect::new(
            anchor_x - half + self.x * size,
            anchor_y - half + self.y * size,
            self.width * size,
            self.height * size,
        )
    }
}

/// Side length of the avatar box in pixels
pub fn avatar_size(width: u32, height: u32, head_scale: f32, user_scale: f32) -> f32 {
    width.min(height) as f32 * AVATAR_FRACTION * head_scale * user_scale
}

/// Draws the avatar and the live feature crops onto a [`Canvas`].
#[derive(Debug)]
pub struct Compositor {
    layout: &'static LandmarkLayout,
    assets: AvatarAssets,
}

impl Compositor {
    pub fn new(layout: &'static LandmarkLayout, assets: AvatarAssets) -> Self {
        Self { layout, assets }
    }

    /// Clear, then draw base, composite and (optionally) the debug overlay.
    pub fn draw_frame(
        &self,
        canvas: &mut Canvas,
        frame: &RgbaImage,
        landmarks: &LandmarkSet,
        head: &HeadPose,
        user_scale: f32,
        show_debug: bool,
    ) {
        canvas.clear();
        self.draw_avatar_base(canvas, head, user_scale);
        self.draw_composite(canvas, frame, landmarks, head, user_scale);
        if show_debug {
            draw_debug(canvas, landmarks);
        }
    }

    /// Avatar image (or placeholder) rotated by the head tilt about the
    /// anchor.
    pub fn draw_avatar_base(&self, canvas: &mut Canvas, head: &HeadPose, user_scale: f32) {
        let size = avatar_size(canvas.width(), canvas.height(), head.scale, user_scale);
        let (hx, hy) = anchor(canvas, head);

        canvas.save();
        rotate_about(canvas, hx, hy, head.tilt);

        match self.assets.image() {
            Some(image) if image.width() > 0 => {
                let w = size;
                let h = image.height() as f32 / image.width() as f32 * w;
                canvas.draw_image_fit(image, Rect::new(hx - w / 2.0, hy - h / 2.0, w, h));
            }
            _ => {
                let s = size / PLACEHOLDER_BOX;
                canvas.translate(hx, hy);
                canvas.scale(s, s);
                canvas.translate(-PLACEHOLDER_BOX / 2.0, -PLACEHOLDER_BOX / 2.0);
                draw_placeholder(canvas);
            }
        }

        canvas.restore();
    }

    /// Paste the eye and mouth crops into their slots. Returns the number
    /// of slots drawn; nothing is drawn for an incomplete landmark set.
    pub fn draw_composite(
        &self,
        canvas: &mut Canvas,
        frame: &RgbaImage,
        landmarks: &LandmarkSet,
        head: &HeadPose,
        user_scale: f32,
    ) -> usize {
        if !self.layout.is_complete(landmarks) {
            return 0;
        }

        let size = avatar_size(canvas.width(), canvas.height(), head.scale, user_scale);
        let (hx, hy) = anchor(canvas, head);
        let (fw, fh) = (frame.width() as f32, frame.height() as f32);
        let mut drawn = 0;

        canvas.save();
        rotate_about(canvas, hx, hy, head.tilt);

        for feature in FaceFeature::ALL {
            let Some(region) = landmarks.region(self.layout.region_indices(feature)) else {
                continue;
            };
            let dst = Slot::for_feature(feature).place(hx, hy, size);
            let src = Rect::new(
                (region.center_x - region.width / 2.0) * fw,
                (region.center_y - region.height / 2.0) * fh,
                region.width * fw,
                region.height * fh,
            );

            canvas.save();
            let c = dst.center();
            canvas.clip_ellipse(c.x, c.y, dst.width / 2.0, dst.height / 2.0);
            canvas.draw_image(frame, src, dst);
            canvas.restore();
            drawn += 1;
        }

        canvas.restore();
        drawn
    }
}

/// A small lime circle at every landmark, in untransformed canvas space.
pub fn draw_debug(canvas: &mut Canvas, landmarks: &LandmarkSet) {
    let (w, h) = (canvas.width() as f32, canvas.height() as f32);
    canvas.save();
    for p in landmarks.iter() {
        canvas.stroke_circle(p.x * w, p.y * h, DEBUG_RADIUS, 1.0, DEBUG_COLOR);
    }
    canvas.restore();
}

fn draw_placeholder(canvas: &mut Canvas) {
    let c = PLACEHOLDER_BOX / 2.0;
    let (rx, ry) = PLACEHOLDER_RADII;
    canvas.fill_ellipse(c, c, rx, ry, PLACEHOLDER_FILL);
    canvas.stroke_ellipse(c, c, rx, ry, PLACEHOLDER_LINE_WIDTH, PLACEHOLDER_STROKE);
}

fn anchor(canvas: &Canvas, head: &HeadPose) -> (f32, f32) {
    (head.x * canvas.width() as f32, head.y * canvas.height() as f32)
}

fn rotate_about(canvas: &mut Canvas, x: f32, y: f32, degrees: f32) {
    canvas.translate(x, y);
    canvas.rotate(degrees.to_radians());
    canvas.translate(-x, -y);
}
