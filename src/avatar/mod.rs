//! 2D avatar module
//!
//! Avatar image loading, a small CPU canvas and the compositor that pastes
//! live eye and mouth crops onto the avatar.

pub mod assets;
pub mod canvas;
pub mod compositor;

pub use assets::AvatarAssets;
pub use canvas::{Canvas, Rect};
pub use compositor::{avatar_size, draw_debug, Compositor, Slot};
