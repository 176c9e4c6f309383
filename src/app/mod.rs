//! Application core: status reporting, the pose session and the render
//! loop tying tracking, compositing and the rig together.

pub mod controls;
pub mod render_loop;
pub mod session;
pub mod status;

pub use controls::{ControlCommand, Controls};
pub use render_loop::{LoopState, RenderLoop, TickOutcome};
pub use session::PoseSession;
pub use status::{Status, StatusBoard};
