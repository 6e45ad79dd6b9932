//! Region planning, the render walk, HUD drawing and the end-to-end job.

pub mod hud;
pub mod pipeline;
pub mod plan;
pub mod renderer;
