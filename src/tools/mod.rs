//! Tool panels: independent request/response cycles against the Gateway.
//!
//! Each panel owns local-only view state (never the session store) and runs
//! `Idle → Generating → Succeeded | Failed`, surfacing failures as a visible
//! error string.

pub mod code_maker;
pub mod comics;
pub mod humaniser;
pub mod image_studio;
pub mod learning;
pub mod video_studio;
