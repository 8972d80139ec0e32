//! Reelcast Scene Model
//!
//! Defines the data contracts the render pipeline consumes:
//! - **Scene:** One timed unit with title, subtitle, and background
//! - **Timeline:** The ordered scene list, frame budgeting, and validation
//! - **Color:** CSS-style color parsing for solid backgrounds
//!
//! The model is a plain value type. Editors own and mutate their copy;
//! the renderer only ever reads a snapshot taken at run start.

pub mod color;
pub mod scene;
pub mod timeline;

pub use color::*;
pub use scene::*;
pub use timeline::*;
