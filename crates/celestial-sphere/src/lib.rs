//! Unit-sphere tessellation: octahedron-subdivision templates and a
//! resolution-keyed cache shared by every generator in the process.

mod cache;
mod template;

pub use cache::TessellationCache;
pub use template::{TessellationTemplate, template_counts};
