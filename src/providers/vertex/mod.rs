pub mod gemini;
pub mod gemini_types;

pub use gemini::{VertexAuth, VertexProvider};
