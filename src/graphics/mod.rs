pub mod engine;
pub mod shader;
pub mod vertex;

pub use engine::{GlowUniforms, GraphicsEngine};
pub use shader::GlowPipeline;
pub use vertex::{QuadVertex, VertexBuffer};
