//! 渲染：设备与表面、网格光照、GPU 粒子

pub mod mesh;
pub mod mesh_renderer;
pub mod particles;
pub mod program;
pub mod renderer;
pub mod uniforms;

pub use mesh::{GpuMesh, Vertex3D};
pub use mesh_renderer::{MeshFrame, MeshRenderer, MeshUniform};
pub use particles::{FrameTargets, GpuParticleSystem, ParticleSystemDescriptor};
pub use program::{Program, ProgramSlot, ProgramStatus};
pub use renderer::{Renderer, SurfaceFrame, DEPTH_FORMAT};
pub use uniforms::{UniformBlock, UniformError, UniformKey, UniformKind};
