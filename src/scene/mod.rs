//! 场景：被破坏的模型与观察它的相机

pub mod camera;
pub mod model;

pub use camera::Camera;
pub use model::{Material, MaterialTextures, MeshData, Model};
