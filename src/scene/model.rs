//! 场景模型
//!
//! 模型由若干网格组成，每个网格有自己的材质。粒子系统只读取两样东西：
//! 按网格、顶点顺序拼接的顶点位置，以及第一个网格的漫反射色。

use crate::config::WallConfig;
use crate::core::error::{AssetError, AssetResult};
use crate::render::mesh::Vertex3D;
use glam::Vec3;
use image::RgbaImage;
#[cfg(feature = "gltf")]
use std::path::Path;
use std::sync::Arc;
#[cfg(feature = "gltf")]
use tracing::{info, warn};

/// 网格材质
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(0.8),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::splat(0.5),
            shininess: 32.0,
        }
    }
}

/// 材质贴图；缺失的贴图由材质常量代替
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialTextures {
    pub diffuse: Option<Arc<RgbaImage>>,
    pub specular: Option<Arc<RgbaImage>>,
}

impl MaterialTextures {
    pub fn has_diffuse(&self) -> bool {
        self.diffuse.is_some()
    }

    pub fn has_specular(&self) -> bool {
        self.specular.is_some()
    }
}

/// CPU 侧网格数据
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex3D>,
    pub indices: Vec<u32>,
    pub material: Material,
    pub textures: MaterialTextures,
}

/// 由网格组成的模型
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    meshes: Vec<MeshData>,
    min_bounds: Vec3,
    max_bounds: Vec3,
}

impl Model {
    /// 由网格构造模型；没有任何顶点时返回错误
    pub fn new(name: impl Into<String>, meshes: Vec<MeshData>) -> AssetResult<Self> {
        let name = name.into();
        let mut positions = meshes
            .iter()
            .flat_map(|m| m.vertices.iter().map(|v| Vec3::from_array(v.pos)));
        let Some(first) = positions.next() else {
            return Err(AssetError::EmptyModel(name));
        };
        let (min_bounds, max_bounds) =
            positions.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));

        Ok(Self {
            name,
            meshes,
            min_bounds,
            max_bounds,
        })
    }

    /// 程序生成的砖墙，错缝排列，墙面中心位于原点、朝向 +Z
    pub fn brick_wall(config: &WallConfig) -> AssetResult<Self> {
        let material = Material {
            ambient: config.ambient,
            diffuse: config.diffuse,
            specular: config.specular,
            shininess: config.shininess,
        };
        let pitch_x = config.brick_size.x + config.mortar;
        let pitch_y = config.brick_size.y + config.mortar;
        let width = config.columns as f32 * pitch_x;
        let height = config.rows as f32 * pitch_y;
        let half = config.brick_size * 0.5;

        let mut mesh = MeshData {
            vertices: Vec::new(),
            indices: Vec::new(),
            material,
            textures: MaterialTextures::default(),
        };
        for row in 0..config.rows {
            // 奇数行错开半块砖
            let shift = if row % 2 == 1 { pitch_x * 0.5 } else { 0.0 };
            for column in 0..config.columns {
                let center = Vec3::new(
                    (column as f32 + 0.5) * pitch_x + shift - width * 0.5,
                    (row as f32 + 0.5) * pitch_y - height * 0.5,
                    -half.z,
                );
                push_box(&mut mesh, center, half);
            }
        }

        Self::new("brick_wall", vec![mesh])
    }

    /// 从 glTF/GLB 文件导入
    #[cfg(feature = "gltf")]
    pub fn from_gltf(path: &Path) -> AssetResult<Self> {
        let path_display = path.display().to_string();
        if !path.exists() {
            return Err(AssetError::NotFound { path: path_display });
        }
        let (doc, buffers, images) = gltf::import(path).map_err(|e| AssetError::LoadFailed {
            path: path_display.clone(),
            reason: e.to_string(),
        })?;
        // 同一张图片可能被多个材质引用，只转换一次
        let images: Vec<Option<Arc<RgbaImage>>> = images
            .iter()
            .enumerate()
            .map(|(index, data)| {
                let converted = to_rgba(data).map(Arc::new);
                if converted.is_none() {
                    warn!(
                        target: "assets",
                        path = %path_display,
                        image = index,
                        format = ?data.format,
                        "Unsupported texture format, material constants used instead"
                    );
                }
                converted
            })
            .collect();

        let mut meshes = Vec::new();
        for mesh in doc.meshes() {
            for primitive in mesh.primitives() {
                let reader = primitive.reader(|buf| buffers.get(buf.index()).map(|d| &d.0[..]));
                let positions: Vec<[f32; 3]> = reader
                    .read_positions()
                    .map(|it| it.collect())
                    .unwrap_or_default();
                if positions.is_empty() {
                    continue;
                }
                let normals: Vec<[f32; 3]> = reader
                    .read_normals()
                    .map(|it| it.collect())
                    .unwrap_or_else(|| vec![[0.0, 0.0, 1.0]; positions.len()]);
                let uvs: Vec<[f32; 2]> = reader
                    .read_tex_coords(0)
                    .map(|tc| tc.into_f32().collect())
                    .unwrap_or_default();
                let indices: Vec<u32> = reader
                    .read_indices()
                    .map(|r| r.into_u32().collect())
                    .unwrap_or_else(|| (0..positions.len() as u32).collect());

                let (material, textures) = material_from_gltf(&primitive.material(), &images);
                let vertices = positions
                    .iter()
                    .zip(normals.iter().chain(std::iter::repeat(&[0.0, 0.0, 1.0])))
                    .zip(uvs.iter().chain(std::iter::repeat(&[0.0, 0.0])))
                    .map(|((pos, normal), uv)| Vertex3D {
                        pos: *pos,
                        normal: *normal,
                        uv: *uv,
                    })
                    .collect();

                meshes.push(MeshData {
                    vertices,
                    indices,
                    material,
                    textures,
                });
            }
        }

        let model = Self::new(path_display.clone(), meshes)?;
        info!(
            target: "assets",
            path = %path_display,
            meshes = model.meshes.len(),
            vertices = model.total_vertices(),
            "Model imported"
        );
        Ok(model)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meshes(&self) -> &[MeshData] {
        &self.meshes
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.min_bounds, self.max_bounds)
    }

    /// 包围盒中心
    pub fn center(&self) -> Vec3 {
        (self.min_bounds + self.max_bounds) * 0.5
    }

    pub fn total_vertices(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    /// 按网格、顶点顺序拼接的顶点位置
    pub fn vertex_pool(&self) -> Vec<Vec3> {
        self.meshes
            .iter()
            .flat_map(|m| m.vertices.iter().map(|v| Vec3::from_array(v.pos)))
            .collect()
    }

    /// 第一个网格的漫反射色
    pub fn diffuse(&self) -> Vec3 {
        self.meshes
            .first()
            .map(|m| m.material.diffuse)
            .unwrap_or(Material::default().diffuse)
    }
}

/// glTF 材质映射到 Phong 材质与贴图
///
/// 漫反射取 `baseColor`（或 `KHR_materials_pbrSpecularGlossiness` 的 diffuse），
/// 高光贴图取 specular-glossiness 贴图。glTF 没有环境光颜色，沿用漫反射色。
#[cfg(feature = "gltf")]
fn material_from_gltf(
    material: &gltf::Material<'_>,
    images: &[Option<Arc<RgbaImage>>],
) -> (Material, MaterialTextures) {
    let lookup = |texture: gltf::Texture<'_>| {
        images.get(texture.source().index()).cloned().flatten()
    };
    let metallic = material.pbr_metallic_roughness();
    let gloss = material.pbr_specular_glossiness();

    let base = gloss
        .as_ref()
        .map(|g| g.diffuse_factor())
        .unwrap_or_else(|| metallic.base_color_factor());
    let diffuse = Vec3::new(base[0], base[1], base[2]);
    let defaults = Material::default();
    let phong = Material {
        ambient: diffuse,
        diffuse,
        specular: gloss
            .as_ref()
            .map(|g| Vec3::from_array(g.specular_factor()))
            .unwrap_or(defaults.specular),
        shininess: defaults.shininess,
    };

    let textures = MaterialTextures {
        diffuse: metallic
            .base_color_texture()
            .or_else(|| gloss.as_ref().and_then(|g| g.diffuse_texture()))
            .and_then(|info| lookup(info.texture())),
        specular: gloss
            .as_ref()
            .and_then(|g| g.specular_glossiness_texture())
            .and_then(|info| lookup(info.texture())),
    };
    (phong, textures)
}

/// 解码后的 glTF 图片转为 RGBA8；16 位与浮点格式不支持
#[cfg(feature = "gltf")]
fn to_rgba(data: &gltf::image::Data) -> Option<RgbaImage> {
    use gltf::image::Format;

    let pixels: Vec<u8> = match data.format {
        Format::R8G8B8A8 => data.pixels.clone(),
        Format::R8G8B8 => data
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8 => data
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        Format::R8 => data.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        _ => return None,
    };
    RgbaImage::from_raw(data.width, data.height, pixels)
}

/// 追加一个轴对齐盒子，每个面 4 个顶点、独立法线，逆时针朝外
fn push_box(mesh: &mut MeshData, center: Vec3, half: Vec3) {
    // (法线, u, v)，满足 u × v = 法线
    const FACES: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];

    for (normal, u, v) in FACES {
        let base = mesh.vertices.len() as u32;
        let face_center = center + normal * half;
        let du = u * half;
        let dv = v * half;
        for (su, sv) in [(-1.0f32, -1.0f32), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            mesh.vertices.push(Vertex3D {
                pos: (face_center + du * su + dv * sv).to_array(),
                normal: normal.to_array(),
                uv: [(su + 1.0) * 0.5, (1.0 - sv) * 0.5],
            });
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_wall() -> WallConfig {
        WallConfig {
            columns: 3,
            rows: 2,
            ..WallConfig::default()
        }
    }

    #[test]
    fn test_brick_wall_counts() {
        let model = Model::brick_wall(&small_wall()).unwrap();
        assert_eq!(model.meshes().len(), 1);
        assert_eq!(model.total_vertices(), 3 * 2 * 24);
        assert_eq!(model.meshes()[0].indices.len(), 3 * 2 * 36);
        assert_eq!(model.vertex_pool().len(), model.total_vertices());
    }

    #[test]
    fn test_brick_wall_front_face_at_origin_plane() {
        let config = small_wall();
        let model = Model::brick_wall(&config).unwrap();
        let (min, max) = model.bounds();
        assert!(max.z.abs() < 1e-6);
        assert!((min.z + config.brick_size.z).abs() < 1e-6);
        assert!(model.center().y.abs() < 1e-5);
    }

    #[test]
    fn test_box_faces_wind_outward() {
        let mut mesh = MeshData {
            vertices: Vec::new(),
            indices: Vec::new(),
            material: Material::default(),
            textures: MaterialTextures::default(),
        };
        push_box(&mut mesh, Vec3::ZERO, Vec3::ONE);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from_array(mesh.vertices[i as usize].pos));
            let face_normal = (b - a).cross(c - a).normalize();
            let stored = Vec3::from_array(mesh.vertices[tri[0] as usize].normal);
            assert!(face_normal.dot(stored) > 0.99);
        }
    }

    #[test]
    fn test_pool_concatenates_meshes_in_order() {
        let mesh = |x: f32, diffuse: Vec3| MeshData {
            vertices: vec![
                Vertex3D { pos: [x, 0.0, 0.0], normal: [0.0, 0.0, 1.0], uv: [0.0, 0.0] },
                Vertex3D { pos: [x, 1.0, 0.0], normal: [0.0, 0.0, 1.0], uv: [0.0, 1.0] },
            ],
            indices: vec![0, 1, 0],
            material: Material { diffuse, ..Material::default() },
            textures: MaterialTextures::default(),
        };
        let model = Model::new("pair", vec![mesh(1.0, Vec3::X), mesh(2.0, Vec3::Y)]).unwrap();

        assert_eq!(
            model.vertex_pool(),
            vec![
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(2.0, 1.0, 0.0),
            ]
        );
        assert_eq!(model.diffuse(), Vec3::X);
        assert_eq!(model.center(), Vec3::new(1.5, 0.5, 0.0));
    }

    #[test]
    fn test_brick_wall_is_untextured_with_face_uvs() {
        let config = small_wall();
        let model = Model::brick_wall(&config).unwrap();
        let mesh = &model.meshes()[0];
        assert!(!mesh.textures.has_diffuse());
        assert!(!mesh.textures.has_specular());
        assert_eq!(mesh.material.ambient, config.ambient);
        assert!(mesh
            .vertices
            .iter()
            .all(|v| v.uv.iter().all(|c| (0.0..=1.0).contains(c))));
        let corners: Vec<[f32; 2]> = mesh.vertices[..4].iter().map(|v| v.uv).collect();
        assert_eq!(corners, vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]);
    }

    #[cfg(feature = "gltf")]
    mod gltf_materials {
        use super::super::*;

        const DOCUMENT: &str = r#"{
            "asset": { "version": "2.0" },
            "images": [{ "uri": "bricks.png" }, { "uri": "bricks_spec.png" }],
            "textures": [{ "source": 0 }, { "source": 1 }],
            "materials": [
                {
                    "pbrMetallicRoughness": {
                        "baseColorFactor": [0.5, 0.4, 0.3, 1.0],
                        "baseColorTexture": { "index": 0 }
                    }
                },
                {
                    "pbrMetallicRoughness": { "baseColorFactor": [0.2, 0.6, 0.9, 1.0] }
                }
            ]
        }"#;

        fn document() -> gltf::Gltf {
            gltf::Gltf::from_slice(DOCUMENT.as_bytes()).unwrap()
        }

        fn images() -> Vec<Option<Arc<RgbaImage>>> {
            vec![
                Some(Arc::new(RgbaImage::from_pixel(2, 2, image::Rgba([200, 80, 40, 255])))),
                Some(Arc::new(RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255])))),
            ]
        }

        #[test]
        fn test_base_color_texture_sets_diffuse_map() {
            let gltf = document();
            let material = gltf.materials().next().unwrap();
            let (phong, textures) = material_from_gltf(&material, &images());

            assert!(textures.has_diffuse());
            assert!(!textures.has_specular());
            assert_eq!(textures.diffuse.unwrap().dimensions(), (2, 2));
            assert_eq!(phong.diffuse, Vec3::new(0.5, 0.4, 0.3));
            assert_eq!(phong.ambient, phong.diffuse);
        }

        #[test]
        fn test_untextured_material_keeps_constants() {
            let gltf = document();
            let material = gltf.materials().nth(1).unwrap();
            let (phong, textures) = material_from_gltf(&material, &images());

            assert_eq!(textures, MaterialTextures::default());
            assert_eq!(phong.diffuse, Vec3::new(0.2, 0.6, 0.9));
        }

        #[test]
        fn test_unconvertible_image_falls_back() {
            let gltf = document();
            let material = gltf.materials().next().unwrap();
            let (_, textures) = material_from_gltf(&material, &[None, None]);
            assert!(!textures.has_diffuse());
        }

        #[test]
        fn test_rgb_image_gains_opaque_alpha() {
            let data = gltf::image::Data {
                pixels: vec![10, 20, 30, 40, 50, 60],
                format: gltf::image::Format::R8G8B8,
                width: 2,
                height: 1,
            };
            let rgba = to_rgba(&data).unwrap();
            assert_eq!(rgba.as_raw(), &vec![10, 20, 30, 255, 40, 50, 60, 255]);
        }

        #[test]
        fn test_wide_formats_rejected() {
            let data = gltf::image::Data {
                pixels: vec![0; 8],
                format: gltf::image::Format::R16G16B16A16,
                width: 1,
                height: 1,
            };
            assert!(to_rgba(&data).is_none());
        }
    }

    #[test]
    fn test_empty_model_rejected() {
        assert!(matches!(
            Model::new("empty", Vec::new()),
            Err(AssetError::EmptyModel(_))
        ));
    }
}
