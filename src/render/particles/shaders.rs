//! 粒子 WGSL 着色器

/// 计算核中径向推离模型中心的系数
pub const RADIAL_PUSH: f32 = 0.5;

/// 计算核：每个粒子沿 `direction * speed` 运动，同时被推离模型中心
pub const EXPLODE_COMPUTE_SHADER: &str = r#"
struct StepUniforms {
    model_center: vec3<f32>,
    delta_time: f32,
};

@group(0) @binding(0) var<uniform> sim: StepUniforms;
@group(0) @binding(4) var<storage, read_write> positions: array<vec4<f32>>;
@group(0) @binding(5) var<storage, read_write> directions: array<vec4<f32>>;
@group(0) @binding(6) var<storage, read_write> colors: array<vec4<f32>>;
@group(0) @binding(7) var<storage, read_write> speeds: array<f32>;
@group(0) @binding(8) var<storage, read_write> active: array<i32>;

const RADIAL_PUSH: f32 = 0.5;

@compute @workgroup_size(128)
fn cs_main(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let idx = global_id.x;
    if (idx >= arrayLength(&positions)) {
        return;
    }

    active[idx] = 1;

    let pos = positions[idx].xyz;
    let velocity = directions[idx].xyz * speeds[idx] + (pos - sim.model_center) * RADIAL_PUSH;
    positions[idx] = vec4<f32>(pos + velocity * sim.delta_time, 1.0);
}
"#;

/// 点渲染：每个粒子展开为面向相机、边长 `point_size` 像素的四边形
pub const POINT_SHADER: &str = r#"
struct ViewUniforms {
    projection: mat4x4<f32>,
    view: mat4x4<f32>,
    viewport: vec2<f32>,
    point_size: f32,
};

@group(0) @binding(0) var<uniform> params: ViewUniforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) position: vec4<f32>,
    @location(1) color: vec4<f32>,
) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );

    let center = params.projection * params.view * position;
    let offset = corners[vertex_index] * params.point_size / params.viewport * center.w;

    var out: VertexOutput;
    out.clip_position = center + vec4<f32>(offset, 0.0, 0.0);
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// 每个粒子四边形的顶点数
pub const QUAD_VERTICES: u32 = 6;
