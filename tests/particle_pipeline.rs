//! 粒子管线集成测试
//!
//! 通过 CPU 替身驱动 存储 → 步进 → 绘制，不需要 GPU。

use glam::{Mat4, Vec2, Vec3};
use mesh_destruction::render::particles::shaders::{
    EXPLODE_COMPUTE_SHADER, POINT_SHADER, RADIAL_PUSH,
};
use mesh_destruction::render::particles::{
    ComputeUniform, FrameCommands, FrameOrderError, HostExecutor, HostFrame, HostKernel,
    HostMemory, KernelArrays, KernelUniforms, MappingFailed, ParticleArray, ParticleCommand,
    ParticleError, ParticleSource, ParticleStore, PointUniform, RenderView, SeedParams,
    SimulationStep, StepParams, ViewParams,
};
use mesh_destruction::render::particles::HostBuffer;
use mesh_destruction::render::program::{Program, ProgramSlot};
use rand::rngs::StdRng;
use rand::SeedableRng;

const DT: f32 = 0.016;

struct Pipeline {
    compute: Program<ComputeUniform>,
    points: Program<PointUniform>,
    step: SimulationStep,
    view: RenderView,
}

impl Pipeline {
    fn new(store: &ParticleStore<HostBuffer>) -> Self {
        Self {
            compute: Program::link("explode", ProgramSlot::Compute, EXPLODE_COMPUTE_SHADER),
            points: Program::link("points", ProgramSlot::Points, POINT_SHADER),
            step: SimulationStep::new(store.capacity()),
            view: RenderView::new(store.capacity()),
        }
    }

    /// 记录一帧：一次步进加一次绘制
    fn frame(&mut self, center: Vec3) -> FrameCommands {
        let mut frame = FrameCommands::new();
        self.step
            .record(
                &mut self.compute,
                &mut frame,
                StepParams {
                    delta_time: DT,
                    model_center: center,
                },
            )
            .unwrap();
        self.view
            .record(&mut self.points, &mut frame, view_params())
            .unwrap();
        frame
    }
}

fn view_params() -> ViewParams {
    ViewParams {
        point_size: 2.0,
        projection: Mat4::perspective_rh(45f32.to_radians(), 16.0 / 9.0, 0.1, 100.0),
        view: Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y),
        viewport: Vec2::new(1920.0, 1080.0),
    }
}

fn grid_pool(count: usize) -> Vec<Vec3> {
    (0..count)
        .map(|i| Vec3::new((i % 20) as f32 * 0.1, (i / 20) as f32 * 0.1, 0.0))
        .collect()
}

fn seeded_store(
    memory: &HostMemory,
    pool: &[Vec3],
    capacity: u32,
    seed: u64,
) -> ParticleStore<HostBuffer> {
    let mut rng = StdRng::seed_from_u64(seed);
    ParticleStore::new(
        memory,
        ParticleSource {
            pool,
            diffuse: Vec3::new(0.62, 0.27, 0.18),
        },
        capacity,
        &SeedParams::default(),
        &mut rng,
    )
    .unwrap()
}

fn read4(store: &ParticleStore<HostBuffer>, array: ParticleArray) -> Vec<[f32; 4]> {
    store.buffer(array).unwrap().read()
}

#[test]
fn test_single_particle_seed() {
    let memory = HostMemory::new();
    let pool = [Vec3::new(1.0, 2.0, 3.0)];
    let mut rng = StdRng::seed_from_u64(7);
    let store = ParticleStore::new(
        &memory,
        ParticleSource {
            pool: &pool,
            diffuse: Vec3::splat(0.5),
        },
        1,
        &SeedParams::default(),
        &mut rng,
    )
    .unwrap();

    assert_eq!(read4(&store, ParticleArray::Position), vec![[1.0, 2.0, 3.0, 1.0]]);
    assert_eq!(read4(&store, ParticleArray::Color), vec![[0.5, 0.5, 0.5, 1.0]]);

    let active: Vec<i32> = store.buffer(ParticleArray::Active).unwrap().read();
    assert_eq!(active, vec![0]);

    let direction = read4(&store, ParticleArray::Direction)[0];
    let length = Vec3::new(direction[0], direction[1], direction[2]).length();
    assert!((length - 1.0).abs() < 1e-5);
    assert_eq!(direction[3], 0.0);

    let speed: Vec<f32> = store.buffer(ParticleArray::Speed).unwrap().read();
    assert!((-5.0..=-1.0).contains(&speed[0]));

    // 所有写映射都已释放
    for array in ParticleArray::ALL {
        let buffer = store.buffer(array).unwrap();
        assert!(!buffer.is_mapped());
        assert_eq!(buffer.release_count(), 1);
    }
}

#[test]
fn test_zero_capacity_is_a_no_op() {
    let memory = HostMemory::new();
    let store = seeded_store(&memory, &[], 0, 1);
    assert!(store.is_empty());
    for array in ParticleArray::ALL {
        assert!(store.buffer(array).is_none());
    }

    let mut pipeline = Pipeline::new(&store);
    let frame = pipeline.frame(Vec3::ZERO);
    assert_eq!(frame.commands(), &[ParticleCommand::StorageBarrier]);
    assert_eq!(frame.dispatched_workgroups().count(), 0);

    let mut executor = HostExecutor::new(&store);
    assert!(executor.execute(&frame).is_none());
    assert!(executor.dispatches().is_empty());
}

#[test]
fn test_dispatch_grid_respects_array_bounds() {
    let memory = HostMemory::new();
    let pool = grid_pool(300);
    let store = seeded_store(&memory, &pool, 300, 3);
    let mut pipeline = Pipeline::new(&store);

    let frame = pipeline.frame(Vec3::ZERO);
    assert_eq!(frame.dispatched_workgroups().collect::<Vec<_>>(), vec![3]);

    let mut executor = HostExecutor::new(&store);
    let captured = executor.execute(&frame).unwrap();
    assert_eq!(captured.points.len(), 300);

    let stats = executor.dispatches()[0];
    assert_eq!(stats.workgroups, 3);
    assert_eq!(stats.invocations, 384);
    assert_eq!(stats.in_range, 300);

    for array in ParticleArray::ALL {
        assert!(
            store.buffer(array).unwrap().guard_intact(),
            "{} guard overwritten",
            array.label()
        );
    }
    let active: Vec<i32> = store.buffer(ParticleArray::Active).unwrap().read();
    assert!(active.iter().all(|a| *a == 1));
}

/// 没有边界检查的核
struct UncheckedKernel;

impl HostKernel for UncheckedKernel {
    fn invoke(&self, index: u32, arrays: &mut KernelArrays<'_>, _uniforms: &KernelUniforms) {
        arrays.active[index as usize] = 1;
    }
}

#[test]
fn test_guard_detects_unchecked_kernel() {
    let memory = HostMemory::new();
    let pool = grid_pool(300);
    let store = seeded_store(&memory, &pool, 300, 3);
    let mut pipeline = Pipeline::new(&store);

    let frame = pipeline.frame(Vec3::ZERO);
    let mut executor = HostExecutor::with_kernel(&store, UncheckedKernel);
    executor.execute(&frame);

    assert!(!store.buffer(ParticleArray::Active).unwrap().guard_intact());
    assert!(store.buffer(ParticleArray::Position).unwrap().guard_intact());
}

#[test]
fn test_mapping_failure_leaves_buffer_zeroed() {
    let memory = HostMemory::failing_on(&[ParticleArray::Speed]);
    let pool = grid_pool(16);
    let store = seeded_store(&memory, &pool, 16, 9);

    let report = store.report();
    assert!(!report.is_complete());
    assert_eq!(
        report.outcome(ParticleArray::Speed),
        Some(Err(MappingFailed {
            array: ParticleArray::Speed
        }))
    );
    assert_eq!(report.outcome(ParticleArray::Position), Some(Ok(())));
    assert_eq!(report.failures().len(), 1);

    let speeds = store.buffer(ParticleArray::Speed).unwrap();
    assert!(speeds.read::<f32>().iter().all(|s| *s == 0.0));
    assert!(!speeds.is_mapped());
    assert_eq!(speeds.release_count(), 1);

    // 其余数组照常初始化
    let colors = read4(&store, ParticleArray::Color);
    assert!(colors.iter().all(|c| c[3] == 1.0));
}

#[test]
fn test_seeding_is_idempotent() {
    let memory = HostMemory::new();
    let pool = grid_pool(64);
    let a = seeded_store(&memory, &pool, 64, 1);
    let b = seeded_store(&memory, &pool, 64, 2);

    assert_eq!(
        read4(&a, ParticleArray::Position),
        read4(&b, ParticleArray::Position)
    );
    assert_eq!(read4(&a, ParticleArray::Color), read4(&b, ParticleArray::Color));
    assert_ne!(
        read4(&a, ParticleArray::Direction),
        read4(&b, ParticleArray::Direction)
    );

    let c = seeded_store(&memory, &pool, 64, 1);
    assert_eq!(
        read4(&a, ParticleArray::Direction),
        read4(&c, ParticleArray::Direction)
    );
    let speeds_a: Vec<f32> = a.buffer(ParticleArray::Speed).unwrap().read();
    let speeds_c: Vec<f32> = c.buffer(ParticleArray::Speed).unwrap().read();
    assert_eq!(speeds_a, speeds_c);
}

/// 参考核一步之后的位置
fn advance(
    positions: &[[f32; 4]],
    directions: &[[f32; 4]],
    speeds: &[f32],
    center: Vec3,
) -> Vec<[f32; 4]> {
    positions
        .iter()
        .zip(directions)
        .zip(speeds)
        .map(|((p, d), s)| {
            let pos = Vec3::from_slice(p);
            let velocity = Vec3::from_slice(d) * *s + (pos - center) * RADIAL_PUSH;
            (pos + velocity * DT).extend(1.0).to_array()
        })
        .collect()
}

fn positions_of(frame: &HostFrame) -> Vec<[f32; 4]> {
    frame.points.iter().map(|p| p.position).collect()
}

#[test]
fn test_draw_sees_exactly_this_frames_step() {
    let memory = HostMemory::new();
    let pool = grid_pool(40);
    let store = seeded_store(&memory, &pool, 40, 11);
    let center = Vec3::new(1.0, 0.1, 0.0);

    let initial = read4(&store, ParticleArray::Position);
    let directions = read4(&store, ParticleArray::Direction);
    let speeds: Vec<f32> = store.buffer(ParticleArray::Speed).unwrap().read();
    let after_one = advance(&initial, &directions, &speeds, center);
    let after_two = advance(&after_one, &directions, &speeds, center);

    let mut pipeline = Pipeline::new(&store);
    let mut executor = HostExecutor::new(&store);

    let first = executor.execute(&pipeline.frame(center)).unwrap();
    assert_eq!(positions_of(&first), after_one);
    assert_eq!(first.point_size, 2.0);
    assert_eq!(first.viewport, Vec2::new(1920.0, 1080.0));

    let second = executor.execute(&pipeline.frame(center)).unwrap();
    assert_eq!(positions_of(&second), after_two);
    // 第一帧的截取不受后续步进影响
    assert_eq!(positions_of(&first), after_one);
}

#[test]
fn test_dispatch_invisible_without_barrier() {
    let memory = HostMemory::new();
    let pool = grid_pool(10);
    let store = seeded_store(&memory, &pool, 10, 5);
    let initial = read4(&store, ParticleArray::Position);

    let mut compute = Program::link("explode", ProgramSlot::Compute, EXPLODE_COMPUTE_SHADER);
    let mut frame = FrameCommands::new();
    frame.begin_step().unwrap();
    assert!(compute.activate(&mut frame));
    compute.set_scalar(ComputeUniform::DeltaTime, DT).unwrap();
    compute
        .set_vector3(ComputeUniform::ModelCenter, Vec3::ZERO)
        .unwrap();
    compute.publish(&mut frame);
    frame.dispatch(1);

    let mut points = Program::link("points", ProgramSlot::Points, POINT_SHADER);
    let view = RenderView::new(store.capacity());
    assert_eq!(
        view.record(&mut points, &mut frame, view_params()),
        Err(ParticleError::FrameOrder(FrameOrderError::UnsyncedRead))
    );

    let mut executor = HostExecutor::new(&store);
    assert!(executor.execute(&frame).is_none());
    assert_eq!(executor.dispatches().len(), 1);
    assert_eq!(read4(&store, ParticleArray::Position), initial);
}

#[test]
fn test_frame_order_enforced() {
    let memory = HostMemory::new();
    let pool = grid_pool(10);
    let store = seeded_store(&memory, &pool, 10, 5);
    let mut pipeline = Pipeline::new(&store);

    let mut frame = FrameCommands::new();
    assert_eq!(
        pipeline
            .view
            .record(&mut pipeline.points, &mut frame, view_params()),
        Err(ParticleError::FrameOrder(FrameOrderError::MissingStep))
    );
    assert!(frame.is_empty());

    let params = StepParams {
        delta_time: DT,
        model_center: Vec3::ZERO,
    };
    pipeline
        .step
        .record(&mut pipeline.compute, &mut frame, params)
        .unwrap();
    assert_eq!(
        pipeline
            .step
            .record(&mut pipeline.compute, &mut frame, params),
        Err(ParticleError::FrameOrder(FrameOrderError::DuplicateStep))
    );
}

#[test]
fn test_capacity_beyond_source_rejected() {
    let memory = HostMemory::new();
    let pool = grid_pool(2);
    let mut rng = StdRng::seed_from_u64(0);
    let result = ParticleStore::new(
        &memory,
        ParticleSource {
            pool: &pool,
            diffuse: Vec3::ONE,
        },
        3,
        &SeedParams::default(),
        &mut rng,
    );
    assert!(matches!(
        result,
        Err(ParticleError::CapacityExceedsSource {
            capacity: 3,
            available: 2
        })
    ));
}

#[test]
fn test_unusable_programs_produce_no_work() {
    let memory = HostMemory::new();
    let pool = grid_pool(10);
    let store = seeded_store(&memory, &pool, 10, 5);
    let initial = read4(&store, ParticleArray::Position);

    let mut pipeline = Pipeline::new(&store);
    pipeline.compute = Program::link("broken", ProgramSlot::Compute, "fn cs_main() {}");
    pipeline.points = Program::link("broken", ProgramSlot::Points, "fn vs_main() {}");
    assert!(!pipeline.compute.is_usable());
    assert!(!pipeline.points.is_usable());

    let frame = pipeline.frame(Vec3::ZERO);
    assert_eq!(frame.commands(), &[ParticleCommand::StorageBarrier]);

    let mut executor = HostExecutor::new(&store);
    assert!(executor.execute(&frame).is_none());
    assert_eq!(read4(&store, ParticleArray::Position), initial);
}
