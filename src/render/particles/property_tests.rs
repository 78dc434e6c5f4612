//! 粒子存储属性测试
//!
//! 使用proptest验证任意源顶点池与随机种子下的初始化不变量

#[cfg(test)]
mod tests {
    use crate::render::particles::host::HostMemory;
    use crate::render::particles::layout::ParticleArray;
    use crate::render::particles::seed::SeedParams;
    use crate::render::particles::store::{ParticleSource, ParticleStore};
    use glam::Vec3;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn finite_f32() -> impl Strategy<Value = f32> {
        -1000.0f32..1000.0
    }

    fn valid_vec3() -> impl Strategy<Value = Vec3> {
        (finite_f32(), finite_f32(), finite_f32()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
    }

    fn unit_color() -> impl Strategy<Value = Vec3> {
        (0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0).prop_map(|(r, g, b)| Vec3::new(r, g, b))
    }

    // 速度范围：严格为负且非空
    fn speed_range() -> impl Strategy<Value = std::ops::Range<f32>> {
        (-100.0f32..-0.01, 0.01f32..50.0).prop_map(|(end, width)| (end - width)..end)
    }

    proptest! {
        #[test]
        fn seeded_arrays_hold_invariants(
            pool in prop::collection::vec(valid_vec3(), 1..200),
            diffuse in unit_color(),
            speed in speed_range(),
            seed in any::<u64>(),
        ) {
            let memory = HostMemory::new();
            let params = SeedParams { speed: speed.clone(), ..SeedParams::default() };
            let capacity = pool.len() as u32;
            let mut rng = StdRng::seed_from_u64(seed);
            let store = ParticleStore::new(
                &memory,
                ParticleSource { pool: &pool, diffuse },
                capacity,
                &params,
                &mut rng,
            ).unwrap();
            prop_assert!(store.report().is_complete());

            let positions: Vec<[f32; 4]> = store.buffer(ParticleArray::Position).unwrap().read();
            let directions: Vec<[f32; 4]> = store.buffer(ParticleArray::Direction).unwrap().read();
            let colors: Vec<[f32; 4]> = store.buffer(ParticleArray::Color).unwrap().read();
            let speeds: Vec<f32> = store.buffer(ParticleArray::Speed).unwrap().read();
            let active: Vec<i32> = store.buffer(ParticleArray::Active).unwrap().read();

            for i in 0..pool.len() {
                prop_assert_eq!(positions[i], pool[i].extend(1.0).to_array());
                let d = Vec3::new(directions[i][0], directions[i][1], directions[i][2]);
                prop_assert!((d.length() - 1.0).abs() < 1e-5);
                prop_assert_eq!(directions[i][3], 0.0);
                prop_assert_eq!(colors[i], diffuse.extend(1.0).to_array());
                prop_assert!(speeds[i] >= speed.start && speeds[i] < speed.end);
                prop_assert_eq!(active[i], 0);
            }
        }

        #[test]
        fn capacity_below_pool_uses_prefix(
            pool in prop::collection::vec(valid_vec3(), 2..100),
            cut in 1usize..100,
        ) {
            let capacity = cut.min(pool.len() - 1) as u32;
            let memory = HostMemory::new();
            let mut rng = StdRng::seed_from_u64(1);
            let store = ParticleStore::new(
                &memory,
                ParticleSource { pool: &pool, diffuse: Vec3::ONE },
                capacity,
                &SeedParams::default(),
                &mut rng,
            ).unwrap();

            let positions: Vec<[f32; 4]> = store.buffer(ParticleArray::Position).unwrap().read();
            prop_assert_eq!(positions.len(), capacity as usize);
            for (i, p) in positions.iter().enumerate() {
                prop_assert_eq!(*p, pool[i].extend(1.0).to_array());
            }
        }

        #[test]
        fn identical_seeds_give_identical_stores(
            pool in prop::collection::vec(valid_vec3(), 1..64),
            seed in any::<u64>(),
        ) {
            let memory = HostMemory::new();
            let source = ParticleSource { pool: &pool, diffuse: Vec3::new(0.2, 0.4, 0.6) };
            let capacity = pool.len() as u32;
            let a = ParticleStore::new(&memory, source, capacity, &SeedParams::default(), &mut StdRng::seed_from_u64(seed)).unwrap();
            let b = ParticleStore::new(&memory, source, capacity, &SeedParams::default(), &mut StdRng::seed_from_u64(seed)).unwrap();

            for array in [ParticleArray::Position, ParticleArray::Direction, ParticleArray::Color] {
                let lhs: Vec<[f32; 4]> = a.buffer(array).unwrap().read();
                let rhs: Vec<[f32; 4]> = b.buffer(array).unwrap().read();
                prop_assert_eq!(lhs, rhs);
            }
            let lhs: Vec<f32> = a.buffer(ParticleArray::Speed).unwrap().read();
            let rhs: Vec<f32> = b.buffer(ParticleArray::Speed).unwrap().read();
            prop_assert_eq!(lhs, rhs);
        }
    }
}
