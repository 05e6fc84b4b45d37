//! Property tests for the training-core invariants

use proptest::prelude::*;
use softmargin::cache::{HessianCache, RowCreator, SerialRowCreator};
use softmargin::kernel::{ComponentKernel, LinearKernel, RbfKernel};
use softmargin::solver::{CoordinateDescent, CoordinateDescentOptions, SvmTrainer};
use softmargin::utils::partition_ranges;
use softmargin::{SparseVector, TrainingPair};
use std::sync::Arc;

fn training_set(points: &[(f64, f64, bool)]) -> Vec<TrainingPair<SparseVector>> {
    points
        .iter()
        .map(|&(x, y, positive)| {
            TrainingPair::new(
                SparseVector::from_dense(&[x, y]),
                if positive { 1.0 } else { -1.0 },
            )
        })
        .collect()
}

proptest! {
    /// Partitioner: n contiguous, non-overlapping ranges whose union is
    /// [start, end)
    #[test]
    fn partitioner_covers_range(start in 0usize..100, len in 0usize..500, parts in 1usize..17) {
        let end = start + len;
        let ranges = partition_ranges(start, end, parts);

        prop_assert_eq!(ranges.len(), parts);
        let mut cursor = start;
        for range in &ranges {
            prop_assert_eq!(range.start, cursor);
            prop_assert!(range.end >= range.start);
            cursor = range.end;
        }
        prop_assert_eq!(cursor, end);

        // Never more non-empty ranges than elements
        let non_empty = ranges.iter().filter(|r| !r.is_empty()).count();
        prop_assert!(non_empty <= len.max(1));
    }

    /// Cached rows are identical to fresh computation regardless of the
    /// eviction history the access order produces
    #[test]
    fn cache_rows_survive_any_access_order(
        accesses in proptest::collection::vec(0usize..12, 1..80),
        capacity in 1usize..6,
    ) {
        let pairs: Arc<[TrainingPair<SparseVector>]> = (0..12)
            .map(|i| {
                let x = (i as f64 * 0.7).sin() * 2.0;
                let y = (i as f64 * 1.3).cos() * 2.0;
                TrainingPair::new(
                    SparseVector::from_dense(&[x, y]),
                    if i % 2 == 0 { 1.0 } else { -1.0 },
                )
            })
            .collect::<Vec<_>>()
            .into();

        let kernel = ComponentKernel::with_shift(RbfKernel::new(0.9), 1.0);
        let fresh = SerialRowCreator::new(Arc::clone(&pairs), &kernel);
        let creator = SerialRowCreator::new(Arc::clone(&pairs), &kernel);
        let mut cache = HessianCache::new(creator, capacity);

        for &i in &accesses {
            prop_assert_eq!(&cache.row(i)[..], &fresh.compute_row(i)[..]);
        }
        prop_assert!(cache.statistics().items <= capacity);
    }

    /// Row symmetry: cache.row(i)[j] == cache.row(j)[i]
    #[test]
    fn rows_are_symmetric(seed in 0u64..500) {
        let pairs: Arc<[TrainingPair<SparseVector>]> = (0..8)
            .map(|i| {
                let t = (seed as f64 + i as f64) * 0.37;
                TrainingPair::new(
                    SparseVector::from_dense(&[t.sin(), t.cos(), (t * 0.5).sin()]),
                    if (seed + i) % 2 == 0 { 1.0 } else { -1.0 },
                )
            })
            .collect::<Vec<_>>()
            .into();

        let kernel = ComponentKernel::with_shift(RbfKernel::new(1.0), 1.0);
        let creator = SerialRowCreator::new(Arc::clone(&pairs), &kernel);
        let mut cache = HessianCache::new(creator, 8);

        let rows: Vec<_> = (0..8).map(|i| cache.row(i)).collect();
        for i in 0..8 {
            for j in 0..8 {
                prop_assert_eq!(rows[i][j], rows[j][i]);
            }
        }
    }
}

proptest! {
    // Training runs inside, so keep the case count low
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Box feasibility and the support-vector/component correspondence
    /// after training on small random sets
    #[test]
    fn training_respects_box_and_component_subset(
        points in proptest::collection::vec(
            (-2.0f64..2.0, -2.0f64..2.0, proptest::bool::ANY),
            4..14,
        ),
        c in 0.1f64..5.0,
    ) {
        let mut pairs = training_set(&points);
        // Guarantee both classes
        pairs[0].label = 1.0;
        pairs[1].label = -1.0;

        let options = CoordinateDescentOptions::default();
        let threshold = options.constraint_threshold;
        let trainer = CoordinateDescent::new(options);
        let mut kernel = ComponentKernel::with_shift(RbfKernel::new(0.8), 1.0);

        let outcome = trainer.train(&pairs, c, &mut kernel).unwrap();

        // Box feasibility
        for &a in &outcome.alpha {
            prop_assert!((0.0..=c).contains(&a));
        }

        // {i : αᵢ > ε_c} corresponds 1:1 with the appended components
        let expected: Vec<f64> = outcome
            .alpha
            .iter()
            .zip(&pairs)
            .filter(|(&a, _)| a > threshold)
            .map(|(&a, p)| a * p.label)
            .collect();
        prop_assert_eq!(kernel.components().len(), expected.len());
        prop_assert_eq!(outcome.support_count, expected.len());
        for (component, weight) in kernel.components().iter().zip(&expected) {
            prop_assert!((component.weight - weight).abs() < 1e-12);
        }
    }

    /// The gradient identity gᵢ = Σⱼ Qᵢⱼ·αⱼ − 1 holds at termination: the
    /// KKT residual recomputed from scratch stays within tolerance
    #[test]
    fn kkt_residual_within_tolerance(seed in 0u64..200) {
        let pairs: Vec<_> = (0..10)
            .map(|i| {
                let t = (seed * 31 + i) as f64 * 0.61;
                let label = if i % 2 == 0 { 1.0 } else { -1.0 };
                TrainingPair::new(
                    SparseVector::from_dense(&[label + t.sin() * 0.4, t.cos() * 0.4]),
                    label,
                )
            })
            .collect();
        let c = 2.0;

        let trainer = CoordinateDescent::default();
        let mut kernel = ComponentKernel::with_shift(LinearKernel::new(), 1.0);
        let outcome = trainer.train(&pairs, c, &mut kernel).unwrap();
        prop_assert!(outcome.converged);

        for (i, pi) in pairs.iter().enumerate() {
            let gradient: f64 = pairs
                .iter()
                .zip(&outcome.alpha)
                .map(|(pj, &aj)| pi.label * pj.label * kernel.compute(&pi.item, &pj.item) * aj)
                .sum::<f64>()
                - 1.0;
            let normalised = gradient / kernel.compute(&pi.item, &pi.item);
            let satisfied = (outcome.alpha[i] <= 0.0 && normalised >= -5e-3)
                || (outcome.alpha[i] >= c && normalised <= 5e-3)
                || normalised.abs() <= 5e-3;
            prop_assert!(satisfied, "index {}: normalised gradient {}", i, normalised);
        }
    }
}
