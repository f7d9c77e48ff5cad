//! Property-based tests for degree distributions (C3) and the row generator
//! (C4).

use proptest::prelude::*;
use uep_fountain::distribution::{DegreeDistribution, RobustSoliton, Soliton};
use uep_fountain::row::RowGenerator;

proptest! {
    #[test]
    fn soliton_pmf_is_nonnegative_and_bounded(k in 2u32..=2000, d in 0u32..=2001) {
        let s = Soliton::new(k);
        let p = s.pmf(d);
        prop_assert!(p >= 0.0);
        prop_assert!(p <= 1.0);
    }

    #[test]
    fn soliton_cdf_is_monotone(k in 2u32..=500, d in 1u32..500) {
        let s = Soliton::new(k);
        prop_assert!(s.cdf(d) <= s.cdf(d + 1) + 1e-12);
    }

    #[test]
    fn soliton_cdf_at_k_is_one(k in 1u32..=2000) {
        let s = Soliton::new(k);
        prop_assert!((s.cdf(k) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn soliton_sample_with_stays_in_range(k in 1u32..=2000, u in 0.0f64..1.0) {
        let s = Soliton::new(k);
        let d = s.sample_with(u);
        prop_assert!(d >= 1 && d <= k);
    }

    #[test]
    fn robust_soliton_pmf_is_nonnegative(k in 10u32..=5000, d in 0u32..=5001) {
        let r = RobustSoliton::new(k, 0.2, 0.05);
        prop_assert!(r.pmf(d) >= 0.0);
    }

    #[test]
    fn robust_soliton_cdf_at_k_is_one(k in 10u32..=2000) {
        let r = RobustSoliton::new(k, 0.2, 0.05);
        prop_assert!((r.cdf(k) - 1.0).abs() < 1e-6, "cdf(K)={}", r.cdf(k));
    }

    #[test]
    fn robust_soliton_sample_with_stays_in_range(k in 10u32..=2000, u in 0.0f64..1.0) {
        let r = RobustSoliton::new(k, 0.2, 0.05);
        let d = r.sample_with(u);
        prop_assert!(d >= 1 && d <= k);
    }

    #[test]
    fn sample_with_is_a_deterministic_function_of_u(k in 10u32..=2000, u in 0.0f64..1.0) {
        let r = RobustSoliton::new(k, 0.2, 0.05);
        prop_assert_eq!(r.sample_with(u), r.sample_with(u));
    }
}

proptest! {
    #[test]
    fn row_generator_rows_are_sorted_deduped_and_in_range(seed in any::<u32>(), k in 1u32..=200, draws in 1usize..30) {
        let dist = DegreeDistribution::Soliton(Soliton::new(k));
        let mut gen = RowGenerator::new(seed, k, dist);
        for _ in 0..draws {
            let row = gen.next_row();
            prop_assert!(row.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(row.iter().all(|&i| i < k));
            prop_assert!(!row.is_empty());
            prop_assert!(row.len() as u32 <= k);
        }
    }

    #[test]
    fn row_generator_same_seed_reproduces_same_sequence(seed in any::<u32>(), k in 1u32..=200) {
        let dist_a = DegreeDistribution::Soliton(Soliton::new(k));
        let dist_b = DegreeDistribution::Soliton(Soliton::new(k));
        let mut a = RowGenerator::new(seed, k, dist_a);
        let mut b = RowGenerator::new(seed, k, dist_b);
        for _ in 0..20 {
            prop_assert_eq!(a.next_row(), b.next_row());
        }
    }

    #[test]
    fn row_generator_reset_reproduces_prior_sequence(seed in any::<u32>(), k in 1u32..=200) {
        let dist = DegreeDistribution::Soliton(Soliton::new(k));
        let mut gen = RowGenerator::new(seed, k, dist);
        let first: Vec<_> = (0..15).map(|_| gen.next_row()).collect();
        gen.reset(seed);
        let second: Vec<_> = (0..15).map(|_| gen.next_row()).collect();
        prop_assert_eq!(first, second);
    }
}
