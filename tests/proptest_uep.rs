//! Property-based tests for the UEP `map_in2out` index mapping (C9).

use proptest::prelude::*;
use uep_fountain::uep::UepLayout;

fn layout_strategy() -> impl Strategy<Value = (Vec<usize>, Vec<usize>, usize)> {
    (1usize..=4).prop_flat_map(|n| {
        (
            prop::collection::vec(1usize..=8, n..=n),
            prop::collection::vec(1usize..=4, n..=n),
            1usize..=3,
        )
    })
}

proptest! {
    #[test]
    fn map_in2out_is_surjective_onto_kin_with_expected_preimage_sizes(
        (ks, rfs, ef) in layout_strategy(),
    ) {
        let layout = UepLayout::new(ks.clone(), rfs.clone(), ef).unwrap();
        let mut hits = vec![0usize; layout.kin()];
        for idx in 0..layout.kout() {
            let global = layout.map_in2out(idx);
            prop_assert!(global < layout.kin());
            hits[global] += 1;
        }

        let mut base = 0usize;
        for (i, &k) in ks.iter().enumerate() {
            let expected = rfs[i] * ef;
            for local in 0..k {
                prop_assert_eq!(hits[base + local], expected);
            }
            base += k;
        }
    }

    #[test]
    fn priority_of_agrees_with_the_class_that_owns_the_index(
        (ks, rfs, ef) in layout_strategy(),
    ) {
        let layout = UepLayout::new(ks.clone(), rfs, ef).unwrap();
        let mut base = 0usize;
        for (i, &k) in ks.iter().enumerate() {
            for local in 0..k {
                prop_assert_eq!(layout.priority_of(base + local), i);
            }
            base += k;
        }
    }

    #[test]
    fn map_in2out_output_is_always_within_kin_bounds(
        (ks, rfs, ef) in layout_strategy(),
        idx_seed in any::<u32>(),
    ) {
        let layout = UepLayout::new(ks, rfs, ef).unwrap();
        let idx = (idx_seed as usize) % layout.kout();
        prop_assert!(layout.map_in2out(idx) < layout.kin());
    }
}
