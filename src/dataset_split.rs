//! Randomized train/validation splitting with group integrity.
//!
//! Frames from one motion event are near-duplicates of each other; letting
//! them land on both sides of a split leaks validation data into training.
//! The splitter therefore draws one decision per group and moves the whole
//! group. The realized ratio is only concentrated near the target: many
//! small groups converge on it, a few large ones wander.

use rand::Rng;

/// Split pre-grouped items into a (left, right) pair, sending each whole
/// group left with probability `ratio`.
///
/// Every input item appears in exactly one of the outputs. The rng is
/// injected so a seeded generator reproduces a split exactly.
pub fn split_groups<T, R: Rng>(
    groups: Vec<Vec<T>>,
    ratio: f64,
    rng: &mut R,
) -> (Vec<T>, Vec<T>) {
    let mut left = Vec::new();
    let mut right = Vec::new();

    for group in groups {
        if rng.gen::<f64>() < ratio {
            left.extend(group);
        } else {
            right.extend(group);
        }
    }

    (left, right)
}

/// Split uncorrelated items: each item is its own group.
pub fn split_items<T, R: Rng>(items: Vec<T>, ratio: f64, rng: &mut R) -> (Vec<T>, Vec<T>) {
    let groups = items.into_iter().map(|item| vec![item]).collect();
    split_groups(groups, ratio, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_groups_are_never_split() {
        // 1000 synthetic motion events of 4 frames each; every event must
        // land whole on one side.
        let groups: Vec<Vec<u32>> = (0..1000u32)
            .map(|event| (0..4).map(|frame| event * 10 + frame).collect())
            .collect();

        let mut rng = StdRng::seed_from_u64(7);
        let (train, valid) = split_groups(groups, 0.8, &mut rng);

        let train_events: HashSet<u32> = train.iter().map(|id| id / 10).collect();
        let valid_events: HashSet<u32> = valid.iter().map(|id| id / 10).collect();
        assert!(train_events.is_disjoint(&valid_events));

        assert_eq!(train.len() + valid.len(), 4000);
        assert_eq!(train.len() % 4, 0);
        assert_eq!(valid.len() % 4, 0);
    }

    #[test]
    fn test_no_items_lost_or_duplicated() {
        let items: Vec<u32> = (0..500).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let (left, right) = split_items(items, 0.8, &mut rng);

        let mut all: Vec<u32> = left.iter().chain(right.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..500).collect::<Vec<u32>>());
    }

    #[test]
    fn test_realized_ratio_concentrates_near_target() {
        for seed in 0..20 {
            let items: Vec<u32> = (0..1000).collect();
            let mut rng = StdRng::seed_from_u64(seed);
            let (train, _valid) = split_items(items, 0.8, &mut rng);
            let realized = train.len() as f64 / 1000.0;
            assert!(
                (0.7..=0.9).contains(&realized),
                "seed {seed}: realized ratio {realized} strayed past 10% of 0.8"
            );
        }
    }

    #[test]
    fn test_same_seed_reproduces_the_split() {
        let items: Vec<u32> = (0..100).collect();

        let mut first_rng = StdRng::seed_from_u64(42);
        let first = split_items(items.clone(), 0.8, &mut first_rng);

        let mut second_rng = StdRng::seed_from_u64(42);
        let second = split_items(items, 0.8, &mut second_rng);

        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input() {
        let mut rng = StdRng::seed_from_u64(0);
        let (left, right) = split_groups(Vec::<Vec<u32>>::new(), 0.8, &mut rng);
        assert!(left.is_empty());
        assert!(right.is_empty());
    }
}
