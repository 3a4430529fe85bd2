//! Seeded, stratified train/held-out split.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Row indices for each side of the split, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub held_out: Vec<usize>,
}

/// Split rows per class so each class keeps roughly `test_fraction` of its
/// samples aside.
///
/// A class with `c >= 2` samples holds out `ceil(c * test_fraction)`,
/// clamped to `1..=c-1`, so it always appears on both sides. A class with a
/// single sample stays in train. Classes are visited in index order with
/// one RNG, so the result depends only on `targets`, `test_fraction` and
/// `seed`.
pub fn stratified_split(
    targets: &[usize],
    n_classes: usize,
    test_fraction: f64,
    seed: u64,
) -> Split {
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (row, &target) in targets.iter().enumerate() {
        by_class[target].push(row);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(targets.len());
    let mut held_out = Vec::new();

    for mut rows in by_class {
        let count = rows.len();
        if count < 2 {
            train.extend(rows);
            continue;
        }
        rows.shuffle(&mut rng);
        let n_test = ((count as f64 * test_fraction).ceil() as usize).clamp(1, count - 1);
        held_out.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    train.sort_unstable();
    held_out.sort_unstable();
    Split { train, held_out }
}
