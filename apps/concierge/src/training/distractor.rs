//! Near-miss label selection for preference (DPO) training.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::intention::INTENTION_COUNT;

/// Semantically adjacent intentions, indexed by `label - 1`.
/// No entry contains its own label.
static SIMILAR_INTENTIONS: [&[u8]; INTENTION_COUNT as usize] = [
    // Reservations
    &[2, 3, 5],
    &[1, 3, 5],
    &[1, 2, 4, 5],
    &[3, 5],
    &[1, 2, 3, 4],
    // Check-in / check-out
    &[7, 8],
    &[6, 9],
    &[6, 9],
    &[7, 8],
    // Room service and dining
    &[20],
    &[12, 13, 14, 15],
    &[11, 13, 14],
    &[11, 12, 14],
    &[11, 12, 13],
    &[11],
    // Housekeeping
    &[17, 18],
    &[16, 18, 20],
    &[16, 17],
    &[16, 17],
    &[10, 17],
    // Information and services
    &[23, 32],
    &[14],
    &[21, 33],
    &[34, 35],
    &[21],
    // Billing
    &[27, 28, 29, 30],
    &[26, 28, 29, 30],
    &[26, 27, 29, 30],
    &[26, 27, 28, 30],
    &[26, 27, 28, 29],
    // Facilities and policies
    &[20, 24],
    &[21, 25],
    &[23],
    &[24, 35],
    &[24, 34],
    // Feedback and support
    &[37],
    &[36, 38],
    &[37, 39],
    &[38, 40],
    &[39],
];

/// Adjacent intentions for `label`; empty for labels outside `1..=40`.
pub fn similar_intentions(label: u8) -> &'static [u8] {
    usize::from(label)
        .checked_sub(1)
        .and_then(|i| SIMILAR_INTENTIONS.get(i))
        .copied()
        .unwrap_or(&[])
}

/// Picks a wrong-but-plausible label for `label`.
///
/// Uniform over the adjacency entry when there is one, otherwise uniform over
/// every intention at least two away from `label`. Never returns `label`.
pub fn select_distractor<R: Rng + ?Sized>(label: u8, rng: &mut R) -> u8 {
    let similar = similar_intentions(label);
    debug_assert!(!similar.contains(&label), "adjacency entry contains {label}");

    if let Some(&pick) = similar.choose(rng) {
        return pick;
    }

    let distant: Vec<u8> = (1..=INTENTION_COUNT)
        .filter(|&i| i.abs_diff(label) >= 2)
        .collect();
    // Non-empty for every u8: at most three ids lie within distance 1.
    distant.choose(rng).copied().unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::intention::is_valid_intention;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_table_never_contains_own_label() {
        for label in 1..=INTENTION_COUNT {
            let similar = similar_intentions(label);
            assert!(!similar.is_empty(), "label {label} has no neighbours");
            assert!(!similar.contains(&label), "label {label} lists itself");
            assert!(similar.iter().all(|&s| is_valid_intention(s)));
        }
    }

    #[test]
    fn test_known_neighbours() {
        assert_eq!(similar_intentions(16), &[17, 18]);
        assert_eq!(similar_intentions(40), &[39]);
        assert!(similar_intentions(0).is_empty());
        assert!(similar_intentions(41).is_empty());
    }

    #[test]
    fn test_distractor_never_equals_label() {
        let mut rng = StdRng::seed_from_u64(42);
        for label in 1..=INTENTION_COUNT {
            for _ in 0..10_000 {
                let d = select_distractor(label, &mut rng);
                assert_ne!(d, label);
                assert!(similar_intentions(label).contains(&d));
            }
        }
    }

    #[test]
    fn test_fallback_keeps_distance() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let d = select_distractor(41, &mut rng);
            assert!(is_valid_intention(d));
            assert!(d.abs_diff(41) >= 2);
        }
    }

    #[test]
    fn test_seeded_selection_is_reproducible() {
        let picks = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (1..=INTENTION_COUNT)
                .map(|l| select_distractor(l, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(picks(42), picks(42));
    }
}
