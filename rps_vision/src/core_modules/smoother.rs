// THEORY:
// The `TemporalSmoother` debounces a player's raw gesture stream into a stable
// label. Segmentation noise and motion blur make single-tick classifications
// flicker; a human changing shape does not.
//
// Key architectural principles:
// 1.  **Sliding window**: the last K raw labels are kept in a ring buffer. Every
//     tick contributes a label, including UNKNOWN ticks with no detection.
// 2.  **Majority vote**: the window's most frequent label is the current
//     candidate. Ties go to the label seen most recently.
// 3.  **Warm-up**: the stable output stays UNKNOWN until the window is full and one
//     label holds a strict majority of it.
// 4.  **Debounce**: once established, the stable label only changes after a
//     different majority has held for M consecutive ticks (M < K). Any tick where
//     the majority falls back to the stable label resets that count.
//
// `SmootherState` is the only memory. The smoother itself is immutable and each
// tick is a pure `(state, sample) -> state` step.

use crate::config::SmootherConfig;
use crate::core_modules::gesture::{Gesture, GestureSample};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SmootherState {
    history: VecDeque<Gesture>,
    stable: Gesture,
    established: bool,
    candidate: Option<Gesture>,
    streak: usize,
    ticks_since_change: u64,
}

impl SmootherState {
    pub fn stable(&self) -> Gesture {
        self.stable
    }

    /// Ticks since the stable label last changed (or since the session started).
    pub fn ticks_since_change(&self) -> u64 {
        self.ticks_since_change
    }

    pub fn history(&self) -> &VecDeque<Gesture> {
        &self.history
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TemporalSmoother {
    window: usize,
    debounce: usize,
}

impl TemporalSmoother {
    pub fn new(config: &SmootherConfig) -> Self {
        Self {
            window: config.window,
            debounce: config.debounce,
        }
    }

    pub fn step(&self, state: &SmootherState, sample: &GestureSample) -> SmootherState {
        let mut next = state.clone();
        next.history.push_back(sample.gesture);
        if next.history.len() > self.window {
            next.history.pop_front();
        }
        next.ticks_since_change = next.ticks_since_change.saturating_add(1);

        if next.history.len() < self.window {
            return next;
        }
        let Some((majority, count)) = majority(&next.history) else {
            return next;
        };

        if !next.established {
            if count * 2 > self.window {
                next.stable = majority;
                next.established = true;
                next.ticks_since_change = 0;
            }
            return next;
        }

        if majority == next.stable {
            next.candidate = None;
            next.streak = 0;
            return next;
        }

        if next.candidate == Some(majority) {
            next.streak += 1;
        } else {
            next.candidate = Some(majority);
            next.streak = 1;
        }
        if next.streak >= self.debounce {
            next.stable = majority;
            next.candidate = None;
            next.streak = 0;
            next.ticks_since_change = 0;
        }
        next
    }
}

/// Most frequent label and its count; ties go to the most recent occurrence.
fn majority(history: &VecDeque<Gesture>) -> Option<(Gesture, usize)> {
    let mut best: Option<(Gesture, usize, usize)> = None;
    for gesture in Gesture::ALL {
        let count = history.iter().filter(|&&g| g == gesture).count();
        let Some(last_seen) = history.iter().rposition(|&g| g == gesture) else {
            continue;
        };
        let better = match best {
            None => true,
            Some((_, best_count, best_seen)) => {
                count > best_count || (count == best_count && last_seen > best_seen)
            }
        };
        if better {
            best = Some((gesture, count, last_seen));
        }
    }
    best.map(|(gesture, count, _)| (gesture, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sample(gesture: Gesture, frame_index: u64) -> GestureSample {
        GestureSample {
            gesture,
            confidence: 0.9,
            frame_index,
            descriptors: None,
        }
    }

    fn run(smoother: &TemporalSmoother, labels: &[Gesture]) -> Vec<Gesture> {
        let mut state = SmootherState::default();
        labels
            .iter()
            .enumerate()
            .map(|(i, &g)| {
                state = smoother.step(&state, &sample(g, i as u64));
                state.stable()
            })
            .collect()
    }

    fn smoother(window: usize, debounce: usize) -> TemporalSmoother {
        TemporalSmoother::new(&SmootherConfig { window, debounce })
    }

    #[test]
    fn unknown_until_the_window_fills() {
        let stable = run(&smoother(5, 2), &[Gesture::Rock; 8]);
        assert_eq!(&stable[..4], &[Gesture::Unknown; 4]);
        assert_eq!(&stable[4..], &[Gesture::Rock; 4]);
    }

    #[test]
    fn first_label_needs_a_strict_majority() {
        use Gesture::*;
        let stable = run(&smoother(4, 2), &[Rock, Paper, Rock, Paper, Rock]);
        assert_eq!(stable, vec![Unknown, Unknown, Unknown, Unknown, Unknown]);
        let stable = run(&smoother(4, 2), &[Rock, Paper, Rock, Paper, Rock, Rock]);
        assert_eq!(stable[5], Rock);
    }

    #[test]
    fn single_tick_glitch_is_ignored() {
        let mut labels = vec![Gesture::Rock; 12];
        labels[8] = Gesture::Scissors;
        let stable = run(&smoother(6, 3), &labels);
        assert!(stable[6..].iter().all(|&g| g == Gesture::Rock));
    }

    #[test]
    fn a_real_change_lands_after_the_debounce() {
        let mut labels = vec![Gesture::Rock; 10];
        labels.extend([Gesture::Paper; 12]);
        let stable = run(&smoother(6, 3), &labels);
        // Paper ties the window on tick 12 and wins as the most recent label, then
        // has to hold for three ticks.
        assert_eq!(stable[13], Gesture::Rock);
        assert_eq!(stable[14], Gesture::Paper);
        assert!(stable[14..].iter().all(|&g| g == Gesture::Paper));
    }

    #[test]
    fn ties_go_to_the_most_recent_label() {
        use Gesture::*;
        let history: VecDeque<_> = [Paper, Rock, Rock, Paper].into_iter().collect();
        assert_eq!(majority(&history), Some((Paper, 2)));
        let history: VecDeque<_> = [Paper, Rock, Paper, Rock].into_iter().collect();
        assert_eq!(majority(&history), Some((Rock, 2)));
        assert_eq!(majority(&VecDeque::new()), None);
    }

    #[test]
    fn maximal_flicker_changes_no_faster_than_the_debounce() {
        let mut rng = StdRng::seed_from_u64(42);
        for (window, debounce) in [(5, 2), (8, 3), (10, 3), (12, 5)] {
            let smoother = smoother(window, debounce);
            let mut previous = Gesture::Rock;
            let labels: Vec<Gesture> = (0..400)
                .map(|_| {
                    let mut next = Gesture::ALL[rng.random_range(0..Gesture::ALL.len())];
                    while next == previous {
                        next = Gesture::ALL[rng.random_range(0..Gesture::ALL.len())];
                    }
                    previous = next;
                    next
                })
                .collect();

            let stable = run(&smoother, &labels);
            let changes: Vec<usize> = stable
                .windows(2)
                .enumerate()
                .filter(|(_, pair)| pair[0] != pair[1])
                .map(|(i, _)| i + 1)
                .collect();
            for gap in changes.windows(2) {
                assert!(gap[1] - gap[0] >= debounce, "changes at {gap:?} with M = {debounce}");
            }
        }
    }

    #[test]
    fn state_only_changes_through_step() {
        let smoother = smoother(4, 2);
        let state = SmootherState::default();
        let next = smoother.step(&state, &sample(Gesture::Paper, 0));
        assert_eq!(state, SmootherState::default());
        assert_eq!(next.history().len(), 1);
        assert_eq!(next.ticks_since_change(), 1);
    }
}
