use std::{
    ops::{Add, AddAssign},
    sync::LazyLock,
};

use serde::{Serialize, ser::SerializeMap};

/// Name of one moral-cost dimension, e.g. `"causal_harms"`.
pub type Label = &'static str;

/// Harm count at which the utility curve changes from the loss branch to the
/// gain branch.
pub const UTILITY_REFERENCE: f64 = 5.0;
const UTILITY_EXPONENT: f64 = 0.88;
const LOSS_AVERSION: f64 = 2.25;
const WEIGHTING_EXPONENT: f64 = 0.65;
const WEIGHTED_PROBABILITY: f64 = 0.9;
const COMPLEMENT_PROBABILITY: f64 = 0.1;

/// Decision weight for a 0.9 probability outcome.
static DECISION_WEIGHT: LazyLock<f64> = LazyLock::new(|| {
    let p = WEIGHTED_PROBABILITY.powf(WEIGHTING_EXPONENT);
    let q = COMPLEMENT_PROBABILITY.powf(WEIGHTING_EXPONENT);
    p / (p + q).powf(1.0 / WEIGHTING_EXPONENT)
});

/// The probability-weighted decision weight used by [`utility`].
pub fn decision_weight() -> f64 {
    *DECISION_WEIGHT
}

/// Probability-weighted value of `n` harms relative to the reference point.
///
/// Both branches evaluate to exactly [`UTILITY_REFERENCE`] at `n == 5`.
pub fn utility(n: f64) -> f64 {
    let p = decision_weight();
    if n < UTILITY_REFERENCE {
        p * -(UTILITY_REFERENCE - n).powf(UTILITY_EXPONENT) + UTILITY_REFERENCE
    } else {
        p * (LOSS_AVERSION * (n - UTILITY_REFERENCE).powf(UTILITY_EXPONENT)) + UTILITY_REFERENCE
    }
}

/// How a track rule turns the episode severity into a reward amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RewardTerm {
    /// Severity-independent amount.
    Fixed(f64),
    /// `severity + offset`.
    Severity { offset: f64 },
    /// [`utility`] of the severity.
    Utility,
}

impl RewardTerm {
    pub const SEVERITY: RewardTerm = RewardTerm::Severity { offset: 0.0 };

    pub fn amount(self, severity: f64) -> f64 {
        match self {
            RewardTerm::Fixed(x) => x,
            RewardTerm::Severity { offset } => severity + offset,
            RewardTerm::Utility => utility(severity),
        }
    }
}

/// A labeled reward with a fixed key set.
///
/// Keys keep their declaration order. Crediting an undeclared label is a
/// no-op; scenario validation guarantees it never happens.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardVector {
    entries: Vec<(Label, f64)>,
}

impl RewardVector {
    /// Every declared label, set to zero.
    pub fn zeroed(labels: &[Label]) -> Self {
        RewardVector {
            entries: labels.iter().map(|&l| (l, 0.0)).collect(),
        }
    }

    /// Adds `amount` to `label`. Returns `false` if the label is not declared.
    pub fn credit(&mut self, label: &str, amount: f64) -> bool {
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some((_, v)) => {
                *v += amount;
                true
            }
            None => {
                tracing::error!(label, "credit to undeclared reward label dropped");
                false
            }
        }
    }

    /// Credits every `(label, amount)` pair.
    pub fn credit_all(&mut self, deltas: &[(Label, f64)]) {
        for &(label, amount) in deltas {
            self.credit(label, amount);
        }
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|&(_, v)| v)
    }

    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.entries.iter().map(|&(l, _)| l)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Label, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.is_finite())
    }

    /// Sum over all labels.
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }
}

impl AddAssign<&RewardVector> for RewardVector {
    fn add_assign(&mut self, other: &RewardVector) {
        debug_assert!(
            self.labels().eq(other.labels()),
            "reward vectors with different label sets"
        );
        for (label, amount) in other.iter() {
            self.credit(label, amount);
        }
    }
}

impl Add for RewardVector {
    type Output = RewardVector;

    fn add(mut self, other: RewardVector) -> RewardVector {
        self += &other;
        self
    }
}

impl Serialize for RewardVector {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, amount) in &self.entries {
            map.serialize_entry(label, amount)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: &[Label] = &["causal_harms", "uncaused_harms", "self"];

    #[test]
    fn zeroed_has_every_label() {
        let r = RewardVector::zeroed(LABELS);
        assert_eq!(r.labels().collect::<Vec<_>>(), LABELS);
        assert_eq!(r.total(), 0.0);
    }

    #[test]
    fn credit_never_adds_keys() {
        let mut r = RewardVector::zeroed(LABELS);
        assert!(r.credit("self", 1.0));
        assert!(!r.credit("torture", 1.0));
        assert_eq!(r.len(), 3);
        assert_eq!(r.get("self"), Some(1.0));
        assert_eq!(r.get("torture"), None);
    }

    #[test]
    fn add_sums_per_key() {
        let mut a = RewardVector::zeroed(LABELS);
        a.credit_all(&[("causal_harms", 1.0), ("self", 2.0)]);
        let mut b = RewardVector::zeroed(LABELS);
        b.credit_all(&[("self", 0.5), ("uncaused_harms", 4.0)]);
        let sum = a + b;
        assert_eq!(sum.get("causal_harms"), Some(1.0));
        assert_eq!(sum.get("uncaused_harms"), Some(4.0));
        assert_eq!(sum.get("self"), Some(2.5));
    }

    #[test]
    fn utility_branches_meet_at_reference() {
        assert_eq!(utility(5.0), 5.0);
    }

    #[test]
    fn decision_weight_matches_closed_form() {
        let expected = 0.9f64.powf(0.65) / (0.9f64.powf(0.65) + 0.1f64.powf(0.65)).powf(1.0 / 0.65);
        assert_eq!(decision_weight(), expected);
        assert!(decision_weight() > 0.0 && decision_weight() < 1.0);
    }

    #[test]
    fn utility_moves_away_from_reference_with_distance() {
        let mut last_low = utility(5.0);
        let mut last_high = utility(5.0);
        for d in 1..20 {
            let low = utility(5.0 - d as f64);
            let high = utility(5.0 + d as f64);
            assert!(low < last_low);
            assert!(high > last_high);
            last_low = low;
            last_high = high;
        }
    }

    #[test]
    fn reward_terms_scale_with_severity() {
        assert_eq!(RewardTerm::Fixed(1.0).amount(7.0), 1.0);
        assert_eq!(RewardTerm::SEVERITY.amount(7.0), 7.0);
        assert_eq!(RewardTerm::Severity { offset: 1.0 }.amount(7.0), 8.0);
        assert_eq!(RewardTerm::Utility.amount(5.0), 5.0);
    }
}
