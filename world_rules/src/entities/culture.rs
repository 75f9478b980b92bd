//! Culture vectors: the ideology profile shared by factions, beliefs, traits and leaders.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::ops::Add;

/// Lower bound of every culture axis after clamping.
pub const AXIS_MIN: i32 = -20;
/// Upper bound of every culture axis after clamping.
pub const AXIS_MAX: i32 = 20;

/// Numeric personality axes plus taboo and revered value sets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CultureVector {
    pub aggression: i32,
    pub magic_affinity: i32,
    pub collectivism: i32,
    pub taboo: BTreeSet<String>,
    pub revered: BTreeSet<String>,
}

/// Per-axis weights used by [`CultureVector::distance`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceWeights {
    pub aggression: f64,
    pub magic_affinity: f64,
    pub collectivism: f64,
    /// Axis differences up to this size are ignored.
    pub deadzone: f64,
}

impl Default for DistanceWeights {
    fn default() -> Self {
        Self {
            aggression: 0.15,
            magic_affinity: 0.1,
            collectivism: 0.1,
            deadzone: 2.0,
        }
    }
}

/// Weight added per value one side holds taboo and the other reveres.
const CROSS_VALUE_PENALTY: f64 = 1.5;
/// Weight subtracted per value both sides revere.
const SHARED_REVERED_BONUS: f64 = 0.5;

impl CultureVector {
    /// Create a vector with the given axes and no value sets.
    pub fn new(aggression: i32, magic_affinity: i32, collectivism: i32) -> Self {
        Self {
            aggression,
            magic_affinity,
            collectivism,
            ..Default::default()
        }
    }

    /// Builder: add a taboo value.
    pub fn with_taboo(mut self, value: impl Into<String>) -> Self {
        self.taboo.insert(value.into());
        self
    }

    /// Builder: add a revered value.
    pub fn with_revered(mut self, value: impl Into<String>) -> Self {
        self.revered.insert(value.into());
        self
    }

    /// Sum the axes and union the value sets.
    ///
    /// The axes are not clamped here so the sum stays associative; call
    /// [`CultureVector::clamped`] before storing a combined profile.
    pub fn add(&self, other: &CultureVector) -> CultureVector {
        CultureVector {
            aggression: self.aggression + other.aggression,
            magic_affinity: self.magic_affinity + other.magic_affinity,
            collectivism: self.collectivism + other.collectivism,
            taboo: self.taboo.union(&other.taboo).cloned().collect(),
            revered: self.revered.union(&other.revered).cloned().collect(),
        }
    }

    /// Multiply every axis by `k`, rounding to the nearest integer. Value sets are unchanged.
    pub fn scale(&self, k: f64) -> CultureVector {
        let scale_axis = |v: i32| (f64::from(v) * k).round() as i32;
        CultureVector {
            aggression: scale_axis(self.aggression),
            magic_affinity: scale_axis(self.magic_affinity),
            collectivism: scale_axis(self.collectivism),
            taboo: self.taboo.clone(),
            revered: self.revered.clone(),
        }
    }

    /// Bound every axis to `[AXIS_MIN, AXIS_MAX]`.
    pub fn clamped(&self) -> CultureVector {
        CultureVector {
            aggression: self.aggression.clamp(AXIS_MIN, AXIS_MAX),
            magic_affinity: self.magic_affinity.clamp(AXIS_MIN, AXIS_MAX),
            collectivism: self.collectivism.clamp(AXIS_MIN, AXIS_MAX),
            taboo: self.taboo.clone(),
            revered: self.revered.clone(),
        }
    }

    /// Weighted ideological distance between two profiles.
    ///
    /// Each axis contributes `max(0, |delta| - deadzone) * weight`. Every value
    /// one side holds taboo while the other reveres it adds 1.5, every shared
    /// revered value subtracts 0.5. The result never drops below zero, and
    /// identical profiles are always at distance zero.
    pub fn distance(&self, other: &CultureVector, weights: &DistanceWeights) -> f64 {
        if self == other {
            return 0.0;
        }

        let axis = |a: i32, b: i32, weight: f64| {
            (f64::from((a - b).abs()) - weights.deadzone).max(0.0) * weight
        };

        let mut total = axis(self.aggression, other.aggression, weights.aggression)
            + axis(self.magic_affinity, other.magic_affinity, weights.magic_affinity)
            + axis(self.collectivism, other.collectivism, weights.collectivism);

        let cross = self.taboo.intersection(&other.revered).count()
            + other.taboo.intersection(&self.revered).count();
        total += cross as f64 * CROSS_VALUE_PENALTY;

        let shared = self.revered.intersection(&other.revered).count();
        total -= shared as f64 * SHARED_REVERED_BONUS;

        total.max(0.0)
    }

    /// Read a culture vector stored in an entity data payload.
    pub fn from_value(value: &Value) -> Option<CultureVector> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Encode the vector for storage in an entity data payload.
    pub fn to_value(&self) -> Value {
        json!({
            "aggression": self.aggression,
            "magic_affinity": self.magic_affinity,
            "collectivism": self.collectivism,
            "taboo": self.taboo,
            "revered": self.revered,
        })
    }
}

impl Add for &CultureVector {
    type Output = CultureVector;

    fn add(self, rhs: &CultureVector) -> CultureVector {
        CultureVector::add(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_add_unions_sets() {
        let a = CultureVector::new(3, -2, 1).with_taboo("necromancy");
        let b = CultureVector::new(1, 4, -1)
            .with_taboo("necromancy")
            .with_revered("ancestors");

        let sum = &a + &b;
        assert_eq!(sum.aggression, 4);
        assert_eq!(sum.magic_affinity, 2);
        assert_eq!(sum.collectivism, 0);
        assert_eq!(sum.taboo.len(), 1);
        assert!(sum.revered.contains("ancestors"));
    }

    #[test]
    fn test_scale_keeps_sets() {
        let v = CultureVector::new(4, -3, 1).with_revered("sun");
        let scaled = v.scale(0.5);
        assert_eq!(scaled.aggression, 2);
        assert_eq!(scaled.magic_affinity, -2);
        assert_eq!(scaled.collectivism, 1);
        assert!(scaled.revered.contains("sun"));
    }

    #[test]
    fn test_clamped() {
        let v = CultureVector::new(35, -40, 5).clamped();
        assert_eq!(v.aggression, AXIS_MAX);
        assert_eq!(v.magic_affinity, AXIS_MIN);
        assert_eq!(v.collectivism, 5);
    }

    #[test]
    fn test_distance_deadzone() {
        let weights = DistanceWeights {
            aggression: 1.0,
            magic_affinity: 1.0,
            collectivism: 1.0,
            deadzone: 2.0,
        };
        let a = CultureVector::new(0, 0, 0);
        let b = CultureVector::new(2, 5, -1);
        // Only magic_affinity exceeds the deadzone: 5 - 2 = 3.
        assert!((a.distance(&b, &weights) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_value_sets() {
        let weights = DistanceWeights::default();
        let a = CultureVector::default().with_taboo("magic").with_revered("sun");
        let b = CultureVector::default().with_revered("magic");
        assert!((a.distance(&b, &weights) - 1.5).abs() < 1e-9);

        let c = CultureVector::new(1, 0, 0).with_revered("sun");
        // Shared reverence cannot push the distance below zero.
        assert_eq!(c.distance(&a.clone().with_revered("sun"), &weights), 0.0);
    }

    #[test]
    fn test_value_round_trip() {
        let v = CultureVector::new(2, 3, -4).with_taboo("iron");
        assert_eq!(CultureVector::from_value(&v.to_value()), Some(v));
    }

    fn arb_vector() -> impl Strategy<Value = CultureVector> {
        let values = || prop::collection::btree_set("[a-d]", 0..3);
        (-20i32..=20, -20i32..=20, -20i32..=20, values(), values()).prop_map(
            |(aggression, magic_affinity, collectivism, taboo, revered)| CultureVector {
                aggression,
                magic_affinity,
                collectivism,
                taboo,
                revered,
            },
        )
    }

    proptest! {
        #[test]
        fn prop_add_commutative(a in arb_vector(), b in arb_vector()) {
            prop_assert_eq!(a.add(&b), b.add(&a));
        }

        #[test]
        fn prop_add_associative(a in arb_vector(), b in arb_vector(), c in arb_vector()) {
            prop_assert_eq!(a.add(&b).add(&c), a.add(&b.add(&c)));
        }

        #[test]
        fn prop_union_idempotent(a in arb_vector()) {
            let doubled = a.add(&a);
            prop_assert_eq!(&doubled.taboo, &a.taboo);
            prop_assert_eq!(&doubled.revered, &a.revered);
        }

        #[test]
        fn prop_self_distance_zero(a in arb_vector()) {
            prop_assert_eq!(a.distance(&a, &DistanceWeights::default()), 0.0);
        }

        #[test]
        fn prop_distance_non_negative(a in arb_vector(), b in arb_vector()) {
            prop_assert!(a.distance(&b, &DistanceWeights::default()) >= 0.0);
        }
    }
}
