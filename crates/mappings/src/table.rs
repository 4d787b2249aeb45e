//! The mapping table and resolution logic.

use serde::{Deserialize, Serialize};
use wavehome_events::{Gesture, GestureOccurrence, Hand};

/// Hand filter on the mapping side. `Either` matches both hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandSelector {
    Left,
    Right,
    Either,
}

impl HandSelector {
    pub fn matches(&self, hand: Hand) -> bool {
        match self {
            HandSelector::Either => true,
            HandSelector::Left => hand == Hand::Left,
            HandSelector::Right => hand == Hand::Right,
        }
    }
}

/// The device call a mapping triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAction {
    /// Target entity, e.g. `light.kitchen`.
    pub target_id: String,
    /// Operation name, e.g. `turn_on`.
    pub operation: String,
    /// Extra service data merged into the call payload.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

fn default_confidence_threshold() -> f32 {
    0.8
}

/// One configured gesture-to-action rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureMapping {
    /// Display name, used in outcomes and logs.
    pub name: String,
    pub gesture: Gesture,
    pub hand: HandSelector,
    /// Per-mapping confidence requirement, on top of the global floor.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    pub action: DeviceAction,
}

impl GestureMapping {
    /// Whether this mapping qualifies for the given occurrence.
    fn qualifies(&self, occurrence: &GestureOccurrence) -> bool {
        self.gesture == occurrence.gesture
            && self.hand.matches(occurrence.hand)
            && occurrence.confidence >= self.confidence_threshold
    }
}

/// An ordered, immutable set of mappings.
///
/// Replaced wholesale on reload; resolution is a pure function of the
/// table and the occurrence.
#[derive(Debug, Default)]
pub struct MappingTable {
    mappings: Vec<GestureMapping>,
}

impl MappingTable {
    pub fn new(mappings: Vec<GestureMapping>) -> Self {
        Self { mappings }
    }

    /// First qualifying mapping in configured order, if any.
    ///
    /// Insertion order is the documented precedence: an earlier entry
    /// deliberately overrides a later, broader one.
    pub fn resolve(&self, occurrence: &GestureOccurrence) -> Option<&GestureMapping> {
        self.mappings.iter().find(|m| m.qualifies(occurrence))
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GestureMapping> {
        self.mappings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn occurrence(gesture: Gesture, hand: Hand, confidence: f32) -> GestureOccurrence {
        GestureOccurrence {
            gesture,
            hand,
            confidence,
            confirmed_at: Instant::now(),
            ts_ms: 0,
        }
    }

    fn mapping(name: &str, gesture: Gesture, hand: HandSelector, threshold: f32) -> GestureMapping {
        GestureMapping {
            name: name.to_string(),
            gesture,
            hand,
            confidence_threshold: threshold,
            action: DeviceAction {
                target_id: "light.kitchen".to_string(),
                operation: "turn_on".to_string(),
                parameters: serde_json::Value::Null,
            },
        }
    }

    #[test]
    fn resolves_first_qualifying_in_order() {
        let table = MappingTable::new(vec![
            mapping("right only", Gesture::OpenPalm, HandSelector::Right, 0.8),
            mapping("any hand", Gesture::OpenPalm, HandSelector::Either, 0.8),
        ]);

        let occ = occurrence(Gesture::OpenPalm, Hand::Right, 0.9);
        assert_eq!(table.resolve(&occ).unwrap().name, "right only");

        // Left hand skips the first entry and falls through to the
        // wildcard.
        let occ = occurrence(Gesture::OpenPalm, Hand::Left, 0.9);
        assert_eq!(table.resolve(&occ).unwrap().name, "any hand");
    }

    #[test]
    fn resolution_is_deterministic_and_pure() {
        let table = MappingTable::new(vec![mapping(
            "palm",
            Gesture::OpenPalm,
            HandSelector::Either,
            0.8,
        )]);
        let occ = occurrence(Gesture::OpenPalm, Hand::Right, 0.9);

        for _ in 0..10 {
            assert_eq!(table.resolve(&occ).unwrap().name, "palm");
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn threshold_filters_low_confidence() {
        let table = MappingTable::new(vec![mapping(
            "strict",
            Gesture::Victory,
            HandSelector::Either,
            0.95,
        )]);

        assert!(table
            .resolve(&occurrence(Gesture::Victory, Hand::Left, 0.9))
            .is_none());
        assert!(table
            .resolve(&occurrence(Gesture::Victory, Hand::Left, 0.95))
            .is_some());
    }

    #[test]
    fn no_match_is_none_not_error() {
        let table = MappingTable::new(vec![mapping(
            "fist",
            Gesture::ClosedFist,
            HandSelector::Left,
            0.8,
        )]);

        assert!(table
            .resolve(&occurrence(Gesture::OpenPalm, Hand::Left, 0.99))
            .is_none());
        assert!(table
            .resolve(&occurrence(Gesture::ClosedFist, Hand::Right, 0.99))
            .is_none());
    }

    #[test]
    fn hand_selector_matching() {
        assert!(HandSelector::Either.matches(Hand::Left));
        assert!(HandSelector::Either.matches(Hand::Right));
        assert!(HandSelector::Left.matches(Hand::Left));
        assert!(!HandSelector::Left.matches(Hand::Right));
    }
}
