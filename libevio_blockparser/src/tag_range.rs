use super::constants::*;

/// An inclusive range of CODA bank tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRange {
    pub min: u16,
    pub max: u16,
}

impl TagRange {
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, tag: u16) -> bool {
        tag >= self.min && tag <= self.max
    }

    pub fn overlaps(&self, other: &TagRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

pub const TRIGGER_BANK: TagRange = TagRange::new(TRIGGER_BANK_TAG_MIN, TRIGGER_BANK_TAG_MAX);
pub const PHYSICS_EVENT: TagRange = TagRange::new(PHYSICS_EVENT_TAG_MIN, PHYSICS_EVENT_TAG_MAX);
pub const CONTROL_EVENT: TagRange = TagRange::new(CONTROL_EVENT_TAG_MIN, CONTROL_EVENT_TAG_MAX);
pub const CODA_RESERVED: TagRange = TagRange::new(CODA_RESERVED_TAG_MIN, CODA_RESERVED_TAG_MAX);

/// What a tag means to CODA
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    TriggerBank,
    PhysicsEvent,
    ControlEvent,
    CodaReserved,
    User,
}

// First match wins; the specific ranges come before the catch-all reserved range
const CLASSIFIER_TABLE: [(TagRange, TagClass); 4] = [
    (TRIGGER_BANK, TagClass::TriggerBank),
    (PHYSICS_EVENT, TagClass::PhysicsEvent),
    (CONTROL_EVENT, TagClass::ControlEvent),
    (CODA_RESERVED, TagClass::CodaReserved),
];

impl TagClass {
    /// Classify a tag by the first range of the table containing it
    pub fn classify(tag: u16) -> Self {
        CLASSIFIER_TABLE
            .iter()
            .find(|(range, _)| range.contains(tag))
            .map(|(_, class)| *class)
            .unwrap_or(TagClass::User)
    }
}

/// Control events by name; None if the tag is not a known control event
pub fn control_event_name(tag: u16) -> Option<&'static str> {
    match tag {
        CODA_EV_SYNC => Some("Sync"),
        CODA_EV_PRESTART => Some("Prestart"),
        CODA_EV_GO => Some("Go"),
        CODA_EV_PAUSE => Some("Pause"),
        CODA_EV_END => Some("End"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(TagClass::classify(0xFF61), TagClass::PhysicsEvent);
        assert_eq!(TagClass::classify(0xFFD2), TagClass::ControlEvent);
        assert_eq!(TagClass::classify(0xFF21), TagClass::TriggerBank);
        assert_eq!(TagClass::classify(0xFFF0), TagClass::CodaReserved);
        assert_eq!(TagClass::classify(0x0003), TagClass::User);
        assert_eq!(control_event_name(0xFFD2), Some("Go"));
        assert_eq!(control_event_name(0xFF61), None);
    }

    #[test]
    fn test_specific_ranges_do_not_overlap() {
        let specific = [TRIGGER_BANK, PHYSICS_EVENT, CONTROL_EVENT];
        for (i, a) in specific.iter().enumerate() {
            for b in specific.iter().skip(i + 1) {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
            assert!(CODA_RESERVED.contains(a.min) && CODA_RESERVED.contains(a.max));
        }
    }
}
