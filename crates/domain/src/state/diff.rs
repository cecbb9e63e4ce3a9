//! Key-level differences between two state snapshots.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::StateValue;

/// A value that differs between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    pub from: StateValue,
    pub to: StateValue,
}

/// Keys added, changed or removed going from one snapshot to the next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDiff {
    pub added: BTreeMap<String, StateValue>,
    pub changed: BTreeMap<String, ValueChange>,
    pub removed: BTreeSet<String>,
}

impl StateDiff {
    /// Compute the diff from `previous` to `current`.
    #[must_use]
    pub fn between(
        previous: &BTreeMap<String, StateValue>,
        current: &BTreeMap<String, StateValue>,
    ) -> Self {
        let mut diff = Self::default();
        for (key, value) in current {
            match previous.get(key) {
                None => {
                    diff.added.insert(key.clone(), value.clone());
                }
                Some(old) if old != value => {
                    diff.changed.insert(
                        key.clone(),
                        ValueChange {
                            from: old.clone(),
                            to: value.clone(),
                        },
                    );
                }
                Some(_) => {}
            }
        }
        diff.removed = previous
            .keys()
            .filter(|key| !current.contains_key(*key))
            .cloned()
            .collect();
        diff
    }

    /// A diff where every current key is reported as added.
    #[must_use]
    pub fn all_added(current: &BTreeMap<String, StateValue>) -> Self {
        Self {
            added: current.clone(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    /// Every key touched by this diff.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.added
            .keys()
            .chain(self.changed.keys())
            .chain(self.removed.iter())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, StateValue)]) -> BTreeMap<String, StateValue> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn should_report_added_changed_and_removed_keys() {
        let previous = map(&[
            ("switch.switch", "off".into()),
            ("dimmer.level", StateValue::Int(10)),
            ("battery.battery", StateValue::Int(90)),
        ]);
        let current = map(&[
            ("switch.switch", "on".into()),
            ("dimmer.level", StateValue::Int(10)),
            ("fan.speed", StateValue::Int(50)),
        ]);

        let diff = StateDiff::between(&previous, &current);

        assert_eq!(diff.added.keys().collect::<Vec<_>>(), ["fan.speed"]);
        assert_eq!(
            diff.changed["switch.switch"],
            ValueChange {
                from: "off".into(),
                to: "on".into()
            }
        );
        assert!(diff.removed.contains("battery.battery"));
        assert_eq!(diff.keys().count(), 3);
    }

    #[test]
    fn should_be_empty_for_identical_snapshots() {
        let state = map(&[("lock.lock", "locked".into())]);
        assert!(StateDiff::between(&state, &state).is_empty());
    }
}
