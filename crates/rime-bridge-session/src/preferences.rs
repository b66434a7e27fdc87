//! Host-set preferences, cached until a session exists to apply them to.

use std::str::FromStr;

/// Value of a slot the host has never set.
pub const UNSET: i32 = -1;

/// A recognised preference name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preference {
    PageSize,
    EnableCompletion,
    EnableCorrection,
    EnableSentence,
    EnableLearning,
}

impl Preference {
    pub const ALL: [Self; 5] = [
        Self::PageSize,
        Self::EnableCompletion,
        Self::EnableCorrection,
        Self::EnableSentence,
        Self::EnableLearning,
    ];

    /// Name used by the host and the engine.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PageSize => "pageSize",
            Self::EnableCompletion => "enableCompletion",
            Self::EnableCorrection => "enableCorrection",
            Self::EnableSentence => "enableSentence",
            Self::EnableLearning => "enableLearning",
        }
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

impl FromStr for Preference {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|p| p.as_str() == s).ok_or(())
    }
}

/// Five named slots; toggles are tri-state (`-1` unset, `0` off, `1` on).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceStore {
    values: [i32; Preference::ALL.len()],
}

impl Default for PreferenceStore {
    fn default() -> Self {
        Self {
            values: [UNSET; Preference::ALL.len()],
        }
    }
}

impl PreferenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a slot by name. Unknown names are ignored and reported as `false`.
    pub fn set(&mut self, name: &str, value: i32) -> bool {
        match name.parse::<Preference>() {
            Ok(preference) => {
                self.values[preference.slot()] = value;
                true
            }
            Err(()) => {
                tracing::debug!(name, "ignoring unknown preference");
                false
            }
        }
    }

    /// The cached value, `None` while unset.
    #[must_use]
    pub fn get(&self, preference: Preference) -> Option<i32> {
        let value = self.values[preference.slot()];
        (value != UNSET).then_some(value)
    }

    /// Slots the host has set, in declaration order.
    pub fn iter_set(&self) -> impl Iterator<Item = (Preference, i32)> + '_ {
        Preference::ALL
            .into_iter()
            .filter_map(|p| self.get(p).map(|v| (p, v)))
    }
}
