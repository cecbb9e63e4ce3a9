//! Bidirectional capability translation tables.
//!
//! Each adapter owns one static [`CapabilityTable`]. Lookups are pure and
//! total: an unmapped id yields `None`, never an error, because platforms
//! routinely expose capabilities the unified model does not cover.

use std::collections::BTreeSet;

use omnihub_domain::capability::Capability;

/// Native capability id ⇄ universal [`Capability`].
///
/// `primary` entries define the canonical native id of each universal
/// capability and must not repeat a capability. `aliases` are additional
/// native ids that translate forward to the same capability and therefore
/// translate back to its primary id.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityTable {
    primary: &'static [(&'static str, Capability)],
    aliases: &'static [(&'static str, Capability)],
}

impl CapabilityTable {
    #[must_use]
    pub const fn new(
        primary: &'static [(&'static str, Capability)],
        aliases: &'static [(&'static str, Capability)],
    ) -> Self {
        Self { primary, aliases }
    }

    /// Native id → universal capability.
    #[must_use]
    pub fn to_universal(&self, native: &str) -> Option<Capability> {
        self.primary
            .iter()
            .chain(self.aliases)
            .find(|(id, _)| *id == native)
            .map(|(_, cap)| *cap)
    }

    /// Universal capability → canonical native id.
    #[must_use]
    pub fn to_native(&self, capability: Capability) -> Option<&'static str> {
        self.primary
            .iter()
            .find(|(_, cap)| *cap == capability)
            .map(|(id, _)| *id)
    }

    /// Canonical native id equivalent to `native`.
    #[must_use]
    pub fn canonical(&self, native: &str) -> Option<&'static str> {
        self.to_universal(native).and_then(|cap| self.to_native(cap))
    }

    /// Union of the universal capabilities behind a set of native ids.
    /// Unmapped ids are dropped with a debug-level notice.
    pub fn normalize<'a>(&self, natives: impl IntoIterator<Item = &'a str>) -> BTreeSet<Capability> {
        let mut capabilities = BTreeSet::new();
        for native in natives {
            match self.to_universal(native) {
                Some(cap) => {
                    capabilities.insert(cap);
                }
                None => tracing::debug!(capability = native, "dropping unmapped native capability"),
            }
        }
        capabilities
    }

    /// Every native id the table knows, primaries first.
    pub fn native_ids(&self) -> impl Iterator<Item = &'static str> {
        self.primary.iter().chain(self.aliases).map(|(id, _)| *id)
    }

    /// Whether every primary capability is unique and every alias targets a
    /// capability that has a primary entry.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let mut seen = BTreeSet::new();
        let unique = self.primary.iter().all(|(_, cap)| seen.insert(*cap));
        unique && self.aliases.iter().all(|(_, cap)| seen.contains(cap))
    }
}
