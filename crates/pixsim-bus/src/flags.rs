//! # Binding Flags

use bitflags::bitflags;

bitflags! {
    /// Options attached to a binding at registration time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MsgFlags: u8 {
        /// The binding must have received a message by the end of every unit
        /// of work.
        const REQUIRED = 0b0000_0001;
        /// A filled single-slot binding may be filled again in the same unit
        /// of work; the newer message replaces the older one.
        const ALLOW_OVERWRITE = 0b0000_0010;
        /// Match messages regardless of the name they were dispatched under.
        const IGNORE_NAME = 0b0000_0100;
        /// Match only messages dispatched under the default (empty) name,
        /// whatever input name the receiver is configured with.
        const UNNAMED_ONLY = 0b0000_1000;
    }
}

impl MsgFlags {
    /// No options.
    pub const NONE: Self = Self::empty();
}

/// Variant of a delegate, used for flag validation and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelegateKind {
    /// Stores one message in a receiver-owned slot.
    Single,
    /// Appends every message to a receiver-owned collection.
    Multi,
    /// Calls a receiver-supplied predicate with the typed message.
    Filter,
    /// Calls a receiver-supplied predicate with every message of every type.
    AnyFilter,
}

impl DelegateKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multi => "multi",
            Self::Filter => "filter",
            Self::AnyFilter => "any-filter",
        }
    }
}

impl std::fmt::Display for DelegateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that `flags` make sense for a delegate of `kind`.
///
/// Returns the reason for rejection, if any.
pub(crate) fn incompatibility(kind: DelegateKind, flags: MsgFlags) -> Option<&'static str> {
    if flags.contains(MsgFlags::IGNORE_NAME | MsgFlags::UNNAMED_ONLY) {
        return Some("IGNORE_NAME and UNNAMED_ONLY are mutually exclusive");
    }
    if flags.contains(MsgFlags::ALLOW_OVERWRITE) && kind != DelegateKind::Single {
        return Some("ALLOW_OVERWRITE only applies to single-slot bindings");
    }
    None
}
