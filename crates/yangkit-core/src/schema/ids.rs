//! Index types for arena storage.
//!
//! `NonZeroU32` gives `Option<T>` the niche optimization, so optional
//! back-references cost no extra space in the node arenas.

use core::num::NonZeroU32;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[derive(serde::Serialize, serde::Deserialize)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Create from a raw 1-based value.
            #[must_use]
            pub const fn from_raw(raw: u32) -> Option<Self> {
                match NonZeroU32::new(raw) {
                    Some(n) => Some(Self(n)),
                    None => None,
                }
            }

            /// Create from a 0-based arena index.
            #[must_use]
            pub fn from_index(index: usize) -> Option<Self> {
                Self::from_raw((index as u32).wrapping_add(1))
            }

            /// Raw 1-based value.
            #[must_use]
            pub const fn to_raw(self) -> u32 {
                self.0.get()
            }

            /// 0-based arena index.
            #[must_use]
            pub const fn to_index(self) -> usize {
                (self.0.get() - 1) as usize
            }
        }
    };
}

define_id!(
    /// Interned string identifier (dictionary handle).
    StrId
);

define_id!(
    /// Module identifier within a context.
    ModuleId
);

define_id!(
    /// Compiled schema node identifier within a context.
    NodeId
);

define_id!(
    /// Compiled type identifier within a context.
    TypeId
);

define_id!(
    /// Identity identifier within a context.
    IdentityId
);

define_id!(
    /// Compiled XPath expression identifier within a context.
    ExprId
);

define_id!(
    /// Data node identifier within a data tree.
    DataId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_invalid() {
        assert!(NodeId::from_raw(0).is_none());
    }

    #[test]
    fn test_index_round_trip() {
        let id = TypeId::from_index(41).unwrap();
        assert_eq!(id.to_raw(), 42);
        assert_eq!(id.to_index(), 41);
    }

    #[test]
    fn test_option_niche() {
        assert_eq!(
            core::mem::size_of::<Option<NodeId>>(),
            core::mem::size_of::<NodeId>()
        );
    }
}
