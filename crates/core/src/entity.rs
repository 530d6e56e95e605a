//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Catalog trainings, fueler profiles, current certifications and history entries are all
/// entities: two rows with equal attributes but different ids are different rows.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
