//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: two validity periods of 365 days are the same
/// validity period, regardless of which training carries them. They are immutable; to
/// "change" one, build a new value.
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// struct ValidityPeriod(Option<u32>);
///
/// impl ValueObject for ValidityPeriod {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
