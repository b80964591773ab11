//! The tagged value type scripts and native code pass around.

use crate::handle::Handle;
use std::hash::{Hash, Hasher};

/// A user-registered object kind, for values that wrap host data the runtime
/// itself doesn't understand.
pub type UserKind = u32;

/// The first user-registrable kind; kinds below this are reserved for the
/// built-in reference types.
pub const USER_KIND_BASE: UserKind = 0;

/// A tagged value: either an immediate (`Null`, `Int`, `Float`) or a
/// reference into the object heap. Reference variants copy only the handle,
/// never the referenced object, so `Variant: Copy`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Variant {
    Null,
    Int(i32),
    Float(f32),
    String(Handle),
    Table(Handle),
    Function(Handle),
    User(UserKind, Handle),
}

/// The discriminant of a [`Variant`], used for type checks and opcode
/// dispatch without holding a payload. Reference types are exactly those
/// `>= VariantType::String`, matching the "discriminated by `type >= STRING`"
/// invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum VariantType {
    Null = 0,
    Int = 1,
    Float = 2,
    String = 3,
    Table = 4,
    Function = 5,
    User = 6,
}

impl Variant {
    pub fn variant_type(&self) -> VariantType {
        match self {
            Variant::Null => VariantType::Null,
            Variant::Int(_) => VariantType::Int,
            Variant::Float(_) => VariantType::Float,
            Variant::String(_) => VariantType::String,
            Variant::Table(_) => VariantType::Table,
            Variant::Function(_) => VariantType::Function,
            Variant::User(..) => VariantType::User,
        }
    }

    pub fn is_reference(&self) -> bool {
        self.variant_type() >= VariantType::String
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    /// The handle a reference variant carries, if any.
    pub fn handle(&self) -> Option<Handle> {
        match self {
            Variant::String(h) | Variant::Table(h) | Variant::Function(h) | Variant::User(_, h) => Some(*h),
            Variant::Null | Variant::Int(_) | Variant::Float(_) => None,
        }
    }

    /// Truthiness used by conditional opcodes and `AND`/`OR`/`NOT`: null and
    /// zero are false, everything else (including empty strings and tables)
    /// is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Variant::Null => false,
            Variant::Int(i) => *i != 0,
            Variant::Float(f) => *f != 0.0,
            Variant::String(_) | Variant::Table(_) | Variant::Function(_) | Variant::User(..) => true,
        }
    }
}

/// A [`Variant`] wrapped for use as a [`gm_collections::OrderedTable`] key.
///
/// `Variant` can't derive `Hash`/`Eq` directly because `Float` wraps an
/// `f32`; this newtype hashes and compares floats by bit pattern, which is
/// consistent (`==` on bits implies `==` on value, though not the reverse for
/// NaN) and is what the table needs: distinct keys never silently collide.
#[derive(Debug, Clone, Copy)]
pub struct VariantKey(pub Variant);

impl PartialEq for VariantKey {
    fn eq(&self, other: &Self) -> bool {
        match (self.0, other.0) {
            (Variant::Null, Variant::Null) => true,
            (Variant::Int(a), Variant::Int(b)) => a == b,
            (Variant::Float(a), Variant::Float(b)) => a.to_bits() == b.to_bits(),
            (Variant::String(a), Variant::String(b)) => a == b,
            (Variant::Table(a), Variant::Table(b)) => a == b,
            (Variant::Function(a), Variant::Function(b)) => a == b,
            (Variant::User(ka, a), Variant::User(kb, b)) => ka == kb && a == b,
            _ => false,
        }
    }
}

impl Eq for VariantKey {}

impl Hash for VariantKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.0).hash(state);
        match self.0 {
            Variant::Null => {}
            Variant::Int(i) => i.hash(state),
            Variant::Float(f) => f.to_bits().hash(state),
            Variant::String(h) | Variant::Table(h) | Variant::Function(h) => h.hash(state),
            Variant::User(kind, h) => {
                kind.hash(state);
                h.hash(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_types_are_discriminated_by_ordering() {
        assert!(Variant::Null.variant_type() < VariantType::String);
        assert!(Variant::Int(0).variant_type() < VariantType::String);
        assert!(!Variant::Int(0).is_reference());
        assert!(Variant::String(Handle::from_index(0)).is_reference());
    }

    #[test]
    fn zero_and_null_are_falsy() {
        assert!(!Variant::Null.is_truthy());
        assert!(!Variant::Int(0).is_truthy());
        assert!(!Variant::Float(0.0).is_truthy());
        assert!(Variant::Int(1).is_truthy());
    }

    #[test]
    fn variant_key_hashes_floats_by_bit_pattern() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(VariantKey(Variant::Float(1.5)));
        assert!(set.contains(&VariantKey(Variant::Float(1.5))));
        assert!(!set.contains(&VariantKey(Variant::Float(1.50001))));
    }
}
