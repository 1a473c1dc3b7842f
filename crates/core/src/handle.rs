//! Arena handles.
//!
//! The heap never hands out raw references to [`ObjectData`](crate::object::ObjectData);
//! every value a program holds is an opaque `(index, generation)` pair. This is the
//! "opaque indices instead of pointers" approach recommended for a cyclic, mark-swept
//! object graph: containers can reference each other (and themselves) freely without
//! fighting the borrow checker, and a stale handle into a reclaimed slot is detectable
//! rather than a dangling-pointer use-after-free.

use std::fmt;

/// A reference to a heap-resident object.
///
/// Two handles are `==` iff they name the same arena slot *and* the same
/// generation, which is exactly the pointer-identity notion the `same` and
/// `is` opcodes need, and exactly what lets small-integer singletons and the
/// sentinel values be compared by identity instead of structural equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Handle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Handle { index, generation }
    }

    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle(#{}, gen {})", self.index, self.generation)
    }
}
