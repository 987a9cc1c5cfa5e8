//! Path identity.

use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

/// Identity of a lens or case path.
///
/// A path id is a list of segments, one per composed path. Named segments are
/// a hash of the path name and the types at both ends; anonymous segments
/// come from a process-wide counter.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PathId(SmallVec<[u64; 4]>);

impl PathId {
    /// A fresh id, distinct from every other id in this process.
    pub fn unique() -> Self {
        // Counter values live in the upper half of the u64 range, named
        // segments are masked into the lower half.
        static COUNTER: AtomicU64 = AtomicU64::new(1 << 63);
        Self(SmallVec::from_elem(COUNTER.fetch_add(1, Ordering::Relaxed), 1))
    }

    /// The id of a path called `name` from `Root` to `Value`.
    pub fn named<Root: 'static, Value: 'static>(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        TypeId::of::<Root>().hash(&mut hasher);
        TypeId::of::<Value>().hash(&mut hasher);
        Self(SmallVec::from_elem(hasher.finish() & !(1 << 63), 1))
    }

    /// The id of this path followed by `next`.
    pub fn join(&self, next: &PathId) -> Self {
        let mut segments = self.0.clone();
        segments.extend_from_slice(&next.0);
        Self(segments)
    }

    /// Number of composed segments.
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathId(")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{segment:x}")?;
        }
        write!(f, ")")
    }
}
