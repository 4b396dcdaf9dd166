//! Reference-counted string interning (component A).
//!
//! Two equal-valued strings intern to the same [`Handle`]; comparing
//! handles for identity (`Arc::ptr_eq`) is therefore equivalent to
//! comparing the underlying strings for equality, at the cost of a pointer
//! comparison instead of a byte scan. This is what lets the library index
//! (component I) and the cover squasher (component G) do cheap equality
//! checks on artist/album/genre/URI strings that recur across thousands of
//! tracks.
//!
//! Storage is a `Mutex<HashMap<Box<str>, Weak<str>>>`: `intern` upgrades an
//! existing weak entry when the string is still live, or creates a new
//! `Arc<str>` and stores a weak back-reference. When the last `Arc` clone
//! drops, the weak entry dangles; a later `intern` of the same text simply
//! replaces it. There is no background sweep — dead entries are reclaimed
//! lazily, on next use of that exact string.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// A cheap-to-clone, cheap-to-compare interned string.
///
/// `Handle` equality and hashing are *value-based* (so it can be used as a
/// `HashMap` key the way the original's interned strings are), but
/// [`Handle::is`] gives pointer identity when that's all that's needed.
#[derive(Clone, Debug, Eq)]
pub struct Handle(Arc<str>);

impl Handle {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity comparison: true iff both handles came from the same
    /// `intern` call (or a clone of it), not merely equal text.
    pub fn is(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl std::hash::Hash for Handle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Handle {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The interning table. Shared via `Arc<Interner>` across the library and
/// cover subsystems so identical strings from either side compare equal.
#[derive(Default)]
pub struct Interner {
    table: Mutex<HashMap<Box<str>, Weak<str>>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `s`, returning a handle shared with any other live interning
    /// of the same bytes.
    pub fn intern(&self, s: &str) -> Handle {
        let mut table = self.table.lock().expect("interner mutex poisoned");
        if let Some(weak) = table.get(s)
            && let Some(arc) = weak.upgrade()
        {
            return Handle(arc);
        }
        let arc: Arc<str> = Arc::from(s);
        table.insert(s.into(), Arc::downgrade(&arc));
        Handle(arc)
    }

    /// Number of live entries actually resolvable right now. Exposed for
    /// tests; not used on any hot path.
    pub fn live_count(&self) -> usize {
        let table = self.table.lock().expect("interner mutex poisoned");
        table.values().filter(|w| w.strong_count() > 0).count()
    }
}
