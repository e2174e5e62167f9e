//! Immutable context carrier
//!
//! A [`ContextCarrier`] is the value that travels with a logical computation
//! instead of a thread-local registry. It is an ordered key/value snapshot:
//!
//! - `with()` never mutates; it returns a new carrier one generation younger
//! - unmodified entries are shared with the parent generation (`Arc` bumps)
//! - cloning a carrier is a single reference-count increment
//!
//! Because nothing is ever written in place, a carrier can be read from any
//! worker, before or after any suspension point, without locking.
//!
//! # Typed keys
//!
//! Keys are [`ContextKey<T>`] constants. The type parameter fixes the value
//! type stored under the key name, so the type check inside
//! [`ContextCarrier::get`] happens in exactly one place.
//!
//! ```
//! use txscope_core::carrier::{ContextCarrier, ContextKey};
//!
//! const TENANT: ContextKey<String> = ContextKey::new("tenant");
//!
//! let root = ContextCarrier::empty();
//! let scoped = root.with(&TENANT, "acme".to_string());
//!
//! assert_eq!(scoped.get(&TENANT).map(String::as_str), Some("acme"));
//! assert!(root.get(&TENANT).is_none());
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

type Entry = Arc<dyn Any + Send + Sync>;

/// Typed key into a [`ContextCarrier`]
///
/// Two keys with the same name address the same slot. Storing a value through
/// a key of one type and reading through a key of another type yields `None`.
pub struct ContextKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    /// Declare a key
    pub const fn new(name: &'static str) -> Self {
        ContextKey {
            name,
            _marker: PhantomData,
        }
    }

    /// Key name
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextKey").field(&self.name).finish()
    }
}

/// Immutable, copy-on-write context snapshot
#[derive(Clone)]
pub struct ContextCarrier {
    entries: Arc<BTreeMap<&'static str, Entry>>,
    generation: u64,
}

impl ContextCarrier {
    /// The root carrier with no entries
    pub fn empty() -> Self {
        ContextCarrier {
            entries: Arc::new(BTreeMap::new()),
            generation: 0,
        }
    }

    /// Value stored under `key`, if any
    pub fn get<T: Any + Send + Sync>(&self, key: &ContextKey<T>) -> Option<&T> {
        self.entries
            .get(key.name)
            .and_then(|entry| entry.downcast_ref::<T>())
    }

    /// New carrier with `key` bound to `value`
    ///
    /// `self` is left untouched. Entries other than `key` are shared with
    /// `self`, not copied.
    pub fn with<T: Any + Send + Sync>(&self, key: &ContextKey<T>, value: T) -> Self {
        let mut entries = BTreeMap::clone(&self.entries);
        entries.insert(key.name, Arc::new(value) as Entry);
        ContextCarrier {
            entries: Arc::new(entries),
            generation: self.generation + 1,
        }
    }

    /// Whether a value of the key's type is bound under the key's name
    pub fn has_key<T: Any + Send + Sync>(&self, key: &ContextKey<T>) -> bool {
        self.get(key).is_some()
    }

    /// Number of bound keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no key is bound
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bound key names in order
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Number of `with()` steps between this carrier and the root
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether both carriers are the same snapshot
    pub fn ptr_eq(&self, other: &ContextCarrier) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl Default for ContextCarrier {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ContextCarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCarrier")
            .field("generation", &self.generation)
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
