//! Insertion-ordered multimap.
//!
//! Query strings, form bodies, multipart uploads and header blocks all share
//! one shape: a key may appear any number of times, and the order the values
//! arrived in is worth keeping. [`OrderedMultimap`] stores exactly that.
//!
//! Keys are unique. Lookup is a linear scan, which beats hashing for the
//! handful of entries a single request carries.

use std::borrow::Borrow;

/// A key → ordered-values map that remembers key insertion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderedMultimap<K, V> {
    entries: Vec<(K, Vec<V>)>,
}

impl<K, V> OrderedMultimap<K, V> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(key, values)` pairs in key insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &[V])> {
        self.entries.iter().map(|(k, vs)| (k, vs.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Eq, V> OrderedMultimap<K, V> {
    /// Appends `value` to the values of `key`, creating the key if needed.
    pub fn append(&mut self, key: K, value: V) {
        self.values_mut(key).push(value);
    }

    /// Replaces every value of `key` with `values`.
    ///
    /// An empty `values` keeps the key present with no values, which the
    /// compat serializer renders as `[]`.
    pub fn set(&mut self, key: K, values: Vec<V>) {
        *self.values_mut(key) = values;
    }

    /// All values of `key`, oldest first.
    pub fn get<Q>(&self, key: &Q) -> Option<&[V]>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.entries
            .iter()
            .find(|(k, _)| k.borrow() == key)
            .map(|(_, vs)| vs.as_slice())
    }

    /// The first value of `key`, if any.
    pub fn first<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.get(key).and_then(<[V]>::first)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    fn values_mut(&mut self, key: K) -> &mut Vec<V> {
        let idx = match self.entries.iter().position(|(k, _)| *k == key) {
            Some(idx) => idx,
            None => {
                self.entries.push((key, Vec::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }
}

impl<K, V> Default for OrderedMultimap<K, V> {
    fn default() -> Self { Self::new() }
}

/// Collecting `(key, value)` pairs appends, so repeated keys accumulate.
impl<K: Eq, V> FromIterator<(K, V)> for OrderedMultimap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Eq, V> Extend<(K, V)> for OrderedMultimap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.append(k, v);
        }
    }
}
