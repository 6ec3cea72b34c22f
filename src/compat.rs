//! Scalar-if-single JSON encoding for multi-valued fields.
//!
//! Every multi-valued field in every response (`args`, `headers`, `form`,
//! `files`) is encoded with one rule, kept for compatibility with the
//! responses clients of the classic httpbin service already parse:
//!
//! | values for a key | JSON |
//! |---|---|
//! | exactly one | the bare value: `"a": "1"` |
//! | zero, or two and more | an array: `"a": ["1", "2"]` |
//!
//! The rule lives here once. Response types opt in per field with
//! `#[serde(serialize_with = "compat::serialize")]`; the collapse happens when
//! the value is encoded, so a map can still be changed up to that point.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::multimap::OrderedMultimap;

/// `serialize_with` adapter applying the compat rule to a multimap field.
pub fn serialize<K, V, S>(map: &OrderedMultimap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    K: Serialize,
    V: Serialize,
    S: Serializer,
{
    let mut out = serializer.serialize_map(Some(map.len()))?;
    for (key, values) in map.iter() {
        match values {
            [single] => out.serialize_entry(key, single)?,
            many => out.serialize_entry(key, many)?,
        }
    }
    out.end()
}

/// Borrowing wrapper that serializes a multimap with the compat rule.
///
/// For ad-hoc bodies where a dedicated response struct is overkill:
///
/// ```rust
/// use httpbin::{Compat, OrderedMultimap};
///
/// let args: OrderedMultimap<String, String> = [
///     ("a".to_owned(), "1".to_owned()),
///     ("b".to_owned(), "2".to_owned()),
///     ("b".to_owned(), "3".to_owned()),
/// ].into_iter().collect();
///
/// let json = serde_json::to_string(&Compat(&args)).unwrap();
/// assert_eq!(json, r#"{"a":"1","b":["2","3"]}"#);
/// ```
pub struct Compat<'a, K, V>(pub &'a OrderedMultimap<K, V>);

impl<K: Serialize, V: Serialize> Serialize for Compat<'_, K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize(self.0, serializer)
    }
}

/// Encodes `map` into a [`serde_json::Value`] with the compat rule applied.
pub fn to_value<K: Serialize, V: Serialize>(
    map: &OrderedMultimap<K, V>,
) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(Compat(map))
}
