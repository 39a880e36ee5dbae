use std::{collections::BTreeMap, slice::Iter, sync::Arc};

/// A single key/value pair attached to a registry.
///
/// Labels are typically used for differentiating the context in which metrics are emitted: the
/// listener a connection arrived on, the upstream cluster a request was routed to, and so on.
#[derive(PartialEq, Eq, Hash, Clone, Debug, PartialOrd, Ord)]
pub struct Label {
    key: String,
    value: String,
}

impl Label {
    /// Creates a [`Label`] from a key and value.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Label { key: key.into(), value: value.into() }
    }

    /// Key of this label.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value of this label.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// An immutable set of labels, ordered by key.
///
/// Two label sets are equal when they hold the same key/value pairs, regardless of the order the
/// pairs were supplied in.  When the same key is supplied more than once, the last value wins.
///
/// Cloning a `LabelSet` is cheap: the labels themselves are shared.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct LabelSet {
    labels: Arc<[Label]>,
}

impl LabelSet {
    /// Creates a `LabelSet` from key/value pairs.
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let sorted = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<BTreeMap<String, String>>();

        let labels = sorted.into_iter().map(|(key, value)| Label { key, value }).collect();
        LabelSet { labels }
    }

    /// Creates an empty `LabelSet`.
    pub fn empty() -> Self {
        LabelSet { labels: Arc::from(Vec::new()) }
    }

    /// Number of labels in this set.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether or not this set has any labels.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterates the labels, ordered by key.
    pub fn iter(&self) -> Iter<'_, Label> {
        self.labels.iter()
    }

    /// Iterates the label keys, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(Label::key)
    }

    /// Gets the value for the given label key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.labels
            .binary_search_by(|label| label.key.as_str().cmp(key))
            .ok()
            .map(|idx| self.labels[idx].value())
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        LabelSet::empty()
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        LabelSet::new(iter)
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = &'a Label;
    type IntoIter = Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::LabelSet;

    #[test]
    fn test_sorted_by_key() {
        let labels = LabelSet::new([("zone", "b"), ("app", "x"), ("cluster", "c1")]);
        let keys = labels.keys().collect::<Vec<_>>();
        assert_eq!(keys, vec!["app", "cluster", "zone"]);
        assert_eq!(labels.get("cluster"), Some("c1"));
        assert_eq!(labels.get("missing"), None);
    }

    #[test]
    fn test_last_value_wins() {
        let labels = LabelSet::new(vec![("k", "first"), ("k", "second")]);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels.get("k"), Some("second"));
    }

    #[test]
    fn test_from_hash_map() {
        let mut map = HashMap::new();
        map.insert("lbk1".to_string(), "lbv1".to_string());
        let labels = map.into_iter().collect::<LabelSet>();
        assert_eq!(labels, LabelSet::new([("lbk1", "lbv1")]));
    }

    #[test]
    fn test_empty() {
        let labels = LabelSet::empty();
        assert!(labels.is_empty());
        assert_eq!(labels, LabelSet::default());
        assert_eq!(labels, LabelSet::new(Vec::<(String, String)>::new()));
    }

    proptest! {
        #[test]
        fn test_order_independent_equality(pairs in proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..8)) {
            let forward = LabelSet::new(pairs.clone());
            let reversed = LabelSet::new(pairs.into_iter().rev());
            prop_assert_eq!(forward, reversed);
        }
    }
}
