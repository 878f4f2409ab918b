//! Typed merge engine for sparse profile fragments
//!
//! Profiles are layered (parent profile, child profile, per-host overrides,
//! captured defaults) with these rules:
//!
//! - `Option` scalars: `None` in the source keeps the destination, `Some`
//!   overwrites it.
//! - Bare scalars are mandatory and are always overwritten by the source.
//! - Nested structs recurse.
//! - Lists whose element implements [`Keyed`] merge element-wise by key and
//!   new keys are appended. An explicit empty source list replaces the
//!   destination.
//! - Lists without a key are replaced wholesale by any `Some` source.
//!
//! Equality used by the reconcilers ignores the ordering of keyed lists; see
//! [`Normalize`] and [`equal`].

use std::collections::BTreeMap;

/// Overlay another value of the same type onto `self`.
pub trait Merge {
    /// Merge `src` into `self` using the layering rules of this module.
    fn merge(&mut self, src: &Self);
}

/// List element identity used for element-wise merges and set comparisons.
pub trait Keyed {
    /// Key type; ordered so keyed lists can be sorted into a canonical form.
    type Key: Ord + Clone;

    /// Project the element's key.
    fn key(&self) -> Self::Key;
}

/// Bring a value into canonical form so that derived equality ignores list
/// ordering.
pub trait Normalize {
    /// Sort keyed lists (recursively) by key.
    fn normalize(&mut self);
}

/// Overwrite `dst` when `src` is set.
pub fn merge_value<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if let Some(value) = src {
        *dst = Some(value.clone());
    }
}

/// Recurse into an optional nested struct.
pub fn merge_struct<T: Merge + Clone>(dst: &mut Option<T>, src: &Option<T>) {
    match (dst.as_mut(), src) {
        (_, None) => {}
        (Some(existing), Some(value)) => existing.merge(value),
        (None, Some(value)) => *dst = Some(value.clone()),
    }
}

/// Replace an unkeyed list when the source carries one (even empty).
pub fn merge_list<T: Clone>(dst: &mut Option<Vec<T>>, src: &Option<Vec<T>>) {
    merge_value(dst, src);
}

/// Merge an optional keyed list element-wise.
pub fn merge_keyed_list<T: Keyed + Merge + Clone>(dst: &mut Option<Vec<T>>, src: &Option<Vec<T>>) {
    let Some(items) = src else {
        return;
    };

    if items.is_empty() {
        *dst = Some(Vec::new());
        return;
    }

    merge_keyed(dst.get_or_insert_with(Vec::new), items);
}

/// Merge `src` into `dst` element-wise by key, appending unknown keys.
pub fn merge_keyed<T: Keyed + Merge + Clone>(dst: &mut Vec<T>, src: &[T]) {
    for item in src {
        let key = item.key();
        match dst.iter_mut().find(|existing| existing.key() == key) {
            Some(existing) => existing.merge(item),
            None => dst.push(item.clone()),
        }
    }
}

/// Overlay a string map key by key.
pub fn merge_map(dst: &mut Option<BTreeMap<String, String>>, src: &Option<BTreeMap<String, String>>) {
    let Some(entries) = src else {
        return;
    };

    let target = dst.get_or_insert_with(BTreeMap::new);
    for (key, value) in entries {
        target.insert(key.clone(), value.clone());
    }
}

/// Return a copy of `dst` with `src` merged on top.
#[must_use]
pub fn merged<T: Merge + Clone>(dst: &T, src: &T) -> T {
    let mut result = dst.clone();
    result.merge(src);
    result
}

/// Sort a keyed list and normalize each element.
pub fn normalize_keyed<T: Keyed + Normalize>(items: &mut [T]) {
    for item in items.iter_mut() {
        item.normalize();
    }
    items.sort_by_key(|item| item.key());
}

/// Optional variant of [`normalize_keyed`].
pub fn normalize_keyed_list<T: Keyed + Normalize>(items: &mut Option<Vec<T>>) {
    if let Some(items) = items {
        normalize_keyed(items);
    }
}

/// Compare two values after normalisation.
#[must_use]
pub fn equal<T: Normalize + PartialEq + Clone>(a: &T, b: &T) -> bool {
    let mut left = a.clone();
    let mut right = b.clone();
    left.normalize();
    right.normalize();
    left == right
}

/// True when both keyed lists hold the same elements regardless of order.
#[must_use]
pub fn same_set<T: Keyed + Normalize + PartialEq + Clone>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut left = a.to_vec();
    let mut right = b.to_vec();
    normalize_keyed(&mut left);
    normalize_keyed(&mut right);
    left == right
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Item {
        name: String,
        size: i32,
        label: Option<String>,
    }

    impl Keyed for Item {
        type Key = String;
        fn key(&self) -> String {
            self.name.clone()
        }
    }

    impl Merge for Item {
        fn merge(&mut self, src: &Self) {
            self.size = src.size;
            merge_value(&mut self.label, &src.label);
        }
    }

    impl Normalize for Item {
        fn normalize(&mut self) {}
    }

    fn item(name: &str, size: i32, label: Option<&str>) -> Item {
        Item {
            name: name.to_string(),
            size,
            label: label.map(str::to_string),
        }
    }

    #[test]
    fn test_merge_value_keeps_destination_when_source_unset() {
        let mut dst = Some("a".to_string());
        merge_value(&mut dst, &None);
        assert_eq!(dst.as_deref(), Some("a"));

        merge_value(&mut dst, &Some("b".to_string()));
        assert_eq!(dst.as_deref(), Some("b"));
    }

    #[test]
    fn test_merge_keyed_list_merges_by_key_and_appends() {
        let mut dst = Some(vec![item("root", 10, Some("x")), item("var", 5, None)]);
        let src = Some(vec![item("var", 8, Some("y")), item("log", 2, None)]);
        merge_keyed_list(&mut dst, &src);

        let merged = dst.unwrap_or_default();
        assert_eq!(merged.len(), 3, "new keys should be appended");
        assert_eq!(merged[0], item("root", 10, Some("x")));
        assert_eq!(merged[1], item("var", 8, Some("y")));
        assert_eq!(merged[2], item("log", 2, None));
    }

    #[test]
    fn test_merge_keyed_list_keeps_unset_attributes() {
        let mut dst = Some(vec![item("root", 10, Some("x"))]);
        merge_keyed_list(&mut dst, &Some(vec![item("root", 20, None)]));
        assert_eq!(dst, Some(vec![item("root", 20, Some("x"))]));
    }

    #[test]
    fn test_explicit_empty_list_replaces_destination() {
        let mut keyed = Some(vec![item("root", 10, None)]);
        merge_keyed_list(&mut keyed, &Some(Vec::new()));
        assert_eq!(keyed, Some(Vec::new()));

        let mut plain = Some(vec!["a".to_string()]);
        merge_list(&mut plain, &Some(Vec::new()));
        assert_eq!(plain, Some(Vec::new()));
    }

    #[test]
    fn test_unkeyed_list_replaced_wholesale() {
        let mut plain = Some(vec!["a".to_string(), "b".to_string()]);
        merge_list(&mut plain, &Some(vec!["c".to_string()]));
        assert_eq!(plain, Some(vec!["c".to_string()]));

        merge_list(&mut plain, &None);
        assert_eq!(plain, Some(vec!["c".to_string()]));
    }

    #[test]
    fn test_merge_map_overlays_keys() {
        let mut dst = Some(BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]));
        let src = Some(BTreeMap::from([("b".to_string(), "3".to_string())]));
        merge_map(&mut dst, &src);
        let map = dst.unwrap_or_default();
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
        assert_eq!(map.get("b").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_same_set_ignores_order() {
        let a = vec![item("a", 1, None), item("b", 2, None)];
        let b = vec![item("b", 2, None), item("a", 1, None)];
        assert!(same_set(&a, &b));

        let c = vec![item("b", 3, None), item("a", 1, None)];
        assert!(!same_set(&a, &c), "differing attributes must not compare equal");
    }
}
