//! Insertion-ordered multimap

use std::collections::HashMap;

/// Groups keyed by name, iterated in the order each key was first seen
///
/// Each group holds a header built from its first row plus the members
/// appended for every row with that key.
#[derive(Debug)]
pub struct OrderedGroups<H, M> {
    groups: Vec<(H, Vec<M>)>,
    positions: HashMap<String, usize>,
}

impl<H, M> Default for OrderedGroups<H, M> {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<H, M> OrderedGroups<H, M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `member` to the group for `key`, creating it with `header` if new
    ///
    /// `header` is only called for the first row of a key, so later rows
    /// cannot change a group's header fields.
    pub fn push(&mut self, key: String, header: impl FnOnce() -> H, member: M) {
        match self.positions.get(&key) {
            Some(&index) => self.groups[index].1.push(member),
            None => {
                self.positions.insert(key, self.groups.len());
                self.groups.push((header(), vec![member]));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Consume the groups in first-seen order, folding each into `T`
    pub fn into_vec<T>(self, mut build: impl FnMut(H, Vec<M>) -> T) -> Vec<T> {
        self.groups
            .into_iter()
            .map(|(header, members)| build(header, members))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order_survives_interleaving() {
        let mut groups = OrderedGroups::new();
        for (key, member) in [("A", "x"), ("B", "y"), ("A", "z")] {
            groups.push(key.to_string(), || key.to_string(), member);
        }

        assert_eq!(groups.len(), 2);
        let built = groups.into_vec(|header, members| (header, members));
        assert_eq!(
            built,
            vec![
                ("A".to_string(), vec!["x", "z"]),
                ("B".to_string(), vec!["y"]),
            ]
        );
    }

    #[test]
    fn test_header_comes_from_first_row() {
        let mut groups = OrderedGroups::new();
        groups.push("pk".to_string(), || "CLUSTERED", 1);
        groups.push("pk".to_string(), || "HEAP", 2);

        let built = groups.into_vec(|header, members| (header, members));
        assert_eq!(built, vec![("CLUSTERED", vec![1, 2])]);
    }

    #[test]
    fn test_empty() {
        let groups: OrderedGroups<(), ()> = OrderedGroups::new();
        assert!(groups.is_empty());
        assert!(groups.into_vec(|_, _| ()).is_empty());
    }
}
