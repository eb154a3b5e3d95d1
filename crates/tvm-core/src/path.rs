use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use smol_str::SmolStr;

use crate::{Error, Result, Value};

/// Which labeled entries [`Path::get`] selects when a label occurs more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pop {
    First,
    Last,
    All,
}

/// A traverser's visitation history: ordered `(label, object)` pairs.
///
/// Labels are optional and not unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Path {
    entries: Vec<(Option<SmolStr>, Value)>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, index: usize) -> Option<&Value> {
        self.entries.get(index).map(|(_, object)| object)
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.entries
            .get(index)
            .and_then(|(label, _)| label.as_ref().map(SmolStr::as_str))
    }

    /// Looks up the object(s) stored under `label`.
    ///
    /// `Pop::All` returns every match in insertion order as a `Value::List`.
    pub fn get(&self, pop: Pop, label: &str) -> Result<Value> {
        let mut matches = self
            .entries
            .iter()
            .filter(|(l, _)| l.as_deref() == Some(label))
            .map(|(_, object)| object);

        let found = match pop {
            Pop::First => matches.next().cloned(),
            Pop::Last => matches.last().cloned(),
            Pop::All => {
                let all: Vec<Value> = matches.cloned().collect();
                (!all.is_empty()).then_some(Value::List(all))
            }
        };

        found.ok_or_else(|| Error::PathLabelNotFound(label.into()))
    }

    pub fn has(&self, label: &str) -> bool {
        self.entries.iter().any(|(l, _)| l.as_deref() == Some(label))
    }

    pub fn add(&mut self, label: Option<SmolStr>, object: Value) {
        self.entries.push((label, object));
    }

    /// Removes every entry stored under `label`.
    pub fn remove(&mut self, label: &str) {
        self.entries.retain(|(l, _)| l.as_deref() != Some(label));
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &Value)> {
        self.entries
            .iter()
            .map(|(label, object)| (label.as_deref(), object))
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]",
            self.entries
                .iter()
                .map(|(label, object)| match label {
                    Some(label) => format!("{}:{}", label, object),
                    None => object.to_string(),
                })
                .join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn path() -> Path {
        let mut path = Path::new();
        path.add(Some("a".into()), 1.into());
        path.add(None, 2.into());
        path.add(Some("b".into()), 3.into());
        path.add(Some("a".into()), 4.into());
        path
    }

    #[rstest]
    #[case(Pop::First, "a", Value::Int(1))]
    #[case(Pop::Last, "a", Value::Int(4))]
    #[case(Pop::All, "a", Value::List(vec![1.into(), 4.into()]))]
    #[case(Pop::Last, "b", Value::Int(3))]
    fn test_get(path: Path, #[case] pop: Pop, #[case] label: &str, #[case] expected: Value) {
        assert_eq!(path.get(pop, label), Ok(expected));
    }

    #[rstest]
    fn test_get_missing_label(path: Path) {
        assert_eq!(
            path.get(Pop::Last, "zzz"),
            Err(Error::PathLabelNotFound("zzz".into()))
        );
        assert!(!path.has("zzz"));
    }

    #[rstest]
    fn test_positional_access(path: Path) {
        assert_eq!(path.size(), 4);
        assert_eq!(path.object(1), Some(&Value::Int(2)));
        assert_eq!(path.label(1), None);
        assert_eq!(path.label(2), Some("b"));
        assert_eq!(path.object(9), None);
    }

    #[rstest]
    fn test_remove(mut path: Path) {
        path.remove("a");
        assert!(!path.has("a"));
        assert_eq!(path.size(), 2);
        assert_eq!(path.to_string(), "[2, b:3]");
    }

    #[rstest]
    fn test_clone_is_independent(path: Path) {
        let mut clone = path.clone();
        clone.add(Some("c".into()), 5.into());
        assert!(!path.has("c"));
        assert!(clone.has("c"));
    }

    proptest! {
        #[test]
        fn test_pop_respects_insertion_order(
            entries in prop::collection::vec((prop::sample::select(vec!["x", "y", "z"]), any::<i64>()), 1..20)
        ) {
            let mut path = Path::new();
            for (label, value) in &entries {
                path.add(Some((*label).into()), Value::Int(*value));
            }

            for label in ["x", "y", "z"] {
                let expected: Vec<Value> = entries
                    .iter()
                    .filter(|(l, _)| *l == label)
                    .map(|(_, v)| Value::Int(*v))
                    .collect();

                if expected.is_empty() {
                    prop_assert!(path.get(Pop::First, label).is_err());
                } else {
                    prop_assert_eq!(path.get(Pop::First, label), Ok(expected[0].clone()));
                    prop_assert_eq!(path.get(Pop::Last, label), Ok(expected[expected.len() - 1].clone()));
                    prop_assert_eq!(path.get(Pop::All, label), Ok(Value::List(expected)));
                }
            }
        }
    }
}
