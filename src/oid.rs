//! Object identifiers and lexicographic OID ordering.
//!
//! OIDs are compared arc-by-arc as unsigned integers, not as strings or
//! dotted-decimal text: `1.3.6.1.2.1.2.9` sorts before `1.3.6.1.2.1.2.10`
//! even though `"9" > "10"` as a string. A prefix sorts before any of its
//! extensions (`1.3.6.1.2` < `1.3.6.1.2.1`).

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A sequence of unsigned integer sub-identifiers, e.g. `1.3.6.1.2.1.1.1.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Self {
        Self(arcs)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if `self` is `other` or lies in the subtree rooted at `other`.
    pub fn is_child_of(&self, other: &Oid) -> bool {
        self.starts_with(other)
    }

    /// True if `other`'s arcs are a prefix of `self`'s arcs.
    pub fn starts_with(&self, other: &Oid) -> bool {
        other.0.len() <= self.0.len() && self.0[..other.0.len()] == other.0[..]
    }

    /// Append one more sub-identifier, e.g. extending a column OID with an
    /// instance index.
    pub fn extended(&self, arc: u32) -> Oid {
        let mut arcs = self.0.clone();
        arcs.push(arc);
        Oid(arcs)
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Arc-by-arc integer comparison; a prefix is less than its
        // extension, exactly RFC 2578's subtree-ordering rule.
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|a| a.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('.');
        if s.is_empty() {
            return Ok(Oid(Vec::new()));
        }
        let mut arcs = Vec::with_capacity(8);
        for part in s.split('.') {
            let arc: u32 = part
                .parse()
                .map_err(|_| Error::parse(format!("invalid OID component '{part}' in '{s}'")))?;
            arcs.push(arc);
        }
        Ok(Oid(arcs))
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Oid(arcs.to_vec())
    }
}

impl From<Vec<u32>> for Oid {
    fn from(arcs: Vec<u32>) -> Self {
        Oid(arcs)
    }
}

/// Convenience macro-like constructor for tests and fixed system OIDs.
#[macro_export]
macro_rules! oid {
    ($($arc:expr),+ $(,)?) => {
        $crate::oid::Oid::new(vec![$($arc),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_integer_not_string() {
        let a: Oid = "1.3.6.1.2.1.2.2.1.21.9".parse().unwrap();
        let b: Oid = "1.3.6.1.2.1.2.2.1.21.10".parse().unwrap();
        let c: Oid = "1.3.6.1.2.1.2.2.1.22.1".parse().unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn prefix_sorts_before_extension() {
        let prefix: Oid = "1.3.6.1.2".parse().unwrap();
        let extended: Oid = "1.3.6.1.2.1".parse().unwrap();
        assert!(prefix < extended);
        assert!(extended.starts_with(&prefix));
        assert!(!prefix.starts_with(&extended));
    }

    #[test]
    fn display_roundtrip() {
        let o: Oid = "1.3.6.1.4.1.9999.1.0".parse().unwrap();
        assert_eq!(o.to_string(), "1.3.6.1.4.1.9999.1.0");
    }

    #[test]
    fn rejects_garbage() {
        assert!("1.3.x.1".parse::<Oid>().is_err());
    }

    #[test]
    fn extended_appends() {
        let base: Oid = "1.3.6.1.2.1.1.1".parse().unwrap();
        let inst = base.extended(0);
        assert_eq!(inst.to_string(), "1.3.6.1.2.1.1.1.0");
    }
}
