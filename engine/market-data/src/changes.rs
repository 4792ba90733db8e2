//! Security membership deltas carried on each time slice.

use crate::security::Security;
use crate::symbol::Symbol;
use std::fmt;
use std::sync::Arc;

/// Securities added to and removed from the active set during one slice.
#[derive(Debug, Clone, Default)]
pub struct SecurityChanges {
    added: Vec<Arc<Security>>,
    removed: Vec<Arc<Security>>,
}

impl SecurityChanges {
    /// The empty delta. Slices carrying this are pure data slices.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(added: Vec<Arc<Security>>, removed: Vec<Arc<Security>>) -> Self {
        let mut changes = Self { added, removed };
        changes.added.sort_by(|a, b| a.symbol().cmp(b.symbol()));
        changes.removed.sort_by(|a, b| a.symbol().cmp(b.symbol()));
        changes
    }

    pub fn added(&self) -> &[Arc<Security>] {
        &self.added
    }

    pub fn removed(&self) -> &[Arc<Security>] {
        &self.removed
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn count(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    /// Union of two deltas. A security both added and removed across the
    /// merge counts once per side; duplicates within a side collapse.
    pub fn combine(self, other: Self) -> Self {
        let mut added = self.added;
        for security in other.added {
            if !contains(&added, security.symbol()) {
                added.push(security);
            }
        }
        let mut removed = self.removed;
        for security in other.removed {
            if !contains(&removed, security.symbol()) {
                removed.push(security);
            }
        }
        Self::new(added, removed)
    }
}

fn contains(securities: &[Arc<Security>], symbol: &Symbol) -> bool {
    securities.iter().any(|s| s.symbol() == symbol)
}

impl fmt::Display for SecurityChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        if !self.added.is_empty() {
            let names: Vec<String> = self.added.iter().map(|s| s.symbol().to_string()).collect();
            write!(f, "added: {}", names.join(", "))?;
            if !self.removed.is_empty() {
                write!(f, "; ")?;
            }
        }
        if !self.removed.is_empty() {
            let names: Vec<String> = self.removed.iter().map(|s| s.symbol().to_string()).collect();
            write!(f, "removed: {}", names.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::ExchangeHours;
    use crate::symbol::Market;

    fn security(root: &str) -> Arc<Security> {
        Arc::new(Security::new(
            Symbol::equity(root, Market::Usa),
            ExchangeHours::new(chrono_tz::America::New_York),
        ))
    }

    #[test]
    fn none_is_empty() {
        assert!(SecurityChanges::none().is_empty());
        assert_eq!(SecurityChanges::none().count(), 0);
    }

    #[test]
    fn combine_dedups_by_symbol() {
        let a = SecurityChanges::new(vec![security("AAA"), security("BBB")], vec![]);
        let b = SecurityChanges::new(vec![security("BBB")], vec![security("CCC")]);
        let merged = a.combine(b);
        assert_eq!(merged.added().len(), 2);
        assert_eq!(merged.removed().len(), 1);
        assert_eq!(merged.count(), 3);
    }

    #[test]
    fn display_lists_both_sides() {
        let changes = SecurityChanges::new(vec![security("AAA")], vec![security("ZZZ")]);
        assert_eq!(changes.to_string(), "added: AAA; removed: ZZZ");
        assert_eq!(SecurityChanges::none().to_string(), "none");
    }
}
