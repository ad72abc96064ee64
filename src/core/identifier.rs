//! Interned identifiers for declarations, projects, properties and source sets.
//!
//! Identifiers are compared by pointer and cloned for free. Construction via
//! `From` never fails; registration-time validation goes through
//! [`Identifier::parse`] / [`Identifier::is_valid`].

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{LazyLock, PoisonError, RwLock};

use serde::{Serialize, Serializer};

/// Global identifier table
static IDENTIFIERS: LazyLock<RwLock<HashSet<&'static str>>> =
    LazyLock::new(|| RwLock::new(HashSet::new()));

/// An interned name.
#[derive(Clone, Copy)]
pub struct Identifier {
    inner: &'static str,
}

impl Identifier {
    /// Intern a name without validating it.
    pub fn new(s: impl AsRef<str>) -> Self {
        let s = s.as_ref();

        {
            let table = IDENTIFIERS.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(&interned) = table.get(s) {
                return Identifier { inner: interned };
            }
        }

        let mut table = IDENTIFIERS.write().unwrap_or_else(PoisonError::into_inner);

        // Another writer may have won the race
        if let Some(&interned) = table.get(s) {
            return Identifier { inner: interned };
        }

        let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
        table.insert(leaked);

        Identifier { inner: leaked }
    }

    /// Intern a name, rejecting anything that is not a valid identifier.
    pub fn parse(s: impl AsRef<str>) -> Option<Self> {
        let s = s.as_ref();
        if Self::is_valid_str(s) {
            Some(Identifier::new(s))
        } else {
            None
        }
    }

    #[cfg(test)]
    pub(crate) fn is_interned(s: &str) -> bool {
        IDENTIFIERS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(s)
    }

    /// `[A-Za-z_][A-Za-z0-9_-]*`
    pub fn is_valid_str(s: &str) -> bool {
        let mut chars = s.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    /// Check whether this identifier is well formed.
    pub fn is_valid(&self) -> bool {
        Self::is_valid_str(self.inner)
    }

    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.inner
    }
}

impl Deref for Identifier {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        self.inner
    }
}

impl AsRef<str> for Identifier {
    #[inline]
    fn as_ref(&self) -> &str {
        self.inner
    }
}

impl Borrow<str> for Identifier {
    #[inline]
    fn borrow(&self) -> &str {
        self.inner
    }
}

impl PartialEq for Identifier {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}

impl Eq for Identifier {}

impl PartialOrd for Identifier {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(other.inner)
    }
}

impl Hash for Identifier {
    // Must agree with `Borrow<str>`, so hash the contents rather than the pointer.
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner, f)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.inner, f)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::new(s)
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Identifier::new(s)
    }
}

impl From<&String> for Identifier {
    fn from(s: &String) -> Self {
        Identifier::new(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.inner.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interned_identifiers_share_storage() {
        let a = Identifier::new("javaLibrary");
        let b = Identifier::from("javaLibrary".to_string());

        assert_eq!(a, b);
        assert!(std::ptr::eq(a.as_str(), b.as_str()));
        assert_ne!(a, Identifier::new("antlr"));
    }

    #[test]
    fn test_identifier_validation() {
        assert!(Identifier::parse("antlr").is_some());
        assert!(Identifier::parse("generated_src-1").is_some());
        assert!(Identifier::parse("_private").is_some());

        assert!(Identifier::parse("").is_none());
        assert!(Identifier::parse("1abc").is_none());
        assert!(Identifier::parse("java.library").is_none());
        assert!(Identifier::parse("with space").is_none());
    }

    #[test]
    fn test_borrow_lookup_in_map() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(Identifier::new("checkstyle"), 7);

        assert_eq!(map.get("checkstyle"), Some(&7));
    }
}
