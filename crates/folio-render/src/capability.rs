//! Renderer capability flags.

use std::fmt;

/// A feature a template engine may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Outer templates wrapping page bodies.
    Layouts,
    /// Named reusable snippets (partials).
    Fragments,
    /// Callable helper functions.
    Helpers,
    /// Engine-level content filters.
    Filters,
}

impl Capability {
    const ALL: [Self; 4] = [Self::Layouts, Self::Fragments, Self::Helpers, Self::Filters];

    const fn bit(self) -> u8 {
        match self {
            Self::Layouts => 1,
            Self::Fragments => 1 << 1,
            Self::Helpers => 1 << 2,
            Self::Filters => 1 << 3,
        }
    }

    /// Lowercase name used in logs and configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Layouts => "layouts",
            Self::Fragments => "fragments",
            Self::Helpers => "helpers",
            Self::Filters => "filters",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of [`Capability`] values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities(u8);

impl Capabilities {
    /// Empty set.
    pub const NONE: Self = Self(0);

    /// Return a copy of the set with `capability` added.
    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    /// Whether the set contains `capability`.
    #[must_use]
    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Iterate over contained capabilities in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_and_contains() {
        let caps = Capabilities::NONE
            .with(Capability::Layouts)
            .with(Capability::Helpers);
        assert!(caps.contains(Capability::Layouts));
        assert!(caps.contains(Capability::Helpers));
        assert!(!caps.contains(Capability::Fragments));
        assert!(!caps.contains(Capability::Filters));
    }

    #[test]
    fn test_iter_in_order() {
        let caps: Capabilities = [Capability::Filters, Capability::Layouts]
            .into_iter()
            .collect();
        let names: Vec<_> = caps.iter().map(Capability::as_str).collect();
        assert_eq!(names, vec!["layouts", "filters"]);
    }

    #[test]
    fn test_none_is_empty() {
        assert_eq!(Capabilities::NONE.iter().count(), 0);
        assert_eq!(Capabilities::default(), Capabilities::NONE);
    }
}
