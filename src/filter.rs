//! Locator denylist.
//!
//! Patterns are globs matched against the whole locator string. `*` crosses
//! `/`, so `*://*.example.com/*` and `*mail.google.com*` behave as expected
//! on URLs.

use globset::{Glob, GlobSet, GlobSetBuilder};

#[derive(Debug, Clone)]
pub struct Denylist {
    set: GlobSet,
}

impl Denylist {
    /// Compile `patterns`; the first invalid glob is returned as the error.
    pub fn new(patterns: &[String]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            set: builder.build()?,
        })
    }

    /// A denylist that excludes nothing.
    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
        }
    }

    pub fn is_excluded(&self, locator: &str) -> bool {
        self.set.is_match(locator)
    }
}

impl Default for Denylist {
    fn default() -> Self {
        Self::empty()
    }
}
