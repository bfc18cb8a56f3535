//! Sibling ordering rules for assembled trees.
//!
//! Ordering is injected rather than fixed: any `Fn(&str, &str) -> Ordering`
//! is a [`NameCollation`], alongside plain code-point order and ICU
//! locale-aware collation. The default rule is Korean (`ko`) collation with
//! ICU's default (tertiary) strength.

use std::cmp::Ordering;
use std::fmt;

use catalog_tree_config::CollationSetting;
use icu_collator::{Collator, CollatorOptions};
use icu_locid::Locale;

/// Total order on entity names.
pub trait NameCollation {
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

impl<F> NameCollation for F
where
    F: Fn(&str, &str) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &str, b: &str) -> Ordering {
        self(a, b)
    }
}

/// Unicode scalar value order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodePointOrder;

impl NameCollation for CodePointOrder {
    #[inline]
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollationError {
    #[error("invalid locale tag '{tag}': {reason}")]
    InvalidLocale { tag: String, reason: String },

    #[error("no collation data for '{tag}': {reason}")]
    Unavailable { tag: String, reason: String },
}

/// ICU collation for one locale, using the compiled-in CLDR data.
pub struct LocaleCollation {
    tag: String,
    collator: Collator,
}

impl LocaleCollation {
    pub fn new(tag: &str) -> Result<Self, CollationError> {
        let locale: Locale = tag.parse().map_err(|e: icu_locid::ParserError| {
            CollationError::InvalidLocale {
                tag: tag.to_string(),
                reason: e.to_string(),
            }
        })?;
        let collator = Collator::try_new(&locale.into(), CollatorOptions::new()).map_err(|e| {
            CollationError::Unavailable {
                tag: tag.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            tag: tag.to_string(),
            collator,
        })
    }

    /// Korean collation.
    pub fn korean() -> Result<Self, CollationError> {
        Self::new("ko")
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl NameCollation for LocaleCollation {
    #[inline]
    fn compare(&self, a: &str, b: &str) -> Ordering {
        self.collator.compare(a, b)
    }
}

impl fmt::Debug for LocaleCollation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocaleCollation")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// Collation chosen by configuration.
#[derive(Debug)]
pub enum Collation {
    CodePoint(CodePointOrder),
    Locale(LocaleCollation),
}

impl Collation {
    pub fn from_setting(setting: &CollationSetting) -> Result<Self, CollationError> {
        match setting {
            CollationSetting::CodePoint => Ok(Self::CodePoint(CodePointOrder)),
            CollationSetting::Locale(tag) => LocaleCollation::new(tag).map(Self::Locale),
        }
    }
}

impl NameCollation for Collation {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            Self::CodePoint(c) => c.compare(a, b),
            Self::Locale(c) => c.compare(a, b),
        }
    }
}
