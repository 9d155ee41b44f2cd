//! Scored entities and the kinds that carry a read count.

use std::{fmt, str::FromStr, time::SystemTime};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kinds of content ranked by read count.
///
/// Each kind is ranked independently: a book never competes with a song.
///
/// # Examples
///
/// ```
/// use kinfolio_core::EntityKind;
///
/// let kind: EntityKind = "song".parse().expect("known kind");
/// assert_eq!(kind, EntityKind::Song);
/// assert_eq!(kind.table(), "songs");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EntityKind {
    /// A photo book.
    Book,
    /// A single page inside a book.
    Page,
    /// A song in the music library.
    Song,
}

impl EntityKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 3] = [Self::Book, Self::Page, Self::Song];

    /// Lower-case singular name used on the command line and in cache keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Page => "page",
            Self::Song => "song",
        }
    }

    /// Name of the storage table holding entities of this kind.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Book => "books",
            Self::Page => "pages",
            Self::Song => "songs",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`EntityKind`] name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown entity kind {name:?} (expected book, page, or song)")]
pub struct ParseEntityKindError {
    /// The rejected input.
    pub name: String,
}

impl FromStr for EntityKind {
    type Err = ParseEntityKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseEntityKindError {
                name: s.to_owned(),
            })
    }
}

/// A book, page or song as seen by the ranking subsystem.
///
/// Only the fields needed for ranking are modelled. `read_count` is never
/// negative and `created_at` is only consulted for the song age bonus.
///
/// # Examples
///
/// ```
/// use kinfolio_core::ScoredEntity;
///
/// # fn main() -> Result<(), kinfolio_core::ScoredEntityError> {
/// let page = ScoredEntity::new(7, 0.0)?;
/// assert_eq!(page.id, 7);
/// assert!(page.is_unread());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScoredEntity {
    /// Unique identifier within the entity kind.
    pub id: u64,
    /// Accumulated popularity score.
    pub read_count: f64,
    /// Creation time, when known.
    #[cfg_attr(feature = "serde", serde(default))]
    pub created_at: Option<SystemTime>,
}

/// Errors returned by [`ScoredEntity::new`].
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum ScoredEntityError {
    /// The read count was below zero.
    #[error("read count {value} must not be negative")]
    NegativeReadCount {
        /// Rejected value.
        value: f64,
    },
    /// The read count was NaN or infinite.
    #[error("read count must be finite")]
    NonFiniteReadCount,
}

impl ScoredEntity {
    /// Validates and constructs a [`ScoredEntity`] with no creation time.
    ///
    /// # Errors
    /// Returns [`ScoredEntityError`] when `read_count` is negative or not
    /// finite.
    pub fn new(id: u64, read_count: f64) -> Result<Self, ScoredEntityError> {
        if !read_count.is_finite() {
            return Err(ScoredEntityError::NonFiniteReadCount);
        }
        if read_count < 0.0 {
            return Err(ScoredEntityError::NegativeReadCount { value: read_count });
        }
        Ok(Self {
            id,
            read_count,
            created_at: None,
        })
    }

    /// Attach a creation time.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: SystemTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Report whether the entity has never been viewed.
    #[expect(
        clippy::float_cmp,
        reason = "a fresh entity stores exactly 0.0 and only that value is cold"
    )]
    #[must_use]
    pub fn is_unread(&self) -> bool {
        self.read_count == 0.0
    }
}
