//! Selection of two releases to diff

use crate::errors::ControllerError;
use crate::lifecycle::gitops::{commit_hash, compare_url};
use crate::models::downstream::Downstream;
use crate::models::release::Release;

const MAX_MARKED: usize = 2;

/// A marked release. Commit URLs are resolved when the diff opens, since
/// history refetches may fill them in after marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mark {
    sequence: i64,
    parent_sequence: i64,
}

/// Two releases resolved for diffing, ordered by ascending parent sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffPair {
    pub first_sequence: i64,
    pub second_sequence: i64,
}

/// Where a resolved diff is shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffTarget {
    Inline(DiffPair),
    External { url: String },
}

/// Sliding window of the two most recently marked releases
#[derive(Debug, Clone, Default)]
pub struct DiffSelection {
    marks: Vec<Mark>,
}

impl DiffSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a release, or unmark it if already marked
    ///
    /// Marking a third release drops whichever mark falls outside the two
    /// most recent ones.
    pub fn toggle(&mut self, release: &Release) -> Result<(), ControllerError> {
        if let Some(index) = self.marks.iter().position(|m| m.sequence == release.sequence) {
            self.marks.remove(index);
            return Ok(());
        }

        if !release.is_downloaded() {
            return Err(ControllerError::InvalidTransition(format!(
                "release {} is not downloaded and cannot be diffed",
                release.sequence
            )));
        }

        self.marks.insert(
            0,
            Mark {
                sequence: release.sequence,
                parent_sequence: release.parent_sequence,
            },
        );
        self.marks.truncate(MAX_MARKED);
        Ok(())
    }

    pub fn is_marked(&self, sequence: i64) -> bool {
        self.marks.iter().any(|m| m.sequence == sequence)
    }

    /// Marked sequences, most recent first
    pub fn marked(&self) -> Vec<i64> {
        self.marks.iter().map(|m| m.sequence).collect()
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }

    fn ordered(&self) -> Option<(&Mark, &Mark)> {
        match self.marks.as_slice() {
            [a, b] if a.parent_sequence <= b.parent_sequence => Some((a, b)),
            [a, b] => Some((b, a)),
            _ => None,
        }
    }

    /// The pair to diff, once exactly two releases are marked
    pub fn pair(&self) -> Option<DiffPair> {
        self.ordered().map(|(first, second)| DiffPair {
            first_sequence: first.parent_sequence,
            second_sequence: second.parent_sequence,
        })
    }

    /// Inline diff, or an external compare URL under GitOps
    ///
    /// `commit_url_of` looks up the current commit URL of a marked sequence.
    pub fn target<F>(
        &self,
        downstream: &Downstream,
        commit_url_of: F,
    ) -> Result<DiffTarget, ControllerError>
    where
        F: Fn(i64) -> Option<String>,
    {
        let (first, second) = self.ordered().ok_or_else(|| {
            ControllerError::InvalidTransition("two releases must be marked to diff".to_string())
        })?;

        if !downstream.gitops_connected() {
            return Ok(DiffTarget::Inline(DiffPair {
                first_sequence: first.parent_sequence,
                second_sequence: second.parent_sequence,
            }));
        }

        let hash_of = |mark: &Mark| {
            commit_url_of(mark.sequence)
                .as_deref()
                .and_then(commit_hash)
                .ok_or_else(|| {
                    ControllerError::NotFound(format!("commit for release {}", mark.sequence))
                })
        };
        let url = compare_url(&downstream.gitops, &hash_of(first)?, &hash_of(second)?)?;
        Ok(DiffTarget::External { url })
    }
}
