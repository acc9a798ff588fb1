//! Index membership sets with a restartable cursor.
//!
//! A [`MemberSet`] holds dense indices into an array owned elsewhere
//! (objects of one processor, or the light processors of a pass). Members
//! are always visited in ascending index order.
//!
//! A [`Cursor`] remembers only the last index it returned, so the set may
//! be mutated between two steps of a traversal:
//!
//! - a member removed before the cursor reaches it is never returned,
//! - a member already returned is never returned again,
//! - a member inserted above the cursor position is returned, one inserted
//!   below it is not.

use std::collections::BTreeSet;
use std::ops::Bound;

/// Position of an in-progress traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    last: Option<usize>,
}

impl Cursor {
    pub fn restart(&mut self) {
        self.last = None;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberSet {
    members: BTreeSet<usize>,
}

impl MemberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the index was already a member.
    pub fn insert(&mut self, index: usize) -> bool {
        self.members.insert(index)
    }

    /// Returns `false` if the index was not a member.
    pub fn remove(&mut self, index: usize) -> bool {
        self.members.remove(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().copied()
    }

    /// Advance `cursor` to the next member above its position.
    pub fn next(&self, cursor: &mut Cursor) -> Option<usize> {
        let next = match cursor.last {
            None => self.members.iter().next(),
            Some(last) => self
                .members
                .range((Bound::Excluded(last), Bound::Unbounded))
                .next(),
        }
        .copied();
        if next.is_some() {
            cursor.last = next;
        }
        next
    }
}

impl FromIterator<usize> for MemberSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}
