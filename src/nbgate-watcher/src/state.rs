//! Watched-file state machine.
//!
//! ```text
//! Absent ──created──▶ Present(m)
//! Present(m1) ──m1 != m2──▶ Present(m2)
//! Present ──deleted──▶ Absent
//! ```
//!
//! Creation and modification trigger a commit; deletion is only logged.

use std::time::SystemTime;

/// Last observed state of the watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState<M = SystemTime> {
    Absent,
    Present(M),
}

/// What changed between two observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Created,
    Modified,
    Deleted,
}

impl Transition {
    /// Whether this transition pushes the file content.
    pub fn triggers_commit(self) -> bool {
        matches!(self, Self::Created | Self::Modified)
    }
}

impl<M: PartialEq + Copy> FileState<M> {
    /// State for an initial observation.
    pub fn from_mtime(mtime: Option<M>) -> Self {
        match mtime {
            Some(m) => Self::Present(m),
            None => Self::Absent,
        }
    }

    /// Advance to the state described by `mtime` and report the transition.
    pub fn observe(&mut self, mtime: Option<M>) -> Transition {
        let transition = match (*self, mtime) {
            (Self::Absent, None) => Transition::Unchanged,
            (Self::Absent, Some(_)) => Transition::Created,
            (Self::Present(_), None) => Transition::Deleted,
            (Self::Present(old), Some(new)) if old == new => Transition::Unchanged,
            (Self::Present(_), Some(_)) => Transition::Modified,
        };
        *self = Self::from_mtime(mtime);
        transition
    }
}
