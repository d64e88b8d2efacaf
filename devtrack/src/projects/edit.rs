//! Inline edit state for project names and task titles.
//!
//! Each editable kind has one slot: at most one project and one task can be
//! in edit mode at a time, independently of each other. Starting an edit on
//! a second entity of the same kind implicitly cancels the first.
//!
//! ```text
//! Viewing --begin--> Editing --cancel--------> Viewing
//!                       |  \--save ok--------> Viewing
//!                       \----save failed-----> Editing (error recorded)
//! ```

use devtrack_proto::model::{ProjectId, TaskId};

/// Identifies a task together with the project that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    /// Owning project.
    pub project_id: ProjectId,
    /// The task itself.
    pub task_id: TaskId,
}

impl TaskKey {
    /// Builds a key from its parts.
    #[must_use]
    pub const fn new(project_id: ProjectId, task_id: TaskId) -> Self {
        Self {
            project_id,
            task_id,
        }
    }
}

/// Draft text buffer of an entity in edit mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft<K> {
    /// Entity being edited.
    pub key: K,
    /// Current draft text, unvalidated.
    pub text: String,
    /// Error from the last save attempt, shown inline next to the field.
    pub error: Option<String>,
}

/// Edit slot for one kind of entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditState<K> {
    /// Nothing is being edited.
    Viewing,
    /// One entity is being edited.
    Editing(Draft<K>),
}

impl<K> Default for EditState<K> {
    fn default() -> Self {
        Self::Viewing
    }
}

impl<K: PartialEq> EditState<K> {
    /// Enters edit mode for `key`, seeding the draft with `current`.
    ///
    /// Returns the key of a different entity whose edit was implicitly
    /// cancelled, if any. Re-entering edit on the same entity resets its draft.
    pub fn begin(&mut self, key: K, current: &str) -> Option<K> {
        let previous = std::mem::replace(
            self,
            Self::Editing(Draft {
                key,
                text: current.to_string(),
                error: None,
            }),
        );
        match (previous, &*self) {
            (Self::Editing(old), Self::Editing(new)) if old.key != new.key => Some(old.key),
            _ => None,
        }
    }

    /// Replaces the draft text. Returns `false` when not editing.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        match self {
            Self::Editing(draft) => {
                draft.text = text.into();
                true
            }
            Self::Viewing => false,
        }
    }

    /// Leaves edit mode, discarding the draft.
    pub fn cancel(&mut self) -> Option<Draft<K>> {
        match std::mem::take(self) {
            Self::Editing(draft) => Some(draft),
            Self::Viewing => None,
        }
    }

    /// Leaves edit mode after a successful save of `key`.
    ///
    /// Does nothing if the slot has since moved on to another entity.
    pub fn commit(&mut self, key: &K) -> bool {
        if self.is_editing(key) {
            *self = Self::Viewing;
            true
        } else {
            false
        }
    }

    /// Records a failed save of `key`, staying in edit mode.
    pub fn fail(&mut self, key: &K, message: impl Into<String>) {
        if let Self::Editing(draft) = self
            && &draft.key == key
        {
            draft.error = Some(message.into());
        }
    }

    /// Whether `key` is the entity currently in edit mode.
    #[must_use]
    pub fn is_editing(&self, key: &K) -> bool {
        matches!(self, Self::Editing(draft) if &draft.key == key)
    }

    /// The active draft, if any.
    #[must_use]
    pub const fn draft(&self) -> Option<&Draft<K>> {
        match self {
            Self::Editing(draft) => Some(draft),
            Self::Viewing => None,
        }
    }
}
