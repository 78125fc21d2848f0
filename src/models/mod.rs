pub mod feedback;
pub mod note;
pub mod tag;
pub mod task;

pub use feedback::{Feedback, NewFeedbackRequest, Visibility};
pub use note::{NewNoteRequest, Note, NoteRef, UpdateNoteRequest};
pub use tag::{ChecklistItem, Tag};
pub use task::{
    DeleteTaskRequest, MoveTaskRequest, PatchTaskStatusRequest, Task, TaskStatus, TaskUpsert,
    UpsertTaskRequest,
};
