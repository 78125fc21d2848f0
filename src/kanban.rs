//! Drag-and-drop Kanban board state.
//!
//! A board has one column per [`TaskStatus`]. Each column exposes a drop zone
//! for every insertion slot; dropping a dragged card onto a zone yields the
//! `(column, index)` the card should land at. [`KanbanBoard::move_task`]
//! applies that move optimistically and reports which tasks need persisting.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::models::{Task, TaskStatus};

/// Format key the dragged task id is stored under.
pub const TASK_ID_FORMAT: &str = "taskId";
const PLAIN_TEXT_FORMAT: &str = "text/plain";

/// Payload carried by a drag operation, keyed by format.
#[derive(Debug, Default, Clone)]
pub struct DataTransfer {
    entries: HashMap<String, String>,
}

impl DataTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload for dragging the card of `task_id`.
    pub fn for_task(task_id: &str) -> Self {
        let mut transfer = Self::new();
        transfer.set_data(TASK_ID_FORMAT, task_id);
        transfer
    }

    pub fn set_data(&mut self, format: &str, data: &str) {
        self.entries.insert(format.to_string(), data.to_string());
    }

    pub fn get_data(&self, format: &str) -> Option<&str> {
        self.entries.get(format).map(String::as_str)
    }

    /// The dragged task id, falling back to plain text.
    pub fn task_id(&self) -> Option<&str> {
        self.get_data(TASK_ID_FORMAT)
            .or_else(|| self.get_data(PLAIN_TEXT_FORMAT))
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Insertion slot `index` of `column`. Active while a drag hovers over it,
/// which the UI renders as an enlarged, highlighted gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropZone {
    column: TaskStatus,
    index: usize,
    active: bool,
}

impl DropZone {
    pub fn new(column: TaskStatus, index: usize) -> Self {
        Self {
            column,
            index,
            active: false,
        }
    }

    pub fn column(&self) -> TaskStatus {
        self.column
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn drag_enter(&mut self) {
        self.active = true;
    }

    pub fn drag_over(&mut self) {
        self.active = true;
    }

    pub fn drag_leave(&mut self) {
        self.active = false;
    }

    /// Ends the drag over this zone and passes the dragged id to `on_drop`.
    /// Returns false (without calling `on_drop`) when the payload carries no
    /// task id.
    pub fn drop<F>(&mut self, transfer: &DataTransfer, on_drop: F) -> bool
    where
        F: FnOnce(&str),
    {
        self.active = false;
        match transfer.task_id() {
            Some(task_id) => {
                on_drop(task_id);
                true
            }
            None => false,
        }
    }

    /// Like [`DropZone::drop`], wiring the zone's column and index into a
    /// column-level reorder handler.
    pub fn drop_to<H>(&mut self, transfer: &DataTransfer, handler: H) -> bool
    where
        H: FnOnce(&str, TaskStatus, usize),
    {
        let (column, index) = (self.column, self.index);
        self.drop(transfer, |task_id| handler(task_id, column, index))
    }
}

#[derive(Debug, Clone, Default)]
pub struct KanbanBoard {
    columns: BTreeMap<TaskStatus, Vec<Task>>,
}

impl KanbanBoard {
    /// Builds the board from unarchived tasks, ordered by position.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut board = Self::default();
        board.replace_all(tasks);
        board
    }

    /// Discards local state, e.g. after a refetch corrected an optimistic move.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        let mut columns: BTreeMap<TaskStatus, Vec<Task>> =
            TaskStatus::ALL.iter().map(|s| (*s, Vec::new())).collect();

        for task in tasks.into_iter().filter(|t| !t.archived) {
            columns.entry(task.status).or_default().push(task);
        }
        for column in columns.values_mut() {
            column.sort_by(|a, b| {
                a.position
                    .cmp(&b.position)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            });
        }

        self.columns = columns;
    }

    pub fn column(&self, status: TaskStatus) -> &[Task] {
        self.columns.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    /// One drop zone per insertion slot, including after the last card.
    pub fn drop_zones(&self, status: TaskStatus) -> Vec<DropZone> {
        (0..=self.column(status).len())
            .map(|index| DropZone::new(status, index))
            .collect()
    }

    pub fn locate(&self, task_id: &str) -> Option<(TaskStatus, usize)> {
        self.columns.iter().find_map(|(status, tasks)| {
            tasks
                .iter()
                .position(|t| t.id == task_id)
                .map(|index| (*status, index))
        })
    }

    /// Moves `task_id` to slot `index` of `column`. Drop-zone indices count
    /// the dragged card itself when moving within one column.
    ///
    /// Returns the tasks whose status or position changed, or `None` when the
    /// task is not on the board.
    pub fn move_task(
        &mut self,
        task_id: &str,
        column: TaskStatus,
        index: usize,
        now: DateTime<Utc>,
    ) -> Option<Vec<Task>> {
        let (from, from_index) = self.locate(task_id)?;
        let mut task = self.columns.get_mut(&from)?.remove(from_index);

        let mut index = index;
        if from == column && index > from_index {
            index -= 1;
        }

        let status_changed = task.set_status(column, now);
        let target = self.columns.entry(column).or_default();
        let index = index.min(target.len());
        target.insert(index, task);

        let mut changed = Vec::new();
        let mut affected = vec![column];
        if from != column {
            affected.push(from);
        }
        for status in affected {
            if let Some(tasks) = self.columns.get_mut(&status) {
                for (position, task) in tasks.iter_mut().enumerate() {
                    let position = position as i64;
                    let moved = status_changed && task.id == task_id;
                    if task.position != position {
                        task.position = position;
                        task.updated_at = now;
                        changed.push(task.clone());
                    } else if moved {
                        changed.push(task.clone());
                    }
                }
            }
        }

        Some(changed)
    }
}
