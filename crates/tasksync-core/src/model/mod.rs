pub mod task;

pub use task::{
    MAX_NAME_LEN, PageMeta, ParseEnumError, QueryData, Status, Task, TaskChanges, TaskDraft,
    TaskId, TaskPage,
};
