pub mod filter;
pub mod key;

pub use filter::{DEFAULT_PER_PAGE, FilterChange, SortDirection, SortField, TaskFilter};
pub use key::{ListParams, QueryKey};
