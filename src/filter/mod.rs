pub mod error;
pub mod filter;
pub mod filter_order;
pub mod filter_where;
pub mod page;
pub mod types;

pub use error::FilterError;
pub use filter::{FilterField, FilterSet, ListQuery};
pub use page::{absolute_url, PageWindow, Paginated};
pub use types::*;
