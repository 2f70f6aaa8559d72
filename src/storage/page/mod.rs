pub mod page;
pub mod heap_page;
