pub mod bulk;
pub mod complete;
pub mod filter;
pub mod transition;
pub mod tree_ops;
