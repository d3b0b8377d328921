pub mod config;
pub mod task;
pub mod tree;
pub mod view_state;

pub use config::*;
pub use task::*;
pub use tree::*;
pub use view_state::*;
