pub mod json_loader;
pub mod post_list_loader;

pub use json_loader::{load_discovery_map, save_discovery_map, save_text_report};
pub use post_list_loader::load_post_list;
