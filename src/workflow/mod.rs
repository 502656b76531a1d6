pub mod discovery_flow;
pub mod download_flow;

pub use discovery_flow::{DiscoveryFlow, DiscoveryReport, DiscoverySettings, DiscoverySource, DiscoveryState};
pub use download_flow::{ensure_output_dir, fetch, is_photo_link, process_photo_link, SIZE_THRESHOLD};
