pub mod credentials;
pub mod download;
pub mod loaders;
pub mod references;

pub use credentials::Credentials;
pub use download::{DownloadOutcome, DownloadTask};
pub use loaders::{load_discovery_map, load_post_list, save_discovery_map, save_text_report};
pub use references::{DiscoveryMap, DiscoveryResult, ImageReference, PostReference};
