pub mod page_extractor;
pub mod url_normalizer;

pub use page_extractor::{extract_image_urls, Extraction, ExtractionTier};
pub use url_normalizer::{normalize, normalize_all};
