pub mod assemble;
pub mod browser;
pub mod expand;
pub mod fields;
pub mod images;
pub mod offline;
pub mod pipeline;
pub mod snapshot;
pub mod traits;
pub mod types;
pub mod walker;

pub use browser::ChromePage;
pub use offline::StaticPage;
pub use pipeline::ListingExtractor;
pub use traits::{IngestSink, PageHost};
