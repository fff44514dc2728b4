//! Preprint reads and writes over project nodes.

mod document;
mod serializer;
mod service;

pub use document::{
    DocumentError, PREPRINT_RESOURCE_TYPE, PreprintChanges, PreprintDocument,
};
pub use serializer::{PreprintDocumentOut, PreprintLinks, PreprintResource, PreprintSerializer};
pub use service::{PreprintError, PreprintService, PreprintView};
