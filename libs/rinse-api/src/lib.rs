pub mod error;
pub mod graph;
pub mod large_object;
pub mod mapping;
pub mod record;
pub mod value;

pub use error::{DriverError, ErrorKind};
pub use graph::{NodeId, RawGraph, RawNode};
pub use large_object::{BytesLargeObject, InlineLargeObject, LargeObject};
pub use mapping::{FieldMap, FieldMapping};
pub use record::{FallbackReason, SanitizedRecord};
pub use value::{RawValue, Scalar};
