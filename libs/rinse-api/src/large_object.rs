use std::future::Future;
use std::pin::Pin;

use crate::error::DriverError;

/// Handle to out-of-line field content (CLOB/BLOB) exposed by the driver.
///
/// The content is not part of the row; reading it needs a separate round
/// trip. Implementations enforce their own timeouts; the engine never
/// cancels a fetch.
pub trait LargeObject: Send + Sync {
    /// Fetch the full content. `Ok(None)` means the object resolved to nothing.
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Option<String>, DriverError>> + Send + '_>>;
}

/// Large object whose content the driver already materialized.
#[derive(Debug, Clone, Default)]
pub struct InlineLargeObject {
    content: Option<String>,
}

impl InlineLargeObject {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }

    /// Handle that resolves to nothing.
    pub fn empty() -> Self {
        Self { content: None }
    }
}

impl LargeObject for InlineLargeObject {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Option<String>, DriverError>> + Send + '_>> {
        Box::pin(async move { Ok(self.content.clone()) })
    }
}

/// Binary large object whose bytes the driver already materialized.
/// Content is decoded as UTF-8 on fetch.
#[derive(Debug, Clone, Default)]
pub struct BytesLargeObject {
    bytes: Option<Vec<u8>>,
}

impl BytesLargeObject {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Some(bytes.into()),
        }
    }
}

impl LargeObject for BytesLargeObject {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Option<String>, DriverError>> + Send + '_>> {
        Box::pin(async move {
            match &self.bytes {
                Some(bytes) => String::from_utf8(bytes.clone()).map(Some).map_err(DriverError::from),
                None => Ok(None),
            }
        })
    }
}
