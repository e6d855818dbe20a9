//! Contract helpers for the remote API client
//!
//! The client itself lives outside this crate; these are the pieces of its
//! contract the core depends on.

use std::future::Future;

/// How an error returned by the remote API should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Another asynchronous operation is in flight, or the resource is mid-transition
    Busy,
    /// The target resource does not exist
    NotFound,
    /// Anything else
    Fatal,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Busy => write!(f, "busy"),
            ErrorClass::NotFound => write!(f, "not-found"),
            ErrorClass::Fatal => write!(f, "fatal"),
        }
    }
}

/// Error-classification predicate implemented by remote API error types
pub trait ClassifyError {
    fn class(&self) -> ErrorClass;

    fn is_busy(&self) -> bool {
        self.class() == ErrorClass::Busy
    }

    fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }
}

/// Read every page of a paginated listing.
///
/// Pages are numbered from 1; listing stops at the first empty page.
pub async fn collect_pages<T, E, F, Fut>(mut fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let mut items = Vec::new();
    let mut page_number = 1;

    loop {
        let page = fetch(page_number).await?;
        if page.is_empty() {
            break;
        }

        tracing::debug!("Read page {} ({} items)", page_number, page.len());
        items.extend(page);
        page_number += 1;
    }

    Ok(items)
}
