//! ResponseDefinitionResolver - operation + status code → response definition

use tracing::debug;

use crate::model::{Operation, ResponseDef, StatusSelector};

/// No exact, range or `default` response covers the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Undocumented {
    pub status: u16,
    pub endpoint: String,
    pub documented: Vec<String>,
}

/// Resolve the response definition for `status`: exact code, then `NXX`, then `default`.
///
/// # Errors
///
/// `Undocumented` when none of the three applies.
pub fn resolve(operation: &Operation, status: u16) -> Result<&ResponseDef, Undocumented> {
    // status / 100 < 256 for any u16
    let range = u8::try_from(status / 100).unwrap_or(u8::MAX);
    let candidates = [
        StatusSelector::Exact(status),
        StatusSelector::Range(range),
        StatusSelector::Default,
    ];

    for selector in candidates {
        if let Some(def) = operation.responses.iter().find(|r| r.selector == selector) {
            debug!(status, selector = %selector, endpoint = %operation.endpoint(), "resolved response");
            return Ok(def);
        }
    }

    debug!(status, endpoint = %operation.endpoint(), "status not documented");
    Err(Undocumented {
        status,
        endpoint: operation.endpoint(),
        documented: operation.selectors(),
    })
}
