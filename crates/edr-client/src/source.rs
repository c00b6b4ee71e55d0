//! Port through which the pipeline pulls pages of rules.

use crate::error::Result;
use crate::types::{PageToken, RulesPage};

/// A paginated supply of raw rules.
///
/// [`crate::AuthenticatedClient`] implements this against the live API;
/// tests substitute in-memory sources.
pub trait RuleSource {
    /// Fetches the page identified by `page_token`.
    ///
    /// An empty token requests the first page.
    fn fetch_page(&self, page_token: &PageToken) -> impl Future<Output = Result<RulesPage>> + Send;
}
