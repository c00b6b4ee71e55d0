//! Client for the paginated EDR rules API.
//!
//! The provider exposes two endpoints:
//!
//! - `POST {token_host}/oauth/token` - password-grant token request
//! - `GET {host}/v2/edr-rules` - rules listing, 100 per page, cursor-paginated
//!
//! [`EdrClient::authenticate`] fetches the bearer token once;
//! [`EdrClient::with_token`] binds it, and the resulting
//! [`AuthenticatedClient`] serves pages through the [`RuleSource`] port.

pub mod client;
pub mod error;
pub mod source;
pub mod types;

pub use client::{AuthenticatedClient, EdrClient, PAGE_SIZE, rules_page_url, token_request_body};
pub use error::{ClientError, Result};
pub use source::RuleSource;
pub use types::{AccessToken, Credentials, PageToken, RawRuleEntry, RulesPage};
