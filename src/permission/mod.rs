mod claims;
mod degraded;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::request::GuardRequest;

pub use claims::{InvalidClaimFormat, PermissionIndex};
pub use degraded::CompanyNumberOnly;

/// Canonical permission values carried by the token permissions header.
pub mod value {
    pub const CREATE: &str = "create";
    pub const READ: &str = "read";
    pub const READ_PROTECTED: &str = "readprotected";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
}

/// The closed set of permission categories a claim can be made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionKey {
    #[serde(rename = "user_profile")]
    UserProfile,
    #[serde(rename = "user_transactions")]
    UserTransactions,
    #[serde(rename = "user_following")]
    UserFollowing,
    #[serde(rename = "user_applications")]
    UserApplications,
    #[serde(rename = "user_secure_applications")]
    UserSecureApplications,
    #[serde(rename = "user_orders")]
    UserOrders,
    #[serde(rename = "user_request_auth_code")]
    UserRequestAuthCode,
    /// The company the caller is acting for. This key is always enforced, even
    /// when token permission auth is disabled.
    #[serde(rename = "company_number")]
    CompanyNumber,
    #[serde(rename = "company_status")]
    CompanyStatus,
    #[serde(rename = "company_transactions")]
    CompanyTransactions,
    #[serde(rename = "company_auth_code")]
    CompanyAuthCode,
    /// Registered office address.
    #[serde(rename = "company_roa")]
    CompanyRoa,
    #[serde(rename = "company_accounts")]
    CompanyAccounts,
    #[serde(rename = "company_promise_to_file")]
    PromiseToFile,
    #[serde(rename = "user_psc_discrepancy_report")]
    UserPscDiscrepancyReport,
    #[serde(rename = "company_confirmation_statement")]
    CompanyConfirmationStatement,
    #[serde(rename = "company_incorporation")]
    CompanyIncorporation,
    #[serde(rename = "company_officers")]
    CompanyOfficers,
    #[serde(rename = "company_pscs")]
    CompanyPscs,
    /// Registered email address updates.
    #[serde(rename = "company_rea")]
    CompanyReaUpdate,
}

impl PermissionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionKey::UserProfile => "user_profile",
            PermissionKey::UserTransactions => "user_transactions",
            PermissionKey::UserFollowing => "user_following",
            PermissionKey::UserApplications => "user_applications",
            PermissionKey::UserSecureApplications => "user_secure_applications",
            PermissionKey::UserOrders => "user_orders",
            PermissionKey::UserRequestAuthCode => "user_request_auth_code",
            PermissionKey::CompanyNumber => "company_number",
            PermissionKey::CompanyStatus => "company_status",
            PermissionKey::CompanyTransactions => "company_transactions",
            PermissionKey::CompanyAuthCode => "company_auth_code",
            PermissionKey::CompanyRoa => "company_roa",
            PermissionKey::CompanyAccounts => "company_accounts",
            PermissionKey::PromiseToFile => "company_promise_to_file",
            PermissionKey::UserPscDiscrepancyReport => "user_psc_discrepancy_report",
            PermissionKey::CompanyConfirmationStatement => "company_confirmation_statement",
            PermissionKey::CompanyIncorporation => "company_incorporation",
            PermissionKey::CompanyOfficers => "company_officers",
            PermissionKey::CompanyPscs => "company_pscs",
            PermissionKey::CompanyReaUpdate => "company_rea",
        }
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate over the permissions granted to the caller of one request.
///
/// Implementors must be cheap to query; stages call `has_permission` once per
/// required value and stop at the first match.
pub trait Permissions: fmt::Debug + Send + Sync {
    /// Returns true if the caller was granted `value` for `key`.
    fn has_permission(&self, key: PermissionKey, value: &str) -> bool;
}

/// Parses the token permissions of a request.
///
/// With `enforce_all_keys` off, the returned predicate grants every key
/// except [`PermissionKey::CompanyNumber`], which is still checked against the
/// header.
pub fn read_token_permissions(
    req: &GuardRequest,
    header: &str,
    enforce_all_keys: bool,
) -> Result<Arc<dyn Permissions>, InvalidClaimFormat> {
    let index = PermissionIndex::parse(req.header(header))?;
    if enforce_all_keys {
        return Ok(Arc::new(index));
    }
    Ok(Arc::new(CompanyNumberOnly::new(index)))
}
