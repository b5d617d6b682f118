use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier wrapper for registered users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for rentable properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId(pub String);

/// Identifier wrapper for rental applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed capability carried on every user record and authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Tenant,
    Owner,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Tenant => "tenant",
            UserRole::Owner => "owner",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tenant" => Some(UserRole::Tenant),
            "owner" => Some(UserRole::Owner),
            _ => None,
        }
    }
}

/// Authenticated identity supplied by the upstream auth collaborator. The
/// leasing service trusts the id and role without re-verifying credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: UserId(id.into()),
            role,
        }
    }
}

/// Identity record persisted for owners and tenants alike. Credential material
/// is an opaque hash; issuance and verification live in the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_verified: bool,
}

/// A rentable unit. `is_available == false` exactly when `current_tenant`
/// holds the tenant of the one approved, active application for the property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: PropertyId,
    pub owner: UserId,
    pub title: String,
    pub address: String,
    pub city: String,
    pub monthly_rent: u32,
    pub security_deposit: u32,
    pub is_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rented_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_tenant: Option<UserId>,
}

impl PropertyRecord {
    /// Bind the approved tenant and take the listing off the market.
    pub fn make_unavailable(&mut self, tenant: UserId, rented_on: DateTime<Utc>) {
        self.is_available = false;
        self.rented_date = Some(rented_on);
        self.current_tenant = Some(tenant);
    }

    /// Relist the property, clearing the rental tracking fields.
    pub fn make_available(&mut self) {
        self.is_available = true;
        self.rented_date = None;
        self.current_tenant = None;
    }
}

/// Lifecycle status of a rental application. `Pending` is the only
/// non-terminal state; every transition out of it stamps the decision date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
    Expired,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
            ApplicationStatus::Expired => "expired",
        }
    }

    /// Terminal statuses permit no further transitions.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(ApplicationStatus::Pending),
            "approved" => Some(ApplicationStatus::Approved),
            "rejected" => Some(ApplicationStatus::Rejected),
            "withdrawn" => Some(ApplicationStatus::Withdrawn),
            "expired" => Some(ApplicationStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Category of a document attached to an application. Contents live with the
/// file collaborator; the record keeps an opaque reference only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    IdProof,
    SalarySlip,
    BankStatement,
    ReferenceLetter,
    Other,
}

/// Opaque reference to an uploaded supporting document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub url: String,
    pub filename: String,
}

/// Optional self-reported details supplied by the tenant at intake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_income: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_size: Option<u8>,
    #[serde(default)]
    pub has_pets: bool,
    #[serde(default)]
    pub smoking: bool,
}

/// The join entity representing one tenant's interest in one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub tenant: UserId,
    pub property: PropertyId,
    /// Snapshot of `property.owner` taken at creation time; intentionally not
    /// live-synced, so historical decisions survive ownership changes.
    pub owner: UserId,
    pub status: ApplicationStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_move_in_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<DocumentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_response: Option<String>,
    pub application_date: DateTime<Utc>,
    pub decision_date: Option<DateTime<Utc>>,
    pub auto_rejected: bool,
    /// Archival bit, orthogonal to `status`. Transition checks consult only
    /// `status`; queries filter on `is_active` separately.
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_info: Option<TenantInfo>,
}

impl ApplicationRecord {
    /// Record a decision, stamping `decision_date` on the first departure from
    /// pending. Callers are responsible for checking the transition is legal.
    pub(crate) fn decide(
        &mut self,
        status: ApplicationStatus,
        response: Option<String>,
        decided_on: DateTime<Utc>,
        auto: bool,
    ) {
        self.status = status;
        if response.is_some() {
            self.owner_response = response;
        }
        if self.decision_date.is_none() {
            self.decision_date = Some(decided_on);
        }
        if auto {
            self.auto_rejected = true;
        }
    }

    pub fn age_in_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.application_date).num_days()
    }
}

/// Intake payload for a new application, as received from the tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    pub property: PropertyId,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_move_in_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<DocumentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_info: Option<TenantInfo>,
}

/// Owner response recorded on applications rejected as a side effect of a
/// sibling approval.
pub const AUTO_REJECT_RESPONSE: &str = "Property has been rented to another applicant. Thank you \
     for your interest. We encourage you to explore other available properties.";

/// Suffix appended when the consistency repair rewrites drifted records.
pub const REPAIR_NOTE: &str = " (auto-updated for data consistency)";
