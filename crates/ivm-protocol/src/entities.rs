//! Domain entities as they travel in event payloads.
//!
//! Only the fields that decide delivery are typed; everything else the
//! collaborator sends is kept verbatim in `fields` and re-emitted unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{optional_id, EntityId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    /// Sub-company that manages the investment; its admins are notified.
    #[serde(
        default,
        deserialize_with = "optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub_company_id: Option<EntityId>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investor {
    /// Account of the investor; receives direct notifications.
    pub user_id: EntityId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// An investor joining, or being approved for, an investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorActivity {
    pub investment: Investment,
    pub investor: Investor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "_id")]
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    /// User administering the company.
    #[serde(
        default,
        deserialize_with = "optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub admin_id: Option<EntityId>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}
