//! Catalogue of domain events the gateway knows how to deliver.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rooms::{Role, UnknownRole};

/// Every `category.action` pair. Adding an event means adding a variant here
/// and a routing arm in the server's dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    InvestmentCreated,
    InvestmentUpdated,
    InvestmentDeleted,
    InvestmentNewInvestor,
    InvestmentApproved,
    UserCreated,
    UserUpdated,
    UserDeleted,
    CompanyCreated,
    CompanyUpdated,
    AnalyticsUpdated,
    AnalyticsPerformanceUpdated,
    SystemMaintenance,
    SystemAlert,
}

impl EventKind {
    /// Resolve `category.action`. Actions may be snake_case or camelCase.
    pub fn parse(event_type: &str) -> Option<Self> {
        let (category, action) = event_type.split_once('.')?;
        let kind = match (category, action) {
            ("investment", "created") => Self::InvestmentCreated,
            ("investment", "updated") => Self::InvestmentUpdated,
            ("investment", "deleted") => Self::InvestmentDeleted,
            ("investment", "new_investor" | "newInvestor") => Self::InvestmentNewInvestor,
            ("investment", "approved") => Self::InvestmentApproved,
            ("user", "created") => Self::UserCreated,
            ("user", "updated") => Self::UserUpdated,
            ("user", "deleted") => Self::UserDeleted,
            ("company", "created") => Self::CompanyCreated,
            ("company", "updated") => Self::CompanyUpdated,
            ("analytics", "updated" | "dashboard_updated" | "dashboardUpdated") => {
                Self::AnalyticsUpdated
            }
            ("analytics", "performance_updated" | "performanceUpdated" | "performance") => {
                Self::AnalyticsPerformanceUpdated
            }
            ("system", "maintenance") => Self::SystemMaintenance,
            ("system", "alert") => Self::SystemAlert,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical `category.action` name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvestmentCreated => "investment.created",
            Self::InvestmentUpdated => "investment.updated",
            Self::InvestmentDeleted => "investment.deleted",
            Self::InvestmentNewInvestor => "investment.new_investor",
            Self::InvestmentApproved => "investment.approved",
            Self::UserCreated => "user.created",
            Self::UserUpdated => "user.updated",
            Self::UserDeleted => "user.deleted",
            Self::CompanyCreated => "company.created",
            Self::CompanyUpdated => "company.updated",
            Self::AnalyticsUpdated => "analytics.updated",
            Self::AnalyticsPerformanceUpdated => "analytics.performance_updated",
            Self::SystemMaintenance => "system.maintenance",
            Self::SystemAlert => "system.alert",
        }
    }

    /// `type` field of the envelope clients receive.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::InvestmentCreated => "investment_created",
            Self::InvestmentUpdated => "investment_updated",
            Self::InvestmentDeleted => "investment_deleted",
            Self::InvestmentNewInvestor => "new_investor",
            Self::InvestmentApproved => "investment_approved",
            Self::UserCreated => "user_created",
            Self::UserUpdated => "user_updated",
            Self::UserDeleted => "user_deleted",
            Self::CompanyCreated => "company_created",
            Self::CompanyUpdated => "company_updated",
            Self::AnalyticsUpdated => "analytics_updated",
            Self::AnalyticsPerformanceUpdated => "performance_updated",
            Self::SystemMaintenance => "system_maintenance",
            Self::SystemAlert => "system_alert",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Who receives an analytics or system event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Audience {
    #[default]
    All,
    Role(Role),
}

impl FromStr for Audience {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Audience::All),
            other => other.parse().map(Audience::Role),
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::All => f.write_str("all"),
            Audience::Role(role) => role.fmt(f),
        }
    }
}

impl Serialize for Audience {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Audience {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
