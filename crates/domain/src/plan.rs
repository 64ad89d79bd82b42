//! Plans, entitlement tiers and the platform pricing table.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

/// Divisor applied to a plan's cost to compute the platform share.
const PLATFORM_SHARE_DIVISOR: i64 = 4;

/// Provider-facing plan identifier (e.g. a Stripe price id or a PayPal
/// plan id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(String);

impl PlanId {
    /// Creates a new plan ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the plan ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PlanId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PlanId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for PlanId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A user's entitlement classification, the only billing-derived state
/// visible to the rest of the application.
///
/// Stored as a plain string: `"free"`, `"forever"`, or the paid plan
/// identifier itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Tier {
    /// No paid entitlement.
    Free,

    /// Permanent grant, independent of billing. Never downgraded.
    Forever,

    /// Entitlement backed by an active subscription on the given plan.
    Paid(PlanId),
}

impl Tier {
    /// Returns true for a subscription-backed tier.
    pub fn is_paid(&self) -> bool {
        matches!(self, Tier::Paid(_))
    }

    /// The tier a user falls back to when their subscription ends.
    ///
    /// A `Forever` grant is independent of billing and survives any
    /// subscription event.
    pub fn downgraded(&self) -> Tier {
        match self {
            Tier::Forever => Tier::Forever,
            _ => Tier::Free,
        }
    }

    /// Returns the stored string form.
    pub fn as_str(&self) -> &str {
        match self {
            Tier::Free => "free",
            Tier::Forever => "forever",
            Tier::Paid(plan) => plan.as_str(),
        }
    }
}

impl From<Tier> for String {
    fn from(tier: Tier) -> Self {
        tier.as_str().to_string()
    }
}

impl From<String> for Tier {
    fn from(s: String) -> Self {
        match s.as_str() {
            "free" => Tier::Free,
            "forever" => Tier::Forever,
            _ => Tier::Paid(PlanId::new(s)),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The two paid plans the platform sells and their costs.
///
/// An identifier outside this table is rejected as a hard validation
/// error wherever a plan is priced; there is no fallback cost.
#[derive(Debug, Clone)]
pub struct PricingTable {
    monthly_id: PlanId,
    monthly_cost: Money,
    yearly_id: PlanId,
    yearly_cost: Money,
}

impl PricingTable {
    /// Creates a pricing table from the configured plan ids and costs.
    pub fn new(
        monthly_id: impl Into<PlanId>,
        monthly_cost: Money,
        yearly_id: impl Into<PlanId>,
        yearly_cost: Money,
    ) -> Self {
        Self {
            monthly_id: monthly_id.into(),
            monthly_cost,
            yearly_id: yearly_id.into(),
            yearly_cost,
        }
    }

    /// Returns true if the plan identifier is one the platform sells.
    pub fn is_known(&self, plan: &PlanId) -> bool {
        *plan == self.monthly_id || *plan == self.yearly_id
    }

    /// Returns the full cost of a plan.
    pub fn cost_of(&self, plan: &PlanId) -> Result<Money, DomainError> {
        if *plan == self.monthly_id {
            Ok(self.monthly_cost)
        } else if *plan == self.yearly_id {
            Ok(self.yearly_cost)
        } else {
            Err(DomainError::UnknownPlan(plan.to_string()))
        }
    }

    /// Returns the platform's commission share for a plan (25% of cost).
    pub fn commission(&self, plan: &PlanId) -> Result<Money, DomainError> {
        Ok(self.cost_of(plan)?.divide(PLATFORM_SHARE_DIVISOR))
    }
}
