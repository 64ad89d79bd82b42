//! Supported external payment processors.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// An external payment processor the platform can hold a subscription with.
///
/// The stored `provider` field of a ledger record selects which adapter
/// handles outbound calls for that subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Stripe,
    Paypal,
    Razorpay,
    Paystack,
    Flutterwave,
}

impl Provider {
    /// All supported providers.
    pub const ALL: [Provider; 5] = [
        Provider::Stripe,
        Provider::Paypal,
        Provider::Razorpay,
        Provider::Paystack,
        Provider::Flutterwave,
    ];

    /// Returns the provider name as stored in ledger records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
            Provider::Paypal => "paypal",
            Provider::Razorpay => "razorpay",
            Provider::Paystack => "paystack",
            Provider::Flutterwave => "flutterwave",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(Provider::Stripe),
            "paypal" => Ok(Provider::Paypal),
            "razorpay" => Ok(Provider::Razorpay),
            "paystack" => Ok(Provider::Paystack),
            "flutterwave" => Ok(Provider::Flutterwave),
            other => Err(DomainError::UnknownProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip_for_all_providers() {
        for provider in Provider::ALL {
            let parsed: Provider = provider.as_str().parse().unwrap();
            assert_eq!(parsed, provider);
        }
    }

    #[test]
    fn parse_rejects_unknown_provider() {
        let result = "venmo".parse::<Provider>();
        assert!(matches!(result, Err(DomainError::UnknownProvider(_))));
    }

    #[test]
    fn serialization_uses_lowercase_names() {
        let json = serde_json::to_string(&Provider::Paystack).unwrap();
        assert_eq!(json, "\"paystack\"");
    }
}
