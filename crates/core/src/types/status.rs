//! Lead pipeline status.

use serde::{Deserialize, Serialize};

/// Pipeline stage of a lead.
///
/// The set is deployment-fixed: `Leads` (initial), `Contacted`, `Converted`
/// (terminal; triggers client derivation), `Lost`. Wire and database values
/// are the variant names verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LeadStatus {
    /// Initial stage for newly created leads.
    #[default]
    Leads,
    /// Outreach has happened at least once.
    Contacted,
    /// Terminal stage; a Client record is derived on this transition.
    Converted,
    /// Terminal stage; no follow-up planned.
    Lost,
}

impl LeadStatus {
    /// All valid status values, in pipeline order.
    pub const ALL: [Self; 4] = [Self::Leads, Self::Contacted, Self::Converted, Self::Lost];

    /// The wire/database string for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Leads => "Leads",
            Self::Contacted => "Contacted",
            Self::Converted => "Converted",
            Self::Lost => "Lost",
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Leads" => Ok(Self::Leads),
            "Contacted" => Ok(Self::Contacted),
            "Converted" => Ok(Self::Converted),
            "Lost" => Ok(Self::Lost),
            _ => Err(format!(
                "invalid lead status: {s} (expected one of Leads, Contacted, Converted, Lost)"
            )),
        }
    }
}

// Stored as TEXT; parse on the way out so a corrupt row surfaces as a
// decode error instead of a phantom variant.
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for LeadStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for LeadStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse::<Self>()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for LeadStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_pipeline_start() {
        assert_eq!(LeadStatus::default(), LeadStatus::Leads);
    }

    #[test]
    fn test_serde_uses_verbatim_names() {
        for status in LeadStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
            let back: LeadStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn test_rejects_unknown_value() {
        assert!(serde_json::from_str::<LeadStatus>("\"Qualified\"").is_err());
        assert!("converted".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn test_from_str_roundtrip() {
        for status in LeadStatus::ALL {
            assert_eq!(status.as_str().parse::<LeadStatus>().unwrap(), status);
        }
    }
}
