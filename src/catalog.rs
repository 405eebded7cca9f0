use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Fixed photoshoot package catalog. Prices are tax-inclusive EUR totals
/// and defined in code, not the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageId {
    Essential,
    Premium,
    Luxury,
    Rooftop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Package {
    pub id: PackageId,
    /// Tax-inclusive total in EUR; for per-person packages this is the
    /// per-person total
    pub total_price_eur: Decimal,
    pub per_person: bool,
}

impl PackageId {
    pub const ALL: [PackageId; 4] = [
        PackageId::Essential,
        PackageId::Premium,
        PackageId::Luxury,
        PackageId::Rooftop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Essential => "essential",
            Self::Premium => "premium",
            Self::Luxury => "luxury",
            Self::Rooftop => "rooftop",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "essential" => Some(Self::Essential),
            "premium" => Some(Self::Premium),
            "luxury" => Some(Self::Luxury),
            "rooftop" => Some(Self::Rooftop),
            _ => None,
        }
    }

    pub fn package(&self) -> Package {
        match self {
            Self::Essential => Package {
                id: Self::Essential,
                total_price_eur: dec!(150),
                per_person: false,
            },
            Self::Premium => Package {
                id: Self::Premium,
                total_price_eur: dec!(250),
                per_person: false,
            },
            Self::Luxury => Package {
                id: Self::Luxury,
                total_price_eur: dec!(400),
                per_person: false,
            },
            // Rooftop shoots are priced per participant
            Self::Rooftop => Package {
                id: Self::Rooftop,
                total_price_eur: dec!(150),
                per_person: true,
            },
        }
    }
}

impl std::fmt::Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_package() {
        for id in PackageId::ALL {
            assert_eq!(PackageId::parse(id.as_str()), Some(id));
        }
        assert_eq!(PackageId::parse("deluxe"), None);
    }

    #[test]
    fn only_rooftop_is_per_person() {
        for id in PackageId::ALL {
            assert_eq!(id.package().per_person, id == PackageId::Rooftop);
        }
    }
}
