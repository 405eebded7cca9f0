use serde::{Deserialize, Serialize};

/// Languages the storefront ships in. Anything else falls back to English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Tr,
    Ar,
    Ru,
    Es,
}

impl Locale {
    pub const ALL: [Locale; 5] = [Locale::En, Locale::Tr, Locale::Ar, Locale::Ru, Locale::Es];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Tr => "tr",
            Self::Ar => "ar",
            Self::Ru => "ru",
            Self::Es => "es",
        }
    }

    /// Lenient parse: accepts region-tagged values ("tr-TR"), unknown
    /// languages resolve to English.
    pub fn parse_or_default(value: &str) -> Self {
        let language = value
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match language.as_str() {
            "tr" => Self::Tr,
            "ar" => Self::Ar,
            "ru" => Self::Ru,
            "es" => Self::Es,
            _ => Self::En,
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::En
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_tags_and_unknowns() {
        assert_eq!(Locale::parse_or_default("tr-TR"), Locale::Tr);
        assert_eq!(Locale::parse_or_default("ru_RU"), Locale::Ru);
        assert_eq!(Locale::parse_or_default("pt-BR"), Locale::En);
        assert_eq!(Locale::parse_or_default(""), Locale::En);
    }
}
