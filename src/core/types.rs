use std::fmt;
use std::str::FromStr;

/// Where a subscriber heard about the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Instagram,
    Teacher,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Instagram => "instagram",
            Source::Teacher => "teacher",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Instagram => "Instagram",
            Source::Teacher => "От учителя",
        }
    }

    /// Only teacher referrals are asked for a promo code.
    pub fn asks_for_promo(&self) -> bool {
        matches!(self, Source::Teacher)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instagram" => Ok(Source::Instagram),
            "teacher" => Ok(Source::Teacher),
            _ => Err(format!("Unknown source: {}", s)),
        }
    }
}
