//! Placement actions and the bucket keys derived from them.
//!
//! Wire form is `"<name>:<tier>"`. The name is matched by prefix
//! (`edge*`, `cloud*`, `local*`) and the tier must be one of
//! `low|med|high`. Anything else falls back per component: an
//! unrecognised name becomes `edge`, a missing or unrecognised tier
//! becomes `med`. Parsing never fails.
//!
//! Calibration and serving both key their tables with [`bucket_key`];
//! nothing else should build the `"kind:tier"` string.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Local,
    Edge,
    Cloud,
}

impl Kind {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Edge => "edge",
            Self::Cloud => "cloud",
        }
    }

    fn from_name(name: &str) -> Self {
        if name.starts_with("edge") {
            Self::Edge
        } else if name.starts_with("cloud") {
            Self::Cloud
        } else if name.starts_with("local") {
            Self::Local
        } else {
            Self::Edge
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    Med,
    High,
}

impl Tier {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Med => "med",
            Self::High => "high",
        }
    }

    fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("low") => Self::Low,
            Some("high") => Self::High,
            _ => Self::Med,
        }
    }
}

/// A parsed placement action. Stack-allocated, Copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Action {
    pub kind: Kind,
    pub tier: Tier,
}

impl Action {
    pub const fn new(kind: Kind, tier: Tier) -> Self {
        Self { kind, tier }
    }

    /// Request-side entry point: an absent action is the default bucket.
    pub fn from_request(raw: Option<&str>) -> Self {
        raw.map(parse_action).unwrap_or_default()
    }

    #[inline]
    pub fn bucket_key(&self) -> String {
        bucket_key(self.kind, self.tier)
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::new(Kind::Edge, Tier::Med)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.tier.as_str())
    }
}

/// Total parse of a wire action string.
pub fn parse_action(raw: &str) -> Action {
    if raw.is_empty() {
        return Action::default();
    }
    let mut parts = raw.split(':');
    let kind = Kind::from_name(parts.next().unwrap_or_default());
    let tier = Tier::from_name(parts.next());
    Action::new(kind, tier)
}

/// Canonical table key for a bucket.
#[inline]
pub fn bucket_key(kind: Kind, tier: Tier) -> String {
    format!("{}:{}", kind.as_str(), tier.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matching() {
        assert_eq!(parse_action("edge1:high"), Action::new(Kind::Edge, Tier::High));
        assert_eq!(parse_action("cloud-eu:low"), Action::new(Kind::Cloud, Tier::Low));
        assert_eq!(parse_action("local:med"), Action::new(Kind::Local, Tier::Med));
        assert_eq!(parse_action("localhost:low"), Action::new(Kind::Local, Tier::Low));
    }

    #[test]
    fn test_unknown_falls_back_to_edge_med() {
        assert_eq!(parse_action("gpu7:ultra"), Action::new(Kind::Edge, Tier::Med));
        assert_eq!(parse_action(""), Action::new(Kind::Edge, Tier::Med));
        assert_eq!(Action::from_request(None), Action::new(Kind::Edge, Tier::Med));
        assert_eq!(parse_action("gpu7:ultra").bucket_key(), "edge:med");
    }

    #[test]
    fn test_missing_tier_defaults_to_med() {
        assert_eq!(parse_action("cloud2"), Action::new(Kind::Cloud, Tier::Med));
        assert_eq!(parse_action("edge3:"), Action::new(Kind::Edge, Tier::Med));
    }

    #[test]
    fn test_tier_is_case_sensitive() {
        assert_eq!(parse_action("edge:HIGH").tier, Tier::Med);
    }

    #[test]
    fn test_bucket_key_matches_display() {
        for kind in [Kind::Local, Kind::Edge, Kind::Cloud] {
            for tier in [Tier::Low, Tier::Med, Tier::High] {
                let a = Action::new(kind, tier);
                assert_eq!(a.bucket_key(), a.to_string());
                assert_eq!(parse_action(&a.bucket_key()), a);
            }
        }
    }
}
