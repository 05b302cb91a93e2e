//! Chaos scenarios for the tracking engine.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// LT-001: Clean feed, moving fleet, no faults
    SteadyState,

    /// LT-002: Zero and missing bearings across the fleet
    BearingDropout,

    /// LT-003: Vehicles enter and leave service every poll
    Churn,

    /// LT-004: Transport outage, error statuses and garbage bodies
    FeedOutage,

    /// LT-005: View hidden and shown while vehicles keep moving
    HiddenTab,

    /// LT-006: Random pointer events against a churning fleet
    LabelStorm,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SteadyState,
            ScenarioId::BearingDropout,
            ScenarioId::Churn,
            ScenarioId::FeedOutage,
            ScenarioId::HiddenTab,
            ScenarioId::LabelStorm,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SteadyState => "steady_state",
            ScenarioId::BearingDropout => "bearing_dropout",
            ScenarioId::Churn => "churn",
            ScenarioId::FeedOutage => "feed_outage",
            ScenarioId::HiddenTab => "hidden_tab",
            ScenarioId::LabelStorm => "label_storm",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SteadyState => "Moving fleet with a few unrenderable records, registry tracks the feed",
            ScenarioId::BearingDropout => "Half the fleet reports bearing 0 or none, headings never regress",
            ScenarioId::Churn => "30% of vehicles replaced every poll, no stale markers or labels",
            ScenarioId::FeedOutage => "Outage, 503s and an HTML body mid-run, state survives and recovers",
            ScenarioId::HiddenTab => "View hidden for several periods, no fetches until it returns",
            ScenarioId::LabelStorm => "Random hover, click and background clicks, labels stay exclusive",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "steady_state" | "steadystate" | "lt-001" => Ok(ScenarioId::SteadyState),
            "bearing_dropout" | "bearingdropout" | "lt-002" => Ok(ScenarioId::BearingDropout),
            "churn" | "lt-003" => Ok(ScenarioId::Churn),
            "feed_outage" | "feedoutage" | "lt-004" => Ok(ScenarioId::FeedOutage),
            "hidden_tab" | "hiddentab" | "lt-005" => Ok(ScenarioId::HiddenTab),
            "label_storm" | "labelstorm" | "lt-006" => Ok(ScenarioId::LabelStorm),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
