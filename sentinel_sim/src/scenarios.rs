//! Scenario catalogue.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Two objects whose ground tracks cross at different altitudes
    Crossing,

    /// Thermal goes into maintenance, then optical fails
    SensorOutage,

    /// 25-object formation with clutter and truncated radar rows
    Swarm,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![ScenarioId::Crossing, ScenarioId::SensorOutage, ScenarioId::Swarm]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Crossing => "crossing",
            ScenarioId::SensorOutage => "sensor_outage",
            ScenarioId::Swarm => "swarm",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Crossing => {
                "Two objects cross in plan view 20 units apart in altitude; \
                 fusion must keep them separate"
            }
            ScenarioId::SensorOutage => {
                "Thermal in maintenance for the middle third, optical in error for the last; \
                 tracks survive on the remaining sensors"
            }
            ScenarioId::Swarm => {
                "5x5 formation at 20-unit spacing with sub-threshold clutter \
                 and malformed radar rows"
            }
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = ScenarioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crossing" => Ok(ScenarioId::Crossing),
            "sensor_outage" | "sensoroutage" | "outage" => Ok(ScenarioId::SensorOutage),
            "swarm" => Ok(ScenarioId::Swarm),
            _ => Err(ScenarioParseError(s.to_string())),
        }
    }
}

/// Parse a `--scenario` value; `all` expands to every scenario.
pub fn parse_selection(s: &str) -> Result<Vec<ScenarioId>, ScenarioParseError> {
    if s.eq_ignore_ascii_case("all") {
        Ok(ScenarioId::all())
    } else {
        Ok(vec![s.parse()?])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scenario '{0}' (available: crossing, sensor_outage, swarm, all)")]
pub struct ScenarioParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for id in ScenarioId::all() {
            assert_eq!(id.name().parse::<ScenarioId>().unwrap(), id);
        }
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("ALL").unwrap().len(), 3);
        assert_eq!(parse_selection("Swarm").unwrap(), vec![ScenarioId::Swarm]);
        assert!(parse_selection("time_warp").is_err());
    }
}
