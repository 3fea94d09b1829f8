//! Database services managed by pgdb

use std::fmt;

/// Default graph database release installed by `pgdb install`.
pub const NEO4J_VERSION: &str = "5.21.0";

/// Default time-series database release installed by `pgdb install`.
pub const INFLUXDB_VERSION: &str = "1.8.9";

/// Database services that pgdb downloads, configures and supervises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// Neo4j graph database (manages its own lifecycle through `neo4j start|stop`)
    Neo4j,
    /// InfluxDB time-series database (launched directly, tracked by PID file)
    InfluxDb,
}

impl Component {
    /// Canonical directory name under the data directory
    pub fn dir_name(&self) -> &'static str {
        match self {
            Component::Neo4j => "neo4j",
            Component::InfluxDb => "influxdb",
        }
    }

    /// Prefix of the version-qualified top-level directory inside the archive
    pub fn extracted_prefix(&self) -> &'static str {
        match self {
            Component::Neo4j => "neo4j",
            Component::InfluxDb => "influxdb",
        }
    }

    /// Human readable product name
    pub fn display_name(&self) -> &'static str {
        match self {
            Component::Neo4j => "Neo4j",
            Component::InfluxDb => "InfluxDB",
        }
    }

    /// Release installed when no explicit version is requested
    pub fn default_version(&self) -> &'static str {
        match self {
            Component::Neo4j => NEO4J_VERSION,
            Component::InfluxDb => INFLUXDB_VERSION,
        }
    }

    /// All components, in start/stop order
    pub fn all() -> &'static [Component] {
        &[Component::Neo4j, Component::InfluxDb]
    }

    /// Parse a component from its directory name
    pub fn from_dir_name(s: &str) -> Option<Self> {
        match s {
            "neo4j" => Some(Component::Neo4j),
            "influxdb" => Some(Component::InfluxDb),
            _ => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_dir_names() {
        assert_eq!(Component::Neo4j.dir_name(), "neo4j");
        assert_eq!(Component::InfluxDb.dir_name(), "influxdb");
    }

    #[test]
    fn test_all_components_in_start_order() {
        assert_eq!(Component::all(), &[Component::Neo4j, Component::InfluxDb]);
    }

    #[test]
    fn test_component_from_dir_name() {
        assert_eq!(Component::from_dir_name("neo4j"), Some(Component::Neo4j));
        assert_eq!(
            Component::from_dir_name("influxdb"),
            Some(Component::InfluxDb)
        );
        assert_eq!(Component::from_dir_name("postgres"), None);
    }

    #[test]
    fn test_component_display() {
        assert_eq!(format!("{}", Component::Neo4j), "Neo4j");
        assert_eq!(format!("{}", Component::InfluxDb), "InfluxDB");
    }
}
