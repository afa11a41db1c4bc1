use serde::Deserialize;

use crate::{Error, Result};

/// OAuth application credentials for the Uplink API.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub writeaccess: bool,
}

impl Credentials {
    /// OAuth scopes implied by the write-access flag.
    pub fn scope(&self) -> &'static str {
        if self.writeaccess {
            "READSYSTEM WRITESYSTEM"
        } else {
            "READSYSTEM"
        }
    }
}

/// One configurable sub-scope within a system. Absence of an optional
/// field disables that facet entirely, which is not the same thing as an
/// empty list (an empty `categories` list means "load all categories").
#[derive(Debug, Clone, Deserialize)]
pub struct UnitConfig {
    pub unit: i64,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub statuses: Option<Vec<String>>,
    #[serde(default)]
    pub sensors: Option<Vec<i64>>,
    #[serde(default)]
    pub climates: Option<Vec<i64>>,
    #[serde(default)]
    pub switches: Option<Vec<i64>>,
}

/// One vendor installation to load.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    pub system: i64,
    #[serde(default)]
    pub units: Vec<UnitConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub systems: Vec<SystemConfig>,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// System ids must be strictly positive; unit ids only need to be
    /// non-negative, since unit 0 is the master unit of an installation.
    pub fn validate(&self) -> Result<()> {
        for system in &self.systems {
            if system.system <= 0 {
                return Err(Error::Config(format!(
                    "system id must be positive, got {}",
                    system.system
                )));
            }
            for unit in &system.units {
                if unit.unit < 0 {
                    return Err(Error::Config(format!(
                        "unit id must not be negative, got {} in system {}",
                        unit.unit, system.system
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = Config::from_json(
            r#"{
                "credentials": {
                    "client_id": "id",
                    "client_secret": "secret",
                    "redirect_uri": "http://localhost:8123/api/nibe/auth",
                    "writeaccess": true
                },
                "systems": [{
                    "system": 12345,
                    "units": [{
                        "unit": 0,
                        "categories": ["SYSTEM_1", "40"],
                        "statuses": [],
                        "sensors": [40004, 40067]
                    }]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(config.credentials.scope(), "READSYSTEM WRITESYSTEM");
        assert_eq!(config.systems.len(), 1);
        let unit = &config.systems[0].units[0];
        assert_eq!(unit.categories.as_deref(), Some(&["SYSTEM_1".to_string(), "40".to_string()][..]));
        assert_eq!(unit.statuses.as_deref(), Some(&[][..]));
        assert!(unit.climates.is_none());
        assert!(unit.switches.is_none());
    }

    #[test]
    fn absent_facet_stays_disabled() {
        let config = Config::from_json(r#"{"systems": [{"system": 1, "units": [{"unit": 0}]}]}"#)
            .unwrap();
        let unit = &config.systems[0].units[0];
        assert!(unit.categories.is_none());
        assert!(unit.statuses.is_none());
        assert!(unit.sensors.is_none());
    }

    #[test]
    fn rejects_non_positive_system() {
        let err = Config::from_json(r#"{"systems": [{"system": 0}]}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "expected Config error, got {err:?}");
    }

    #[test]
    fn accepts_master_unit_but_rejects_negative() {
        Config::from_json(r#"{"systems": [{"system": 1, "units": [{"unit": 0}]}]}"#).unwrap();
        let err = Config::from_json(r#"{"systems": [{"system": 1, "units": [{"unit": -1}]}]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)), "expected Config error, got {err:?}");
    }

    #[test]
    fn readonly_scope_by_default() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.credentials.scope(), "READSYSTEM");
        assert!(config.systems.is_empty());
    }
}
