//! Entity references in `domain.object_id` form
//!
//! Sensors, presence trackers and actuators are all addressed by the same
//! kind of reference the telemetry source uses. The domain part also tells
//! the engine what kind of command an actuator understands.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid entity references
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity_id must contain exactly one '.' separator")]
    InvalidFormat,

    #[error("domain cannot be empty")]
    EmptyDomain,

    #[error("object_id cannot be empty")]
    EmptyObjectId,

    #[error("domain must be lowercase alphanumeric with single underscores")]
    InvalidDomainChars,

    #[error("object_id must be lowercase alphanumeric with underscores")]
    InvalidObjectIdChars,
}

/// Command family an actuator accepts, derived from its domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorClass {
    /// Speed-controlled fan: percentage steps or auto preset
    Fan,
    /// Plain relay: on when a fan stage is requested, off for auto
    Switch,
    /// Humidifier: on/off
    Humidifier,
    /// Light: used for alert flashes
    Light,
}

/// Reference to an entity (e.g., "sensor.kitchen_humidity", "fan.extractor")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    /// Create a new EntityId from domain and object_id parts
    pub fn new(
        domain: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Result<Self, EntityIdError> {
        let domain = domain.into();
        let object_id = object_id.into();

        if domain.is_empty() {
            return Err(EntityIdError::EmptyDomain);
        }
        if object_id.is_empty() {
            return Err(EntityIdError::EmptyObjectId);
        }
        if domain.contains("__") || !is_valid_slug(&domain) {
            return Err(EntityIdError::InvalidDomainChars);
        }
        if !is_valid_slug(&object_id) {
            return Err(EntityIdError::InvalidObjectIdChars);
        }

        Ok(Self { domain, object_id })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// The command family this entity accepts, if it is an actuator at all
    pub fn actuator_class(&self) -> Option<ActuatorClass> {
        match self.domain.as_str() {
            "fan" => Some(ActuatorClass::Fan),
            "switch" | "input_boolean" => Some(ActuatorClass::Switch),
            "humidifier" => Some(ActuatorClass::Humidifier),
            "light" => Some(ActuatorClass::Light),
            _ => None,
        }
    }

    /// Whether this entity can carry a ventilation stage
    pub fn is_ventilation(&self) -> bool {
        matches!(
            self.actuator_class(),
            Some(ActuatorClass::Fan | ActuatorClass::Switch)
        )
    }
}

/// Lowercase alphanumeric and underscores, not starting or ending with `_`
fn is_valid_slug(s: &str) -> bool {
    if s.starts_with('_') || s.ends_with('_') {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (domain, object_id) = s.split_once('.').ok_or(EntityIdError::InvalidFormat)?;
        if object_id.contains('.') {
            return Err(EntityIdError::InvalidFormat);
        }
        Self::new(domain, object_id)
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sensor_reference() {
        let id: EntityId = "sensor.kitchen_humidity".parse().unwrap();
        assert_eq!(id.domain(), "sensor");
        assert_eq!(id.object_id(), "kitchen_humidity");
        assert_eq!(id.actuator_class(), None);
    }

    #[test]
    fn test_actuator_classes() {
        let fan: EntityId = "fan.kitchen_extractor".parse().unwrap();
        let relay: EntityId = "switch.bathroom_fan".parse().unwrap();
        let humidifier: EntityId = "humidifier.bedroom".parse().unwrap();
        let light: EntityId = "light.hallway".parse().unwrap();

        assert_eq!(fan.actuator_class(), Some(ActuatorClass::Fan));
        assert_eq!(relay.actuator_class(), Some(ActuatorClass::Switch));
        assert_eq!(humidifier.actuator_class(), Some(ActuatorClass::Humidifier));
        assert_eq!(light.actuator_class(), Some(ActuatorClass::Light));
        assert!(fan.is_ventilation());
        assert!(relay.is_ventilation());
        assert!(!humidifier.is_ventilation());
    }

    #[test]
    fn test_invalid_references() {
        assert_eq!(
            "no_separator".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
        assert_eq!(
            "fan.too.many".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
        assert_eq!(
            ".extractor".parse::<EntityId>().unwrap_err(),
            EntityIdError::EmptyDomain
        );
        assert_eq!(
            "Fan.extractor".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidDomainChars
        );
        assert_eq!(
            "my__fan.extractor".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidDomainChars
        );
        assert_eq!(
            "fan._extractor".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidObjectIdChars
        );
    }

    #[test]
    fn test_serde_as_string() {
        let id = EntityId::new("humidifier", "landing").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"humidifier.landing\"");

        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert!(serde_json::from_str::<EntityId>("\"bad id\"").is_err());
    }
}
