//! Thin typed façades over [`DataStore`], decoupling call sites from
//! the underlying key layout. This module ships one worked example;
//! additional accessors for other domains are a consumer concern.

use crate::store::{DataStore, ExpirationPolicy};
use crate::value::CellValue;
use vantage_common::error::CoreError;

const KEY_JOINT_TEMPERATURE: &str = "robot_state.joint_temperature_c";
const KEY_BATTERY_LEVEL: &str = "robot_state.battery_level_pct";
const KEY_ESTOP_ENGAGED: &str = "robot_state.estop_engaged";

/// A compile-time-validated view of robot-state keys over a
/// non-owning [`DataStore`] reference.
pub struct RobotStateAccessor<'a> {
    store: &'a DataStore,
}

impl<'a> RobotStateAccessor<'a> {
    pub fn new(store: &'a DataStore) -> Self {
        Self { store }
    }

    pub fn set_joint_temperature(&self, celsius: f64) -> Result<(), CoreError> {
        self.store
            .set(KEY_JOINT_TEMPERATURE, CellValue::from(celsius), ExpirationPolicy::Never)
    }

    pub fn joint_temperature(&self) -> Result<f64, CoreError> {
        let versioned = self.store.get(KEY_JOINT_TEMPERATURE)?;
        versioned.value.as_f64().ok_or_else(|| CoreError::TypeMismatch {
            key: KEY_JOINT_TEMPERATURE.to_string(),
            expected: "f64",
            found: versioned.value.kind(),
        })
    }

    pub fn set_battery_level(&self, pct: f64) -> Result<(), CoreError> {
        self.store
            .set(KEY_BATTERY_LEVEL, CellValue::from(pct), ExpirationPolicy::Never)
    }

    pub fn battery_level(&self) -> Option<f64> {
        self.store.poll(KEY_BATTERY_LEVEL).and_then(|v| v.value.as_f64())
    }

    pub fn set_estop_engaged(&self, engaged: bool) -> Result<(), CoreError> {
        self.store
            .set(KEY_ESTOP_ENGAGED, CellValue::from(engaged), ExpirationPolicy::Never)
    }

    pub fn estop_engaged(&self) -> bool {
        self.store
            .poll(KEY_ESTOP_ENGAGED)
            .and_then(|v| v.value.as_bool())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_temperature_round_trips() {
        let store = DataStore::new();
        let accessor = RobotStateAccessor::new(&store);
        accessor.set_joint_temperature(42.5).unwrap();
        assert_eq!(accessor.joint_temperature().unwrap(), 42.5);
    }

    #[test]
    fn estop_defaults_to_false_when_unset() {
        let store = DataStore::new();
        let accessor = RobotStateAccessor::new(&store);
        assert!(!accessor.estop_engaged());
    }

    #[test]
    fn battery_level_is_none_until_written() {
        let store = DataStore::new();
        let accessor = RobotStateAccessor::new(&store);
        assert_eq!(accessor.battery_level(), None);
        accessor.set_battery_level(88.0).unwrap();
        assert_eq!(accessor.battery_level(), Some(88.0));
    }
}
