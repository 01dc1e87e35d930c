//! Presents any Tuya data point as a read-only sensor.

use crate::dps::{DpId, DpValue};
use crate::entity::{DynEntity, Entity, EntityIdentity, EntityKind, EntityState};
use crate::ha::values::{DeviceClass, StateClass};
use crate::platform::Platform;
use crate::schema::{FieldKind, SchemaField, ValidatedOptions};
use crate::transform::{classify, compute_display};
use anyhow::{Context, Error};
use strum::VariantNames;

pub const DOMAIN: &str = "sensor";

const CONF_UNIT_OF_MEASUREMENT: &str = "unit_of_measurement";
const CONF_DEVICE_CLASS: &str = "device_class";
const CONF_SCALING: &str = "scaling";

pub fn platform() -> Platform {
    Platform {
        domain: DOMAIN,
        flow_schema,
        factory: create_entity,
    }
}

/// Options a sensor entity accepts. Sensors do not depend on the other data points.
pub fn flow_schema(_dps: &[DpId]) -> Vec<SchemaField> {
    vec![
        SchemaField {
            key: CONF_UNIT_OF_MEASUREMENT,
            kind: FieldKind::Text,
        },
        SchemaField {
            key: CONF_DEVICE_CLASS,
            kind: FieldKind::OneOf(DeviceClass::VARIANTS),
        },
        SchemaField {
            key: CONF_SCALING,
            kind: FieldKind::Float {
                min: -1_000_000.0,
                max: 1_000_000.0,
            },
        },
    ]
}

#[derive(Debug, Default, PartialEq)]
pub struct SensorConfig {
    pub device_class: Option<DeviceClass>,
    pub unit_of_measurement: Option<String>,
    pub scaling: Option<f64>,
}

impl SensorConfig {
    pub fn from_options(options: &ValidatedOptions) -> Result<Self, Error> {
        let device_class = options
            .text(CONF_DEVICE_CLASS)
            .map(str::parse::<DeviceClass>)
            .transpose()
            .context("Invalid device class")?;
        Ok(SensorConfig {
            device_class,
            unit_of_measurement: options.text(CONF_UNIT_OF_MEASUREMENT).map(str::to_owned),
            scaling: options.float(CONF_SCALING),
        })
    }
}

pub struct SensorKind;

impl EntityKind for SensorKind {
    type Config = SensorConfig;

    fn status_updated(&self, config: &SensorConfig, raw: &DpValue) -> DpValue {
        compute_display(raw, config.scaling)
    }

    fn state_class(&self, config: &SensorConfig, dp_id: DpId) -> Option<StateClass> {
        classify(config.device_class, dp_id)
    }

    fn device_class(&self, config: &SensorConfig) -> Option<DeviceClass> {
        config.device_class
    }

    fn unit_of_measurement<'a>(&self, config: &'a SensorConfig) -> Option<&'a str> {
        config.unit_of_measurement.as_deref()
    }

    // Nothing to restore for a sensor.
    fn restore_state_when_connected(&self, _state: &mut EntityState) {}
}

fn create_entity(
    identity: EntityIdentity,
    options: &ValidatedOptions,
) -> Result<Box<dyn DynEntity>, Error> {
    let config = SensorConfig::from_options(options)?;
    Ok(Box::new(Entity::new(SensorKind, identity, config)))
}
