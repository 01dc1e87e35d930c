use crate::dps::DpValue;
use crate::entity::{DynEntity, EntityState};
use crate::ha::values::{DeviceClass, StateClass};
use serde::Serialize;

const VALUE_TEMPLATE: &str = "{{ value_json.value }}";

#[derive(Serialize)]
pub struct HaSensorDiscovery<'a> {
    unique_id: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<DeviceClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_class: Option<StateClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'a str>,

    state_topic: &'a str,
    value_template: &'static str,
    availability_topic: &'a str,

    device: &'a Device<'a>,
}

impl<'a> HaSensorDiscovery<'a> {
    pub fn new(
        unique_id: &'a str,
        state_topic: &'a str,
        entity: &'a dyn DynEntity,
        availability_topic: &'a str,
        device: &'a Device<'a>,
    ) -> Self {
        HaSensorDiscovery {
            unique_id,
            name: entity.friendly_name(),
            device_class: entity.device_class(),
            state_class: entity.state_class(),
            unit_of_measurement: entity.unit_of_measurement(),
            state_topic,
            value_template: VALUE_TEMPLATE,
            availability_topic,
            device,
        }
    }
}

#[derive(Serialize)]
pub struct Device<'a> {
    pub name: &'a str,
    pub identifiers: &'a [&'a str],
    pub manufacturer: &'static str,
}

/// State payload read by [`VALUE_TEMPLATE`]. `null` renders as unknown.
#[derive(Serialize)]
pub struct StatePayload<'a> {
    value: Option<&'a DpValue>,
}

impl<'a> StatePayload<'a> {
    pub fn new(state: &'a EntityState) -> Self {
        StatePayload {
            value: state.value(),
        }
    }
}
