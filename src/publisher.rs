use crate::devices::TuyaDevice;
use crate::entity::DynEntity;
use crate::ha::discovery::{Device, HaSensorDiscovery, StatePayload};
use anyhow::{Context, Error};
use log::{debug, error};
use rumqttc::{AsyncClient, QoS};

const MANUFACTURER: &str = "Tuya";

pub struct Publisher<'a> {
    pub client: &'a AsyncClient,
    pub discovery_prefix: &'a str,
    pub availability_topic: &'a str,
}

impl<'a> Publisher<'a> {
    pub async fn publish_discovery(&self, device: &TuyaDevice) -> Result<(), Error> {
        let identifiers = [device.id.as_str()];
        let ha_device = Device {
            name: &device.name,
            identifiers: &identifiers,
            manufacturer: MANUFACTURER,
        };
        for entity in &device.entities {
            let (topic, payload) = discovery_message(
                self.discovery_prefix,
                self.availability_topic,
                device,
                entity.as_ref(),
                &ha_device,
            )?;
            debug!("Publishing {} to {}", payload, topic);
            self.client
                .publish(topic, QoS::AtLeastOnce, true, payload)
                .await
                .with_context(|| {
                    format!("Failed to publish discovery for {}", entity.unique_id())
                })?;
        }
        Ok(())
    }

    /// Publishes the state of every entity of the device.
    pub async fn publish_states(&self, device: &TuyaDevice) {
        for entity in &device.entities {
            self.publish_state(device, entity.as_ref()).await;
        }
    }

    pub async fn publish_state(&self, device: &TuyaDevice, entity: &dyn DynEntity) {
        if let Err(e) = self.publish_state_inner(device, entity).await {
            error!("Failed to publish state for {}: {e:#}", entity.unique_id());
        }
    }

    async fn publish_state_inner(
        &self,
        device: &TuyaDevice,
        entity: &dyn DynEntity,
    ) -> Result<(), Error> {
        let topic = device.state_topic(entity.dp_id());
        let payload = serde_json::to_string(&StatePayload::new(entity.state()))
            .context("Failed to serialize state")?;
        debug!("Publishing {} to {}", payload, topic);
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .context("Failed to publish state")?;
        Ok(())
    }
}

fn discovery_message(
    discovery_prefix: &str,
    availability_topic: &str,
    device: &TuyaDevice,
    entity: &dyn DynEntity,
    ha_device: &Device<'_>,
) -> Result<(String, String), Error> {
    let unique_id = entity.unique_id();
    let topic = format!("{discovery_prefix}/sensor/{unique_id}/config");
    let state_topic = device.state_topic(entity.dp_id());
    let discovery = HaSensorDiscovery::new(
        &unique_id,
        &state_topic,
        entity,
        availability_topic,
        ha_device,
    );
    let payload = serde_json::to_string(&discovery).context("Failed to serialize discovery")?;
    Ok((topic, payload))
}
