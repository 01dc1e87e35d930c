use crate::config::{Config, DeviceConfig};
use crate::dps::{DpId, Dps};
use crate::entity::DynEntity;
use crate::platform::Platforms;
use crate::utils::slug::make_slug;
use anyhow::{Error, bail, ensure};
use std::collections::{HashMap, HashSet};

/// A configured device with its entities and MQTT topics.
pub struct TuyaDevice {
    pub id: String,
    pub name: String,
    pub dps_topic: String,
    state_topic_base: String,
    pub entities: Vec<Box<dyn DynEntity>>,
}

impl TuyaDevice {
    pub fn new(
        base_topic: &str,
        config: &DeviceConfig,
        entities: Vec<Box<dyn DynEntity>>,
    ) -> Self {
        let state_topic_base = format!("{base_topic}/{}", make_slug(&config.id));
        let dps_topic = match &config.dps_topic {
            Some(topic) => topic.clone(),
            None => format!("{state_topic_base}/dps"),
        };
        TuyaDevice {
            id: config.id.clone(),
            name: config.name.clone().unwrap_or_else(|| config.id.clone()),
            dps_topic,
            state_topic_base,
            entities,
        }
    }

    pub fn state_topic(&self, dp_id: DpId) -> String {
        format!("{}/{dp_id}", self.state_topic_base)
    }

    /// Feeds a status update to every entity, returning the indices of the
    /// entities whose state was updated.
    pub fn status_updated(&mut self, dps: &Dps) -> Vec<usize> {
        self.entities
            .iter_mut()
            .enumerate()
            .filter_map(|(index, entity)| entity.status_updated(dps).then_some(index))
            .collect()
    }

    pub fn restore_state_when_connected(&mut self) {
        for entity in &mut self.entities {
            entity.restore_state_when_connected();
        }
    }
}

pub fn create_devices(config: &Config, platforms: &Platforms) -> Result<Vec<TuyaDevice>, Error> {
    let mut dps_topics = HashSet::new();
    let mut slugs = HashMap::new();
    config
        .devices
        .iter()
        .map(|device_config| -> Result<TuyaDevice, Error> {
            // Unique ids and state topics are derived from the slug.
            let slug = make_slug(&device_config.id);
            if let Some(other) = slugs.insert(slug.clone(), device_config.id.as_str()) {
                bail!(
                    "Devices {other} and {} map to the same slug {slug}",
                    device_config.id
                );
            }
            let entities = platforms.setup_entry(device_config)?;
            let device = TuyaDevice::new(&config.mqtt.base_topic, device_config, entities);
            ensure!(
                dps_topics.insert(device.dps_topic.clone()),
                "Data point topic {} is shared by more than one device",
                device.dps_topic
            );
            Ok(device)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::create_devices;
    use crate::config::Config;
    use crate::dps::{DpValue, Dps};
    use crate::entity::EntityState;
    use crate::platform::Platforms;
    use crate::sensor;

    fn platforms() -> Platforms {
        let mut platforms = Platforms::default();
        platforms.register(sensor::platform()).unwrap();
        platforms
    }

    #[test]
    fn test_create_devices() {
        let config: Config = toml::from_str(include_str!("assets/config_1.toml")).unwrap();
        let mut devices = create_devices(&config, &platforms()).unwrap();
        assert_eq!(devices.len(), 1);

        let device = &mut devices[0];
        assert_eq!(device.name, "Energy meter");
        assert_eq!(device.dps_topic, "tuya/bf3a7c09e1f2d4c5b6xyzq/dps");
        assert_eq!(device.state_topic(20), "tuya/bf3a7c09e1f2d4c5b6xyzq/20");

        let dps: Dps = [
            (1, DpValue::Int(123_456)),
            (20, DpValue::Int(2_301)),
            (38, DpValue::String("on".to_owned())),
        ]
        .into_iter()
        .collect();
        assert_eq!(device.status_updated(&dps), vec![0, 1]);
        assert_eq!(
            device.entities[0].state(),
            &EntityState::Value(DpValue::Float(1234.56))
        );
        assert_eq!(
            device.entities[1].state(),
            &EntityState::Value(DpValue::Float(230.1))
        );
        assert_eq!(device.entities[2].state(), &EntityState::Unknown);

        device.restore_state_when_connected();
        assert_eq!(
            device.entities[0].state(),
            &EntityState::Value(DpValue::Float(1234.56))
        );
        assert_eq!(device.entities[2].state(), &EntityState::Unknown);
    }

    #[test]
    fn test_shared_dps_topic() {
        let config: Config = toml::from_str(
            r#"
            [mqtt]

            [[device]]
            id = "a"
            dps_topic = "tuya/shared"

            [[device]]
            id = "b"
            dps_topic = "tuya/shared"
            "#,
        )
        .unwrap();
        let err = create_devices(&config, &platforms()).err().unwrap();
        assert_eq!(
            err.to_string(),
            "Data point topic tuya/shared is shared by more than one device"
        );
    }

    #[test]
    fn test_colliding_device_slugs() {
        let config: Config = toml::from_str(
            r#"
            [mqtt]

            [[device]]
            id = "A-1"
            dps_topic = "tuya/upper/dps"

            [[device]]
            id = "a_1"
            dps_topic = "tuya/lower/dps"
            "#,
        )
        .unwrap();
        let err = create_devices(&config, &platforms()).err().unwrap();
        assert_eq!(
            err.to_string(),
            "Devices A-1 and a_1 map to the same slug a_1"
        );
    }
}
