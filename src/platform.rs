use crate::config::DeviceConfig;
use crate::dps::DpId;
use crate::entity::{DynEntity, EntityIdentity};
use crate::schema::{self, SchemaField, ValidatedOptions};
use anyhow::{Context, Error, bail, ensure};
use std::collections::{HashMap, HashSet};

/// Returns the options a platform accepts, given the data points the device exposes.
pub type FlowSchemaFn = fn(&[DpId]) -> Vec<SchemaField>;

pub type EntityFactory =
    fn(EntityIdentity, &ValidatedOptions) -> Result<Box<dyn DynEntity>, Error>;

/// An entity platform, registered explicitly at startup.
pub struct Platform {
    pub domain: &'static str,
    pub flow_schema: FlowSchemaFn,
    pub factory: EntityFactory,
}

#[derive(Default)]
pub struct Platforms {
    by_domain: HashMap<&'static str, Platform>,
}

impl Platforms {
    pub fn register(&mut self, platform: Platform) -> Result<(), Error> {
        let domain = platform.domain;
        ensure!(
            !self.by_domain.contains_key(domain),
            "Platform {domain} is already registered"
        );
        self.by_domain.insert(domain, platform);
        Ok(())
    }

    /// Builds the entities configured for a device.
    pub fn setup_entry(&self, device: &DeviceConfig) -> Result<Vec<Box<dyn DynEntity>>, Error> {
        let dps: Vec<DpId> = device.entities.iter().map(|entity| entity.id).collect();
        let mut seen = HashSet::new();
        device
            .entities
            .iter()
            .map(|entity| -> Result<Box<dyn DynEntity>, Error> {
                let dp_id = entity.id;
                if !seen.insert(dp_id) {
                    bail!("Data point {dp_id} is configured more than once");
                }
                let Some(platform) = self.by_domain.get(entity.platform.as_str()) else {
                    bail!("Unsupported platform {}", entity.platform);
                };
                let fields = (platform.flow_schema)(&dps);
                let options = schema::validate(&fields, &entity.options)
                    .with_context(|| format!("Invalid options for data point {dp_id}"))?;
                let identity = EntityIdentity {
                    device_id: device.id.clone(),
                    dp_id,
                    friendly_name: entity.friendly_name.clone(),
                };
                (platform.factory)(identity, &options)
                    .with_context(|| format!("Failed to create entity for data point {dp_id}"))
            })
            .collect::<Result<_, _>>()
            .with_context(|| format!("Failed to set up device {}", device.id))
    }
}
