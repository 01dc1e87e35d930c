use crate::dps::{DpId, DpValue, Dps};
use crate::ha::values::{DeviceClass, StateClass};
use crate::utils::slug::make_slug;

/// Behavior of one kind of entity (sensor, switch, ...) on top of the shared
/// [`Entity`] record.
pub trait EntityKind: 'static {
    type Config: 'static;

    /// Derives the entity state from the raw value of its data point.
    fn status_updated(&self, config: &Self::Config, raw: &DpValue) -> DpValue;

    fn state_class(&self, _config: &Self::Config, _dp_id: DpId) -> Option<StateClass> {
        None
    }

    fn device_class(&self, _config: &Self::Config) -> Option<DeviceClass> {
        None
    }

    fn unit_of_measurement<'a>(&self, _config: &'a Self::Config) -> Option<&'a str> {
        None
    }

    /// Called after (re)connecting to the broker with the last known state.
    fn restore_state_when_connected(&self, _state: &mut EntityState) {}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum EntityState {
    #[default]
    Unknown,
    Value(DpValue),
}

impl EntityState {
    pub fn value(&self) -> Option<&DpValue> {
        match self {
            EntityState::Unknown => None,
            EntityState::Value(value) => Some(value),
        }
    }
}

/// Where an entity lives: the device it belongs to and the data point it reads.
#[derive(Clone, Debug)]
pub struct EntityIdentity {
    pub device_id: String,
    pub dp_id: DpId,
    pub friendly_name: String,
}

pub struct Entity<K: EntityKind> {
    kind: K,
    identity: EntityIdentity,
    config: K::Config,
    state: EntityState,
}

impl<K: EntityKind> Entity<K> {
    pub fn new(kind: K, identity: EntityIdentity, config: K::Config) -> Self {
        Entity {
            kind,
            identity,
            config,
            state: EntityState::Unknown,
        }
    }
}

/// Object-safe view of an [`Entity`] so devices can hold entities of any kind.
pub trait DynEntity {
    fn unique_id(&self) -> String;
    fn dp_id(&self) -> DpId;
    fn friendly_name(&self) -> &str;
    fn state(&self) -> &EntityState;
    fn state_class(&self) -> Option<StateClass>;
    fn device_class(&self) -> Option<DeviceClass>;
    fn unit_of_measurement(&self) -> Option<&str>;

    /// Applies a status update. Returns whether the update carried this entity's
    /// data point.
    fn status_updated(&mut self, dps: &Dps) -> bool;

    fn restore_state_when_connected(&mut self);
}

impl<K: EntityKind> DynEntity for Entity<K> {
    fn unique_id(&self) -> String {
        let EntityIdentity {
            device_id, dp_id, ..
        } = &self.identity;
        format!("local_{}_{dp_id}", make_slug(device_id))
    }

    fn dp_id(&self) -> DpId {
        self.identity.dp_id
    }

    fn friendly_name(&self) -> &str {
        &self.identity.friendly_name
    }

    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_class(&self) -> Option<StateClass> {
        self.kind.state_class(&self.config, self.identity.dp_id)
    }

    fn device_class(&self) -> Option<DeviceClass> {
        self.kind.device_class(&self.config)
    }

    fn unit_of_measurement(&self) -> Option<&str> {
        self.kind.unit_of_measurement(&self.config)
    }

    fn status_updated(&mut self, dps: &Dps) -> bool {
        let Some(raw) = dps.get(self.identity.dp_id) else {
            return false;
        };
        self.state = EntityState::Value(self.kind.status_updated(&self.config, raw));
        true
    }

    fn restore_state_when_connected(&mut self) {
        self.kind.restore_state_when_connected(&mut self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::{DynEntity, Entity, EntityIdentity, EntityKind, EntityState};
    use crate::dps::{DpValue, Dps};

    /// Mirrors the raw value.
    struct Passthrough;

    /// Forgets its state whenever the broker connection is re-established.
    struct Momentary;

    impl EntityKind for Momentary {
        type Config = ();

        fn status_updated(&self, _config: &(), raw: &DpValue) -> DpValue {
            raw.clone()
        }

        fn restore_state_when_connected(&self, state: &mut EntityState) {
            *state = EntityState::Unknown;
        }
    }

    impl EntityKind for Passthrough {
        type Config = ();

        fn status_updated(&self, _config: &(), raw: &DpValue) -> DpValue {
            raw.clone()
        }
    }

    fn entity() -> Entity<Passthrough> {
        let identity = EntityIdentity {
            device_id: "bf12-AB".to_owned(),
            dp_id: 4,
            friendly_name: "Switch".to_owned(),
        };
        Entity::new(Passthrough, identity, ())
    }

    #[test]
    fn test_status_updated() {
        let mut entity = entity();
        assert_eq!(entity.state(), &EntityState::Unknown);

        let dps: Dps = [(1, DpValue::Int(3))].into_iter().collect();
        assert!(!entity.status_updated(&dps));
        assert_eq!(entity.state(), &EntityState::Unknown);

        let dps: Dps = [(4, DpValue::Bool(true))].into_iter().collect();
        assert!(entity.status_updated(&dps));
        assert_eq!(entity.state().value(), Some(&DpValue::Bool(true)));
    }

    #[test]
    fn test_restore_hook_is_dispatched() {
        let identity = EntityIdentity {
            device_id: "bf12".to_owned(),
            dp_id: 7,
            friendly_name: "Button".to_owned(),
        };
        let mut entity = Entity::new(Momentary, identity, ());
        let dps: Dps = [(7, DpValue::String("click".to_owned()))].into_iter().collect();
        entity.status_updated(&dps);
        entity.restore_state_when_connected();
        assert_eq!(entity.state(), &EntityState::Unknown);
    }

    #[test]
    fn test_default_restore_keeps_state() {
        let mut entity = entity();
        let dps: Dps = [(4, DpValue::Bool(false))].into_iter().collect();
        entity.status_updated(&dps);
        entity.restore_state_when_connected();
        assert_eq!(entity.state(), &EntityState::Value(DpValue::Bool(false)));
    }

    #[test]
    fn test_defaults() {
        let entity = entity();
        assert_eq!(entity.unique_id(), "local_bf12_ab_4");
        assert_eq!(entity.friendly_name(), "Switch");
        assert_eq!(entity.state_class(), None);
        assert_eq!(entity.device_class(), None);
        assert_eq!(entity.unit_of_measurement(), None);
    }
}
