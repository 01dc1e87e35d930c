use crate::dps::DpId;
use serde::Deserialize;
use std::num::NonZeroU64;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: Daemon,
    pub mqtt: Mqtt,
    /// The Tuya devices to expose.
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Deserialize)]
pub struct Daemon {
    /// Interval in seconds between availability messages, must not be 0. (Default: 60)
    #[serde(default = "Daemon::default_availability_interval")]
    pub availability_interval: NonZeroU64,
}

impl Daemon {
    fn default_availability_interval() -> NonZeroU64 {
        const DEFAULT: NonZeroU64 = NonZeroU64::new(60).unwrap();
        DEFAULT
    }
}

impl Default for Daemon {
    fn default() -> Self {
        Daemon {
            availability_interval: Self::default_availability_interval(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Mqtt {
    /// The hostname or IP address of the MQTT broker to connect to. (Default: localhost)
    #[serde(default = "Mqtt::default_hostname")]
    pub hostname: String,
    /// The TCP port the MQTT broker is listening on. (Default: 1883)
    #[serde(default = "Mqtt::default_port")]
    pub port: u16,
    /// Client identifier presented to the broker. (Default: tuya-dp-sensor)
    #[serde(default = "Mqtt::default_client_id")]
    pub client_id: String,
    /// Maximum period in seconds between ping messages to the broker. (Default: 60)
    #[serde(default = "Mqtt::default_keep_alive")]
    pub keep_alive: u64,
    /// Enable TLS/SSL on the connection. (Default: false)
    #[serde(default)]
    pub tls: bool,
    /// Path to CA certificate file to verify host.
    pub tls_ca_cert: Option<PathBuf>,

    /// The MQTT broker authentication credentials. (Default: no authentication)
    pub username: Option<String>,
    /// The MQTT broker authentication credentials. (Default: no authentication)
    pub password: Option<String>,

    /// Discovery prefix Home Assistant listens on. (Default: homeassistant)
    #[serde(default = "Mqtt::default_discovery_prefix")]
    pub discovery_prefix: String,
    /// The MQTT base topic under which entity states are published. (Default: tuya)
    ///
    /// Note: the state topic of an entity is `{base_topic}/{device}/{dp_id}`.
    #[serde(default = "Mqtt::default_base_topic")]
    pub base_topic: String,
}

impl Mqtt {
    fn default_hostname() -> String {
        "localhost".to_owned()
    }
    fn default_port() -> u16 {
        1883
    }
    fn default_client_id() -> String {
        "tuya-dp-sensor".to_owned()
    }
    fn default_keep_alive() -> u64 {
        60
    }
    fn default_discovery_prefix() -> String {
        "homeassistant".to_owned()
    }
    fn default_base_topic() -> String {
        "tuya".to_owned()
    }
}

#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    /// Tuya device id.
    pub id: String,
    /// Device name shown in Home Assistant. (Default: the device id)
    pub name: Option<String>,
    /// Topic the device client publishes data point maps to.
    /// (Default: `{base_topic}/{device}/dps`)
    pub dps_topic: Option<String>,
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityConfig>,
}

#[derive(Debug, Deserialize)]
pub struct EntityConfig {
    /// Entity platform, e.g. `sensor`.
    pub platform: String,
    /// Data point the entity reads.
    pub id: DpId,
    pub friendly_name: String,
    /// Platform specific options, validated against the platform schema.
    #[serde(flatten)]
    pub options: toml::Table,
}
