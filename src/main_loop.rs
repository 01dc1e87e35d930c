use crate::config::{Config, Mqtt};
use crate::devices::{TuyaDevice, create_devices};
use crate::dps::parse_dps;
use crate::platform::Platforms;
use crate::publisher::Publisher;
use anyhow::{Context as _, Error, anyhow, bail};
use futures_util::TryFutureExt;
use log::{debug, info, warn};
use rumqttc::{AsyncClient, Event, Incoming, LastWill, MqttOptions, Outgoing, QoS};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::{
    Notify,
    mpsc::{self, error::TrySendError},
    oneshot::Receiver,
};
use tokio::time::{MissedTickBehavior, interval};

const ONLINE: &str = "online";
const OFFLINE: &str = "offline";

struct IncomingMessage {
    topic: String,
    payload: Vec<u8>,
}

pub struct MainLoop {
    config: Config,
    devices: Vec<TuyaDevice>,
    availability_topic: String,
    options: MqttOptions,
}

impl MainLoop {
    pub fn new(config: Config, platforms: &Platforms) -> Result<Self, Error> {
        let devices = create_devices(&config, platforms)?;
        let entity_count: usize = devices.iter().map(|device| device.entities.len()).sum();
        info!("Loaded {} devices with {entity_count} entities", devices.len());
        let availability_topic = format!("{}/availability", config.mqtt.base_topic);
        let options = build_mqtt_options(&config.mqtt, &availability_topic)?;
        Ok(Self {
            config,
            devices,
            availability_topic,
            options,
        })
    }

    pub async fn run(&mut self, stop: Receiver<()>) -> Result<(), Error> {
        let Self {
            config,
            devices,
            availability_topic,
            options,
        } = self;
        let availability_topic = availability_topic.as_str();
        let (client, mut event_loop) = AsyncClient::new(options.clone(), 10);
        let connected = Arc::new(Notify::new());
        let (message_sender, mut message_receiver) = mpsc::channel(8);
        let mut event_loop = tokio::spawn({
            let connected = connected.clone();
            async move {
                loop {
                    let event = event_loop
                        .poll()
                        .await
                        .context("Failed to poll event loop")?;
                    if !forward_event(event, &connected, &message_sender) {
                        break;
                    }
                }
                Ok::<_, Error>(())
            }
        })
        .unwrap_or_else(|e| Err(e).context("Failed to join event loop"));

        let publisher = Publisher {
            client: &client,
            discovery_prefix: &config.mqtt.discovery_prefix,
            availability_topic,
        };

        let handling_events = async {
            loop {
                select! {
                    biased;
                    _ = connected.notified() => {
                        on_connected(&client, &publisher, devices, availability_topic)
                            .await
                            .context("Failed to set up connection")?;
                    }
                    message = message_receiver.recv() => {
                        let Some(IncomingMessage { topic, payload }) = message else {
                            bail!("Message channel closed");
                        };
                        handle_message(&publisher, devices, &topic, &payload).await;
                    }
                }
            }
            #[allow(unreachable_code)]
            Ok::<_, Error>(())
        };

        let sending_availability = async {
            let mut interval =
                interval(Duration::from_secs(config.daemon.availability_interval.get()));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let publishing_online = async {
                loop {
                    interval.tick().await;
                    debug!("Sending online message");
                    if let Err(e) = client
                        .publish(availability_topic, QoS::AtLeastOnce, false, ONLINE)
                        .await
                    {
                        break anyhow!(e).context("Failed to publish online");
                    }
                }
            };
            select! {
                e = publishing_online => return Err(e),
                s = stop => s.context("Failed to receive stop signal")?,
            }
            info!("Stopping...");
            client
                .publish(availability_topic, QoS::AtLeastOnce, false, OFFLINE)
                .await
                .context("Failed to publish availability")?;
            client.disconnect().await.context("Failed to disconnect")?;
            Ok::<(), Error>(())
        };

        select! {
            r = &mut event_loop => r.context("Event loop")?,
            r = sending_availability => r.context("Sending availability")?,
            r = handling_events => r.context("Handling events")?,
        };
        event_loop.await
    }
}

/// Hands an event over to the handling side without waiting on it.
///
/// Connection acknowledgements are coalesced: any number of reconnects while
/// the handler is busy result in a single resynchronization. Returns `false`
/// once the client disconnected.
fn forward_event(
    event: Event,
    connected: &Notify,
    messages: &mpsc::Sender<IncomingMessage>,
) -> bool {
    match event {
        Event::Incoming(Incoming::ConnAck(_)) => connected.notify_one(),
        Event::Incoming(Incoming::Publish(publish)) => {
            let message = IncomingMessage {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
            };
            match messages.try_send(message) {
                Ok(_) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Dropping message due to full channel");
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("Dropping message due to closed channel")
                }
            }
        }
        Event::Outgoing(Outgoing::Disconnect) => return false,
        _ => {}
    }
    true
}

async fn on_connected(
    client: &AsyncClient,
    publisher: &Publisher<'_>,
    devices: &mut [TuyaDevice],
    availability_topic: &str,
) -> Result<(), Error> {
    info!("Connected to broker");
    for device in devices.iter() {
        debug!("Subscribing to {}", device.dps_topic);
        client
            .subscribe(device.dps_topic.as_str(), QoS::AtLeastOnce)
            .await
            .with_context(|| format!("Failed to subscribe to {}", device.dps_topic))?;
    }

    info!("Publishing discovery...");
    for device in devices.iter_mut() {
        device.restore_state_when_connected();
        publisher
            .publish_discovery(device)
            .await
            .with_context(|| format!("Failed to publish discovery for device {}", device.id))?;
    }
    client
        .publish(availability_topic, QoS::AtLeastOnce, false, ONLINE)
        .await
        .context("Failed to publish online")?;
    for device in devices.iter() {
        publisher.publish_states(device).await;
    }
    Ok(())
}

async fn handle_message(
    publisher: &Publisher<'_>,
    devices: &mut [TuyaDevice],
    topic: &str,
    payload: &[u8],
) {
    let Some(device) = devices.iter_mut().find(|device| device.dps_topic == topic) else {
        warn!("Received message on unknown topic {topic}");
        return;
    };
    let dps = match parse_dps(payload) {
        Ok(dps) => dps,
        Err(e) => {
            warn!("Ignoring status of device {}: {e:#}", device.id);
            return;
        }
    };
    if dps.is_empty() {
        debug!("Device {} reported no usable data points", device.id);
        return;
    }
    debug!("Device {} reported {} data points", device.id, dps.len());
    for index in device.status_updated(&dps) {
        publisher
            .publish_state(device, device.entities[index].as_ref())
            .await;
    }
}

fn build_mqtt_options(config: &Mqtt, availability_topic: &str) -> Result<MqttOptions, Error> {
    use rumqttc::Transport;

    let mut options = MqttOptions::new(&config.client_id, &config.hostname, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive));
    options.set_last_will(LastWill::new(
        availability_topic,
        OFFLINE,
        QoS::AtLeastOnce,
        false,
    ));
    if config.tls {
        options.set_transport(match &config.tls_ca_cert {
            Some(path) => {
                let ca = fs::read(path).context("Could not read CA certificate file")?;
                Transport::tls(ca, None, None)
            }
            None => Transport::tls_with_default_config(),
        });
    }
    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.as_deref().unwrap_or(""));
    }
    Ok(options)
}
