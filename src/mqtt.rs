//! MQTT remote control
//!
//! Subscribes to one topic. Payloads are JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "state", "state": "thinking"}
//! {"type": "result", "text": "晴"}
//! {"type": "accel", "x": 0.1, "y": -0.4}
//! ```
//!
//! Anything that is not JSON is parsed as a socket-style command line.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use serde::Deserialize;

use crate::config::ControlConfig;
use crate::control::{parse_request, Command, Request};
use crate::error::{Error, Result};
use crate::forcing::SharedForcing;
use crate::state::DisplayState;

const CLIENT_ID: &str = "liquidclock";

/// JSON payload format
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Message {
    Gravity { x: f32, y: f32 },
    Restore { value: f32 },
    Shake { value: f32 },
    Accel { x: f32, y: f32 },
    State { state: DisplayState },
    Result { text: String },
    Quit,
}

impl From<Message> for Request {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Gravity { x, y } => Request::Gravity(x, y),
            Message::Restore { value } => Request::Restore(value),
            Message::Shake { value } => Request::Shake(value),
            Message::Accel { x, y } => Request::Accel(x, y),
            Message::State { state } => Request::State(state),
            Message::Result { text } => Request::Result(text),
            Message::Quit => Request::Quit,
        }
    }
}

/// Decode one payload: JSON first, then the line protocol
fn decode_payload(payload: &str) -> Result<Request> {
    let payload = payload.trim();
    if payload.starts_with('{') {
        let msg: Message = serde_json::from_str(payload)?;
        Ok(msg.into())
    } else {
        parse_request(payload)
    }
}

/// MQTT client that receives messages in a background thread
pub struct MqttClient {
    receiver: Receiver<Command>,
    _thread: thread::JoinHandle<()>,
}

impl MqttClient {
    /// Connect to the broker in `config` and subscribe.
    /// Fails immediately if the connection cannot be established.
    pub fn new(config: &ControlConfig, forcing: SharedForcing) -> Result<Self> {
        let host = config
            .mqtt_host
            .as_deref()
            .ok_or_else(|| Error::Mqtt("no broker host configured".to_string()))?;
        let topic = config.mqtt_topic.as_str();
        let port = config.mqtt_port;

        let mut options = MqttOptions::new(CLIENT_ID, host, port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut connection) = Client::new(options, 10);

        client
            .subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| Error::Mqtt(format!("failed to subscribe to '{}': {}", topic, e)))?;

        // Fail fast if the broker is unreachable
        match connection.iter().next() {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                return Err(Error::Mqtt(format!("failed to connect to {}:{} - {}", host, port, e)));
            }
            None => {
                return Err(Error::Mqtt(format!(
                    "failed to connect to {}:{} - connection closed",
                    host, port
                )));
            }
        }

        let (sender, receiver) = mpsc::channel();
        let topic_owned = topic.to_string();

        let handle = thread::spawn(move || {
            Self::message_loop(connection, sender, &topic_owned, &forcing);
        });

        log::info!("MQTT: connected to {}:{}, subscribed to '{}'", host, port, topic);

        Ok(Self {
            receiver,
            _thread: handle,
        })
    }

    fn message_loop(
        mut connection: Connection,
        sender: Sender<Command>,
        topic: &str,
        forcing: &SharedForcing,
    ) {
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic == topic => {
                    let Ok(text) = std::str::from_utf8(&publish.payload) else {
                        log::warn!("MQTT: dropped non-UTF-8 payload");
                        continue;
                    };
                    if text.trim().is_empty() {
                        continue;
                    }
                    match decode_payload(text) {
                        Ok(request) => {
                            if let Some(cmd) = request.apply(forcing) {
                                if sender.send(cmd).is_err() {
                                    // Frame loop gone
                                    break;
                                }
                            }
                        }
                        Err(e) => log::warn!("MQTT: {}", e),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    // rumqttc reconnects on the next iteration
                    log::warn!("MQTT error: {}", e);
                    thread::sleep(Duration::from_secs(1));
                }
            }
        }
    }

    /// Get any pending commands (non-blocking)
    pub fn poll(&self) -> Vec<Command> {
        self.receiver.try_iter().collect()
    }
}
