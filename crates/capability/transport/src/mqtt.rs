//! MQTT 传输实现（rumqttc）。

use crate::Transport;
use crate::backoff::BackoffPolicy;
use crate::error::TransportError;
use api_contract::{Message, TopicScheme};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use twin_telemetry::{record_inbound_rejected, record_publish_failure};

const PUBLISH_ATTEMPTS: u32 = 3;
const PUBLISH_RETRY_DELAY: Duration = Duration::from_millis(100);
/// 规格下发报文可能较大，放宽默认的 10 KiB 限制。
const MAX_PACKET_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct MqttTransportConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub qos: u8,
    pub keep_alive_seconds: u64,
    pub queue_size: usize,
    pub topics: TopicScheme,
}

pub struct MqttTransport {
    client: AsyncClient,
    qos: QoS,
    topics: TopicScheme,
    inbound: Mutex<mpsc::Receiver<Message>>,
}

impl MqttTransport {
    /// 建立连接并订阅 edge 前缀；首次连接按退避策略重试。
    ///
    /// 返回的任务持续驱动事件循环，直到 cancel 被触发。
    pub async fn connect(
        config: MqttTransportConfig,
        policy: &BackoffPolicy,
        cancel: CancellationToken,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), TransportError> {
        let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_seconds.max(5)));
        options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);
        if let (Some(username), Some(password)) = (config.username.clone(), config.password.clone())
        {
            options.set_credentials(username, password);
        }
        let queue_size = config.queue_size.max(1);
        let (client, mut eventloop) = AsyncClient::new(options, queue_size);
        let qos = qos_from_u8(config.qos);

        wait_connected(&mut eventloop, policy, &cancel, &config).await?;
        let subscription = config.topics.subscription();
        client
            .subscribe(subscription.clone(), qos)
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        info!(
            target: "twin.transport",
            host = %config.host,
            port = config.port,
            client_id = %config.client_id,
            subscription = %subscription,
            "mqtt_connected"
        );

        let (inbound_tx, inbound_rx) = mpsc::channel(queue_size);
        let handle = tokio::spawn(poll_loop(
            eventloop,
            client.clone(),
            config.topics.clone(),
            qos,
            inbound_tx,
            cancel,
        ));

        Ok((
            Self {
                client,
                qos,
                topics: config.topics,
                inbound: Mutex::new(inbound_rx),
            },
            handle,
        ))
    }
}

async fn wait_connected(
    eventloop: &mut EventLoop,
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
    config: &MqttTransportConfig,
) -> Result<(), TransportError> {
    let mut attempt = 0u32;
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            event = eventloop.poll() => event,
        };
        let err = match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => continue,
            Err(err) => err,
        };
        attempt += 1;
        if policy.exhausted(attempt) {
            return Err(TransportError::Connect(err.to_string()));
        }
        let delay = policy.delay_for(attempt);
        warn!(
            target: "twin.transport",
            host = %config.host,
            port = config.port,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "mqtt_connect_failed"
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn poll_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topics: TopicScheme,
    qos: QoS,
    inbound: mpsc::Sender<Message>,
    cancel: CancellationToken,
) {
    let subscription = topics.subscription();
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };
        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                match topics.parse_inbound(&publish.topic, &publish.payload) {
                    Ok(message) => {
                        // 队列满时阻塞事件循环，对 broker 形成背压
                        if inbound.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        record_inbound_rejected();
                        warn!(
                            target: "twin.transport",
                            topic = %publish.topic,
                            error = %err,
                            "inbound_message_rejected"
                        );
                    }
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                // 重连后会话可能已丢失，重新订阅
                if let Err(err) = client.subscribe(subscription.clone(), qos).await {
                    warn!(target: "twin.transport", error = %err, "mqtt_resubscribe_failed");
                } else {
                    info!(target: "twin.transport", subscription = %subscription, "mqtt_reconnected");
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(target: "twin.transport", error = %err, "mqtt_eventloop_error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
    info!(target: "twin.transport", "mqtt_poll_loop_stopped");
}

#[async_trait]
impl Transport for MqttTransport {
    async fn send(&self, message: Message) -> Result<(), TransportError> {
        let topic = self.topics.outbound_topic(&message);
        let payload = self.topics.outbound_payload(&message)?;
        let mut last_error = String::new();
        for attempt in 1..=PUBLISH_ATTEMPTS {
            match self
                .client
                .publish(topic.clone(), self.qos, false, payload.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) => {
                    last_error = err.to_string();
                    warn!(
                        target: "twin.transport",
                        topic = %topic,
                        attempt,
                        error = %last_error,
                        "mqtt_publish_failed"
                    );
                    if attempt < PUBLISH_ATTEMPTS {
                        tokio::time::sleep(PUBLISH_RETRY_DELAY).await;
                    }
                }
            }
        }
        record_publish_failure();
        Err(TransportError::Publish(last_error))
    }

    async fn receive(&self) -> Option<Message> {
        self.inbound.lock().await.recv().await
    }
}

fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}
