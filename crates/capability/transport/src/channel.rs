//! 进程内传输：一对互为对端的通道。

use crate::error::TransportError;
use crate::Transport;
use api_contract::Message;
use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

const CHANNEL_CAPACITY: usize = 1024;

pub struct ChannelTransport {
    outbound: mpsc::Sender<Message>,
    inbound: Mutex<mpsc::Receiver<Message>>,
}

impl ChannelTransport {
    /// 一端 send 的消息从另一端 receive 出来。
    pub fn pair() -> (Self, Self) {
        let (left_tx, left_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (right_tx, right_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                outbound: left_tx,
                inbound: Mutex::new(right_rx),
            },
            Self {
                outbound: right_tx,
                inbound: Mutex::new(left_rx),
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, message: Message) -> Result<(), TransportError> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn receive(&self) -> Option<Message> {
        self.inbound.lock().await.recv().await
    }
}
