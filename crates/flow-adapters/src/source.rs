use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::message::InboundMessage;

/// Canal de entrada de una categoría.
///
/// `next` devuelve `None` cuando el canal se cerró y no quedan mensajes; el
/// worker termina en ese momento.
#[async_trait]
pub trait InboundSource: Send {
    async fn next(&mut self) -> Option<InboundMessage>;
}

#[async_trait]
impl InboundSource for mpsc::Receiver<InboundMessage> {
    async fn next(&mut self) -> Option<InboundMessage> {
        self.recv().await
    }
}

/// Fuente finita en memoria (útil para replays y tests).
#[derive(Debug, Default)]
pub struct VecSource {
    messages: std::collections::VecDeque<InboundMessage>,
}

impl VecSource {
    pub fn new(messages: impl IntoIterator<Item = InboundMessage>) -> Self {
        Self { messages: messages.into_iter().collect() }
    }
}

#[async_trait]
impl InboundSource for VecSource {
    async fn next(&mut self) -> Option<InboundMessage> {
        self.messages.pop_front()
    }
}
