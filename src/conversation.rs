use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;

use crate::{
    actions::{ActionDispatcher, DispatchContext},
    assistant::{AssistantGateway, build_system_prompt, parse_reply},
    models::chat::{InboundMessage, OutgoingMessage},
    storage::ReminderStore,
    transport::ChatTransport,
};

const GATEWAY_FAILURE_REPLY: &str = "⚠️ Ошибка связи.";

/// Takes one addressed message from the chat through the model and back.
pub struct ConversationService {
    store: Arc<ReminderStore>,
    gateway: Arc<dyn AssistantGateway>,
    dispatcher: ActionDispatcher,
    transport: Arc<dyn ChatTransport>,
    timezone: Tz,
}

impl ConversationService {
    pub fn new(
        store: Arc<ReminderStore>,
        gateway: Arc<dyn AssistantGateway>,
        dispatcher: ActionDispatcher,
        transport: Arc<dyn ChatTransport>,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            gateway,
            dispatcher,
            transport,
            timezone,
        }
    }

    pub async fn handle_message(&self, message: InboundMessage) -> anyhow::Result<()> {
        log::info!(
            "Handling message. [chat_id = {}, message_id = {}]",
            message.chat_id,
            message.message_id
        );

        if let Err(error) = self.transport.send_typing(message.chat_id).await {
            log::debug!("Could not send typing action. [error = {}]", error);
        }

        let reminders = self.store.chat_reminders(message.chat_id).await;
        let system_prompt = build_system_prompt(Utc::now(), &self.timezone, &reminders);

        let raw_reply = match self.gateway.complete(&system_prompt, &message.text).await {
            Ok(reply) => reply,
            Err(error) => {
                log::error!(
                    "Assistant request failed. [chat_id = {}, error = {:#}]",
                    message.chat_id,
                    error
                );
                let apology = OutgoingMessage::plain(message.chat_id, GATEWAY_FAILURE_REPLY)
                    .replying_to(message.message_id);
                return self.transport.send(apology).await;
            }
        };

        let parsed = parse_reply(&raw_reply);
        log::debug!(
            "Parsed assistant reply. [chat_id = {}, actions = {:?}]",
            message.chat_id,
            parsed.actions
        );

        let prose_sent = !parsed.prose.is_empty();
        if prose_sent {
            let prose = OutgoingMessage::markdown(message.chat_id, parsed.prose)
                .replying_to(message.message_id);
            if let Err(error) = self.transport.send(prose).await {
                log::warn!(
                    "Could not send assistant reply. [chat_id = {}, error = {}]",
                    message.chat_id,
                    error
                );
            }
        }

        let context = DispatchContext {
            chat_id: message.chat_id,
            user: Some(message.sender_name),
        };
        self.dispatcher
            .dispatch(&context, parsed.actions, prose_sent)
            .await;

        Ok(())
    }
}
