use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{ChatAction, MessageId, ParseMode, ReplyParameters},
};

use crate::{
    models::chat::{self, MessageFormat, OutgoingMessage},
    transport::ChatTransport,
};

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn send_with_mode(
        &self,
        message: &OutgoingMessage,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), teloxide::RequestError> {
        let mut request = self
            .bot
            .send_message(ChatId(message.chat_id), message.text.clone());

        if let Some(parse_mode) = parse_mode {
            request = request.parse_mode(parse_mode);
        }
        if let Some(reply_to) = message.reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(reply_to)));
        }

        request.await?;
        Ok(())
    }
}

#[allow(deprecated)]
fn get_parse_mode(format: MessageFormat) -> Option<ParseMode> {
    match format {
        MessageFormat::Plain => None,
        MessageFormat::Html => Some(ParseMode::Html),
        // Model replies use the lenient legacy flavour, not MarkdownV2.
        MessageFormat::Markdown => Some(ParseMode::Markdown),
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send(&self, message: OutgoingMessage) -> anyhow::Result<()> {
        let Some(parse_mode) = get_parse_mode(message.format) else {
            self.send_with_mode(&message, None).await?;
            return Ok(());
        };

        if let Err(error) = self.send_with_mode(&message, Some(parse_mode)).await {
            log::warn!(
                "Formatted message rejected, retrying as plain text. [chat_id = {}, error = {}]",
                message.chat_id,
                error
            );
            self.send_with_mode(&message, None).await?;
        }

        Ok(())
    }

    async fn send_typing(&self, chat_id: chat::ChatId) -> anyhow::Result<()> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await?;
        Ok(())
    }
}
