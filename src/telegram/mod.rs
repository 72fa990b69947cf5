mod transport;

pub use transport::TelegramTransport;

use std::sync::Arc;

use regex::Regex;
use teloxide::{
    prelude::*,
    types::{Me, UserId},
};

use crate::{conversation::ConversationService, models::chat::InboundMessage};

type HandlerResult = anyhow::Result<()>;

const UNKNOWN_SENDER: &str = "—";

/// How the bot is addressed in group chats.
#[derive(Clone)]
pub struct BotIdentity {
    id: UserId,
    mention: Regex,
}

impl BotIdentity {
    pub fn new(id: UserId, username: &str) -> Result<Self, regex::Error> {
        let mention = Regex::new(&format!(r"(?i)@{}\b", regex::escape(username)))?;
        Ok(Self { id, mention })
    }

    fn from_me(me: &Me) -> Result<Self, regex::Error> {
        Self::new(me.id, me.username())
    }

    /// The text meant for the bot, or `None` when the message is not for it.
    ///
    /// In groups the bot only listens when mentioned or replied to. The mention
    /// is removed. Empty text is ignored unless it is a reply to the bot.
    fn addressed_text(&self, text: &str, is_group: bool, is_reply_to_bot: bool) -> Option<String> {
        let is_mentioned = self.mention.is_match(text);
        if is_group && !is_mentioned && !is_reply_to_bot {
            return None;
        }

        let clean_text = self.mention.replace_all(text, "").trim().to_owned();
        if clean_text.is_empty() && !is_reply_to_bot {
            return None;
        }

        Some(clean_text)
    }
}

pub struct TelegramInteractionInterface;
impl TelegramInteractionInterface {
    pub async fn start(bot: Bot, conversation: Arc<ConversationService>) -> anyhow::Result<()> {
        log::info!("Starting Telegram interaction interface");

        let me = bot.get_me().await?;
        log::info!("Bot started as @{}", me.username());
        let identity = BotIdentity::from_me(&me)?;

        let schema = Update::filter_message().endpoint(handle_message);

        Dispatcher::builder(bot, schema)
            .dependencies(dptree::deps![identity, conversation])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        log::info!("Telegram interaction interface stopped");
        Ok(())
    }
}

async fn handle_message(
    msg: Message,
    identity: BotIdentity,
    conversation: Arc<ConversationService>,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let is_group = msg.chat.is_group() || msg.chat.is_supergroup();
    let is_reply_to_bot = msg
        .reply_to_message()
        .and_then(|reply| reply.from.as_ref())
        .is_some_and(|author| author.id == identity.id);

    let Some(text) = identity.addressed_text(text, is_group, is_reply_to_bot) else {
        return Ok(());
    };

    let sender_name = msg
        .from
        .as_ref()
        .map(|user| user.first_name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_SENDER.to_owned());

    conversation
        .handle_message(InboundMessage {
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
            sender_name,
            text,
        })
        .await
}
