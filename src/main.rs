mod actions;
mod appsettings;
mod assistant;
mod conversation;
mod dates;
mod models;
mod scheduling;
mod storage;
mod telegram;
mod transport;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use actions::ActionDispatcher;
use anyhow::ensure;
use appsettings::AppSettings;
use assistant::ChatCompletionsGateway;
use conversation::ConversationService;
use dates::NaturalDateResolver;
use scheduling::DeliveryReminderScheduler;
use storage::{InMemorySnapshotStorage, JsonFileStorage, ReminderStore, SnapshotStorage};
use telegram::{TelegramInteractionInterface, TelegramTransport};
use transport::{ChatTransport, TransportDeliveryChannel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let settings = AppSettings::load()?;
    let timezone = settings.timezone()?;
    ensure!(!settings.telegram.token.is_empty(), "Telegram bot token is not configured");
    ensure!(!settings.assistant.api_key.is_empty(), "Assistant API key is not configured");

    log::info!("Using timezone {}", timezone);

    let snapshot_storage: Arc<dyn SnapshotStorage> = match &settings.storage.reminders_file {
        Some(path) => {
            let storage = JsonFileStorage::new(path);
            log::info!("Reminders are stored in {}", storage.path().display());
            Arc::new(storage)
        }
        None => {
            log::warn!("No reminders file configured, reminders will not survive a restart");
            Arc::new(InMemorySnapshotStorage::new())
        }
    };
    let store = Arc::new(ReminderStore::open(snapshot_storage).await);

    let bot = teloxide::Bot::new(settings.telegram.token.clone());
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(bot.clone()));

    let delivery_channel = Arc::new(TransportDeliveryChannel::new(transport.clone()));
    let scheduler = Arc::new(DeliveryReminderScheduler::new(store.clone(), delivery_channel));
    scheduler.restore_from_store().await;

    let dispatcher = ActionDispatcher::new(
        store.clone(),
        scheduler.clone(),
        Arc::new(NaturalDateResolver::new(timezone)),
        transport.clone(),
        timezone,
    );

    let gateway = Arc::new(ChatCompletionsGateway::new(
        settings.assistant.api_url.clone(),
        settings.assistant.api_key.clone(),
        settings.assistant.model.clone(),
        settings.assistant.temperature,
    ));

    let conversation = Arc::new(ConversationService::new(
        store,
        gateway,
        dispatcher,
        transport,
        timezone,
    ));

    TelegramInteractionInterface::start(bot, conversation).await
}

fn init_logging() {
    if std::env::var_os("RUST_LOG").is_none() {
        pretty_env_logger::formatted_builder()
            .filter_level(log::LevelFilter::Info)
            .init();
    } else {
        pretty_env_logger::init();
    }
}
