mod command;
mod gateway;
mod prompt;

pub use command::{Action, parse_reply};
pub use gateway::{AssistantGateway, ChatCompletionsGateway};
pub use prompt::build_system_prompt;
