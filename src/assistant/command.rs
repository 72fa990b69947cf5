use serde::Deserialize;
use serde_json::Value;

pub const BLOCK_START: &str = "<<<JSON";
pub const BLOCK_END: &str = "JSON>>>";

/// One instruction from the command block of a model reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Remind {
        text: String,
        time: String,
    },
    List,
    Delete {
        #[serde(default)]
        keyword: String,
    },
    ClearAll,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedReply {
    pub prose: String,
    pub actions: Vec<Action>,
}

/// Splits a raw model reply into the text meant for the user and the actions
/// encoded between [`BLOCK_START`] and [`BLOCK_END`].
///
/// Never fails: a missing or undecodable block yields no actions, and the
/// block itself never ends up in the prose.
pub fn parse_reply(raw: &str) -> ParsedReply {
    let Some(start) = raw.find(BLOCK_START) else {
        return ParsedReply {
            prose: raw.trim().to_owned(),
            actions: Vec::new(),
        };
    };

    let payload_start = start + BLOCK_START.len();
    let Some(payload_len) = raw[payload_start..].find(BLOCK_END) else {
        log::warn!("Command block is not terminated, dropping it");
        return ParsedReply {
            prose: raw[..start].trim().to_owned(),
            actions: Vec::new(),
        };
    };

    let payload_end = payload_start + payload_len;
    let block_end = payload_end + BLOCK_END.len();
    let prose = format!("{}{}", &raw[..start], &raw[block_end..])
        .trim()
        .to_owned();

    ParsedReply {
        prose,
        actions: decode_actions(&raw[payload_start..payload_end]),
    }
}

fn decode_actions(payload: &str) -> Vec<Action> {
    let payload = strip_code_fence(payload);

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(error) => {
            log::warn!("Could not decode command block. [error = {}]", error);
            return Vec::new();
        }
    };

    let Some(descriptors) = value.get("actions").and_then(Value::as_array) else {
        log::warn!("Command block has no actions array");
        return Vec::new();
    };

    descriptors
        .iter()
        .filter_map(|descriptor| match Action::deserialize(descriptor) {
            Ok(Action::Unknown) => {
                log::debug!("Skipping unknown action. [descriptor = {}]", descriptor);
                None
            }
            Ok(action) => Some(action),
            Err(error) => {
                log::warn!(
                    "Skipping malformed action. [descriptor = {}, error = {}]",
                    descriptor,
                    error
                );
                None
            }
        })
        .collect()
}

fn strip_code_fence(payload: &str) -> &str {
    let trimmed = payload.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
