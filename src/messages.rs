/// Messages exchanged between background, content script and popup
use serde::{Deserialize, Serialize};

use crate::resolver::Resolution;
use crate::speed::SpeedSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "UPDATE_SPEED")]
    UpdateSpeed {
        speed: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<SpeedSource>,
    },
    #[serde(rename = "DISABLE_SPEEDYVIDEO")]
    Disable,
    #[serde(rename = "ENABLE_SPEEDYVIDEO")]
    Enable,
    #[serde(rename = "DISABLE_SPEEDYVIDEO_GLOBAL")]
    DisableGlobal,
    #[serde(rename = "ENABLE_SPEEDYVIDEO_GLOBAL")]
    EnableGlobal,
    #[serde(rename = "GET_CURRENT_TAB")]
    GetCurrentTab,
    #[serde(rename = "GET_CURRENT_SPEED")]
    GetCurrentSpeed,
    #[serde(rename = "CLEANUP_LEGACY_DATA")]
    CleanupLegacyData,
    /// Content script asking the background for its own resolution.
    #[serde(rename = "RESOLVE_SPEED")]
    ResolveSpeed { url: String },
}

impl Message {
    pub fn update(resolution: &Resolution) -> Message {
        Message::UpdateSpeed {
            speed: resolution.speed.value(),
            source: Some(resolution.source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReply {
    pub status: String,
}

impl StatusReply {
    pub fn new(status: &str) -> StatusReply {
        StatusReply {
            status: status.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedUpdatedReply {
    pub status: String,
    pub new_speed: f64,
    pub source: SpeedSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSpeedReply {
    pub current_speed: f64,
    pub source: SpeedSource,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabReply {
    pub tab_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedReply {
    pub tab_id: Option<i32>,
    pub speed: f64,
    pub source: SpeedSource,
}

/// Any reply a listener can send back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    SpeedUpdated(SpeedUpdatedReply),
    CurrentSpeed(CurrentSpeedReply),
    Resolved(ResolvedReply),
    Tab(TabReply),
    Status(StatusReply),
}
