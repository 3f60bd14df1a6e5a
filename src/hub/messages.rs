//! # Hub Wire Messages
//!
//! Every frame is a JSON object `{"type": ..., "data": ...}`. Inbound frames
//! are decoded once into [`InboundMessage`]; outbound frames are built from
//! [`OutboundMessage`] so each type carries its own payload shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::photo_store::PhotoInfo;
use super::{HubError, HubResult};
use crate::constants::photos;

/// Undecoded frame as read from a client
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub kind: String,
    pub data: Value,
}

impl RawFrame {
    /// Split a JSON value into type and payload
    ///
    /// A missing `type` reads as the empty string; a non-string `type` keeps
    /// its JSON rendering so the sender can see what was rejected.
    pub fn from_value(value: Value) -> HubResult<Self> {
        let Value::Object(mut fields) = value else {
            return Err(HubError::validation("Invalid message format"));
        };

        let kind = match fields.remove("type") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(kind)) => kind,
            Some(other) => other.to_string(),
        };

        Ok(Self {
            kind,
            data: fields.remove("data").unwrap_or(Value::Null),
        })
    }
}

/// Control adjustment relayed verbatim to every client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlChange {
    /// Name of the control being adjusted
    #[serde(rename = "type")]
    pub control: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    StartStream,
    StopStream,
    SavePhoto { image: String },
    GetPhotos,
    DeletePhoto { filename: String },
    ControlChange(ControlChange),
}

#[derive(Deserialize)]
struct SavePhotoData {
    image: String,
}

#[derive(Deserialize)]
struct DeletePhotoData {
    filename: String,
}

impl InboundMessage {
    /// Decode a text frame
    ///
    /// Only text that is not JSON at all yields [`HubError::Serialization`].
    /// A frame whose type is missing or unrecognized yields
    /// [`HubError::UnknownMessageType`]; a JSON value that is not an object,
    /// or a recognized type with a malformed payload, yields
    /// [`HubError::Validation`].
    pub fn decode(text: &str) -> HubResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_frame(RawFrame::from_value(value)?)
    }

    pub fn from_frame(frame: RawFrame) -> HubResult<Self> {
        let message = match frame.kind.as_str() {
            "start_stream" => Self::StartStream,
            "stop_stream" => Self::StopStream,
            "get_photos" => Self::GetPhotos,
            "save_photo" => {
                let data: SavePhotoData = payload(frame.data, "Missing image data")?;
                Self::SavePhoto { image: data.image }
            }
            "delete_photo" => {
                let data: DeletePhotoData = payload(frame.data, "Missing filename")?;
                Self::DeletePhoto {
                    filename: data.filename,
                }
            }
            "control_change" => {
                Self::ControlChange(payload(frame.data, "Invalid control change data")?)
            }
            other => return Err(HubError::UnknownMessageType(other.to_string())),
        };
        Ok(message)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartStream => "start_stream",
            Self::StopStream => "stop_stream",
            Self::SavePhoto { .. } => "save_photo",
            Self::GetPhotos => "get_photos",
            Self::DeletePhoto { .. } => "delete_photo",
            Self::ControlChange(_) => "control_change",
        }
    }
}

fn payload<T: DeserializeOwned>(data: Value, reason: &str) -> HubResult<T> {
    serde_json::from_value(data).map_err(|e| HubError::validation(format!("{reason}: {e}")))
}

/// Where a stored photo can be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoLink {
    pub filename: String,
    pub url: String,
}

impl PhotoLink {
    pub fn new(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            url: format!("{}{filename}", photos::URL_PREFIX),
            filename,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    PhotoList(Vec<PhotoInfo>),
    PhotoSaved(PhotoLink),
    PhotoDeleted { filename: String },
    NewPhoto(PhotoLink),
    ControlChange(ControlChange),
    StreamStarted(String),
    StreamStopped(String),
    Error { message: String },
}

impl OutboundMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PhotoList(_) => "photo_list",
            Self::PhotoSaved(_) => "photo_saved",
            Self::PhotoDeleted { .. } => "photo_deleted",
            Self::NewPhoto(_) => "new_photo",
            Self::ControlChange(_) => "control_change",
            Self::StreamStarted(_) => "stream_started",
            Self::StreamStopped(_) => "stream_stopped",
            Self::Error { .. } => "error",
        }
    }

    pub fn to_frame(&self) -> HubResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
