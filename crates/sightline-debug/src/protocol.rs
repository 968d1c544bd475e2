//! Debug protocol - JSON command/response definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while decoding a protocol line
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty command line")]
    Empty,

    #[error("invalid command JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Commands sent from a debug client to the debug server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params")]
pub enum DebugCommand {
    /// Get culling statistics for the last frame
    GetStats,
    /// Freeze the current snapshot and frustum for inspection
    CaptureSnapshot,
    /// Drop a previously captured snapshot
    ReleaseSnapshot,
    /// Get the frozen capture (if any)
    GetCapture,
    /// Get traversal info for a chunk in the frozen capture
    GetChunkInfo { x: i32, y: i32, z: i32 },
    /// Schedule a full visibility rebuild on the next frame
    ForceRebuild,
    /// Ping (health check)
    Ping,
}

impl DebugCommand {
    /// Decode one newline-delimited command.
    pub fn parse_line(line: &str) -> Result<Self, ProtocolError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(ProtocolError::Empty);
        }
        Ok(serde_json::from_str(trimmed)?)
    }
}

/// Responses from debug server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum DebugResponse {
    #[serde(rename = "ok")]
    Ok { data: ResponseData },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Response data variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    None,
    Pong { message: String },
    Stats(StatsInfo),
    Capture(CaptureInfo),
    ChunkInfo(ChunkInfo),
    ParamsUpdated { description: String },
}

/// Culling statistics published by the render thread
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsInfo {
    pub total_chunks: u32,
    pub snapshot_nodes: u32,
    pub visible_chunks: u32,
    pub visible_drawable: u32,
    pub rebuilds_completed: u64,
    pub rebuilds_failed: u64,
    pub patches_applied: u64,
    pub last_rebuild_ms: f32,
    pub rebuild_in_flight: bool,
    pub capture_active: bool,
}

/// A frozen snapshot/frustum pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureInfo {
    pub camera_position: [f32; 3],
    pub camera_chunk: [i32; 3],
    pub node_count: u32,
    pub visible_count: u32,
    pub nodes: Vec<ChunkInfo>,
}

/// Traversal metadata for one chunk of a capture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub depth: u32,
    /// Bitset of directions travelled from the seed
    pub entry_directions: u8,
    /// Bitset of directions this chunk was discovered through
    pub discovery_directions: u8,
    pub in_frustum: bool,
    pub drawable: bool,
}

impl DebugResponse {
    pub fn ok(data: ResponseData) -> Self {
        Self::Ok { data }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error {
            message: msg.into(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(ResponseData::Pong {
            message: "pong".into(),
        })
    }

    pub fn none() -> Self {
        Self::ok(ResponseData::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit_command() {
        let cmd = DebugCommand::parse_line("{\"cmd\":\"Ping\"}\n").unwrap();
        assert_eq!(cmd, DebugCommand::Ping);
    }

    #[test]
    fn test_parse_command_with_params() {
        let cmd = DebugCommand::parse_line(
            r#"{"cmd":"GetChunkInfo","params":{"x":1,"y":-2,"z":3}}"#,
        )
        .unwrap();
        assert_eq!(cmd, DebugCommand::GetChunkInfo { x: 1, y: -2, z: 3 });
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            DebugCommand::parse_line("   "),
            Err(ProtocolError::Empty)
        ));
        assert!(matches!(
            DebugCommand::parse_line("{not json"),
            Err(ProtocolError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_response_shape() {
        let json = serde_json::to_string(&DebugResponse::pong()).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("pong"));

        let json = serde_json::to_string(&DebugResponse::error("nope")).unwrap();
        assert!(json.contains("\"status\":\"error\""));
    }
}
