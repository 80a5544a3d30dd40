use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Host the camera answers on when acting as a Wi-Fi access point.
pub const DEFAULT_HOST: &str = "192.168.1.1";

/// Pixel dimensions of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// Revision of the Open Spherical Camera API used to request the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiLevel {
    /// `camera._getLivePreview` with a `sessionId` parameter (THETA S era).
    V2_0,
    /// `camera.getLivePreview` with no parameters.
    V2_1,
    /// [`V2_0`](Self::V2_0) when a session id is supplied, otherwise [`V2_1`](Self::V2_1).
    #[default]
    Auto,
}

impl ApiLevel {
    pub(crate) fn resolve(self, session_id: Option<&str>) -> Self {
        match (self, session_id) {
            (Self::Auto, Some(_)) => Self::V2_0,
            (Self::Auto, None) => Self::V2_1,
            (level, _) => level,
        }
    }
}

/// Configuration for a live preview stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub api_level: ApiLevel,
    pub connect_timeout: Duration,
    /// Longest silence tolerated between two body chunks.
    pub frame_timeout: Duration,
    /// Largest JPEG accepted before the stream is considered corrupt.
    pub max_frame_bytes: usize,
    pub user_agent: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            api_level: ApiLevel::Auto,
            connect_timeout: Duration::from_secs(5),
            frame_timeout: Duration::from_secs(10),
            max_frame_bytes: 4 * 1024 * 1024,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl StreamConfig {
    pub fn with_api_level(mut self, api_level: ApiLevel) -> Self {
        self.api_level = api_level;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    pub fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = limit;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_level_follows_session_id() {
        assert_eq!(ApiLevel::Auto.resolve(Some("SID_0001")), ApiLevel::V2_0);
        assert_eq!(ApiLevel::Auto.resolve(None), ApiLevel::V2_1);
        assert_eq!(ApiLevel::V2_1.resolve(Some("SID_0001")), ApiLevel::V2_1);
        assert_eq!(ApiLevel::V2_0.resolve(None), ApiLevel::V2_0);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: StreamConfig =
            serde_json::from_str(r#"{"api_level":"v2_0","max_frame_bytes":1024}"#).unwrap();
        assert_eq!(config.api_level, ApiLevel::V2_0);
        assert_eq!(config.max_frame_bytes, 1024);
        assert_eq!(config.frame_timeout, StreamConfig::default().frame_timeout);
    }
}
