//! Connection configuration (spec §6, "Configuration options").

use crate::frame::SettingSet;

const DEFAULT_PREFACE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SETTINGS_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 60_000;

/// Connection-level configuration, built once per listener and shared
/// (cloned) across accepted connections.
#[derive(Debug, Clone)]
pub struct Config {
    http2_settings: SettingSet,
    preface_timeout_ms: u64,
    settings_timeout_ms: u64,
    idle_timeout_ms: u64,
}

impl Config {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn http2_settings(&self) -> &SettingSet {
        &self.http2_settings
    }

    pub fn preface_timeout_ms(&self) -> u64 {
        self.preface_timeout_ms
    }

    pub fn settings_timeout_ms(&self) -> u64 {
        self.settings_timeout_ms
    }

    pub fn idle_timeout_ms(&self) -> u64 {
        self.idle_timeout_ms
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            http2_settings: SettingSet::new(),
            preface_timeout_ms: DEFAULT_PREFACE_TIMEOUT_MS,
            settings_timeout_ms: DEFAULT_SETTINGS_TIMEOUT_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
        }
    }
}

/// Builds a [`Config`], mirroring the fluent setter style of an HTTP/2
/// server builder.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    /// Set the initial max frame size the engine will advertise to peers.
    pub fn max_frame_size(&mut self, max: u32) -> &mut Self {
        self.config.http2_settings.set_max_frame_size(max);
        self
    }

    /// Set the maximum number of concurrent client-initiated streams.
    pub fn max_concurrent_streams(&mut self, max: u32) -> &mut Self {
        self.config.http2_settings.set(0x3, max);
        self
    }

    /// Milliseconds allowed for the client preface to complete. Default
    /// 5000.
    pub fn preface_timeout(&mut self, ms: u64) -> &mut Self {
        self.config.preface_timeout_ms = ms;
        self
    }

    /// Milliseconds allowed to receive the SETTINGS-ack following our
    /// initial SETTINGS frame. Default 5000.
    pub fn settings_timeout(&mut self, ms: u64) -> &mut Self {
        self.config.settings_timeout_ms = ms;
        self
    }

    /// Milliseconds of loop inactivity before the connection is closed as
    /// `internal_error(timeout)`. Default 60000.
    pub fn idle_timeout(&mut self, ms: u64) -> &mut Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    pub fn build(&self) -> Config {
        self.config.clone()
    }
}
