// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{cfg::enums::SequenceNumberType, utils::IdleStrategy};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Control-plane parameters of the library instance.
    pub library: LibraryConfig,
    /// Replay index location and query-cache geometry.
    pub replay: ReplayConfig,
}

/// Parameters of one library instance.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LibraryConfig {
    #[serde(rename = "LibraryId")]
    /// Identity on the multi-tenant control stream; must be positive, zero is
    /// reserved for the engine itself.
    pub library_id: u32,

    #[serde(rename = "EngineChannels")]
    /// Control-plane channels of the configured engines, tried round-robin.
    /// More than one entry means a clustered deployment.
    pub engine_channels: Vec<String>,

    #[serde(rename = "ReplyTimeoutMs")]
    /// Deadline for any engine reply, and the liveness timeout.
    pub reply_timeout_ms: i64,

    #[serde(rename = "ReconnectAttempts")]
    /// Extra connect attempts after the first times out.
    pub reconnect_attempts: u32,

    #[serde(
        rename = "ConnectIdleSpinMs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    /// Back-off between transport polls inside the connect loop; omitted
    /// means a 1ms sleep.
    pub connect_idle_spin_ms: Option<u64>,

    #[serde(skip, default)]
    pub idle_strategy: IdleStrategy,
}

/// Where replay index files live and how many stay mapped.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ReplayConfig {
    #[serde(rename = "LogFileDir")]
    pub log_file_dir: String,

    #[serde(rename = "StreamId")]
    pub stream_id: u32,

    #[serde(rename = "CacheSets", default = "default_cache_sets")]
    /// Set count of the query cache; must be a power of two.
    pub cache_sets: usize,

    #[serde(rename = "CacheWays", default = "default_cache_ways")]
    /// Mappings held per set before LRU eviction.
    pub cache_ways: usize,
}

fn default_cache_sets() -> usize {
    8
}

fn default_cache_ways() -> usize {
    4
}

/// Everything needed to initiate one outbound FIX connection.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SessionConfig {
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "SenderCompId")]
    pub sender_comp_id: String,
    #[serde(rename = "SenderSubId", default)]
    pub sender_sub_id: String,
    #[serde(rename = "SenderLocationId", default)]
    pub sender_location_id: String,
    #[serde(rename = "TargetCompId")]
    pub target_comp_id: String,
    #[serde(rename = "SequenceNumberType", default)]
    pub sequence_number_type: SequenceNumberType,
    #[serde(rename = "InitialSequenceNumber", default = "default_initial_seq")]
    pub initial_sequence_number: i32,
    #[serde(rename = "Username", default)]
    pub username: String,
    #[serde(rename = "Password", default)]
    pub password: String,
    #[serde(rename = "HeartbeatIntervalS", default = "default_heartbeat_s")]
    pub heartbeat_interval_s: u32,
}

fn default_initial_seq() -> i32 {
    1
}

fn default_heartbeat_s() -> u32 {
    10
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    pub fn validate_and_normalize(&mut self) -> Result<()> {
        self.library.validate()?;
        if let Some(ms) = self.library.connect_idle_spin_ms {
            self.library.idle_strategy = IdleStrategy::Sleep(Duration::from_millis(ms));
        }
        ensure!(
            self.replay.cache_sets.is_power_of_two(),
            "CacheSets must be a power of two"
        );
        ensure!(self.replay.cache_ways >= 1, "CacheWays must be >= 1");
        ensure!(
            !self.replay.log_file_dir.is_empty(),
            "LogFileDir must not be empty"
        );
        Ok(())
    }
}

impl LibraryConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.library_id > 0, "LibraryId must be > 0 (0 is the engine)");
        ensure!(
            !self.engine_channels.is_empty(),
            "EngineChannels must name at least one engine"
        );
        ensure!(
            self.engine_channels.iter().all(|c| !c.is_empty()),
            "EngineChannels entries must not be empty"
        );
        ensure!(self.reply_timeout_ms > 0, "ReplyTimeoutMs must be > 0");
        Ok(())
    }
}
