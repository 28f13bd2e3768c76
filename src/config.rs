use crate::controller::{duration_from_secs, ControllerConfig};
use crate::error::ConfigurationError;
use crate::recovery::RecoveryConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BridgeConfig {
    pub trigger: TriggerConfig,
    pub release: ReleaseConfig,
    pub controller: ControlConfig,
    pub source: SourceConfig,
    pub status: StatusConfig,
    pub system: SystemConfig,
    /// Output sinks; a log sink is used when empty
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TriggerConfig {
    /// Classifier label that arms the trigger
    #[serde(default = "default_trigger_label")]
    pub label: String,

    /// Minimum confidence for an observation to qualify
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Consecutive qualifying observations required
    #[serde(default = "default_debounce_frames")]
    pub debounce_frames: u32,

    /// Minimum span of the qualifying streak in seconds (0 = frames only)
    #[serde(default)]
    pub debounce_hold_secs: f64,

    /// Minimum spacing between any two transitions in seconds
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReleaseConfig {
    /// Return to idle once the trigger condition clears
    #[serde(default = "default_release_on_condition")]
    pub on_condition: bool,

    /// Minimum time in the triggered state before a condition release
    #[serde(default)]
    pub min_dwell_secs: f64,

    /// Forced return to idle after this many seconds (0 = disabled)
    #[serde(default = "default_auto_release_secs")]
    pub auto_release_secs: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ControlConfig {
    /// Period of the timer tick that drives time-based release
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Per-sink bound on a single apply call
    #[serde(default = "default_sink_timeout_ms")]
    pub sink_timeout_ms: u64,

    /// Bound on draining in-flight work and the final idle cleanup
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Force every sink to idle before processing observations
    #[serde(default = "default_force_idle_on_start")]
    pub force_idle_on_start: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Stdin,
    File,
    Udp,
    Keyboard,
    Simulate,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// Where observations come from
    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,

    /// Input file for the `file` source
    pub path: Option<String>,

    /// Listen address for the `udp` source
    #[serde(default = "default_source_bind")]
    pub bind: String,

    /// Transient failures tolerated before the source is given up
    #[serde(default = "default_source_max_retries")]
    pub max_retries: u32,

    /// Initial retry delay, doubled on every consecutive failure
    #[serde(default = "default_source_retry_base_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound on the retry delay
    #[serde(default = "default_source_retry_max_ms")]
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StatusConfig {
    /// Serve the controller snapshot over HTTP
    #[serde(default)]
    pub enabled: bool,

    /// IP address to bind to
    #[serde(default = "default_status_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_status_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

/// One output sink. `name` defaults to the sink kind.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Log the requested state
    Log { name: Option<String> },

    /// OSC float 0.0/1.0 sent to every address
    OscMix {
        name: Option<String>,
        #[serde(default = "default_osc_host")]
        host: String,
        #[serde(default = "default_osc_port")]
        port: u16,
        #[serde(default = "default_mix_addresses")]
        addresses: Vec<String>,
    },

    /// OSC clip select followed by a start message
    OscClips {
        name: Option<String>,
        #[serde(default = "default_osc_host")]
        host: String,
        #[serde(default = "default_osc_port")]
        port: u16,
        #[serde(default = "default_clip_source")]
        source: String,
        #[serde(default = "default_idle_slot")]
        idle_clip: i32,
        #[serde(default = "default_scare_slot")]
        scare_clip: i32,
    },

    /// OSC preset recall
    OscPreset {
        name: Option<String>,
        #[serde(default = "default_osc_host")]
        host: String,
        #[serde(default = "default_osc_port")]
        port: u16,
        #[serde(default = "default_preset_address")]
        address: String,
        #[serde(default = "default_idle_slot")]
        idle_preset: i32,
        #[serde(default = "default_scare_slot")]
        scare_preset: i32,
    },

    /// Two-layer OSC crossfade ramped over `rise_ms`
    Crossfade {
        name: Option<String>,
        #[serde(default = "default_osc_host")]
        host: String,
        #[serde(default = "default_osc_port")]
        port: u16,
        #[serde(default = "default_idle_layer")]
        idle_layer: u32,
        #[serde(default = "default_scare_layer")]
        scare_layer: u32,
        #[serde(default = "default_rise_ms")]
        rise_ms: u64,
        #[serde(default = "default_fade_step_ms")]
        step_ms: u64,
    },

    /// External process launched per state
    Command {
        name: Option<String>,
        idle: Vec<String>,
        scare: Vec<String>,
        stop: Option<Vec<String>>,
        #[serde(default = "default_command_settle_ms")]
        settle_ms: u64,
    },

    /// Raw MIDI note per state written to a MIDI device
    Midi {
        name: Option<String>,
        device: String,
        #[serde(default)]
        channel: u8,
        #[serde(default = "default_idle_note")]
        idle_note: u8,
        #[serde(default = "default_scare_note")]
        scare_note: u8,
        #[serde(default = "default_velocity")]
        velocity: u8,
        #[serde(default = "default_note_length_ms")]
        note_length_ms: u64,
    },
}

impl SinkConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SinkConfig::Log { .. } => "log",
            SinkConfig::OscMix { .. } => "osc_mix",
            SinkConfig::OscClips { .. } => "osc_clips",
            SinkConfig::OscPreset { .. } => "osc_preset",
            SinkConfig::Crossfade { .. } => "crossfade",
            SinkConfig::Command { .. } => "command",
            SinkConfig::Midi { .. } => "midi",
        }
    }

    /// Configured name, or the kind when none was given
    pub fn name(&self) -> String {
        let name = match self {
            SinkConfig::Log { name }
            | SinkConfig::OscMix { name, .. }
            | SinkConfig::OscClips { name, .. }
            | SinkConfig::OscPreset { name, .. }
            | SinkConfig::Crossfade { name, .. }
            | SinkConfig::Command { name, .. }
            | SinkConfig::Midi { name, .. } => name,
        };
        name.clone().unwrap_or_else(|| self.kind().to_string())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| {
            Err(ConfigError::Message(format!(
                "Sink '{}' ({}): {}",
                self.name(),
                self.kind(),
                msg
            )))
        };

        match self {
            SinkConfig::Log { .. } => Ok(()),
            SinkConfig::OscMix {
                port, addresses, ..
            } => {
                if *port == 0 {
                    return invalid("port must be greater than 0");
                }
                if addresses.is_empty() || addresses.iter().any(|a| !a.starts_with('/')) {
                    return invalid("addresses must be non-empty OSC paths starting with '/'");
                }
                Ok(())
            }
            SinkConfig::OscClips { port, source, .. } => {
                if *port == 0 {
                    return invalid("port must be greater than 0");
                }
                if !source.starts_with('/') {
                    return invalid("source must be an OSC path starting with '/'");
                }
                Ok(())
            }
            SinkConfig::OscPreset { port, address, .. } => {
                if *port == 0 {
                    return invalid("port must be greater than 0");
                }
                if !address.starts_with('/') {
                    return invalid("address must be an OSC path starting with '/'");
                }
                Ok(())
            }
            SinkConfig::Crossfade {
                port,
                idle_layer,
                scare_layer,
                rise_ms,
                step_ms,
                ..
            } => {
                if *port == 0 {
                    return invalid("port must be greater than 0");
                }
                if idle_layer == scare_layer {
                    return invalid("idle_layer and scare_layer must differ");
                }
                if *step_ms == 0 {
                    return invalid("step_ms must be greater than 0");
                }
                if *rise_ms > MAX_CROSSFADE_RISE_MS {
                    return invalid("rise_ms must not exceed 60000");
                }
                Ok(())
            }
            SinkConfig::Command {
                idle, scare, stop, ..
            } => {
                if idle.is_empty() || scare.is_empty() {
                    return invalid("idle and scare commands must not be empty");
                }
                if matches!(stop, Some(argv) if argv.is_empty()) {
                    return invalid("stop command must not be empty when given");
                }
                Ok(())
            }
            SinkConfig::Midi {
                channel,
                idle_note,
                scare_note,
                velocity,
                ..
            } => {
                if *channel > 15 {
                    return invalid("channel must be within 0..=15");
                }
                if *idle_note > 127 || *scare_note > 127 || *velocity > 127 {
                    return invalid("notes and velocity must be within 0..=127");
                }
                Ok(())
            }
        }
    }
}

/// Longest crossfade ramp accepted from configuration
const MAX_CROSSFADE_RISE_MS: u64 = 60_000;

impl BridgeConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("scarebridge.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("trigger.label", default_trigger_label())?
            .set_default(
                "trigger.confidence_threshold",
                default_confidence_threshold(),
            )?
            .set_default("trigger.debounce_frames", default_debounce_frames())?
            .set_default("trigger.debounce_hold_secs", 0.0)?
            .set_default("trigger.cooldown_secs", default_cooldown_secs())?
            .set_default("release.on_condition", default_release_on_condition())?
            .set_default("release.min_dwell_secs", 0.0)?
            .set_default("release.auto_release_secs", default_auto_release_secs())?
            .set_default("controller.tick_interval_ms", default_tick_interval_ms())?
            .set_default("controller.sink_timeout_ms", default_sink_timeout_ms())?
            .set_default(
                "controller.shutdown_timeout_ms",
                default_shutdown_timeout_ms(),
            )?
            .set_default(
                "controller.force_idle_on_start",
                default_force_idle_on_start(),
            )?
            .set_default("source.kind", "stdin")?
            .set_default("source.bind", default_source_bind())?
            .set_default("source.max_retries", default_source_max_retries())?
            .set_default(
                "source.retry_base_delay_ms",
                default_source_retry_base_ms(),
            )?
            .set_default("source.retry_max_delay_ms", default_source_retry_max_ms())?
            .set_default("status.enabled", false)?
            .set_default("status.ip", default_status_ip())?
            .set_default("status.port", default_status_port())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // SCAREBRIDGE__TRIGGER__COOLDOWN_SECS=2.0 overrides trigger.cooldown_secs
            .add_source(
                Environment::with_prefix("SCAREBRIDGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: BridgeConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller_config()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        if self.controller.sink_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Sink timeout must be greater than 0".to_string(),
            ));
        }

        if self.controller.shutdown_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Shutdown timeout must be greater than 0".to_string(),
            ));
        }

        if self.source.kind == SourceKind::File && self.source.path.is_none() {
            return Err(ConfigError::Message(
                "File source requires source.path".to_string(),
            ));
        }

        if self.source.retry_base_delay_ms > self.source.retry_max_delay_ms {
            return Err(ConfigError::Message(
                "source.retry_base_delay_ms must not exceed source.retry_max_delay_ms".to_string(),
            ));
        }

        if self.status.enabled && self.status.port == 0 {
            return Err(ConfigError::Message(
                "Status port must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        let mut names = std::collections::HashSet::new();
        for sink in &self.sinks {
            sink.validate()?;
            if !names.insert(sink.name()) {
                return Err(ConfigError::Message(format!(
                    "Duplicate sink name '{}'",
                    sink.name()
                )));
            }
        }

        Ok(())
    }

    /// Build the immutable controller configuration
    pub fn controller_config(&self) -> Result<ControllerConfig, ConfigurationError> {
        ControllerConfig::builder(self.trigger.label.clone())
            .confidence_threshold(self.trigger.confidence_threshold)
            .debounce_frames(self.trigger.debounce_frames)
            .debounce_hold(duration_from_secs(
                "trigger.debounce_hold_secs",
                self.trigger.debounce_hold_secs,
            )?)
            .cooldown(duration_from_secs(
                "trigger.cooldown_secs",
                self.trigger.cooldown_secs,
            )?)
            .release_on_condition(self.release.on_condition)
            .min_dwell(duration_from_secs(
                "release.min_dwell_secs",
                self.release.min_dwell_secs,
            )?)
            .auto_release(duration_from_secs(
                "release.auto_release_secs",
                self.release.auto_release_secs,
            )?)
            .tick_interval(Duration::from_millis(self.controller.tick_interval_ms))
            .build()
    }

    /// Retry budget for transient observation source failures
    pub fn recovery_config(&self) -> RecoveryConfig {
        RecoveryConfig {
            max_retries: self.source.max_retries,
            base_delay: Duration::from_millis(self.source.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.source.retry_max_delay_ms),
            exponential_backoff: true,
        }
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.controller.sink_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.controller.shutdown_timeout_ms)
    }

    /// Default configuration with one sink of each network kind, for `--print-config`
    pub fn example() -> Self {
        let mut config = Self::default();
        config.sinks = vec![
            SinkConfig::OscMix {
                name: Some("vpt-mix".to_string()),
                host: default_osc_host(),
                port: default_osc_port(),
                addresses: default_mix_addresses(),
            },
            SinkConfig::Command {
                name: Some("projector".to_string()),
                idle: vec![
                    "vlc".to_string(),
                    "--fullscreen".to_string(),
                    "--loop".to_string(),
                    "videos/sleeping_face.mp4".to_string(),
                ],
                scare: vec![
                    "vlc".to_string(),
                    "--fullscreen".to_string(),
                    "--loop".to_string(),
                    "videos/angry_face.mp4".to_string(),
                ],
                stop: Some(vec!["pkill".to_string(), "vlc".to_string()]),
                settle_ms: default_command_settle_ms(),
            },
        ];
        config
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            trigger: TriggerConfig {
                label: default_trigger_label(),
                confidence_threshold: default_confidence_threshold(),
                debounce_frames: default_debounce_frames(),
                debounce_hold_secs: 0.0,
                cooldown_secs: default_cooldown_secs(),
            },
            release: ReleaseConfig {
                on_condition: default_release_on_condition(),
                min_dwell_secs: 0.0,
                auto_release_secs: default_auto_release_secs(),
            },
            controller: ControlConfig {
                tick_interval_ms: default_tick_interval_ms(),
                sink_timeout_ms: default_sink_timeout_ms(),
                shutdown_timeout_ms: default_shutdown_timeout_ms(),
                force_idle_on_start: default_force_idle_on_start(),
            },
            source: SourceConfig {
                kind: default_source_kind(),
                path: None,
                bind: default_source_bind(),
                max_retries: default_source_max_retries(),
                retry_base_delay_ms: default_source_retry_base_ms(),
                retry_max_delay_ms: default_source_retry_max_ms(),
            },
            status: StatusConfig {
                enabled: false,
                ip: default_status_ip(),
                port: default_status_port(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
            sinks: Vec::new(),
        }
    }
}

// Default value functions
fn default_trigger_label() -> String {
    "hand".to_string()
}
fn default_confidence_threshold() -> f64 {
    0.9
}
fn default_debounce_frames() -> u32 {
    1
}
fn default_cooldown_secs() -> f64 {
    1.5
}

fn default_release_on_condition() -> bool {
    false
}
fn default_auto_release_secs() -> f64 {
    2.0
}

fn default_tick_interval_ms() -> u64 {
    50
}
fn default_sink_timeout_ms() -> u64 {
    2000
}
fn default_shutdown_timeout_ms() -> u64 {
    3000
}
fn default_force_idle_on_start() -> bool {
    true
}

fn default_source_kind() -> SourceKind {
    SourceKind::Stdin
}
fn default_source_bind() -> String {
    "127.0.0.1:7000".to_string()
}
fn default_source_max_retries() -> u32 {
    5
}
fn default_source_retry_base_ms() -> u64 {
    200
}
fn default_source_retry_max_ms() -> u64 {
    5000
}

fn default_status_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_status_port() -> u16 {
    8090
}

fn default_event_bus_capacity() -> usize {
    100
}

fn default_osc_host() -> String {
    "127.0.0.1".to_string()
}
fn default_osc_port() -> u16 {
    6666
}
fn default_mix_addresses() -> Vec<String> {
    vec![
        "/sources/8video/mixfader".to_string(),
        "/sources/8/mixfader".to_string(),
        "/8video/mixfader".to_string(),
    ]
}
fn default_clip_source() -> String {
    "/sources/1video".to_string()
}
fn default_preset_address() -> String {
    "/preset".to_string()
}
fn default_idle_slot() -> i32 {
    1
}
fn default_scare_slot() -> i32 {
    2
}
fn default_idle_layer() -> u32 {
    1
}
fn default_scare_layer() -> u32 {
    2
}
fn default_rise_ms() -> u64 {
    250
}
fn default_fade_step_ms() -> u64 {
    20
}
fn default_command_settle_ms() -> u64 {
    200
}
fn default_idle_note() -> u8 {
    60
}
fn default_scare_note() -> u8 {
    61
}
fn default_velocity() -> u8 {
    127
}
fn default_note_length_ms() -> u64 {
    100
}
