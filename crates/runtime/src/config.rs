//! Runtime configuration structures and loaders.
use std::env;
use std::time::Duration;

/// Configuration shared by the engine, scheduler, and background workers.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Wall-clock length of one tick; cooldowns and elapsed ticks both use it.
    pub tick_duration: Duration,
    pub scheduler: SchedulerConfig,
    pub hover: HoverConfig,
    pub sessions: SessionConfig,
    pub cooldowns: CooldownConfig,
    /// Capacity of the envelope channel behind `RuntimeHandle::submit`.
    pub envelope_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_millis(50),
            scheduler: SchedulerConfig::default(),
            hover: HoverConfig::default(),
            sessions: SessionConfig::default(),
            cooldowns: CooldownConfig::default(),
            envelope_buffer: 256,
        }
    }
}

impl RuntimeConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `REFLEX_TICK_MS` - Milliseconds per tick (default: 50)
    /// - `REFLEX_PASS_INTERVAL_MS` - Scheduler pass cadence (default: 50)
    /// - `REFLEX_MAX_ENTITIES_PER_PASS` - Scheduler batch size (default: 200)
    /// - `REFLEX_HOVER_MIN_STABLE` - Passes before hover turns on (default: 8)
    /// - `REFLEX_HOVER_MAX_VY` - Vertical speed threshold (default: 0.03)
    /// - `REFLEX_HOVER_MAX_HSPEED` - Horizontal speed threshold (default: 0.06)
    /// - `REFLEX_SESSION_SWEEP_SECS` - Session sweep period (default: 60)
    /// - `REFLEX_SESSION_MAX_AGE_SECS` - Age before eviction is considered (default: 3600)
    /// - `REFLEX_CONTEXT_TTL_SECS` - Attacker/victim reference lifetime (default: 300)
    /// - `REFLEX_PRESENCE_TIMEOUT_MS` - Host presence check bound (default: 2000)
    /// - `REFLEX_COOLDOWN_SWEEP_SECS` - Cooldown sweep period (default: 30)
    /// - `REFLEX_ENVELOPE_BUFFER` - Envelope queue size (default: 256)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = read_env::<u64>("REFLEX_TICK_MS") {
            config.tick_duration = Duration::from_millis(ms);
        }

        if let Some(ms) = read_env::<u64>("REFLEX_PASS_INTERVAL_MS") {
            config.scheduler.pass_interval = Duration::from_millis(ms);
        }
        if let Some(max) = read_env::<usize>("REFLEX_MAX_ENTITIES_PER_PASS") {
            config.scheduler.max_entities_per_pass = max;
        }

        if let Some(passes) = read_env::<u32>("REFLEX_HOVER_MIN_STABLE") {
            config.hover.min_stable_passes = passes;
        }
        if let Some(vy) = read_env::<f64>("REFLEX_HOVER_MAX_VY") {
            config.hover.max_vertical_speed = vy;
        }
        if let Some(speed) = read_env::<f64>("REFLEX_HOVER_MAX_HSPEED") {
            config.hover.max_horizontal_speed = speed;
        }

        if let Some(secs) = read_env::<u64>("REFLEX_SESSION_SWEEP_SECS") {
            config.sessions.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = read_env::<u64>("REFLEX_SESSION_MAX_AGE_SECS") {
            config.sessions.max_session_age = Duration::from_secs(secs);
        }
        if let Some(secs) = read_env::<u64>("REFLEX_CONTEXT_TTL_SECS") {
            config.sessions.context_ttl = Duration::from_secs(secs);
        }
        if let Some(ms) = read_env::<u64>("REFLEX_PRESENCE_TIMEOUT_MS") {
            config.sessions.presence_timeout = Duration::from_millis(ms);
        }

        if let Some(secs) = read_env::<u64>("REFLEX_COOLDOWN_SWEEP_SECS") {
            config.cooldowns.sweep_interval = Duration::from_secs(secs);
        }

        if let Some(capacity) = read_env::<usize>("REFLEX_ENVELOPE_BUFFER") {
            config.envelope_buffer = capacity;
        }

        config.normalized()
    }

    /// Clamps every value into its usable range.
    pub fn normalized(mut self) -> Self {
        self.tick_duration = self.tick_duration.max(Duration::from_millis(1));
        self.scheduler.pass_interval = self.scheduler.pass_interval.max(Duration::from_millis(1));
        self.scheduler.max_entities_per_pass = self.scheduler.max_entities_per_pass.max(1);
        self.hover.min_stable_passes = self.hover.min_stable_passes.max(1);
        self.hover.max_vertical_speed = non_negative(self.hover.max_vertical_speed);
        self.hover.max_horizontal_speed = non_negative(self.hover.max_horizontal_speed);
        self.sessions.sweep_interval = self.sessions.sweep_interval.max(Duration::from_millis(1));
        self.cooldowns.sweep_interval = self.cooldowns.sweep_interval.max(Duration::from_millis(1));
        self.envelope_buffer = self.envelope_buffer.max(1);
        self
    }

    /// Tick length in whole milliseconds (never 0).
    pub fn tick_millis(&self) -> u64 {
        (self.tick_duration.as_millis() as u64).max(1)
    }
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub pass_interval: Duration,
    pub max_entities_per_pass: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pass_interval: Duration::from_millis(50),
            max_entities_per_pass: 200,
        }
    }
}

/// Thresholds for the hover detector.
#[derive(Clone, Debug)]
pub struct HoverConfig {
    pub min_stable_passes: u32,
    pub max_vertical_speed: f64,
    pub max_horizontal_speed: f64,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            min_stable_passes: 8,
            max_vertical_speed: 0.03,
            max_horizontal_speed: 0.06,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub sweep_interval: Duration,
    pub max_session_age: Duration,
    pub context_ttl: Duration,
    pub presence_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            max_session_age: Duration::from_secs(60 * 60),
            context_ttl: Duration::from_secs(5 * 60),
            presence_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CooldownConfig {
    pub sweep_interval: Duration,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.trim().parse().ok()
}
