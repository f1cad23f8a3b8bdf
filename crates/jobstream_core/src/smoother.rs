use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SmootherSettings {
    /// Share of the remaining gap closed on each animation tick.
    pub easing_fraction: f64,
    /// Gap (in percentage points) below which the display snaps to the target.
    pub snap_threshold: f64,
    /// Amount added to the simulated value on each simulation tick.
    pub simulation_step: f64,
    pub simulation_interval: Duration,
    /// The simulated value never exceeds this.
    pub simulation_ceiling: f64,
}

impl Default for SmootherSettings {
    fn default() -> Self {
        Self {
            easing_fraction: 0.08,
            snap_threshold: 0.5,
            simulation_step: 1.0,
            simulation_interval: Duration::from_millis(250),
            simulation_ceiling: 12.0,
        }
    }
}

/// Turns jumpy server percentages into a monotonic, eased display value.
///
/// Until the first real progress event, the display follows a synthetic ramp
/// that only signals liveness. From that event on, the eased value is
/// authoritative for the rest of the job and the ramp stops.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSmoother {
    settings: SmootherSettings,
    target: f64,
    current: f64,
    simulated: f64,
    has_received_real_event: bool,
}

impl Default for ProgressSmoother {
    fn default() -> Self {
        Self::new(SmootherSettings::default())
    }
}

impl ProgressSmoother {
    pub fn new(settings: SmootherSettings) -> Self {
        Self {
            settings,
            target: 0.0,
            current: 0.0,
            simulated: 0.0,
            has_received_real_event: false,
        }
    }

    pub fn settings(&self) -> &SmootherSettings {
        &self.settings
    }

    /// Records a server-reported percentage as the new target.
    ///
    /// Returns `true` when this is the first real value, i.e. the simulation
    /// has just been retired.
    pub fn observe_target(&mut self, percent: f64) -> bool {
        let first = !self.has_received_real_event;
        if first {
            self.has_received_real_event = true;
            // Start easing from where the ramp left off so the display never drops.
            self.current = self.simulated;
        }
        self.target = clamp_percent(percent);
        first
    }

    /// Advances the eased value by one rendering frame.
    ///
    /// Returns `true` while a gap remains and further ticks are useful.
    pub fn animation_tick(&mut self) -> bool {
        if !self.has_received_real_event {
            return false;
        }
        let gap = self.target - self.current;
        if gap <= 0.0 {
            // Target fell behind the display: hold until it climbs past again.
            return false;
        }
        if gap < self.settings.snap_threshold {
            self.current = self.target;
            return false;
        }
        self.current = clamp_percent(self.current + gap * self.settings.easing_fraction);
        true
    }

    /// Advances the pre-connection ramp by one step.
    ///
    /// Returns `false` once a real event has arrived; the caller should stop
    /// its timer at that point.
    pub fn simulation_tick(&mut self) -> bool {
        if self.has_received_real_event {
            return false;
        }
        let ceiling = self.settings.simulation_ceiling;
        if self.simulated < ceiling {
            self.simulated = (self.simulated + self.settings.simulation_step).min(ceiling);
        }
        true
    }

    pub fn is_simulating(&self) -> bool {
        !self.has_received_real_event
    }

    pub fn has_received_real_event(&self) -> bool {
        self.has_received_real_event
    }

    pub fn is_settled(&self) -> bool {
        !self.has_received_real_event || self.current >= self.target
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Fractional display value in `[0, 100]`.
    pub fn display_value(&self) -> f64 {
        if self.has_received_real_event {
            self.current
        } else {
            self.simulated
        }
    }

    /// Display value rounded for presentation.
    pub fn display_percent(&self) -> u8 {
        self.display_value().round().clamp(0.0, 100.0) as u8
    }
}

pub(crate) fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}
