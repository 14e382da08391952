//! Pomodoro focus timer and stopwatch-style tracker.
//!
//! The timer is advanced by whole-second ticks from the scheduler, so all
//! arithmetic stays in integer seconds.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FidlyGridError;

pub const WORK_SECONDS: u32 = 25 * 60;
pub const BREAK_SECONDS: u32 = 5 * 60;
/// Tracker stops counting at 23:59:59.
pub const TRACKER_MAX_SECONDS: u32 = 24 * 60 * 60 - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    Focus,
    Tracker,
    Fade,
}

impl FromStr for TimerMode {
    type Err = FidlyGridError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "focus" => Ok(Self::Focus),
            "tracker" => Ok(Self::Tracker),
            "fade" => Ok(Self::Fade),
            other => Err(FidlyGridError::InvalidInput(format!(
                "Invalid timer mode: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Work,
    Break,
}

impl TimerPhase {
    pub fn duration_seconds(self) -> u32 {
        match self {
            Self::Work => WORK_SECONDS,
            Self::Break => BREAK_SECONDS,
        }
    }

    fn next(self) -> Self {
        match self {
            Self::Work => Self::Break,
            Self::Break => Self::Work,
        }
    }
}

/// Emitted when a focus phase runs out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseNotice {
    pub finished: TimerPhase,
    pub message: String,
}

impl PhaseNotice {
    fn for_finished(phase: TimerPhase) -> Self {
        let message = match phase {
            TimerPhase::Work => "Time for a break! 🎉",
            TimerPhase::Break => "Break's over! Let's get back to work 💪",
        };
        Self {
            finished: phase,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Timer {
    mode: TimerMode,
    phase: TimerPhase,
    remaining: u32,
    tracked: u32,
    running: bool,
    last_notice: Option<PhaseNotice>,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            mode: TimerMode::Focus,
            phase: TimerPhase::Work,
            remaining: WORK_SECONDS,
            tracked: 0,
            running: false,
            last_notice: None,
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining
    }

    pub fn tracked_seconds(&self) -> u32 {
        self.tracked
    }

    pub fn toggle(&mut self) {
        self.running = !self.running;
    }

    /// Advances one second. Returns a notice when a focus phase completes.
    pub fn tick(&mut self) -> Option<PhaseNotice> {
        if !self.running {
            return None;
        }

        match self.mode {
            TimerMode::Focus => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining > 0 {
                    return None;
                }
                let finished = self.phase;
                self.phase = finished.next();
                self.remaining = self.phase.duration_seconds();
                self.running = false;
                let notice = PhaseNotice::for_finished(finished);
                self.last_notice = Some(notice.clone());
                Some(notice)
            }
            TimerMode::Tracker => {
                if self.tracked < TRACKER_MAX_SECONDS {
                    self.tracked += 1;
                }
                None
            }
            TimerMode::Fade => None,
        }
    }

    pub fn reset(&mut self) {
        self.running = false;
        match self.mode {
            TimerMode::Focus => self.remaining = self.phase.duration_seconds(),
            TimerMode::Tracker => self.tracked = 0,
            TimerMode::Fade => {}
        }
    }

    pub fn switch_mode(&mut self, mode: TimerMode) {
        self.running = false;
        self.mode = mode;
        match mode {
            TimerMode::Focus => {
                self.phase = TimerPhase::Work;
                self.remaining = WORK_SECONDS;
            }
            TimerMode::Tracker => self.tracked = 0,
            TimerMode::Fade => {}
        }
    }

    pub fn display(&self) -> String {
        match self.mode {
            TimerMode::Focus => format_minutes(self.remaining),
            TimerMode::Tracker => format_hours(self.tracked),
            TimerMode::Fade => String::new(),
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            mode: self.mode,
            phase: self.phase,
            running: self.running,
            remaining_seconds: self.remaining,
            tracked_seconds: self.tracked,
            display: self.display(),
            last_notice: self.last_notice.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    pub phase: TimerPhase,
    pub running: bool,
    pub remaining_seconds: u32,
    pub tracked_seconds: u32,
    pub display: String,
    pub last_notice: Option<PhaseNotice>,
}

fn format_minutes(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn format_hours(seconds: u32) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
