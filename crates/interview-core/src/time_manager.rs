// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Time Manager (C9) — phase computation, milestone detection, and
//! pacing suggestions for time-based interviews.
//!
//! Grounded verbatim on `utils/time_manager.py`'s `InterviewTimeManager`:
//! the same phase boundaries, pressure thresholds, and per-phase
//! suggestion lists. Milestone callbacks are modeled as a small in-struct
//! "already fired" set rather than a registered-callback table, since the
//! only consumer in this crate is the Interviewer itself logging the
//! milestone — no external subscriber needs a callback registration API.

use std::collections::HashSet;
use std::time::Instant;

use crate::model::{TimeContext, TimePhase, TimePressure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    PhaseChange,
    HalfwayPoint,
    FinalWarning,
    TimeWarning,
}

/// Stateful per-interview timer. Owned exclusively by an Interviewer.
pub struct TimeManager {
    duration_minutes: u32,
    start: Option<Instant>,
    active: bool,
    last_phase: Option<TimePhase>,
    triggered: HashSet<Milestone>,
}

const PHASE_BOUNDS: [(TimePhase, f64, f64); 4] = [
    (TimePhase::Opening, 0.0, 0.2),
    (TimePhase::Exploration, 0.2, 0.6),
    (TimePhase::Deepening, 0.6, 0.8),
    (TimePhase::Closing, 0.8, 1.0),
];

impl TimeManager {
    pub fn new(duration_minutes: u32) -> Self {
        Self {
            duration_minutes,
            start: None,
            active: false,
            last_phase: None,
            triggered: HashSet::new(),
        }
    }

    pub fn start(&mut self) {
        self.start = Some(Instant::now());
        self.active = true;
        self.triggered.clear();
    }

    /// Returns the current context, and the set of milestones that newly
    /// fired as a side effect of computing it. Firings are returned to the
    /// caller instead of invoking callbacks directly — there is exactly
    /// one consumer, the Interviewer, which logs them.
    pub fn time_context(&mut self) -> (TimeContext, Vec<Milestone>) {
        if !self.active || self.start.is_none() {
            return (self.inactive_context(), Vec::new());
        }

        let elapsed = self.start.unwrap().elapsed().as_secs_f64() / 60.0;
        let remaining = (self.duration_minutes as f64 - elapsed).max(0.0);
        let progress = (elapsed / self.duration_minutes as f64).min(1.0);

        let phase = current_phase(progress);
        let (phase_start, phase_end) = PHASE_BOUNDS
            .iter()
            .find(|(p, _, _)| *p == phase)
            .map(|(_, s, e)| (*s, *e))
            .unwrap();
        let phase_span = phase_end - phase_start;
        let phase_progress = if phase_span > 0.0 {
            ((progress - phase_start) / phase_span).min(1.0)
        } else {
            0.0
        };

        let pressure = time_pressure(progress);
        let suggestions = suggestions_for(phase, progress, remaining);

        let ctx = TimeContext {
            total_duration_minutes: self.duration_minutes,
            elapsed_minutes: elapsed,
            remaining_minutes: remaining,
            progress_percentage: progress * 100.0,
            current_phase: phase,
            phase_progress,
            time_pressure: pressure,
            suggested_actions: suggestions,
        };

        let fired = self.check_milestones(phase, progress);
        (ctx, fired)
    }

    pub fn stop(&mut self) -> TimeContext {
        if self.active {
            let (ctx, _) = self.time_context();
            self.active = false;
            ctx
        } else {
            self.inactive_context()
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn inactive_context(&self) -> TimeContext {
        TimeContext {
            total_duration_minutes: self.duration_minutes,
            elapsed_minutes: 0.0,
            remaining_minutes: self.duration_minutes as f64,
            progress_percentage: 0.0,
            current_phase: TimePhase::Opening,
            phase_progress: 0.0,
            time_pressure: TimePressure::Low,
            suggested_actions: vec!["Start the interview".to_string()],
        }
    }

    fn check_milestones(&mut self, phase: TimePhase, progress: f64) -> Vec<Milestone> {
        let mut fired = Vec::new();

        if self.last_phase != Some(phase) {
            fired.push(Milestone::PhaseChange);
            self.last_phase = Some(phase);
        }
        if progress >= 0.5 && self.triggered.insert(Milestone::HalfwayPoint) {
            fired.push(Milestone::HalfwayPoint);
        }
        if progress >= 0.8 && self.triggered.insert(Milestone::FinalWarning) {
            fired.push(Milestone::FinalWarning);
        }
        if progress >= 0.9 && self.triggered.insert(Milestone::TimeWarning) {
            fired.push(Milestone::TimeWarning);
        }

        fired
    }
}

fn current_phase(progress: f64) -> TimePhase {
    for (phase, start, end) in PHASE_BOUNDS {
        if progress >= start && progress < end {
            return phase;
        }
    }
    TimePhase::Closing
}

fn time_pressure(progress: f64) -> TimePressure {
    if progress < 0.5 {
        TimePressure::Low
    } else if progress < 0.8 {
        TimePressure::Medium
    } else {
        TimePressure::High
    }
}

fn suggestions_for(phase: TimePhase, progress: f64, remaining: f64) -> Vec<String> {
    let mut out: Vec<String> = match phase {
        TimePhase::Opening => vec![
            "Focus on building rapport and understanding the candidate",
            "Ask broad questions to gauge overall experience",
            "Establish interview tone and candidate comfort level",
        ],
        TimePhase::Exploration => vec![
            "Dive deeper into specific experiences and skills",
            "Explore technical competencies relevant to the role",
            "Ask behavioral questions using STAR method",
        ],
        TimePhase::Deepening => vec![
            "Focus on most critical competencies for the role",
            "Ask challenging scenario-based questions",
            "Evaluate problem-solving approaches in detail",
        ],
        TimePhase::Closing => vec![
            "Wrap up with final key questions",
            "Allow time for candidate questions",
            "Prepare for interview conclusion",
        ],
    }
    .into_iter()
    .map(str::to_string)
    .collect();

    if progress > 0.9 {
        out.push("Consider concluding the interview soon".to_string());
    } else if progress > 0.8 {
        out.push("Begin transition to closing phase".to_string());
    } else if remaining < 5.0 {
        out.push("Focus on essential questions only".to_string());
    }

    out
}
