//! Indicator and audio subscribers.
//!
//! [`IndicatorSink`] turns application events into status cues. Rendering
//! (LED strip patterns, buzzer tones) is behind [`IndicatorPort`] and
//! [`AudioPort`]; the log-backed adapters here stand in until a board
//! driver is fitted.

use log::info;

use crate::app::commands::Sound;
use crate::app::events::{AppEvent, IndicatorCue};
use crate::app::ports::{AgentEvent, AudioPort, EventSink, IndicatorPort};
use crate::control::barrier::{ActuationResult, Direction};

/// Map one event to the cue it should show, if any.
pub fn cue_for(event: &AppEvent) -> Option<IndicatorCue> {
    match event {
        AppEvent::BarrierChanging { .. } => Some(IndicatorCue::BarrierMoving),
        AppEvent::ActuationFinished(o) => Some(match (o.result, o.direction) {
            (ActuationResult::Completed, Direction::Open) => IndicatorCue::VehicleParked,
            (ActuationResult::Completed, Direction::Close) => IndicatorCue::SpotEmpty,
            (ActuationResult::TimedOut, _) => IndicatorCue::Fault,
        }),
        AppEvent::Agent(AgentEvent::Connected) => Some(IndicatorCue::ConnectionEstablished),
        AppEvent::Agent(AgentEvent::Disconnected) => Some(IndicatorCue::ConnectionLost),
        _ => None,
    }
}

/// Event subscriber driving an [`IndicatorPort`].
pub struct IndicatorSink<I> {
    port: I,
    last: Option<IndicatorCue>,
}

impl<I: IndicatorPort> IndicatorSink<I> {
    pub fn new(port: I) -> Self {
        Self { port, last: None }
    }

    pub fn last_cue(&self) -> Option<IndicatorCue> {
        self.last
    }

    pub fn port(&self) -> &I {
        &self.port
    }
}

impl<I: IndicatorPort> EventSink for IndicatorSink<I> {
    fn emit(&mut self, event: &AppEvent) {
        if let Some(cue) = cue_for(event) {
            self.last = Some(cue);
            self.port.show(cue);
        }
    }
}

/// Logs cues instead of lighting LEDs.
#[derive(Debug, Default)]
pub struct LogIndicator;

impl IndicatorPort for LogIndicator {
    fn show(&mut self, cue: IndicatorCue) {
        info!("LED | {:?}", cue);
    }
}

/// Logs sounds instead of driving the buzzer.
#[derive(Debug, Default)]
pub struct LogBuzzer;

impl AudioPort for LogBuzzer {
    fn play(&mut self, sound: Sound) {
        info!("BUZZER | {}", sound.as_str());
    }
}
