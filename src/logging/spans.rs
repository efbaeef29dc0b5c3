//! Structured span for one registration run
//!
//! Every run gets a span carrying its correlation id, the input sizes, and on
//! completion the per-stage timings and headline results.

use serde::Serialize;
use std::time::Instant;
use tracing::{field, span, Level, Span};
use uuid::Uuid;

/// Wall time of one pipeline stage
#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: &'static str,
    pub duration_ms: f64,
}

pub struct RegistrationSpan {
    span: Span,
    start_time: Instant,
    stage_start: Instant,
    timings: Vec<StageTiming>,
    correlation_id: Uuid,
}

impl RegistrationSpan {
    /// Create the run span, reusing the thread's correlation id when one is set
    pub fn new(backend: &str) -> Self {
        let correlation_id = crate::logging::get_correlation_id().unwrap_or_else(Uuid::new_v4);
        let span = span!(
            Level::INFO,
            "registration",
            backend = backend,
            correlation_id = %correlation_id,
            moving_size = field::Empty,
            fixed_size = field::Empty,
            angle_diff_degrees = field::Empty,
            roi = field::Empty,
            success = field::Empty,
            execution_time_ms = field::Empty,
        );
        let now = Instant::now();
        Self {
            span,
            start_time: now,
            stage_start: now,
            timings: Vec::new(),
            correlation_id,
        }
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn record_inputs(&self, moving: (u32, u32), fixed: (u32, u32)) {
        self.span
            .record("moving_size", field::display(format!("{}x{}", moving.0, moving.1)));
        self.span
            .record("fixed_size", field::display(format!("{}x{}", fixed.0, fixed.1)));
    }

    /// Close the current stage and start timing the next one
    pub fn finish_stage(&mut self, stage: &'static str) {
        let now = Instant::now();
        let duration_ms = now.duration_since(self.stage_start).as_secs_f64() * 1000.0;
        self.stage_start = now;
        tracing::debug!(parent: &self.span, stage, duration_ms, "Stage completed");
        self.timings.push(StageTiming { stage, duration_ms });
    }

    pub fn record_angle(&self, angle_diff_degrees: f64) {
        self.span.record("angle_diff_degrees", angle_diff_degrees);
    }

    pub fn record_success(&self, roi: &str) {
        let elapsed = self.start_time.elapsed().as_secs_f64() * 1000.0;
        self.span.record("roi", roi);
        self.span.record("success", true);
        self.span.record("execution_time_ms", elapsed);
        tracing::info!(
            parent: &self.span,
            roi,
            execution_time_ms = elapsed,
            stages = self.timings.len(),
            "Registration completed"
        );
    }

    pub fn record_failure(&self, error: &dyn std::error::Error) {
        let elapsed = self.start_time.elapsed().as_secs_f64() * 1000.0;
        self.span.record("success", false);
        self.span.record("execution_time_ms", elapsed);
        tracing::warn!(
            parent: &self.span,
            error = %error,
            execution_time_ms = elapsed,
            "Registration failed"
        );
    }

    pub fn timings(&self) -> &[StageTiming] {
        &self.timings
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
