//! Notification gating for classified frames.
//!
//! The classifier produces one verdict per uploaded frame, which at a few
//! frames per second during a visit would mean a flood of texts for a single
//! cat. The gate turns that stream into occasional notifications with three
//! rules on top of the background-label filter:
//!
//! - **Confirmation**: a label must repeat, or directly follow a background
//!   reading, before it is trusted. A single frame wedged between two
//!   different labels is classifier noise and never fires.
//! - **Confidence**: only verdicts strictly above the threshold fire.
//! - **Cooldown**: once a label has fired, it stays quiet for the cooldown
//!   window.
//!
//! One gate instance owns the state for one camera. `process` serializes
//! internally, so frames for a camera are applied exactly once, in arrival
//! order; separate cameras run in parallel through the [`GateRegistry`].

use crate::config::GatingConfig;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

/// One classified camera frame, ready for gating.
#[derive(Debug, Clone)]
pub struct ClassifiedFrame {
    /// Predicted species label
    pub label: String,
    /// Classifier confidence in [0.0, 1.0]. Taken as-is; range checks are
    /// the classifier's contract, not the gate's.
    pub confidence: f64,
    /// UTC capture time of the frame
    pub timestamp: DateTime<Utc>,
}

/// Outcome of gating one classified frame.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Dispatch notifications and append a detection-log row
    Notify,
    /// Append a detection-log row without notifying
    LogOnly,
    /// Do nothing further with this frame
    Suppress { reason: String },
}

impl GateDecision {
    /// Whether this decision appends a row to the detection log.
    pub fn is_logged(&self) -> bool {
        matches!(self, GateDecision::Notify | GateDecision::LogOnly)
    }

    /// Short name for logs, metrics, and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            GateDecision::Notify => "notify",
            GateDecision::LogOnly => "log_only",
            GateDecision::Suppress { .. } => "suppress",
        }
    }
}

/// Mutable per-camera detection state. Lives for the process lifetime and is
/// only ever touched inside `process`.
#[derive(Debug, Default)]
struct GateState {
    /// Label of the previously processed frame, whatever was decided for it.
    previous_label: Option<String>,
    /// Last time each label produced a logged decision.
    detection_times: HashMap<String, DateTime<Utc>>,
}

/// Stateful notify/suppress decision engine for a single camera.
pub struct DetectionGate {
    config: GatingConfig,
    /// The lock spans the whole read-decide-update sequence so two frames
    /// from the same camera can never interleave.
    state: Mutex<GateState>,
}

impl DetectionGate {
    /// Create a gate with empty state
    pub fn new(config: GatingConfig) -> Self {
        Self {
            config,
            state: Mutex::new(GateState::default()),
        }
    }

    /// Decide what to do with one classified frame and update the state.
    ///
    /// Total over well-formed input: never fails, never leaves the state
    /// half-updated. The previous-label record is refreshed on every call,
    /// suppressed or not, as the last step.
    pub fn process(&self, frame: &ClassifiedFrame) -> GateDecision {
        let mut state = self.state.lock().unwrap();

        let decision = self.decide(&state, frame);

        if decision.is_logged() {
            state
                .detection_times
                .insert(frame.label.clone(), frame.timestamp);
        }
        // Must happen exactly once per call, after the decision, so the next
        // call's confirmation check sees this frame's label.
        state.previous_label = Some(frame.label.clone());

        debug!(
            label = %frame.label,
            confidence = frame.confidence,
            decision = decision.kind(),
            "gated frame"
        );

        decision
    }

    fn decide(&self, state: &GateState, frame: &ClassifiedFrame) -> GateDecision {
        if frame.label == self.config.empty_label {
            return GateDecision::Suppress {
                reason: "background frame".to_string(),
            };
        }

        // A label is trusted once it repeats or directly follows a
        // background reading. Right after startup there is nothing to
        // confirm against, so the first frame never fires on its own.
        let confirmed = match state.previous_label.as_deref() {
            Some(previous) => previous == frame.label || previous == self.config.empty_label,
            None => false,
        };
        if !confirmed {
            return GateDecision::Suppress {
                reason: format!("unconfirmed change to '{}'", frame.label),
            };
        }

        if frame.confidence <= self.config.confidence_threshold {
            return GateDecision::Suppress {
                reason: format!(
                    "confidence {:.2} not above threshold {:.2}",
                    frame.confidence, self.config.confidence_threshold
                ),
            };
        }

        if let Some(last) = state.detection_times.get(&frame.label) {
            let elapsed = frame.timestamp - *last;
            if elapsed < self.config.cooldown() {
                return GateDecision::Suppress {
                    reason: format!(
                        "'{}' fired {}s ago, cooldown is {}s",
                        frame.label,
                        elapsed.num_seconds(),
                        self.config.cooldown_secs
                    ),
                };
            }
        }

        if self.config.log_only_labels.contains(&frame.label) {
            GateDecision::LogOnly
        } else {
            GateDecision::Notify
        }
    }
}

/// Per-camera gates. Each camera gets its own independent state; gates for
/// different cameras never contend.
pub struct GateRegistry {
    config: GatingConfig,
    gates: RwLock<HashMap<String, Arc<DetectionGate>>>,
}

impl GateRegistry {
    /// Create an empty registry
    pub fn new(config: GatingConfig) -> Self {
        Self {
            config,
            gates: RwLock::new(HashMap::new()),
        }
    }

    /// Get the gate for a camera, creating it on first sight.
    pub fn gate_for(&self, camera_id: &str) -> Arc<DetectionGate> {
        if let Some(gate) = self.gates.read().unwrap().get(camera_id) {
            return gate.clone();
        }

        let mut gates = self.gates.write().unwrap();
        gates
            .entry(camera_id.to_string())
            .or_insert_with(|| Arc::new(DetectionGate::new(self.config.clone())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 2, 15, 54, 0).unwrap()
    }

    fn frame(label: &str, confidence: f64, offset_secs: i64) -> ClassifiedFrame {
        ClassifiedFrame {
            label: label.to_string(),
            confidence,
            timestamp: start() + Duration::seconds(offset_secs),
        }
    }

    fn gate() -> DetectionGate {
        DetectionGate::new(GatingConfig::default())
    }

    #[test]
    fn test_background_label_always_suppresses() {
        let gate = gate();
        let decision = gate.process(&frame("empty", 0.99, 0));
        assert!(matches!(decision, GateDecision::Suppress { .. }));
        assert!(!decision.is_logged());
    }

    #[test]
    fn test_first_frame_after_startup_needs_confirmation() {
        let gate = gate();
        let decision = gate.process(&frame("cat", 0.95, 0));
        assert!(matches!(decision, GateDecision::Suppress { .. }));
        // The repeat confirms it.
        assert_eq!(gate.process(&frame("cat", 0.95, 1)), GateDecision::Notify);
    }

    #[test]
    fn test_single_frame_after_background_is_eligible() {
        let gate = gate();
        gate.process(&frame("empty", 0.99, 0));
        assert_eq!(gate.process(&frame("dog", 0.95, 1)), GateDecision::Notify);
    }

    #[test]
    fn test_isolated_label_between_two_others_never_fires() {
        let gate = gate();
        gate.process(&frame("dog", 0.95, 0));
        // cat does not match the preceding dog, so it is noise...
        let decision = gate.process(&frame("cat", 0.95, 1));
        assert!(matches!(decision, GateDecision::Suppress { .. }));
        // ...until it repeats.
        assert_eq!(gate.process(&frame("cat", 0.95, 2)), GateDecision::Notify);
    }

    #[test]
    fn test_confidence_threshold_is_strict() {
        let gate = gate();
        gate.process(&frame("empty", 0.99, 0));
        // Confirmed via the background reading, but 0.9 is not above 0.9.
        let decision = gate.process(&frame("cat", 0.9, 1));
        assert!(matches!(decision, GateDecision::Suppress { .. }));
        assert!(!decision.is_logged());
    }

    #[test]
    fn test_low_confidence_frame_still_confirms_the_next_one() {
        let gate = gate();
        gate.process(&frame("empty", 0.99, 0));
        // Suppressed for confidence, but previous_label still becomes cat.
        gate.process(&frame("cat", 0.5, 1));
        assert_eq!(gate.process(&frame("cat", 0.95, 2)), GateDecision::Notify);
    }

    #[test]
    fn test_repeat_within_cooldown_suppresses() {
        let gate = gate();
        gate.process(&frame("empty", 0.99, 0));
        assert_eq!(gate.process(&frame("cat", 0.95, 1)), GateDecision::Notify);
        let decision = gate.process(&frame("cat", 0.95, 100));
        assert!(matches!(decision, GateDecision::Suppress { .. }));
        assert!(!decision.is_logged());
    }

    #[test]
    fn test_repeat_past_cooldown_notifies_again() {
        let gate = gate();
        gate.process(&frame("empty", 0.99, 0));
        assert_eq!(gate.process(&frame("cat", 0.95, 1)), GateDecision::Notify);
        gate.process(&frame("cat", 0.95, 60));
        assert_eq!(
            gate.process(&frame("cat", 0.95, 1900)),
            GateDecision::Notify
        );
    }

    #[test]
    fn test_elapsed_equal_to_cooldown_notifies() {
        let gate = gate();
        gate.process(&frame("empty", 0.99, 0));
        assert_eq!(gate.process(&frame("cat", 0.95, 1)), GateDecision::Notify);
        assert_eq!(
            gate.process(&frame("cat", 0.95, 1801)),
            GateDecision::Notify
        );
    }

    #[test]
    fn test_cooldown_runs_from_last_fire_not_last_sighting() {
        let gate = gate();
        gate.process(&frame("empty", 0.99, 0));
        assert_eq!(gate.process(&frame("cat", 0.95, 1)), GateDecision::Notify);
        // Suppressed sightings do not push the cooldown forward.
        gate.process(&frame("cat", 0.95, 900));
        gate.process(&frame("cat", 0.95, 1700));
        assert_eq!(
            gate.process(&frame("cat", 0.95, 1801)),
            GateDecision::Notify
        );
    }

    #[test]
    fn test_cooldowns_are_per_label() {
        let gate = gate();
        gate.process(&frame("empty", 0.99, 0));
        assert_eq!(gate.process(&frame("cat", 0.95, 1)), GateDecision::Notify);
        gate.process(&frame("empty", 0.99, 2));
        // dog has never fired; cat's cooldown does not apply to it.
        assert_eq!(gate.process(&frame("dog", 0.95, 3)), GateDecision::Notify);
    }

    #[test]
    fn test_log_only_label_is_logged_not_notified() {
        let gate = gate();
        gate.process(&frame("empty", 0.99, 0));
        let decision = gate.process(&frame("squirrel", 0.97, 1));
        assert_eq!(decision, GateDecision::LogOnly);
        assert!(decision.is_logged());
    }

    #[test]
    fn test_log_only_label_honors_cooldown() {
        let gate = gate();
        gate.process(&frame("empty", 0.99, 0));
        assert_eq!(
            gate.process(&frame("squirrel", 0.97, 1)),
            GateDecision::LogOnly
        );
        let decision = gate.process(&frame("squirrel", 0.97, 10));
        assert!(matches!(decision, GateDecision::Suppress { .. }));
        assert_eq!(
            gate.process(&frame("squirrel", 0.97, 1801)),
            GateDecision::LogOnly
        );
    }

    #[test]
    fn test_two_streaks_separated_by_cooldown_both_fire() {
        let gate = gate();
        // First visit: confirmation then fire, repeats suppressed.
        gate.process(&frame("empty", 0.99, 0));
        assert_eq!(gate.process(&frame("cat", 0.95, 1)), GateDecision::Notify);
        let repeat = gate.process(&frame("cat", 0.95, 2));
        assert!(matches!(repeat, GateDecision::Suppress { .. }));
        gate.process(&frame("empty", 0.99, 5));
        // Second visit after the cooldown expired: fresh cycle.
        assert_eq!(
            gate.process(&frame("cat", 0.95, 2000)),
            GateDecision::Notify
        );
        let decision = gate.process(&frame("cat", 0.95, 2001));
        assert!(matches!(decision, GateDecision::Suppress { .. }));
    }

    #[test]
    fn test_out_of_range_confidence_taken_as_is() {
        let gate = gate();
        gate.process(&frame("empty", 0.99, 0));
        assert_eq!(gate.process(&frame("cat", 1.7, 1)), GateDecision::Notify);
    }

    #[test]
    fn test_registry_hands_out_independent_gates() {
        let registry = GateRegistry::new(GatingConfig::default());
        let front = registry.gate_for("front-cam");
        let back = registry.gate_for("back-cam");

        front.process(&frame("empty", 0.99, 0));
        assert_eq!(front.process(&frame("cat", 0.95, 1)), GateDecision::Notify);
        // back-cam has its own state; the cat seen on front-cam does not
        // confirm or cool down anything here.
        back.process(&frame("empty", 0.99, 2));
        assert_eq!(back.process(&frame("cat", 0.95, 3)), GateDecision::Notify);
        // Same camera id returns the same gate, still in cooldown.
        let front_again = registry.gate_for("front-cam");
        let decision = front_again.process(&frame("cat", 0.95, 4));
        assert!(matches!(decision, GateDecision::Suppress { .. }));
    }
}
