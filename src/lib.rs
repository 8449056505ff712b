//! Fauna Watch
//!
//! Detection gateway for a wildlife feeder camera. The camera uploads
//! motion-triggered frames; an out-of-process classifier labels each one;
//! this service decides which detections are worth a text message and keeps
//! the captured frames organized for model retraining.
//!
//! ## Features
//!
//! - **Notification gating**: per-camera hysteresis + cooldown state machine
//!   that suppresses one-frame misclassifications and duplicate alerts
//! - **Frame persistence**: every accepted frame is stored under a filename
//!   that encodes capture time, label, and confidence
//! - **Dataset curation**: frames cluster into motion events by timestamp
//!   gap, and events split whole into train/validation sets
//!
//! ## Architecture
//!
//! ```text
//! Live operation                       Dataset curation
//!
//! camera ──POST frame──▶ server        frames dir
//!                          │              │
//!                          ▼              ▼
//!                     classifier      frame_id ──▶ motion_events
//!                          │                             │
//!                          ▼                             ▼
//!                    detection_gate               dataset_split
//!                     │    │    │                    │     │
//!            Suppress ┘    │    └ Notify ──▶ SMS     ▼     ▼
//!                          ▼                       train  valid
//!                   detection_log
//! ```

pub mod classifier;
pub mod config;
pub mod dataset_split;
pub mod detection_gate;
pub mod detection_log;
pub mod frame_id;
pub mod motion_events;
pub mod notifier;
pub mod server;

pub use classifier::{Classification, Classifier, HttpClassifier};
pub use config::Config;
pub use detection_gate::{ClassifiedFrame, DetectionGate, GateDecision, GateRegistry};
pub use detection_log::DetectionLog;
pub use frame_id::FrameIdError;
pub use motion_events::MotionEvent;
pub use notifier::{Notifier, SmsNotifier};
