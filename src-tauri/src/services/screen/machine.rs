//! Screen-level state of the camera screen.
//!
//! All transitions go through [`ScreenMachine`]; callers never mutate the
//! fields directly. The back-button behaviour is a subscription that is
//! re-derived on every state entry, so it always matches the current mode.

use crate::error::AppError;
use crate::models::classify_types::ClassificationResult;
use crate::models::screen_types::{ResultStatus, ScreenMode};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureStatus {
    Pending,
    Ready(Vec<ClassificationResult>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    LivePreview,
    Captured {
        image_path: String,
        image_uri: String,
        status: CaptureStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackHandler {
    PromptQuit,
    ReturnToPreview,
    /// The screen has been torn down; back presses are not ours to handle.
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    QuitPromptShown,
    ReturnedToPreview,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitDecision {
    Exit,
    Stay,
}

/// Proof that a capture was started; completing requires the matching ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTicket {
    generation: u64,
}

#[derive(Debug)]
pub struct ScreenMachine {
    mode: Mode,
    back_handler: BackHandler,
    quit_prompt: bool,
    generation: u64,
}

impl Default for ScreenMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenMachine {
    pub fn new() -> Self {
        Self {
            mode: Mode::LivePreview,
            back_handler: BackHandler::PromptQuit,
            quit_prompt: false,
            generation: 0,
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn screen_mode(&self) -> ScreenMode {
        match self.mode {
            Mode::LivePreview => ScreenMode::LivePreview,
            Mode::Captured { .. } => ScreenMode::Captured,
        }
    }

    pub fn back_handler(&self) -> BackHandler {
        self.back_handler
    }

    pub fn quit_prompt(&self) -> bool {
        self.quit_prompt
    }

    pub fn accepts_frames(&self) -> bool {
        self.back_handler != BackHandler::Detached && matches!(self.mode, Mode::LivePreview)
    }

    pub fn image_path(&self) -> &str {
        match &self.mode {
            Mode::Captured { image_path, .. } => image_path.as_str(),
            Mode::LivePreview => "",
        }
    }

    pub fn image_uri(&self) -> &str {
        match &self.mode {
            Mode::Captured { image_uri, .. } => image_uri.as_str(),
            Mode::LivePreview => "",
        }
    }

    pub fn results(&self) -> &[ClassificationResult] {
        match &self.mode {
            Mode::Captured {
                status: CaptureStatus::Ready(results),
                ..
            } => results.as_slice(),
            _ => &[],
        }
    }

    pub fn result_status(&self) -> ResultStatus {
        match &self.mode {
            Mode::LivePreview => ResultStatus::None,
            Mode::Captured { status, .. } => match status {
                CaptureStatus::Pending => ResultStatus::Pending,
                CaptureStatus::Ready(_) => ResultStatus::Ready,
                CaptureStatus::Failed(_) => ResultStatus::Failed,
            },
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.mode {
            Mode::Captured {
                status: CaptureStatus::Failed(message),
                ..
            } => Some(message.as_str()),
            _ => None,
        }
    }

    fn enter(&mut self, mode: Mode) {
        self.mode = mode;
        self.quit_prompt = false;
        if self.back_handler != BackHandler::Detached {
            self.back_handler = match self.mode {
                Mode::LivePreview => BackHandler::PromptQuit,
                Mode::Captured { .. } => BackHandler::ReturnToPreview,
            };
        }
    }

    /// LivePreview -> Captured with results pending.
    pub fn begin_capture(
        &mut self,
        image_path: impl Into<String>,
        image_uri: impl Into<String>,
    ) -> Result<CaptureTicket, AppError> {
        if self.back_handler == BackHandler::Detached {
            return Err("Camera screen is closed".into());
        }
        if !matches!(self.mode, Mode::LivePreview) {
            return Err("A photo has already been captured".into());
        }

        self.generation += 1;
        self.enter(Mode::Captured {
            image_path: image_path.into(),
            image_uri: image_uri.into(),
            status: CaptureStatus::Pending,
        });
        info!(generation = self.generation, "entered captured state");
        Ok(CaptureTicket {
            generation: self.generation,
        })
    }

    /// Stores the outcome of a capture. Returns false if the capture it belongs
    /// to was abandoned in the meantime.
    pub fn complete_capture(
        &mut self,
        ticket: CaptureTicket,
        outcome: Result<Vec<ClassificationResult>, String>,
    ) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        match &mut self.mode {
            Mode::Captured { status, .. } if *status == CaptureStatus::Pending => {
                *status = match outcome {
                    Ok(results) => CaptureStatus::Ready(results),
                    Err(message) => CaptureStatus::Failed(message),
                };
                true
            }
            _ => false,
        }
    }

    /// Captured -> LivePreview; results and image path are cleared.
    pub fn return_to_preview(&mut self) -> bool {
        if !matches!(self.mode, Mode::Captured { .. }) {
            return false;
        }
        self.enter(Mode::LivePreview);
        info!("returned to live preview");
        true
    }

    pub fn back_pressed(&mut self) -> BackOutcome {
        match self.back_handler {
            BackHandler::PromptQuit => {
                self.quit_prompt = true;
                BackOutcome::QuitPromptShown
            }
            BackHandler::ReturnToPreview => {
                self.return_to_preview();
                BackOutcome::ReturnedToPreview
            }
            BackHandler::Detached => BackOutcome::Ignored,
        }
    }

    pub fn confirm_quit(&mut self) -> QuitDecision {
        if !self.quit_prompt {
            return QuitDecision::Stay;
        }
        self.quit_prompt = false;
        QuitDecision::Exit
    }

    pub fn cancel_quit(&mut self) {
        self.quit_prompt = false;
    }

    pub fn teardown(&mut self) {
        self.back_handler = BackHandler::Detached;
        self.quit_prompt = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classify_types::InferenceMetrics;

    fn result(label: &str) -> ClassificationResult {
        ClassificationResult {
            model_id: "resnet-18".into(),
            model_name: "ResNet 18".into(),
            label: label.into(),
            confidence_percent: 42.0,
            metrics: InferenceMetrics::default(),
        }
    }

    #[test]
    fn starts_in_live_preview() {
        let machine = ScreenMachine::new();
        assert_eq!(machine.screen_mode(), ScreenMode::LivePreview);
        assert_eq!(machine.back_handler(), BackHandler::PromptQuit);
        assert!(machine.accepts_frames());
        assert_eq!(machine.result_status(), ResultStatus::None);
    }

    #[test]
    fn capture_enters_captured_and_stops_frames() {
        let mut machine = ScreenMachine::new();
        machine.begin_capture("/tmp/a.jpg", "file:///tmp/a.jpg").unwrap();

        assert_eq!(machine.screen_mode(), ScreenMode::Captured);
        assert_eq!(machine.result_status(), ResultStatus::Pending);
        assert_eq!(machine.back_handler(), BackHandler::ReturnToPreview);
        assert!(!machine.accepts_frames());
        assert_eq!(machine.image_path(), "/tmp/a.jpg");
    }

    #[test]
    fn second_capture_is_rejected() {
        let mut machine = ScreenMachine::new();
        machine.begin_capture("a", "a").unwrap();
        assert!(machine.begin_capture("b", "b").is_err());
        assert_eq!(machine.image_path(), "a");
    }

    #[test]
    fn completion_stores_results() {
        let mut machine = ScreenMachine::new();
        let ticket = machine.begin_capture("a", "a").unwrap();
        assert!(machine.complete_capture(ticket, Ok(vec![result("tabby")])));
        assert_eq!(machine.result_status(), ResultStatus::Ready);
        assert_eq!(machine.results()[0].label, "tabby");

        // A second completion for the same capture changes nothing.
        assert!(!machine.complete_capture(ticket, Ok(vec![])));
        assert_eq!(machine.results().len(), 1);
    }

    #[test]
    fn failure_is_an_explicit_state() {
        let mut machine = ScreenMachine::new();
        let ticket = machine.begin_capture("a", "a").unwrap();
        machine.complete_capture(ticket, Err("model crashed".into()));
        assert_eq!(machine.result_status(), ResultStatus::Failed);
        assert_eq!(machine.error(), Some("model crashed"));
        assert!(machine.results().is_empty());

        assert!(machine.return_to_preview());
        assert_eq!(machine.error(), None);
    }

    #[test]
    fn return_clears_path_and_results() {
        let mut machine = ScreenMachine::new();
        let ticket = machine.begin_capture("a", "file:///a").unwrap();
        machine.complete_capture(ticket, Ok(vec![result("tabby")]));

        assert!(machine.return_to_preview());
        assert_eq!(machine.screen_mode(), ScreenMode::LivePreview);
        assert_eq!(machine.image_path(), "");
        assert_eq!(machine.image_uri(), "");
        assert!(machine.results().is_empty());
        assert_eq!(machine.back_handler(), BackHandler::PromptQuit);
        assert!(!machine.return_to_preview());
    }

    #[test]
    fn stale_completion_after_return_is_discarded() {
        let mut machine = ScreenMachine::new();
        let first = machine.begin_capture("a", "a").unwrap();
        machine.return_to_preview();
        let second = machine.begin_capture("b", "b").unwrap();

        assert!(!machine.complete_capture(first, Ok(vec![result("stale")])));
        assert_eq!(machine.result_status(), ResultStatus::Pending);
        assert!(machine.complete_capture(second, Ok(vec![result("fresh")])));
        assert_eq!(machine.results()[0].label, "fresh");
    }

    #[test]
    fn back_in_captured_returns_to_preview() {
        let mut machine = ScreenMachine::new();
        machine.begin_capture("a", "a").unwrap();
        assert_eq!(machine.back_pressed(), BackOutcome::ReturnedToPreview);
        assert_eq!(machine.screen_mode(), ScreenMode::LivePreview);
        assert!(!machine.quit_prompt());
    }

    #[test]
    fn back_in_preview_prompts_and_confirm_exits() {
        let mut machine = ScreenMachine::new();
        assert_eq!(machine.back_pressed(), BackOutcome::QuitPromptShown);
        assert!(machine.quit_prompt());
        assert_eq!(machine.confirm_quit(), QuitDecision::Exit);
    }

    #[test]
    fn cancelled_quit_leaves_state_alone() {
        let mut machine = ScreenMachine::new();
        machine.back_pressed();
        machine.cancel_quit();
        assert!(!machine.quit_prompt());
        assert_eq!(machine.screen_mode(), ScreenMode::LivePreview);
        assert!(machine.accepts_frames());
        assert_eq!(machine.confirm_quit(), QuitDecision::Stay);
    }

    #[test]
    fn capture_closes_an_open_quit_prompt() {
        let mut machine = ScreenMachine::new();
        machine.back_pressed();
        machine.begin_capture("a", "a").unwrap();
        assert!(!machine.quit_prompt());
        assert_eq!(machine.confirm_quit(), QuitDecision::Stay);
    }

    #[test]
    fn teardown_detaches_back_handler() {
        let mut machine = ScreenMachine::new();
        machine.teardown();
        assert_eq!(machine.back_pressed(), BackOutcome::Ignored);
        assert!(!machine.accepts_frames());
        assert!(machine.begin_capture("a", "a").is_err());
    }
}
