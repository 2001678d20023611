//! Debounced, cancelable board feedback.
//!
//! At most one feedback task runs per session. Scheduling a new one cancels
//! its predecessor in the same step, so a burst of board edits produces a
//! single reply once the board has been quiet for the debounce interval.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use slate_canvas::{BoardSummary, RenderOptions, render_png};
use slate_core::change::ChangeAction;
use slate_core::protocol::{DEFAULT_IMAGE_MIME, image_data_url};
use slate_core::types::WhiteboardProject;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::prompt;
use crate::reply::{ReplyGenerator, ReplyInput, ReplyRequest};

/// Why board feedback was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTrigger {
    Change(ChangeAction),
    /// The student asked for a look but sent no usable image.
    Requested,
}

impl FeedbackTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Change(action) => action.as_str(),
            Self::Requested => "requested",
        }
    }
}

impl fmt::Display for FeedbackTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct FeedbackTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct FeedbackScheduler {
    reply: Arc<dyn ReplyGenerator>,
    debounce: Duration,
    /// `None` when rendering is disabled.
    render: Option<RenderOptions>,
    slot: Mutex<Option<FeedbackTask>>,
    last_feedback_at: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl FeedbackScheduler {
    pub fn new(reply: Arc<dyn ReplyGenerator>, debounce: Duration, render: Option<RenderOptions>) -> Self {
        Self {
            reply,
            debounce,
            render,
            slot: Mutex::new(None),
            last_feedback_at: Arc::new(Mutex::new(None)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<FeedbackTask>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// When the last board reply was issued.
    pub fn last_feedback_at(&self) -> Option<DateTime<Utc>> {
        *self.last_feedback_at.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether a feedback task is scheduled and not yet finished.
    pub fn is_pending(&self) -> bool {
        self.slot().as_ref().is_some_and(|t| !t.handle.is_finished())
    }

    /// Cancel the in-flight task, if any, without waiting for it.
    pub fn cancel(&self) {
        if let Some(task) = self.slot().take() {
            task.cancel.cancel();
        }
    }

    /// Install a new task built from a fresh token, cancelling the previous
    /// one under the same lock.
    fn replace<F>(&self, make: impl FnOnce(CancellationToken) -> F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot();
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(make(cancel.clone()));
        *slot = Some(FeedbackTask { cancel, handle });
    }

    /// React to `project` after the debounce interval.
    pub fn schedule_debounced(&self, project: WhiteboardProject, trigger: FeedbackTrigger, sender: String) {
        let reply = self.reply.clone();
        let debounce = self.debounce;
        let render = self.render.clone();
        let last_feedback_at = self.last_feedback_at.clone();

        self.replace(move |cancel| async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Whiteboard: skipped intermediate update during active drawing");
                    return;
                }
                _ = tokio::time::sleep(debounce) => {}
            }

            let summary = BoardSummary::from_project(&project).to_prompt(trigger.as_str());
            let image = match render {
                Some(opts) => render_off_thread(project, opts).await,
                None => None,
            };
            if cancel.is_cancelled() {
                debug!("Whiteboard: feedback cancelled after rendering");
                return;
            }

            info!(sender = %sender, action = %trigger, image = image.is_some(), "Whiteboard: generating feedback");
            let request = match image {
                Some(png) => ReplyRequest {
                    instructions: prompt::board_image_instructions(&summary),
                    input: ReplyInput::Image {
                        data_url: image_data_url(DEFAULT_IMAGE_MIME, &png),
                    },
                    allow_interruptions: true,
                },
                None => ReplyRequest {
                    instructions: prompt::BOARD_SUMMARY_INSTRUCTIONS.to_string(),
                    input: ReplyInput::Text { text: summary },
                    allow_interruptions: true,
                },
            };

            if deliver(reply.as_ref(), request, &cancel).await {
                *last_feedback_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
            }
        });
    }

    /// React immediately to an image the student sent.
    pub fn schedule_image(&self, data_url: String, sender: String) {
        let reply = self.reply.clone();
        self.replace(move |cancel| async move {
            info!(sender = %sender, "Whiteboard image: generating feedback");
            let request = ReplyRequest {
                instructions: prompt::EXPLICIT_IMAGE_INSTRUCTIONS.to_string(),
                input: ReplyInput::Image { data_url },
                allow_interruptions: true,
            };
            deliver(reply.as_ref(), request, &cancel).await;
        });
    }
}

impl Drop for FeedbackScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn render_off_thread(project: WhiteboardProject, opts: RenderOptions) -> Option<Vec<u8>> {
    match tokio::task::spawn_blocking(move || render_png(&project, &opts)).await {
        Ok(png) => png,
        Err(e) => {
            warn!("Whiteboard: render task failed: {e}");
            None
        }
    }
}

/// Issue one reply unless cancelled first. Returns whether it completed.
async fn deliver(reply: &dyn ReplyGenerator, request: ReplyRequest, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => {
            debug!("Whiteboard: reply cancelled");
            false
        }
        result = reply.generate_reply(request) => match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Whiteboard: reply generation failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::RecordingReplyGenerator;
    use slate_core::types::{Point, Stroke};

    fn scheduler(render: Option<RenderOptions>) -> (FeedbackScheduler, Arc<RecordingReplyGenerator>) {
        let reply = Arc::new(RecordingReplyGenerator::new());
        let scheduler = FeedbackScheduler::new(reply.clone(), Duration::from_millis(1200), render);
        (scheduler, reply)
    }

    fn board() -> WhiteboardProject {
        let mut project = WhiteboardProject::default();
        project.strokes.push(Stroke::new(
            "s1",
            vec![Point::new(0.1, 0.1), Point::new(0.9, 0.9)],
            0xFF00_0000,
            3.0,
        ));
        project
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_debounce() {
        let (scheduler, reply) = scheduler(None);
        scheduler.schedule_debounced(board(), FeedbackTrigger::Change(ChangeAction::Started), "s".into());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(reply.requests().is_empty());
        assert!(scheduler.is_pending());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let requests = reply.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].instructions, prompt::BOARD_SUMMARY_INSTRUCTIONS);
        let ReplyInput::Text { text } = &requests[0].input else {
            panic!("expected text input");
        };
        assert!(text.starts_with("Whiteboard update: action=started. strokes=1."));
        assert!(scheduler.last_feedback_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_trigger_supersedes_previous() {
        let (scheduler, reply) = scheduler(None);
        scheduler.schedule_debounced(board(), FeedbackTrigger::Change(ChangeAction::Started), "s".into());
        tokio::time::sleep(Duration::from_millis(600)).await;
        scheduler.schedule_debounced(
            WhiteboardProject::default(),
            FeedbackTrigger::Change(ChangeAction::Cleared),
            "s".into(),
        );
        tokio::time::sleep(Duration::from_secs(5)).await;

        let requests = reply.requests();
        assert_eq!(requests.len(), 1);
        let ReplyInput::Text { text } = &requests[0].input else {
            panic!("expected text input");
        };
        assert!(text.contains("action=cleared"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_reply() {
        let (scheduler, reply) = scheduler(None);
        scheduler.schedule_debounced(board(), FeedbackTrigger::Requested, "s".into());
        scheduler.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(reply.requests().is_empty());
        assert!(scheduler.last_feedback_at().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_feedback_cancels_debounce() {
        let (scheduler, reply) = scheduler(None);
        scheduler.schedule_debounced(board(), FeedbackTrigger::Change(ChangeAction::Added), "s".into());
        scheduler.schedule_image("data:image/png;base64,AAAA".into(), "s".into());
        tokio::time::sleep(Duration::from_secs(5)).await;

        let requests = reply.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].instructions, prompt::EXPLICIT_IMAGE_INSTRUCTIONS);
        assert_eq!(
            requests[0].input,
            ReplyInput::Image { data_url: "data:image/png;base64,AAAA".into() }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rendered_image_attached() {
        let (scheduler, reply) = scheduler(Some(RenderOptions::new(64, 48)));
        scheduler.schedule_debounced(board(), FeedbackTrigger::Change(ChangeAction::Started), "s".into());
        tokio::time::sleep(Duration::from_secs(2)).await;
        // The render runs on the blocking pool; give it real time to finish.
        for _ in 0..100 {
            if !reply.requests().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let requests = reply.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].has_image());
        assert!(requests[0].instructions.contains("Additional metadata: Whiteboard update: action=started."));
        let ReplyInput::Image { data_url } = &requests[0].input else {
            panic!("expected image");
        };
        assert!(data_url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_trigger_labels() {
        assert_eq!(FeedbackTrigger::Requested.as_str(), "requested");
        assert_eq!(FeedbackTrigger::Change(ChangeAction::Erased).to_string(), "erased");
    }
}
