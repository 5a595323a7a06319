//! Composer state plus the lifecycle of the single in-flight generation request.
//!
//! The controller never awaits while holding itself: [`RequestController::submit`]
//! hands out a [`Submission`] that owns everything the network call needs, so a
//! front-end can race it against user input and still call
//! [`RequestController::cancel`] before feeding the outcome back through
//! [`RequestController::resolve`].

use std::time::{Duration, Instant};

use serde_json::Value;
use studio_contracts::chat::{ChatLog, ChatStore};
use studio_contracts::events::{EventPayload, EventWriter, LifecycleEvent};
use studio_contracts::generation::{GenerationRequest, GenerationResult, Style, ValidationError};
use studio_contracts::{ids, now_utc_iso};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::image_prep::{prepare_image, ImageError, PreparedImage, UploadedImage};
use crate::service::{GenerationService, ServiceError};

pub const NOTIFICATION_TTL: Duration = Duration::from_millis(2500);
pub const STOPPED_NOTIFICATION: &str = "Stopped generating image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Composing,
    Pending,
}

/// The combined generate/stop button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryAction {
    Generate { enabled: bool },
    Stop,
}

/// Failure of a submitted request, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("{0}")]
    Network(String),
}

impl From<ServiceError> for RequestError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Http { status, message } => RequestError::Http { status, message },
            ServiceError::Network(message) => RequestError::Network(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a generation request is already pending")]
    AlreadyPending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Succeeded(GenerationResult),
    Failed(RequestError),
    Cancelled,
}

/// A request that has been recorded in the log and is ready to be sent.
#[derive(Debug, Clone)]
pub struct Submission {
    request_id: String,
    request: GenerationRequest,
    token: CancellationToken,
}

impl Submission {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Awaits the service unless the token fires first. A response that lands
    /// after cancellation is discarded.
    pub async fn run<S>(&self, service: &S) -> Resolution
    where
        S: GenerationService + ?Sized,
    {
        if self.token.is_cancelled() {
            return Resolution::Cancelled;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Resolution::Cancelled,
            outcome = service.generate(&self.request) => {
                if self.token.is_cancelled() {
                    return Resolution::Cancelled;
                }
                match outcome {
                    Ok(result) => Resolution::Succeeded(result),
                    Err(err) => Resolution::Failed(err.into()),
                }
            }
        }
    }
}

#[derive(Debug)]
struct InFlight {
    request_id: String,
    token: CancellationToken,
}

#[derive(Debug)]
struct Notification {
    message: String,
    posted_at: Instant,
}

pub struct RequestController<S: ChatStore> {
    store: S,
    chat: ChatLog,
    image: Option<PreparedImage>,
    prompt: String,
    style: Option<Style>,
    in_flight: Option<InFlight>,
    error: Option<String>,
    notification: Option<Notification>,
    events: Option<EventWriter>,
}

impl<S: ChatStore> RequestController<S> {
    /// Restores the chat log from `store`.
    pub fn new(store: S) -> Self {
        let chat = store.load();
        debug!(entries = chat.len(), "chat log restored");
        Self {
            store,
            chat,
            image: None,
            prompt: String::new(),
            style: None,
            in_flight: None,
            error: None,
            notification: None,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn image(&self) -> Option<&PreparedImage> {
        self.image.as_ref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn style(&self) -> Option<Style> {
        self.style
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn pending_request_id(&self) -> Option<&str> {
        self.in_flight
            .as_ref()
            .map(|in_flight| in_flight.request_id.as_str())
    }

    /// Prepares and attaches an upload. On failure the previous image stays
    /// attached and the error becomes the current inline error.
    pub fn attach_image(&mut self, upload: &UploadedImage) -> Result<&PreparedImage, ImageError> {
        match prepare_image(upload) {
            Ok(prepared) => {
                debug!(
                    width = prepared.width,
                    height = prepared.height,
                    source_width = prepared.source_width,
                    source_height = prepared.source_height,
                    "image attached"
                );
                self.error = None;
                Ok(&*self.image.insert(prepared))
            }
            Err(err) => {
                warn!(error = %err, media_type = %upload.media_type, "image rejected");
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn attach_prepared(&mut self, prepared: PreparedImage) {
        self.image = Some(prepared);
        self.error = None;
    }

    pub fn remove_image(&mut self) -> bool {
        self.image.take().is_some()
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn set_style(&mut self, style: Option<Style>) {
        self.style = style;
    }

    pub fn clear_inputs(&mut self) {
        self.image = None;
        self.prompt.clear();
        self.style = None;
    }

    pub fn phase(&self) -> Phase {
        if self.in_flight.is_some() {
            Phase::Pending
        } else if self.image.is_some() || !self.prompt.is_empty() || self.style.is_some() {
            Phase::Composing
        } else {
            Phase::Idle
        }
    }

    pub fn can_submit(&self) -> bool {
        self.in_flight.is_none()
            && self.image.is_some()
            && !self.prompt.trim().is_empty()
            && self.style.is_some()
    }

    pub fn primary_action(&self) -> PrimaryAction {
        if self.in_flight.is_some() {
            PrimaryAction::Stop
        } else {
            PrimaryAction::Generate {
                enabled: self.can_submit(),
            }
        }
    }

    /// The transient notification, if it was posted less than
    /// [`NOTIFICATION_TTL`] before `now`.
    pub fn notification(&self, now: Instant) -> Option<&str> {
        self.notification
            .as_ref()
            .filter(|note| now.saturating_duration_since(note.posted_at) < NOTIFICATION_TTL)
            .map(|note| note.message.as_str())
    }

    /// e.g. `Image selected. Prompt: red sneakers. Style: Streetwear`
    pub fn live_summary(&self) -> String {
        let mut parts = Vec::new();
        if self.image.is_some() {
            parts.push("Image selected".to_string());
        }
        if !self.prompt.is_empty() {
            parts.push(format!("Prompt: {}", self.prompt));
        }
        if let Some(style) = self.style {
            parts.push(format!("Style: {style}"));
        }
        parts.join(". ")
    }

    pub fn submit(&mut self) -> Result<Submission, SubmitError> {
        self.submit_with_token(CancellationToken::new())
    }

    /// Like [`submit`](Self::submit), but cancelling `parent` also cancels
    /// the request.
    pub fn submit_linked(&mut self, parent: &CancellationToken) -> Result<Submission, SubmitError> {
        self.submit_with_token(parent.child_token())
    }

    fn submit_with_token(&mut self, token: CancellationToken) -> Result<Submission, SubmitError> {
        if self.in_flight.is_some() || self.chat.has_pending() {
            return Err(SubmitError::AlreadyPending);
        }
        let request = GenerationRequest::from_parts(
            self.image.as_ref().map(|image| image.data_url.as_str()),
            Some(self.prompt.as_str()),
            self.style,
        )?;

        let request_id = ids::request_id();
        if !self
            .chat
            .begin_request(&request_id, &request.encoded_image, &now_utc_iso())
        {
            return Err(SubmitError::AlreadyPending);
        }
        self.persist();
        self.error = None;
        self.in_flight = Some(InFlight {
            request_id: request_id.clone(),
            token: token.clone(),
        });
        self.clear_inputs();

        info!(request_id = %request_id, style = %request.style, "generation submitted");
        let mut payload = EventPayload::new();
        payload.insert("style".to_string(), Value::String(request.style.to_string()));
        payload.insert("prompt".to_string(), Value::String(request.prompt.clone()));
        self.emit(LifecycleEvent::Submitted, &request_id, payload);

        Ok(Submission {
            request_id,
            request,
            token,
        })
    }

    /// Applies the outcome of `request_id`. Returns false when it no longer
    /// matters: nothing in flight, another request in flight, or the request
    /// was cancelled in the meantime.
    pub fn resolve(&mut self, request_id: &str, resolution: Resolution) -> bool {
        let Some(in_flight) = self.in_flight.as_ref() else {
            debug!(request_id, "ignoring resolution with nothing in flight");
            return false;
        };
        if in_flight.request_id != request_id {
            debug!(request_id, current = %in_flight.request_id, "ignoring stale resolution");
            return false;
        }
        if in_flight.token.is_cancelled() || resolution == Resolution::Cancelled {
            self.cancel();
            return false;
        }
        self.in_flight = None;

        match resolution {
            Resolution::Succeeded(result) => {
                info!(request_id, result_id = %result.id, "generation succeeded");
                let mut payload = EventPayload::new();
                payload.insert("result_id".to_string(), Value::String(result.id.clone()));
                self.chat.resolve_success(request_id, result);
                self.persist();
                self.emit(LifecycleEvent::Succeeded, request_id, payload);
            }
            Resolution::Failed(err) => {
                let message = err.to_string();
                warn!(request_id, error = %message, "generation failed");
                let mut payload = EventPayload::new();
                payload.insert("error".to_string(), Value::String(message.clone()));
                if let RequestError::Http { status, .. } = &err {
                    payload.insert("status".to_string(), Value::from(*status));
                }
                self.chat.resolve_error(request_id, &message);
                self.error = Some(message);
                self.persist();
                self.emit(LifecycleEvent::Failed, request_id, payload);
            }
            Resolution::Cancelled => {}
        }
        true
    }

    /// Stops the in-flight request and drops its placeholder. No-op when idle.
    pub fn cancel(&mut self) -> bool {
        let Some(in_flight) = self.in_flight.take() else {
            return false;
        };
        in_flight.token.cancel();
        self.chat.remove_pending(&in_flight.request_id);
        self.persist();
        self.notification = Some(Notification {
            message: STOPPED_NOTIFICATION.to_string(),
            posted_at: Instant::now(),
        });
        info!(request_id = %in_flight.request_id, "generation cancelled");
        self.emit(
            LifecycleEvent::Cancelled,
            &in_flight.request_id,
            EventPayload::new(),
        );
        true
    }

    /// Submits, awaits `service` and applies the outcome. Cancelling `stop`
    /// while waiting cancels the request.
    pub async fn generate<G>(
        &mut self,
        service: &G,
        stop: &CancellationToken,
    ) -> Result<Resolution, SubmitError>
    where
        G: GenerationService + ?Sized,
    {
        let submission = self.submit_linked(stop)?;
        let resolution = submission.run(service).await;
        self.resolve(submission.request_id(), resolution.clone());
        Ok(resolution)
    }

    fn persist(&mut self) {
        self.store.save(&self.chat);
    }

    fn emit(&self, event: LifecycleEvent, request_id: &str, payload: EventPayload) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit(event, request_id, payload) {
            warn!(error = %err, event = event.as_str(), "failed to write event journal");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use serde_json::Value;
    use studio_contracts::chat::{ChatEntry, ChatStore, JsonFileChatStore, MemoryChatStore};
    use studio_contracts::events::EventWriter;
    use studio_contracts::generation::{
        ComposerField, GenerationRequest, GenerationResult, Style,
    };
    use tokio_util::sync::CancellationToken;

    use super::{
        Phase, PrimaryAction, RequestController, RequestError, Resolution, SubmitError,
        STOPPED_NOTIFICATION,
    };
    use crate::image_prep::tests::png_bytes;
    use crate::image_prep::{ImageError, PreparedImage, UploadedImage};
    use crate::mock::{MockBehavior, MockGenerationService};
    use crate::service::{GenerationService, ServiceError};

    const IMAGE: &str = "data:image/jpeg;base64,AAAA";

    /// Never answers; only cancellation ends a request sent here.
    struct StalledService;

    #[async_trait]
    impl GenerationService for StalledService {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<GenerationResult, ServiceError> {
            std::future::pending().await
        }
    }

    fn prepared() -> PreparedImage {
        PreparedImage {
            data_url: IMAGE.to_string(),
            width: 4,
            height: 4,
            source_width: 4,
            source_height: 4,
        }
    }

    fn compose<S: ChatStore>(controller: &mut RequestController<S>) {
        controller.attach_prepared(prepared());
        controller.set_prompt("red sneakers");
        controller.set_style(Some(Style::Streetwear));
    }

    #[test]
    fn phase_and_primary_action_follow_inputs() {
        let mut controller = RequestController::new(MemoryChatStore::new());
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(
            controller.primary_action(),
            PrimaryAction::Generate { enabled: false }
        );

        controller.set_prompt("red sneakers");
        assert_eq!(controller.phase(), Phase::Composing);
        assert!(!controller.can_submit());

        controller.attach_prepared(prepared());
        controller.set_style(Some(Style::Streetwear));
        assert!(controller.can_submit());
        assert_eq!(
            controller.live_summary(),
            "Image selected. Prompt: red sneakers. Style: Streetwear"
        );

        let _submission = controller.submit().unwrap();
        assert_eq!(controller.phase(), Phase::Pending);
        assert_eq!(controller.primary_action(), PrimaryAction::Stop);
    }

    #[test]
    fn whitespace_prompt_blocks_submit_and_leaves_log_alone() {
        let mut controller = RequestController::new(MemoryChatStore::new());
        controller.attach_prepared(prepared());
        controller.set_prompt("   ");
        controller.set_style(Some(Style::Vintage));
        assert!(!controller.can_submit());

        let err = controller.submit().unwrap_err();
        assert!(
            matches!(err, SubmitError::Validation(ref inner) if inner.missing == vec![ComposerField::Prompt])
        );
        assert!(controller.chat().is_empty());
        assert!(controller.store().raw().is_none());
        assert_eq!(controller.phase(), Phase::Composing);
    }

    #[test]
    fn submit_records_entries_and_clears_composer() {
        let mut controller = RequestController::new(MemoryChatStore::new());
        compose(&mut controller);
        let submission = controller.submit().unwrap();

        assert_eq!(submission.request().prompt, "red sneakers");
        assert_eq!(controller.pending_request_id(), Some(submission.request_id()));
        assert_eq!(controller.chat().len(), 2);
        assert!(matches!(
            &controller.chat().entries()[0],
            ChatEntry::User { id, encoded_image, .. }
                if id == submission.request_id() && encoded_image == IMAGE
        ));
        assert!(controller.chat().entries()[1].is_pending_for(submission.request_id()));
        assert!(controller.image().is_none());
        assert!(controller.prompt().is_empty());
        assert_eq!(controller.style(), None);
        assert!(controller.store().raw().is_some());
    }

    #[test]
    fn second_submit_while_pending_is_refused() {
        let mut controller = RequestController::new(MemoryChatStore::new());
        compose(&mut controller);
        let _first = controller.submit().unwrap();
        compose(&mut controller);
        assert_eq!(controller.submit().unwrap_err(), SubmitError::AlreadyPending);
        assert_eq!(controller.chat().pending_count(), 1);
        assert_eq!(controller.chat().len(), 2);
    }

    #[tokio::test]
    async fn scenario_success_replaces_placeholder() {
        let service = MockGenerationService::new(MockBehavior::instant(0.0));
        let mut controller = RequestController::new(MemoryChatStore::new());
        compose(&mut controller);

        let resolution = controller
            .generate(&service, &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(resolution, Resolution::Succeeded(_)));

        let entries = controller.chat().entries();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0], ChatEntry::User { .. }));
        match &entries[1] {
            ChatEntry::Result { id, result } => {
                assert_eq!(id, entries[0].request_id());
                assert_eq!(result.prompt, "red sneakers");
                assert_eq!(result.style, Style::Streetwear);
            }
            other => panic!("expected result entry, got {other:?}"),
        }
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.error(), None);
    }

    #[tokio::test]
    async fn scenario_overload_becomes_error_entry() {
        let service = MockGenerationService::new(MockBehavior::instant(1.0));
        let mut controller = RequestController::new(MemoryChatStore::new());
        compose(&mut controller);

        let resolution = controller
            .generate(&service, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::Failed(RequestError::Http {
                status: 429,
                message: "Model overloaded".to_string()
            })
        );
        assert!(matches!(
            &controller.chat().entries()[1],
            ChatEntry::Error { error_message, .. } if error_message == "Model overloaded"
        ));
        assert_eq!(controller.error(), Some("Model overloaded"));
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn scenario_cancel_keeps_only_user_entry() {
        let mut controller = RequestController::new(MemoryChatStore::new());
        compose(&mut controller);
        let submission = controller.submit().unwrap();

        let (resolution, cancelled) =
            tokio::join!(submission.run(&StalledService), async { controller.cancel() });
        assert!(cancelled);
        assert_eq!(resolution, Resolution::Cancelled);
        assert!(!controller.resolve(submission.request_id(), resolution));

        let entries = controller.chat().entries();
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0], ChatEntry::User { .. }));
        assert_eq!(controller.error(), None);
        assert_eq!(controller.notification(Instant::now()), Some(STOPPED_NOTIFICATION));
        assert_eq!(
            controller.store().load().entries(),
            controller.chat().entries()
        );
    }

    #[tokio::test]
    async fn cancel_on_full_log_keeps_ten_entries() {
        let service = MockGenerationService::new(MockBehavior::instant(0.0));
        let mut controller = RequestController::new(MemoryChatStore::new());
        for _ in 0..5 {
            compose(&mut controller);
            controller
                .generate(&service, &CancellationToken::new())
                .await
                .unwrap();
        }
        assert_eq!(controller.chat().len(), 10);
        let oldest_kept = controller.chat().entries()[1].clone();

        compose(&mut controller);
        let submission = controller.submit().unwrap();
        assert!(controller.cancel());

        let entries = controller.chat().entries();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0], oldest_kept);
        assert!(matches!(
            &entries[9],
            ChatEntry::User { id, .. } if id == submission.request_id()
        ));
        assert_eq!(controller.store().load().entries(), entries);
    }

    #[test]
    fn late_response_after_cancel_is_ignored() {
        let mut controller = RequestController::new(MemoryChatStore::new());
        compose(&mut controller);
        let submission = controller.submit().unwrap();
        assert!(controller.cancel());
        assert!(submission.token().is_cancelled());

        let late = GenerationResult {
            id: "late".to_string(),
            encoded_image: IMAGE.to_string(),
            prompt: "red sneakers".to_string(),
            style: Style::Streetwear,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        };
        assert!(!controller.resolve(submission.request_id(), Resolution::Succeeded(late)));
        assert_eq!(controller.chat().len(), 1);
        assert!(!controller.cancel());
    }

    #[test]
    fn resolution_for_unknown_request_is_ignored() {
        let mut controller = RequestController::new(MemoryChatStore::new());
        compose(&mut controller);
        let submission = controller.submit().unwrap();
        let failure = Resolution::Failed(RequestError::Network("offline".to_string()));
        assert!(!controller.resolve("someone-else", failure.clone()));
        assert_eq!(controller.pending_request_id(), Some(submission.request_id()));
        assert!(controller.resolve(submission.request_id(), failure));
        assert_eq!(controller.error(), Some("offline"));
    }

    #[tokio::test]
    async fn cancelling_parent_token_cancels_request() {
        let mut controller = RequestController::new(MemoryChatStore::new());
        compose(&mut controller);
        let stop = CancellationToken::new();
        let submission = controller.submit_linked(&stop).unwrap();

        stop.cancel();
        let resolution = submission.run(&StalledService).await;
        assert_eq!(resolution, Resolution::Cancelled);
        assert!(!controller.resolve(submission.request_id(), resolution));
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.chat().len(), 1);
        assert_eq!(controller.notification(Instant::now()), Some(STOPPED_NOTIFICATION));
    }

    #[test]
    fn notification_expires() {
        let mut controller = RequestController::new(MemoryChatStore::new());
        compose(&mut controller);
        let _submission = controller.submit().unwrap();
        controller.cancel();
        let later = Instant::now() + Duration::from_millis(2600);
        assert_eq!(controller.notification(later), None);
    }

    #[test]
    fn rejected_image_keeps_previous_attachment() {
        let mut controller = RequestController::new(MemoryChatStore::new());
        controller
            .attach_image(&UploadedImage::new("image/png", png_bytes(8, 8)))
            .unwrap();
        let before = controller.image().cloned();

        let err = controller
            .attach_image(&UploadedImage::new("image/gif", b"GIF89a".to_vec()))
            .unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedFormat { .. }));
        assert_eq!(controller.image().cloned(), before);
        assert_eq!(controller.error(), Some(err.to_string().as_str()));
        assert!(controller.chat().is_empty());

        assert!(controller.remove_image());
        assert!(!controller.remove_image());
    }

    #[tokio::test]
    async fn fifteen_generations_keep_ten_entries() {
        let service = MockGenerationService::new(MockBehavior::instant(0.5));
        let mut controller = RequestController::new(MemoryChatStore::new());
        for _ in 0..15 {
            compose(&mut controller);
            controller
                .generate(&service, &CancellationToken::new())
                .await
                .unwrap();
            assert!(controller.chat().len() <= 10);
            assert!(controller.store().load().len() <= 10);
        }
        assert_eq!(controller.chat().len(), 10);
        assert!(!controller.chat().has_pending());
    }

    #[tokio::test]
    async fn history_survives_restart() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let service = MockGenerationService::new(MockBehavior::instant(0.0));
        let mut controller = RequestController::new(JsonFileChatStore::in_dir(temp.path()));
        compose(&mut controller);
        controller
            .generate(&service, &CancellationToken::new())
            .await?;
        let saved = controller.chat().clone();

        let reopened = RequestController::new(JsonFileChatStore::in_dir(temp.path()));
        assert_eq!(reopened.chat(), &saved);
        Ok(())
    }

    #[test]
    fn pending_entry_from_crashed_session_is_dropped() {
        let mut first = RequestController::new(MemoryChatStore::new());
        compose(&mut first);
        let _abandoned = first.submit().unwrap();
        let raw = first.store().raw().unwrap_or_default().to_string();

        let mut second = RequestController::new(MemoryChatStore::with_raw(raw));
        assert_eq!(second.chat().len(), 1);
        compose(&mut second);
        assert!(second.submit().is_ok());
    }

    #[tokio::test]
    async fn failing_storage_does_not_block_requests() {
        let service = MockGenerationService::new(MockBehavior::instant(0.0));
        let mut controller = RequestController::new(MemoryChatStore::with_quota(8));
        compose(&mut controller);
        let resolution = controller
            .generate(&service, &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(resolution, Resolution::Succeeded(_)));
        assert_eq!(controller.chat().len(), 2);
        assert!(controller.store().failed_writes() >= 2);
    }

    #[tokio::test]
    async fn journal_records_lifecycle() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let mut controller = RequestController::new(MemoryChatStore::new())
            .with_events(EventWriter::new(&path, "session-1"));

        compose(&mut controller);
        controller
            .generate(
                &MockGenerationService::new(MockBehavior::instant(1.0)),
                &CancellationToken::new(),
            )
            .await?;
        compose(&mut controller);
        let _submission = controller.submit()?;
        controller.cancel();

        let kinds: Vec<String> = fs::read_to_string(&path)?
            .lines()
            .map(serde_json::from_str::<Value>)
            .collect::<Result<Vec<Value>, _>>()?
            .into_iter()
            .map(|line| line["type"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "request_submitted",
                "request_failed",
                "request_submitted",
                "request_cancelled"
            ]
        );
        Ok(())
    }
}
