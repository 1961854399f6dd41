//! Session driver: runs the pipeline and feeds its events into the state.

use crate::catalog::{Catalog, LockModel};
use crate::error::{LockVizError, Result};
use crate::image::{
    compose, file_extension, payload_from_lenient, preview_file_name, read_door_image, DataUrl,
    GeneratedImage, ImageEditor, PromptTemplate, ReferenceFetcher,
};
use crate::locale::Language;
use crate::session::state::{Event, Outcome, Rejection, RequestId, SessionState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{watch, Notify};

/// Default deadline for one generation (reference fetch plus remote call).
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// Session-wide settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Instruction template sent with every request.
    pub prompt: PromptTemplate,
    /// Deadline for one generation.
    pub deadline: Duration,
    /// Initial display language.
    pub language: Language,
    /// Prefix for downloaded preview file names.
    pub download_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prompt: PromptTemplate::default(),
            deadline: DEFAULT_DEADLINE,
            language: Language::default(),
            download_prefix: "lockviz".to_string(),
        }
    }
}

impl SessionConfig {
    /// Sets the prompt template.
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    /// Sets the generation deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Sets the initial language.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Sets the download file name prefix.
    pub fn with_download_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.download_prefix = prefix.into();
        self
    }
}

/// One user's preview session.
///
/// State lives in a watch channel: front ends call [`Session::subscribe`]
/// to be notified of every new snapshot.
pub struct Session {
    catalog: Catalog,
    editor: Arc<dyn ImageEditor>,
    fetcher: Arc<dyn ReferenceFetcher>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    cancel: Notify,
}

impl Session {
    /// Creates an Idle session with the first catalog lock selected.
    pub fn new(
        catalog: Catalog,
        editor: Arc<dyn ImageEditor>,
        fetcher: Arc<dyn ReferenceFetcher>,
        config: SessionConfig,
    ) -> Self {
        let initial = SessionState::new(catalog.first().id.clone(), config.language);
        let (state, _) = watch::channel(initial);
        Self {
            catalog,
            editor,
            fetcher,
            config,
            state,
            cancel: Notify::new(),
        }
    }

    /// Returns the current snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Subscribes to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The lock catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The currently selected lock.
    pub fn selected_lock(&self) -> Result<LockModel> {
        let id = self.state.borrow().selected_lock().to_string();
        self.catalog
            .get(&id)
            .cloned()
            .ok_or(LockVizError::UnknownLock(id))
    }

    /// Applies one event to the state.
    pub fn dispatch(&self, event: Event) -> Outcome {
        let mut outcome = Outcome::Ignored;
        self.state.send_if_modified(|state| {
            let (next, result) = state.apply(event);
            outcome = result;
            let modified = next != *state;
            *state = next;
            modified
        });
        outcome
    }

    /// Loads a door photo from disk.
    ///
    /// On failure the session moves to Error and the error is returned.
    pub async fn upload(&self, path: impl AsRef<Path>) -> Result<()> {
        match read_door_image(path).await {
            Ok(image) => {
                self.upload_data_url(image);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to read door image");
                self.cancel.notify_waiters();
                self.dispatch(Event::UploadFailed(e.message_kind()));
                Err(e)
            }
        }
    }

    /// Replaces the door photo. Any running request becomes stale.
    pub fn upload_data_url(&self, image: DataUrl) {
        self.cancel.notify_waiters();
        self.dispatch(Event::Upload(image));
    }

    /// Replaces the door photo from a data URL or bare base64 text.
    ///
    /// Bare base64 is taken as a PNG image.
    pub fn upload_base64(&self, raw: &str) {
        self.upload_data_url(payload_from_lenient(raw.trim()).to_data_url());
    }

    /// Selects a catalog lock by id.
    pub fn select_lock(&self, id: &str) -> Result<()> {
        if self.catalog.get(id).is_none() {
            return Err(LockVizError::UnknownLock(id.to_string()));
        }
        self.dispatch(Event::SelectLock(id.to_string()));
        Ok(())
    }

    /// Switches the display language.
    pub fn set_language(&self, language: Language) {
        self.dispatch(Event::SetLanguage(language));
    }

    /// Cancels the running request, if any.
    pub fn cancel(&self) {
        if self.dispatch(Event::Cancel) == Outcome::Applied {
            tracing::debug!("generation cancelled");
            self.cancel.notify_waiters();
        }
    }

    /// Runs one generation for the current door photo and selected lock.
    ///
    /// Every failure after the request starts is recorded in the state as
    /// `Status::Error` with a localized message, and also returned.
    pub async fn generate(&self) -> Result<DataUrl> {
        // Register interest before starting so a cancel cannot slip past.
        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);
        cancelled.as_mut().enable();

        let request = match self.dispatch(Event::GenerateRequested) {
            Outcome::Started(id) => id,
            Outcome::Rejected(Rejection::MissingDoorImage) => {
                return Err(LockVizError::MissingDoorImage)
            }
            Outcome::Rejected(Rejection::AlreadyGenerating) => {
                return Err(LockVizError::AlreadyGenerating)
            }
            other => {
                return Err(LockVizError::InvalidRequest(format!(
                    "unexpected generate outcome: {other:?}"
                )))
            }
        };

        let result = tokio::select! {
            result = self.run_with_deadline() => result,
            _ = &mut cancelled => Err(LockVizError::Cancelled),
        };

        self.finish(request, result)
    }

    async fn run_with_deadline(&self) -> Result<GeneratedImage> {
        let deadline = self.config.deadline;
        tokio::time::timeout(deadline, self.run_pipeline())
            .await
            .unwrap_or(Err(LockVizError::Timeout(deadline)))
    }

    async fn run_pipeline(&self) -> Result<GeneratedImage> {
        let (door, lock) = {
            let state = self.state.borrow();
            let door = state
                .door_image()
                .cloned()
                .ok_or(LockVizError::MissingDoorImage)?;
            (door, state.selected_lock().to_string())
        };
        let lock = self
            .catalog
            .get(&lock)
            .ok_or(LockVizError::UnknownLock(lock.clone()))?;

        let reference = self.fetcher.fetch(&lock.image_url).await?;
        let request = compose(door.to_payload(), reference, &self.config.prompt, lock);
        self.editor.edit(&request).await
    }

    fn finish(&self, request: RequestId, result: Result<GeneratedImage>) -> Result<DataUrl> {
        match result {
            Ok(image) => {
                let url = image.to_data_url();
                let outcome = self.dispatch(Event::GenerateSucceeded {
                    request,
                    image: url.clone(),
                });
                if outcome == Outcome::Ignored {
                    tracing::warn!(request = request.get(), "dropping stale generation result");
                    return Err(LockVizError::Cancelled);
                }
                tracing::info!(
                    request = request.get(),
                    editor = self.editor.name(),
                    encoded_len = image.data.len(),
                    duration_ms = image.metadata.duration_ms,
                    "preview generated"
                );
                Ok(url)
            }
            Err(e) => {
                tracing::error!(request = request.get(), error = %e, "preview generation failed");
                let outcome = self.dispatch(Event::GenerateFailed {
                    request,
                    kind: e.message_kind(),
                });
                if outcome == Outcome::Ignored {
                    tracing::warn!(request = request.get(), "generation superseded before failing");
                }
                Err(e)
            }
        }
    }

    /// Saves the current preview into `dir` under a timestamped file name.
    pub async fn save_result(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let (url, bytes) = self.result_bytes()?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let extension = file_extension(url.mime_type(), &bytes);
        let path = dir.as_ref().join(preview_file_name(
            &self.config.download_prefix,
            millis,
            &extension,
        ));
        tokio::fs::write(&path, &bytes).await?;
        tracing::info!(path = %path.display(), "saved preview");
        Ok(path)
    }

    /// Saves the current preview to an explicit path.
    pub async fn save_result_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let (_, bytes) = self.result_bytes()?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    fn result_bytes(&self) -> Result<(DataUrl, Vec<u8>)> {
        let url = self
            .state
            .borrow()
            .result_image()
            .cloned()
            .ok_or_else(|| LockVizError::InvalidRequest("no preview to save".into()))?;
        let bytes = url.decode()?;
        Ok((url, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{EditRequest, GenerationMetadata, ImagePayload};
    use crate::locale::{message, MessageKind};
    use crate::session::state::Status;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Reply {
        Image(&'static str),
        Typed(&'static str, &'static str),
        Fail(fn() -> LockVizError),
        Hang,
    }

    struct MockEditor {
        reply: Reply,
        calls: AtomicUsize,
        last_request: Mutex<Option<EditRequest>>,
    }

    impl MockEditor {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageEditor for MockEditor {
        async fn edit(&self, request: &EditRequest) -> Result<GeneratedImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            match &self.reply {
                Reply::Image(data) => Ok(GeneratedImage::new(
                    *data,
                    "image/png",
                    GenerationMetadata::default(),
                )),
                Reply::Typed(mime, data) => Ok(GeneratedImage::new(
                    *data,
                    *mime,
                    GenerationMetadata::default(),
                )),
                Reply::Fail(make) => Err(make()),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(LockVizError::EmptyResult("unreachable".into()))
                }
            }
        }

        fn name(&self) -> &str {
            "mock"
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    struct StaticFetcher {
        fail: bool,
    }

    #[async_trait]
    impl ReferenceFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<ImagePayload> {
            if self.fail {
                return Err(LockVizError::ReferenceFetch(format!("HTTP 404 from {url}")));
            }
            Ok(ImagePayload::new("image/webp", "TE9DSw=="))
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            LockModel::new("L-01", "Classic Grip", "https://cdn.example.com/l01.png"),
            LockModel::new("L-02", "Push-Pull Slim", "https://cdn.example.com/l02.webp"),
        ])
        .unwrap()
    }

    fn session(editor: Arc<MockEditor>, fail_fetch: bool, language: Language) -> Session {
        Session::new(
            catalog(),
            editor,
            Arc::new(StaticFetcher { fail: fail_fetch }),
            SessionConfig::default()
                .with_language(language)
                .with_deadline(Duration::from_secs(5)),
        )
    }

    fn door() -> DataUrl {
        DataUrl::parse("data:image/jpeg;base64,RE9PUg==").unwrap()
    }

    #[tokio::test]
    async fn test_generate_without_door_makes_no_call() {
        let editor = MockEditor::new(Reply::Image("QUJD"));
        let session = session(editor.clone(), false, Language::En);

        let err = session.generate().await.unwrap_err();
        assert!(matches!(err, LockVizError::MissingDoorImage));
        assert_eq!(editor.calls(), 0);

        let state = session.state();
        assert_eq!(state.status(), Status::Idle);
        assert_eq!(
            state.error_message(),
            Some(message(Language::En, MessageKind::UploadFirst))
        );
    }

    #[tokio::test]
    async fn test_scenario_door_jpg_lock_l02() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("door.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();

        let editor = MockEditor::new(Reply::Image("QUJD"));
        let session = session(editor.clone(), false, Language::En);
        session.upload(&path).await.unwrap();
        session.select_lock("L-02").unwrap();

        let url = session.generate().await.unwrap();
        assert_eq!(url.as_str(), "data:image/png;base64,QUJD");

        let state = session.state();
        assert_eq!(state.status(), Status::Success);
        assert_eq!(
            state.result_image().map(DataUrl::as_str),
            Some("data:image/png;base64,QUJD")
        );
        assert!(state.error_message().is_none());

        let sent = editor.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.door.mime_type, "image/jpeg");
        assert_eq!(sent.reference, ImagePayload::new("image/webp", "TE9DSw=="));
        assert_eq!(sent.lock_id, "L-02");
        assert!(sent.instruction.contains("Push-Pull Slim"));
    }

    #[tokio::test]
    async fn test_scenario_rate_limited_uses_quota_message() {
        let editor = MockEditor::new(Reply::Fail(|| LockVizError::RateLimited {
            retry_after: None,
        }));
        let session = session(editor, false, Language::Bm);
        session.upload_data_url(door());
        session.select_lock("L-02").unwrap();

        let err = session.generate().await.unwrap_err();
        assert!(matches!(err, LockVizError::RateLimited { .. }));

        let state = session.state();
        assert_eq!(state.status(), Status::Error);
        assert_eq!(
            state.error_message(),
            Some(message(Language::Bm, MessageKind::Quota))
        );
        assert_ne!(
            state.error_message(),
            Some(message(Language::Bm, MessageKind::Generic))
        );
        assert!(state.result_image().is_none());
    }

    #[tokio::test]
    async fn test_empty_result_uses_generic_message() {
        let editor = MockEditor::new(Reply::Fail(|| {
            LockVizError::EmptyResult("no image data in Gemini response".into())
        }));
        let session = session(editor, false, Language::En);
        session.upload_data_url(door());

        assert!(session.generate().await.is_err());
        let state = session.state();
        assert_eq!(state.status(), Status::Error);
        assert_eq!(
            state.error_message(),
            Some(message(Language::En, MessageKind::Generic))
        );
        assert!(state.result_image().is_none());
    }

    #[tokio::test]
    async fn test_reference_fetch_failure_skips_remote_call() {
        let editor = MockEditor::new(Reply::Image("QUJD"));
        let session = session(editor.clone(), true, Language::En);
        session.upload_data_url(door());

        let err = session.generate().await.unwrap_err();
        assert!(matches!(err, LockVizError::ReferenceFetch(_)));
        assert_eq!(editor.calls(), 0);
        assert_eq!(session.state().status(), Status::Error);
    }

    #[tokio::test]
    async fn test_upload_after_success_resets_to_idle() {
        let editor = MockEditor::new(Reply::Image("QUJD"));
        let session = session(editor, false, Language::En);
        session.upload_data_url(door());
        session.generate().await.unwrap();

        session.upload_data_url(door());
        let state = session.state();
        assert_eq!(state.status(), Status::Idle);
        assert!(state.result_image().is_none());
        assert!(state.error_message().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_produces_timeout() {
        let editor = MockEditor::new(Reply::Hang);
        let session = session(editor, false, Language::En);
        session.upload_data_url(door());

        let err = session.generate().await.unwrap_err();
        assert!(matches!(err, LockVizError::Timeout(d) if d == Duration::from_secs(5)));
        assert_eq!(session.state().error_kind(), Some(MessageKind::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_reject_concurrent_trigger() {
        let editor = MockEditor::new(Reply::Hang);
        let session = Arc::new(session(editor, false, Language::En));
        session.upload_data_url(door());

        let running = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.generate().await }
        });

        let mut rx = session.subscribe();
        rx.wait_for(|s| s.status() == Status::Generating).await.unwrap();

        let second = session.generate().await.unwrap_err();
        assert!(matches!(second, LockVizError::AlreadyGenerating));

        session.cancel();
        let first = running.await.unwrap().unwrap_err();
        assert!(matches!(first, LockVizError::Cancelled));

        let state = session.state();
        assert_eq!(state.status(), Status::Error);
        assert_eq!(state.error_kind(), Some(MessageKind::Cancelled));
    }

    #[tokio::test]
    async fn test_unknown_lock_is_rejected() {
        let session = session(MockEditor::new(Reply::Hang), false, Language::En);
        let err = session.select_lock("L-99").unwrap_err();
        assert!(matches!(err, LockVizError::UnknownLock(_)));
        assert_eq!(session.selected_lock().unwrap().id, "L-01");
    }

    #[tokio::test]
    async fn test_save_result_uses_timestamped_name() {
        let session = session(MockEditor::new(Reply::Image("QUJD")), false, Language::En);
        let dir = tempfile::tempdir().unwrap();
        assert!(session.save_result(dir.path()).await.is_err());

        session.upload_data_url(door());
        session.generate().await.unwrap();

        let path = session.save_result(dir.path()).await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("lockviz-preview-"));
        assert!(name.ends_with(".png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"ABC");
    }

    #[tokio::test]
    async fn test_save_result_keeps_unlisted_mime_extension() {
        let session = session(
            MockEditor::new(Reply::Typed("image/gif", "R0lGODlh")),
            false,
            Language::En,
        );
        session.upload_data_url(door());
        session.generate().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = session.save_result(dir.path()).await.unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("gif"));
        assert_eq!(std::fs::read(&path).unwrap(), b"GIF89a");
    }

    #[tokio::test]
    async fn test_upload_bare_base64_is_taken_as_png() {
        let editor = MockEditor::new(Reply::Image("QUJD"));
        let session = session(editor.clone(), false, Language::En);

        session.upload_base64("RE9PUg==\n");
        assert_eq!(
            session.state().door_image().map(DataUrl::as_str),
            Some("data:image/png;base64,RE9PUg==")
        );

        session.upload_base64("data:image/jpeg;base64,RE9PUg==");
        assert_eq!(session.state().door_image(), Some(&door()));

        session.upload_base64("RE9PUg==");
        session.generate().await.unwrap();
        let sent = editor.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.door, ImagePayload::new("image/png", "RE9PUg=="));
    }

    #[tokio::test]
    async fn test_snapshots_share_image_buffers() {
        let session = session(MockEditor::new(Reply::Image("QUJD")), false, Language::En);
        session.upload_data_url(door());
        session.generate().await.unwrap();

        let first = session.state();
        session.set_language(Language::Bm);
        let second = session.state();

        let ptr = |s: &SessionState| s.door_image().map(|d| d.as_str().as_ptr());
        assert_eq!(ptr(&first), ptr(&second));
        assert_eq!(
            first.result_image().map(|d| d.as_str().as_ptr()),
            second.result_image().map(|d| d.as_str().as_ptr())
        );
    }
}
