//! Session state snapshot and its pure transition function.

use crate::image::DataUrl;
use crate::locale::{message, Language, MessageKind};
use serde::Serialize;

/// Visible status of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting for input or a user action.
    #[default]
    Idle,
    /// One generation request is in flight.
    Generating,
    /// The last generation produced a preview.
    Success,
    /// The last action failed.
    Error,
}

/// Token identifying one generation request.
///
/// Ids increase monotonically within a session; a completion is accepted
/// only if its id matches the request currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RequestId(u64);

impl RequestId {
    /// Returns the raw id.
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Inputs that drive the session.
#[derive(Debug, Clone)]
pub enum Event {
    /// A new door photo was loaded.
    Upload(DataUrl),
    /// Loading a door photo failed.
    UploadFailed(MessageKind),
    /// A catalog lock was selected (id already validated).
    SelectLock(String),
    /// The display language changed.
    SetLanguage(Language),
    /// The user asked for a preview.
    GenerateRequested,
    /// A request finished with a preview image.
    GenerateSucceeded {
        /// Request this result belongs to.
        request: RequestId,
        /// The preview as a data URL.
        image: DataUrl,
    },
    /// A request failed.
    GenerateFailed {
        /// Request this failure belongs to.
        request: RequestId,
        /// Message to show.
        kind: MessageKind,
    },
    /// The user cancelled the running request.
    Cancel,
}

/// Why a generate request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No door photo has been uploaded.
    MissingDoorImage,
    /// A request is already in flight.
    AlreadyGenerating,
}

/// What applying an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The state was updated.
    Applied,
    /// A generation request was started with this token.
    Started(RequestId),
    /// The event was refused; see the state's error message.
    Rejected(Rejection),
    /// The event had no effect (stale completion, nothing to cancel).
    Ignored,
}

/// Immutable snapshot of everything the front end renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    door_image: Option<DataUrl>,
    result_image: Option<DataUrl>,
    status: Status,
    error: Option<MessageKind>,
    selected_lock: String,
    language: Language,
    #[serde(skip)]
    in_flight: Option<RequestId>,
    #[serde(skip)]
    next_request: u64,
}

impl SessionState {
    /// Creates the initial Idle state with the given lock selected.
    pub fn new(selected_lock: impl Into<String>, language: Language) -> Self {
        Self {
            door_image: None,
            result_image: None,
            status: Status::Idle,
            error: None,
            selected_lock: selected_lock.into(),
            language,
            in_flight: None,
            next_request: 1,
        }
    }

    /// The uploaded door photo.
    pub fn door_image(&self) -> Option<&DataUrl> {
        self.door_image.as_ref()
    }

    /// The generated preview; only set while `status() == Status::Success`.
    pub fn result_image(&self) -> Option<&DataUrl> {
        self.result_image.as_ref()
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Kind of the current error, if any.
    pub fn error_kind(&self) -> Option<MessageKind> {
        self.error
    }

    /// Current error text in the active language.
    pub fn error_message(&self) -> Option<&'static str> {
        self.error.map(|kind| message(self.language, kind))
    }

    /// Id of the selected catalog lock.
    pub fn selected_lock(&self) -> &str {
        &self.selected_lock
    }

    /// Active display language.
    pub fn language(&self) -> Language {
        self.language
    }

    /// Request currently in flight.
    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight
    }

    /// Whether the generate button is enabled.
    pub fn can_generate(&self) -> bool {
        self.door_image.is_some() && self.status != Status::Generating
    }

    /// Applies one event, returning the next snapshot and what happened.
    pub fn apply(&self, event: Event) -> (SessionState, Outcome) {
        let mut next = self.clone();
        let outcome = match event {
            Event::Upload(image) => {
                next.door_image = Some(image);
                next.result_image = None;
                next.error = None;
                next.status = Status::Idle;
                next.in_flight = None;
                Outcome::Applied
            }
            Event::UploadFailed(kind) => {
                next.result_image = None;
                next.error = Some(kind);
                next.status = Status::Error;
                next.in_flight = None;
                Outcome::Applied
            }
            Event::SelectLock(id) => {
                next.selected_lock = id;
                Outcome::Applied
            }
            Event::SetLanguage(language) => {
                next.language = language;
                Outcome::Applied
            }
            Event::GenerateRequested => {
                if self.status == Status::Generating {
                    return (next, Outcome::Rejected(Rejection::AlreadyGenerating));
                }
                if self.door_image.is_none() {
                    next.error = Some(MessageKind::UploadFirst);
                    return (next, Outcome::Rejected(Rejection::MissingDoorImage));
                }
                let id = RequestId(self.next_request);
                next.next_request += 1;
                next.in_flight = Some(id);
                next.status = Status::Generating;
                next.result_image = None;
                next.error = None;
                Outcome::Started(id)
            }
            Event::GenerateSucceeded { request, image } => {
                if self.in_flight != Some(request) {
                    return (next, Outcome::Ignored);
                }
                next.in_flight = None;
                next.status = Status::Success;
                next.result_image = Some(image);
                next.error = None;
                Outcome::Applied
            }
            Event::GenerateFailed { request, kind } => {
                if self.in_flight != Some(request) {
                    return (next, Outcome::Ignored);
                }
                next.in_flight = None;
                next.status = Status::Error;
                next.result_image = None;
                next.error = Some(kind);
                Outcome::Applied
            }
            Event::Cancel => {
                if self.in_flight.is_none() {
                    return (next, Outcome::Ignored);
                }
                next.in_flight = None;
                next.status = Status::Error;
                next.error = Some(MessageKind::Cancelled);
                Outcome::Applied
            }
        };
        (next, outcome)
    }
}
