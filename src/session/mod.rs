pub mod archive;
pub mod chat_machine;
pub mod recorder_session;
pub mod status;

pub use archive::ConversationArchive;
pub use chat_machine::{ChatMachine, FlowOutcome, ToggleOutcome};
pub use recorder_session::{CompletedRecording, RecorderSession, SessionError, SessionState};
pub use status::{
    SessionPhase, SessionStatus, StatusHandle, ALERT_MICROPHONE, STATUS_ERROR, STATUS_PLAYBACK,
    STATUS_RECORDING, STATUS_SENDING,
};
