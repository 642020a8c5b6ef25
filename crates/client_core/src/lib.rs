//! Client side of CookFlow: the guided cooking session, the ports it talks
//! to, and an HTTP client for the server's request handlers.

pub mod controller;
pub mod error;
pub mod http;
pub mod ports;
pub mod session;

pub use controller::CookingController;
pub use error::{friendly_narration_reason, NarrationFailure, SessionError, SpeechError};
pub use http::{ClientError, CookflowClient};
pub use ports::{
    DiscardNarrationSink, JsonFileRecipeSupply, MissingSpeechService, NarrationSink,
    RecipeSupply, SpeechService,
};
pub use session::{
    format_clock, CookingSession, NarrationTicket, SessionEvent, SessionSnapshot, SessionSummary,
    StepStatus, TimerPhase, VoicePlaybackState,
};
