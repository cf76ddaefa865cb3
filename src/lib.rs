//! Browser provider for test runners.
//!
//! Adapts chromiumoxide's launch/navigate/screenshot/viewport APIs to the
//! session lifecycle contract a host test runner drives: `init →
//! open_browser → [resize/screenshot/hover] → close_browser → dispose`.
//! Optionally captures network activity per session and writes it as a HAR
//! 1.2 log and/or a self-contained HTML report when the session closes.
//!
//! The provider holds no global state beyond its session registry; the host
//! supplies a session id per call and is expected to issue calls for one
//! session sequentially.

pub mod config;
pub mod error;
pub mod har;
pub mod provider;
pub mod session;

pub use config::{
    HarOutputConfig, LaunchOverrides, LaunchPlan, ProviderConfig, ViewportSize,
};
pub use error::ProviderError;
pub use har::{Har, HarRecorder};
pub use provider::{BrowserProvider, ReadyGate};
pub use session::{ScreenSize, SessionRegistry};
