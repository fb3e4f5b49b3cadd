//! The three execution contexts and the host glue between them.
//!
//! Each context runs as its own task and shares nothing with the others;
//! they talk only through the channels in [`crate::messages`].

pub mod background;
pub mod host;
pub mod page;
pub mod popup;

#[cfg(test)]
mod tests;

pub use background::{BackgroundContext, BackgroundHandle, TabResultCache};
pub use host::{BrowserHost, LocalBrowser, TabInfo};
pub use page::{PageContext, PageHandle, PageSnapshot, ReadyState};
pub use popup::{AnalyzeOutcome, PopupCoordinator, PopupSettings, PopupState};
