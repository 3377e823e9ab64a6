pub mod browser;
pub mod core;
pub mod discovery;
pub mod errors;
pub mod operations;
pub mod resolver;
pub mod selectors;
pub mod testing;
pub mod types;
pub mod waiter;

pub use browser::{with_session, ChromeBrowser, ResolvedElement, Session};
pub use crate::core::{BrowserConfig, BrowserTrait, Config, TimeoutConfig, Viewport};
pub use discovery::NotebookDiscoveryEngine;
pub use errors::{PilotError, Result};
pub use operations::{HealthReport, NotebookClient};
pub use resolver::ElementResolver;
pub use selectors::{Candidate, SelectorCatalog, SelectorSet, Slot};
pub use types::*;
pub use waiter::{Completion, CompletionWaiter};
