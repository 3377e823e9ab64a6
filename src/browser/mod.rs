pub mod chrome;
pub mod script;
pub mod session;

pub use chrome::ChromeBrowser;
pub use session::{with_session, ResolvedElement, Session};
