pub mod browser;
pub mod config;

pub use browser::{BrowserTrait, ElementPath, PathStep, WaitUntil};
pub use config::{AppConfig, BrowserConfig, Config, TimeoutConfig, Viewport};
