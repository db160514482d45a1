//! Device driver adapters for apptap.
//!
//! Two structurally different automation backends are normalized into the one
//! [`AppDriver`] capability surface the agent loop drives:
//!
//! - [`AppiumDriver`]: a WebDriver-protocol HTTP client for native Android and
//!   iOS apps. Element references are locator descriptors resolved against the
//!   remote endpoint at dispatch time; UI trees are polled as XML page source.
//! - [`FlutterDriver`]: a persistent WebSocket JSON-RPC connection to a
//!   running Dart VM service. Element references are widget finders; object
//!   handles returned by the inspector are only valid until the next widget
//!   rebuild, so nothing long-lived is kept.
//!
//! Both report connection loss as [`AdapterErrorKind::Transport`] and never
//! retry internally; retry policy belongs to the agent loop.

pub mod appium;
pub mod driver;
pub mod error;
pub mod flutter;
pub mod raw;
pub mod stub;

pub use appium::{AppiumConfig, AppiumDriver};
pub use driver::{AppDriver, ScrollDirection};
pub use error::{AdapterError, AdapterErrorKind};
pub use flutter::{FlutterConfig, FlutterDriver};
pub use raw::{FlutterFinder, LocatorSpec, RawNode, RawTree, TargetRef};
pub use stub::{RecordedAction, StubDriver};
