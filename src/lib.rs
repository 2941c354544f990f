//! Hot Mock
//!
//! A request-interception layer for HTTP clients. Canned responses live in
//! YAML files keyed by method and URL pattern; mocking can be switched on and
//! off at runtime, grouped into scenarios, and filled automatically by
//! recording live responses (VCR mode).
//!
//! # Features
//!
//! - **Toggle at runtime**: an enable marker file per environment
//! - **Pattern matching**: regex URL patterns, optional method filter, first match wins
//! - **Scenarios**: named sets of mocks layered over the default collection
//! - **Recording**: capture live responses once, replay them afterwards
//! - **Interpolation**: copy request body fields into mocked response bodies
//! - **Production guard**: configured environments never mock
//!
//! # Example Collection
//!
//! ```yaml
//! # mocks/development/hot_mocks.yml
//! - method: GET
//!   url_pattern: "api.example.com/widgets/\\d+"
//!   status: 200
//!   headers:
//!     Content-Type: application/json
//!   body:
//!     name: "Widget"
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use hot_mock::{HotMock, HotMockConfig, HttpMethod, OutgoingRequest};
//!
//! # async fn run() -> Result<(), hot_mock::HotMockError> {
//! let engine = HotMock::with_reqwest(HotMockConfig::default().with_env_overrides());
//! engine.enable()?;
//!
//! let request = OutgoingRequest::new(HttpMethod::Get, "https://api.example.com/widgets/1");
//! let response = engine.execute(&request).await?;
//! println!("{}", response.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod interpolate;
pub mod matcher;
pub mod mock;
pub mod recorder;
pub mod settings;
pub mod store;
pub mod transport;

pub use config::HotMockConfig;
pub use engine::{HotMock, Interception, MockResponse};
pub use error::{HotMockError, TransportError};
pub use mock::{HttpMethod, MockRecord};
pub use recorder::{RecordOutcome, SkipReason, MOCKED_HEADER, RECORDED_AT_HEADER};
pub use settings::{Settings, VcrMode};
pub use store::MockStore;
pub use transport::{LiveResponse, OutgoingRequest, ReqwestTransport, Transport};
