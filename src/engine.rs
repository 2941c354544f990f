//! The dispatch engine.
//!
//! [`HotMock`] owns the configuration, the mock store, the persisted state
//! (enable flag and settings), and the transport. Every outgoing call goes
//! through [`HotMock::intercept`], which decides between serving a stored
//! mock, recording a new one, and passing the call through.

use crate::config::{is_single_segment, HotMockConfig};
use crate::error::{HotMockError, Result};
use crate::interpolate::{is_interpolated, render_body};
use crate::matcher::Matcher;
use crate::mock::{set_header, HttpMethod, MockRecord};
use crate::recorder::{RecordOutcome, Recorder, MOCKED_HEADER};
use crate::settings::{EnableFlag, Settings, SettingsStore, VcrMode};
use crate::store::MockStore;
use crate::transport::{LiveResponse, OutgoingRequest, ReqwestTransport, Transport};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A response synthesized from a stored mock.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub body: serde_json::Value,
}

impl MockResponse {
    fn from_record(record: &MockRecord, request: &OutgoingRequest) -> Self {
        let body = if is_interpolated(record) {
            render_body(record, request.body.as_deref())
        } else {
            record.body.clone()
        };

        let mut headers = record.headers.clone();
        set_header(&mut headers, MOCKED_HEADER.to_string(), "true".to_string());

        Self {
            status: record.status,
            headers,
            body,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as wire bytes: strings verbatim, null as empty, anything else as JSON.
    pub fn body_bytes(&self) -> Vec<u8> {
        match &self.body {
            serde_json::Value::Null => Vec::new(),
            serde_json::Value::String(s) => s.clone().into_bytes(),
            other => other.to_string().into_bytes(),
        }
    }

    pub fn into_live(self) -> LiveResponse {
        let body = self.body_bytes();
        LiveResponse {
            status: self.status,
            headers: self.headers,
            body,
        }
    }
}

/// Decision made for one outgoing call.
#[derive(Debug, Clone, PartialEq)]
pub enum Interception {
    /// Serve this response instead of calling the network.
    Mocked(MockResponse),
    /// Let the real transport handle the call.
    PassThrough,
}

/// Hot-swappable HTTP mocking engine.
pub struct HotMock {
    config: HotMockConfig,
    store: MockStore,
    enabled: EnableFlag,
    settings: SettingsStore,
    transport: Arc<dyn Transport>,
}

impl HotMock {
    /// Create an engine using `transport` for live calls.
    pub fn new(config: HotMockConfig, transport: Arc<dyn Transport>) -> Self {
        let store = MockStore::new(config.mocks_root());
        let enabled = EnableFlag::new(config.enabled_flag_path());
        let settings = SettingsStore::new(config.settings_path());

        debug!(
            environment = %config.environment,
            mocks_root = %store.root().display(),
            production = config.is_production(),
            "Hot mock engine initialized"
        );

        Self {
            config,
            store,
            enabled,
            settings,
            transport,
        }
    }

    /// Create an engine backed by a default `reqwest` client.
    pub fn with_reqwest(config: HotMockConfig) -> Self {
        Self::new(config, Arc::new(ReqwestTransport::new()))
    }

    pub fn config(&self) -> &HotMockConfig {
        &self.config
    }

    pub fn store(&self) -> &MockStore {
        &self.store
    }

    // Enable flag

    pub fn enable(&self) -> Result<()> {
        self.enabled.enable()?;
        info!(environment = %self.config.environment, "Mocking enabled");
        Ok(())
    }

    pub fn disable(&self) -> Result<()> {
        self.enabled.disable()?;
        info!(environment = %self.config.environment, "Mocking disabled");
        Ok(())
    }

    /// Flip the enable flag and return the new state.
    pub fn toggle(&self) -> Result<bool> {
        let enabled = self.enabled.toggle()?;
        info!(environment = %self.config.environment, enabled, "Mocking toggled");
        Ok(enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.is_enabled()
    }

    pub fn is_disabled(&self) -> bool {
        !self.is_enabled()
    }

    // Mocks

    /// Store `record` in the current scope, replacing any record with its key.
    pub fn mock(&self, record: MockRecord) -> Result<()> {
        let scenario = self.scenario();
        self.store.upsert(scenario.as_deref(), record)
    }

    /// Remove the record keyed (method, url_pattern) from the current scope.
    pub fn delete(&self, method: HttpMethod, url_pattern: &str) -> Result<bool> {
        let scenario = self.scenario();
        self.store
            .delete(scenario.as_deref(), Some(method), url_pattern)
    }

    /// The record that would answer `method` `url` in the current scope.
    pub fn mocked(&self, method: HttpMethod, url: &str) -> Result<Option<MockRecord>> {
        let matcher = Matcher::new(self.mocks());
        Ok(matcher.find(method, url)?.map(|m| m.record.clone()))
    }

    pub fn is_mocked(&self, method: HttpMethod, url: &str) -> Result<bool> {
        Ok(self.mocked(method, url)?.is_some())
    }

    /// Every record visible in the current scope, in match order.
    pub fn mocks(&self) -> Vec<MockRecord> {
        let scenario = self.scenario();
        self.store.load(scenario.as_deref())
    }

    // Recording

    /// Record `request` unless it is already mocked.
    ///
    /// With `into_scenario`, that scenario becomes active first.
    pub async fn record(
        &self,
        request: &OutgoingRequest,
        into_scenario: Option<&str>,
    ) -> Result<RecordOutcome> {
        if let Some(name) = into_scenario {
            self.set_scenario(Some(name))?;
        }
        let scenario = self.scenario();
        Recorder::new(&self.store, self.transport.as_ref())
            .record(request, scenario.as_deref())
            .await
    }

    /// Record `request`, replacing any existing record with its key.
    pub async fn record_forced(&self, request: &OutgoingRequest) -> Result<RecordOutcome> {
        let scenario = self.scenario();
        Recorder::new(&self.store, self.transport.as_ref())
            .record_forced(request, scenario.as_deref())
            .await
    }

    // Settings

    /// Persisted settings, if any have been written.
    pub fn settings(&self) -> Option<Settings> {
        self.settings.load()
    }

    /// Delete the settings file.
    pub fn reset_settings(&self) -> Result<()> {
        self.settings.reset()
    }

    pub fn scenario(&self) -> Option<String> {
        self.settings.current().scenario
    }

    /// Activate `name` (creating its subtree), or clear the scenario with `None`.
    pub fn set_scenario(&self, name: Option<&str>) -> Result<()> {
        if let Some(name) = name {
            check_scenario(name)?;
        }

        let mut settings = self.settings.current();
        settings.scenario = name.map(str::to_string);
        self.settings.save(&settings)?;

        if name.is_some() {
            self.store.ensure_exists(name)?;
        }
        info!(scenario = ?name, "Scenario set");
        Ok(())
    }

    pub fn scenarios(&self) -> Vec<String> {
        self.store.scenarios()
    }

    pub fn vcr(&self) -> VcrMode {
        self.settings.current().vcr
    }

    pub fn set_vcr(&self, mode: VcrMode) -> Result<()> {
        if let Some(name) = mode.scenario() {
            check_scenario(name)?;
        }

        let mut settings = self.settings.current();
        settings.vcr = mode;
        self.settings.save(&settings)?;
        info!(vcr = ?settings.vcr, "VCR mode set");
        Ok(())
    }

    // Dispatch

    /// Decide how to answer `request`.
    pub async fn intercept(&self, request: &OutgoingRequest) -> Result<Interception> {
        if self.config.is_production() {
            return Ok(Interception::PassThrough);
        }

        if !self.is_enabled() {
            return Ok(Interception::PassThrough);
        }

        let settings = self.settings.current();
        let mut scenario = settings.scenario;
        let mut matcher = Matcher::new(self.store.load(scenario.as_deref()));

        // Pattern errors are reported by the match below.
        if settings.vcr.is_on() && matches!(matcher.find(request.method, &request.url), Ok(None)) {
            self.record_on_miss(request, &settings.vcr).await;

            // Recording may have switched the active scenario.
            scenario = self.scenario();
            matcher = Matcher::new(self.store.load(scenario.as_deref()));
        }

        match matcher.find(request.method, &request.url)? {
            Some(result) => {
                if self.config.settings.log_matches {
                    info!(
                        method = %request.method,
                        url = %request.url,
                        url_pattern = %result.record.url_pattern,
                        status = result.record.status,
                        scenario = ?scenario,
                        "Serving mock"
                    );
                }
                Ok(Interception::Mocked(MockResponse::from_record(
                    result.record,
                    request,
                )))
            }
            None => {
                if self.config.settings.log_unmatched {
                    debug!(
                        method = %request.method,
                        url = %request.url,
                        scenario = ?scenario,
                        "No matching mock, passing through"
                    );
                }
                Ok(Interception::PassThrough)
            }
        }
    }

    /// Intercept `request`, falling back to the real transport.
    pub async fn execute(&self, request: &OutgoingRequest) -> Result<LiveResponse> {
        match self.intercept(request).await? {
            Interception::Mocked(response) => Ok(response.into_live()),
            Interception::PassThrough => Ok(self.transport.send(request).await?),
        }
    }

    /// VCR step for a call nothing in the current scope matches.
    ///
    /// Failures are logged; the call continues either way.
    async fn record_on_miss(&self, request: &OutgoingRequest, vcr: &VcrMode) {
        match self.record(request, vcr.scenario()).await {
            Ok(RecordOutcome::TransportFailed(e)) => {
                warn!(url = %request.url, error = %e, "VCR recording failed");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(url = %request.url, error = %e, "VCR recording could not be stored");
            }
        }
    }
}

fn check_scenario(name: &str) -> Result<()> {
    if is_single_segment(name) {
        Ok(())
    } else {
        Err(HotMockError::InvalidScenario(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RECORDED_AT_HEADER;
    use crate::transport::testing::FakeTransport;
    use serde_json::json;
    use tempfile::TempDir;

    const WIDGET_URL: &str = "https://api.test/widgets/1";

    fn engine_with(transport: Arc<FakeTransport>) -> (TempDir, HotMock) {
        let dir = TempDir::new().unwrap();
        let config = HotMockConfig::new(dir.path(), "test");
        let engine = HotMock::new(config, transport);
        (dir, engine)
    }

    fn engine() -> (TempDir, HotMock, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::responding(200, "{}"));
        let (dir, engine) = engine_with(transport.clone());
        (dir, engine, transport)
    }

    fn widget_mock() -> MockRecord {
        MockRecord::new(HttpMethod::Get, "widgets/1")
            .with_status(418)
            .with_body(json!({"a": 1}))
    }

    fn get(url: &str) -> OutgoingRequest {
        OutgoingRequest::new(HttpMethod::Get, url)
    }

    fn expect_mocked(interception: Interception) -> MockResponse {
        match interception {
            Interception::Mocked(response) => response,
            Interception::PassThrough => panic!("Expected mocked response"),
        }
    }

    #[tokio::test]
    async fn test_serves_stored_mock() {
        let (_dir, engine, transport) = engine();
        engine.mock(widget_mock()).unwrap();
        engine.enable().unwrap();

        let response = expect_mocked(engine.intercept(&get(WIDGET_URL)).await.unwrap());
        assert_eq!(response.status, 418);
        assert_eq!(response.header(MOCKED_HEADER), Some("true"));
        assert_eq!(response.body, json!({"a": 1}));

        let post = OutgoingRequest::new(HttpMethod::Post, WIDGET_URL);
        assert_eq!(engine.intercept(&post).await.unwrap(), Interception::PassThrough);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_disabled_always_passes_through() {
        let (_dir, engine, _transport) = engine();
        engine.mock(widget_mock()).unwrap();

        assert!(engine.is_disabled());
        assert_eq!(
            engine.intercept(&get(WIDGET_URL)).await.unwrap(),
            Interception::PassThrough
        );

        engine.enable().unwrap();
        engine.disable().unwrap();
        assert_eq!(
            engine.intercept(&get(WIDGET_URL)).await.unwrap(),
            Interception::PassThrough
        );
    }

    #[tokio::test]
    async fn test_production_never_mocks() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::responding(200, "{}"));
        let engine = HotMock::new(HotMockConfig::new(dir.path(), "production"), transport);
        engine.mock(widget_mock()).unwrap();
        engine.enable().unwrap();
        engine.set_vcr(VcrMode::Default).unwrap();

        assert_eq!(
            engine.intercept(&get(WIDGET_URL)).await.unwrap(),
            Interception::PassThrough
        );
    }

    #[tokio::test]
    async fn test_execute_falls_back_to_transport() {
        let (_dir, engine, transport) = engine();
        transport.set_response(204, "");
        engine.mock(widget_mock()).unwrap();
        engine.enable().unwrap();

        let live = engine.execute(&get(WIDGET_URL)).await.unwrap();
        assert_eq!(live.status, 418);
        assert_eq!(live.body, br#"{"a":1}"#.to_vec());
        assert_eq!(transport.calls(), 0);

        let live = engine.execute(&get("https://api.test/other")).await.unwrap();
        assert_eq!(live.status, 204);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_interpolation() {
        let (_dir, engine, _transport) = engine();
        engine
            .mock(
                MockRecord::new(HttpMethod::Post, "users")
                    .with_status(201)
                    .with_body(json!({"id": 1, "name": "placeholder"}))
                    .with_interpolation("name", "name"),
            )
            .unwrap();
        engine.enable().unwrap();

        let request = OutgoingRequest::new(HttpMethod::Post, "https://api.test/users")
            .with_json(&json!({"name": "Ada"}));
        let response = expect_mocked(engine.intercept(&request).await.unwrap());
        assert_eq!(response.body, json!({"id": 1, "name": "Ada"}));

        let stored = engine.mocked(HttpMethod::Post, "/users").unwrap().unwrap();
        assert_eq!(stored.body["name"], "placeholder");
    }

    #[test]
    fn test_mock_delete_is_mocked() {
        let (_dir, engine, _transport) = engine();
        assert!(!engine.is_mocked(HttpMethod::Get, WIDGET_URL).unwrap());

        engine.mock(widget_mock()).unwrap();
        engine.mock(widget_mock().with_status(419)).unwrap();
        assert!(engine.is_mocked(HttpMethod::Get, WIDGET_URL).unwrap());
        assert!(!engine.is_mocked(HttpMethod::Post, WIDGET_URL).unwrap());
        assert_eq!(engine.mocks().len(), 1);
        assert_eq!(engine.mocks()[0].status, 419);

        assert!(engine.delete(HttpMethod::Get, "widgets/1").unwrap());
        assert!(!engine.is_mocked(HttpMethod::Get, WIDGET_URL).unwrap());
        assert!(!engine.delete(HttpMethod::Get, "widgets/1").unwrap());
    }

    #[test]
    fn test_scenario_isolation() {
        let (_dir, engine, _transport) = engine();
        engine.mock(MockRecord::new(HttpMethod::Get, "root")).unwrap();

        engine.set_scenario(Some("a")).unwrap();
        engine.mock(MockRecord::new(HttpMethod::Get, "only-a")).unwrap();
        assert!(engine.is_mocked(HttpMethod::Get, "/only-a").unwrap());
        assert!(engine.is_mocked(HttpMethod::Get, "/root").unwrap());

        engine.set_scenario(Some("b")).unwrap();
        assert!(!engine.is_mocked(HttpMethod::Get, "/only-a").unwrap());
        assert!(engine.is_mocked(HttpMethod::Get, "/root").unwrap());

        engine.set_scenario(None).unwrap();
        assert_eq!(engine.scenario(), None);
        assert!(!engine.is_mocked(HttpMethod::Get, "/only-a").unwrap());
        assert!(engine.is_mocked(HttpMethod::Get, "/root").unwrap());

        assert_eq!(engine.scenarios(), vec!["a", "b"]);
    }

    #[test]
    fn test_scenario_mock_shadows_root() {
        let (_dir, engine, _transport) = engine();
        engine.mock(widget_mock()).unwrap();
        engine.set_scenario(Some("broken")).unwrap();
        engine.mock(widget_mock().with_status(500)).unwrap();

        let record = engine.mocked(HttpMethod::Get, WIDGET_URL).unwrap().unwrap();
        assert_eq!(record.status, 500);
    }

    #[test]
    fn test_invalid_scenario_names() {
        let (_dir, engine, _transport) = engine();
        assert!(matches!(
            engine.set_scenario(Some("../escape")),
            Err(HotMockError::InvalidScenario(_))
        ));
        assert!(matches!(
            engine.set_vcr(VcrMode::Scenario(String::new())),
            Err(HotMockError::InvalidScenario(_))
        ));
        assert!(engine.settings().is_none());
    }

    #[test]
    fn test_settings_lifecycle() {
        let (_dir, engine, _transport) = engine();
        assert!(engine.settings().is_none());
        assert_eq!(engine.vcr(), VcrMode::Off);

        engine.set_vcr(VcrMode::Scenario("s1".to_string())).unwrap();
        engine.set_scenario(Some("s2")).unwrap();
        assert_eq!(
            engine.settings(),
            Some(Settings {
                scenario: Some("s2".to_string()),
                vcr: VcrMode::Scenario("s1".to_string()),
            })
        );

        engine.reset_settings().unwrap();
        assert!(engine.settings().is_none());
    }

    #[tokio::test]
    async fn test_record_into_scenario_activates_it() {
        let (_dir, engine, transport) = engine();

        let outcome = engine
            .record(&get("https://api.test/record_mock"), Some("s1"))
            .await
            .unwrap();
        assert!(outcome.is_recorded());
        assert_eq!(engine.scenario().as_deref(), Some("s1"));
        assert_eq!(engine.store().load_canonical(Some("s1")).unwrap().len(), 1);
        assert!(engine.store().load_canonical(None).unwrap().is_empty());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_vcr_records_then_replays() {
        let (_dir, engine, transport) = engine();
        transport.set_response(200, r#"{"dogs": 3}"#);
        engine.enable().unwrap();
        engine.set_vcr(VcrMode::Scenario("s1".to_string())).unwrap();

        let url = "https://api.test/dogs";
        let first = expect_mocked(engine.intercept(&get(url)).await.unwrap());
        assert_eq!(transport.calls(), 1);
        assert!(first.header(RECORDED_AT_HEADER).is_some());
        assert_eq!(first.body, json!({"dogs": 3}));
        assert_eq!(engine.scenario().as_deref(), Some("s1"));
        assert_eq!(engine.store().load_canonical(Some("s1")).unwrap().len(), 1);

        transport.set_response(200, r#"{"dogs": 4}"#);
        let second = expect_mocked(engine.intercept(&get(url)).await.unwrap());
        assert_eq!(transport.calls(), 1);
        assert_eq!(second.body, json!({"dogs": 3}));
    }

    #[tokio::test]
    async fn test_vcr_replays_urls_with_regex_metacharacters() {
        let (_dir, engine, transport) = engine();
        transport.set_response(200, r#"{"breed": "pug"}"#);
        engine.enable().unwrap();
        engine.set_vcr(VcrMode::Scenario("s1".to_string())).unwrap();

        for url in ["https://api.test/dogs?breed=pug", "https://api.test/a(b"] {
            let calls = transport.calls();
            let first = expect_mocked(engine.intercept(&get(url)).await.unwrap());
            assert_eq!(first.body, json!({"breed": "pug"}));
            assert!(engine.is_mocked(HttpMethod::Get, url).unwrap());

            let second = expect_mocked(engine.intercept(&get(url)).await.unwrap());
            assert_eq!(second.body, first.body);
            assert_eq!(transport.calls(), calls + 1);
        }

        assert_eq!(engine.store().load_canonical(Some("s1")).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_vcr_default_records_into_current_scope() {
        let (_dir, engine, transport) = engine();
        engine.enable().unwrap();
        engine.set_vcr(VcrMode::Default).unwrap();

        let response = expect_mocked(engine.intercept(&get(WIDGET_URL)).await.unwrap());
        assert_eq!(response.status, 200);
        assert_eq!(transport.calls(), 1);
        assert_eq!(engine.store().load_canonical(None).unwrap().len(), 1);
        assert_eq!(engine.scenario(), None);
    }

    #[tokio::test]
    async fn test_vcr_transport_failure_passes_through() {
        let transport = Arc::new(FakeTransport::failing("connection refused"));
        let (_dir, engine) = engine_with(transport.clone());
        engine.enable().unwrap();
        engine.set_vcr(VcrMode::Default).unwrap();

        assert_eq!(
            engine.intercept(&get(WIDGET_URL)).await.unwrap(),
            Interception::PassThrough
        );
        assert_eq!(transport.calls(), 1);
        assert!(engine.mocks().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_pattern_surfaces_at_match_time() {
        let (_dir, engine, _transport) = engine();
        engine
            .mock(MockRecord::new(HttpMethod::Get, "widgets/("))
            .unwrap();
        engine.enable().unwrap();

        let result = engine.intercept(&get(WIDGET_URL)).await;
        assert!(matches!(result, Err(HotMockError::InvalidPattern { .. })));
    }

    #[test]
    fn test_mock_response_body_bytes() {
        let response = |body| MockResponse {
            status: 200,
            headers: IndexMap::new(),
            body,
        };
        assert_eq!(response(json!(null)).body_bytes(), b"".to_vec());
        assert_eq!(response(json!("raw")).body_bytes(), b"raw".to_vec());
        assert_eq!(response(json!([1, 2])).body_bytes(), b"[1,2]".to_vec());
    }
}
