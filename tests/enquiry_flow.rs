//! End-to-end enquiry dialog tests: HTTP catalog, cascade controller and
//! HTTP submission against a mock admin API.

use formdesk::api::{ApiClient, ApiSettings};
use formdesk::catalog::{CatalogEndpoints, HttpCatalog, OptionId};
use formdesk::form::{
    EnquiryDialog, EnquiryRecord, EnquiryStatus, FetchStatus, HttpSink, SubmitError,
};
use formdesk::session::{LoginRedirect, SessionContext};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingRedirect {
    calls: Mutex<Vec<String>>,
}

impl LoginRedirect for RecordingRedirect {
    fn redirect_to_login(&self, login_url: &str) {
        self.calls.lock().unwrap().push(login_url.to_string());
    }
}

struct Harness {
    server: MockServer,
    session: Arc<SessionContext>,
    redirect: Arc<RecordingRedirect>,
    api: ApiClient,
}

impl Harness {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let session = Arc::new(SessionContext::new(Some(SecretString::from(
            "tok-1".to_string(),
        ))));
        let redirect = Arc::new(RecordingRedirect::default());
        let api = ApiClient::new(
            ApiSettings::new(server.uri()),
            session.clone(),
            redirect.clone(),
        )
        .unwrap();
        Self {
            server,
            session,
            redirect,
            api,
        }
    }

    fn catalog(&self) -> Arc<HttpCatalog> {
        Arc::new(HttpCatalog::new(self.api.clone(), CatalogEndpoints::default()))
    }

    fn sink(&self) -> HttpSink {
        HttpSink::new(self.api.clone(), "/enquiry")
    }

    async fn serve_products(&self) {
        Mock::given(method("GET"))
            .and(path("/productcategory"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"product_id": 7, "product_Name": "CRM"},
                {"product_id": 8, "product_Name": "ERP"}
            ])))
            .mount(&self.server)
            .await;
    }

    async fn serve_packages(&self, product: &str, body: serde_json::Value, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(format!("/fetchpackage/{}", product)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(body)
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_enquiry_end_to_end() {
    let h = Harness::start().await;
    h.serve_products().await;
    h.serve_packages(
        "7",
        json!({"data": [{"package_id": 42, "package_Name": "Basic"}]}),
        Duration::ZERO,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/enquiry"))
        .and(body_json(json!({
            "Name": "Asha",
            "Institute_Name": "City College",
            "Email": "asha@example.com",
            "Contact": "555-0100",
            "Product": "7",
            "Package": "42",
            "Message": "",
            "Enquiry_Status": "Pending"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut dialog = EnquiryDialog::open(h.catalog(), None);
    dialog.settle().await;
    let products = dialog.cascade().selector().primary();
    assert_eq!(products.status(), FetchStatus::Ready);
    assert_eq!(products.label_of(&OptionId::parse("8").unwrap()), Some("ERP"));
    assert!(!dialog.cascade().selector().dependent_enabled());

    dialog.select_product("7");
    dialog.settle().await;
    dialog.select_package("42").unwrap();
    dialog.fields.name = "Asha".into();
    dialog.fields.institute_name = "City College".into();
    dialog.fields.email = "asha@example.com".into();
    dialog.fields.contact = "555-0100".into();

    dialog.submit(&h.sink()).await.unwrap();
}

#[tokio::test]
async fn test_slow_packages_for_abandoned_product_are_discarded() {
    let h = Harness::start().await;
    h.serve_products().await;
    h.serve_packages(
        "7",
        json!([{"package_id": 42, "package_Name": "Basic"}]),
        Duration::from_millis(300),
    )
    .await;
    h.serve_packages(
        "8",
        json!([{"package_id": 80, "package_Name": "Suite"}]),
        Duration::ZERO,
    )
    .await;

    let mut dialog = EnquiryDialog::open(h.catalog(), None);
    dialog.settle().await;
    dialog.select_product("7");
    dialog.select_product("8");
    dialog.settle().await;

    let packages = dialog.cascade().selector().dependent();
    assert_eq!(packages.status(), FetchStatus::Ready);
    let ids: Vec<&str> = packages.options().iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["80"]);
    assert!(dialog.select_package("42").is_err());
}

// ============================================================================
// Edit
// ============================================================================

#[tokio::test]
async fn test_edit_enquiry_from_loose_record() {
    let h = Harness::start().await;
    h.serve_products().await;
    h.serve_packages(
        "7",
        json!([
            {"package_id": 42, "package_Name": "Basic"},
            {"package_id": 43, "package_Name": "Plus"}
        ]),
        Duration::ZERO,
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/enquiry/15"))
        .and(body_partial_json(json!({
            "Product": "7",
            "Package": "42",
            "Enquiry_Status": "Resolved"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&h.server)
        .await;

    let record = EnquiryRecord::from_value(&json!({
        "id": 15,
        "Name": "Asha",
        "Product_id": 7,
        "Package_id": "42",
        "Enquiry_Status": "In Progress"
    }))
    .unwrap();
    let mut dialog = EnquiryDialog::open(h.catalog(), Some(record));
    assert_eq!(dialog.fields.status, EnquiryStatus::InProgress);
    dialog.settle().await;

    let selection = dialog.cascade().selector().selection().clone();
    assert_eq!(selection.primary, OptionId::parse("7"));
    assert_eq!(selection.dependent, OptionId::parse("42"));

    dialog.fields.status = EnquiryStatus::Resolved;
    dialog.submit(&h.sink()).await.unwrap();
}

#[tokio::test]
async fn test_edit_record_package_missing_from_list_is_dropped() {
    let h = Harness::start().await;
    h.serve_products().await;
    h.serve_packages(
        "7",
        json!([{"package_id": 99, "package_Name": "Legacy"}]),
        Duration::ZERO,
    )
    .await;

    let record = EnquiryRecord::from_value(&json!({
        "id": "15",
        "Product_id": "7",
        "Package_id": "42"
    }))
    .unwrap();
    let mut dialog = EnquiryDialog::open(h.catalog(), Some(record));
    dialog.settle().await;

    assert_eq!(dialog.cascade().selector().selection().dependent, None);
    let err = dialog.submit(&h.sink()).await.unwrap_err();
    let SubmitError::Validation(errors) = err else {
        panic!("expected validation error, got {:?}", err);
    };
    assert_eq!(errors.message_for("Package"), Some("Package is required"));
}

// ============================================================================
// Session expiry
// ============================================================================

#[tokio::test]
async fn test_unauthorized_package_fetch_clears_session() {
    let h = Harness::start().await;
    h.serve_products().await;
    Mock::given(method("GET"))
        .and(path("/fetchpackage/7"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;

    let mut dialog = EnquiryDialog::open(h.catalog(), None);
    dialog.settle().await;
    dialog.select_product("7");
    dialog.settle().await;

    let packages = dialog.cascade().selector().dependent();
    assert_eq!(packages.status(), FetchStatus::Failed);
    assert!(packages.options().is_empty());
    assert!(!h.session.is_authenticated());
    assert_eq!(
        h.redirect.calls.lock().unwrap().clone(),
        vec![format!("{}/login", h.server.uri())]
    );
}
