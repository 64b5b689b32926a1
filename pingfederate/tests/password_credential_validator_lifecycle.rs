use mockito::{Matcher, Server, ServerGuard};
use pingfederate::PingFederateProvider;
use serde_json::json;
use std::sync::Once;
use tfplug::context::Context;
use tfplug::provider::ConfigureProviderRequest;
use tfplug::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest, ModifyPlanRequest,
    ReadResourceRequest, Resource, ResourceSchemaRequest, ResourceWithConfigure,
    ResourceWithModifyPlan, UpdateResourceRequest, ValidateResourceConfigRequest,
};
use tfplug::types::ClientCapabilities;
use tfplug::{Dynamic, DynamicValue, Provider};

const TYPE_NAME: &str = "pingfederate_password_credential_validator";
const API_PATH: &str = "/pf-admin-api/v1";
const PINGID: &str = "com.pingidentity.plugins.pcvs.pingid.PingIdPCV";

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

async fn configured_resource(server: &ServerGuard) -> Box<dyn ResourceWithConfigure> {
    let mut provider = PingFederateProvider::new();
    let response = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config: DynamicValue::new(Dynamic::object([
                    ("https_host", Dynamic::string(server.url())),
                    ("admin_api_path", Dynamic::string(API_PATH)),
                    ("username", Dynamic::string("administrator")),
                    ("password", Dynamic::string("2FederateM0re")),
                    ("product_version", Dynamic::string("12.1")),
                ])),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);

    let mut resource = (provider.resources()[TYPE_NAME])();
    let configured = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: response.provider_data,
            },
        )
        .await;
    assert!(configured.diagnostics.is_empty());
    resource
}

fn field(name: &str, value: &str) -> Dynamic {
    Dynamic::object([("name", Dynamic::string(name)), ("value", Dynamic::string(value))])
}

fn config(error_mode: &str) -> DynamicValue {
    DynamicValue::new(Dynamic::object([
        ("id", Dynamic::Null),
        ("validator_id", Dynamic::string("pingid")),
        ("name", Dynamic::string("PingID PCV")),
        (
            "plugin_descriptor_ref",
            Dynamic::object([("id", Dynamic::string(PINGID))]),
        ),
        ("parent_ref", Dynamic::Null),
        ("attribute_contract", Dynamic::Null),
        (
            "configuration",
            Dynamic::object([
                (
                    "fields",
                    Dynamic::List(vec![field("Authentication During Errors", error_mode)]),
                ),
                (
                    "sensitive_fields",
                    Dynamic::List(vec![Dynamic::object([
                        ("name", Dynamic::string("Secret Key")),
                        ("value", Dynamic::string("s3cret")),
                        ("encrypted_value", Dynamic::Null),
                    ])]),
                ),
                ("tables", Dynamic::List(vec![])),
                ("fields_all", Dynamic::Null),
                ("tables_all", Dynamic::Null),
            ]),
        ),
    ]))
}

fn server_body(error_mode: &str) -> String {
    json!({
        "id": "pingid",
        "name": "PingID PCV",
        "pluginDescriptorRef": {"id": PINGID},
        "configuration": {
            "fields": [
                {"name": "Authentication During Errors", "value": error_mode},
                {"name": "Secret Key", "encryptedValue": "OBF:JWE:abc"},
                {"name": "Users Group", "value": ""}
            ],
            "tables": []
        },
        "attributeContract": {
            "coreAttributes": [{"name": "username"}],
            "extendedAttributes": []
        }
    })
    .to_string()
}

async fn plan(
    resource: &dyn ResourceWithConfigure,
    config: &DynamicValue,
    prior_state: &DynamicValue,
) -> DynamicValue {
    let schema = resource
        .schema(Context::new(), ResourceSchemaRequest)
        .await
        .schema;
    let proposed = schema.plan(config, prior_state);
    assert!(proposed.diagnostics.is_empty());

    let response = resource
        .as_modify_plan()
        .expect("resource supports plan modification")
        .modify_plan(
            Context::new(),
            ModifyPlanRequest {
                type_name: TYPE_NAME.to_string(),
                config: config.clone(),
                prior_state: prior_state.clone(),
                proposed_new_state: proposed.planned_state,
                prior_private: vec![],
                provider_meta: None,
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());
    response.planned_state
}

fn configuration_attr<'a>(state: &'a DynamicValue, name: &str) -> &'a Dynamic {
    state
        .value
        .attr("configuration")
        .and_then(|c| c.attr(name))
        .expect("configuration attribute present")
}

#[tokio::test(flavor = "multi_thread")]
async fn password_credential_validator_lifecycle() {
    init_tracing();
    let mut server = Server::new_async().await;
    let resource = configured_resource(&server).await;
    let path = format!("{}/passwordCredentialValidators", API_PATH);

    let validated = resource
        .validate(
            Context::new(),
            ValidateResourceConfigRequest {
                type_name: TYPE_NAME.to_string(),
                config: config("Bypass"),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert!(validated.diagnostics.is_empty(), "{:?}", validated.diagnostics);

    // Create
    let planned = plan(resource.as_ref(), &config("Bypass"), &DynamicValue::null()).await;
    assert_eq!(configuration_attr(&planned, "fields_all"), &Dynamic::Unknown);
    assert_eq!(configuration_attr(&planned, "tables_all"), &Dynamic::Unknown);
    assert!(planned.value.attr("parent_ref").is_some_and(Dynamic::is_unknown));

    let create_mock = server
        .mock("POST", path.as_str())
        .match_header("x-xsrf-header", "PingFederate")
        .match_body(Matcher::PartialJson(json!({
            "id": "pingid",
            "configuration": {
                "fields": [
                    {"name": "Authentication During Errors", "value": "Bypass"},
                    {"name": "Secret Key", "value": "s3cret"}
                ]
            }
        })))
        .with_status(201)
        .with_body(server_body("Bypass"))
        .create_async()
        .await;

    let created = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: TYPE_NAME.to_string(),
                planned_state: planned.clone(),
                config: config("Bypass"),
                planned_private: vec![],
                provider_meta: None,
            },
        )
        .await;
    create_mock.assert_async().await;
    assert!(created.diagnostics.is_empty(), "{:?}", created.diagnostics);
    let state = created.new_state;
    assert_eq!(configuration_attr(&state, "fields_all").try_as_list().unwrap().len(), 3);
    assert_eq!(
        configuration_attr(&state, "sensitive_fields").try_as_list().unwrap()[0]
            .attr("encrypted_value"),
        Some(&Dynamic::string("OBF:JWE:abc"))
    );

    // Refresh is stable
    let read_mock = server
        .mock("GET", format!("{}/pingid", path).as_str())
        .with_status(200)
        .with_body(server_body("Bypass"))
        .expect(1)
        .create_async()
        .await;
    let refreshed = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: TYPE_NAME.to_string(),
                current_state: state.clone(),
                private: vec![],
                provider_meta: None,
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    read_mock.assert_async().await;
    assert!(refreshed.diagnostics.is_empty(), "{:?}", refreshed.diagnostics);
    assert_eq!(refreshed.new_state.as_ref(), Some(&state));

    // An unchanged configuration plans no change at all, including the
    // encrypted value the server assigned to the sensitive field
    let replanned = plan(resource.as_ref(), &config("Bypass"), &state).await;
    assert_eq!(replanned, state);

    // Update
    let planned = plan(resource.as_ref(), &config("Block"), &state).await;
    assert_eq!(configuration_attr(&planned, "fields_all"), &Dynamic::Unknown);
    assert_eq!(configuration_attr(&planned, "tables_all"), configuration_attr(&state, "tables_all"));

    let update_mock = server
        .mock("PUT", format!("{}/pingid", path).as_str())
        .with_status(200)
        .with_body(server_body("Block"))
        .create_async()
        .await;
    let updated = resource
        .update(
            Context::new(),
            UpdateResourceRequest {
                type_name: TYPE_NAME.to_string(),
                prior_state: state.clone(),
                planned_state: planned,
                config: config("Block"),
                planned_private: vec![],
                provider_meta: None,
            },
        )
        .await;
    update_mock.assert_async().await;
    assert!(updated.diagnostics.is_empty(), "{:?}", updated.diagnostics);
    assert_eq!(
        configuration_attr(&updated.new_state, "fields"),
        &Dynamic::List(vec![field("Authentication During Errors", "Block")])
    );

    // Delete
    let delete_mock = server
        .mock("DELETE", format!("{}/pingid", path).as_str())
        .with_status(204)
        .create_async()
        .await;
    let deleted = resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: TYPE_NAME.to_string(),
                prior_state: updated.new_state,
                planned_private: vec![],
                provider_meta: None,
            },
        )
        .await;
    delete_mock.assert_async().await;
    assert!(deleted.diagnostics.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_required_plugin_fields_fail_validation() {
    init_tracing();
    let server = Server::new_async().await;
    let resource = configured_resource(&server).await;

    let mut config = config("Bypass");
    if let Dynamic::Map(attributes) = &mut config.value {
        attributes.insert(
            "plugin_descriptor_ref".to_string(),
            Dynamic::object([(
                "id",
                Dynamic::string("org.sourceid.saml20.domain.LDAPUsernamePasswordCredentialValidator"),
            )]),
        );
    }

    let response = resource
        .validate(
            Context::new(),
            ValidateResourceConfigRequest {
                type_name: TYPE_NAME.to_string(),
                config,
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    let details: Vec<&str> = response.diagnostics.iter().map(|d| d.detail.as_str()).collect();
    assert_eq!(details.len(), 3, "{:?}", details);
    assert!(details
        .iter()
        .all(|d| d.ends_with("for the LDAP Username Password Credential Validator")));
}

#[test]
fn unknown_resource_type_is_not_registered() {
    let resources = PingFederateProvider::new().resources();
    assert!(!resources.contains_key("pingfederate_sp_adapter"));
    assert_eq!(resources.len(), 5);
}
