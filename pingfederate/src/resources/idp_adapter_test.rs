#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::auth::Auth;
    use crate::api::Client;
    use crate::config::ProductVersion;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::sync::Arc;
    use tfplug::types::{ClientCapabilities, DiagnosticSeverity};

    const HTML_FORM: &str = "com.pingidentity.adapters.htmlform.idp.HtmlFormIdpAuthnAdapter";

    async fn configured_resource(server_url: &str) -> IdpAdapterResource {
        let client = Client::new(server_url, Auth::AccessToken("token".to_string())).unwrap();
        let mut resource = IdpAdapterResource::new();
        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(Arc::new(PingFederateProviderData::new(
                        client,
                        ProductVersion::parse("12.1").unwrap(),
                    ))),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        resource
    }

    fn fulfillment(names: &[&str]) -> serde_json::Value {
        names
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    json!({"source": {"type": "ADAPTER", "id": null}, "value": name}),
                )
            })
            .collect::<serde_json::Map<_, _>>()
            .into()
    }

    fn config(fulfilled: &[&str]) -> DynamicValue {
        DynamicValue::new(Dynamic::from(json!({
            "id": null,
            "adapter_id": "htmlform",
            "name": "HTML Form",
            "authn_ctx_class_ref": null,
            "plugin_descriptor_ref": {"id": HTML_FORM},
            "parent_ref": null,
            "configuration": {
                "fields": [{"name": "Challenge Retries", "value": "3"}],
                "sensitive_fields": [],
                "tables": [],
                "fields_all": null,
                "tables_all": null
            },
            "attribute_contract": {
                "core_attributes": [{"name": "username", "pseudonym": true, "masked": null}],
                "core_attributes_all": null,
                "extended_attributes": [{"name": "mail", "pseudonym": null, "masked": null}],
                "unique_user_key_attribute": null,
                "mask_ognl_values": null
            },
            "attribute_mapping": {
                "attribute_contract_fulfillment": fulfillment(fulfilled),
                "issuance_criteria": null
            }
        })))
    }

    fn server_body(fulfilled: &[&str]) -> String {
        let fulfillment: serde_json::Map<_, _> = fulfilled
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    json!({"source": {"type": "ADAPTER"}, "value": name}),
                )
            })
            .collect();
        json!({
            "id": "htmlform",
            "name": "HTML Form",
            "pluginDescriptorRef": {"id": HTML_FORM},
            "configuration": {
                "fields": [
                    {"name": "Challenge Retries", "value": "3"},
                    {"name": "Session Timeout", "value": "60"}
                ],
                "tables": []
            },
            "attributeContract": {
                "coreAttributes": [
                    {"name": "username", "pseudonym": true, "masked": false},
                    {"name": "policy.action", "pseudonym": false, "masked": false}
                ],
                "extendedAttributes": [{"name": "mail", "pseudonym": false, "masked": false}],
                "maskOgnlValues": false
            },
            "attributeMapping": {
                "attributeSources": [],
                "attributeContractFulfillment": fulfillment,
                "issuanceCriteria": {"conditionalCriteria": []}
            }
        })
        .to_string()
    }

    async fn plan(
        resource: &IdpAdapterResource,
        config: &DynamicValue,
        prior_state: &DynamicValue,
    ) -> ModifyPlanResponse {
        let proposed = IdpAdapterResource::schema_static().plan(config, prior_state);
        assert!(proposed.diagnostics.is_empty(), "{:?}", proposed.diagnostics);
        resource
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
            .await
    }

    fn contract_attr<'a>(state: &'a DynamicValue, name: &str) -> &'a Dynamic {
        state
            .value
            .attr(ATTRIBUTE_CONTRACT)
            .and_then(|c| c.attr(name))
            .expect("attribute contract present")
    }

    fn names(value: &Dynamic) -> Vec<&str> {
        value
            .try_as_list()
            .unwrap()
            .iter()
            .filter_map(|item| item.attr("name").and_then(Dynamic::as_str))
            .collect()
    }

    #[tokio::test]
    async fn test_resource_schema() {
        let resource = IdpAdapterResource::new();
        let schema = resource
            .schema(Context::new(), ResourceSchemaRequest)
            .await
            .schema;

        let contract = schema.attribute(ATTRIBUTE_CONTRACT).unwrap();
        assert!(contract.optional && contract.computed);
        let nested = contract.nested_type.as_ref().unwrap();
        let core_all = nested
            .attributes
            .iter()
            .find(|a| a.name == CORE_ATTRIBUTES_ALL)
            .unwrap();
        assert!(core_all.computed && !core_all.optional);
        assert!(schema.attribute(ATTRIBUTE_MAPPING).unwrap().required);
        assert!(schema.attribute(ID_ATTRIBUTE).unwrap().required);
    }

    #[tokio::test]
    async fn create_plan_leaves_core_attributes_all_to_the_server() {
        let server = Server::new_async().await;
        let resource = configured_resource(&server.url()).await;

        let response = plan(&resource, &config(&["username", "mail"]), &DynamicValue::null()).await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            contract_attr(&response.planned_state, CORE_ATTRIBUTES_ALL),
            &Dynamic::Unknown
        );
        assert_eq!(
            contract_attr(&response.planned_state, "mask_ognl_values"),
            &Dynamic::Bool(false)
        );
    }

    #[tokio::test]
    async fn contract_attributes_without_fulfillment_fail_the_plan() {
        let server = Server::new_async().await;
        let resource = configured_resource(&server.url()).await;

        let response = plan(&resource, &config(&["username"]), &DynamicValue::null()).await;
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].severity, DiagnosticSeverity::Error);
        assert!(response.diagnostics[0]
            .detail
            .ends_with("Missing attribute: mail"));
    }

    #[tokio::test]
    async fn create_keeps_planned_core_attributes_only() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/idp/adapters")
            .match_body(Matcher::PartialJson(json!({
                "id": "htmlform",
                "attributeContract": {
                    "coreAttributes": [{"name": "username", "pseudonym": true, "masked": false}],
                    "extendedAttributes": [{"name": "mail", "pseudonym": false, "masked": false}]
                },
                "attributeMapping": {
                    "attributeSources": [],
                    "attributeContractFulfillment": {
                        "username": {"source": {"type": "ADAPTER"}, "value": "username"}
                    },
                    "issuanceCriteria": {"conditionalCriteria": []}
                }
            })))
            .with_status(201)
            .with_body(server_body(&["username", "mail"]))
            .create_async()
            .await;
        let resource = configured_resource(&server.url()).await;

        let planned = plan(&resource, &config(&["username", "mail"]), &DynamicValue::null())
            .await
            .planned_state;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    planned_state: planned,
                    config: config(&["username", "mail"]),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        mock.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(names(contract_attr(&state, CORE_ATTRIBUTES)), vec!["username"]);
        assert_eq!(
            names(contract_attr(&state, CORE_ATTRIBUTES_ALL)),
            vec!["username", "policy.action"]
        );
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "htmlform");
    }

    #[tokio::test]
    async fn unchanged_config_plans_no_diff_after_create() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/idp/adapters")
            .with_status(201)
            .with_body(server_body(&["username", "mail"]))
            .create_async()
            .await;
        let resource = configured_resource(&server.url()).await;
        let config = config(&["username", "mail"]);

        let planned = plan(&resource, &config, &DynamicValue::null()).await.planned_state;
        let state = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    planned_state: planned,
                    config: config.clone(),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await
            .new_state;

        let replanned = plan(&resource, &config, &state).await;
        assert!(replanned.diagnostics.is_empty(), "{:?}", replanned.diagnostics);
        assert!(replanned.requires_replace.is_empty());
        assert_eq!(replanned.planned_state, state);
    }

    #[tokio::test]
    async fn unplanned_fulfillment_from_server_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/idp/adapters")
            .with_status(201)
            .with_body(server_body(&["username", "mail", "policy.action"]))
            .create_async()
            .await;
        let resource = configured_resource(&server.url()).await;

        let planned = plan(&resource, &config(&["username", "mail"]), &DynamicValue::null())
            .await
            .planned_state;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    planned_state: planned,
                    config: config(&["username", "mail"]),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("policy.action"));
        assert!(!response.new_state.is_null());
    }

    #[tokio::test]
    async fn import_read_keeps_every_core_attribute() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/idp/adapters/htmlform")
            .with_status(200)
            .with_body(server_body(&["username", "mail"]))
            .create_async()
            .await;
        let resource = configured_resource(&server.url()).await;

        let imported = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: TYPE_NAME.to_string(),
                    id: "htmlform".to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        assert!(imported.diagnostics.is_empty());
        let imported = imported.imported_resources.into_iter().next().unwrap();

        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: imported.state,
                    private: imported.private,
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state.unwrap();
        assert_eq!(
            names(contract_attr(&state, CORE_ATTRIBUTES)),
            vec!["username", "policy.action"]
        );
        assert!(!is_import_read(&response.private));
    }

    #[tokio::test]
    async fn read_missing_adapter_removes_state() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/idp/adapters/htmlform")
            .with_status(404)
            .with_body(r#"{"resultId":"resource_not_found","message":"Resource not found."}"#)
            .create_async()
            .await;
        let resource = configured_resource(&server.url()).await;

        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: config(&[]),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.new_state.is_none());
        assert_eq!(response.diagnostics[0].severity, DiagnosticSeverity::Warning);
    }

    #[test]
    fn unknown_contract_is_left_to_the_server() {
        let mut plan = config(&["username", "mail"]).value;
        if let Dynamic::Map(attributes) = &mut plan {
            attributes.insert(ATTRIBUTE_CONTRACT.to_string(), Dynamic::Unknown);
        }
        assert!(attribute_contract_from(&plan).is_none());
    }
}
