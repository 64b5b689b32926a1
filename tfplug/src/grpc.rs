//! gRPC service implementation for the Terraform plugin protocol v6
//!
//! Translates protocol requests into Provider, Resource and DataSource
//! calls. Resources and data sources are built from the provider's
//! factories for every request and configured with the data the provider
//! produced in ConfigureProvider.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest, ValidateDataSourceConfigRequest,
};
use crate::proto::{self, ProviderService as ProtoProvider};
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderSchemaRequest, ResourceFactory,
    ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest, ImportResourceStateRequest,
    ModifyPlanRequest, ReadResourceRequest, ResourceSchemaRequest, ResourceWithConfigure,
    UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::{Attribute, AttributeType, ObjectNestingMode, Schema};
use crate::types::{
    has_errors, AttributePath, AttributePathStep, ClientCapabilities, Diagnostic,
    DiagnosticSeverity, DynamicValue,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};

type ProviderData = Option<Arc<dyn Any + Send + Sync>>;

pub struct ProviderService<P: Provider> {
    provider: Arc<RwLock<P>>,
    resources: HashMap<String, ResourceFactory>,
    data_sources: HashMap<String, DataSourceFactory>,
    provider_data: RwLock<ProviderData>,
    /// Shared by every request; StopProvider cancels it
    ctx: Context,
}

impl<P: Provider + 'static> ProviderService<P> {
    pub fn new(provider: P) -> Self {
        let resources = provider.resources();
        let data_sources = provider.data_sources();
        Self {
            provider: Arc::new(RwLock::new(provider)),
            resources,
            data_sources,
            provider_data: RwLock::new(None),
            ctx: Context::new(),
        }
    }

    /// Builds a resource, configured when the provider has been
    async fn resource(
        &self,
        type_name: &str,
    ) -> std::result::Result<(Box<dyn ResourceWithConfigure>, Vec<Diagnostic>), Status> {
        let factory = self
            .resources
            .get(type_name)
            .ok_or_else(|| Status::not_found(format!("unknown resource type: {}", type_name)))?;
        let mut resource = factory();

        let provider_data = self.provider_data.read().await.clone();
        let diagnostics = match provider_data {
            Some(data) => {
                resource
                    .configure(
                        self.ctx.clone(),
                        ConfigureResourceRequest {
                            provider_data: Some(data),
                        },
                    )
                    .await
                    .diagnostics
            }
            None => vec![],
        };
        Ok((resource, diagnostics))
    }

    async fn data_source(
        &self,
        type_name: &str,
    ) -> std::result::Result<(Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>), Status> {
        let factory = self
            .data_sources
            .get(type_name)
            .ok_or_else(|| Status::not_found(format!("unknown data source type: {}", type_name)))?;
        let mut data_source = factory();

        let provider_data = self.provider_data.read().await.clone();
        let diagnostics = match provider_data {
            Some(data) => {
                data_source
                    .configure(
                        self.ctx.clone(),
                        ConfigureDataSourceRequest {
                            provider_data: Some(data),
                        },
                    )
                    .await
                    .diagnostics
            }
            None => vec![],
        };
        Ok((data_source, diagnostics))
    }

    async fn resource_schema(&self, resource: &dyn ResourceWithConfigure) -> Schema {
        resource
            .schema(self.ctx.clone(), ResourceSchemaRequest)
            .await
            .schema
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> ProtoProvider for ProviderService<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> std::result::Result<Response<proto::get_metadata::Response>, Status> {
        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities()),
            diagnostics: vec![],
            data_sources: self
                .data_sources
                .keys()
                .map(|type_name| proto::get_metadata::DataSourceMetadata {
                    type_name: type_name.clone(),
                })
                .collect(),
            resources: self
                .resources
                .keys()
                .map(|type_name| proto::get_metadata::ResourceMetadata {
                    type_name: type_name.clone(),
                })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> std::result::Result<Response<proto::get_provider_schema::Response>, Status> {
        let mut diagnostics = Vec::new();
        let provider = self.provider.read().await;
        let provider_schema = provider
            .schema(self.ctx.clone(), ProviderSchemaRequest)
            .await;
        diagnostics.extend(provider_schema.diagnostics);

        let mut resource_schemas = HashMap::new();
        for (type_name, factory) in &self.resources {
            let response = factory()
                .schema(self.ctx.clone(), ResourceSchemaRequest)
                .await;
            diagnostics.extend(response.diagnostics);
            resource_schemas.insert(type_name.clone(), schema_to_proto(&response.schema));
        }

        let mut data_source_schemas = HashMap::new();
        for (type_name, factory) in &self.data_sources {
            let response = factory()
                .schema(self.ctx.clone(), DataSourceSchemaRequest)
                .await;
            diagnostics.extend(response.diagnostics);
            data_source_schemas.insert(type_name.clone(), schema_to_proto(&response.schema));
        }

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schema_to_proto(&provider_schema.schema)),
            resource_schemas,
            data_source_schemas,
            diagnostics: diagnostics_to_proto(diagnostics),
            provider_meta: None,
            server_capabilities: Some(server_capabilities()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> std::result::Result<Response<proto::validate_provider_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_value(req.config.as_ref())?;

        let provider = self.provider.read().await;
        let response = provider
            .validate(self.ctx.clone(), ValidateProviderConfigRequest { config })
            .await;

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_value(req.config.as_ref())?;
        let factory = self.resources.get(&req.type_name).ok_or_else(|| {
            Status::not_found(format!("unknown resource type: {}", req.type_name))
        })?;

        let response = factory()
            .validate(
                self.ctx.clone(),
                ValidateResourceConfigRequest {
                    type_name: req.type_name,
                    config,
                    client_capabilities: capabilities(req.client_capabilities),
                },
            )
            .await;

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_value(req.config.as_ref())?;
        let factory = self.data_sources.get(&req.type_name).ok_or_else(|| {
            Status::not_found(format!("unknown data source type: {}", req.type_name))
        })?;

        let response = factory()
            .validate(
                self.ctx.clone(),
                ValidateDataSourceConfigRequest {
                    type_name: req.type_name,
                    config,
                },
            )
            .await;

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> std::result::Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();
        let (resource, _) = self.resource(&req.type_name).await?;
        let schema = self.resource_schema(resource.as_ref()).await;

        let raw = req.raw_state.map(|raw| raw.json).unwrap_or_default();
        let state = DynamicValue::decode_json(&raw)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        tracing::debug!(
            type_name = %req.type_name,
            from_version = req.version,
            to_version = schema.version,
            "upgrading resource state"
        );

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(encode_value(&state, &schema.value_type())?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> std::result::Result<Response<proto::configure_provider::Response>, Status> {
        let req = request.into_inner();
        let config = decode_value(req.config.as_ref())?;

        let mut provider = self.provider.write().await;
        let response = provider
            .configure(
                self.ctx.clone(),
                ConfigureProviderRequest {
                    terraform_version: req.terraform_version,
                    config,
                    client_capabilities: capabilities(req.client_capabilities),
                },
            )
            .await;
        *self.provider_data.write().await = response.provider_data;

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> std::result::Result<Response<proto::read_resource::Response>, Status> {
        let req = request.into_inner();
        let current_state = decode_value(req.current_state.as_ref())?;
        let (resource, mut diagnostics) = self.resource(&req.type_name).await?;
        if has_errors(&diagnostics) {
            return Ok(Response::new(proto::read_resource::Response {
                new_state: req.current_state,
                diagnostics: diagnostics_to_proto(diagnostics),
                private: req.private,
            }));
        }
        let schema = self.resource_schema(resource.as_ref()).await;

        let response = resource
            .read(
                self.ctx.clone(),
                ReadResourceRequest {
                    type_name: req.type_name,
                    current_state,
                    private: req.private,
                    provider_meta: decode_provider_meta(req.provider_meta.as_ref())?,
                    client_capabilities: capabilities(req.client_capabilities),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        // A missing remote object is reported as null state
        let new_state = response.new_state.unwrap_or_else(DynamicValue::null);
        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_value(&new_state, &schema.value_type())?),
            diagnostics: diagnostics_to_proto(diagnostics),
            private: response.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> std::result::Result<Response<proto::plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        let prior_state = decode_value(req.prior_state.as_ref())?;
        let proposed_new_state = decode_value(req.proposed_new_state.as_ref())?;
        let config = decode_value(req.config.as_ref())?;
        let (resource, mut diagnostics) = self.resource(&req.type_name).await?;
        let schema = self.resource_schema(resource.as_ref()).await;

        let (planned, mut requires_replace) = if proposed_new_state.is_null() {
            (DynamicValue::null(), vec![])
        } else {
            let change = schema.plan(&config, &prior_state);
            diagnostics.extend(change.diagnostics);
            (change.planned_state, change.requires_replace)
        };

        let mut planned_state = planned;
        let mut planned_private = req.prior_private.clone();
        if let Some(modifier) = resource.as_modify_plan() {
            let response = modifier
                .modify_plan(
                    self.ctx.clone(),
                    ModifyPlanRequest {
                        type_name: req.type_name,
                        config,
                        prior_state,
                        proposed_new_state: planned_state,
                        prior_private: req.prior_private,
                        provider_meta: decode_provider_meta(req.provider_meta.as_ref())?,
                    },
                )
                .await;
            planned_state = response.planned_state;
            planned_private = response.planned_private;
            requires_replace.extend(response.requires_replace);
            diagnostics.extend(response.diagnostics);
        }

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_value(&planned_state, &schema.value_type())?),
            requires_replace: requires_replace.iter().map(path_to_proto).collect(),
            planned_private,
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> std::result::Result<Response<proto::apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        let prior_state = decode_value(req.prior_state.as_ref())?;
        let planned_state = decode_value(req.planned_state.as_ref())?;
        let config = decode_value(req.config.as_ref())?;
        let provider_meta = decode_provider_meta(req.provider_meta.as_ref())?;
        let (resource, mut diagnostics) = self.resource(&req.type_name).await?;
        let schema = self.resource_schema(resource.as_ref()).await;

        let (new_state, private) = if planned_state.is_null() {
            tracing::debug!(type_name = %req.type_name, "deleting resource");
            let response = resource
                .delete(
                    self.ctx.clone(),
                    DeleteResourceRequest {
                        type_name: req.type_name,
                        prior_state: prior_state.clone(),
                        planned_private: req.planned_private.clone(),
                        provider_meta,
                    },
                )
                .await;
            let failed = has_errors(&response.diagnostics);
            diagnostics.extend(response.diagnostics);
            // A failed delete keeps the object in state
            if failed {
                (prior_state, req.planned_private)
            } else {
                (DynamicValue::null(), vec![])
            }
        } else if prior_state.is_null() {
            tracing::debug!(type_name = %req.type_name, "creating resource");
            let response = resource
                .create(
                    self.ctx.clone(),
                    CreateResourceRequest {
                        type_name: req.type_name,
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            diagnostics.extend(response.diagnostics);
            (response.new_state, response.private)
        } else {
            tracing::debug!(type_name = %req.type_name, "updating resource");
            let response = resource
                .update(
                    self.ctx.clone(),
                    UpdateResourceRequest {
                        type_name: req.type_name,
                        prior_state,
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            diagnostics.extend(response.diagnostics);
            (response.new_state, response.private)
        };

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_value(&new_state, &schema.value_type())?),
            private,
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> std::result::Result<Response<proto::import_resource_state::Response>, Status> {
        let req = request.into_inner();
        let (resource, mut diagnostics) = self.resource(&req.type_name).await?;
        let Some(importer) = resource.as_import_state() else {
            diagnostics.push(Diagnostic::error(
                "Resource Import Not Implemented",
                format!("{} does not support import", req.type_name),
            ));
            return Ok(Response::new(proto::import_resource_state::Response {
                imported_resources: vec![],
                diagnostics: diagnostics_to_proto(diagnostics),
            }));
        };
        let value_type = self.resource_schema(resource.as_ref()).await.value_type();

        let response = importer
            .import_state(
                self.ctx.clone(),
                ImportResourceStateRequest {
                    type_name: req.type_name,
                    id: req.id,
                    client_capabilities: capabilities(req.client_capabilities),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        let imported_resources = response
            .imported_resources
            .into_iter()
            .map(|imported| -> std::result::Result<_, Status> {
                Ok(proto::import_resource_state::ImportedResource {
                    state: Some(encode_value(&imported.state, &value_type)?),
                    type_name: imported.type_name,
                    private: imported.private,
                })
            })
            .collect::<std::result::Result<Vec<_>, Status>>()?;

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> std::result::Result<Response<proto::read_data_source::Response>, Status> {
        let req = request.into_inner();
        let config = decode_value(req.config.as_ref())?;
        let (data_source, mut diagnostics) = self.data_source(&req.type_name).await?;
        let schema = data_source
            .schema(self.ctx.clone(), DataSourceSchemaRequest)
            .await
            .schema;

        let response = data_source
            .read(
                self.ctx.clone(),
                ReadDataSourceRequest {
                    type_name: req.type_name,
                    config,
                    provider_meta: decode_provider_meta(req.provider_meta.as_ref())?,
                    client_capabilities: capabilities(req.client_capabilities),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        Ok(Response::new(proto::read_data_source::Response {
            state: Some(encode_value(&response.state, &schema.value_type())?),
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> std::result::Result<Response<proto::stop_provider::Response>, Status> {
        tracing::info!("stop requested, cancelling in-flight requests");
        self.ctx.cancel();
        Ok(Response::new(proto::stop_provider::Response {
            error: String::new(),
        }))
    }
}

fn server_capabilities() -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: true,
        get_provider_schema_optional: false,
        move_resource_state: false,
    }
}

fn capabilities(capabilities: Option<proto::ClientCapabilities>) -> ClientCapabilities {
    capabilities
        .map(|c| ClientCapabilities {
            deferral_allowed: c.deferral_allowed,
            write_only_attributes_allowed: c.write_only_attributes_allowed,
        })
        .unwrap_or_default()
}

// Helper functions

#[allow(clippy::result_large_err)]
fn decode_value(value: Option<&proto::DynamicValue>) -> std::result::Result<DynamicValue, Status> {
    let decoded = match value {
        None => Ok(DynamicValue::null()),
        Some(v) if !v.msgpack.is_empty() => DynamicValue::decode_msgpack(&v.msgpack),
        Some(v) => DynamicValue::decode_json(&v.json),
    };
    decoded.map_err(|e| Status::invalid_argument(e.to_string()))
}

#[allow(clippy::result_large_err)]
fn decode_provider_meta(
    value: Option<&proto::DynamicValue>,
) -> std::result::Result<Option<DynamicValue>, Status> {
    match value {
        Some(v) if !(v.msgpack.is_empty() && v.json.is_empty()) => decode_value(Some(v)).map(Some),
        _ => Ok(None),
    }
}

#[allow(clippy::result_large_err)]
fn encode_value(
    value: &DynamicValue,
    type_: &AttributeType,
) -> std::result::Result<proto::DynamicValue, Status> {
    let msgpack = value
        .encode_msgpack(type_)
        .map_err(|e| Status::internal(e.to_string()))?;
    Ok(proto::DynamicValue {
        msgpack,
        json: vec![],
    })
}

/// Terraform's JSON type constraint syntax
fn type_to_json(type_: &AttributeType) -> serde_json::Value {
    use serde_json::json;
    match type_ {
        AttributeType::String => json!("string"),
        AttributeType::Number => json!("number"),
        AttributeType::Bool => json!("bool"),
        AttributeType::List(element) => json!(["list", type_to_json(element)]),
        AttributeType::Set(element) => json!(["set", type_to_json(element)]),
        AttributeType::Map(element) => json!(["map", type_to_json(element)]),
        AttributeType::Object(attributes) => {
            let attributes: serde_json::Map<String, serde_json::Value> = attributes
                .iter()
                .map(|(name, type_)| (name.clone(), type_to_json(type_)))
                .collect();
            json!(["object", attributes])
        }
    }
}

fn attribute_to_proto(attribute: &Attribute) -> proto::schema::Attribute {
    // Nested attributes are described by nested_type alone
    let (r#type, nested_type) = match &attribute.nested_type {
        Some(nested) => (
            vec![],
            Some(proto::schema::Object {
                attributes: nested.attributes.iter().map(attribute_to_proto).collect(),
                nesting: match nested.nesting {
                    ObjectNestingMode::Single => proto::schema::object::NestingMode::Single,
                    ObjectNestingMode::List => proto::schema::object::NestingMode::List,
                    ObjectNestingMode::Set => proto::schema::object::NestingMode::Set,
                    ObjectNestingMode::Map => proto::schema::object::NestingMode::Map,
                } as i32,
            }),
        ),
        None => (type_to_json(&attribute.r#type).to_string().into_bytes(), None),
    };

    proto::schema::Attribute {
        name: attribute.name.clone(),
        r#type,
        nested_type,
        description: attribute.description.clone(),
        required: attribute.required,
        optional: attribute.optional,
        computed: attribute.computed,
        sensitive: attribute.sensitive,
        description_kind: proto::StringKind::Markdown as i32,
        deprecated: attribute.deprecated,
        write_only: false,
    }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(proto::schema::Block {
            version: schema.version,
            attributes: schema.block.attributes.iter().map(attribute_to_proto).collect(),
            description: schema.block.description.clone(),
            description_kind: proto::StringKind::Markdown as i32,
            deprecated: schema.block.deprecated,
        }),
    }
}

fn path_to_proto(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::{step::Selector, Step};
    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|diag| proto::Diagnostic {
            severity: match diag.severity {
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
            } as i32,
            attribute: diag.attribute.as_ref().map(path_to_proto),
            summary: diag.summary,
            detail: diag.detail,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::{
        ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
        DataSourceMetadataResponse, DataSourceSchemaResponse, ReadDataSourceResponse,
        ValidateDataSourceConfigResponse,
    };
    use crate::provider::{
        ConfigureProviderResponse, ProviderMetadataRequest, ProviderMetadataResponse,
        ProviderSchemaResponse, ValidateProviderConfigResponse,
    };
    use crate::resource::{
        ConfigureResourceResponse, CreateResourceResponse, DeleteResourceResponse, ReadResourceResponse,
        Resource, ResourceMetadataRequest, ResourceMetadataResponse, ResourceSchemaResponse,
        UpdateResourceResponse, ValidateResourceConfigResponse,
    };
    use crate::plan_modifier::{RequiresReplace, UseStateForUnknown};
    use crate::schema::{AttributeBuilder, SchemaBuilder};
    use crate::types::Dynamic;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Endpoint(String);

    struct TestProvider {
        deletes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Provider for TestProvider {
        fn type_name(&self) -> &str {
            "test"
        }

        async fn metadata(
            &self,
            _ctx: Context,
            _request: ProviderMetadataRequest,
        ) -> ProviderMetadataResponse {
            ProviderMetadataResponse {
                type_name: "test".to_string(),
            }
        }

        async fn schema(
            &self,
            _ctx: Context,
            _request: ProviderSchemaRequest,
        ) -> ProviderSchemaResponse {
            ProviderSchemaResponse {
                schema: SchemaBuilder::new()
                    .attribute(
                        AttributeBuilder::new("endpoint", AttributeType::String)
                            .optional()
                            .build(),
                    )
                    .build(),
                diagnostics: vec![],
            }
        }

        async fn validate(
            &self,
            _ctx: Context,
            _request: ValidateProviderConfigRequest,
        ) -> ValidateProviderConfigResponse {
            ValidateProviderConfigResponse {
                diagnostics: vec![],
            }
        }

        async fn configure(
            &mut self,
            _ctx: Context,
            request: ConfigureProviderRequest,
        ) -> ConfigureProviderResponse {
            let endpoint = request
                .config
                .get_optional_string(&AttributePath::new("endpoint"))
                .ok()
                .flatten()
                .unwrap_or_default();
            ConfigureProviderResponse {
                diagnostics: vec![],
                provider_data: Some(Arc::new(Endpoint(endpoint))),
            }
        }

        fn resources(&self) -> HashMap<String, ResourceFactory> {
            let deletes = self.deletes.clone();
            let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
            resources.insert(
                "test_thing".to_string(),
                Box::new(move || {
                    Box::new(TestResource {
                        endpoint: None,
                        deletes: deletes.clone(),
                    }) as Box<dyn ResourceWithConfigure>
                }),
            );
            resources
        }

        fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
            let mut data_sources: HashMap<String, DataSourceFactory> = HashMap::new();
            data_sources.insert(
                "test_thing".to_string(),
                Box::new(|| {
                    Box::new(TestDataSource { endpoint: None }) as Box<dyn DataSourceWithConfigure>
                }),
            );
            data_sources
        }
    }

    fn thing_schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("endpoint", AttributeType::String)
                    .computed()
                    .build(),
            )
            .build()
    }

    struct TestResource {
        endpoint: Option<String>,
        deletes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Resource for TestResource {
        fn type_name(&self) -> &str {
            "test_thing"
        }

        async fn metadata(
            &self,
            _ctx: Context,
            _request: ResourceMetadataRequest,
        ) -> ResourceMetadataResponse {
            ResourceMetadataResponse {
                type_name: "test_thing".to_string(),
            }
        }

        async fn schema(
            &self,
            _ctx: Context,
            _request: ResourceSchemaRequest,
        ) -> ResourceSchemaResponse {
            ResourceSchemaResponse {
                schema: thing_schema(),
                diagnostics: vec![],
            }
        }

        async fn validate(
            &self,
            _ctx: Context,
            request: ValidateResourceConfigRequest,
        ) -> ValidateResourceConfigResponse {
            ValidateResourceConfigResponse {
                diagnostics: thing_schema().validate(&request.config),
            }
        }

        async fn create(
            &self,
            _ctx: Context,
            request: CreateResourceRequest,
        ) -> CreateResourceResponse {
            let mut state = request.planned_state;
            state
                .set_string(&AttributePath::new("id"), "thing-1".to_string())
                .unwrap();
            state
                .set_string(
                    &AttributePath::new("endpoint"),
                    self.endpoint.clone().unwrap_or_default(),
                )
                .unwrap();
            CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics: vec![],
            }
        }

        async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
            let gone = request
                .current_state
                .get_string(&AttributePath::new("name"))
                .is_ok_and(|name| name == "gone");
            ReadResourceResponse {
                new_state: (!gone).then_some(request.current_state),
                diagnostics: vec![],
                private: request.private,
            }
        }

        async fn update(
            &self,
            _ctx: Context,
            request: UpdateResourceRequest,
        ) -> UpdateResourceResponse {
            UpdateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![],
            }
        }

        async fn delete(
            &self,
            _ctx: Context,
            _request: DeleteResourceRequest,
        ) -> DeleteResourceResponse {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            DeleteResourceResponse {
                diagnostics: vec![],
            }
        }
    }

    #[async_trait]
    impl ResourceWithConfigure for TestResource {
        async fn configure(
            &mut self,
            _ctx: Context,
            request: ConfigureResourceRequest,
        ) -> ConfigureResourceResponse {
            self.endpoint = request
                .provider_data
                .as_ref()
                .and_then(|data| data.downcast_ref::<Endpoint>())
                .map(|endpoint| endpoint.0.clone());
            ConfigureResourceResponse {
                diagnostics: vec![],
            }
        }
    }

    struct TestDataSource {
        endpoint: Option<String>,
    }

    #[async_trait]
    impl DataSource for TestDataSource {
        fn type_name(&self) -> &str {
            "test_thing"
        }

        async fn metadata(
            &self,
            _ctx: Context,
            _request: DataSourceMetadataRequest,
        ) -> DataSourceMetadataResponse {
            DataSourceMetadataResponse {
                type_name: "test_thing".to_string(),
            }
        }

        async fn schema(
            &self,
            _ctx: Context,
            _request: DataSourceSchemaRequest,
        ) -> DataSourceSchemaResponse {
            DataSourceSchemaResponse {
                schema: thing_schema(),
                diagnostics: vec![],
            }
        }

        async fn validate(
            &self,
            _ctx: Context,
            _request: ValidateDataSourceConfigRequest,
        ) -> ValidateDataSourceConfigResponse {
            ValidateDataSourceConfigResponse {
                diagnostics: vec![],
            }
        }

        async fn read(
            &self,
            _ctx: Context,
            request: ReadDataSourceRequest,
        ) -> ReadDataSourceResponse {
            let mut state = request.config;
            state
                .set_string(
                    &AttributePath::new("endpoint"),
                    self.endpoint.clone().unwrap_or_default(),
                )
                .unwrap();
            ReadDataSourceResponse::new(state)
        }
    }

    #[async_trait]
    impl DataSourceWithConfigure for TestDataSource {
        async fn configure(
            &mut self,
            _ctx: Context,
            request: ConfigureDataSourceRequest,
        ) -> ConfigureDataSourceResponse {
            self.endpoint = request
                .provider_data
                .as_ref()
                .and_then(|data| data.downcast_ref::<Endpoint>())
                .map(|endpoint| endpoint.0.clone());
            ConfigureDataSourceResponse {
                diagnostics: vec![],
            }
        }
    }

    fn service() -> (ProviderService<TestProvider>, Arc<AtomicUsize>) {
        let deletes = Arc::new(AtomicUsize::new(0));
        let provider = TestProvider {
            deletes: deletes.clone(),
        };
        (ProviderService::new(provider), deletes)
    }

    fn wire(value: Dynamic) -> Option<proto::DynamicValue> {
        Some(encode_value(&DynamicValue::new(value), &thing_schema().value_type()).unwrap())
    }

    fn unwire(value: Option<proto::DynamicValue>) -> DynamicValue {
        decode_value(value.as_ref()).unwrap()
    }

    async fn configure(service: &ProviderService<TestProvider>) {
        let config = encode_value(
            &DynamicValue::new(Dynamic::object([(
                "endpoint",
                Dynamic::string("https://pf.example.com"),
            )])),
            &AttributeType::Object(HashMap::from([(
                "endpoint".to_string(),
                AttributeType::String,
            )])),
        )
        .unwrap();
        let response = service
            .configure_provider(Request::new(proto::configure_provider::Request {
                terraform_version: "1.9.0".to_string(),
                config: Some(config),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn schema_lists_resources_and_data_sources() {
        let (service, _) = service();
        let response = service
            .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
            .await
            .unwrap()
            .into_inner();

        assert!(response.resource_schemas.contains_key("test_thing"));
        assert!(response.data_source_schemas.contains_key("test_thing"));
        let block = response.resource_schemas["test_thing"].block.clone().unwrap();
        let name = block.attributes.iter().find(|a| a.name == "name").unwrap();
        assert_eq!(name.r#type, br#""string""#.to_vec());
        assert!(name.required);
    }

    #[test]
    fn nested_attributes_are_sent_as_nested_types() {
        let attribute = AttributeBuilder::nested(
            "fields",
            crate::schema::NestedType::set(vec![AttributeBuilder::new(
                "name",
                AttributeType::String,
            )
            .required()
            .build()]),
        )
        .optional()
        .build();

        let proto = attribute_to_proto(&attribute);
        assert!(proto.r#type.is_empty());
        let nested = proto.nested_type.unwrap();
        assert_eq!(nested.nesting, proto::schema::object::NestingMode::Set as i32);
        assert_eq!(nested.attributes[0].name, "name");
    }

    #[test]
    fn collection_types_use_terraform_type_syntax() {
        let type_ = AttributeType::List(Box::new(AttributeType::Object(HashMap::from([(
            "enabled".to_string(),
            AttributeType::Bool,
        )]))));
        assert_eq!(
            type_to_json(&type_),
            serde_json::json!(["list", ["object", {"enabled": "bool"}]])
        );
    }

    #[tokio::test]
    async fn create_plans_unknown_id_and_applies_with_provider_data() {
        let (service, _) = service();
        configure(&service).await;
        let config = Dynamic::object([("name", Dynamic::string("web"))]);

        let plan = service
            .plan_resource_change(Request::new(proto::plan_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: None,
                proposed_new_state: wire(config.clone()),
                config: wire(config.clone()),
                prior_private: vec![],
                provider_meta: None,
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);
        let planned = unwire(plan.planned_state.clone());
        assert!(planned.value.attr("id").unwrap().is_unknown());

        let applied = service
            .apply_resource_change(Request::new(proto::apply_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: None,
                planned_state: plan.planned_state,
                config: wire(config),
                planned_private: plan.planned_private,
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();
        let state = unwire(applied.new_state);
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "thing-1");
        assert_eq!(
            state.get_string(&AttributePath::new("endpoint")).unwrap(),
            "https://pf.example.com"
        );
    }

    #[tokio::test]
    async fn changing_a_replace_attribute_reports_its_path() {
        let (service, _) = service();
        let prior = Dynamic::object([
            ("id", Dynamic::string("thing-1")),
            ("name", Dynamic::string("web")),
            ("endpoint", Dynamic::string("https://pf.example.com")),
        ]);
        let config = Dynamic::object([("name", Dynamic::string("api"))]);

        let plan = service
            .plan_resource_change(Request::new(proto::plan_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: wire(prior),
                proposed_new_state: wire(config.clone()),
                config: wire(config),
                prior_private: vec![],
                provider_meta: None,
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(plan.requires_replace.len(), 1);
        assert_eq!(
            plan.requires_replace[0].steps[0].selector,
            Some(proto::attribute_path::step::Selector::AttributeName(
                "name".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn null_planned_state_deletes() {
        let (service, deletes) = service();
        let prior = Dynamic::object([
            ("id", Dynamic::string("thing-1")),
            ("name", Dynamic::string("web")),
        ]);

        let applied = service
            .apply_resource_change(Request::new(proto::apply_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: wire(prior),
                planned_state: wire(Dynamic::Null),
                config: wire(Dynamic::Null),
                planned_private: vec![],
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(deletes.load(Ordering::SeqCst), 1);
        assert!(unwire(applied.new_state).is_null());
    }

    #[tokio::test]
    async fn read_of_missing_object_returns_null_state() {
        let (service, _) = service();
        let response = service
            .read_resource(Request::new(proto::read_resource::Request {
                type_name: "test_thing".to_string(),
                current_state: wire(Dynamic::object([("name", Dynamic::string("gone"))])),
                private: vec![],
                provider_meta: None,
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(unwire(response.new_state).is_null());
    }

    #[tokio::test]
    async fn data_source_read_uses_configured_provider_data() {
        let (service, _) = service();
        configure(&service).await;

        let response = service
            .read_data_source(Request::new(proto::read_data_source::Request {
                type_name: "test_thing".to_string(),
                config: wire(Dynamic::object([("name", Dynamic::string("web"))])),
                provider_meta: None,
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();
        let state = unwire(response.state);
        assert_eq!(
            state.get_string(&AttributePath::new("endpoint")).unwrap(),
            "https://pf.example.com"
        );
    }

    #[tokio::test]
    async fn import_without_support_is_a_diagnostic() {
        let (service, _) = service();
        let response = service
            .import_resource_state(Request::new(proto::import_resource_state::Request {
                type_name: "test_thing".to_string(),
                id: "thing-1".to_string(),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Resource Import Not Implemented");
    }

    #[tokio::test]
    async fn json_state_is_upgraded_to_msgpack() {
        let (service, _) = service();
        let response = service
            .upgrade_resource_state(Request::new(proto::upgrade_resource_state::Request {
                type_name: "test_thing".to_string(),
                version: 0,
                raw_state: Some(proto::RawState {
                    json: br#"{"id":"thing-1","name":"web","removed":1}"#.to_vec(),
                    flatmap: HashMap::new(),
                }),
            }))
            .await
            .unwrap()
            .into_inner();
        let state = unwire(response.upgraded_state);
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "thing-1");
        assert!(state.value.attr("removed").is_none());
        assert_eq!(state.value.attr("endpoint"), Some(&Dynamic::Null));
    }

    #[tokio::test]
    async fn unknown_type_is_an_error_naming_it() {
        let (service, _) = service();
        let result = service
            .read_resource(Request::new(proto::read_resource::Request {
                type_name: "non_existent".to_string(),
                ..Default::default()
            }))
            .await;
        assert!(result.unwrap_err().message().contains("non_existent"));
    }

    #[tokio::test]
    async fn stop_cancels_the_shared_context() {
        let (service, _) = service();
        service
            .stop_provider(Request::new(proto::stop_provider::Request {}))
            .await
            .unwrap();
        assert!(service.ctx.is_cancelled());
    }

    #[test]
    fn diagnostics_carry_severity_and_path() {
        let diagnostics = diagnostics_to_proto(vec![Diagnostic::warning("careful", "detail")
            .with_attribute(AttributePath::new("fields").index(0).attribute("value"))]);
        assert_eq!(
            diagnostics[0].severity,
            proto::diagnostic::Severity::Warning as i32
        );
        assert_eq!(diagnostics[0].attribute.as_ref().unwrap().steps.len(), 3);
    }
}
