//! Generates the tonic service stubs for the Terraform plugin protocol.
//!
//! Messages are declared with prost derives in `src/proto.rs`, so only the
//! service routing is generated here and no protoc is needed.

use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic::codec::ProstCodec";

fn method(name: &str, route: &str, message: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::proto::{}::Request", message))
        .output_type(format!("crate::proto::{}::Response", message))
        .codec_path(CODEC)
        .build()
}

fn main() {
    let provider = [
        ("get_metadata", "GetMetadata"),
        ("get_provider_schema", "GetProviderSchema"),
        ("validate_provider_config", "ValidateProviderConfig"),
        ("validate_resource_config", "ValidateResourceConfig"),
        ("validate_data_resource_config", "ValidateDataResourceConfig"),
        ("upgrade_resource_state", "UpgradeResourceState"),
        ("configure_provider", "ConfigureProvider"),
        ("read_resource", "ReadResource"),
        ("plan_resource_change", "PlanResourceChange"),
        ("apply_resource_change", "ApplyResourceChange"),
        ("import_resource_state", "ImportResourceState"),
        ("read_data_source", "ReadDataSource"),
        ("stop_provider", "StopProvider"),
    ]
    .into_iter()
    .fold(
        Service::builder().name("Provider").package("tfplugin6"),
        |service, (name, route)| service.method(method(name, route, name)),
    )
    .build();

    let controller = Service::builder()
        .name("GRPCController")
        .package("plugin")
        .method(
            Method::builder()
                .name("shutdown")
                .route_name("Shutdown")
                .input_type("crate::proto::plugin::Empty")
                .output_type("crate::proto::plugin::Empty")
                .codec_path(CODEC)
                .build(),
        )
        .build();

    Builder::new()
        .build_client(false)
        .build_server(true)
        .compile(&[provider, controller]);

    println!("cargo:rerun-if-changed=build.rs");
}
