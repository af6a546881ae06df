//! Generates the `kv.KvStore` gRPC client and server glue.
//!
//! Messages are declared in Rust (`src/kv/conversions.rs`) with prost
//! derives, so the manual service builder is used and no `protoc` is needed.

fn main() {
    let method = |name: &str, route: &str, input: &str, output: &str| {
        tonic_build::manual::Method::builder()
            .name(name)
            .route_name(route)
            .input_type(format!("crate::kv::conversions::proto::{input}"))
            .output_type(format!("crate::kv::conversions::proto::{output}"))
            .codec_path("tonic::codec::ProstCodec")
            .build()
    };

    let service = tonic_build::manual::Service::builder()
        .name("KvStore")
        .package("kv")
        .method(method("get", "Get", "GetRequest", "GetReply"))
        .method(method("set", "Set", "SetRequest", "SetReply"))
        .method(method("list", "List", "ListRequest", "StoreReply"))
        .method(method(
            "register_with_peer",
            "RegisterWithPeer",
            "RegisterRequest",
            "StoreReply",
        ))
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);

    println!("cargo:rerun-if-changed=build.rs");
}
