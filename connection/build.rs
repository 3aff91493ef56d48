//! Compiles the vendored `.proto` subset into Rust structs with `prost-build`.
//!
//! Requires a `protoc` binary on the build machine (see the `PROTOC` env var override in
//! `prost-build`'s docs if it isn't on PATH).

fn main() {
    let protos = [
        "proto/mysqlx.proto",
        "proto/datatypes.proto",
        "proto/connection.proto",
        "proto/session.proto",
        "proto/notice.proto",
        "proto/sql.proto",
        "proto/resultset.proto",
        "proto/prepare.proto",
    ];

    for proto in &protos {
        println!("cargo:rerun-if-changed={proto}");
    }

    prost_build::compile_protos(&protos, &["proto/"]).expect("failed to compile mysqlx .proto schema");
}
