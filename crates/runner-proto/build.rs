// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/centaurx/runner/v1/runner.proto"], &["proto"])?;
    println!("cargo:rerun-if-changed=proto/centaurx/runner/v1/runner.proto");
    Ok(())
}
