// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generated `centaurx.runner.v1` protobuf/tonic types (§4.3, §6), shared by
//! `centaurx-runner` (server) and `centaurx-provider` (client).

pub mod proto {
    tonic::include_proto!("centaurx.runner.v1");
}
