// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

pub mod api;
pub use api::*;

pub mod broker;
pub use broker::{Credential, TokenBroker};

pub mod error;
pub use error::*;

pub mod plugins;
pub use plugins::{new_key_ops, KmsCredentials, KmsProvider, MasterKey};

pub mod transport;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

mod utils;
