#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A pooled, authenticated, retry-aware transport to a remote headless
//! browser server, exposing the uniform `executeTool`/`sendRaw` command
//! surface described by the server's wire protocol.

mod auth;
mod config;
mod error;
mod tools;
mod transport;
pub mod wire;

pub use crate::auth::{AuthMode, Token, TokenSigner};
pub use crate::config::{RemoteConfig, RemoteConfigBuilder, SharedRemoteConfig};
pub use crate::error::TransportError;
pub use crate::tools::{is_long_running, map_params, map_tool_name, unmap_tool_name};
pub use crate::transport::Transport;
