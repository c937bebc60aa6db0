//! Container provisioning for lustmolch.
//!
//! Allocates ports and link addresses, renders config templates, drives the
//! host's container tooling and manages `authorized_keys` inside container
//! roots.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod firewall;
pub mod host;
pub mod layout;
pub mod manager;
pub mod network;
pub mod ports;
pub mod ssh;
pub mod template;
pub mod templates;
