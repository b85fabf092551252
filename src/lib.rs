// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity Link Server - Assertion Verification & Account Linking Service
//!
//! This crate verifies signed identity assertions issued by an external
//! custodial identity provider and binds each verified identity to an
//! internal account record (optionally carrying a wallet address).
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Assertion verification (provider JWT, JWKS or static key)
//! - `link` - Account link store and the link service
//! - `config` - Environment configuration surface

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod link;
pub mod models;
pub mod state;
