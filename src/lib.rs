// IDE Agent Gateway - Library Root
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// All modules exported here for use by the binary and tests.

pub mod error;
pub mod config;
pub mod paths;
pub mod session;
pub mod storage;

// ============================================================================
// SAFETY VALIDATORS
// ============================================================================

/// Protected-path checks run before any filesystem access
pub mod path_safety;

/// Dangerous shell command detection
pub mod command_safety;

// ============================================================================
// TOOLS
// ============================================================================

pub mod fs_tools;
pub mod file_search;
pub mod search_replace;
pub mod terminal;
pub mod merge;

/// Tool catalog, typed invocations and result envelopes
pub mod tools;

/// Single entry point for every tool invocation
pub mod gateway;

// ============================================================================
// AGENT
// ============================================================================

pub mod model;
pub mod prompt;
pub mod agent;

/// axum server: agent and per-tool endpoints
pub mod http;
