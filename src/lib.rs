//! pmbook: project management records over HTTP.
//!
//! Users, projects with phase-scoped access lists, the phase section
//! documents embedded in each project, and the WBS, deliverable and activity
//! records that hang off a project. Documents live in Sled; the REST layer is
//! Axum.

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod ids;
pub mod logging;
pub mod models;
pub mod phases;
// REST API: Axum handlers under /api, Swagger UI under /api/docs
pub mod rest;
pub mod sections;
pub mod service;
pub mod storage;
