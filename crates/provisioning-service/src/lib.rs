//! Provisioning service library.
//!
//! Creates meetings and attendees on a media backend for the meeting client.
//! A meeting title maps to one meeting until it is ended; each join adds a
//! new attendee.
//!
//! # Endpoints
//!
//! - `GET /` - status body
//! - `POST /join?title&name&region` - returns `{"JoinInfo": ...}`
//! - `POST /end?title` - deletes the meeting
//! - `GET /health`, `GET /metrics`

pub mod backend;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod registry;
pub mod routes;
