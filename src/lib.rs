//! Client and enquiry form dialogs for the admin panel API.
//!
//! - [`session`] - bearer-token session and the login redirect hook
//! - [`api`] - authenticated JSON transport
//! - [`catalog`] - product, package and plan option lists
//! - [`form`] - dialogs, the cascading product → package controller, submission
//! - [`config`] - optional TOML configuration

pub mod api;
pub mod catalog;
pub mod config;
pub mod form;
pub mod session;
