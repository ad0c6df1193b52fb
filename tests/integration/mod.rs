//! Integration tests for the path index

mod cli_workspace;
mod event_dispatch;
mod index_properties;
mod path_conditions;
mod scenarios;
mod support;
