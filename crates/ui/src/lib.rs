#![deny(unsafe_code)]

/// Desktop chat client for the parley backend.
///
/// One window, two routes: the chat view posts user messages to the remote
/// agent endpoint and renders the running transcript; the history view lists
/// every stored session and expands one into a modal message list.
pub mod app;
/// Chat route: transcript domain, composer, renderer, coordinator.
pub mod chat;
pub mod config;
pub mod history;
