//! **cardwin** keeps task cards linked to live desktop windows.
//!
//! A kanban board's cards point at terminal, file-manager and application
//! windows.  cardwin keeps those pointers valid as windows come and go,
//! raises and closes windows on request, tiles them into grids across
//! several displays, and toggles translucent terminal presets.
//!
//! # Architecture
//!
//! The crate is organised around two core traits:
//!
//! * [`traits::WindowPlatform`]: abstracts one operating system's window
//!   automation surface so probing, reconciliation and layout are not
//!   coupled to macOS, Windows or X11.
//! * [`traits::CommandSource`]: abstracts the transport that delivers
//!   board requests (a local socket, an in-memory channel, …) so the main
//!   loop is not coupled to any specific IPC mechanism.
//!
//! Concrete platforms live in [`platform`]; the socket front-end lives in
//! [`ipc`].  [`service::WindowService`] dispatches every
//! [`command::Command`] against one shared [`context::Context`].

pub mod appearance;
pub mod arrange;
pub mod bezier;
pub mod cache;
pub mod command;
pub mod config;
pub mod context;
pub mod control;
pub mod display;
pub mod exec;
pub mod grid;
pub mod ipc;
pub mod model;
pub mod platform;
pub mod poller;
pub mod probe;
pub mod reconcile;
pub mod script;
pub mod service;
pub mod traits;

#[cfg(test)]
mod mock;
