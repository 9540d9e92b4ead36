// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Named two-way directory synchronization.
//!
//! Unisync keeps directories on this machine in sync with directories on
//! remote hosts by driving [unison] over ssh. Each pairing is a __named
//! command__ in the configuration file, so `unisync git` is all it takes to
//! synchronize `~/git` with every host it is bound to.
//!
//! Unisync also knows how to inspect a host for everything a sync needs, and
//! how to bootstrap whatever is missing.
//!
//! [unison]: https://github.com/bcpierce00/unison

pub mod bootstrap;
pub mod config;
pub mod exit;
pub mod host;
pub mod path;
pub mod profile;
pub mod prompt;
pub mod runner;
pub mod store;
