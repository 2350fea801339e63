/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! The IDE Companion Bridge mediates between a running editor session and an
//! AI coding assistant: it surfaces live editor context (open files, cursor,
//! selection) over a loopback HTTP/JSON-RPC session protocol and mediates
//! inline diff review in the editor.

/// Command-line interface definitions.
pub mod cli;
/// Configuration handling for debounce, keep-alive and body-size limits.
pub mod config;
/// Context aggregation: open-file list, active file, cursor, selection.
pub mod context;
/// Diff coordination between the client and the editor.
pub mod diff;
/// Discovery and env-script publishing, plus stale-file reaping.
pub mod discovery;
/// Editor RPC adapter: attaches to the editor over a Unix socket.
pub mod editor;
/// Shared JSON-RPC 2.0 envelope types.
pub mod rpc;
/// HTTP/JSON-RPC front-end and session hub.
pub mod server;
/// Session hub: live client sessions, fan-out, keep-alive.
pub mod session;
