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

//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// The IDE Companion Bridge: a local side-car mediating between an editor
/// session and an AI coding assistant.
#[derive(Parser, Debug)]
#[command(name = "ide-bridge")]
#[command(about = "Local bridge between an editor session and an AI coding assistant")]
pub struct Args {
    /// Workspace root directory. Defaults to the current working directory.
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Path to an explicit configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the editor's RPC socket. Falls back to `GEMINI_IDE_EDITOR_SOCKET`.
    #[arg(long, env = "GEMINI_IDE_EDITOR_SOCKET")]
    pub editor_socket: Option<PathBuf>,

    /// Editor identifier embedded in discovery file names and `ideInfo.name`.
    #[arg(long, env = "GEMINI_IDE_EDITOR_ID", default_value = "neovim")]
    pub editor_id: String,

    /// Raise log verbosity to debug regardless of `RUST_LOG`.
    #[arg(long)]
    pub debug: bool,
}

