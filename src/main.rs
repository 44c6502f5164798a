// urraca is a configuration history tool for the Claude toolchain
// Copyright (C) 2025  Javier Lancha Vázquez <javier.lancha@gmail.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use clap::{Parser, Subcommand};

use urraca::commands::{
    self, GlobalArgs, cmd_delete, cmd_diff, cmd_export, cmd_gc, cmd_init, cmd_list, cmd_show,
    cmd_snapshot, cmd_stats, cmd_tag, cmd_verify,
};
use urraca::global;
use urraca::ui;

#[derive(Parser, Debug)]
#[clap(
    name = "urraca",
    version,
    about = "Configuration history for the Claude toolchain"
)]
struct Cli {
    #[clap(flatten)]
    global: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Init(cmd_init::CmdArgs),
    Snapshot(cmd_snapshot::CmdArgs),
    List(cmd_list::CmdArgs),
    Show(cmd_show::CmdArgs),
    Diff(cmd_diff::CmdArgs),
    Tag(cmd_tag::CmdArgs),
    Delete(cmd_delete::CmdArgs),
    Export(cmd_export::CmdArgs),
    Stats(cmd_stats::CmdArgs),
    Verify(cmd_verify::CmdArgs),
    Gc(cmd_gc::CmdArgs),
}

fn main() {
    let cli = Cli::parse();
    global::set_global_opts_with_args(&cli.global);

    // Ctrl-C trips the shared token; in-flight snapshot transactions roll
    // back at their next suspension point.
    let token = global::cancel_token();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        ui::cli::warning!("Could not install the Ctrl-C handler: {e}");
    }

    let result = match &cli.command {
        Command::Init(args) => commands::cmd_init::run(&cli.global, args),
        Command::Snapshot(args) => commands::cmd_snapshot::run(&cli.global, args),
        Command::List(args) => commands::cmd_list::run(&cli.global, args),
        Command::Show(args) => commands::cmd_show::run(&cli.global, args),
        Command::Diff(args) => commands::cmd_diff::run(&cli.global, args),
        Command::Tag(args) => commands::cmd_tag::run(&cli.global, args),
        Command::Delete(args) => commands::cmd_delete::run(&cli.global, args),
        Command::Export(args) => commands::cmd_export::run(&cli.global, args),
        Command::Stats(args) => commands::cmd_stats::run(&cli.global, args),
        Command::Verify(args) => commands::cmd_verify::run(&cli.global, args),
        Command::Gc(args) => commands::cmd_gc::run(&cli.global, args),
    };

    if let Err(e) = result {
        ui::cli::error!("{e:#}");
        std::process::exit(1);
    }
}
