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

use std::fmt::Arguments;

use colored::Colorize;

use crate::global;

pub fn print_log(args: Arguments<'_>) {
    if !global::global_opts().quiet {
        println!("{args}");
    }
}

pub fn print_verbose(level: u32, args: Arguments<'_>) {
    let opts = global::global_opts();
    if !opts.quiet && opts.verbosity >= level {
        println!("{args}");
    }
}

pub fn print_warning(args: Arguments<'_>) {
    if !global::global_opts().quiet {
        eprintln!("{} {}", "warning:".bold().yellow(), args);
    }
}

/// Errors are printed even in quiet mode.
pub fn print_error(args: Arguments<'_>) {
    eprintln!("{} {}", "error:".bold().red(), args);
}

#[macro_export]
macro_rules! log {
    () => {
        $crate::ui::cli::print_log(format_args!(""))
    };
    ($($arg:tt)*) => {
        $crate::ui::cli::print_log(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! verbose_1 {
    ($($arg:tt)*) => {
        $crate::ui::cli::print_verbose(1, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! verbose_2 {
    ($($arg:tt)*) => {
        $crate::ui::cli::print_verbose(2, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {
        $crate::ui::cli::print_warning(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::ui::cli::print_error(format_args!($($arg)*))
    };
}

pub use error;
pub use log;
pub use verbose_1;
#[allow(unused_imports)]
pub use verbose_2;
pub use warning;
