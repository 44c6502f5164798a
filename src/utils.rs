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

use chrono::{DateTime, Local, Utc};

#[allow(non_upper_case_globals)]
pub mod size {
    pub const KiB: u64 = 1024;
    pub const MiB: u64 = 1024 * KiB;
    pub const GiB: u64 = 1024 * MiB;
}

/// Formats a byte count with a binary unit suffix.
pub fn format_size(bytes: u64, precision: usize) -> String {
    if bytes >= size::GiB {
        format!("{:.*} GiB", precision, bytes as f64 / size::GiB as f64)
    } else if bytes >= size::MiB {
        format!("{:.*} MiB", precision, bytes as f64 / size::MiB as f64)
    } else if bytes >= size::KiB {
        format!("{:.*} KiB", precision, bytes as f64 / size::KiB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Formats a count with a singular or plural noun.
pub fn format_count(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

/// Convert a UTC timestamp to a human-readable time in the user's local timezone.
pub fn utc_to_local_format(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Pretty-prints a duration as hours, minutes and seconds.
pub fn pretty_print_duration(duration: std::time::Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{:.2}s", duration.as_secs_f32())
    }
}

/// Truncates a string for single-line table display.
pub fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let prefix: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{prefix}…")
}
