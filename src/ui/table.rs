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

/// Column alignment for table rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
}

enum Row {
    Cells(Vec<String>),
    Separator,
}

/// Minimal fixed-width table renderer for CLI output. Cell widths are
/// computed over the visible characters, so colored cells line up as long as
/// colors are applied per-cell.
pub struct Table {
    alignments: Vec<Alignment>,
    headers: Option<Vec<String>>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(num_columns: usize) -> Self {
        Self::new_with_alignments(vec![Alignment::Left; num_columns])
    }

    pub fn new_with_alignments(alignments: Vec<Alignment>) -> Self {
        Self {
            alignments,
            headers: None,
            rows: Vec::new(),
        }
    }

    pub fn set_headers(&mut self, headers: Vec<String>) {
        self.headers = Some(headers);
    }

    pub fn add_row(&mut self, cells: Vec<String>) {
        self.rows.push(Row::Cells(cells));
    }

    pub fn add_separator(&mut self) {
        self.rows.push(Row::Separator);
    }

    pub fn render(&self) -> String {
        let num_columns = self.alignments.len();
        let mut widths = vec![0usize; num_columns];

        let mut measure = |cells: &[String]| {
            for (i, cell) in cells.iter().enumerate().take(num_columns) {
                widths[i] = widths[i].max(visible_width(cell));
            }
        };

        if let Some(headers) = &self.headers {
            measure(headers);
        }
        for row in &self.rows {
            if let Row::Cells(cells) = row {
                measure(cells);
            }
        }

        let mut out = String::new();
        if let Some(headers) = &self.headers {
            out.push_str(&self.render_row(headers, &widths));
            out.push('\n');
        }
        for row in &self.rows {
            match row {
                Row::Cells(cells) => {
                    out.push_str(&self.render_row(cells, &widths));
                }
                Row::Separator => {
                    let total: usize = widths.iter().sum::<usize>() + 2 * (widths.len() - 1);
                    out.push_str(&"-".repeat(total));
                }
            }
            out.push('\n');
        }

        // Drop the trailing newline so callers can log the table as one line.
        out.pop();
        out
    }

    fn render_row(&self, cells: &[String], widths: &[usize]) -> String {
        let mut parts = Vec::with_capacity(widths.len());

        for (i, width) in widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            let padding = width.saturating_sub(visible_width(cell));
            let padded = match self.alignments[i] {
                Alignment::Left => format!("{cell}{}", " ".repeat(padding)),
                Alignment::Right => format!("{}{cell}", " ".repeat(padding)),
            };
            parts.push(padded);
        }

        let mut line = parts.join("  ");
        while line.ends_with(' ') {
            line.pop();
        }
        line
    }
}

/// Number of characters once ANSI escape sequences are stripped.
fn visible_width(text: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;

    for c in text.chars() {
        if in_escape {
            if c == 'm' {
                in_escape = false;
            }
        } else if c == '\u{1b}' {
            in_escape = true;
        } else {
            width += 1;
        }
    }

    width
}
