//! Text writer for the metadata format, one `key = value` per line.

use std::fmt;

use super::{ConfigNode, ConfigValue, NodeBody};

/// Accumulates tab-indented metadata text.
#[derive(Debug, Default)]
pub struct Formatter {
    out: String,
    depth: usize,
}

impl Formatter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes one indented line.
    pub fn outf(&mut self, args: fmt::Arguments<'_>) {
        for _ in 0..self.depth {
            self.out.push('\t');
        }
        self.out.push_str(&fmt::format(args));
        self.out.push('\n');
    }

    pub fn out_u64(&mut self, key: &str, value: u64) {
        self.outf(format_args!("{key} = {value}"));
    }

    pub fn out_str(&mut self, key: &str, value: &str) {
        self.outf(format_args!("{key} = {}", quote(value)));
    }

    pub fn out_value(&mut self, key: &str, value: &ConfigValue) {
        self.outf(format_args!("{key} = {}", render(value)));
    }

    pub fn begin_section(&mut self, name: &str) {
        self.outf(format_args!("{name} {{"));
        self.depth += 1;
    }

    pub fn end_section(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.outf(format_args!("}}"));
    }

    /// Writes a string array with one row of entries per line.
    ///
    /// ```text
    /// raids = [
    ///     "lv_rmeta_0", "lv_rimage_0",
    ///     "lv_rmeta_1", "lv_rimage_1"
    /// ]
    /// ```
    pub fn out_string_rows(&mut self, key: &str, rows: &[Vec<&str>]) {
        self.outf(format_args!("{key} = ["));
        self.depth += 1;
        for (i, row) in rows.iter().enumerate() {
            let line = row.iter().map(|s| quote(s)).collect::<Vec<_>>().join(", ");
            let sep = if i + 1 == rows.len() { "" } else { "," };
            self.outf(format_args!("{line}{sep}"));
        }
        self.depth -= 1;
        self.outf(format_args!("]"));
    }

    /// Writes a whole node. The anonymous root section writes only its children.
    pub fn write_node(&mut self, node: &ConfigNode) {
        match node.body() {
            NodeBody::Value(v) => self.out_value(node.key(), v),
            NodeBody::Section(children) if node.key().is_empty() => {
                for child in children {
                    self.write_node(child);
                }
            }
            NodeBody::Section(children) => {
                self.begin_section(node.key());
                for child in children {
                    self.write_node(child);
                }
                self.end_section();
            }
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.out
    }

    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn render(value: &ConfigValue) -> String {
    match value {
        ConfigValue::Int(v) => v.to_string(),
        ConfigValue::Str(s) => quote(s),
        ConfigValue::List(items) => {
            let inner = items.iter().map(render).collect::<Vec<_>>().join(", ");
            format!("[{inner}]")
        }
    }
}
