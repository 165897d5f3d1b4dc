//! Structured builder for automation scripts.
//!
//! Scripts are written as templates with `{{name}}` placeholders and filled
//! with typed [`Param`]s.  String parameters are always emitted as quoted
//! literals of the target [`Dialect`], so an application or window name
//! containing quote characters can never break out of its literal.
//!
//! ```ignore
//! let script = Script::applescript(r#"tell application "Terminal" to close window id {{id}}"#)
//!     .int("id", 4211);
//! let inv = script.invocation()?;
//! ```

use crate::exec::Invocation;

/// Scripting language a template is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    AppleScript,
    /// JavaScript for Automation (`osascript -l JavaScript`).
    Jxa,
    PowerShell,
}

/// A typed template parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Str(String),
    Int(i64),
    Float(f64),
    StrList(Vec<String>),
    IntList(Vec<i64>),
}

/// Errors produced while rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("template references unknown parameter {0:?}")]
    UnknownParam(String),
    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),
}

/// A template plus its parameters.
#[derive(Debug, Clone)]
pub struct Script {
    dialect: Dialect,
    template: String,
    params: Vec<(String, Param)>,
}

impl Script {
    pub fn new(dialect: Dialect, template: impl Into<String>) -> Self {
        Self {
            dialect,
            template: template.into(),
            params: Vec::new(),
        }
    }

    pub fn applescript(template: impl Into<String>) -> Self {
        Self::new(Dialect::AppleScript, template)
    }

    pub fn jxa(template: impl Into<String>) -> Self {
        Self::new(Dialect::Jxa, template)
    }

    pub fn powershell(template: impl Into<String>) -> Self {
        Self::new(Dialect::PowerShell, template)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn param(mut self, name: &str, value: Param) -> Self {
        self.params.retain(|(n, _)| n != name);
        self.params.push((name.to_string(), value));
        self
    }

    pub fn str(self, name: &str, value: impl Into<String>) -> Self {
        self.param(name, Param::Str(value.into()))
    }

    pub fn int(self, name: &str, value: i64) -> Self {
        self.param(name, Param::Int(value))
    }

    pub fn float(self, name: &str, value: f64) -> Self {
        self.param(name, Param::Float(value))
    }

    pub fn list<I, S>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.param(name, Param::StrList(values.into_iter().map(Into::into).collect()))
    }

    pub fn ints<I>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        self.param(name, Param::IntList(values.into_iter().collect()))
    }

    /// Substitute every `{{name}}` placeholder.
    pub fn render(&self) -> Result<String, ScriptError> {
        let mut out = String::with_capacity(self.template.len() + 64);
        let mut rest = self.template.as_str();
        let mut offset = 0;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or(ScriptError::Unterminated(offset + start))?;
            let name = after[..end].trim();
            let value = self
                .params
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .ok_or_else(|| ScriptError::UnknownParam(name.to_string()))?;
            out.push_str(&literal(self.dialect, value));
            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Render and wrap in the command line that executes this dialect.
    pub fn invocation(&self) -> Result<Invocation, ScriptError> {
        let body = self.render()?;
        Ok(match self.dialect {
            Dialect::AppleScript => Invocation::new("osascript").arg("-e").arg(body),
            Dialect::Jxa => Invocation::new("osascript")
                .args(["-l", "JavaScript", "-e"])
                .arg(body),
            Dialect::PowerShell => Invocation::new("powershell")
                .args(["-NoProfile", "-NonInteractive", "-Command"])
                .arg(body),
        })
    }
}

/// Render one parameter as a literal of `dialect`.
pub fn literal(dialect: Dialect, value: &Param) -> String {
    match value {
        Param::Int(n) => n.to_string(),
        Param::Float(f) => format!("{:.4}", f),
        Param::Str(s) => quote(dialect, s),
        Param::StrList(items) => {
            list(dialect, items.iter().map(|s| quote(dialect, s)).collect())
        }
        Param::IntList(items) => list(dialect, items.iter().map(i64::to_string).collect()),
    }
}

fn list(dialect: Dialect, items: Vec<String>) -> String {
    match dialect {
        Dialect::AppleScript => format!("{{{}}}", items.join(", ")),
        Dialect::Jxa => format!("[{}]", items.join(", ")),
        Dialect::PowerShell => format!("@({})", items.join(", ")),
    }
}

/// Quote a string as a literal of `dialect`.
pub fn quote(dialect: Dialect, s: &str) -> String {
    match dialect {
        Dialect::AppleScript => format!("\"{}\"", applescript_escape(s)),
        // A JSON string is a valid JavaScript string literal.
        Dialect::Jxa => serde_json::Value::String(s.to_string()).to_string(),
        Dialect::PowerShell => format!("'{}'", powershell_escape(s)),
    }
}

/// Escape a string for use inside an AppleScript double-quoted literal.
pub fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Escape a string for use inside a PowerShell single-quoted literal.
///
/// PowerShell also treats the typographic single quotes as delimiters, so
/// they are doubled like the ASCII one.
pub fn powershell_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => {
                out.push(c);
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
