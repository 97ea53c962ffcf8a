//! Printing values and call-frame dumps

use super::env::Dict;
use super::native::Native;
use super::value::{Block, Value};
use rustc_hash::FxHashSet;
use std::fmt::{self, Write};

/// Frames beyond this are elided from dumps.
const MAX_DUMP_FRAMES: usize = 32;

/// Print a value in full.
pub fn print(value: &Value) -> String {
    Printer::new(false).print(value)
}

/// Print a value with nested structure elided.
pub fn print_short(value: &Value) -> String {
    Printer::new(true).print(value)
}

/// Render the frame chain active at `env`, innermost first.
///
/// Each line holds the frame's name and its own bindings, if it has any.
/// Follows `caller`
/// links, falling back to `parent` for scopes that are not call frames.
pub fn frame_dump(env: &Dict) -> String {
    let mut lines = Vec::new();
    let mut current = Some(env.clone());
    while let Some(frame) = current {
        if lines.len() == MAX_DUMP_FRAMES {
            lines.push("  ...".to_string());
            break;
        }
        let mut line = format!("  at {}", frame.display_name());
        // Tagged scopes (the root) hold every builtin; their bindings are noise.
        if frame.tag().is_none() && !frame.is_empty() {
            line.push_str(" [");
            for name in frame.names() {
                let _ = write!(line, " {name}: {}", print_short(&frame.get(&name)));
            }
            line.push_str(" ]");
        }
        lines.push(line);
        current = frame.caller().or_else(|| frame.parent());
    }
    lines.join("\n")
}

struct Printer {
    short: bool,
    seen: FxHashSet<usize>,
}

impl Printer {
    fn new(short: bool) -> Self {
        Printer {
            short,
            seen: FxHashSet::default(),
        }
    }

    fn print(&mut self, value: &Value) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write(&mut out, value);
        out
    }

    fn write(&mut self, out: &mut String, value: &Value) -> fmt::Result {
        match value {
            Value::Nil => out.write_str("nil"),
            Value::Num(n) => write!(out, "{n}"),
            Value::Bool(b) => write!(out, "{b}"),
            Value::Str(s) => write!(out, "\"{s}\""),
            Value::Sym(s) => out.write_str(s),
            Value::Quote(inner) => {
                out.write_char(':')?;
                self.write(out, inner)
            }
            Value::FullQuote(inner) => {
                out.write_char('\\')?;
                self.write(out, inner)
            }
            Value::List(list) => {
                if self.short {
                    return out.write_str("[...]");
                }
                if !self.seen.insert(list.addr()) {
                    return out.write_str("[...]");
                }
                out.write_char('[')?;
                self.write_seq(out, &list.items())?;
                self.seen.remove(&list.addr());
                out.write_char(']')
            }
            Value::Dict(dict) => self.write_dict(out, dict),
            Value::Block(block) => self.write_block(out, block),
            Value::Native(Native::Func(func)) => write!(out, "<native {}>", func.name),
            Value::Native(Native::Object(obj)) => write!(out, "<{}>", obj.type_tag()),
        }
    }

    fn write_seq(&mut self, out: &mut String, items: &[Value]) -> fmt::Result {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.write_char(' ')?;
            }
            self.write(out, item)?;
        }
        Ok(())
    }

    fn write_dict(&mut self, out: &mut String, dict: &Dict) -> fmt::Result {
        let dict = dict.tee_target();
        if self.short || !self.seen.insert(dict.addr()) {
            return out.write_str("{...}");
        }
        out.write_char('{')?;
        for (i, name) in dict.names().iter().enumerate() {
            if i > 0 {
                out.write_char(' ')?;
            }
            write!(out, "{name} = ")?;
            self.write(out, &dict.get(name))?;
        }
        self.seen.remove(&dict.addr());
        out.write_char('}')
    }

    fn write_block(&mut self, out: &mut String, block: &Block) -> fmt::Result {
        if let Some(name) = &block.name {
            out.write_str(name)?;
        }
        out.write_char('[')?;
        for param in &block.params {
            write!(out, "{param} ")?;
        }
        out.write_char('|')?;
        if self.short {
            out.write_str(" ...")?;
        } else {
            for expr in &block.body {
                out.write_char(' ')?;
                self.write(out, expr)?;
            }
        }
        out.write_char(']')
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print(self))
    }
}
