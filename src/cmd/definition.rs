/*!
Command and argument definitions.

A [`CommandDefinition`] is an immutable record: a name, help text, an ordered
argument schema and a handler. The order of `args` is the positional binding
order.

Argument value kinds:
  string   - token text as-is (paths normalized when flagged `FILE`)
  boolean  - true/yes/y/on/enable/1 or false/no/n/off/disable/0
  integer  - decimal i64
  literal  - the argument's own name, or an unambiguous prefix of it
  pair     - `key:value`
*/

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::interp::Handler;

/// How a token is converted into a bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Boolean,
    Integer,
    Literal,
    Pair,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Literal => "literal",
            ValueKind::Pair => "pair",
        };
        f.write_str(s)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ArgFlags: u8 {
        const OPTIONAL = 1 << 0;
        /// Value is a remote path: normalized against the cwd, path-completed.
        const FILE = 1 << 1;
        /// Path completion only offers containers.
        const CONTAINER = 1 << 2;
        /// May repeat, optionally delimited by `[` `]`.
        const LIST = 1 << 3;
        /// Only bindable as `name=value`.
        const KEYWORD_ONLY = 1 << 4;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentDefinition {
    pub name: String,
    pub kind: ValueKind,
    /// Placeholder text shown by completion; falls back to `name`.
    pub hint: Option<String>,
    pub flags: ArgFlags,
}

impl ArgumentDefinition {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            hint: None,
            flags: ArgFlags::empty(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::String)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Boolean)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Integer)
    }

    pub fn literal(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Literal)
    }

    pub fn pair(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Pair)
    }

    /// A `FILE` string argument.
    pub fn path(name: impl Into<String>, hint: &str) -> Self {
        Self::string(name).hint(hint).flags(ArgFlags::FILE)
    }

    pub fn hint(mut self, hint: &str) -> Self {
        self.hint = Some(hint.to_string());
        self
    }

    pub fn flags(mut self, flags: ArgFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn optional(self) -> Self {
        self.flags(ArgFlags::OPTIONAL)
    }

    pub fn list(self) -> Self {
        self.flags(ArgFlags::LIST)
    }

    pub fn is_optional(&self) -> bool {
        self.flags.contains(ArgFlags::OPTIONAL)
    }

    pub fn is_file(&self) -> bool {
        self.flags.contains(ArgFlags::FILE)
    }

    pub fn is_container(&self) -> bool {
        self.flags.contains(ArgFlags::CONTAINER)
    }

    pub fn is_list(&self) -> bool {
        self.flags.contains(ArgFlags::LIST)
    }

    pub fn is_keyword_only(&self) -> bool {
        self.flags.contains(ArgFlags::KEYWORD_ONLY)
    }

    /// Text for the completion placeholder.
    pub fn hint_text(&self) -> &str {
        self.hint.as_deref().unwrap_or(&self.name)
    }
}

/// A registered command. Cheap to clone; the handler is shared.
#[derive(Clone)]
pub struct CommandDefinition {
    pub name: String,
    pub aliases: Vec<String>,
    pub help: String,
    pub long_help: Option<String>,
    pub args: Vec<ArgumentDefinition>,
    pub handler: Rc<dyn Handler>,
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl CommandDefinition {
    pub fn new(name: impl Into<String>, help: impl Into<String>, handler: impl Handler + 'static) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            help: help.into(),
            long_help: None,
            args: Vec::new(),
            handler: Rc::new(handler),
        }
    }

    pub fn arg(mut self, arg: ArgumentDefinition) -> Self {
        self.args.push(arg);
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn long_help(mut self, text: &str) -> Self {
        self.long_help = Some(text.to_string());
        self
    }

    pub fn arg_index(&self, name: &str) -> Option<usize> {
        self.args.iter().position(|a| a.name == name)
    }

    /// `name arg1 [optional-arg2] ... - help`
    pub fn help_line(&self) -> String {
        let mut line = self.name.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.is_optional() {
                line.push_str(&format!("[{}]", arg.name));
            } else {
                line.push_str(&arg.name);
            }
        }
        line.push_str(" - ");
        line.push_str(&self.help);
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{Continuation, InvocationContext};

    fn noop(_cx: InvocationContext) -> Option<Continuation> {
        None
    }

    #[test]
    fn help_line_brackets_optionals() {
        let def = CommandDefinition::new("ls", "list files", noop)
            .arg(ArgumentDefinition::path("path", "file path").optional())
            .arg(ArgumentDefinition::literal("folder").optional());
        assert_eq!(def.help_line(), "ls [path] [folder] - list files");

        let bare = CommandDefinition::new("pwd", "print working directory", noop);
        assert_eq!(bare.help_line(), "pwd - print working directory");
    }

    #[test]
    fn builder_flags_accumulate() {
        let arg = ArgumentDefinition::path("dir", "directory")
            .flags(ArgFlags::CONTAINER)
            .optional();
        assert!(arg.is_file());
        assert!(arg.is_container());
        assert!(arg.is_optional());
        assert!(!arg.is_list());
        assert_eq!(arg.hint_text(), "directory");
        assert_eq!(ArgumentDefinition::string("x").hint_text(), "x");
    }
}
