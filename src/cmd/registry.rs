/*!
Command registry.

Built once through [`RegistryBuilder`], then frozen: the registry is sorted by
name and never mutated again. Aliases are expanded at registration into
separate entries that share the primary definition's handler, so lookup only
ever compares primary names.

`build()` checks the schema invariants of every definition:
  - argument names are unique within a command
  - an optional argument is never followed by a required argument that can
    only be supplied positionally
*/

use thiserror::Error;

use super::definition::CommandDefinition;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("command '{0}' is registered twice")]
    DuplicateCommand(String),
    #[error("command '{command}' declares argument '{argument}' twice")]
    DuplicateArgument { command: String, argument: String },
    #[error(
        "command '{command}': required argument '{argument}' follows an optional argument"
    )]
    RequiredAfterOptional { command: String, argument: String },
}

#[derive(Default)]
pub struct RegistryBuilder {
    defs: Vec<CommandDefinition>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition and one entry per alias.
    pub fn register(mut self, def: CommandDefinition) -> Self {
        for alias in &def.aliases {
            let mut entry = def.clone();
            entry.name = alias.clone();
            entry.aliases = vec![def.name.clone()];
            self.defs.push(entry);
        }
        self.defs.push(def);
        self
    }

    pub fn build(mut self) -> Result<CommandRegistry, DefinitionError> {
        for def in &self.defs {
            validate(def)?;
        }
        self.defs.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in self.defs.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(DefinitionError::DuplicateCommand(pair[0].name.clone()));
            }
        }
        Ok(CommandRegistry { defs: self.defs })
    }
}

fn validate(def: &CommandDefinition) -> Result<(), DefinitionError> {
    let mut seen_optional = false;
    for (i, arg) in def.args.iter().enumerate() {
        if def.args[..i].iter().any(|a| a.name == arg.name) {
            return Err(DefinitionError::DuplicateArgument {
                command: def.name.clone(),
                argument: arg.name.clone(),
            });
        }
        if arg.is_optional() {
            seen_optional = true;
        } else if seen_optional && !arg.is_keyword_only() {
            return Err(DefinitionError::RequiredAfterOptional {
                command: def.name.clone(),
                argument: arg.name.clone(),
            });
        }
    }
    Ok(())
}

/// Immutable, name-sorted command table.
#[derive(Debug)]
pub struct CommandRegistry {
    defs: Vec<CommandDefinition>,
}

impl CommandRegistry {
    pub fn lookup(&self, name: &str) -> Option<&CommandDefinition> {
        self.defs
            .binary_search_by(|d| d.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.defs[i])
    }

    /// All definitions, sorted by name.
    pub fn all(&self) -> &[CommandDefinition] {
        &self.defs
    }

    /// Names starting with `prefix`, in sorted order.
    pub fn names_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.defs
            .iter()
            .map(|d| d.name.as_str())
            .filter(move |n| n.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::definition::ArgumentDefinition;
    use crate::interp::{Continuation, InvocationContext};

    fn noop(_cx: InvocationContext) -> Option<Continuation> {
        None
    }

    fn def(name: &str) -> CommandDefinition {
        CommandDefinition::new(name, "test", noop)
    }

    #[test]
    fn sorted_and_looked_up_by_name() {
        let reg = RegistryBuilder::new()
            .register(def("pwd"))
            .register(def("cd"))
            .register(def("ls"))
            .build()
            .unwrap();
        let names: Vec<_> = reg.all().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["cd", "ls", "pwd"]);
        assert!(reg.lookup("ls").is_some());
        assert!(reg.lookup("l").is_none());
        assert_eq!(reg.all().len(), 3);
    }

    #[test]
    fn aliases_become_entries() {
        let reg = RegistryBuilder::new()
            .register(def("mkgroup").alias("create"))
            .build()
            .unwrap();
        let alias = reg.lookup("create").unwrap();
        assert_eq!(alias.aliases, vec!["mkgroup".to_string()]);
        assert!(std::rc::Rc::ptr_eq(
            &alias.handler,
            &reg.lookup("mkgroup").unwrap().handler
        ));
    }

    #[test]
    fn prefix_listing() {
        let reg = RegistryBuilder::new()
            .register(def("lsusers"))
            .register(def("ls"))
            .register(def("lookup"))
            .build()
            .unwrap();
        let names: Vec<_> = reg.names_with_prefix("ls").collect();
        assert_eq!(names, vec!["ls", "lsusers"]);
    }

    #[test]
    fn rejects_duplicate_command() {
        let err = RegistryBuilder::new()
            .register(def("ls"))
            .register(def("ls"))
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateCommand("ls".into()));
    }

    #[test]
    fn rejects_duplicate_argument() {
        let err = RegistryBuilder::new()
            .register(
                def("x")
                    .arg(ArgumentDefinition::string("a"))
                    .arg(ArgumentDefinition::string("a")),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateArgument { .. }));
    }

    #[test]
    fn rejects_required_after_optional() {
        let err = RegistryBuilder::new()
            .register(
                def("x")
                    .arg(ArgumentDefinition::string("a").optional())
                    .arg(ArgumentDefinition::string("b")),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::RequiredAfterOptional { .. }));
    }

    #[test]
    fn keyword_only_required_may_follow_optional() {
        let reg = RegistryBuilder::new().register(
            def("x")
                .arg(ArgumentDefinition::string("a").optional())
                .arg(
                    ArgumentDefinition::string("b")
                        .flags(crate::cmd::definition::ArgFlags::KEYWORD_ONLY),
                ),
        );
        assert!(reg.build().is_ok());
    }
}
