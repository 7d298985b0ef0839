/*!
Built-in command table.

Commands are grouped by the service they talk to:

  session.rs  help, exit, who, cd, pushd, popd, pwd, dirs, pager
  files.rs    ls, lookup, mkdir, rm, mv, link, chown, setmt,
              lspolicy, share, unshare, pshare, punshare, pplist
  groups.rs   mkgroup (create), groups, groups!, users, users!, adduser,
              rmuser, mkuser, ucopy, gmove, gattr, rmgroup, rmgroup!
  mail.rs     mkmailer, mail

Handlers are plain functions `fn(InvocationContext) -> Option<Continuation>`.
A handler that calls the service returns the rest of its work as a
continuation and writes its output when the reply arrives.
*/

pub mod files;
pub mod groups;
pub mod mail;
pub mod session;

use serde_json::Value;

use super::definition::CommandDefinition;
use super::registry::{CommandRegistry, DefinitionError, RegistryBuilder};
use crate::interp::InvocationContext;
use crate::remote::{Reply, UNKNOWN_ERROR, error_message};

/// Every built-in command.
pub fn definitions() -> Vec<CommandDefinition> {
    let mut defs = session::commands();
    defs.extend(files::commands());
    defs.extend(groups::commands());
    defs.extend(mail::commands());
    defs
}

pub fn registry() -> Result<CommandRegistry, DefinitionError> {
    definitions()
        .into_iter()
        .fold(RegistryBuilder::new(), RegistryBuilder::register)
        .build()
}

/* ---- shared reply helpers ---- */

/// Reports a reply that did not meet the handler's success condition.
pub(crate) fn reject(cx: &InvocationContext, reply: Reply) {
    match reply {
        Reply::Failure(msg) => cx.show_error(&msg),
        Reply::Success(v) | Reply::Benign(v) => cx.show_error(&error_message(&v)),
        Reply::List(_) => cx.show_error(UNKNOWN_ERROR),
    }
}

/// A reply field as display text; absent and null fields are empty.
pub(crate) fn field(value: &Value, key: &str) -> String {
    match value.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::rc::Rc;

    use crate::cmd::format::StyleOptions;
    use crate::config::Settings;
    use crate::interp::{Interpreter, OutputLine};
    use crate::remote::scripted::ScriptedRemote;

    pub fn harness(remote: &Rc<ScriptedRemote>) -> Interpreter {
        let settings = Settings {
            home: "/home/alice".into(),
            ..Settings::default()
        };
        Interpreter::new(
            super::registry().unwrap(),
            &settings,
            remote.clone(),
            StyleOptions::plain(),
        )
    }

    /// Submits `line`, drives its continuation to the end and returns the
    /// output it produced.
    pub async fn run(it: &mut Interpreter, line: &str) -> Vec<OutputLine> {
        it.submit(line);
        it.settle().await;
        it.console().drain()
    }

    pub async fn run_text(it: &mut Interpreter, line: &str) -> Vec<String> {
        run(it, line).await.iter().map(|l| l.text().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_builds_and_is_sorted() {
        let registry = registry().unwrap();
        let names: Vec<&str> = registry.all().iter().map(|d| d.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        for name in ["help", "cd", "ls", "mkgroup", "create", "users!", "mail", "who", "pplist", "gattr"] {
            assert!(registry.lookup(name).is_some(), "{name} missing");
        }
    }

    #[test]
    fn alias_shares_schema() {
        let registry = registry().unwrap();
        let create = registry.lookup("create").unwrap();
        let mkgroup = registry.lookup("mkgroup").unwrap();
        assert_eq!(create.args, mkgroup.args);
    }

    #[test]
    fn field_text() {
        let v = serde_json::json!({"a": "x", "n": 3, "b": true, "z": null});
        assert_eq!(field(&v, "a"), "x");
        assert_eq!(field(&v, "n"), "3");
        assert_eq!(field(&v, "b"), "true");
        assert_eq!(field(&v, "z"), "");
        assert_eq!(field(&v, "missing"), "");
    }
}
