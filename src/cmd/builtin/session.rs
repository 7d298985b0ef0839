//! Session commands: help, exit, who and the working-directory commands.

use std::cell::RefCell;

use serde_json::{Value, json};
use tracing::debug;

use super::{field, reject};
use crate::cmd::definition::{ArgFlags, ArgumentDefinition, CommandDefinition};
use crate::cmd::format::format_time;
use crate::interp::{Continuation, InvocationContext, Session, deferred};
use crate::remote::{Api, Reply, status_of};

pub const USAGE_NOTES: [&str; 2] = [
    "Use Tab for command completion and parameter prompts, and for file path completion.",
    "Parameters are separated by space.",
];

pub fn commands() -> Vec<CommandDefinition> {
    let dir = || ArgumentDefinition::path("dir", "directory").flags(ArgFlags::CONTAINER);
    vec![
        CommandDefinition::new("help", "show this information", help)
            .arg(ArgumentDefinition::string("command").hint("command name").optional()),
        CommandDefinition::new("exit", "exit command line interpreter", exit),
        CommandDefinition::new("cd", "change current directory", cd).arg(dir().optional()),
        CommandDefinition::new("pushd", "push new current directory", pushd).arg(dir()),
        CommandDefinition::new("popd", "pop current directory stack", popd),
        CommandDefinition::new("pwd", "print current working directory", pwd),
        CommandDefinition::new("dirs", "show the directory stack", dirs),
        CommandDefinition::new("pager", "enable or disable output paging", pager)
            .arg(ArgumentDefinition::boolean("enable").hint("on|off").optional()),
        CommandDefinition::new("who", "who is on the system", who),
    ]
}

fn help(cx: InvocationContext) -> Option<Continuation> {
    let topic = cx.args.str("command");
    if let Some(def) = topic.and_then(|t| cx.registry.lookup(t)) {
        cx.echo(def.help_line());
        if let Some(long) = &def.long_help {
            cx.echo(long.clone());
        }
        return None;
    }
    let mut lines: Vec<String> = cx
        .registry
        .all()
        .iter()
        .filter(|d| topic.is_none_or(|t| d.name.starts_with(t)))
        .map(|d| format!("    {}", d.help_line()))
        .collect();
    lines.extend(USAGE_NOTES.iter().map(|s| s.to_string()));
    cx.page(lines);
    None
}

fn exit(cx: InvocationContext) -> Option<Continuation> {
    cx.session.borrow_mut().exit_requested = true;
    None
}

fn cd(cx: InvocationContext) -> Option<Continuation> {
    change_dir(cx, false)
}

fn pushd(cx: InvocationContext) -> Option<Continuation> {
    {
        let mut session = cx.session.borrow_mut();
        let cwd = session.cwd.clone();
        session.dirstack.push(cwd);
    }
    change_dir(cx, true)
}

/// Looks the directory up and moves there if it is a container. A failed
/// `pushd` takes its pushed entry back off the stack.
fn change_dir(cx: InvocationContext, pushed: bool) -> Option<Continuation> {
    let dir = match cx.args.str("dir") {
        Some(d) => d.to_string(),
        None => cx.session.borrow().home.clone(),
    };
    deferred(async move {
        let moved = match cx.request(Api::File, "lookup", json!({ "path": dir })).await {
            Some(Reply::Success(v) | Reply::Benign(v)) => {
                let path = match field(&v, "path") {
                    p if p.is_empty() => dir.clone(),
                    p => p,
                };
                if v.get("container").and_then(|c| c.as_bool()) == Some(true) {
                    debug!(%path, "cwd changed");
                    cx.session.borrow_mut().cwd = path;
                    true
                } else {
                    cx.error(format!("{path} is not a container."));
                    false
                }
            }
            Some(Reply::List(_)) => {
                cx.error(format!("{dir} is not a container."));
                false
            }
            Some(Reply::Failure(_)) | None => false,
        };
        if pushed && !moved {
            unwind_push(&cx.session);
        }
    })
}

fn unwind_push(session: &RefCell<Session>) {
    let mut session = session.borrow_mut();
    if let Some(prev) = session.dirstack.pop() {
        session.cwd = prev;
    }
}

fn popd(cx: InvocationContext) -> Option<Continuation> {
    let popped = {
        let mut session = cx.session.borrow_mut();
        session.dirstack.pop().map(|prev| {
            session.cwd = prev.clone();
            prev
        })
    };
    match popped {
        Some(cwd) => cx.echo(cwd),
        None => cx.echo("Directory stack is empty."),
    }
    None
}

fn pwd(cx: InvocationContext) -> Option<Continuation> {
    cx.echo(cx.cwd());
    None
}

fn dirs(cx: InvocationContext) -> Option<Continuation> {
    let line = {
        let session = cx.session.borrow();
        std::iter::once(session.cwd.as_str())
            .chain(session.dirstack.iter().rev().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    };
    cx.echo(line);
    None
}

fn pager(cx: InvocationContext) -> Option<Continuation> {
    let enable = cx.args.bool("enable").unwrap_or(!cx.console.paging());
    cx.console.set_paging(enable);
    let state = if enable { "enabled" } else { "disabled" };
    cx.echo(format!("Output paging is {state}"));
    None
}

/// Server-side script that lists the active sessions.
const WHO_SCRIPT: &str = "/lua/who.lua";

fn who(cx: InvocationContext) -> Option<Continuation> {
    let params = json!({ "path": WHO_SCRIPT, "asOwner": true, "args": [] });
    deferred(async move {
        match cx.call(Api::File, "lua", params).await {
            Some(Reply::Success(v)) if status_of(&v) == Some(1) => {
                let active = v.get("result").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
                for s in active {
                    let since = s.get("startTime").and_then(Value::as_i64).map(format_time).unwrap_or_default();
                    cx.echo(format!(
                        "{} since {since} from {}",
                        field(s, "userPath"),
                        field(s, "ipAddress")
                    ));
                }
            }
            Some(other) => reject(&cx, other),
            None => {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::{harness, run, run_text};
    use super::*;
    use crate::interp::OutputLine;
    use crate::remote::TransportError;
    use crate::remote::scripted::ScriptedRemote;

    #[tokio::test]
    async fn cd_moves_into_containers_only() {
        let remote = ScriptedRemote::new();
        remote
            .reply("lookup", json!({"status": 1, "path": "/home/alice/docs", "container": true}))
            .reply("lookup", json!({"status": 1, "path": "/home/alice/docs/a.txt", "container": false}));
        let mut it = harness(&remote);

        assert!(run(&mut it, "cd docs").await.is_empty());
        assert_eq!(it.session().cwd, "/home/alice/docs");
        assert_eq!(remote.last().unwrap().params, json!({"path": "/home/alice/docs"}));

        assert_eq!(
            run(&mut it, "cd a.txt").await,
            vec![OutputLine::Error("/home/alice/docs/a.txt is not a container.".into())]
        );
        assert_eq!(it.session().cwd, "/home/alice/docs");
    }

    #[tokio::test]
    async fn cd_without_argument_goes_home() {
        let remote = ScriptedRemote::new();
        remote.reply("lookup", json!({"status": 1, "path": "/home/alice", "container": true}));
        let mut it = harness(&remote);
        run(&mut it, "cd").await;
        assert_eq!(remote.last().unwrap().params, json!({"path": "/home/alice"}));
    }

    #[tokio::test]
    async fn pushd_popd_round_trip() {
        let remote = ScriptedRemote::new();
        remote.reply("lookup", json!({"status": 1, "path": "/srv", "container": true}));
        let mut it = harness(&remote);

        run(&mut it, "pushd /srv").await;
        assert_eq!(it.session().cwd, "/srv");
        assert_eq!(run_text(&mut it, "dirs").await, vec!["/srv /home/alice"]);
        assert_eq!(run_text(&mut it, "popd").await, vec!["/home/alice"]);
        assert_eq!(run_text(&mut it, "popd").await, vec!["Directory stack is empty."]);
    }

    #[tokio::test]
    async fn failed_pushd_unwinds_stack() {
        let remote = ScriptedRemote::new();
        remote
            .reply("lookup", json!({"status": -1, "msg": "no such file"}))
            .fail(
                "lookup",
                TransportError::Status {
                    code: 500,
                    body: String::new(),
                },
            );
        let mut it = harness(&remote);

        assert_eq!(run_text(&mut it, "pushd /nope").await, vec!["Error: no such file"]);
        assert!(it.session().dirstack.is_empty());
        assert_eq!(
            run_text(&mut it, "pushd /down").await,
            vec!["Error: status 500: request failed"]
        );
        assert!(it.session().dirstack.is_empty());
        assert_eq!(it.session().cwd, "/home/alice");
    }

    #[tokio::test]
    async fn help_for_one_command_and_by_prefix() {
        let remote = ScriptedRemote::new();
        let mut it = harness(&remote);
        assert_eq!(
            run_text(&mut it, "help cd").await,
            vec!["cd [dir] - change current directory"]
        );
        let out = run_text(&mut it, "help pu").await;
        assert_eq!(
            out,
            vec![
                "    punshare id - remove a path-based policy",
                "    pushd dir - push new current directory",
                USAGE_NOTES[0],
                USAGE_NOTES[1],
            ]
        );
    }

    #[tokio::test]
    async fn pager_toggles() {
        let remote = ScriptedRemote::new();
        let mut it = harness(&remote);
        assert_eq!(run_text(&mut it, "pager").await, vec!["Output paging is disabled"]);
        assert_eq!(run_text(&mut it, "pager").await, vec!["Output paging is enabled"]);
        assert_eq!(run_text(&mut it, "pager off").await, vec!["Output paging is disabled"]);
        assert!(!it.console().paging());
    }

    #[tokio::test]
    async fn exit_sets_flag() {
        let remote = ScriptedRemote::new();
        let mut it = harness(&remote);
        run(&mut it, "exit").await;
        assert!(it.exit_requested());
    }

    #[tokio::test]
    async fn who_lists_active_sessions() {
        let remote = ScriptedRemote::new();
        remote
            .reply(
                "lua",
                json!({"status": 1, "result": [
                    {"userPath": "/users/alice", "startTime": 1_700_000_000_000_i64, "ipAddress": "10.0.0.7"},
                ]}),
            )
            .reply("lua", json!({"status": 2}));
        let mut it = harness(&remote);

        let out = run_text(&mut it, "who").await;
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("/users/alice since "), "{out:?}");
        assert!(out[0].ends_with(" from 10.0.0.7"), "{out:?}");
        let call = remote.last().unwrap();
        assert_eq!(call.api, Api::File);
        assert_eq!(call.params, json!({"path": "/lua/who.lua", "asOwner": true, "args": []}));

        assert_eq!(
            run(&mut it, "who").await,
            vec![OutputLine::Error("Error: unknown error".into())]
        );
    }
}
