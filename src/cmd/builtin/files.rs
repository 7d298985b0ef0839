//! File commands (`?api=file`).

use serde_json::{Value, json};

use super::{field, reject};
use crate::cmd::definition::{ArgFlags, ArgumentDefinition, CommandDefinition};
use crate::cmd::format::{ColumnSpec, columnize, format_time, table};
use crate::interp::{Continuation, InvocationContext, deferred};
use crate::remote::{Api, Reply};

pub fn commands() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new("ls", "list files", ls)
            .arg(ArgumentDefinition::path("path", "file path").optional())
            .arg(ArgumentDefinition::literal("folder").optional()),
        CommandDefinition::new("lookup", "show file details", lookup)
            .arg(ArgumentDefinition::path("path", "file path").optional())
            .arg(
                ArgumentDefinition::integer("id")
                    .hint("resource id")
                    .flags(ArgFlags::KEYWORD_ONLY)
                    .optional(),
            )
            .long_help("Give a path, or id=<n> to look a file up by its resource id."),
        CommandDefinition::new("mkdir", "create a folder", mkdir)
            .arg(ArgumentDefinition::path("path", "folder path"))
            .arg(ArgumentDefinition::literal("recursive").optional()),
        CommandDefinition::new("rm", "remove a file and optionally its descendants", rm)
            .arg(ArgumentDefinition::path("path", "file path"))
            .arg(ArgumentDefinition::literal("recursive").hint("recursive?").optional()),
        CommandDefinition::new("link", "create link to existing file", link)
            .arg(ArgumentDefinition::path("srcpath", "source file"))
            .arg(ArgumentDefinition::path("dstpath", "target")),
        CommandDefinition::new("mv", "rename a file", mv)
            .arg(ArgumentDefinition::path("srcpath", "current path"))
            .arg(ArgumentDefinition::path("dstpath", "new path")),
        CommandDefinition::new("chown", "change the owner of a file", chown)
            .arg(ArgumentDefinition::path("path", "file path"))
            .arg(ArgumentDefinition::path("owner", "owner path").optional()),
        CommandDefinition::new("setmt", "change the MIME type of a plain file", setmt)
            .arg(ArgumentDefinition::path("path", "file path"))
            .arg(ArgumentDefinition::string("mimetype").hint("MIME type")),
        CommandDefinition::new("lspolicy", "list the role assignments of a policy", lspolicy)
            .arg(ArgumentDefinition::path("path", "policy path")),
        CommandDefinition::new("share", "assign a policy to file(s)", share)
            .arg(ArgumentDefinition::path("policy", "policy path"))
            .arg(ArgumentDefinition::string("filespec")),
        CommandDefinition::new("unshare", "remove a policy from file(s)", unshare)
            .arg(ArgumentDefinition::path("policy", "policy path"))
            .arg(ArgumentDefinition::string("filespec")),
        CommandDefinition::new("pshare", "create a path-based policy", pshare)
            .arg(ArgumentDefinition::path("policy", "policy path"))
            .arg(ArgumentDefinition::string("ptype").hint("prefix|globv1|regex"))
            .arg(ArgumentDefinition::string("pattern"))
            .arg(ArgumentDefinition::string("mimetype").optional()),
        CommandDefinition::new("punshare", "remove a path-based policy", punshare)
            .arg(ArgumentDefinition::integer("id")),
        CommandDefinition::new("pplist", "list my path-based policies", pplist),
    ]
}

/* ---- ls ---- */

const LS_COLUMNS: [ColumnSpec; 7] = [
    ColumnSpec::left(24),  // name
    ColumnSpec::right(1),  // D flag
    ColumnSpec::right(6),  // size
    ColumnSpec::left(24),  // MIME type
    ColumnSpec::right(4),  // refcount
    ColumnSpec::right(36), // mtime
    ColumnSpec::right(4),  // altid
];

fn ls(cx: InvocationContext) -> Option<Continuation> {
    let path = cx.args.str("path").map(str::to_string).unwrap_or_else(|| cx.cwd());
    let params = json!({ "path": path, "folder": cx.args.bool("folder") });
    deferred(async move {
        match cx.request(Api::File, "list", params).await {
            Some(Reply::List(entries)) if !entries.is_empty() => cx.page(ls_lines(entries)),
            Some(_) => cx.echo("No files."),
            None => {}
        }
    })
}

/// One columnized line per entry, sorted by case-folded name.
pub fn ls_lines(mut entries: Vec<Value>) -> Vec<String> {
    entries.sort_by_cached_key(|e| field(e, "name").to_lowercase());
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            let folder = match e.get("container").and_then(Value::as_bool) {
                Some(true) => "D",
                Some(false) => " ",
                None => "",
            };
            let mtime = e.get("mtime").and_then(Value::as_i64).map(format_time).unwrap_or_default();
            vec![
                field(e, "name"),
                folder.to_string(),
                field(e, "size"),
                field(e, "mimetype"),
                field(e, "refcount"),
                mtime,
                field(e, "altid"),
            ]
        })
        .collect();
    columnize(&rows, &LS_COLUMNS)
}

/* ---- lookup ---- */

fn lookup(cx: InvocationContext) -> Option<Continuation> {
    let params = match (cx.args.int("id"), cx.args.str("path")) {
        (Some(id), _) => json!({ "id": id }),
        (None, Some(path)) => json!({ "path": path }),
        (None, None) => {
            cx.error("missing required argument path");
            return None;
        }
    };
    deferred(async move {
        match cx.request(Api::File, "lookup", params).await {
            Some(Reply::Success(Value::Object(fields)) | Reply::Benign(Value::Object(fields))) => {
                for (key, value) in &fields {
                    cx.echo(format!("{key}: {}", describe(key, value)));
                }
            }
            Some(other) => reject(&cx, other),
            None => {}
        }
    })
}

fn describe(key: &str, value: &Value) -> String {
    match (key, value.as_i64()) {
        ("crtime" | "mtime", Some(ms)) => format!("{} [{ms}]", format_time(ms)),
        _ => match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

/* ---- simple operations ---- */

/// Echoes `done` when the reply's status is not negative.
async fn expect_accepted(cx: &InvocationContext, op: &str, params: Value, done: &str) {
    match cx.call(Api::File, op, params).await {
        Some(Reply::Success(_) | Reply::Benign(_)) => cx.echo(done),
        Some(other) => reject(cx, other),
        None => {}
    }
}

fn mkdir(cx: InvocationContext) -> Option<Continuation> {
    let params = json!({ "path": cx.args.str("path"), "recursive": cx.args.bool("recursive") });
    deferred(async move { expect_accepted(&cx, "mkdir", params, "Completed").await })
}

fn rm(cx: InvocationContext) -> Option<Continuation> {
    let params = json!({ "path": cx.args.str("path"), "recursive": cx.args.bool("recursive") });
    deferred(async move { expect_accepted(&cx, "rm", params, "Completed").await })
}

fn link(cx: InvocationContext) -> Option<Continuation> {
    relink(cx, false)
}

/// A rename is a link that removes its source.
fn mv(cx: InvocationContext) -> Option<Continuation> {
    relink(cx, true)
}

fn relink(cx: InvocationContext, rename: bool) -> Option<Continuation> {
    let params = json!({
        "srcpath": cx.args.str("srcpath"),
        "dstpath": cx.args.str("dstpath"),
        "rename": rename,
    });
    deferred(async move { expect_accepted(&cx, "link", params, "Completed").await })
}

fn chown(cx: InvocationContext) -> Option<Continuation> {
    let params = json!({ "path": cx.args.str("path"), "owner": cx.args.str("owner") });
    deferred(async move {
        match cx.call(Api::File, "chown", params).await {
            Some(Reply::Success(v)) => cx.echo(format!(
                "Changed owner of {} to {}",
                field(&v, "path"),
                field(&v, "owner")
            )),
            Some(other) => reject(&cx, other),
            None => {}
        }
    })
}

fn setmt(cx: InvocationContext) -> Option<Continuation> {
    let params = json!({ "path": cx.args.str("path"), "mimetype": cx.args.str("mimetype") });
    deferred(async move {
        match cx.call(Api::File, "setmt", params).await {
            Some(Reply::Success(v)) => cx.echo(format!("Set MIME type to {}.", field(&v, "mimetype"))),
            Some(other) => reject(&cx, other),
            None => {}
        }
    })
}

/* ---- policies ---- */

fn lspolicy(cx: InvocationContext) -> Option<Continuation> {
    let params = json!({ "path": cx.args.str("path") });
    deferred(async move {
        match cx.call(Api::File, "lspolicy", params).await {
            Some(Reply::Success(v) | Reply::Benign(v)) => {
                let mut lines = policy_lines(&v);
                lines.push("Completed".to_string());
                cx.page(lines);
            }
            Some(other) => reject(&cx, other),
            None => {}
        }
    })
}

/// One line per role assignment, each followed by the role's rights.
fn policy_lines(reply: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    let entries = reply.get("list").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
    for entry in entries {
        lines.push(format!(
            "{}({})\t{}({})",
            field(entry, "principal"),
            field(entry, "principalId"),
            field(entry, "role"),
            field(entry, "roleId")
        ));
        let rights = entry.get("rights").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
        if !rights.is_empty() {
            lines.push("\tAccess rights:".to_string());
        }
        for right in rights {
            lines.push(format!(
                "\t\t{}({}) - {}",
                field(right, "name"),
                field(right, "applicability"),
                field(right, "description")
            ));
        }
    }
    lines
}

fn share(cx: InvocationContext) -> Option<Continuation> {
    apply_policy(cx, "share", "shared")
}

fn unshare(cx: InvocationContext) -> Option<Continuation> {
    apply_policy(cx, "unshare", "unshared")
}

fn apply_policy(cx: InvocationContext, op: &'static str, done: &'static str) -> Option<Continuation> {
    let params = json!({ "policy": cx.args.str("policy"), "filespec": cx.args.str("filespec") });
    deferred(async move {
        match cx.call(Api::File, op, params).await {
            Some(Reply::Success(v)) => cx.echo(format!("{} files {done}", field(&v, "count"))),
            Some(other) => reject(&cx, other),
            None => {}
        }
    })
}

const PATTERN_TYPES: [&str; 3] = ["prefix", "regex", "globv1"];

fn pshare(cx: InvocationContext) -> Option<Continuation> {
    let ptype = cx.args.str("ptype").unwrap_or_default();
    if !PATTERN_TYPES.contains(&ptype) {
        cx.echo(format!("invalid pattern type: {ptype}"));
        return None;
    }
    let params = json!({
        "policy": cx.args.str("policy"),
        "ptype": ptype,
        "pattern": cx.args.str("pattern"),
        "mimetype": cx.args.str("mimetype"),
    });
    deferred(async move {
        match cx.call(Api::File, "pshare", params).await {
            Some(Reply::Success(v)) => cx.echo(format!("Id of this path-based policy is {}", field(&v, "id"))),
            Some(other) => reject(&cx, other),
            None => {}
        }
    })
}

fn punshare(cx: InvocationContext) -> Option<Continuation> {
    let params = json!({ "id": cx.args.int("id") });
    deferred(async move {
        match cx.call(Api::File, "punshare", params).await {
            Some(Reply::Success(_)) => cx.echo("Completed."),
            Some(other) => reject(&cx, other),
            None => {}
        }
    })
}

fn pplist(cx: InvocationContext) -> Option<Continuation> {
    deferred(async move {
        match cx.call(Api::File, "pplist", Value::Null).await {
            Some(Reply::List(entries)) if entries.is_empty() => cx.echo("You have no path-based policies."),
            Some(Reply::List(entries)) => {
                let rows: Vec<Vec<String>> = entries
                    .iter()
                    .map(|pp| {
                        vec![
                            field(pp, "id"),
                            path_of(pp, "policy"),
                            field(pp, "pattern"),
                            field(pp, "mimetype"),
                        ]
                    })
                    .collect();
                let mut lines = vec!["Your path-based policies:".to_string()];
                lines.extend(table(&["Id", "Policy", "Pattern", "MIME type"], &rows, &cx.console.style()));
                cx.page(lines);
            }
            Some(other) => reject(&cx, other),
            None => {}
        }
    })
}

/// A field that is either a path string or an object carrying `path`.
fn path_of(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(obj @ Value::Object(_)) => field(obj, "path"),
        _ => field(value, key),
    }
}
