//! Group and user administration (`?api=group`, `?api=user`).

use serde_json::{Map, Value, json};

use super::{field, reject};
use crate::cmd::definition::{ArgumentDefinition, CommandDefinition};
use crate::cmd::format::table;
use crate::interp::{Continuation, InvocationContext, deferred};
use crate::remote::{Api, Reply, error_message, status_of};

pub fn commands() -> Vec<CommandDefinition> {
    let group = || ArgumentDefinition::path("group", "group path");
    let users = || ArgumentDefinition::string("users").hint("user list").list();
    vec![
        CommandDefinition::new("mkgroup", "create a new group", mkgroup)
            .alias("create")
            .arg(ArgumentDefinition::path("group", "new group path"))
            .arg(ArgumentDefinition::string("description")),
        CommandDefinition::new("groups", "list the immediate subgroups of a group", groups).arg(group()),
        CommandDefinition::new("groups!", "list all descendant groups of a group", all_groups).arg(group()),
        CommandDefinition::new("users", "list the users in a group", users_in).arg(group()),
        CommandDefinition::new("users!", "list the users in a group and all its descendants", users_under)
            .arg(group()),
        CommandDefinition::new("adduser", "add users to a group", adduser)
            .arg(group())
            .arg(users()),
        CommandDefinition::new("rmuser", "remove users from a group", rmuser)
            .arg(group())
            .arg(users()),
        CommandDefinition::new("mkuser", "create a user", mkuser)
            .arg(ArgumentDefinition::string("username"))
            .arg(ArgumentDefinition::string("password"))
            .arg(group())
            .arg(ArgumentDefinition::string("email").optional())
            .arg(ArgumentDefinition::string("regcode").hint("registration code").optional()),
        CommandDefinition::new("ucopy", "copy users between groups", ucopy)
            .arg(ArgumentDefinition::path("dstgroup", "group path"))
            .arg(ArgumentDefinition::path("srcgroup", "group path"))
            .arg(users())
            .arg(ArgumentDefinition::pair("rename").hint("rename pairs list").list().optional()),
        CommandDefinition::new("gmove", "move a group to a new parent", gmove)
            .arg(ArgumentDefinition::path("dstpath", "parent path"))
            .arg(ArgumentDefinition::path("srcgroup", "group path")),
        CommandDefinition::new("gattr", "enable/disable login/signup", gattr)
            .arg(group())
            .arg(ArgumentDefinition::boolean("login").optional())
            .arg(ArgumentDefinition::boolean("signup").optional())
            .arg(ArgumentDefinition::boolean("captcha").optional())
            .arg(ArgumentDefinition::string("guest").hint("guest page").optional())
            .arg(ArgumentDefinition::string("home").hint("home page").optional())
            .arg(ArgumentDefinition::string("desc").hint("description").optional())
            .arg(ArgumentDefinition::boolean("googleLoginEnabled").hint("enable Google login").optional())
            .arg(ArgumentDefinition::boolean("googleSignupEnabled").hint("enable Google signup").optional())
            .arg(ArgumentDefinition::boolean("verifyEmailEnabled").hint("verify email").optional())
            .arg(ArgumentDefinition::string("regKey").hint("self-registration key").optional()),
        CommandDefinition::new("rmgroup", "remove an empty group that has no subgroups", rmgroup).arg(group()),
        CommandDefinition::new("rmgroup!", "remove a group and its descendants", rmgroup_all).arg(group()),
    ]
}

/// `true`, or nothing at all so the field is left off the request.
fn recursive(on: bool) -> Value {
    if on { Value::Bool(true) } else { Value::Null }
}

fn group_arg(cx: &InvocationContext) -> String {
    cx.args.str("group").unwrap_or_default().to_string()
}

fn mkgroup(cx: InvocationContext) -> Option<Continuation> {
    let group = group_arg(&cx);
    let params = json!({ "group": group, "desc": cx.args.str("description") });
    deferred(async move {
        if cx.request(Api::Group, "create", params).await.is_some() {
            cx.echo(format!("Group {group} created."));
        }
    })
}

/* ---- listings ---- */

fn groups(cx: InvocationContext) -> Option<Continuation> {
    list_groups(cx, false)
}

fn all_groups(cx: InvocationContext) -> Option<Continuation> {
    list_groups(cx, true)
}

fn list_groups(cx: InvocationContext, deep: bool) -> Option<Continuation> {
    let group = group_arg(&cx);
    let params = json!({ "group": group, "recursive": recursive(deep) });
    deferred(async move {
        let Some(reply) = cx.request(Api::Group, "groups", params).await else {
            return;
        };
        let found = match &reply {
            Reply::Success(v) | Reply::Benign(v) => v.get("groups").and_then(Value::as_array).cloned(),
            _ => None,
        }
        .unwrap_or_default();
        if found.is_empty() {
            cx.echo(format!("{group} has no subgroups."));
            return;
        }
        let rows: Vec<Vec<String>> = found
            .iter()
            .map(|g| vec![field(g, "id"), field(g, "path"), field(g, "owner"), field(g, "desc")])
            .collect();
        let mut lines = vec![format!("Groups in {group}")];
        lines.extend(table(
            &["Id", "Path", "Owner", "Description"],
            &rows,
            &cx.console.style(),
        ));
        cx.page(lines);
    })
}

fn users_in(cx: InvocationContext) -> Option<Continuation> {
    list_users(cx, false)
}

fn users_under(cx: InvocationContext) -> Option<Continuation> {
    list_users(cx, true)
}

fn list_users(cx: InvocationContext, deep: bool) -> Option<Continuation> {
    let group = group_arg(&cx);
    let params = json!({ "group": group, "recursive": recursive(deep) });
    deferred(async move {
        let users = match cx.call(Api::Group, "users", params).await {
            Some(Reply::Success(v) | Reply::Benign(v)) => {
                v.get("users").and_then(Value::as_array).cloned().unwrap_or_default()
            }
            Some(other) => return reject(&cx, other),
            None => return,
        };
        if users.is_empty() {
            cx.echo(format!("{group} has no users."));
            return;
        }
        let users = if deep { dedup_consecutive(users) } else { users };
        let header = if deep { "Users under" } else { "Users in" };
        let mut lines = vec![format!("{header} {group}")];
        lines.extend(table(
            &["Id", "Username", "EMail", "Reg. Code"],
            &users.iter().map(user_row).collect::<Vec<_>>(),
            &cx.console.style(),
        ));
        cx.page(lines);
    })
}

/// A user listed under several descendant groups appears once per run of
/// equal ids.
fn dedup_consecutive(mut users: Vec<Value>) -> Vec<Value> {
    users.dedup_by(|a, b| a.get("id").is_some() && a.get("id") == b.get("id"));
    users
}

/// The username column shows the user's file name, which may differ from
/// the account name.
fn user_row(user: &Value) -> Vec<String> {
    let path = field(user, "path");
    let username = match path.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name.to_string(),
        _ => field(user, "username"),
    };
    vec![field(user, "id"), username, field(user, "email"), field(user, "regcode")]
}

/* ---- membership ---- */

fn adduser(cx: InvocationContext) -> Option<Continuation> {
    let params = json!({ "group": group_arg(&cx), "users": cx.args.strings("users") });
    deferred(async move {
        match cx.call(Api::Group, "addusers", params).await {
            Some(Reply::List(results)) => {
                for r in &results {
                    if status_of(r).is_some_and(|s| s < 0) {
                        cx.show_error(&error_message(r));
                    } else {
                        cx.echo(format!("User {} added", field(r, "username")));
                    }
                }
            }
            Some(other) => reject(&cx, other),
            None => {}
        }
    })
}

fn rmuser(cx: InvocationContext) -> Option<Continuation> {
    let params = json!({ "group": group_arg(&cx), "users": cx.args.strings("users") });
    deferred(async move {
        let Some(reply) = cx.call_value(Api::Group, "remusers", params).await else {
            return;
        };
        match reply {
            Value::Array(results) => {
                for r in &results {
                    cx.echo(format!("User {} removed", field(r, "user")));
                }
            }
            v if v.get("user").is_some() => cx.error(format!(
                "User {} not removed: {}",
                field(&v, "user"),
                error_message(&v)
            )),
            v => cx.show_error(&error_message(&v)),
        }
    })
}

fn mkuser(cx: InvocationContext) -> Option<Continuation> {
    let params = json!({
        "username": cx.args.str("username"),
        "password": cx.args.str("password"),
        "email": cx.args.str("email"),
        "regcode": cx.args.str("regcode"),
        "group": cx.args.str("group"),
    });
    deferred(async move {
        if let Some(Reply::Success(v) | Reply::Benign(v)) = cx.request(Api::User, "mkuser", params).await {
            cx.echo(format!(
                "id={}, username={}, password={}",
                field(&v, "id"),
                field(&v, "username"),
                field(&v, "password")
            ));
        }
    })
}

fn ucopy(cx: InvocationContext) -> Option<Continuation> {
    let rename: Map<String, Value> = cx
        .args
        .pairs("rename")
        .into_iter()
        .map(|(src, dst)| (src, Value::String(dst)))
        .collect();
    let params = json!({
        "dstgroup": cx.args.str("dstgroup"),
        "srcgroup": cx.args.str("srcgroup"),
        "users": cx.args.strings("users"),
        "rename": if rename.is_empty() { Value::Null } else { Value::Object(rename) },
    });
    deferred(async move {
        let Some(Reply::List(results)) = cx.request(Api::Group, "copyusers", params).await else {
            return;
        };
        if results.is_empty() {
            return;
        }
        cx.echo("Users copied:");
        for r in &results {
            let user = field(r, "user");
            if status_of(r).is_some_and(|s| s > 0) {
                cx.echo(format!("{user} - ok"));
            } else {
                cx.error(format!("{user} - failed: {}", error_message(r)));
            }
        }
    })
}

/* ---- group tree ---- */

/// Group attributes `gattr` can set, in schema order; `true` for on/off
/// attributes, `false` for text.
const GROUP_ATTRS: [(&str, bool); 10] = [
    ("login", true),
    ("signup", true),
    ("captcha", true),
    ("guest", false),
    ("home", false),
    ("desc", false),
    ("googleLoginEnabled", true),
    ("googleSignupEnabled", true),
    ("verifyEmailEnabled", true),
    ("regKey", false),
];

/// `{name, value}` for each attribute given. An empty text value or `none`
/// clears the attribute.
fn group_attrs(cx: &InvocationContext) -> Vec<Value> {
    GROUP_ATTRS
        .iter()
        .filter_map(|&(name, on_off)| {
            let value = if on_off {
                Value::Bool(cx.args.bool(name)?)
            } else {
                match cx.args.str(name)? {
                    "" | "none" => Value::Null,
                    text => Value::String(text.to_string()),
                }
            };
            Some(json!({ "name": name, "value": value }))
        })
        .collect()
}

fn gattr(cx: InvocationContext) -> Option<Continuation> {
    let attrs = group_attrs(&cx);
    if attrs.is_empty() {
        cx.echo("no recognized attribute specified");
        return None;
    }
    let params = json!({ "group": group_arg(&cx), "attrs": attrs });
    deferred(async move {
        if cx.request(Api::Group, "gattr", params).await.is_some() {
            cx.echo("Completed.");
        }
    })
}

fn gmove(cx: InvocationContext) -> Option<Continuation> {
    let params = json!({ "dstpath": cx.args.str("dstpath"), "srcgroup": cx.args.str("srcgroup") });
    deferred(async move {
        if cx.request(Api::Group, "move", params).await.is_some() {
            cx.echo("Completed.");
        }
    })
}

fn rmgroup(cx: InvocationContext) -> Option<Continuation> {
    remove_group(cx, false)
}

fn rmgroup_all(cx: InvocationContext) -> Option<Continuation> {
    remove_group(cx, true)
}

fn remove_group(cx: InvocationContext, deep: bool) -> Option<Continuation> {
    let params = json!({ "group": group_arg(&cx), "recursive": recursive(deep) });
    deferred(async move {
        if cx.request(Api::Group, "remgroup", params).await.is_some() {
            cx.echo("Completed.");
        }
    })
}
