//! Mail commands: define a mailer, and compose and send a message through
//! one. Composition is a multi-step read: address and subject prompts, then
//! body lines until a lone `.`.

use serde_json::json;
use tracing::debug;

use super::reject;
use crate::cmd::definition::{ArgumentDefinition, CommandDefinition};
use crate::interp::{Continuation, InvocationContext, ReadError, Step, deferred};
use crate::remote::{Api, Reply};

pub const END_OF_MESSAGE: &str = ".";

pub fn commands() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new("mkmailer", "create a mailer", mkmailer)
            .arg(ArgumentDefinition::path("path", "file path"))
            .arg(ArgumentDefinition::string("host").hint("SMTP relay host"))
            .arg(ArgumentDefinition::boolean("auth").hint("authenticate?"))
            .arg(ArgumentDefinition::boolean("starttls").hint("enable STARTTLS?"))
            .arg(ArgumentDefinition::integer("port").hint("relay host port").optional())
            .arg(ArgumentDefinition::string("username").hint("relay username").optional())
            .arg(ArgumentDefinition::string("password").hint("relay password").optional()),
        CommandDefinition::new("mail", "send an email", mail)
            .arg(ArgumentDefinition::path("mailer", "mailer path").optional())
            .arg(ArgumentDefinition::boolean("html").hint("HTML message?").optional())
            .arg(ArgumentDefinition::string("from").hint("sender email address").optional()),
    ]
}

fn mkmailer(cx: InvocationContext) -> Option<Continuation> {
    let params = json!({
        "path": cx.args.str("path"),
        "settings": {
            "host": cx.args.str("host"),
            "port": cx.args.int("port"),
            "auth": cx.args.flag("auth"),
            "starttls": cx.args.flag("starttls"),
            "username": cx.args.str("username").filter(|s| !s.is_empty()),
            "password": cx.args.str("password").filter(|s| !s.is_empty()),
        },
    });
    deferred(async move {
        match cx.call(Api::File, "mkmailer", params).await {
            Some(Reply::Success(_)) => cx.echo("Completed."),
            Some(other) => reject(&cx, other),
            None => {}
        }
    })
}

/// Comma-separated addresses, trimmed, empties dropped.
pub fn addresses(line: &str) -> Vec<String> {
    line.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

fn mail(cx: InvocationContext) -> Option<Continuation> {
    let answers = cx.console.read(vec![
        Step::line("To: "),
        Step::line("CC: "),
        Step::line("Bcc: "),
        Step::line("Subject: "),
        Step::until("Message:", "> ", END_OF_MESSAGE),
    ]);
    let mailer = cx.args.str("mailer").map(str::to_string);
    let from = cx.args.str("from").map(str::to_string);
    let html = cx.args.flag("html");
    deferred(async move {
        let answers = match answers.await {
            Ok(a) => a,
            Err(ReadError::Cancelled) => {
                debug!("mail composition cancelled");
                return;
            }
            Err(e) => return cx.error(e.to_string()),
        };
        let [to, cc, bcc, subject, content] = answers.as_slice() else {
            return;
        };
        let params = json!({
            "mailer": mailer,
            "message": {
                "from": from,
                "html": html,
                "to": addresses(to),
                "cc": addresses(cc),
                "bcc": addresses(bcc),
                "subject": subject,
                "content": content,
            },
        });
        match cx.call(Api::File, "smtp", params).await {
            Some(Reply::Success(_)) => cx.echo("Message sent."),
            Some(other) => reject(&cx, other),
            None => {}
        }
    })
}
