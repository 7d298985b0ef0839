/*!
Completion engine.

Given the line and the cursor position, completion offers one of:
  - command names, while the command itself is being typed
  - a `(hint) ` placeholder for the argument the cursor would fill, when
    nothing has been typed for it yet (the noise filter drops it later)
  - remote path matches, for a partially typed file argument

The engine has two states. `AwaitingInput` is the resting state. A path
completion moves it to `AwaitingRemoteMatch` until the matcher answers; an
answer for anything but the latest request is dropped.

  ls do<Tab>        -> fcmp {path: "<cwd>/do"}    -> ls docs/ download
  chown<Tab>...     -> "(file path) "
  ls path=/ho<Tab>  -> fcmp {path: "/ho"}         -> path=/home
  ls "my d<Tab>     -> fcmp {path: "<cwd>/my d"}  -> "my docs/

The cursor token comes from the scanner's spans, so a quoted value with
spaces is one token and its matches go back in the same quote.
*/

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::cmd::binder::argument_position;
use crate::cmd::path::{full_path, split_typed};
use crate::cmd::registry::CommandRegistry;
use crate::lexer::{self, Token, filter_noise};
use crate::remote::{Api, RemoteService, TransportError, status_of};

/// What the host should do with the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Nothing,
    /// Replace `line[start..cursor]` with one of `items`.
    Candidates { start: usize, items: Vec<String> },
    /// Insert the text at the cursor.
    Insert(String),
}

/// A path completion waiting for the remote matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCompletion {
    pub id: u64,
    /// The value typed so far, without any `name=` prefix.
    pub candidate_prefix: String,
    pub argument_position: usize,
    /// `name=` when the value is typed as a named argument, else empty.
    pub named_prefix: String,
    /// The quote the value was opened with, if any.
    pub quote: Option<char>,
    /// Where the cursor token starts in the line.
    pub start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    AwaitingInput,
    AwaitingRemoteMatch(PendingCompletion),
}

/// The remote pattern-match request for a pending completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRequest {
    pub id: u64,
    pub path: String,
    pub container: bool,
}

impl MatchRequest {
    pub fn params(&self) -> Value {
        json!({ "path": self.path, "container": self.container })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Ready(Completion),
    Remote(MatchRequest),
}

#[derive(Debug)]
pub struct CompletionEngine {
    state: EngineState,
    next_id: u64,
}

impl Default for CompletionEngine {
    fn default() -> Self {
        Self {
            state: EngineState::AwaitingInput,
            next_id: 1,
        }
    }
}

impl CompletionEngine {
    #[cfg(test)]
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Drops any pending request; its answer will be ignored.
    pub fn reset(&mut self) {
        self.state = EngineState::AwaitingInput;
    }

    pub fn begin(&mut self, registry: &CommandRegistry, line: &str, pos: usize, cwd: &str) -> Step {
        self.reset();
        let pos = floor_char_boundary(line, pos);
        let before = &line[..pos];
        let mut spans = lexer::scan(before);
        let cursor = match spans.last() {
            Some(last) if last.span.end == pos && !matches!(last.token, Token::Punct(_)) => spans.pop(),
            _ => None,
        };
        let start = cursor.as_ref().map_or(pos, |c| c.span.start);
        let tokens = filter_noise(spans.into_iter().map(|s| s.token).collect());
        let typed = match &cursor {
            Some(c) => match Typed::of(&c.token, &before[start..]) {
                Some(typed) => typed,
                None => return Step::Ready(Completion::Nothing),
            },
            None => Typed::default(),
        };
        trace!(value = %typed.value, tokens = tokens.len(), "completion requested");

        let Some((head, rest)) = tokens.split_first() else {
            let items: Vec<String> = registry.names_with_prefix(&typed.value).map(str::to_string).collect();
            return Step::Ready(candidates(start, items));
        };
        let Some(def) = registry.lookup(&head.text()) else {
            return Step::Ready(Completion::Nothing);
        };

        let target = match &typed.name {
            Some(name) => match def.arg_index(name) {
                Some(idx) => idx,
                None => return Step::Ready(Completion::Nothing),
            },
            None => argument_position(def, rest),
        };
        let Some(arg) = def.args.get(target) else {
            return Step::Ready(Completion::Nothing);
        };

        if typed.value.is_empty() && typed.quote.is_none() {
            // an unanswered placeholder for a required slot: the line can't bind anyway
            if let Some(prev) = rest.last()
                && prev.is_placeholder()
                && typed.name.is_none()
                && target > 0
                && def.args.get(target - 1).is_some_and(|a| !a.is_optional())
            {
                return Step::Ready(Completion::Nothing);
            }
            return Step::Ready(Completion::Insert(format!("({}) ", arg.hint_text())));
        }

        if !arg.is_file() {
            return Step::Ready(Completion::Nothing);
        }

        let id = self.next_id;
        self.next_id += 1;
        let request = MatchRequest {
            id,
            path: full_path(cwd, &typed.value),
            container: arg.is_container(),
        };
        debug!(id, path = %request.path, "awaiting remote match");
        self.state = EngineState::AwaitingRemoteMatch(PendingCompletion {
            id,
            candidate_prefix: typed.value,
            argument_position: target,
            named_prefix: typed.name.map(|n| format!("{n}=")).unwrap_or_default(),
            quote: typed.quote,
            start,
        });
        Step::Remote(request)
    }

    /// Applies the matcher's answer to request `id`.
    pub fn resolve(&mut self, id: u64, reply: Result<Value, TransportError>) -> Completion {
        let pending = match &self.state {
            EngineState::AwaitingRemoteMatch(p) if p.id == id => p.clone(),
            _ => {
                debug!(id, "stale remote match dropped");
                return Completion::Nothing;
            }
        };
        self.state = EngineState::AwaitingInput;

        let reply = match reply {
            Ok(v) => v,
            Err(err) => {
                debug!(id, error = %err, "remote match failed");
                return Completion::Nothing;
            }
        };
        if status_of(&reply).is_none_or(|s| s <= 0) {
            return Completion::Nothing;
        }
        let (typed_dir, _) = split_typed(&pending.candidate_prefix);
        let items: Vec<String> = reply
            .get("matches")
            .and_then(Value::as_array)
            .map(|m| {
                m.iter()
                    .filter_map(Value::as_str)
                    .map(|s| format!("{}{}", pending.named_prefix, candidate_text(&format!("{typed_dir}{s}"), pending.quote)))
                    .collect()
            })
            .unwrap_or_default();
        debug!(id, matches = items.len(), "remote match resolved");
        candidates(pending.start, items)
    }
}

/// The value under the cursor, split out of the token it is typed in.
#[derive(Debug, Default)]
struct Typed {
    name: Option<String>,
    value: String,
    quote: Option<char>,
}

impl Typed {
    /// `raw` is the token's source text. `None` when the cursor is on
    /// something that is not a value, such as `name=[`.
    fn of(token: &Token, raw: &str) -> Option<Typed> {
        let (name, value, raw) = match token {
            Token::Named { name, value } => (Some(name.clone()), value.as_ref(), raw.get(name.len() + 1..)?),
            other => (None, other, raw),
        };
        let (value, quote) = match value {
            Token::Quoted(q) if raw.starts_with(q.quote) => (q.text.clone(), Some(q.quote)),
            Token::Punct(_) => return None,
            // a raw-remainder value is taken verbatim
            _ => (raw.to_string(), None),
        };
        Some(Typed { name, value, quote })
    }
}

/// A match as it goes back into the line: in the quote it was typed in, or
/// quoted when it would not scan as one word. A folder stays open so the
/// path can be continued.
fn candidate_text(text: &str, quote: Option<char>) -> String {
    let token = match quote {
        Some(q) => Token::quoted(text, q),
        None => lexer::word_or_quoted(text),
    };
    let mut rendered = token.to_string();
    if matches!(token, Token::Quoted(_)) && text.ends_with('/') {
        rendered.pop();
    }
    rendered
}

fn candidates(start: usize, items: Vec<String>) -> Completion {
    if items.is_empty() {
        Completion::Nothing
    } else {
        Completion::Candidates { start, items }
    }
}

fn floor_char_boundary(s: &str, mut pos: usize) -> usize {
    pos = pos.min(s.len());
    while !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Runs one completion to the end, with a single await for a remote match.
pub async fn complete(
    engine: Rc<RefCell<CompletionEngine>>,
    registry: Rc<CommandRegistry>,
    remote: Rc<dyn RemoteService>,
    line: String,
    pos: usize,
    cwd: String,
) -> Completion {
    let step = engine.borrow_mut().begin(&registry, &line, pos, &cwd);
    match step {
        Step::Ready(c) => c,
        Step::Remote(request) => {
            let reply = remote.call(Api::File, "fcmp", request.params()).await;
            engine.borrow_mut().resolve(request.id, reply)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::definition::{ArgFlags, ArgumentDefinition, CommandDefinition};
    use crate::cmd::registry::RegistryBuilder;
    use crate::interp::{Continuation, InvocationContext};
    use crate::remote::scripted::ScriptedRemote;

    fn noop(_cx: InvocationContext) -> Option<Continuation> {
        None
    }

    fn registry() -> CommandRegistry {
        RegistryBuilder::new()
            .register(
                CommandDefinition::new("ls", "list", noop)
                    .arg(ArgumentDefinition::path("path", "file path").optional())
                    .arg(ArgumentDefinition::literal("folder").optional()),
            )
            .register(CommandDefinition::new("lookup", "info", noop).arg(ArgumentDefinition::path("path", "file path")))
            .register(
                CommandDefinition::new("cd", "change dir", noop)
                    .arg(ArgumentDefinition::path("dir", "directory").flags(ArgFlags::CONTAINER).optional()),
            )
            .register(
                CommandDefinition::new("mkgroup", "make group", noop)
                    .arg(ArgumentDefinition::string("group").hint("group path"))
                    .arg(ArgumentDefinition::string("description")),
            )
            .build()
            .unwrap()
    }

    fn begin(line: &str) -> Step {
        CompletionEngine::default().begin(&registry(), line, line.len(), "/home")
    }

    #[test]
    fn command_names_by_prefix() {
        assert_eq!(
            begin("l"),
            Step::Ready(Completion::Candidates {
                start: 0,
                items: vec!["lookup".into(), "ls".into()]
            })
        );
        assert_eq!(begin("zz"), Step::Ready(Completion::Nothing));
    }

    #[test]
    fn empty_value_inserts_hint() {
        assert_eq!(begin("mkgroup "), Step::Ready(Completion::Insert("(group path) ".into())));
        assert_eq!(
            begin("mkgroup (group path) "),
            Step::Ready(Completion::Nothing),
            "required slot left as a placeholder"
        );
        assert_eq!(
            begin("mkgroup staff "),
            Step::Ready(Completion::Insert("(description) ".into()))
        );
        assert_eq!(begin("ls /a folder "), Step::Ready(Completion::Nothing));
    }

    #[test]
    fn named_value_targets_its_argument() {
        assert_eq!(
            begin("mkgroup description="),
            Step::Ready(Completion::Insert("(description) ".into()))
        );
        assert_eq!(begin("mkgroup nope=x"), Step::Ready(Completion::Nothing));
    }

    #[test]
    fn file_value_requests_remote_match() {
        let mut engine = CompletionEngine::default();
        let step = engine.begin(&registry(), "cd ../sh", 8, "/home/alice");
        assert_eq!(
            step,
            Step::Remote(MatchRequest {
                id: 1,
                path: "/home/sh".into(),
                container: true
            })
        );
        assert!(matches!(
            engine.state(),
            EngineState::AwaitingRemoteMatch(p) if p.start == 3 && p.candidate_prefix == "../sh"
        ));

        let done = engine.resolve(1, Ok(json!({"status": 1, "matches": ["shared", "shop"]})));
        assert_eq!(
            done,
            Completion::Candidates {
                start: 3,
                items: vec!["../shared".into(), "../shop".into()]
            }
        );
        assert_eq!(engine.state(), &EngineState::AwaitingInput);
    }

    #[test]
    fn named_prefix_is_kept_on_matches() {
        let mut engine = CompletionEngine::default();
        let Step::Remote(req) = engine.begin(&registry(), "ls path=/ho", 11, "/") else {
            panic!("expected remote step");
        };
        assert_eq!(req.path, "/ho");
        assert!(!req.container);
        assert_eq!(
            engine.resolve(req.id, Ok(json!({"status": 1, "matches": ["home"]}))),
            Completion::Candidates {
                start: 3,
                items: vec!["path=/home".into()]
            }
        );
    }

    #[test]
    fn stale_and_failed_matches_yield_nothing() {
        let mut engine = CompletionEngine::default();
        let Step::Remote(first) = engine.begin(&registry(), "lookup a", 8, "/") else {
            panic!("expected remote step");
        };
        let Step::Remote(second) = engine.begin(&registry(), "lookup ab", 9, "/") else {
            panic!("expected remote step");
        };
        assert_eq!(
            engine.resolve(first.id, Ok(json!({"status": 1, "matches": ["abc"]}))),
            Completion::Nothing
        );
        assert_eq!(
            engine.resolve(second.id, Ok(json!({"status": 0, "matches": []}))),
            Completion::Nothing
        );
        assert_eq!(engine.state(), &EngineState::AwaitingInput);
    }

    #[test]
    fn quoted_path_with_spaces_completes() {
        let mut engine = CompletionEngine::default();
        let line = r#"ls "my docs/re"#;
        let Step::Remote(req) = engine.begin(&registry(), line, line.len(), "/home") else {
            panic!("expected remote step");
        };
        assert_eq!(req.path, "/home/my docs/re");
        assert_eq!(
            engine.resolve(req.id, Ok(json!({"status": 1, "matches": ["report.txt", "recent/"]}))),
            Completion::Candidates {
                start: 3,
                items: vec![r#""my docs/report.txt""#.into(), r#""my docs/recent/"#.into()]
            }
        );
    }

    #[test]
    fn match_with_space_gets_quoted() {
        let mut engine = CompletionEngine::default();
        let Step::Remote(req) = engine.begin(&registry(), "lookup my", 9, "/") else {
            panic!("expected remote step");
        };
        assert_eq!(
            engine.resolve(req.id, Ok(json!({"status": 1, "matches": ["my docs"]}))),
            Completion::Candidates {
                start: 7,
                items: vec![r#""my docs""#.into()]
            }
        );
    }

    #[test]
    fn cursor_after_named_hint_moves_on() {
        assert_eq!(begin("ls path=(file path) "), Step::Ready(Completion::Insert("(folder) ".into())));
        assert_eq!(begin("ls path=["), Step::Ready(Completion::Nothing));
    }

    #[tokio::test]
    async fn complete_round_trips_through_remote() {
        let remote = ScriptedRemote::new();
        remote.reply("fcmp", json!({"status": 1, "matches": ["docs", "download"]}));
        let engine = Rc::new(RefCell::new(CompletionEngine::default()));
        let done = complete(
            engine,
            Rc::new(registry()),
            remote.clone(),
            "ls do".into(),
            5,
            "/home".into(),
        )
        .await;
        assert_eq!(
            done,
            Completion::Candidates {
                start: 3,
                items: vec!["docs".into(), "download".into()]
            }
        );
        let call = remote.last().unwrap();
        assert_eq!(call.api, Api::File);
        assert_eq!(call.params, json!({"path": "/home/do", "container": false}));
    }
}
