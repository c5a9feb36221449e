use super::*;
use chumsky::{error::SimpleReason, prelude::*, text::whitespace};
use itertools::Itertools;

use crate::model::{ActivityKind, ParseActivityKindError, SessionExtra};

#[derive(Debug, Snafu)]
#[snafu(display("cannot parse '{input}' - {}", self.combine_errors("\n")))]
pub struct ParseError {
    input: String,
    errors: Vec<Simple<char>>,
}

impl ParseError {
    fn combine_errors(&self, separator: &str) -> String {
        self.errors
            .iter()
            .map(|err| {
                format!(
                    "{}:\n   {}",
                    err,
                    match err.reason() {
                        SimpleReason::Custom(msg) => format!("error {}", msg),
                        SimpleReason::Unexpected => "unexpected input".to_string(),
                        SimpleReason::Unclosed { span, delimiter } => {
                            format!(
                                "unclosed delimiter ({}..{}) in {}",
                                span.start, span.end, delimiter
                            )
                        }
                    }
                )
            })
            .join(separator)
    }
}

pub fn parse(input: &str) -> Result<Action, ParseError> {
    let action = program().parse(input).map_err(|errors| ParseError {
        input: input.to_string(),
        errors,
    })?;

    Ok(action)
}

fn program() -> impl Parser<char, Action, Error = Simple<char>> {
    action_start()
        .or(action_stop())
        .or(action_flush())
        .or(action_status())
        .or(action_exit())
        .padded()
        .then_ignore(end())
}

fn action_start() -> impl Parser<char, Action, Error = Simple<char>> {
    just("start")
        .then_ignore(whitespace().at_least(1))
        .ignore_then(activity_kind())
        .then_ignore(whitespace().at_least(1))
        .then(identifier("resource id"))
        .then_ignore(whitespace().at_least(1))
        .then(identifier("chapter id"))
        .then(whitespace().at_least(1).ignore_then(difficulty()).or_not())
        .map(|(((kind, resource_id), chapter_id), difficulty)| {
            let activity = Activity::new(kind, resource_id, chapter_id);
            let activity = match difficulty {
                Some(difficulty) => activity.with_extra(SessionExtra::difficulty(difficulty)),
                None => activity,
            };

            Action::Start { activity }
        })
}

fn action_stop() -> impl Parser<char, Action, Error = Simple<char>> {
    just("stop").to(Action::Stop)
}

fn action_flush() -> impl Parser<char, Action, Error = Simple<char>> {
    just("flush").to(Action::Flush)
}

fn action_status() -> impl Parser<char, Action, Error = Simple<char>> {
    just("status").to(Action::Status)
}

fn action_exit() -> impl Parser<char, Action, Error = Simple<char>> {
    choice((just("exit"), just("quit"))).to(Action::Exit)
}

fn activity_kind() -> impl Parser<char, ActivityKind, Error = Simple<char>> {
    text::ident().try_map(|word: String, span| {
        word.parse()
            .map_err(|err: ParseActivityKindError| Simple::custom(span, err.to_string()))
    })
}

fn identifier(what: &'static str) -> impl Parser<char, i64, Error = Simple<char>> {
    text::int(10).try_map(move |digits: String, span| {
        digits
            .parse()
            .map_err(|_| Simple::custom(span, format!("{what} is out of range")))
    })
}

fn difficulty() -> impl Parser<char, String, Error = Simple<char>> {
    filter(|c: &char| !c.is_whitespace())
        .repeated()
        .at_least(1)
        .collect::<String>()
}
