//! Text chat handlers: an interactive REPL and a one-shot question.

use anyhow::Result;
use palaver_core::{ConversationService, ReplyOutcome};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::render_outcome;

/// What the REPL should do with one input line.
#[derive(Debug, PartialEq, Eq)]
enum LineAction<'a> {
    Skip,
    Quit,
    Send(&'a str),
}

fn classify(line: &str) -> LineAction<'_> {
    match line.trim() {
        "" => LineAction::Skip,
        "/quit" | "/exit" => LineAction::Quit,
        text => LineAction::Send(text),
    }
}

/// Run the interactive text chat until `/quit`, Ctrl-C or end of input.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let mut service = ConversationService::new(ctx.chat()?);
    let mut editor = DefaultEditor::new()?;

    println!(
        "Chatting with {} - /quit to leave.",
        ctx.settings.model_name
    );

    loop {
        let line = match editor.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        match classify(&line) {
            LineAction::Skip => {}
            LineAction::Quit => break,
            LineAction::Send(text) => {
                let _ = editor.add_history_entry(text);
                let outcome = service.send_message(text).await;
                println!("{}", render_outcome(&outcome));
            }
        }
    }

    tracing::debug!(messages = service.log().len(), "Chat ended");
    Ok(())
}

/// Send one question and print the reply.
pub async fn ask(ctx: &CliContext, question: &str) -> Result<()> {
    let mut service = ConversationService::new(ctx.chat()?);
    print_answer(service.send_message(question).await)
}

fn print_answer(outcome: ReplyOutcome) -> Result<()> {
    match outcome {
        ReplyOutcome::Reply(message) => println!("{}", message.text),
        ReplyOutcome::Empty => {}
        ReplyOutcome::Failed(message) => return Err(CliError::Chat(message.text).into()),
    }
    Ok(())
}
