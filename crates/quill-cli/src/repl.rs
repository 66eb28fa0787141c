//! Line-oriented chat loop over stdin

use std::io::Write;

use anyhow::Result;
use quill_core::core_types::ChangeStatus;
use quill_core::ChatPipeline;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::commands::{Command, HELP};

pub async fn run(mut pipeline: ChatPipeline) -> Result<()> {
    println!(
        "quill: chatting with {} in \"{}\". Type /help for commands.",
        pipeline.model_name(),
        pipeline.current_session().title
    );
    print_history(&pipeline);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt_marker(&pipeline)?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(usage) => {
                println!("{}", usage);
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(e) = handle(&mut pipeline, command).await {
            log::error!("Command failed: {}", e);
            println!("Error: {}", e);
        }
    }

    log::info!("Exiting");
    Ok(())
}

fn prompt_marker(pipeline: &ChatPipeline) -> Result<()> {
    let doc = pipeline.active_document().unwrap_or("no document");
    let marker = if pipeline.is_awaiting_confirmation() {
        "confirm"
    } else {
        "you"
    };
    print!("[{}] {}> ", doc, marker);
    std::io::stdout().flush()?;
    Ok(())
}

fn print_history(pipeline: &ChatPipeline) {
    for message in pipeline.messages() {
        println!("{}: {}", message.role.label(), message.content);
    }
}

async fn handle(pipeline: &mut ChatPipeline, command: Command) -> Result<()> {
    match command {
        Command::Chat(text) => chat(pipeline, &text).await?,
        Command::New => {
            let session = pipeline.new_chat().await?;
            println!("Started chat {}", session.id);
        }
        Command::Sessions => {
            let current = pipeline.current_session().id.clone();
            for session in pipeline.sessions() {
                let marker = if session.id == current { "*" } else { " " };
                println!("{} {}  {}", marker, session.id, session.title);
            }
        }
        Command::Switch(id) => {
            pipeline.switch_session(&id).await?;
            println!("Switched to \"{}\"", pipeline.current_session().title);
            print_history(pipeline);
        }
        Command::Delete(id) => {
            pipeline.delete_chat(&id).await?;
            println!("Deleted chat {}", id);
        }
        Command::Open(name) => match pipeline.set_active_document(name.as_deref()).await {
            Ok(Some(doc)) => println!("Active document: {}", doc),
            Ok(None) => println!("No active document"),
            Err(e) => println!("{}", e.user_message()),
        },
        Command::Changes => {
            let changes = pipeline.ledger().all();
            if changes.is_empty() {
                println!("No changes proposed in this chat.");
            }
            for change in changes {
                println!("{} [{}] {}", change.id, change.status, change.target_name);
                if change.expanded {
                    println!("{}", change.content);
                } else if let Some(first) = change.content.lines().next() {
                    println!("    {}", first);
                }
            }
        }
        Command::Accept(id) => report(pipeline.accept_change(&id).await),
        Command::Reject(id) => report(pipeline.reject_change(&id).await),
        Command::AcceptAll => {
            let summary = pipeline.accept_all().await;
            println!("{}", summary.summary("Accepted"));
        }
        Command::RejectAll => {
            let summary = pipeline.reject_all().await;
            println!("{}", summary.summary("Rejected"));
        }
        Command::Toggle(id) => match pipeline.toggle_expanded(&id) {
            Ok(true) => println!("Showing content of {}", id),
            Ok(false) => println!("Hiding content of {}", id),
            Err(e) => println!("{}", e.user_message()),
        },
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
    Ok(())
}

fn report(result: Result<String, quill_core::QuillError>) {
    match result {
        Ok(message) => println!("{}", message),
        Err(e) => println!("{}", e.user_message()),
    }
}

/// Sends one message, echoing the reply as it streams. Ctrl-C abandons the turn.
async fn chat(pipeline: &mut ChatPipeline, text: &str) -> Result<()> {
    let cancel = CancellationToken::new();
    let mut placeholder = pipeline.subscribe_stream();
    let mut streamed = String::new();

    let result = {
        let send = pipeline.send_message_with_cancel(text, &cancel);
        tokio::pin!(send);
        loop {
            tokio::select! {
                result = &mut send => break result,
                _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                    log::info!("Cancelling reply on user request");
                    cancel.cancel();
                }
                changed = placeholder.changed() => {
                    if changed.is_err() {
                        continue;
                    }
                    let current = placeholder.borrow_and_update().clone();
                    if let Some(current) = current {
                        if let Some(delta) = current.get(streamed.len()..) {
                            print!("{}", delta);
                            std::io::stdout().flush()?;
                        }
                        streamed = current;
                    }
                }
            }
        }
    };

    if !streamed.is_empty() {
        println!();
    }
    match result? {
        Some(reply) if reply.content.trim() != streamed.trim() => {
            println!("{}", reply.content);
            let changes = pipeline.changes_for_message(&reply.id);
            for change in changes {
                if change.status == ChangeStatus::Pending {
                    println!("  pending change {} in {}", change.id, change.target_name);
                }
            }
        }
        Some(_) => {}
        None if cancel.is_cancelled() => println!("(reply cancelled)"),
        None => {}
    }
    Ok(())
}
