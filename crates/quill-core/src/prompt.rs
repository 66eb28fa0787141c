//! Prompt construction for a chat turn

use crate::core_types::ChatMessage;
use crate::llm::Prompt;

const ACTION_PROTOCOL: &str = r#"You can carry out file operations in the user's notes:
- write content into an existing file
- create a new file
- delete a whole file
- remove specific content from a file

Treat implied requests as file operations too: adding to notes, starting a document,
removing or deleting something, or changing a file's content all need a marker.

Use [ACTION:delete] only to delete an entire file. Use [ACTION:remove_content] to remove
part of a file. Whenever your answer contains material that belongs in a file (notes,
code, outlines), use [ACTION:write] or [ACTION:create].

Always name the file in the marker with the .md extension. Use the exact name the user
gives; otherwise pick a name that fits the topic.

Marker formats:
- [ACTION:write filename:notes.md]<content to add>
- [ACTION:create filename:suggested-name.md]<content of the new file>
- [ACTION:delete filename:old-file.md]
- [ACTION:remove_content filename:target.md pattern:"text to match" startLine:X endLine:Y]

Examples:
- "Give me notes on functional programming" -> [ACTION:write filename:functional-programming-notes.md]
- "create a file for my meeting notes" -> [ACTION:create filename:meeting-notes.md]
- "I don't need this file anymore" -> [ACTION:delete filename:current-file.md]
- "remove the part about loops" -> [ACTION:remove_content filename:current-file.md]

Put the marker at the very start of the reply and write the rest naturally. The user
never sees the marker."#;

/// The active document as shown to the model.
#[derive(Debug, Clone, Copy)]
pub struct ActiveDocument<'a> {
    pub name: &'a str,
    pub content: &'a str,
}

pub fn system_prompt(active: Option<ActiveDocument<'_>>) -> String {
    let context = match active {
        Some(doc) => format!(
            "You are an assistant for a markdown notes vault. The user is currently viewing a file named \"{}\" with the following content:\n\n{}",
            doc.name, doc.content
        ),
        None => "You are an assistant for a markdown notes vault. The user is not currently viewing any file.".to_string(),
    };
    format!("{}\n\n{}", context, ACTION_PROTOCOL)
}

/// `User:` / `Assistant:` transcript, one message per line.
pub fn render_history(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full prompt for the next turn. `messages` already ends with the new user message.
pub fn build_prompt(active: Option<ActiveDocument<'_>>, messages: &[ChatMessage]) -> Prompt {
    Prompt::new(format!(
        "{}\n\n{}\n",
        system_prompt(active),
        render_history(messages)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_with_active_document() {
        let active = ActiveDocument {
            name: "todo.md",
            content: "- milk",
        };
        let prompt = build_prompt(
            Some(active),
            &[ChatMessage::user("hi"), ChatMessage::assistant("hello")],
        );
        assert!(prompt.prefix.contains("named \"todo.md\""));
        assert!(prompt.prefix.contains("- milk"));
        assert!(prompt.prefix.ends_with("User: hi\nAssistant: hello\n"));
        assert!(prompt.suffix.is_empty());
    }

    #[test]
    fn test_prompt_without_document() {
        let prompt = build_prompt(None, &[ChatMessage::user("hi")]);
        assert!(prompt.prefix.contains("not currently viewing any file"));
        assert!(prompt.prefix.contains("[ACTION:create filename:"));
    }
}
