// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Evaluation input assembly
//!
//! Turns a transcript and its retrieval bundle into the triple the judges
//! read: the last user query, the last assistant answer, and one context
//! string made of the earlier chat history plus the retrieved snippets.

use crate::EvalError;
use chateval_core::{ContextBundle, Conversation, ConversationTurn, EvaluationInput, Role};

const HISTORY_HEADER: &str = "CHAT HISTORY:";
const RETRIEVED_HEADER: &str = "RETRIEVED CONTEXT:";

/// Turns before the final user/assistant pair.
///
/// Always drops exactly the last two turns, whatever their roles. Callers
/// that cannot guarantee the transcript ends with a user turn followed by
/// an assistant turn should check [`validate_evaluation_pair`] first.
pub fn historical_turns(conversation: &Conversation) -> &[ConversationTurn] {
    let turns = conversation.turns();
    &turns[..turns.len().saturating_sub(2)]
}

/// Precondition for [`build_context`]: the transcript ends with a user turn
/// immediately followed by an assistant turn.
pub fn validate_evaluation_pair(conversation: &Conversation) -> Result<(), EvalError> {
    match conversation.turns() {
        [.., second_last, last]
            if second_last.role == Role::User && last.role == Role::Assistant =>
        {
            Ok(())
        }
        [.., second_last, last] => Err(EvalError::UnexpectedTurnOrder(format!(
            "expected the final turns to be user then assistant, found {} then {}",
            second_last.role, last.role
        ))),
        turns => Err(EvalError::UnexpectedTurnOrder(format!(
            "expected at least 2 turns, found {}",
            turns.len()
        ))),
    }
}

/// Build the judge context string.
///
/// Precondition: the conversation ends with the user/assistant pair under
/// evaluation (see [`validate_evaluation_pair`]). Those two turns are
/// excluded from the history; everything before them is rendered as
/// `"{role}: {message}"` lines. Retrieved snippets with a missing or empty
/// `text` are skipped, the rest are trimmed and separated by blank lines.
pub fn build_context(bundle: &ContextBundle, conversation: &Conversation) -> String {
    let chat_history = historical_turns(conversation)
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.message.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    let vector_context = bundle
        .items()
        .iter()
        .filter_map(|item| item.text.as_deref())
        .filter(|text| !text.is_empty())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{}\n{} \n\n{}\n{}",
        HISTORY_HEADER, chat_history, RETRIEVED_HEADER, vector_context
    )
    .trim()
    .to_string()
}

/// Most recent user turn and most recent assistant turn, chosen
/// independently of each other.
pub fn select_evaluation_turns(
    conversation: &Conversation,
) -> Result<(&ConversationTurn, &ConversationTurn), EvalError> {
    let user = conversation
        .last_turn_by(Role::User)
        .ok_or(EvalError::MissingTurn(Role::User))?;
    let assistant = conversation
        .last_turn_by(Role::Assistant)
        .ok_or(EvalError::MissingTurn(Role::Assistant))?;
    Ok((user, assistant))
}

/// Assemble the judge input.
///
/// With `strict_turn_order` the trailing user/assistant pair is validated
/// before any context is built. Without it the last two turns are dropped
/// from the history as-is.
pub fn build_evaluation_input(
    conversation: &Conversation,
    bundle: &ContextBundle,
    strict_turn_order: bool,
) -> Result<EvaluationInput, EvalError> {
    let (user, assistant) = select_evaluation_turns(conversation)?;

    if strict_turn_order {
        validate_evaluation_pair(conversation)?;
    } else if let Err(e) = validate_evaluation_pair(conversation) {
        tracing::warn!("{}; history may include or omit the wrong turns", e);
    }

    let context = build_context(bundle, conversation);
    tracing::debug!(
        "Assembled context: {} history turns, {} chars",
        historical_turns(conversation).len(),
        context.len()
    );

    Ok(EvaluationInput {
        input: user.message.clone(),
        actual_output: assistant.message.clone(),
        context: vec![context],
    })
}
