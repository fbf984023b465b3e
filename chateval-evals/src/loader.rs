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

//! JSON document loading

use crate::EvalError;
use chateval_core::{ContextBundle, Conversation};
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::Path;

/// Read and deserialize a JSON document
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, EvalError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            EvalError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            EvalError::FileRead {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    serde_json::from_str(&content).map_err(|source| EvalError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_conversation(path: &Path) -> Result<Conversation, EvalError> {
    let conversation: Conversation = load_json(path)?;
    tracing::debug!(
        "Loaded {} conversation turns from {:?}",
        conversation.len(),
        path
    );
    Ok(conversation)
}

pub fn load_context_bundle(path: &Path) -> Result<ContextBundle, EvalError> {
    let bundle: ContextBundle = load_json(path)?;
    tracing::debug!(
        "Loaded {} context vectors from {:?}",
        bundle.items().len(),
        path
    );
    Ok(bundle)
}
