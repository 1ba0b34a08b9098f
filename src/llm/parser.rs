//! Turn raw model text into typed responses

use serde::de::DeserializeOwned;

use crate::core::error::CollaboratorError;

/// Extract the outermost JSON object from a reply (handles surrounding text and code fences)
pub fn extract_json(response: &str) -> Result<&str, CollaboratorError> {
    let start = response
        .find('{')
        .ok_or_else(|| CollaboratorError::MalformedResponse("no JSON found in response".into()))?;
    let end = response
        .rfind('}')
        .ok_or_else(|| CollaboratorError::MalformedResponse("no closing brace found in response".into()))?;
    if end < start {
        return Err(CollaboratorError::MalformedResponse("unbalanced JSON in response".into()));
    }
    Ok(&response[start..=end])
}

/// Parse a reply into `T`, reporting the offending text on failure
pub fn parse_reply<T: DeserializeOwned>(response: &str) -> Result<T, CollaboratorError> {
    let json = extract_json(response)?;
    serde_json::from_str(json).map_err(|e| {
        CollaboratorError::MalformedResponse(format!("{} - response: {}", e, truncate(response, 200)))
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::collaborator::TurnResponse;

    #[test]
    fn test_extract_json_from_fenced_reply() {
        let reply = "Sure!\n```json\n{\"utterance\": \"Hello\", \"end\": false}\n```";
        assert_eq!(extract_json(reply).unwrap(), "{\"utterance\": \"Hello\", \"end\": false}");
    }

    #[test]
    fn test_extract_json_missing() {
        assert!(matches!(
            extract_json("no braces here"),
            Err(CollaboratorError::MalformedResponse(_))
        ));
        assert!(extract_json("} backwards {").is_err());
    }

    #[test]
    fn test_parse_reply_typed() {
        let turn: TurnResponse = parse_reply("{\"utterance\": \"Bye\", \"end\": true}").unwrap();
        assert!(turn.end);
    }

    #[test]
    fn test_parse_reply_wrong_shape() {
        let result: Result<TurnResponse, _> = parse_reply("{\"text\": 3}");
        assert!(matches!(result, Err(CollaboratorError::MalformedResponse(_))));
    }
}
