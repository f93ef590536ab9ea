use crate::core::AiActor;
use crate::errors::{AutomationError, Result};
use crate::types::ExtractedEntity;
use serde_json::{json, Value};
use tracing::info;

/// JSON schema handed to the extraction service for a corporation record.
pub fn entity_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "legalName": {
                "type": "string",
                "description": "Full legal name of the corporation"
            },
            "businessNumber": {
                "type": "string",
                "description": "Business number, if present"
            },
            "beneficialOwners": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "ownershipPercentage": { "type": "string" }
                    },
                    "required": ["name"]
                }
            },
            "complianceOfficerName": {
                "type": "string",
                "description": "Name of the designated compliance officer, if present"
            }
        },
        "required": ["legalName", "beneficialOwners"]
    })
}

pub async fn extract_entity(actor: &dyn AiActor, instruction: &str) -> Result<ExtractedEntity> {
    let raw = actor.extract(instruction, &entity_schema()).await?;
    let entity: ExtractedEntity = serde_json::from_value(raw).map_err(|e| {
        AutomationError::ActorFailed(format!("extraction returned an unexpected shape: {}", e))
    })?;

    if entity.legal_name.trim().is_empty() {
        return Err(AutomationError::ActorFailed(
            "extraction returned an empty legal name".to_string(),
        ));
    }

    info!(
        "Extracted {} with {} beneficial owner(s)",
        entity.legal_name,
        entity.beneficial_owners.len()
    );
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedActor;

    #[tokio::test]
    async fn parses_extracted_record() {
        let actor = ScriptedActor::new().with_extract_response(json!({
            "legalName": "MaplePay Technologies Inc.",
            "beneficialOwners": [{ "name": "Alex Chen", "ownershipPercentage": "60%" }],
            "complianceOfficerName": "Dana Roy"
        }));

        let entity = extract_entity(&actor, "Extract the corporation details")
            .await
            .unwrap();

        assert_eq!(entity.legal_name, "MaplePay Technologies Inc.");
        assert!(entity.business_number.is_none());
        assert_eq!(entity.compliance_officer_name.as_deref(), Some("Dana Roy"));
    }

    #[tokio::test]
    async fn rejects_blank_legal_name() {
        let actor = ScriptedActor::new()
            .with_extract_response(json!({ "legalName": " ", "beneficialOwners": [] }));
        assert!(extract_entity(&actor, "x").await.is_err());
    }

    #[tokio::test]
    async fn rejects_wrong_shape() {
        let actor = ScriptedActor::new().with_extract_response(json!({ "name": "nope" }));
        let err = extract_entity(&actor, "x").await.unwrap_err();
        assert!(err.to_string().contains("unexpected shape"));
    }
}
