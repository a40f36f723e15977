//! ID resolver module
//!
//! Resolves deployment ID prefixes to full UUIDs by querying the API, so
//! users can type a short, unambiguous prefix instead of a full UUID.

use anyhow::{Context, Result, anyhow};
use tandem_client::OrchestratorClient;
use uuid::Uuid;

use crate::types::IdOrPrefix;

/// Resolve a deployment ID or prefix to a full UUID
///
/// Full UUIDs are returned without a request.
pub async fn resolve_deployment_id(
    client: &OrchestratorClient,
    id_or_prefix: &IdOrPrefix,
) -> Result<Uuid> {
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let deployments = client
        .list_deployments()
        .await
        .context("Failed to fetch deployments for ID resolution")?;

    pick_unique(id_or_prefix, deployments.iter().map(|d| d.id))
}

/// The single id matching the prefix
fn pick_unique(id_or_prefix: &IdOrPrefix, ids: impl Iterator<Item = Uuid>) -> Result<Uuid> {
    let matches: Vec<Uuid> = ids.filter(|id| id_or_prefix.matches(*id)).collect();

    match matches.as_slice() {
        [] => Err(anyhow!(
            "No deployment found with ID starting with '{}'",
            id_or_prefix
        )),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple deployments: {}",
                id_or_prefix,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Uuid {
        Uuid::parse_str(s).unwrap()
    }

    #[test]
    fn test_pick_unique() {
        let ids = [
            id("aa000000-0000-4000-8000-000000000000"),
            id("ab000000-0000-4000-8000-000000000000"),
        ];

        let picked = pick_unique(&IdOrPrefix::parse("aa"), ids.into_iter()).unwrap();
        assert_eq!(picked, ids[0]);

        let ambiguous = pick_unique(&IdOrPrefix::parse("a"), ids.into_iter()).unwrap_err();
        assert!(ambiguous.to_string().contains("Ambiguous"));

        assert!(pick_unique(&IdOrPrefix::parse("ff"), ids.into_iter()).is_err());
    }
}
