//! `labels-on-creation`: labels new issues and pull requests.

use serde::Deserialize;
use tracing::info;

use crate::github::{GitHubClient, label_ids_by_name};

use super::common::{ContentOpened, require_listed};
use super::{ActionError, WebhookHandler};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LabelsArgs {
    pub labels: Vec<String>,
    #[serde(default)]
    pub repositories: Vec<String>,
}

#[derive(Debug)]
pub struct LabelsOnCreation {
    client: GitHubClient,
    args: LabelsArgs,
}

impl LabelsOnCreation {
    pub fn new(client: GitHubClient, args: LabelsArgs) -> Self {
        LabelsOnCreation { client, args }
    }
}

impl WebhookHandler<ContentOpened> for LabelsOnCreation {
    async fn handle(&self, opened: ContentOpened) -> Result<(), ActionError> {
        require_listed(&self.args.repositories, &opened.repo)?;

        // Labels missing from the repository are ignored.
        let available = self.client.repository_labels(&opened.repo).await?;
        let ids = label_ids_by_name(&available, &self.args.labels);
        if ids.is_empty() {
            return Err(ActionError::skip(format!(
                "{} has none of the configured labels",
                opened.repo
            )));
        }

        self.client
            .add_labels(opened.node_id.as_str(), &ids)
            .await?;
        info!(repository = %opened.repo, number = %opened.number, added = ids.len(), "labeled");
        Ok(())
    }
}
