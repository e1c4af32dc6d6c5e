//! GraphQL operations (labels and projects).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::client::GitHubClient;
use super::error::GitHubApiError;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// A label as seen by GraphQL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct LabelConnection {
    nodes: Vec<Label>,
}

const REPOSITORY_LABELS_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    labels(first: 100) { nodes { id name } }
  }
}
"#;

const CONTENT_LABELS_QUERY: &str = r#"
query($id: ID!) {
  node(id: $id) {
    ... on Issue { labels(first: 100) { nodes { id name } } }
    ... on PullRequest { labels(first: 100) { nodes { id name } } }
  }
}
"#;

const ADD_LABELS_MUTATION: &str = r#"
mutation($labelable: ID!, $labels: [ID!]!) {
  addLabelsToLabelable(input: {labelableId: $labelable, labelIds: $labels}) {
    clientMutationId
  }
}
"#;

const REMOVE_LABELS_MUTATION: &str = r#"
mutation($labelable: ID!, $labels: [ID!]!) {
  removeLabelsFromLabelable(input: {labelableId: $labelable, labelIds: $labels}) {
    clientMutationId
  }
}
"#;

const ADD_PROJECT_ITEM_MUTATION: &str = r#"
mutation($project: ID!, $content: ID!) {
  addProjectV2ItemById(input: {projectId: $project, contentId: $content}) {
    item { id }
  }
}
"#;

impl GitHubClient {
    /// Runs a GraphQL query or mutation and returns its `data`.
    pub async fn graphql<T, V>(&self, query: &str, variables: &V) -> Result<T, GitHubApiError>
    where
        T: DeserializeOwned,
        V: Serialize,
    {
        let response: GraphQlResponse<T> = self
            .inner()
            .graphql(&serde_json::json!({
                "query": query,
                "variables": variables,
            }))
            .await?;

        if !response.errors.is_empty() {
            let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(GitHubApiError::without_source(format!(
                "GraphQL error: {}",
                messages.join("; ")
            )));
        }

        response
            .data
            .ok_or_else(|| GitHubApiError::without_source("GraphQL response without data"))
    }

    /// All labels defined on `repo`.
    pub async fn repository_labels(&self, repo: &str) -> Result<Vec<Label>, GitHubApiError> {
        #[derive(Deserialize)]
        struct Data {
            repository: Option<Repository>,
        }
        #[derive(Deserialize)]
        struct Repository {
            labels: LabelConnection,
        }

        let data: Data = self
            .graphql(
                REPOSITORY_LABELS_QUERY,
                &serde_json::json!({ "owner": self.organization(), "name": repo }),
            )
            .await?;

        data.repository
            .map(|r| r.labels.nodes)
            .ok_or_else(|| GitHubApiError::without_source(format!("repository {} not found", repo)))
    }

    /// Labels currently attached to an issue or pull request.
    pub async fn content_labels(&self, content_id: &str) -> Result<Vec<Label>, GitHubApiError> {
        #[derive(Deserialize)]
        struct Data {
            node: Option<Node>,
        }
        #[derive(Deserialize)]
        struct Node {
            labels: Option<LabelConnection>,
        }

        let data: Data = self
            .graphql(CONTENT_LABELS_QUERY, &serde_json::json!({ "id": content_id }))
            .await?;

        Ok(data
            .node
            .and_then(|n| n.labels)
            .map(|l| l.nodes)
            .unwrap_or_default())
    }

    pub async fn add_labels(
        &self,
        labelable_id: &str,
        label_ids: &[String],
    ) -> Result<(), GitHubApiError> {
        let _: serde_json::Value = self
            .graphql(
                ADD_LABELS_MUTATION,
                &serde_json::json!({ "labelable": labelable_id, "labels": label_ids }),
            )
            .await?;
        Ok(())
    }

    pub async fn remove_labels(
        &self,
        labelable_id: &str,
        label_ids: &[String],
    ) -> Result<(), GitHubApiError> {
        let _: serde_json::Value = self
            .graphql(
                REMOVE_LABELS_MUTATION,
                &serde_json::json!({ "labelable": labelable_id, "labels": label_ids }),
            )
            .await?;
        Ok(())
    }

    /// Adds an issue or pull request to a project (v2). Returns the item id.
    pub async fn add_project_item(
        &self,
        project_id: &str,
        content_id: &str,
    ) -> Result<String, GitHubApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            add_project_v2_item_by_id: Payload,
        }
        #[derive(Deserialize)]
        struct Payload {
            item: Item,
        }
        #[derive(Deserialize)]
        struct Item {
            id: String,
        }

        let data: Data = self
            .graphql(
                ADD_PROJECT_ITEM_MUTATION,
                &serde_json::json!({ "project": project_id, "content": content_id }),
            )
            .await?;
        Ok(data.add_project_v2_item_by_id.item.id)
    }
}

/// Picks the ids of the labels whose names are in `wanted`, preserving the
/// order of `available`.
pub fn label_ids_by_name(available: &[Label], wanted: &[String]) -> Vec<String> {
    available
        .iter()
        .filter(|l| wanted.iter().any(|w| w == &l.name))
        .map(|l| l.id.clone())
        .collect()
}
