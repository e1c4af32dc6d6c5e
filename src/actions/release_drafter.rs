//! `release-drafter`: keeps a draft release of the product up to date.
//!
//! The draft body is edited structurally:
//!
//! ```text
//! # Required Actions          <- ACTIONS_REQUIRED blocks
//! # Breaking Changes          <- BREAKING_CHANGE blocks
//! # General                   <- draft headline
//! ## metalctl v0.8.1          <- one section per component release
//! # Merged Pull Requests      <- one list item per merged pull request
//! ```
//!
//! When no draft exists, one is created with a tag guessed from the latest
//! published release.

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::dispatch::MultiLock;
use crate::github::GitHubClient;
use crate::github::models::ReleaseRequest;
use crate::markdown::{Markdown, Section, extract_annotated_block, fence_marker, to_list_item};
use crate::template::{placeholder_count, render};
use crate::types::{PrNumber, ReleaseTag, RepoId, parse_version_lenient};
use crate::webhooks::{PrAction, PullRequestEvent, ReleaseAction, ReleaseEvent};

use super::{ActionError, WebhookHandler};

const REQUIRED_ACTIONS: (&str, &str) = ("ACTIONS_REQUIRED", "Required Actions");
const BREAKING_CHANGES: (&str, &str) = ("BREAKING_CHANGE", "Breaking Changes");

fn default_repository() -> String {
    "releases".to_string()
}

fn default_headline() -> String {
    "General".to_string()
}

fn default_title_template() -> String {
    "%s".to_string()
}

fn default_merged_headline() -> String {
    "Merged Pull Requests".to_string()
}

fn default_initial() -> String {
    "v0.0.1".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReleaseDrafterArgs {
    #[serde(default = "default_repository")]
    pub repository: String,
    /// Component repositories whose releases and pull requests are drafted.
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default = "default_headline")]
    pub draft_headline: String,
    #[serde(default = "default_title_template")]
    pub release_title_template: String,
    #[serde(default = "default_merged_headline")]
    pub merged_prs_section_headline: String,
    pub merged_prs_section_description: Option<String>,
    #[serde(default)]
    pub next_version: NextVersion,
}

/// How the tag of a new draft is derived from the latest release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NextVersion {
    #[serde(default)]
    pub bump: Bump,
    /// Tag used when there is no parsable previous release.
    #[serde(default = "default_initial")]
    pub initial: String,
}

impl Default for NextVersion {
    fn default() -> Self {
        NextVersion {
            bump: Bump::default(),
            initial: default_initial(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bump {
    Major,
    #[default]
    Minor,
    Patch,
}

impl NextVersion {
    /// Guesses the tag following `latest`.
    ///
    /// ```
    /// use metal_robot::actions::{Bump, NextVersion};
    ///
    /// let next = NextVersion::default();
    /// assert_eq!(next.guess(Some("v0.8.3")), "v0.9.0");
    /// assert_eq!(next.guess(Some("nightly")), "v0.0.1");
    /// assert_eq!(next.guess(None), "v0.0.1");
    ///
    /// let patch = NextVersion { bump: Bump::Patch, ..NextVersion::default() };
    /// assert_eq!(patch.guess(Some("v1.2.3-rc.1")), "v1.2.4");
    /// ```
    pub fn guess(&self, latest: Option<&str>) -> String {
        let Some(mut version) = latest.and_then(|t| parse_version_lenient(t).ok()) else {
            return self.initial.clone();
        };
        match self.bump {
            Bump::Major => {
                version.major += 1;
                version.minor = 0;
                version.patch = 0;
            }
            Bump::Minor => {
                version.minor += 1;
                version.patch = 0;
            }
            Bump::Patch => version.patch += 1,
        }
        version.pre = semver::Prerelease::EMPTY;
        version.build = semver::BuildMetadata::EMPTY;
        format!("v{}", version)
    }
}

/// A component published a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRelease {
    pub component: String,
    pub tag: String,
    pub body: String,
    pub prerelease: bool,
}

pub(crate) fn component_release(event: &ReleaseEvent) -> Result<ComponentRelease, ActionError> {
    if event.action != ReleaseAction::Published || event.draft {
        return Err(ActionError::skip("not a published release"));
    }
    Ok(ComponentRelease {
        component: event.repo.repo.clone(),
        tag: event.tag.clone(),
        body: event.body.clone(),
        prerelease: event.prerelease,
    })
}

/// A pull request of a component was merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedPullRequest {
    pub repo: RepoId,
    pub number: PrNumber,
    pub title: String,
    pub author: String,
    pub body: String,
}

pub(crate) fn merged_pull_request(
    event: &PullRequestEvent,
) -> Result<MergedPullRequest, ActionError> {
    if event.action != PrAction::Closed || !event.merged {
        return Err(ActionError::skip("pull request was not merged"));
    }
    Ok(MergedPullRequest {
        repo: event.repo.clone(),
        number: event.number,
        title: event.title.clone(),
        author: event.author.clone(),
        body: event.body.clone(),
    })
}

struct Draft {
    id: Option<u64>,
    tag: String,
    body: String,
}

#[derive(Debug)]
pub struct ReleaseDrafter {
    client: GitHubClient,
    args: ReleaseDrafterArgs,
    locks: MultiLock,
}

impl ReleaseDrafter {
    pub fn new(
        client: GitHubClient,
        args: ReleaseDrafterArgs,
        locks: MultiLock,
    ) -> Result<Self, ConfigError> {
        if placeholder_count(&args.release_title_template) > 1 {
            return Err(ConfigError::Invalid(format!(
                "release-title-template {:?} takes at most one placeholder",
                args.release_title_template
            )));
        }
        ReleaseTag::parse(&args.next_version.initial)
            .map_err(|e| ConfigError::Invalid(format!("next-version initial: {}", e)))?;
        Ok(ReleaseDrafter {
            client,
            args,
            locks,
        })
    }

    fn require_component(&self, repo: &str) -> Result<(), ActionError> {
        if self.args.repositories.iter().any(|r| r == repo) {
            Ok(())
        } else {
            Err(ActionError::skip(format!("{} is not a drafted component", repo)))
        }
    }

    async fn load_draft(&self) -> Result<Draft, ActionError> {
        let releases = self.client.list_releases(&self.args.repository).await?;
        if let Some(draft) = releases.into_iter().find(|r| r.draft) {
            return Ok(Draft {
                id: Some(draft.id),
                tag: draft.tag_name,
                body: draft.body.unwrap_or_default().replace("\r\n", "\n"),
            });
        }

        let latest = self.client.latest_release(&self.args.repository).await?;
        let tag = self
            .args
            .next_version
            .guess(latest.as_ref().map(|r| r.tag_name.as_str()));
        debug!(repository = %self.args.repository, tag = %tag, "no draft release, starting one");
        Ok(Draft {
            id: None,
            tag,
            body: String::new(),
        })
    }

    async fn save_draft(&self, draft: &Draft, doc: &Markdown) -> Result<(), ActionError> {
        let body = doc.to_string();
        if draft.id.is_some() && body == Markdown::parse(&draft.body).to_string() {
            debug!(repository = %self.args.repository, "draft release is up to date");
            return Ok(());
        }

        let request = ReleaseRequest {
            tag_name: draft.tag.clone(),
            name: render(&self.args.release_title_template, &[&draft.tag]),
            body,
            draft: true,
        };
        match draft.id {
            Some(id) => {
                self.client
                    .edit_release(&self.args.repository, id, &request)
                    .await?;
            }
            None => {
                self.client
                    .create_release(&self.args.repository, &request)
                    .await?;
            }
        }
        info!(repository = %self.args.repository, tag = %draft.tag, "updated draft release");
        Ok(())
    }

    /// Loads the draft, lets `edit` change it and saves it if it changed.
    async fn edit_draft(&self, edit: impl FnOnce(&mut Markdown)) -> Result<(), ActionError> {
        let _lock = self.locks.acquire(&self.args.repository).await;
        let draft = self.load_draft().await?;
        let mut doc = Markdown::parse(&draft.body);
        edit(&mut doc);
        self.save_draft(&draft, &doc).await
    }
}

/// Inserts or updates the section of a component release.
fn add_component_release(
    args: &ReleaseDrafterArgs,
    doc: &mut Markdown,
    release: &ComponentRelease,
    tag: &ReleaseTag,
) {
    let reference = format!("{} {}", release.component, tag);
    add_annotated_blocks(doc, &release.body, &reference);

    if doc.find_section_by_heading(1, &args.draft_headline).is_none() {
        let index = doc
            .sections()
            .iter()
            .position(|s| s.level == 1 && s.heading == args.merged_prs_section_headline)
            .unwrap_or(doc.sections().len());
        doc.insert_section(index, Section::new(1, args.draft_headline.clone()));
    }
    let Some(general) = doc.find_section_by_heading_mut(1, &args.draft_headline) else {
        return;
    };

    let prefix = format!("{} ", release.component);
    let content = demote_headings(release.body.trim());
    match general
        .children
        .iter_mut()
        .find(|s| s.level == 2 && s.heading.starts_with(&prefix))
    {
        Some(section) => {
            let current = section.heading[prefix.len()..].trim();
            let newer = parse_version_lenient(current).map_or(true, |v| tag.version() > &v);
            if !newer {
                debug!(component = %release.component, current, tag = %tag, "draft already has a newer release");
                return;
            }
            section.heading = reference;
            section.content = content.split('\n').map(str::to_string).collect();
        }
        None => general.append_child(Section::new(2, reference).with_content(&content)),
    }
}

/// Appends a merged pull request to the merged pull requests section.
fn add_merged_pull_request(args: &ReleaseDrafterArgs, doc: &mut Markdown, pr: &MergedPullRequest) {
    let reference = format!("{}/{}#{}", pr.repo.owner, pr.repo.repo, pr.number.0);
    add_annotated_blocks(doc, &pr.body, &reference);

    let headline = &args.merged_prs_section_headline;
    if doc.find_section_by_heading(1, headline).is_none() {
        let mut section = Section::new(1, headline.clone());
        if let Some(description) = &args.merged_prs_section_description {
            section.append_content(description);
        }
        doc.append_section(section);
    }
    let Some(section) = doc.find_section_by_heading_mut(1, headline) else {
        return;
    };

    let item = format!("* {} ({}) @{}", pr.title.trim(), reference, pr.author);
    if section.contains_line(&item) {
        debug!(item = %item, "pull request already listed");
        return;
    }
    section.append_content(&item);
}

/// Copies `ACTIONS_REQUIRED` and `BREAKING_CHANGE` blocks of `body` into
/// their own top-level sections at the start of the document.
fn add_annotated_blocks(doc: &mut Markdown, body: &str, reference: &str) {
    for (annotation, heading) in [BREAKING_CHANGES, REQUIRED_ACTIONS] {
        let Some(block) = extract_annotated_block(annotation, body) else {
            continue;
        };
        let item = to_list_item(&format!("{} ({})", block, reference));

        if doc.find_section_by_heading(1, heading).is_none() {
            let index = match annotation {
                "BREAKING_CHANGE" => doc
                    .sections()
                    .iter()
                    .position(|s| s.level == 1 && s.heading == REQUIRED_ACTIONS.1)
                    .map_or(0, |i| i + 1),
                _ => 0,
            };
            doc.insert_section(index, Section::new(1, heading));
        }
        let Some(section) = doc.find_section_by_heading_mut(1, heading) else {
            continue;
        };
        let first_line = item.lines().next().unwrap_or_default();
        if !section.contains_line(first_line) {
            section.append_content(&item);
        }
    }
}

/// Turns headings of a component's release notes into bold lines so they
/// do not become sections of the draft.
fn demote_headings(body: &str) -> String {
    let mut in_fence = false;
    body.lines()
        .map(|line| {
            if fence_marker(line).is_some() {
                in_fence = !in_fence;
                return line.to_string();
            }
            let hashes = line.bytes().take_while(|&b| b == b'#').count();
            if in_fence || hashes == 0 || !line[hashes..].starts_with(' ') {
                return line.to_string();
            }
            format!("**{}**", line[hashes..].trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl WebhookHandler<ComponentRelease> for ReleaseDrafter {
    async fn handle(&self, release: ComponentRelease) -> Result<(), ActionError> {
        self.require_component(&release.component)?;
        if release.prerelease {
            return Err(ActionError::skip(format!("{} is a pre-release", release.tag)));
        }
        let tag = ReleaseTag::parse(&release.tag).map_err(|e| ActionError::skip(e.to_string()))?;
        self.edit_draft(|doc| add_component_release(&self.args, doc, &release, &tag))
            .await
    }
}

impl WebhookHandler<MergedPullRequest> for ReleaseDrafter {
    async fn handle(&self, pr: MergedPullRequest) -> Result<(), ActionError> {
        self.require_component(&pr.repo.repo)?;
        self.edit_draft(|doc| add_merged_pull_request(&self.args, doc, &pr))
            .await
    }
}
