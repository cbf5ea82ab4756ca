//! Merge request notifications.
//!
//! Owners are read from the live ownership file, mapped to chat identities and
//! messaged directly. Anyone without an identity, or whose direct message could
//! not be delivered, is named in a single message to the fallback channel, so
//! no owner is dropped silently.

mod memory;
mod slack;

pub use memory::RecordingTransport;
pub use slack::SlackTransport;

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::codeowners::parse_owners;
use crate::errors::{NotificationError, TransportError};
use crate::host::{SourceHost, find_ownership_file};
use crate::state::StateStore;

/// Merge request metadata supplied by the pipeline trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequestContext {
    pub repository: String,
    pub id: String,
    pub title: String,
    pub url: String,
    pub author: String,
    pub source_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    /// Direct message to a chat user id.
    User(String),
    /// Post to a channel, by id or `#name`.
    Channel(String),
}

impl std::fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatTarget::User(id) => write!(f, "user {}", id),
            ChatTarget::Channel(channel) => write!(f, "channel {}", channel),
        }
    }
}

/// Delivers one plain-text message.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, target: &ChatTarget, text: &str) -> Result<(), TransportError>;
}

/// Reviewer handle to chat user id.
#[derive(Debug, Clone, Default)]
pub struct UserIdentityMap {
    ids: BTreeMap<String, String>,
}

impl UserIdentityMap {
    pub fn new(ids: BTreeMap<String, String>) -> Self {
        Self { ids }
    }

    pub fn lookup(&self, handle: &str) -> Option<&str> {
        self.ids
            .get(handle)
            .map(String::as_str)
            .filter(|id| !id.trim().is_empty())
    }
}

/// Where each owner's notification goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchPlan {
    /// `(handle, chat id)` pairs for direct messages.
    pub direct: Vec<(String, String)>,
    /// Handles without a chat identity.
    pub unmapped: Vec<String>,
}

/// Split owners into directly reachable and unmapped, preserving order.
pub fn plan(owners: &[String], identities: &UserIdentityMap) -> DispatchPlan {
    let mut plan = DispatchPlan::default();
    for owner in owners {
        match identities.lookup(owner) {
            Some(id) => plan.direct.push((owner.clone(), id.to_string())),
            None => plan.unmapped.push(owner.clone()),
        }
    }
    plan
}

/// Where the owner list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerSource {
    SourceBranch,
    DefaultBranch,
    RotationState,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOwners {
    pub owners: Vec<String>,
    pub source: OwnerSource,
    /// Ownership file path, when one was found.
    pub path: Option<String>,
}

/// Read the current owners for a merge request.
///
/// The ownership file on the source branch wins, then the one on the default
/// branch. When neither exists the last rotation recorded in `store` is used.
pub async fn resolve_owners(
    host: &dyn SourceHost,
    store: Option<&StateStore>,
    mr: &MergeRequestContext,
    candidates: &[String],
) -> Result<ResolvedOwners, NotificationError> {
    let repository = mr.repository.as_str();

    if let Some(branch) = mr.source_branch.as_deref().filter(|b| !b.is_empty()) {
        let (path, content) = find_ownership_file(host, repository, branch, candidates).await?;
        if let Some(content) = content {
            debug!(repository, branch, path = %path, "Read owners from source branch");
            return Ok(ResolvedOwners {
                owners: parse_owners(&content),
                source: OwnerSource::SourceBranch,
                path: Some(path),
            });
        }
    }

    let branch = host.resolve_default_branch(repository).await?;
    let (path, content) = find_ownership_file(host, repository, &branch, candidates).await?;
    if let Some(content) = content {
        debug!(repository, branch = %branch, path = %path, "Read owners from default branch");
        return Ok(ResolvedOwners {
            owners: parse_owners(&content),
            source: OwnerSource::DefaultBranch,
            path: Some(path),
        });
    }

    warn!(repository, "No ownership file found");
    if let Some(store) = store
        && let Some(state) = store.get_state(repository).await?
        && !state.last_selected.is_empty()
    {
        info!(
            repository,
            reviewers = %state.last_selected.join(", "),
            "Using reviewers from rotation state"
        );
        return Ok(ResolvedOwners {
            owners: state.last_selected,
            source: OwnerSource::RotationState,
            path: None,
        });
    }

    Ok(ResolvedOwners {
        owners: Vec::new(),
        source: OwnerSource::None,
        path: None,
    })
}

pub fn direct_message(mr: &MergeRequestContext) -> String {
    format!(
        "Review requested: merge request !{} in {}\nTitle: {}\nAuthor: {}\n{}",
        mr.id, mr.repository, mr.title, mr.author, mr.url
    )
}

/// Channel message naming owners that could not be reached directly.
pub fn fallback_message(mr: &MergeRequestContext, owners: &[String]) -> String {
    let addressed = if owners.is_empty() {
        "No reviewers were found in the ownership file.".to_string()
    } else {
        let handles: Vec<String> = owners.iter().map(|o| format!("@{}", o)).collect();
        format!("Could not notify directly: {}", handles.join(", "))
    };
    format!("{}\n{}", addressed, direct_message(mr))
}

/// What a notification run delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Owners reached by direct message.
    pub direct: Vec<String>,
    /// Owners named in the fallback channel message.
    pub via_fallback: Vec<String>,
    /// Owners whose direct message failed (also in `via_fallback`).
    pub failed_direct: Vec<String>,
    /// Channel used, if any message went there.
    pub fallback_channel: Option<String>,
}

pub struct Notifier<'a> {
    transport: &'a dyn ChatTransport,
    identities: UserIdentityMap,
    fallback_channel: Option<String>,
}

impl<'a> Notifier<'a> {
    pub fn new(
        transport: &'a dyn ChatTransport,
        identities: UserIdentityMap,
        fallback_channel: Option<String>,
    ) -> Self {
        Self {
            transport,
            identities,
            fallback_channel: fallback_channel.filter(|c| !c.trim().is_empty()),
        }
    }

    /// Notify every owner, directly where possible and through the fallback
    /// channel otherwise.
    ///
    /// With no owners this is an error unless `force` is set, in which case the
    /// fallback channel is told that nobody was found.
    pub async fn notify(
        &self,
        mr: &MergeRequestContext,
        owners: &[String],
        force: bool,
    ) -> Result<DispatchReport, NotificationError> {
        if owners.is_empty() && !force {
            return Err(NotificationError::NoOwners {
                repository: mr.repository.clone(),
            });
        }

        let plan = plan(owners, &self.identities);
        let mut report = DispatchReport::default();
        let text = direct_message(mr);

        for (owner, id) in &plan.direct {
            match self
                .transport
                .send(&ChatTarget::User(id.clone()), &text)
                .await
            {
                Ok(()) => {
                    info!(owner = %owner, "Sent direct message");
                    report.direct.push(owner.clone());
                }
                Err(e) => {
                    warn!(owner = %owner, error = %e, "Direct message failed, using fallback channel");
                    report.failed_direct.push(owner.clone());
                }
            }
        }

        let mut undelivered = plan.unmapped;
        undelivered.extend(report.failed_direct.iter().cloned());
        if undelivered.is_empty() && !owners.is_empty() {
            return Ok(report);
        }

        let Some(channel) = self.fallback_channel.clone() else {
            return Err(NotificationError::NoFallbackChannel { undelivered });
        };

        let target = ChatTarget::Channel(channel.clone());
        self.transport
            .send(&target, &fallback_message(mr, &undelivered))
            .await
            .map_err(|source| NotificationError::Dispatch {
                target: target.to_string(),
                source,
            })?;
        info!(channel = %channel, owners = %undelivered.join(", "), "Posted to fallback channel");

        report.via_fallback = undelivered;
        report.fallback_channel = Some(channel);
        Ok(report)
    }
}
