//! Authorization rules for conversation actions.
//!
//! Pure decisions over a conversation snapshot: no I/O, no clock. The
//! conversation service evaluates them inside the conversation's exclusive
//! section so the decision and the mutation see the same membership.

use crate::models::Conversation;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Rename,
    Rephoto,
    AddMember(Uuid),
    RemoveMember(Uuid),
    Leave,
}

/// Who may remove a member other than themselves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovalPolicy {
    /// Flat trust: any member may remove any other member
    #[default]
    AnyMember,
    /// Members may only remove themselves
    SelfOnly,
}

impl FromStr for RemovalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any_member" => Ok(Self::AnyMember),
            "self_only" => Ok(Self::SelfOnly),
            other => Err(format!("Invalid removal policy: {}", other)),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Actor is a member but the action is not permitted
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// Actor is not a member; existence is masked
    #[error("conversation not found")]
    NotFound,

    /// The action cannot apply to this conversation or target
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
}

/// A member whose membership was verified against a snapshot
#[derive(Debug, Clone, Copy)]
pub struct VerifiedMember<'a> {
    pub user_id: Uuid,
    pub conversation: &'a Conversation,
}

impl<'a> VerifiedMember<'a> {
    pub fn verify(conversation: &'a Conversation, user_id: Uuid) -> Result<Self, Denial> {
        if !conversation.is_member(user_id) {
            return Err(Denial::NotFound);
        }
        Ok(Self {
            user_id,
            conversation,
        })
    }

    pub fn require_group(&self) -> Result<(), Denial> {
        if !self.conversation.is_group() {
            return Err(Denial::InvalidOperation(
                "direct conversations have fixed membership and no metadata",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationEngine {
    removal_policy: RemovalPolicy,
}

impl AuthorizationEngine {
    pub fn new(removal_policy: RemovalPolicy) -> Self {
        Self { removal_policy }
    }

    pub fn can_perform(
        &self,
        actor: Uuid,
        conversation: &Conversation,
        action: Action,
    ) -> Result<(), Denial> {
        let member = VerifiedMember::verify(conversation, actor)?;

        match action {
            Action::View => Ok(()),
            Action::Rename | Action::Rephoto => member.require_group(),
            Action::AddMember(target) => {
                member.require_group()?;
                if conversation.is_member(target) {
                    return Err(Denial::InvalidOperation("user is already a member"));
                }
                Ok(())
            }
            Action::Leave => self.can_remove(&member, actor),
            Action::RemoveMember(target) => self.can_remove(&member, target),
        }
    }

    fn can_remove(&self, member: &VerifiedMember<'_>, target: Uuid) -> Result<(), Denial> {
        member.require_group()?;
        if !member.conversation.is_member(target) {
            return Err(Denial::InvalidOperation("user is not a member"));
        }
        if target != member.user_id && self.removal_policy == RemovalPolicy::SelfOnly {
            return Err(Denial::Forbidden("members may only remove themselves"));
        }
        Ok(())
    }
}
