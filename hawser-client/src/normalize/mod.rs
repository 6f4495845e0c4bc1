//! Call normalization: rewriting high-level calls into wire-ready shape.
//!
//! Before serialization, every method call passes through an ordered,
//! data-driven table of rewrite rules. Each rule is a named predicate +
//! transform pair over a [`MethodCall`]; rules are applied in table order,
//! every matching rule runs, and the first rule error aborts the pass.
//! Rules are idempotent: a second pass over an already-normalized call
//! changes nothing.
//!
//! External effects needed by the rules (peer resolution, media uploads,
//! account flags) are reached through the [`NormalizeEnv`] seam.
//!
//! ## Design
//!
//! Method dispatch is driven by the tagged [`Method`] type rather than by
//! string matching, and the rule table is built once at engine
//! construction. Extending the engine means adding a variant and a rule,
//! not another arm in a string switch.

mod link;
mod rules;

pub use link::{classify_link, LinkKind};
pub use rules::{standard_rules, RewriteRule};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::reply::{reply_pair, ReplyFuture, ReplyPromise};

/// Argument map of a call or object body.
pub type Args = serde_json::Map<String, Value>;

/// A method name, tagged for the methods the rewrite rules care about.
///
/// Anything else rides through as [`Method::Other`] untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// `messages.importChatInvite`
    ImportChatInvite,
    /// `messages.checkChatInvite`
    CheckChatInvite,
    /// `channels.joinChannel`
    JoinChannel,
    /// `messages.sendMessage`
    SendMessage,
    /// `messages.sendEncrypted`
    SendEncrypted,
    /// `messages.sendEncryptedFile`
    SendEncryptedFile,
    /// `messages.sendEncryptedService`
    SendEncryptedService,
    /// `messages.uploadEncryptedFile`
    UploadEncryptedFile,
    /// `messages.sendMultiMedia`
    SendMultiMedia,
    /// `messages.uploadMedia`
    UploadMedia,
    /// `photos.updateProfilePhoto`
    UpdateProfilePhoto,
    /// `photos.uploadProfilePhoto`
    UploadProfilePhoto,
    /// `messages.addChatUser`
    AddChatUser,
    /// `channels.deleteUserHistory`
    DeleteUserHistory,
    /// `channels.deleteParticipantHistory`
    DeleteParticipantHistory,
    /// `messages.discardEncryption`
    DiscardEncryption,
    /// Any method without rewrite-relevant behavior.
    Other(String),
}

impl Method {
    /// Parse a wire method name.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "messages.importChatInvite" => Method::ImportChatInvite,
            "messages.checkChatInvite" => Method::CheckChatInvite,
            "channels.joinChannel" => Method::JoinChannel,
            "messages.sendMessage" => Method::SendMessage,
            "messages.sendEncrypted" => Method::SendEncrypted,
            "messages.sendEncryptedFile" => Method::SendEncryptedFile,
            "messages.sendEncryptedService" => Method::SendEncryptedService,
            "messages.uploadEncryptedFile" => Method::UploadEncryptedFile,
            "messages.sendMultiMedia" => Method::SendMultiMedia,
            "messages.uploadMedia" => Method::UploadMedia,
            "photos.updateProfilePhoto" => Method::UpdateProfilePhoto,
            "photos.uploadProfilePhoto" => Method::UploadProfilePhoto,
            "messages.addChatUser" => Method::AddChatUser,
            "channels.deleteUserHistory" => Method::DeleteUserHistory,
            "channels.deleteParticipantHistory" => Method::DeleteParticipantHistory,
            "messages.discardEncryption" => Method::DiscardEncryption,
            other => Method::Other(other.to_string()),
        }
    }

    /// Wire name of this method.
    pub fn as_wire(&self) -> &str {
        match self {
            Method::ImportChatInvite => "messages.importChatInvite",
            Method::CheckChatInvite => "messages.checkChatInvite",
            Method::JoinChannel => "channels.joinChannel",
            Method::SendMessage => "messages.sendMessage",
            Method::SendEncrypted => "messages.sendEncrypted",
            Method::SendEncryptedFile => "messages.sendEncryptedFile",
            Method::SendEncryptedService => "messages.sendEncryptedService",
            Method::UploadEncryptedFile => "messages.uploadEncryptedFile",
            Method::SendMultiMedia => "messages.sendMultiMedia",
            Method::UploadMedia => "messages.uploadMedia",
            Method::UpdateProfilePhoto => "photos.updateProfilePhoto",
            Method::UploadProfilePhoto => "photos.uploadProfilePhoto",
            Method::AddChatUser => "messages.addChatUser",
            Method::DeleteUserHistory => "channels.deleteUserHistory",
            Method::DeleteParticipantHistory => "channels.deleteParticipantHistory",
            Method::DiscardEncryption => "messages.discardEncryption",
            Method::Other(name) => name,
        }
    }

    /// Whether sends of this method carry a queue promise.
    ///
    /// The encrypted-send family signals acceptance into the outgoing
    /// pipeline separately from the server reply.
    pub fn wants_queue_promise(&self) -> bool {
        matches!(
            self,
            Method::SendEncrypted | Method::SendEncryptedFile | Method::SendEncryptedService
        )
    }
}

/// A method call: name plus argument map.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    /// The method being called.
    pub method: Method,
    /// Arguments, in pre-serialization shape.
    pub args: Args,
}

impl MethodCall {
    /// Create a call.
    pub fn new(method: Method, args: Args) -> Self {
        Self { method, args }
    }
}

/// What a chat identifier resolved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerKind {
    /// A user account.
    User,
    /// A basic group.
    Chat,
    /// A channel or supergroup.
    Channel,
    /// A secret chat.
    SecretChat,
}

/// Result of resolving a chat identifier through the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPeer {
    /// What the identifier turned out to be.
    pub kind: PeerKind,
    /// Canonical positive id.
    pub id: i64,
}

/// Usage errors raised by the rewrite rules.
///
/// These surface synchronously to the caller and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// A check-invite call was given a channel link instead of an invite.
    #[error("not an invite link: {link}")]
    NotInviteLink {
        /// The offending link as supplied.
        link: String,
    },

    /// A chat id resolved to something other than a basic group.
    #[error("chat_id resolves to a {kind:?}, not a basic group")]
    NotBasicGroup {
        /// What the id actually resolved to.
        kind: PeerKind,
    },

    /// The environment failed to resolve a peer.
    #[error("peer resolution failed: {message}")]
    Resolve {
        /// Failure text from the environment.
        message: String,
    },

    /// The environment failed to upload a payload.
    #[error("upload failed: {message}")]
    Upload {
        /// Failure text from the environment.
        message: String,
    },
}

/// Environment the rewrite rules run against.
///
/// Implemented by the protocol root; everything the rules need beyond the
/// call itself comes through here.
#[async_trait(?Send)]
pub trait NormalizeEnv {
    /// Whether the calling account is a bot.
    fn is_bot(&self) -> bool;

    /// Whether configuration permits automatic uploads during rewrites.
    fn auto_upload(&self) -> bool;

    /// Resolve a chat identifier to a concrete peer.
    async fn resolve_chat(&self, id: &Value) -> Result<ResolvedPeer, NormalizeError>;

    /// Upload a media payload, returning its wire-ready input form.
    async fn upload_media(
        &self,
        peer: Option<&Value>,
        media: &Value,
    ) -> Result<Value, NormalizeError>;

    /// Encrypt-and-upload a raw file payload for secret chats.
    ///
    /// The returned object carries `key`/`iv`/`size` alongside the file
    /// reference.
    async fn upload_encrypted(&self, file: &Value) -> Result<Value, NormalizeError>;
}

/// Outcome of a normalization pass.
pub struct Normalized {
    /// The rewritten, wire-ready call.
    pub call: MethodCall,
    /// Promise to fulfill once the call is accepted into the pipeline.
    ///
    /// Allocated only for the encrypted-send family.
    pub queue_promise: Option<ReplyPromise<()>>,
    /// Subscription half of `queue_promise`.
    pub queued: Option<ReplyFuture<()>>,
}

/// Ordered, data-driven rewrite engine.
pub struct Normalizer {
    rules: Vec<Box<dyn RewriteRule>>,
}

impl Normalizer {
    /// Build the engine with the standard rule table.
    pub fn new() -> Self {
        Self {
            rules: standard_rules(),
        }
    }

    /// Build the engine with a custom rule table, in application order.
    pub fn with_rules(rules: Vec<Box<dyn RewriteRule>>) -> Self {
        Self { rules }
    }

    /// Rule names in application order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Rewrite a call into wire-ready shape.
    pub async fn normalize(
        &self,
        env: &dyn NormalizeEnv,
        mut call: MethodCall,
    ) -> Result<Normalized, NormalizeError> {
        for rule in &self.rules {
            if rule.applies(env, &call) {
                tracing::trace!(
                    rule = rule.name(),
                    method = call.method.as_wire(),
                    "applying rewrite rule"
                );
                call = rule.apply(env, call).await?;
            }
        }

        let (queue_promise, queued) = if call.method.wants_queue_promise() {
            let (promise, future) = reply_pair();
            (Some(promise), Some(future))
        } else {
            (None, None)
        };

        Ok(Normalized {
            call,
            queue_promise,
            queued,
        })
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}
