//! The standard rewrite rule table.
//!
//! Each rule is a small struct implementing [`RewriteRule`]. The order in
//! [`standard_rules`] is load-bearing: earlier rules may retarget the
//! method that later rules match on.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::link::{classify_link, LinkKind};
use super::{Args, Method, MethodCall, NormalizeEnv, NormalizeError, PeerKind};

/// One named rewrite over a [`MethodCall`].
///
/// `applies` must be effect-free; `apply` may reach into the environment.
/// Every rule is idempotent: applying it to its own output changes
/// nothing.
#[async_trait(?Send)]
pub trait RewriteRule {
    /// Stable rule name, used in traces.
    fn name(&self) -> &'static str;

    /// Whether this rule rewrites `call`.
    fn applies(&self, env: &dyn NormalizeEnv, call: &MethodCall) -> bool;

    /// Rewrite `call`.
    async fn apply(
        &self,
        env: &dyn NormalizeEnv,
        call: MethodCall,
    ) -> Result<MethodCall, NormalizeError>;
}

/// The standard rule table, in application order.
pub fn standard_rules() -> Vec<Box<dyn RewriteRule>> {
    vec![
        Box::new(InviteLinks),
        Box::new(SecretChatSends),
        Box::new(MultiMediaUploads),
        Box::new(EncryptedFileUploads),
        Box::new(LegacyChatIds),
        Box::new(ProfilePhotos),
        Box::new(DefaultSelfPeer),
        Box::new(ParticipantHistoryRename),
    ]
}

/// String value of `key`, if present and a string.
fn get_str<'a>(args: &'a Args, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Constructor tag of a wire object value.
fn obj_tag(value: &Value) -> Option<&str> {
    value.get("_")?.as_str()
}

/// Whether a media value still needs uploading.
fn is_upload_placeholder(media: &Value) -> bool {
    matches!(
        obj_tag(media),
        Some("inputMediaUploadedPhoto" | "inputMediaUploadedDocument")
    )
}

/// Navigate to `parent[key]` as an object, creating or replacing as
/// needed.
fn ensure_object<'a>(parent: &'a mut Args, key: &str) -> Option<&'a mut Args> {
    let slot = parent
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Args::new()));
    if !slot.is_object() {
        *slot = Value::Object(Args::new());
    }
    slot.as_object_mut()
}

/// Invite-link decoding for the join/check/import family.
///
/// `importChatInvite` and `checkChatInvite` take an invite hash but are
/// routinely handed whole links, and `joinChannel` takes a channel but is
/// handed invite links. Decode the link and, where the link type and the
/// method disagree, swap the method. `checkChatInvite` has no channel
/// counterpart, so a channel link there is a usage error.
struct InviteLinks;

#[async_trait(?Send)]
impl RewriteRule for InviteLinks {
    fn name(&self) -> &'static str {
        "invite_links"
    }

    fn applies(&self, _env: &dyn NormalizeEnv, call: &MethodCall) -> bool {
        match call.method {
            Method::ImportChatInvite | Method::CheckChatInvite => {
                get_str(&call.args, "hash").is_some_and(|hash| classify_link(hash).is_some())
            }
            Method::JoinChannel => get_str(&call.args, "channel")
                .is_some_and(|channel| classify_link(channel).is_some()),
            _ => false,
        }
    }

    async fn apply(
        &self,
        _env: &dyn NormalizeEnv,
        mut call: MethodCall,
    ) -> Result<MethodCall, NormalizeError> {
        match call.method {
            Method::ImportChatInvite | Method::CheckChatInvite => {
                let Some(link) = get_str(&call.args, "hash").map(str::to_string) else {
                    return Ok(call);
                };
                match classify_link(&link) {
                    Some(LinkKind::Invite(hash)) => {
                        call.args.insert("hash".to_string(), Value::String(hash));
                    }
                    Some(LinkKind::Public(channel)) => {
                        if call.method == Method::CheckChatInvite {
                            return Err(NormalizeError::NotInviteLink { link });
                        }
                        call.method = Method::JoinChannel;
                        call.args.remove("hash");
                        call.args
                            .insert("channel".to_string(), Value::String(channel));
                    }
                    None => {}
                }
            }
            Method::JoinChannel => {
                let Some(link) = get_str(&call.args, "channel").map(str::to_string) else {
                    return Ok(call);
                };
                match classify_link(&link) {
                    Some(LinkKind::Invite(hash)) => {
                        call.method = Method::ImportChatInvite;
                        call.args.remove("channel");
                        call.args.insert("hash".to_string(), Value::String(hash));
                    }
                    Some(LinkKind::Public(channel)) => {
                        call.args
                            .insert("channel".to_string(), Value::String(channel));
                    }
                    None => {}
                }
            }
            _ => {}
        }
        Ok(call)
    }
}

/// Reroute `sendMessage` aimed at a secret chat.
///
/// Secret-chat sends travel as `sendEncrypted`, with the original
/// arguments (minus the hoisted peer) wrapped as the message body. The
/// body gets a defaulted `ttl`, and `reply_to_msg_id` is mirrored into
/// `reply_to_random_id`, which is how the encrypted schema keys replies.
struct SecretChatSends;

#[async_trait(?Send)]
impl RewriteRule for SecretChatSends {
    fn name(&self) -> &'static str {
        "secret_chat_sends"
    }

    fn applies(&self, _env: &dyn NormalizeEnv, call: &MethodCall) -> bool {
        call.method == Method::SendMessage
            && call
                .args
                .get("peer")
                .is_some_and(|peer| obj_tag(peer) == Some("inputEncryptedChat"))
    }

    async fn apply(
        &self,
        _env: &dyn NormalizeEnv,
        mut call: MethodCall,
    ) -> Result<MethodCall, NormalizeError> {
        let mut inner = std::mem::take(&mut call.args);
        let Some(peer) = inner.remove("peer") else {
            return Ok(call);
        };

        inner
            .entry("_")
            .or_insert_with(|| json!("decryptedMessage"));
        inner.entry("ttl").or_insert_with(|| json!(0));
        if let Some(reply_to) = inner.get("reply_to_msg_id").cloned() {
            inner.insert("reply_to_random_id".to_string(), reply_to);
        }

        call.method = Method::SendEncrypted;
        call.args.insert("peer".to_string(), peer);
        call.args.insert("message".to_string(), Value::Object(inner));
        Ok(call)
    }
}

/// Upload pending media in `sendMultiMedia` albums.
///
/// Album items whose media is still an upload placeholder are uploaded
/// through the environment and replaced with the returned wire form, so
/// the serialized call only references uploaded media.
struct MultiMediaUploads;

#[async_trait(?Send)]
impl RewriteRule for MultiMediaUploads {
    fn name(&self) -> &'static str {
        "multi_media_uploads"
    }

    fn applies(&self, _env: &dyn NormalizeEnv, call: &MethodCall) -> bool {
        call.method == Method::SendMultiMedia
            && call
                .args
                .get("multi_media")
                .and_then(Value::as_array)
                .is_some_and(|items| {
                    items
                        .iter()
                        .any(|item| item.get("media").is_some_and(is_upload_placeholder))
                })
    }

    async fn apply(
        &self,
        env: &dyn NormalizeEnv,
        mut call: MethodCall,
    ) -> Result<MethodCall, NormalizeError> {
        let peer = call.args.get("peer").cloned();
        let Some(items) = call.args.get_mut("multi_media").and_then(Value::as_array_mut) else {
            return Ok(call);
        };

        for item in items.iter_mut() {
            let Some(media) = item
                .get("media")
                .filter(|media| is_upload_placeholder(media))
                .cloned()
            else {
                continue;
            };
            let uploaded = env.upload_media(peer.as_ref(), &media).await?;
            if let Some(entry) = item.as_object_mut() {
                entry.insert("media".to_string(), uploaded);
            }
        }
        Ok(call)
    }
}

/// Prepare file arguments on the encrypted-file methods.
///
/// Raw (non-object) file payloads are encrypted and uploaded first when
/// configuration allows it. Whatever `key`/`iv`/`size` the file object
/// carries is then mirrored into the message media, where the receiving
/// side checks the fingerprint.
struct EncryptedFileUploads;

#[async_trait(?Send)]
impl RewriteRule for EncryptedFileUploads {
    fn name(&self) -> &'static str {
        "encrypted_file_uploads"
    }

    fn applies(&self, _env: &dyn NormalizeEnv, call: &MethodCall) -> bool {
        matches!(
            call.method,
            Method::SendEncryptedFile | Method::UploadEncryptedFile
        ) && call.args.contains_key("file")
    }

    async fn apply(
        &self,
        env: &dyn NormalizeEnv,
        mut call: MethodCall,
    ) -> Result<MethodCall, NormalizeError> {
        let Some(file) = call.args.get("file").cloned() else {
            return Ok(call);
        };
        let file = if !file.is_object() && env.auto_upload() {
            let uploaded = env.upload_encrypted(&file).await?;
            call.args.insert("file".to_string(), uploaded.clone());
            uploaded
        } else {
            file
        };

        let mirrored: Vec<(&str, Value)> = ["key", "iv", "size"]
            .into_iter()
            .filter_map(|name| file.get(name).map(|value| (name, value.clone())))
            .collect();
        if mirrored.is_empty() {
            return Ok(call);
        }
        let Some(message) = ensure_object(&mut call.args, "message") else {
            return Ok(call);
        };
        let Some(media) = ensure_object(message, "media") else {
            return Ok(call);
        };
        for (name, value) in mirrored {
            media.insert(name.to_string(), value);
        }
        Ok(call)
    }
}

/// Resolve legacy chat identifiers to canonical basic-group ids.
///
/// Bot-API style negative ids and non-numeric identifiers go through the
/// environment resolver. An identifier that turns out not to be a basic
/// group is a usage error, never a silent retarget. `discardEncryption`
/// is exempt: its `chat_id` names a secret chat, not a group.
struct LegacyChatIds;

fn needs_chat_resolution(id: &Value) -> bool {
    match id {
        Value::Number(n) => n.as_i64().map_or(true, |id| id < 0),
        Value::String(s) => s.parse::<i64>().map_or(true, |id| id < 0),
        _ => true,
    }
}

#[async_trait(?Send)]
impl RewriteRule for LegacyChatIds {
    fn name(&self) -> &'static str {
        "legacy_chat_ids"
    }

    fn applies(&self, _env: &dyn NormalizeEnv, call: &MethodCall) -> bool {
        call.method != Method::DiscardEncryption
            && call.args.get("chat_id").is_some_and(needs_chat_resolution)
    }

    async fn apply(
        &self,
        env: &dyn NormalizeEnv,
        mut call: MethodCall,
    ) -> Result<MethodCall, NormalizeError> {
        let Some(id) = call.args.get("chat_id").cloned() else {
            return Ok(call);
        };
        let resolved = env.resolve_chat(&id).await?;
        if resolved.kind != PeerKind::Chat {
            return Err(NormalizeError::NotBasicGroup {
                kind: resolved.kind,
            });
        }
        call.args.insert("chat_id".to_string(), json!(resolved.id));
        Ok(call)
    }
}

/// Pick the right profile-photo method for the argument shape.
///
/// `updateProfilePhoto` takes an existing photo id and `uploadProfilePhoto`
/// takes a fresh file; callers mix them up, so each retargets to the other
/// when handed the other's argument.
struct ProfilePhotos;

#[async_trait(?Send)]
impl RewriteRule for ProfilePhotos {
    fn name(&self) -> &'static str {
        "profile_photos"
    }

    fn applies(&self, _env: &dyn NormalizeEnv, call: &MethodCall) -> bool {
        match call.method {
            Method::UpdateProfilePhoto => match call.args.get("id") {
                Some(id) => !id.is_object(),
                None => call.args.contains_key("file"),
            },
            Method::UploadProfilePhoto => match call.args.get("file") {
                Some(file) => {
                    file.is_object() && !matches!(obj_tag(file), Some("inputFile" | "inputFileBig"))
                }
                None => call.args.contains_key("id"),
            },
            _ => false,
        }
    }

    async fn apply(
        &self,
        _env: &dyn NormalizeEnv,
        mut call: MethodCall,
    ) -> Result<MethodCall, NormalizeError> {
        match call.method {
            Method::UpdateProfilePhoto => {
                if let Some(id) = call.args.get("id") {
                    if !id.is_object() {
                        if let Some(file) = call.args.remove("id") {
                            call.args.insert("file".to_string(), file);
                        }
                        call.method = Method::UploadProfilePhoto;
                    }
                } else if call.args.contains_key("file") {
                    call.method = Method::UploadProfilePhoto;
                }
            }
            Method::UploadProfilePhoto => match call.args.get("file") {
                Some(file)
                    if file.is_object()
                        && !matches!(obj_tag(file), Some("inputFile" | "inputFileBig")) =>
                {
                    // TODO: this branch reassigns the method to itself and
                    // looks like it should target photos.updateProfilePhoto;
                    // left untouched until the wire behavior is confirmed.
                    call.method = Method::UploadProfilePhoto;
                }
                None if call.args.contains_key("id") => {
                    call.method = Method::UpdateProfilePhoto;
                }
                _ => {}
            },
            _ => {}
        }
        Ok(call)
    }
}

/// Default the peer on `uploadMedia` for user accounts.
///
/// Users may omit the peer, in which case the media lands in their own
/// chat. Bots have no self chat, so for them the argument stays
/// mandatory.
struct DefaultSelfPeer;

#[async_trait(?Send)]
impl RewriteRule for DefaultSelfPeer {
    fn name(&self) -> &'static str {
        "default_self_peer"
    }

    fn applies(&self, env: &dyn NormalizeEnv, call: &MethodCall) -> bool {
        call.method == Method::UploadMedia && !call.args.contains_key("peer") && !env.is_bot()
    }

    async fn apply(
        &self,
        _env: &dyn NormalizeEnv,
        mut call: MethodCall,
    ) -> Result<MethodCall, NormalizeError> {
        call.args
            .insert("peer".to_string(), json!({"_": "inputPeerSelf"}));
        Ok(call)
    }
}

/// Carry deprecated `deleteUserHistory` calls onto the participant form.
///
/// The participant variant supersedes the user-only one; `user_id`
/// becomes `participant`.
struct ParticipantHistoryRename;

#[async_trait(?Send)]
impl RewriteRule for ParticipantHistoryRename {
    fn name(&self) -> &'static str {
        "participant_history_rename"
    }

    fn applies(&self, _env: &dyn NormalizeEnv, call: &MethodCall) -> bool {
        call.method == Method::DeleteUserHistory
    }

    async fn apply(
        &self,
        _env: &dyn NormalizeEnv,
        mut call: MethodCall,
    ) -> Result<MethodCall, NormalizeError> {
        call.method = Method::DeleteParticipantHistory;
        if let Some(user) = call.args.remove("user_id") {
            call.args.insert("participant".to_string(), user);
        }
        Ok(call)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use serde_json::json;

    use super::*;
    use crate::normalize::{Normalizer, ResolvedPeer};

    /// Environment fake with canned answers and call recording.
    struct StaticEnv {
        bot: bool,
        auto_upload: bool,
        resolve_to: Option<ResolvedPeer>,
        resolves: Cell<usize>,
        uploads: RefCell<Vec<Value>>,
    }

    impl StaticEnv {
        fn user() -> Self {
            Self {
                bot: false,
                auto_upload: true,
                resolve_to: Some(ResolvedPeer {
                    kind: PeerKind::Chat,
                    id: 44,
                }),
                resolves: Cell::new(0),
                uploads: RefCell::new(Vec::new()),
            }
        }

        fn bot() -> Self {
            Self {
                bot: true,
                ..Self::user()
            }
        }

        fn resolving_to(kind: PeerKind, id: i64) -> Self {
            Self {
                resolve_to: Some(ResolvedPeer { kind, id }),
                ..Self::user()
            }
        }

        fn without_auto_upload() -> Self {
            Self {
                auto_upload: false,
                ..Self::user()
            }
        }
    }

    #[async_trait(?Send)]
    impl NormalizeEnv for StaticEnv {
        fn is_bot(&self) -> bool {
            self.bot
        }

        fn auto_upload(&self) -> bool {
            self.auto_upload
        }

        async fn resolve_chat(&self, _id: &Value) -> Result<ResolvedPeer, NormalizeError> {
            self.resolves.set(self.resolves.get() + 1);
            self.resolve_to.ok_or_else(|| NormalizeError::Resolve {
                message: "no peer".to_string(),
            })
        }

        async fn upload_media(
            &self,
            _peer: Option<&Value>,
            media: &Value,
        ) -> Result<Value, NormalizeError> {
            self.uploads.borrow_mut().push(media.clone());
            Ok(json!({"_": "inputMediaPhoto", "id": 900}))
        }

        async fn upload_encrypted(&self, file: &Value) -> Result<Value, NormalizeError> {
            self.uploads.borrow_mut().push(file.clone());
            Ok(json!({
                "_": "inputEncryptedFile",
                "id": 901,
                "key": 7,
                "iv": 8,
                "size": 512,
            }))
        }
    }

    fn args(value: Value) -> Args {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    async fn run(env: &StaticEnv, method: Method, arguments: Value) -> MethodCall {
        Normalizer::new()
            .normalize(env, MethodCall::new(method, args(arguments)))
            .await
            .expect("normalize")
            .call
    }

    async fn run_err(env: &StaticEnv, method: Method, arguments: Value) -> NormalizeError {
        Normalizer::new()
            .normalize(env, MethodCall::new(method, args(arguments)))
            .await
            .expect_err("normalize should fail")
    }

    #[tokio::test]
    async fn invite_link_on_import_is_decoded() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::ImportChatInvite,
            json!({"hash": "https://t.me/joinchat/AbC-12"}),
        )
        .await;

        assert_eq!(call.method, Method::ImportChatInvite);
        assert_eq!(call.args["hash"], json!("AbC-12"));
    }

    #[tokio::test]
    async fn channel_link_on_import_becomes_join() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::ImportChatInvite,
            json!({"hash": "https://t.me/durov"}),
        )
        .await;

        assert_eq!(call.method, Method::JoinChannel);
        assert_eq!(call.args["channel"], json!("durov"));
        assert!(!call.args.contains_key("hash"));
    }

    #[tokio::test]
    async fn channel_link_on_check_is_an_error() {
        let env = StaticEnv::user();
        let err = run_err(
            &env,
            Method::CheckChatInvite,
            json!({"hash": "https://t.me/durov"}),
        )
        .await;

        assert_eq!(
            err,
            NormalizeError::NotInviteLink {
                link: "https://t.me/durov".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn invite_link_on_join_becomes_import() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::JoinChannel,
            json!({"channel": "t.me/+AbC-12"}),
        )
        .await;

        assert_eq!(call.method, Method::ImportChatInvite);
        assert_eq!(call.args["hash"], json!("AbC-12"));
        assert!(!call.args.contains_key("channel"));
    }

    #[tokio::test]
    async fn channel_link_on_join_is_decoded() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::JoinChannel,
            json!({"channel": "https://telegram.dog/durov"}),
        )
        .await;

        assert_eq!(call.method, Method::JoinChannel);
        assert_eq!(call.args["channel"], json!("durov"));
    }

    #[tokio::test]
    async fn secret_chat_send_is_wrapped() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::SendMessage,
            json!({
                "peer": {"_": "inputEncryptedChat", "chat_id": 5},
                "message": "hi",
                "reply_to_msg_id": 3,
            }),
        )
        .await;

        assert_eq!(call.method, Method::SendEncrypted);
        assert_eq!(call.args["peer"], json!({"_": "inputEncryptedChat", "chat_id": 5}));
        let message = call.args["message"].as_object().expect("message object");
        assert_eq!(message["_"], json!("decryptedMessage"));
        assert_eq!(message["message"], json!("hi"));
        assert_eq!(message["ttl"], json!(0));
        assert_eq!(message["reply_to_msg_id"], json!(3));
        assert_eq!(message["reply_to_random_id"], json!(3));
        assert!(!message.contains_key("peer"));
    }

    #[tokio::test]
    async fn secret_chat_ttl_is_kept_when_set() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::SendMessage,
            json!({
                "peer": {"_": "inputEncryptedChat", "chat_id": 5},
                "message": "hi",
                "ttl": 60,
            }),
        )
        .await;

        assert_eq!(call.args["message"]["ttl"], json!(60));
    }

    #[tokio::test]
    async fn album_placeholders_are_uploaded() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::SendMultiMedia,
            json!({
                "peer": {"_": "inputPeerSelf"},
                "multi_media": [
                    {"media": {"_": "inputMediaUploadedPhoto", "file": "a.jpg"}},
                    {"media": {"_": "inputMediaPhoto", "id": 11}},
                ],
            }),
        )
        .await;

        let items = call.args["multi_media"].as_array().expect("album items");
        assert_eq!(items[0]["media"], json!({"_": "inputMediaPhoto", "id": 900}));
        assert_eq!(items[1]["media"], json!({"_": "inputMediaPhoto", "id": 11}));
        assert_eq!(env.uploads.borrow().len(), 1);
    }

    #[tokio::test]
    async fn encrypted_raw_file_is_uploaded_and_mirrored() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::SendEncryptedFile,
            json!({
                "peer": {"_": "inputEncryptedChat", "chat_id": 5},
                "file": "photo.bin",
            }),
        )
        .await;

        assert_eq!(call.args["file"]["_"], json!("inputEncryptedFile"));
        assert_eq!(call.args["message"]["media"]["key"], json!(7));
        assert_eq!(call.args["message"]["media"]["iv"], json!(8));
        assert_eq!(call.args["message"]["media"]["size"], json!(512));
        assert_eq!(env.uploads.borrow().len(), 1);
    }

    #[tokio::test]
    async fn encrypted_raw_file_is_kept_without_auto_upload() {
        let env = StaticEnv::without_auto_upload();
        let call = run(
            &env,
            Method::SendEncryptedFile,
            json!({"file": "photo.bin"}),
        )
        .await;

        assert_eq!(call.args["file"], json!("photo.bin"));
        assert!(!call.args.contains_key("message"));
        assert!(env.uploads.borrow().is_empty());
    }

    #[tokio::test]
    async fn encrypted_file_object_mirrors_fingerprint_without_upload() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::UploadEncryptedFile,
            json!({
                "file": {"_": "inputEncryptedFileUploaded", "key": 1, "iv": 2},
                "message": {"media": {"_": "decryptedMessageMediaPhoto"}},
            }),
        )
        .await;

        assert_eq!(call.args["message"]["media"]["key"], json!(1));
        assert_eq!(call.args["message"]["media"]["iv"], json!(2));
        assert_eq!(
            call.args["message"]["media"]["_"],
            json!("decryptedMessageMediaPhoto")
        );
        assert!(env.uploads.borrow().is_empty());
    }

    #[tokio::test]
    async fn negative_chat_id_is_resolved() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::AddChatUser,
            json!({"chat_id": -5, "user_id": 9}),
        )
        .await;

        assert_eq!(call.args["chat_id"], json!(44));
        assert_eq!(env.resolves.get(), 1);
    }

    #[tokio::test]
    async fn textual_chat_id_is_resolved() {
        let env = StaticEnv::user();
        let call = run(&env, Method::AddChatUser, json!({"chat_id": "@group"})).await;

        assert_eq!(call.args["chat_id"], json!(44));
        assert_eq!(env.resolves.get(), 1);
    }

    #[tokio::test]
    async fn channel_chat_id_is_rejected() {
        let env = StaticEnv::resolving_to(PeerKind::Channel, 44);
        let err = run_err(&env, Method::AddChatUser, json!({"chat_id": -5})).await;

        assert_eq!(
            err,
            NormalizeError::NotBasicGroup {
                kind: PeerKind::Channel,
            }
        );
    }

    #[tokio::test]
    async fn positive_chat_id_passes_through() {
        let env = StaticEnv::user();
        let call = run(&env, Method::AddChatUser, json!({"chat_id": 7})).await;

        assert_eq!(call.args["chat_id"], json!(7));
        assert_eq!(env.resolves.get(), 0);
    }

    #[tokio::test]
    async fn discard_encryption_chat_id_is_exempt() {
        let env = StaticEnv::user();
        let call = run(&env, Method::DiscardEncryption, json!({"chat_id": -5})).await;

        assert_eq!(call.args["chat_id"], json!(-5));
        assert_eq!(env.resolves.get(), 0);
    }

    #[tokio::test]
    async fn raw_profile_photo_id_moves_to_upload() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::UpdateProfilePhoto,
            json!({"id": "photo-handle"}),
        )
        .await;

        assert_eq!(call.method, Method::UploadProfilePhoto);
        assert_eq!(call.args["file"], json!("photo-handle"));
        assert!(!call.args.contains_key("id"));
    }

    #[tokio::test]
    async fn update_with_file_moves_to_upload() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::UpdateProfilePhoto,
            json!({"file": {"_": "inputFile", "id": 3}}),
        )
        .await;

        assert_eq!(call.method, Method::UploadProfilePhoto);
        assert_eq!(call.args["file"], json!({"_": "inputFile", "id": 3}));
    }

    #[tokio::test]
    async fn upload_with_id_moves_to_update() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::UploadProfilePhoto,
            json!({"id": {"_": "inputPhoto", "id": 3}}),
        )
        .await;

        assert_eq!(call.method, Method::UpdateProfilePhoto);
        assert_eq!(call.args["id"], json!({"_": "inputPhoto", "id": 3}));
    }

    #[tokio::test]
    async fn upload_self_reassignment_changes_nothing() {
        let env = StaticEnv::user();
        let before = json!({"file": {"_": "inputMediaUploadedPhoto", "file": "a.jpg"}});
        let call = run(&env, Method::UploadProfilePhoto, before.clone()).await;

        assert_eq!(call.method, Method::UploadProfilePhoto);
        assert_eq!(Value::Object(call.args), before);
    }

    #[tokio::test]
    async fn upload_media_defaults_to_self_peer_for_users() {
        let env = StaticEnv::user();
        let call = run(&env, Method::UploadMedia, json!({"media": {"_": "inputMediaPhoto"}})).await;

        assert_eq!(call.args["peer"], json!({"_": "inputPeerSelf"}));
    }

    #[tokio::test]
    async fn upload_media_peer_stays_mandatory_for_bots() {
        let env = StaticEnv::bot();
        let call = run(&env, Method::UploadMedia, json!({"media": {"_": "inputMediaPhoto"}})).await;

        assert!(!call.args.contains_key("peer"));
    }

    #[tokio::test]
    async fn explicit_upload_media_peer_is_kept() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::UploadMedia,
            json!({"peer": {"_": "inputPeerChat", "chat_id": 4}}),
        )
        .await;

        assert_eq!(call.args["peer"], json!({"_": "inputPeerChat", "chat_id": 4}));
    }

    #[tokio::test]
    async fn delete_user_history_is_renamed() {
        let env = StaticEnv::user();
        let call = run(
            &env,
            Method::DeleteUserHistory,
            json!({"channel": {"_": "inputChannel", "channel_id": 2}, "user_id": 9}),
        )
        .await;

        assert_eq!(call.method, Method::DeleteParticipantHistory);
        assert_eq!(call.args["participant"], json!(9));
        assert!(!call.args.contains_key("user_id"));
    }
}
