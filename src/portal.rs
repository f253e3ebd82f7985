//! Portal service: wires the components together
//!
//! Every operation takes an authenticated [`Actor`]. Activity events are
//! recorded after the operation commits and never affect its result.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::activity::{record_quietly, ActivityEvent, ActivityKind, ActivityLog, TracingActivityLog};
use crate::assignment::{AssignmentRouter, BulkItemResult};
use crate::auth::{Authenticator, TokenAuthenticator};
use crate::chat::{ChatService, PostMessage, SessionChange};
use crate::clock::Clock;
use crate::config::Config;
use crate::directory::{AccountDirectory, DirectoryService, InMemoryAccounts, OfficerPage};
use crate::error::{PortalError, PortalResult};
use crate::files::{upload_with_retry, FileStore, HttpFileStore, InMemoryFileStore, Upload};
use crate::models::{
    Actor, Attachment, Case, CaseFilter, CaseKind, CaseRef, ChatMessage, MessageCursor,
    Role, SessionView,
};
use crate::ratelimit::{CounterStore, InMemoryCounterStore, Quota, RateLimiter};
use crate::store::{CaseStore, NewCase, Transition};
use crate::unread::{UnreadEngine, UnreadSummary};

/// Collaborators a portal is built from.
pub struct PortalParts {
    pub clock: Arc<dyn Clock>,
    pub store: Arc<CaseStore>,
    pub auth: Arc<dyn Authenticator>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub files: Arc<dyn FileStore>,
    pub activity: Arc<dyn ActivityLog>,
    pub counters: Arc<dyn CounterStore>,
}

impl PortalParts {
    /// Default collaborators for `config`: token table auth, seeded
    /// accounts, in-process counters, tracing activity log, and the HTTP
    /// file store when `file_store.base_url` is set.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>, store: Arc<CaseStore>) -> Result<Self> {
        let auth = TokenAuthenticator::new(&config.credentials)?;
        let files: Arc<dyn FileStore> = match config.file_store.base_url {
            Some(ref base) => Arc::new(HttpFileStore::new(
                base,
                config.file_store.api_token.clone(),
                Duration::from_secs(config.file_store.timeout_secs),
            )?),
            None => {
                tracing::warn!("No file_store.base_url configured, keeping uploads in memory");
                Arc::new(InMemoryFileStore::new())
            }
        };
        Ok(Self {
            clock,
            store,
            auth: Arc::new(auth),
            accounts: Arc::new(InMemoryAccounts::new(config.accounts.clone())),
            files,
            activity: Arc::new(TracingActivityLog),
            counters: Arc::new(InMemoryCounterStore::new()),
        })
    }
}

pub struct Portal {
    clock: Arc<dyn Clock>,
    store: Arc<CaseStore>,
    auth: Arc<dyn Authenticator>,
    directory: Arc<DirectoryService>,
    router: AssignmentRouter,
    chat: ChatService,
    unread: UnreadEngine,
    limiter: RateLimiter,
    files: Arc<dyn FileStore>,
    activity: Arc<dyn ActivityLog>,
    directory_quota: Quota,
    unread_quota: Quota,
    max_upload_bytes: u64,
}

impl Portal {
    pub fn new(config: &Config, parts: PortalParts) -> Self {
        let directory = Arc::new(DirectoryService::new(
            parts.accounts,
            config.directory.clone(),
        ));
        let limits = &config.rate_limit;
        Self {
            router: AssignmentRouter::new(parts.store.clone(), directory.clone()),
            chat: ChatService::new(parts.store.clone()),
            unread: UnreadEngine::new(parts.store.clone()),
            limiter: RateLimiter::new(parts.counters, parts.clock.clone()),
            directory,
            clock: parts.clock,
            store: parts.store,
            auth: parts.auth,
            files: parts.files,
            activity: parts.activity,
            directory_quota: Quota::new(
                limits.directory_max_requests,
                Duration::from_secs(limits.directory_window_secs),
            ),
            unread_quota: Quota::new(
                limits.unread_max_requests,
                Duration::from_secs(limits.unread_window_secs),
            ),
            max_upload_bytes: config.file_store.max_upload_bytes,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn authenticate(&self, bearer: Option<&str>) -> PortalResult<Actor> {
        self.auth.authenticate(bearer)
    }

    fn record(&self, actor: &Actor, kind: ActivityKind, case: CaseRef, detail: Option<String>) {
        let mut event = ActivityEvent::new(&actor.id, kind, case, self.clock.now());
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        record_quietly(self.activity.as_ref(), event);
    }

    // -- Cases --

    pub fn create_case(&self, actor: &Actor, new: NewCase) -> PortalResult<Case> {
        let case = self.store.create_case(actor, new)?;
        self.record(actor, ActivityKind::CaseFiled, case.case_ref(), None);
        Ok(case)
    }

    pub fn get_case(&self, actor: &Actor, case: CaseRef) -> PortalResult<Case> {
        self.store.get_case(actor, case)
    }

    pub fn list_cases(&self, actor: &Actor, filter: &CaseFilter) -> PortalResult<Vec<Case>> {
        self.store.list_cases(actor, filter)
    }

    pub fn complete(
        &self,
        actor: &Actor,
        case: CaseRef,
        note: Option<String>,
        expected_version: Option<u64>,
    ) -> PortalResult<Transition> {
        let done = self.store.complete(actor, case, note, expected_version)?;
        self.record(
            actor,
            ActivityKind::CaseCompleted,
            case,
            done.case.resolution_note.clone(),
        );
        Ok(done)
    }

    pub fn reject(
        &self,
        actor: &Actor,
        case: CaseRef,
        note: &str,
        expected_version: Option<u64>,
    ) -> PortalResult<Transition> {
        let rejected = self.store.reject(actor, case, note, expected_version)?;
        self.record(
            actor,
            ActivityKind::CaseRejected,
            case,
            rejected.case.resolution_note.clone(),
        );
        Ok(rejected)
    }

    // -- Assignment --

    pub fn assign(
        &self,
        actor: &Actor,
        case: CaseRef,
        officer_id: &str,
        expected_version: Option<u64>,
    ) -> PortalResult<Case> {
        let assigned = self.router.assign(actor, case, officer_id, expected_version)?;
        self.record(
            actor,
            ActivityKind::CaseAssigned,
            case,
            Some(officer_id.to_string()),
        );
        Ok(assigned)
    }

    pub fn assign_bulk(
        &self,
        actor: &Actor,
        kind: CaseKind,
        case_ids: &[u64],
        officer_id: &str,
        atomic: bool,
    ) -> PortalResult<Vec<BulkItemResult>> {
        let results = self
            .router
            .assign_bulk(actor, kind, case_ids, officer_id, atomic)?;
        for item in results.iter().filter(|r| r.ok) {
            self.record(
                actor,
                ActivityKind::CaseAssigned,
                CaseRef::new(kind, item.case_id),
                Some(officer_id.to_string()),
            );
        }
        Ok(results)
    }

    // -- Directory --

    pub fn list_officers(
        &self,
        actor: &Actor,
        search: Option<&str>,
        page: Option<usize>,
        page_size: Option<usize>,
    ) -> PortalResult<OfficerPage> {
        self.limiter
            .enforce(&format!("officers:{}", actor.id), self.directory_quota)?;
        if !actor.role.can_route() {
            return Err(PortalError::permission(
                "the officer directory is for lead officers and admins",
            ));
        }
        self.directory.list_officers(search, page, page_size)
    }

    // -- Chat --

    pub fn post_message(
        &self,
        actor: &Actor,
        case: CaseRef,
        post: PostMessage,
    ) -> PortalResult<ChatMessage> {
        let message = self.chat.post_message(actor, case, post)?;
        self.record(
            actor,
            ActivityKind::MessagePosted,
            case,
            Some(message.message_type.as_str().to_string()),
        );
        Ok(message)
    }

    pub fn list_messages(
        &self,
        actor: &Actor,
        case: CaseRef,
        after: Option<MessageCursor>,
    ) -> PortalResult<Vec<ChatMessage>> {
        self.chat.list_messages(actor, case, after)
    }

    pub fn mark_read(&self, actor: &Actor, case: CaseRef) -> PortalResult<Option<MessageCursor>> {
        self.chat.mark_read(actor, case)
    }

    pub fn session(&self, actor: &Actor, case: CaseRef) -> PortalResult<SessionView> {
        self.chat.session(actor, case)
    }

    pub fn end_session(&self, actor: &Actor, case: CaseRef) -> PortalResult<SessionChange> {
        let change = self.chat.end_session(actor, case)?;
        self.record(actor, ActivityKind::SessionEnded, case, None);
        Ok(change)
    }

    pub fn resume_session(&self, actor: &Actor, case: CaseRef) -> PortalResult<SessionChange> {
        let change = self.chat.resume_session(actor, case)?;
        self.record(actor, ActivityKind::SessionResumed, case, None);
        Ok(change)
    }

    // -- Unread --

    pub fn unread_count(&self, actor: &Actor) -> PortalResult<UnreadSummary> {
        self.limiter
            .enforce(&format!("unread:{}", actor.id), self.unread_quota)?;
        self.unread.unread_for(actor)
    }

    // -- Files --

    pub async fn upload(&self, actor: &Actor, file: Upload) -> PortalResult<Attachment> {
        if actor.role == Role::System {
            return Err(PortalError::permission("system identity cannot upload"));
        }
        let attachment = upload_with_retry(self.files.as_ref(), file, self.max_upload_bytes).await?;
        tracing::debug!("{} uploaded {}", actor.id, attachment.url);
        Ok(attachment)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::activity::test_support::RecordingLog;
    use crate::auth::hash_token;
    use crate::clock::ManualClock;
    use crate::config::Credential;
    use crate::directory::test_support::seeded_accounts;

    pub struct Harness {
        pub portal: Arc<Portal>,
        pub clock: Arc<ManualClock>,
        pub activity: Arc<RecordingLog>,
    }

    /// (token, subject, role, name) for every test caller.
    pub const CALLERS: &[(&str, &str, Role, &str)] = &[
        ("t-warga", "warga-1", Role::Requester, "Budi Santoso"),
        ("t-warga2", "warga-2", Role::Requester, "Ani Lestari"),
        ("t-officer", "officer-01", Role::CaseOfficerTier1, "Petugas 01"),
        ("t-lead", "officer-03", Role::CaseOfficerLead, "Petugas 03"),
        ("t-admin", "admin", Role::Admin, "Admin PPID"),
    ];

    pub fn caller(token: &str) -> Actor {
        let (_, id, role, name) = CALLERS
            .iter()
            .find(|(t, ..)| *t == token)
            .copied()
            .unwrap();
        Actor::new(id, role, name)
    }

    pub fn harness_with(config: Config, failing_activity: bool) -> Harness {
        let clock = Arc::new(ManualClock::fixed());
        let store = Arc::new(CaseStore::new(clock.clone(), config.chat.evidence_window_days));
        let credentials: Vec<Credential> = CALLERS
            .iter()
            .map(|(token, id, role, name)| Credential {
                token_sha256: hash_token(token),
                subject_id: id.to_string(),
                role: *role,
                display_name: name.to_string(),
            })
            .collect();
        let activity = Arc::new(RecordingLog {
            fail: failing_activity,
            ..Default::default()
        });
        let parts = PortalParts {
            clock: clock.clone(),
            store,
            auth: Arc::new(TokenAuthenticator::new(&credentials).unwrap()),
            accounts: Arc::new(InMemoryAccounts::new(seeded_accounts())),
            files: Arc::new(InMemoryFileStore::new()),
            activity: activity.clone(),
            counters: Arc::new(InMemoryCounterStore::new()),
        };
        Harness {
            portal: Arc::new(Portal::new(&config, parts)),
            clock,
            activity,
        }
    }

    pub fn harness() -> Harness {
        harness_with(Config::default(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::models::{CaseStatus, MessageType};

    #[test]
    fn test_full_request_lifecycle() {
        let h = harness();
        let warga = caller("t-warga");
        let officer = caller("t-officer");
        let lead = caller("t-lead");

        let case = h
            .portal
            .create_case(&warga, NewCase::request("Dokumen AMDAL proyek jalan"))
            .unwrap()
            .case_ref();
        h.portal
            .post_message(&warga, case, PostMessage::text("Mohon dibantu"))
            .unwrap();
        h.portal.assign(&lead, case, "officer-01", None).unwrap();
        assert_eq!(h.portal.unread_count(&officer).unwrap().total, 1);

        h.portal
            .post_message(&officer, case, PostMessage::text("Sedang kami siapkan"))
            .unwrap();
        assert_eq!(h.portal.unread_count(&warga).unwrap().total, 1);

        let done = h
            .portal
            .complete(&officer, case, Some("Dokumen terlampir".into()), None)
            .unwrap();
        assert_eq!(done.case.status, CaseStatus::Completed);
        assert_eq!(done.notice.message_type, MessageType::System);

        let kinds = h.activity.kinds();
        assert_eq!(
            kinds,
            vec![
                ActivityKind::CaseFiled,
                ActivityKind::MessagePosted,
                ActivityKind::CaseAssigned,
                ActivityKind::MessagePosted,
                ActivityKind::CaseCompleted,
            ]
        );
    }

    #[test]
    fn test_activity_failure_does_not_fail_operation() {
        let h = harness_with(Config::default(), true);
        let warga = caller("t-warga");
        let case = h
            .portal
            .create_case(&warga, NewCase::request("Data kemiskinan"))
            .unwrap();
        assert_eq!(case.status, CaseStatus::Submitted);
        assert!(h.activity.kinds().is_empty());
    }

    #[test]
    fn test_directory_is_rate_limited_per_caller() {
        let mut config = Config::default();
        config.rate_limit.directory_max_requests = 2;
        let h = harness_with(config, false);
        let admin = caller("t-admin");
        let lead = caller("t-lead");

        h.portal.list_officers(&admin, None, None, None).unwrap();
        h.portal.list_officers(&admin, None, None, None).unwrap();
        match h.portal.list_officers(&admin, None, None, None) {
            Err(PortalError::RateLimited { reset_at, .. }) => {
                assert_eq!(reset_at, h.clock.now() + chrono::Duration::seconds(60));
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
        assert!(h.portal.list_officers(&lead, None, None, None).is_ok());

        h.clock.advance(chrono::Duration::seconds(60));
        assert!(h.portal.list_officers(&admin, None, None, None).is_ok());
    }

    #[test]
    fn test_directory_only_for_routing_roles() {
        let h = harness();
        for token in ["t-warga", "t-officer"] {
            assert!(matches!(
                h.portal.list_officers(&caller(token), None, None, None),
                Err(PortalError::PermissionDenied(_))
            ));
        }
    }

    #[test]
    fn test_unread_polling_is_rate_limited() {
        let mut config = Config::default();
        config.rate_limit.unread_max_requests = 1;
        let h = harness_with(config, false);
        let warga = caller("t-warga");
        h.portal.unread_count(&warga).unwrap();
        assert!(matches!(
            h.portal.unread_count(&warga),
            Err(PortalError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn test_upload_then_post_attachment() {
        let h = harness();
        let warga = caller("t-warga");
        let case = h
            .portal
            .create_case(&warga, NewCase::request("Salinan SK"))
            .unwrap()
            .case_ref();

        let attachment = h
            .portal
            .upload(
                &warga,
                Upload {
                    name: "ktp.jpg".into(),
                    content_type: Some("image/jpeg".into()),
                    bytes: vec![1, 2, 3, 4],
                },
            )
            .await
            .unwrap();
        let msg = h
            .portal
            .post_message(
                &warga,
                case,
                PostMessage {
                    body: "Identitas saya".into(),
                    attachments: vec![attachment.clone()],
                    message_type: MessageType::Text,
                },
            )
            .unwrap();
        assert_eq!(msg.attachments, vec![attachment]);
    }
}
