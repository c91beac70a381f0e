// service.rs — StorageService: the operation facade.
//
// One StorageService serves every user. Each operation receives a `Caller`
// (user id + conversation id), opens the zones it needs for that caller,
// runs, writes one audit record and returns an `Envelope`. Nothing is cached
// between operations except the immutable policy tables and executor.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use zs_audit::{hasher, AuditEvent, AuditLog, AuditOutcome};
use zs_policy::CommandPolicy;
use zs_sandbox::{CommandExecutor, SandboxEnv};
use zs_versioned::VersionedZoneStore;
use zs_workspace::{Clock, EditZone, SystemClock, Zone, ZoneLayout, ZoneStore};

use crate::config::StorageConfig;
use crate::envelope::Envelope;
use crate::error::GatewayError;

/// Who is asking: the user owning the storage and the conversation the
/// request comes from (which scopes Uploads and names the edit session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub conversation_id: String,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

/// Audit label of an operation: the zone-qualified name plus its target.
#[derive(Debug, Clone)]
pub(crate) struct OpContext {
    operation: String,
    zone: Option<Zone>,
    target: Option<String>,
}

impl OpContext {
    pub(crate) fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            zone: None,
            target: None,
        }
    }

    /// `<zone>_<action>`, e.g. `storage_write`.
    pub(crate) fn in_zone(zone: Zone, action: &str) -> Self {
        Self {
            operation: format!("{}_{}", zone.as_str(), action),
            zone: Some(zone),
            target: None,
        }
    }

    pub(crate) fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// A successful operation's payload plus what the audit record should carry.
#[derive(Debug)]
pub(crate) struct Reply<T> {
    data: T,
    message: String,
    commit: Option<String>,
    content_hash: Option<String>,
    metadata: Value,
}

impl<T: Serialize> Reply<T> {
    pub(crate) fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            commit: None,
            content_hash: None,
            metadata: Value::Null,
        }
    }

    pub(crate) fn with_commit(mut self, commit: Option<String>) -> Self {
        self.commit = commit;
        self
    }

    pub(crate) fn with_content(mut self, content: &[u8]) -> Self {
        self.content_hash = Some(hasher::hash_bytes(content));
        self
    }

    pub(crate) fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Zoned user storage behind a uniform operation surface.
pub struct StorageService {
    config: StorageConfig,
    policy: CommandPolicy,
    executor: CommandExecutor,
    clock: Arc<dyn Clock>,
    audit: Option<Mutex<AuditLog>>,
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("storage_root", &self.config.storage_root)
            .field("audit", &self.audit.is_some())
            .finish()
    }
}

impl StorageService {
    /// Build the service: compile the command tables, prepare the executor
    /// and open the audit log.
    pub fn new(config: StorageConfig) -> Result<Self, GatewayError> {
        let policy = CommandPolicy::standard()?;
        // Lets a caller run `git commit` in Documents without a global identity.
        let env = SandboxEnv::from_host()
            .with_var("GIT_AUTHOR_NAME", config.commit.name.clone())
            .with_var("GIT_AUTHOR_EMAIL", config.commit.email.clone())
            .with_var("GIT_COMMITTER_NAME", config.commit.name.clone())
            .with_var("GIT_COMMITTER_EMAIL", config.commit.email.clone());
        let executor = CommandExecutor::new(config.exec_limits()).with_env(env);
        let audit = match config.audit_log_path() {
            Some(path) => Some(Mutex::new(AuditLog::open(path)?)),
            None => None,
        };
        tracing::info!(
            storage_root = %config.storage_root.display(),
            quota_mb = config.quota_per_user_mb,
            audit = audit.is_some(),
            "storage service ready"
        );
        Ok(Self {
            config,
            policy,
            executor,
            clock: Arc::new(SystemClock),
            audit,
        })
    }

    /// Replace the lock clock (used to simulate lock expiry).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn policy(&self) -> &CommandPolicy {
        &self.policy
    }

    pub(crate) fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    pub(crate) fn layout(&self, caller: &Caller) -> Result<ZoneLayout, GatewayError> {
        Ok(ZoneLayout::new(
            &self.config.storage_root,
            &caller.user_id,
            &caller.conversation_id,
        )?)
    }

    pub(crate) fn store(&self, caller: &Caller, zone: Zone) -> Result<ZoneStore, GatewayError> {
        Ok(ZoneStore::open(&self.layout(caller)?, zone, self.config.quota())?)
    }

    /// The caller's Documents zone, with its repository initialized.
    pub(crate) fn versioned(&self, caller: &Caller) -> Result<VersionedZoneStore, GatewayError> {
        let store = self.store(caller, Zone::Documents)?;
        self.versioned_from(store)
    }

    pub(crate) fn versioned_from(&self, store: ZoneStore) -> Result<VersionedZoneStore, GatewayError> {
        Ok(VersionedZoneStore::open(store, self.config.commit.clone())?)
    }

    pub(crate) fn editzone(&self, store: ZoneStore) -> Result<EditZone, GatewayError> {
        Ok(EditZone::new(
            store,
            self.config.lock_max_age_hours,
            Arc::clone(&self.clock),
        )?)
    }

    /// Turn an operation result into an envelope and record it.
    pub(crate) fn finish<T: Serialize>(
        &self,
        caller: &Caller,
        ctx: OpContext,
        result: Result<Reply<T>, GatewayError>,
    ) -> Envelope {
        match result {
            Ok(reply) => {
                let mut event = self.event(caller, &ctx, AuditOutcome::Success);
                if let Some(commit) = &reply.commit {
                    event = event.with_commit(commit.clone());
                }
                if let Some(hash) = &reply.content_hash {
                    event = event.with_content_hash(hash.clone());
                }
                if !reply.metadata.is_null() {
                    event = event.with_metadata(reply.metadata);
                }
                self.record(event);
                Ok::<_, GatewayError>((reply.data, reply.message)).into()
            }
            Err(err) => {
                let code = err.code();
                tracing::debug!(operation = %ctx.operation, code = %code, error = %err, "operation failed");
                let event = self
                    .event(caller, &ctx, AuditOutcome::for_error(code))
                    .with_error(code)
                    .with_metadata(serde_json::json!({ "message": err.to_string() }));
                self.record(event);
                Envelope::from_error(&err)
            }
        }
    }

    fn event(&self, caller: &Caller, ctx: &OpContext, outcome: AuditOutcome) -> AuditEvent {
        let mut event = AuditEvent::new(
            &caller.user_id,
            &caller.conversation_id,
            &ctx.operation,
            outcome,
        );
        if let Some(zone) = ctx.zone {
            event = event.with_zone(zone.as_str());
        }
        if let Some(target) = &ctx.target {
            event = event.with_target(target.clone());
        }
        event
    }

    /// Append to the audit log. A failed append is logged, not returned:
    /// the operation itself has already happened.
    fn record(&self, mut event: AuditEvent) {
        let Some(audit) = &self.audit else {
            return;
        };
        let mut log = match audit.lock() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = log.append(&mut event) {
            tracing::error!(operation = %event.operation, error = %e, "failed to write audit record");
        }
    }
}
