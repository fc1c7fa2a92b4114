// Cadence — Gateway Service
//
// The single process-wide object the transports talk to. It owns the vault,
// the audit log, and the knowledge retriever, and records one audit entry per
// tool invocation, failed attempts included. Handlers share it as
// `Arc<Gateway>`.

use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::access::{AccessPolicyResolver, PermissionGrant, RoleSet};
use crate::audit::{AuditEntry, ParamRedactor, UsageAuditLog, UsageSummary};
use crate::config::{CadenceConfig, VaultBackend};
use crate::enclave::{deployment_salt, CipherBox, MasterSecretSource};
use crate::error::{CadenceError, Result};
use crate::knowledge::{
    Answer, KnowledgeBase, KnowledgeItem, KnowledgeRetriever, LanguageModel, OpenAiChatModel,
};
use crate::store::{
    validate_owner, CredentialRepository, CredentialSummary, CredentialVault, Database,
    InMemoryCredentialRepository, SqliteCredentialRepository,
};

// ─── Caller ──────────────────────────────────────────────────────────────────

/// Who is calling: the owner whose data is touched and the roles the
/// transport vouched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub owner_id: String,
    pub roles: RoleSet,
}

impl Caller {
    pub fn new(owner_id: &str, roles: RoleSet) -> Result<Self> {
        validate_owner(owner_id).map_err(CadenceError::Validation)?;
        Ok(Self {
            owner_id: owner_id.to_string(),
            roles,
        })
    }
}

// ─── Gateway ─────────────────────────────────────────────────────────────────

pub struct Gateway {
    config: CadenceConfig,
    vault: Arc<CredentialVault>,
    audit: Arc<UsageAuditLog>,
    retriever: KnowledgeRetriever,
    resolver: AccessPolicyResolver,
}

impl Gateway {
    pub fn new(
        config: CadenceConfig,
        vault: Arc<CredentialVault>,
        audit: Arc<UsageAuditLog>,
        retriever: KnowledgeRetriever,
    ) -> Self {
        Self {
            config,
            vault,
            audit,
            retriever,
            resolver: AccessPolicyResolver::new(),
        }
    }

    /// Build everything from configuration, reading the master secret from
    /// the configured source.
    pub fn open(config: &CadenceConfig) -> Result<Self> {
        let source = config.secret_source();
        Self::open_with(config, source.as_ref(), None)
    }

    /// Like `open`, with an explicit secret source and optionally a model
    /// other than the configured HTTP client.
    pub fn open_with(
        config: &CadenceConfig,
        source: &dyn MasterSecretSource,
        model: Option<Arc<dyn LanguageModel>>,
    ) -> Result<Self> {
        let cipher = {
            let master = source.load()?;
            CipherBox::derive(
                &master,
                &deployment_salt(&config.kdf.deployment_id),
                &config.kdf.params,
            )?
        };

        let repo: Arc<dyn CredentialRepository> = match config.vault.backend {
            VaultBackend::Sqlite => {
                let path = config.database_path();
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Arc::new(SqliteCredentialRepository::new(Database::open(&path)?))
            }
            VaultBackend::Memory => Arc::new(InMemoryCredentialRepository::new()),
        };
        let vault = Arc::new(CredentialVault::new(cipher, repo));

        let audit = Arc::new(UsageAuditLog::new(
            config.audit.retention_cap,
            ParamRedactor::new(config.audit.redacted_fields.iter()),
        )?);

        let corpus = match &config.knowledge.corpus_path {
            Some(path) => KnowledgeBase::load(path)?,
            None => KnowledgeBase::builtin(),
        };

        let model: Arc<dyn LanguageModel> = match model {
            Some(model) => model,
            None => Arc::new(OpenAiChatModel::new(&config.llm.endpoint, &config.llm.model)),
        };

        let retriever = KnowledgeRetriever::new(
            Arc::new(corpus),
            vault.clone(),
            model,
            config.retriever_settings(),
        );

        tracing::info!(
            backend = ?config.vault.backend,
            secret_source = %source.describe(),
            "Gateway ready"
        );
        Ok(Self::new(config.clone(), vault, audit, retriever))
    }

    pub fn config(&self) -> &CadenceConfig {
        &self.config
    }

    pub fn vault(&self) -> &Arc<CredentialVault> {
        &self.vault
    }

    pub fn audit(&self) -> &Arc<UsageAuditLog> {
        &self.audit
    }

    /// Record the invocation, then hand back the operation's result. An
    /// operation failure wins over an audit failure.
    fn finish<T>(
        &self,
        caller: &Caller,
        tool: &str,
        mut params: Value,
        outcome: &str,
        result: Result<T>,
    ) -> Result<T> {
        if let Value::Object(map) = &mut params {
            map.insert("outcome".to_string(), Value::String(outcome.to_string()));
        }
        let recorded: Result<Uuid> = self
            .audit
            .record(&caller.owner_id, tool, &params, &caller.roles.tags())
            .map_err(CadenceError::from);
        let value = result?;
        recorded?;
        Ok(value)
    }

    fn outcome_of<T>(result: &Result<T>) -> &'static str {
        match result {
            Ok(_) => "ok",
            Err(e) if e.is_not_found() => "not_found",
            Err(e) if e.is_validation() => "invalid",
            Err(_) => "error",
        }
    }

    // ─── Vault tools ─────────────────────────────────────────────────────

    pub fn store_credential(&self, caller: &Caller, name: &str, secret: &str) -> Result<()> {
        let result = self
            .vault
            .store(&caller.owner_id, name, secret)
            .map_err(CadenceError::from);
        let outcome = Self::outcome_of(&result);
        self.finish(caller, "store_credential", json!({ "name": name }), outcome, result)
    }

    pub fn get_credential(&self, caller: &Caller, name: &str) -> Result<Zeroizing<String>> {
        let result = self
            .vault
            .get(&caller.owner_id, name)
            .map_err(CadenceError::from);
        let outcome = Self::outcome_of(&result);
        self.finish(caller, "get_credential", json!({ "name": name }), outcome, result)
    }

    pub fn list_credentials(&self, caller: &Caller) -> Result<Vec<CredentialSummary>> {
        let result = self
            .vault
            .list(&caller.owner_id)
            .map_err(CadenceError::from);
        let outcome = Self::outcome_of(&result);
        self.finish(caller, "list_credentials", json!({}), outcome, result)
    }

    pub fn delete_credential(&self, caller: &Caller, name: &str) -> Result<bool> {
        let result = self
            .vault
            .delete(&caller.owner_id, name)
            .map_err(CadenceError::from);
        let outcome = match &result {
            Ok(false) => "absent",
            other => Self::outcome_of(other),
        };
        self.finish(caller, "delete_credential", json!({ "name": name }), outcome, result)
    }

    // ─── Knowledge tools ─────────────────────────────────────────────────

    pub fn search_knowledge(&self, caller: &Caller, query: &str) -> Result<Vec<KnowledgeItem>> {
        let items = self.retriever.search(query, &caller.roles);
        let params = json!({ "query": query, "results": items.len() });
        self.finish(caller, "search_knowledge", params, "ok", Ok(items))
    }

    pub async fn ask(&self, caller: &Caller, question: &str) -> Result<Answer> {
        let result = self
            .retriever
            .answer(question, &caller.roles, &caller.owner_id)
            .await
            .map_err(CadenceError::from);
        let outcome = match &result {
            Ok(answer) => answer.outcome.as_str(),
            Err(_) => Self::outcome_of(&result),
        };
        self.finish(caller, "ask", json!({ "question": question }), outcome, result)
    }

    // ─── Access and usage tools ──────────────────────────────────────────

    pub fn permissions(&self, caller: &Caller) -> Result<PermissionGrant> {
        let grant = self.resolver.resolve_permissions(&caller.roles);
        self.finish(caller, "permissions", json!({}), "ok", Ok(grant))
    }

    /// The caller's last `limit` invocations, oldest first. Read before this
    /// call is recorded.
    pub fn recent_usage(&self, caller: &Caller, limit: usize) -> Result<Vec<AuditEntry>> {
        let entries = self.audit.recent(&caller.owner_id, limit);
        self.finish(caller, "recent_usage", json!({ "limit": limit }), "ok", Ok(entries))
    }

    pub fn usage_summary(&self, caller: &Caller) -> Result<UsageSummary> {
        let summary = self.audit.summarize(&caller.owner_id);
        self.finish(caller, "usage_summary", json!({}), "ok", Ok(summary))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::access::Role;
    use crate::enclave::{KdfParams, StaticSecretSource};
    use crate::knowledge::{AnswerOutcome, Prompt, UpstreamError};
    use async_trait::async_trait;

    pub(crate) struct EchoModel;

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn complete(&self, api_key: &str, prompt: &Prompt) -> std::result::Result<String, UpstreamError> {
            Ok(format!("answered '{}' with key of {} chars", prompt.question, api_key.len()))
        }
    }

    pub(crate) fn test_config() -> CadenceConfig {
        let mut config = CadenceConfig::default();
        config.vault.backend = VaultBackend::Memory;
        config.kdf.params = KdfParams::insecure_fast();
        config.kdf.deployment_id = "gateway-tests".to_string();
        config
    }

    pub(crate) fn test_gateway() -> Gateway {
        let source = StaticSecretSource::new(b"gateway-test-master-secret-0000".to_vec());
        Gateway::open_with(&test_config(), &source, Some(Arc::new(EchoModel))).unwrap()
    }

    fn student(owner: &str) -> Caller {
        Caller::new(owner, RoleSet::of(&[Role::Student])).unwrap()
    }

    #[test]
    fn test_caller_requires_owner() {
        let err = Caller::new("  ", RoleSet::empty()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_store_get_records_usage_without_secret() {
        let gateway = test_gateway();
        let caller = student("u1");

        gateway.store_credential(&caller, "llm-api", "sk-123").unwrap();
        assert_eq!(gateway.get_credential(&caller, "llm-api").unwrap().as_str(), "sk-123");

        let entries = gateway.audit().recent("u1", 10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].tool_name, "store_credential");
        assert_eq!(entries[1].tool_name, "get_credential");
        assert_eq!(entries[0].scopes, vec!["student"]);
        assert_eq!(entries[0].sanitized_params["outcome"], "ok");
        for entry in &entries {
            assert!(!entry.sanitized_params.to_string().contains("sk-123"));
        }
    }

    #[test]
    fn test_failed_attempts_are_recorded() {
        let gateway = test_gateway();
        let caller = student("u1");

        let err = gateway.get_credential(&caller, "missing").unwrap_err();
        assert!(err.is_not_found());
        let err = gateway.store_credential(&caller, "bad name", "x").unwrap_err();
        assert!(err.is_validation());

        let entries = gateway.audit().recent("u1", 10);
        assert_eq!(entries[0].sanitized_params["outcome"], "not_found");
        assert_eq!(entries[1].sanitized_params["outcome"], "invalid");
    }

    #[test]
    fn test_delete_is_idempotent() {
        let gateway = test_gateway();
        let caller = student("u1");
        gateway.store_credential(&caller, "calendar", "tok").unwrap();
        assert!(gateway.delete_credential(&caller, "calendar").unwrap());
        assert!(!gateway.delete_credential(&caller, "calendar").unwrap());
        assert!(gateway.list_credentials(&caller).unwrap().is_empty());
    }

    #[test]
    fn test_search_respects_roles() {
        let gateway = test_gateway();
        let student_hits = gateway.search_knowledge(&student("u1"), "").unwrap();
        assert!(student_hits
            .iter()
            .all(|i| matches!(i.tier, crate::access::Tier::Public | crate::access::Tier::Intermediate)));

        let admin = Caller::new("u2", RoleSet::of(&[Role::Admin])).unwrap();
        let admin_hits = gateway.search_knowledge(&admin, "").unwrap();
        assert!(admin_hits.len() > student_hits.len());
    }

    #[tokio::test]
    async fn test_ask_flow() {
        let gateway = test_gateway();
        let caller = student("u1");

        let answer = gateway.ask(&caller, "scales").await.unwrap();
        assert_eq!(answer.outcome, AnswerOutcome::MissingCredential);

        gateway.store_credential(&caller, "llm-api", "sk-123").unwrap();
        let answer = gateway.ask(&caller, "scales").await.unwrap();
        assert_eq!(answer.outcome, AnswerOutcome::Generated);
        assert_eq!(answer.text, "answered 'scales' with key of 6 chars");

        let summary = gateway.usage_summary(&caller).unwrap();
        assert_eq!(summary.per_tool_counts["ask"], 2);
        assert_eq!(summary.per_tool_counts["store_credential"], 1);
    }

    #[test]
    fn test_usage_tools_read_before_recording() {
        let gateway = test_gateway();
        let caller = student("u1");

        assert!(gateway.recent_usage(&caller, 5).unwrap().is_empty());
        let summary = gateway.usage_summary(&caller).unwrap();
        assert_eq!(summary.total_usage, 1);
        assert_eq!(summary.per_tool_counts["recent_usage"], 1);
    }

    #[test]
    fn test_permissions() {
        let gateway = test_gateway();
        let grant = gateway.permissions(&student("u1")).unwrap();
        assert!(grant.can_view_own_progress);
        assert!(!grant.can_view_students);
    }

    #[test]
    fn test_open_with_sqlite_backend_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.vault.backend = VaultBackend::Sqlite;
        config.data_dir = dir.path().join("data");
        let source = StaticSecretSource::new(b"gateway-test-master-secret-0000".to_vec());

        {
            let gateway = Gateway::open_with(&config, &source, Some(Arc::new(EchoModel))).unwrap();
            gateway
                .store_credential(&student("u1"), "llm-api", "sk-123")
                .unwrap();
        }

        let gateway = Gateway::open_with(&config, &source, Some(Arc::new(EchoModel))).unwrap();
        assert_eq!(
            gateway
                .get_credential(&student("u1"), "llm-api")
                .unwrap()
                .as_str(),
            "sk-123"
        );
        assert!(config.database_path().exists());
    }

    #[test]
    fn test_open_rejects_weak_master_secret() {
        let source = StaticSecretSource::new(b"short".to_vec());
        let err = Gateway::open_with(&test_config(), &source, Some(Arc::new(EchoModel)))
            .err()
            .unwrap();
        assert!(matches!(err, CadenceError::Enclave(_)));
    }
}
