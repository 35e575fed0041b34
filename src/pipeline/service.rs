//! Asset lifecycle pipeline
//!
//! Registration runs three strictly sequential stages:
//! 1. Hashing: fingerprint the original bytes (no fallback)
//! 2. Uploading: put the bytes in the content store (optional synthetic fallback)
//! 3. Registering: record the asset on the ledger and wait for its id
//!
//! A failed stage aborts the run; nothing after it is attempted.

use std::sync::Arc;

use crate::config::Config;
use crate::fingerprint::fingerprint;
use crate::ledger::{Asset, AssetId, LedgerError, LedgerOperation, RegisterRequest};
use crate::session::LedgerContext;
use crate::store::{ContentAddress, ContentStore, MockStore, UploadMetadata};

use super::lock::SubmissionLock;
use super::runs::RunTracker;
use super::types::{
    AssetContent, AssetSubmission, OperationError, PipelineError, PipelineRun,
    RegistrationOutcome, RunState, Stage, StageError, TransferOutcome, ValidationError,
    VerificationError, VerificationOutcome,
};
use super::validate::{parse_transfer_target, require_text, validate_submission};

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Fall back to synthetic addresses when the content store fails
    pub mock_fallback: bool,
    pub max_file_size: u64,
    pub gateway_url: String,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mock_fallback: config.store.mock_fallback,
            max_file_size: config.limits.max_file_size,
            gateway_url: config.store.gateway_url.clone(),
        }
    }
}

/// Registers, verifies and transfers assets
#[derive(Clone)]
pub struct AssetPipeline {
    inner: Arc<AssetPipelineInner>,
}

struct AssetPipelineInner {
    store: Arc<dyn ContentStore>,
    fallback: Option<MockStore>,
    ledger: LedgerContext,
    lock: SubmissionLock,
    runs: RunTracker,
    max_file_size: u64,
}

impl AssetPipeline {
    pub fn new(store: Arc<dyn ContentStore>, ledger: LedgerContext, options: PipelineOptions) -> Self {
        let fallback = options
            .mock_fallback
            .then(|| MockStore::new(options.gateway_url.clone()));

        Self {
            inner: Arc::new(AssetPipelineInner {
                store,
                fallback,
                ledger,
                lock: SubmissionLock::new(),
                runs: RunTracker::default(),
                max_file_size: options.max_file_size,
            }),
        }
    }

    pub fn ledger(&self) -> &LedgerContext {
        &self.inner.ledger
    }

    pub fn runs(&self) -> &RunTracker {
        &self.inner.runs
    }

    /// Fetchable URL for a content address
    pub fn resolve(&self, address: &ContentAddress) -> String {
        self.inner.store.resolve(address)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Run the full registration protocol for one submission
    pub async fn register(&self, submission: AssetSubmission) -> Result<RegistrationOutcome, PipelineError> {
        validate_submission(&submission, self.inner.max_file_size)?;

        let ctx = &self.inner.ledger;
        ctx.require(LedgerOperation::Register)
            .map_err(PipelineError::NotReady)?;
        let owner = ctx.session().require_account().map_err(PipelineError::NotReady)?;

        let mut run = self
            .inner
            .runs
            .track(PipelineRun::new(&submission.name, &submission.description));

        tracing::info!(
            run_id = %run.id,
            owner = %owner,
            file_name = %submission.file_name,
            "Registration started"
        );

        // Stage 1: fingerprint the original bytes
        self.transition(&mut run, RunState::Hashing);
        let max = self.inner.max_file_size;
        let size = match submission.content.size().await {
            Ok(size) => size,
            Err(e) => return Err(self.fail(&mut run, Stage::Hashing, e.into())),
        };
        if size > max {
            let e = ValidationError::FileTooLarge { size, max };
            return Err(self.fail(&mut run, Stage::Hashing, e.into()));
        }
        let data = match submission.content.read_limited(max).await {
            Ok(data) => data,
            Err(e) => return Err(self.fail(&mut run, Stage::Hashing, e.into())),
        };
        if data.len() as u64 > max {
            let e = ValidationError::FileTooLarge {
                size: data.len() as u64,
                max,
            };
            return Err(self.fail(&mut run, Stage::Hashing, e.into()));
        }
        let fp = fingerprint(&data);
        run.draft.fingerprint = Some(fp.clone());
        tracing::debug!(run_id = %run.id, fingerprint = %fp.short(10), "Fingerprint computed");

        let _guard = match self.inner.lock.try_acquire(&owner, &fp, run.id) {
            Some(guard) => guard,
            None => {
                let e = ValidationError::DuplicateSubmission;
                return Err(self.fail(&mut run, Stage::Hashing, e.into()));
            }
        };

        // Known content is refused before anything is pinned
        if ctx.capabilities().supports(LedgerOperation::IsFingerprintRegistered) {
            match ctx.ledger().is_fingerprint_registered(&fp).await {
                Ok(false) => {}
                Ok(true) => {
                    let e = LedgerError::AlreadyRegistered(format!("fingerprint {}", fp));
                    return Err(self.fail(&mut run, Stage::Hashing, e.into()));
                }
                Err(e) => return Err(self.fail(&mut run, Stage::Hashing, e.into())),
            }
        }

        // Stage 2: content store
        self.transition(&mut run, RunState::Uploading);
        let metadata = UploadMetadata {
            file_name: submission.file_name.clone(),
            content_type: submission.content_type.clone(),
            description: submission.description.clone(),
        };
        let address = match self.inner.store.put(&data, &metadata).await {
            Ok(address) => address,
            Err(e) => match &self.inner.fallback {
                Some(mock) => {
                    tracing::warn!(run_id = %run.id, error = %e, "Content store failed, using synthetic address");
                    run.warnings.push(format!(
                        "Content store unavailable ({}); asset registered with a synthetic address",
                        e
                    ));
                    mock.put(&data, &metadata)
                        .await
                        .map_err(|e| self.fail(&mut run, Stage::Uploading, e.into()))?
                }
                None => return Err(self.fail(&mut run, Stage::Uploading, e.into())),
            },
        };
        let synthetic = address.is_synthetic();
        if synthetic && run.warnings.is_empty() {
            run.warnings
                .push("Content store is offline; address is synthetic".to_string());
        }
        run.draft.content_address = Some(address.clone());
        tracing::info!(run_id = %run.id, content_address = %address, synthetic, "Content stored");

        // Stage 3: ledger registration
        self.transition(&mut run, RunState::Registering);
        if ctx.capabilities().supports(LedgerOperation::IsAddressRegistered) {
            match ctx.ledger().is_address_registered(&address).await {
                Ok(false) => {}
                Ok(true) => {
                    let e = LedgerError::AlreadyRegistered(format!("content address {}", address));
                    return Err(self.fail(&mut run, Stage::Registering, e.into()));
                }
                Err(e) => return Err(self.fail(&mut run, Stage::Registering, e.into())),
            }
        }
        let request = RegisterRequest {
            name: submission.name.clone(),
            description: submission.description.clone(),
            content_address: address.clone(),
            fingerprint: fp.clone(),
        };
        let receipt = ctx
            .ledger()
            .register(&owner, &request)
            .await
            .map_err(|e| self.fail(&mut run, Stage::Registering, e.into()))?;
        let asset_id = receipt
            .registered_asset_id()
            .ok_or_else(|| self.fail(&mut run, Stage::Registering, LedgerError::MissingConfirmation.into()))?;

        self.transition(&mut run, RunState::Completed { asset_id });
        tracing::info!(
            run_id = %run.id,
            asset_id = %asset_id,
            transaction_id = %receipt.transaction_id,
            "Asset registered"
        );

        let outcome = RegistrationOutcome {
            run_id: run.id,
            asset_id,
            owner,
            gateway_url: self.resolve(&address),
            content_address: address,
            fingerprint: fp,
            synthetic,
            transaction_id: receipt.transaction_id,
            warnings: run.warnings.clone(),
        };
        Ok(outcome)
    }

    fn transition(&self, run: &mut PipelineRun, next: RunState) {
        if let Err(e) = run.advance(next) {
            tracing::error!(run_id = %run.id, error = %e, "Rejected run transition");
        }
        self.inner.runs.record(run);
    }

    fn fail(&self, run: &mut PipelineRun, stage: Stage, cause: StageError) -> PipelineError {
        tracing::warn!(run_id = %run.id, stage = %stage, error = %cause, "Pipeline stage failed");
        self.transition(
            run,
            RunState::Failed {
                stage,
                cause: cause.to_string(),
            },
        );
        PipelineError::Failed { stage, cause }
    }

    // ========================================================================
    // Verification
    // ========================================================================

    /// Check a presented file against the fingerprint the ledger holds
    ///
    /// The comparison is made by the ledger; a missing asset or unreachable
    /// ledger is inconclusive, never a negative verdict.
    pub async fn verify(
        &self,
        asset_id: AssetId,
        content: AssetContent,
    ) -> Result<VerificationOutcome, VerificationError> {
        let ctx = &self.inner.ledger;
        let inconclusive = |reason: String| VerificationError::Inconclusive { asset_id, reason };

        ctx.require(LedgerOperation::GetDetails)
            .and_then(|_| ctx.require(LedgerOperation::VerifyIntegrity))
            .map_err(|e| inconclusive(e.to_string()))?;

        let asset = ctx
            .ledger()
            .get_details(asset_id)
            .await
            .map_err(|e| inconclusive(e.to_string()))?;

        let data = content.read().await?;
        let fp = fingerprint(&data);

        let success = ctx
            .ledger()
            .verify_integrity(asset_id, &fp)
            .await
            .map_err(|e| inconclusive(e.to_string()))?;

        tracing::info!(asset_id = %asset_id, success, fingerprint = %fp.short(10), "Verification complete");

        let message = if success {
            "Verification successful: the file matches the registered asset"
        } else {
            "Verification failed: the file has been modified or is not the original"
        };

        Ok(VerificationOutcome {
            asset_id,
            success,
            fingerprint: fp,
            stored_fingerprint: asset.fingerprint,
            message: message.to_string(),
        })
    }

    // ========================================================================
    // Ownership and Metadata
    // ========================================================================

    /// Transfer an asset owned by the connected account
    pub async fn transfer(&self, asset_id: AssetId, new_owner: &str) -> Result<TransferOutcome, OperationError> {
        let new_owner = parse_transfer_target(new_owner)?;

        let ctx = &self.inner.ledger;
        ctx.require(LedgerOperation::Transfer)?;
        let caller = ctx.session().require_account()?;
        if caller == new_owner {
            return Err(ValidationError::SelfTransfer.into());
        }

        let receipt = ctx.ledger().transfer(&caller, asset_id, &new_owner).await?;
        if !receipt.has_transfer_of(asset_id) {
            return Err(LedgerError::MissingConfirmation.into());
        }

        tracing::info!(
            asset_id = %asset_id,
            from = %caller,
            to = %new_owner,
            transaction_id = %receipt.transaction_id,
            "Asset transferred"
        );

        Ok(TransferOutcome {
            asset_id,
            from: caller,
            to: new_owner,
            transaction_id: receipt.transaction_id,
        })
    }

    /// Replace the name and description of an owned asset
    pub async fn update_metadata(
        &self,
        asset_id: AssetId,
        name: &str,
        description: &str,
    ) -> Result<Asset, OperationError> {
        require_text("name", name)?;
        require_text("description", description)?;

        let ctx = &self.inner.ledger;
        ctx.require(LedgerOperation::UpdateMetadata)?;
        let caller = ctx.session().require_account()?;

        ctx.ledger()
            .update_metadata(&caller, asset_id, name.trim(), description.trim())
            .await?;
        tracing::info!(asset_id = %asset_id, "Asset metadata updated");

        Ok(self.details(asset_id).await?)
    }

    pub async fn details(&self, asset_id: AssetId) -> Result<Asset, LedgerError> {
        self.inner.ledger.require(LedgerOperation::GetDetails)?;
        self.inner.ledger.ledger().get_details(asset_id).await
    }

    pub async fn total_assets(&self) -> Result<u64, LedgerError> {
        self.inner.ledger.require(LedgerOperation::TotalAssets)?;
        self.inner.ledger.ledger().total_assets().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::fingerprint::Fingerprint;
    use crate::ledger::{
        AccountAddress, Capabilities, Ledger, MemoryLedger, Receipt,
    };
    use crate::session::AccountSession;
    use crate::store::{FailingStore, StoreError};

    use super::super::runs::ABANDONED;

    /// Memory ledger that counts mutating calls
    struct RecordingLedger {
        inner: MemoryLedger,
        register_calls: AtomicUsize,
        transfer_calls: AtomicUsize,
        drop_events: AtomicBool,
    }

    impl RecordingLedger {
        fn new(inner: MemoryLedger) -> Arc<Self> {
            Arc::new(Self {
                inner,
                register_calls: AtomicUsize::new(0),
                transfer_calls: AtomicUsize::new(0),
                drop_events: AtomicBool::new(false),
            })
        }

        fn registers(&self) -> usize {
            self.register_calls.load(Ordering::SeqCst)
        }

        fn transfers(&self) -> usize {
            self.transfer_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Ledger for RecordingLedger {
        async fn capabilities(&self) -> Result<Capabilities, LedgerError> {
            self.inner.capabilities().await
        }

        async fn register(
            &self,
            caller: &AccountAddress,
            request: &RegisterRequest,
        ) -> Result<Receipt, LedgerError> {
            self.register_calls.fetch_add(1, Ordering::SeqCst);
            let mut receipt = self.inner.register(caller, request).await?;
            if self.drop_events.load(Ordering::SeqCst) {
                receipt.events.clear();
            }
            Ok(receipt)
        }

        async fn transfer(
            &self,
            caller: &AccountAddress,
            asset_id: AssetId,
            new_owner: &AccountAddress,
        ) -> Result<Receipt, LedgerError> {
            self.transfer_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.transfer(caller, asset_id, new_owner).await
        }

        async fn update_metadata(
            &self,
            caller: &AccountAddress,
            asset_id: AssetId,
            name: &str,
            description: &str,
        ) -> Result<Receipt, LedgerError> {
            self.inner.update_metadata(caller, asset_id, name, description).await
        }

        async fn get_details(&self, asset_id: AssetId) -> Result<Asset, LedgerError> {
            self.inner.get_details(asset_id).await
        }

        async fn assets_by_owner(&self, owner: &AccountAddress) -> Result<Vec<AssetId>, LedgerError> {
            self.inner.assets_by_owner(owner).await
        }

        async fn verify_integrity(&self, asset_id: AssetId, fp: &Fingerprint) -> Result<bool, LedgerError> {
            self.inner.verify_integrity(asset_id, fp).await
        }

        async fn total_assets(&self) -> Result<u64, LedgerError> {
            self.inner.total_assets().await
        }

        async fn is_address_registered(&self, address: &ContentAddress) -> Result<bool, LedgerError> {
            self.inner.is_address_registered(address).await
        }

        async fn is_fingerprint_registered(&self, fp: &Fingerprint) -> Result<bool, LedgerError> {
            self.inner.is_fingerprint_registered(fp).await
        }
    }

    /// Store that hands out a fixed real-looking address per call
    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentStore for CountingStore {
        async fn put(&self, data: &[u8], _metadata: &UploadMetadata) -> Result<ContentAddress, StoreError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ContentAddress::new(format!("Qm{}{}", n, fingerprint(data).short(16))))
        }

        fn resolve(&self, address: &ContentAddress) -> String {
            crate::store::gateway_url("https://gateway.pinata.cloud", address)
        }
    }

    fn alice() -> AccountAddress {
        AccountAddress::parse(&format!("0x{}", "1".repeat(40))).unwrap()
    }

    fn fixture() -> Vec<u8> {
        (0..100u8).collect()
    }

    fn submission(data: Vec<u8>) -> AssetSubmission {
        AssetSubmission {
            name: "Cosmic Horizon".to_string(),
            description: "Artwork".to_string(),
            file_name: "horizon.png".to_string(),
            content_type: "image/png".to_string(),
            content: AssetContent::Bytes(data),
        }
    }

    fn options(mock_fallback: bool) -> PipelineOptions {
        PipelineOptions {
            mock_fallback,
            max_file_size: 10 * 1024 * 1024,
            gateway_url: "https://gateway.pinata.cloud".to_string(),
        }
    }

    async fn pipeline_with(
        store: Arc<dyn ContentStore>,
        ledger: Arc<RecordingLedger>,
        mock_fallback: bool,
        connected: bool,
    ) -> AssetPipeline {
        let session = AccountSession::new("local");
        if connected {
            session.connect(alice());
        }
        let ctx = LedgerContext::connect(ledger, session).await.unwrap();
        AssetPipeline::new(store, ctx, options(mock_fallback))
    }

    async fn pipeline() -> (AssetPipeline, Arc<RecordingLedger>) {
        let ledger = RecordingLedger::new(MemoryLedger::new());
        let store = Arc::new(CountingStore { calls: AtomicUsize::new(0) });
        (pipeline_with(store, ledger.clone(), false, true).await, ledger)
    }

    #[tokio::test]
    async fn test_register_then_verify_round_trip() {
        let (pipeline, _) = pipeline().await;
        let outcome = pipeline.register(submission(fixture())).await.unwrap();

        assert_eq!(outcome.asset_id, AssetId(1));
        assert!(!outcome.synthetic);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.fingerprint, fingerprint(&fixture()));

        let verdict = pipeline
            .verify(outcome.asset_id, AssetContent::Bytes(fixture()))
            .await
            .unwrap();
        assert!(verdict.success);
        assert_eq!(verdict.fingerprint, fingerprint(&fixture()));
        assert_eq!(verdict.stored_fingerprint, fingerprint(&fixture()).as_str());

        let run = pipeline.runs().get(&outcome.run_id).unwrap();
        assert_eq!(run.state, RunState::Completed { asset_id: AssetId(1) });
        assert!(!run.draft.pending);
    }

    #[tokio::test]
    async fn test_tampered_file_fails_verification() {
        let (pipeline, _) = pipeline().await;
        let outcome = pipeline.register(submission(fixture())).await.unwrap();

        let mut tampered = fixture();
        tampered[99] = tampered[99].wrapping_add(1);

        let verdict = pipeline
            .verify(outcome.asset_id, AssetContent::Bytes(tampered))
            .await
            .unwrap();
        assert!(!verdict.success);
        assert_ne!(verdict.fingerprint.as_str(), verdict.stored_fingerprint);
    }

    #[tokio::test]
    async fn test_missing_asset_is_inconclusive() {
        let (pipeline, _) = pipeline().await;
        let result = pipeline
            .verify(AssetId(404), AssetContent::Bytes(fixture()))
            .await;
        assert!(matches!(
            result,
            Err(VerificationError::Inconclusive { asset_id: AssetId(404), .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_ledger_is_inconclusive() {
        let (pipeline, ledger) = pipeline().await;
        let outcome = pipeline.register(submission(fixture())).await.unwrap();

        ledger.inner.set_reachable(false);
        let result = pipeline
            .verify(outcome.asset_id, AssetContent::Bytes(fixture()))
            .await;
        assert!(matches!(result, Err(VerificationError::Inconclusive { .. })));
    }

    #[tokio::test]
    async fn test_store_failure_aborts_before_ledger() {
        let ledger = RecordingLedger::new(MemoryLedger::new());
        let pipeline = pipeline_with(Arc::new(FailingStore), ledger.clone(), false, true).await;

        let err = pipeline.register(submission(fixture())).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Uploading));
        assert!(matches!(
            err,
            PipelineError::Failed { cause: StageError::Store(_), .. }
        ));
        assert_eq!(ledger.registers(), 0);
        assert_eq!(pipeline.ledger().ledger().total_assets().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_with_fallback_is_flagged() {
        let ledger = RecordingLedger::new(MemoryLedger::new());
        let pipeline = pipeline_with(Arc::new(FailingStore), ledger.clone(), true, true).await;

        let outcome = pipeline.register(submission(fixture())).await.unwrap();
        assert!(outcome.synthetic);
        assert!(outcome.content_address.is_synthetic());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.gateway_url.starts_with("https://picsum.photos/seed/mock-ipfs-"));
        assert_eq!(ledger.registers(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_hashing_stage() {
        let (pipeline, ledger) = pipeline().await;
        let mut s = submission(vec![]);
        s.content = AssetContent::File("/nonexistent/horizon.png".into());

        let err = pipeline.register(s).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Hashing));
        assert!(matches!(
            err,
            PipelineError::Failed { cause: StageError::Read(_), .. }
        ));
        assert_eq!(ledger.registers(), 0);
    }

    #[tokio::test]
    async fn test_not_connected_rejected_up_front() {
        let ledger = RecordingLedger::new(MemoryLedger::new());
        let store = Arc::new(CountingStore { calls: AtomicUsize::new(0) });
        let pipeline = pipeline_with(store.clone(), ledger.clone(), false, false).await;

        let err = pipeline.register(submission(fixture())).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotReady(LedgerError::NotConnected)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.registers(), 0);
    }

    #[tokio::test]
    async fn test_missing_confirmation_is_fatal() {
        let (pipeline, ledger) = pipeline().await;
        ledger.drop_events.store(true, Ordering::SeqCst);

        let err = pipeline.register(submission(fixture())).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Registering));
        assert!(matches!(
            err,
            PipelineError::Failed {
                cause: StageError::Ledger(LedgerError::MissingConfirmation),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_ledger_rejection_keeps_cause() {
        // Without the lookup entry points the duplicate reaches the ledger
        let mut caps = Capabilities::all(1);
        caps.operations.remove(&LedgerOperation::IsFingerprintRegistered);
        caps.operations.remove(&LedgerOperation::IsAddressRegistered);
        let ledger = RecordingLedger::new(MemoryLedger::with_options(caps, Duration::ZERO));
        let store = Arc::new(CountingStore { calls: AtomicUsize::new(0) });
        let pipeline = pipeline_with(store, ledger.clone(), false, true).await;
        pipeline.register(submission(fixture())).await.unwrap();

        let err = pipeline.register(submission(fixture())).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Registering));
        let message = err.to_string();
        assert!(message.starts_with("Ledger registration stage failed"));
        assert!(message.contains("fingerprint"));
        assert_eq!(ledger.registers(), 2);
    }

    #[tokio::test]
    async fn test_registered_content_not_pinned_again() {
        let ledger = RecordingLedger::new(MemoryLedger::new());
        let store = Arc::new(CountingStore { calls: AtomicUsize::new(0) });
        let pipeline = pipeline_with(store.clone(), ledger.clone(), false, true).await;
        pipeline.register(submission(fixture())).await.unwrap();

        let err = pipeline.register(submission(fixture())).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Hashing));
        assert!(matches!(
            err,
            PipelineError::Failed {
                cause: StageError::Ledger(LedgerError::AlreadyRegistered(_)),
                ..
            }
        ));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.registers(), 1);
        assert!(pipeline.runs().active().is_empty());
    }

    #[tokio::test]
    async fn test_file_over_limit_rejected_before_read() {
        let (pipeline, ledger) = pipeline().await;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &vec![7u8; 64]).unwrap();

        let mut s = submission(vec![]);
        s.content = AssetContent::File(file.path().to_path_buf());
        let small = AssetPipeline::new(
            Arc::new(CountingStore { calls: AtomicUsize::new(0) }),
            pipeline.ledger().clone(),
            PipelineOptions {
                max_file_size: 16,
                ..options(false)
            },
        );

        let err = small.register(s).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Hashing));
        assert!(matches!(
            err,
            PipelineError::Failed {
                cause: StageError::Validation(ValidationError::FileTooLarge { size: 64, max: 16 }),
                ..
            }
        ));
        assert_eq!(ledger.registers(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_registration_is_abandoned() {
        let inner = MemoryLedger::with_options(Capabilities::all(1), Duration::from_millis(200));
        let ledger = RecordingLedger::new(inner);
        let store = Arc::new(CountingStore { calls: AtomicUsize::new(0) });
        let pipeline = pipeline_with(store, ledger.clone(), false, true).await;

        let mut pending = Box::pin(pipeline.register(submission(fixture())));
        let timed_out = tokio::time::timeout(Duration::from_millis(20), &mut pending).await;
        assert!(timed_out.is_err());

        let active = pipeline.runs().active();
        assert_eq!(active.len(), 1);
        let run_id = active[0].id;
        assert_eq!(active[0].state, RunState::Registering);

        drop(pending);
        assert!(pipeline.runs().active().is_empty());
        let run = pipeline.runs().get(&run_id).unwrap();
        assert_eq!(
            run.state,
            RunState::Failed {
                stage: Stage::Registering,
                cause: ABANDONED.to_string(),
            }
        );

        // The submission lock went with it
        let outcome = pipeline.register(submission(fixture())).await.unwrap();
        assert_eq!(outcome.asset_id, AssetId(1));
    }

    #[tokio::test]
    async fn test_concurrent_double_submit_registers_once() {
        let inner = MemoryLedger::with_options(Capabilities::all(1), Duration::from_millis(50));
        let ledger = RecordingLedger::new(inner);
        let store = Arc::new(CountingStore { calls: AtomicUsize::new(0) });
        let pipeline = pipeline_with(store, ledger.clone(), false, true).await;

        let (a, b) = tokio::join!(
            pipeline.register(submission(fixture())),
            pipeline.register(submission(fixture()))
        );

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        let rejected = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
        assert_eq!(rejected.stage(), Some(Stage::Hashing));
        assert!(matches!(
            rejected,
            PipelineError::Failed {
                cause: StageError::Validation(ValidationError::DuplicateSubmission),
                ..
            }
        ));
        assert_eq!(ledger.registers(), 1);
    }

    #[tokio::test]
    async fn test_transfer_rejects_bad_address_before_ledger() {
        let (pipeline, ledger) = pipeline().await;
        let outcome = pipeline.register(submission(fixture())).await.unwrap();

        let err = pipeline
            .transfer(outcome.asset_id, "not-an-address")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OperationError::Validation(ValidationError::InvalidAddress(_))
        ));
        assert_eq!(ledger.transfers(), 0);

        let target = format!("0x{}", "a".repeat(40));
        let done = pipeline.transfer(outcome.asset_id, &target).await.unwrap();
        assert_eq!(ledger.transfers(), 1);
        assert_eq!(done.to.as_str(), target);
        assert_eq!(pipeline.details(outcome.asset_id).await.unwrap().owner, done.to);
    }

    #[tokio::test]
    async fn test_self_transfer_rejected() {
        let (pipeline, ledger) = pipeline().await;
        let outcome = pipeline.register(submission(fixture())).await.unwrap();

        let err = pipeline
            .transfer(outcome.asset_id, alice().as_str())
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Validation(ValidationError::SelfTransfer)));
        assert_eq!(ledger.transfers(), 0);
    }

    #[tokio::test]
    async fn test_update_metadata() {
        let (pipeline, _) = pipeline().await;
        let outcome = pipeline.register(submission(fixture())).await.unwrap();

        let blank = pipeline.update_metadata(outcome.asset_id, " ", "desc").await;
        assert!(matches!(
            blank,
            Err(OperationError::Validation(ValidationError::MissingField("name")))
        ));

        let asset = pipeline
            .update_metadata(outcome.asset_id, "Renamed", "New description")
            .await
            .unwrap();
        assert_eq!(asset.name, "Renamed");
        assert_eq!(asset.fingerprint, outcome.fingerprint.as_str());
        assert_eq!(pipeline.total_assets().await.unwrap(), 1);
    }
}
