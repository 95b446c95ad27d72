use std::sync::Arc;

use cosmrs::Any;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::{
    blocks::BlockEvent,
    chain::{error::Result as ChainResult, tx::sign_direct, Gateway, TxOutcome},
    queue::{batch::Batch, BroadcastQueue, SubmitError},
    wallet::Wallet,
};

pub mod sequence;

/// Ticks skipped after a submission so the node's observed account
/// sequence catches up before the next one.
const COOLDOWN_TICKS: u8 = 1;

/// Additional attempts allowed after a sequence-mismatch rejection.
const MAX_SEQUENCE_RETRIES: u8 = 2;

const SDK_CODESPACE: &str = "sdk";

const SEQUENCE_MISMATCH_CODE: u32 = 32;

/// The single consumer of block events: paces, batches, signs, broadcasts
/// and resolves the pending requests' futures.
#[must_use]
pub struct Broadcaster<G>
where
    G: Gateway,
{
    queue: Arc<BroadcastQueue>,
    gateway: G,
    wallet: Wallet,
    gas_price: f64,
    memo: String,
    cooldown_ticks: u8,
}

impl<G> Broadcaster<G>
where
    G: Gateway,
{
    pub fn new(
        queue: Arc<BroadcastQueue>,
        gateway: G,
        wallet: Wallet,
        gas_price: f64,
        memo: String,
    ) -> Self {
        Self {
            queue,
            gateway,
            wallet,
            gas_price,
            memo,
            cooldown_ticks: 0,
        }
    }

    pub async fn run(mut self, mut block_events: UnboundedReceiver<BlockEvent>) {
        info!(target: "broadcast", "Broadcaster started.");

        while let Some(event) = block_events.recv().await {
            self.on_block(event).await;
        }

        info!(target: "broadcast", "Block event channel closed. Exiting.");
    }

    async fn on_block(&mut self, event: BlockEvent) {
        if self.cooldown_ticks > 0 {
            self.cooldown_ticks -= 1;

            debug!(
                target: "broadcast",
                remaining = self.cooldown_ticks,
                "Skipping tick to let the account sequence settle.",
            );

            return;
        }

        let drained = self.queue.drain();

        if drained.is_empty() {
            return;
        }

        let batch = Batch::build(drained);

        info!(
            target: "broadcast",
            height = event.height,
            messages = batch.messages.len(),
            merged = batch.submitted.len() - batch.messages.len(),
            postponed = batch.postponed.len(),
            "Submitting batch.",
        );

        let result = self.submit(&batch.messages, batch.gas_limit).await;

        self.cooldown_ticks = COOLDOWN_TICKS;

        match result {
            Ok(outcome) => {
                if outcome.is_success() {
                    info!(target: "broadcast", "Batch committed.");
                } else {
                    warn!(
                        target: "broadcast",
                        code = outcome.code,
                        log = outcome.meta.as_ref().map(|meta| meta.log.as_str()),
                        "Batch rejected by the chain.",
                    );
                }

                for request in batch.submitted {
                    request.resolve(Ok(outcome.clone()));
                }

                if !batch.postponed.is_empty() {
                    self.queue.requeue(batch.postponed);
                }
            }
            Err(submission_error) => {
                error!(
                    target: "broadcast",
                    error = %submission_error,
                    "Batch submission failed!",
                );

                let submission_error = SubmitError(submission_error.to_string());

                for request in batch.submitted.into_iter().chain(batch.postponed) {
                    request.resolve(Err(submission_error.clone()));
                }
            }
        }
    }

    /// Signs and broadcasts `messages` as one transaction, retrying with
    /// the chain's expected sequence on an `sdk`/32 rejection.
    async fn submit(&self, messages: &[Any], gas_limit: u64) -> ChainResult<TxOutcome> {
        let fee = fee_amount(gas_limit, self.gas_price);

        let mut sequence_override: Option<u64> = None;
        let mut retries: u8 = 0;

        loop {
            let mut account = self.gateway.account(self.wallet.address()).await?;

            if let Some(sequence) = sequence_override.take() {
                account.sequence = sequence;
            }

            let tx_bytes = sign_direct(
                &self.wallet,
                messages.to_vec(),
                fee,
                gas_limit,
                account,
                &self.memo,
            )?;

            let outcome = self.gateway.broadcast(tx_bytes).await?;

            if let Some(expected) = sequence_retry(&outcome, retries) {
                retries += 1;

                sequence_override = Some(expected);

                warn!(
                    target: "broadcast",
                    expected,
                    attempt = retries,
                    "Account sequence mismatch. Retrying with the expected sequence.",
                );

                continue;
            }

            return Ok(outcome);
        }
    }
}

fn sequence_retry(outcome: &TxOutcome, retries: u8) -> Option<u64> {
    if outcome.is_success() || retries >= MAX_SEQUENCE_RETRIES {
        return None;
    }

    outcome
        .meta
        .as_ref()
        .filter(|meta| meta.codespace == SDK_CODESPACE && meta.code == SEQUENCE_MISMATCH_CODE)
        .and_then(|meta| sequence::expected_sequence(&meta.log))
}

/// Transaction fee for the batch, truncated to whole fee-denomination units.
#[must_use]
pub fn fee_amount(gas_limit: u64, gas_price: f64) -> u128 {
    (gas_limit as f64 * gas_price).trunc() as u128
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use cosmrs::proto::{
        cosmos::tx::v1beta1::{AuthInfo, TxBody, TxRaw},
        prost::Message as _,
    };

    use crate::{
        blocks::BlockEvent,
        chain::{
            error::{Error, Result},
            msgs, AccountInfo, Gateway, TxMeta, TxOutcome,
        },
        queue::BroadcastQueue,
        wallet::Wallet,
        GRANT_GAS_LIMIT, REVOKE_GAS_LIMIT,
    };

    use super::{fee_amount, Broadcaster};

    const SECRET: &str = "c934ba2b9a5d5d14e22f3501ccb2a3ccb2a1b763bd83c6ba5d5d14e22f3501cc";

    const GRANTER: &str = "secret1granter";

    struct MockGateway {
        responses: Mutex<VecDeque<Result<TxOutcome>>>,
        broadcasts: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl MockGateway {
        fn new(responses: Vec<Result<TxOutcome>>) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
            let broadcasts = Arc::new(Mutex::new(Vec::new()));

            (
                Self {
                    responses: Mutex::new(responses.into()),
                    broadcasts: broadcasts.clone(),
                },
                broadcasts,
            )
        }
    }

    #[async_trait]
    impl Gateway for MockGateway {
        async fn account(&self, _address: &str) -> Result<AccountInfo> {
            Ok(AccountInfo {
                account_number: 7,
                sequence: 41,
            })
        }

        async fn broadcast(&self, tx_bytes: Vec<u8>) -> Result<TxOutcome> {
            self.broadcasts.lock().unwrap().push(tx_bytes);

            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(success()))
        }
    }

    fn success() -> TxOutcome {
        TxOutcome {
            code: 0,
            raw_response: "{}".into(),
            meta: Some(TxMeta {
                codespace: String::new(),
                code: 0,
                log: String::new(),
            }),
            events: Default::default(),
        }
    }

    fn sequence_mismatch(expected: u64, got: u64) -> TxOutcome {
        TxOutcome {
            code: 32,
            raw_response: "{}".into(),
            meta: Some(TxMeta {
                codespace: "sdk".into(),
                code: 32,
                log: format!(
                    "account sequence mismatch, expected {expected}, got {got}: \
                     incorrect account sequence"
                ),
            }),
            events: Default::default(),
        }
    }

    fn broadcaster(
        queue: Arc<BroadcastQueue>,
        responses: Vec<Result<TxOutcome>>,
    ) -> (Broadcaster<MockGateway>, Arc<Mutex<Vec<Vec<u8>>>>) {
        let (gateway, broadcasts) = MockGateway::new(responses);

        (
            Broadcaster::new(
                queue,
                gateway,
                Wallet::from_hex(SECRET).unwrap(),
                0.25,
                "faucet".into(),
            ),
            broadcasts,
        )
    }

    fn tick() -> BlockEvent {
        BlockEvent { height: Some(1) }
    }

    fn signed_sequence(tx_bytes: &[u8]) -> u64 {
        let raw = TxRaw::decode(tx_bytes).unwrap();

        let auth_info = AuthInfo::decode(raw.auth_info_bytes.as_slice()).unwrap();

        auth_info.signer_infos[0].sequence
    }

    fn message_count(tx_bytes: &[u8]) -> usize {
        let raw = TxRaw::decode(tx_bytes).unwrap();

        TxBody::decode(raw.body_bytes.as_slice())
            .unwrap()
            .messages
            .len()
    }

    #[tokio::test]
    async fn batch_resolves_every_future_with_the_same_outcome() {
        let queue = Arc::new(BroadcastQueue::new());

        let first = queue.enqueue(
            msgs::grant_allowance(GRANTER, "secret1aaa", 500_000, 0),
            GRANT_GAS_LIMIT,
            "secret1aaa".into(),
        );
        let second = queue.enqueue(
            msgs::grant_allowance(GRANTER, "secret1bbb", 500_000, 0),
            GRANT_GAS_LIMIT,
            "secret1bbb".into(),
        );

        let (mut broadcaster, broadcasts) = broadcaster(queue, Vec::new());

        broadcaster.on_block(tick()).await;

        {
            let broadcasts = broadcasts.lock().unwrap();

            assert_eq!(broadcasts.len(), 1);
            assert_eq!(message_count(&broadcasts[0]), 2);
        }

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert!(first.is_success());
        assert_eq!(first.code, second.code);
        assert_eq!(first.raw_response, second.raw_response);
    }

    #[tokio::test]
    async fn cooldown_skips_exactly_one_tick() {
        let queue = Arc::new(BroadcastQueue::new());

        _ = queue.enqueue(
            msgs::grant_allowance(GRANTER, "secret1aaa", 500_000, 0),
            GRANT_GAS_LIMIT,
            "secret1aaa".into(),
        );

        let (mut broadcaster, broadcasts) = broadcaster(queue.clone(), Vec::new());

        broadcaster.on_block(tick()).await;

        assert_eq!(broadcasts.lock().unwrap().len(), 1);

        _ = queue.enqueue(
            msgs::grant_allowance(GRANTER, "secret1bbb", 500_000, 0),
            GRANT_GAS_LIMIT,
            "secret1bbb".into(),
        );

        // Quiet block right after a submission.
        broadcaster.on_block(tick()).await;

        assert_eq!(broadcasts.lock().unwrap().len(), 1);

        broadcaster.on_block(tick()).await;

        assert_eq!(broadcasts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sequence_mismatch_retries_with_expected_sequence() {
        let queue = Arc::new(BroadcastQueue::new());

        let receiver = queue.enqueue(
            msgs::grant_allowance(GRANTER, "secret1aaa", 500_000, 0),
            GRANT_GAS_LIMIT,
            "secret1aaa".into(),
        );

        let (mut broadcaster, broadcasts) =
            broadcaster(queue, vec![Ok(sequence_mismatch(42, 41))]);

        broadcaster.on_block(tick()).await;

        {
            let broadcasts = broadcasts.lock().unwrap();

            assert_eq!(broadcasts.len(), 2);
            assert_eq!(signed_sequence(&broadcasts[0]), 41);
            assert_eq!(signed_sequence(&broadcasts[1]), 42);
        }

        assert!(receiver.await.unwrap().unwrap().is_success());
    }

    #[tokio::test]
    async fn sequence_retries_are_capped() {
        let queue = Arc::new(BroadcastQueue::new());

        let receiver = queue.enqueue(
            msgs::grant_allowance(GRANTER, "secret1aaa", 500_000, 0),
            GRANT_GAS_LIMIT,
            "secret1aaa".into(),
        );

        let (mut broadcaster, broadcasts) = broadcaster(
            queue,
            vec![
                Ok(sequence_mismatch(42, 41)),
                Ok(sequence_mismatch(43, 42)),
                Ok(sequence_mismatch(44, 43)),
            ],
        );

        broadcaster.on_block(tick()).await;

        // The initial attempt plus two retries, then the failure stands.
        assert_eq!(broadcasts.lock().unwrap().len(), 3);

        let outcome = receiver.await.unwrap().unwrap();

        assert_eq!(outcome.code, 32);
    }

    #[tokio::test]
    async fn grantee_collision_is_served_over_two_batches() {
        let queue = Arc::new(BroadcastQueue::new());

        let revoke = queue.enqueue(
            msgs::revoke_allowance(GRANTER, "secret1aaa"),
            REVOKE_GAS_LIMIT,
            "secret1aaa".into(),
        );
        let mut grant = queue.enqueue(
            msgs::grant_allowance(GRANTER, "secret1aaa", 500_000, 0),
            GRANT_GAS_LIMIT,
            "secret1aaa".into(),
        );

        let (mut broadcaster, broadcasts) = broadcaster(queue, Vec::new());

        broadcaster.on_block(tick()).await;

        assert_eq!(broadcasts.lock().unwrap().len(), 1);
        assert_eq!(message_count(&broadcasts.lock().unwrap()[0]), 1);
        assert!(revoke.await.unwrap().unwrap().is_success());
        assert!(grant.try_recv().is_err());

        // Cooldown tick, then the postponed grant goes out.
        broadcaster.on_block(tick()).await;
        broadcaster.on_block(tick()).await;

        assert_eq!(broadcasts.lock().unwrap().len(), 2);
        assert!(grant.await.unwrap().unwrap().is_success());
    }

    #[tokio::test]
    async fn submission_failure_resolves_postponed_requests_too() {
        let queue = Arc::new(BroadcastQueue::new());

        let revoke = queue.enqueue(
            msgs::revoke_allowance(GRANTER, "secret1aaa"),
            REVOKE_GAS_LIMIT,
            "secret1aaa".into(),
        );
        let grant = queue.enqueue(
            msgs::grant_allowance(GRANTER, "secret1aaa", 500_000, 0),
            GRANT_GAS_LIMIT,
            "secret1aaa".into(),
        );

        let (mut broadcaster, _broadcasts) =
            broadcaster(queue.clone(), vec![Err(Error::EmptyBroadcastResponse)]);

        broadcaster.on_block(tick()).await;

        assert!(revoke.await.unwrap().is_err());
        assert!(grant.await.unwrap().is_err());
        assert!(queue.is_empty());
    }

    #[test]
    fn fee_is_truncated() {
        assert_eq!(fee_amount(15_000, 0.25), 3_750);
        assert_eq!(fee_amount(333, 0.25), 83);
    }
}
