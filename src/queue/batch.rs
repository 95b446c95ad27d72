use std::collections::HashSet;

use cosmrs::Any;

use super::PendingRequest;

enum Disposition {
    Include,
    Duplicate,
    Postpone,
}

/// One drained queue snapshot, partitioned for submission.
#[must_use]
pub struct Batch {
    /// Payloads going into the transaction, in enqueue order.
    pub messages: Vec<Any>,
    /// Requests resolved with the transaction's outcome: the ones backing
    /// `messages` plus any byte-identical duplicates that were merged.
    pub submitted: Vec<PendingRequest>,
    /// Requests colliding on a grantee already claimed by an earlier
    /// message; they go back to the queue for a later batch.
    pub postponed: Vec<PendingRequest>,
    /// Gas limit for the transaction: the sum over the entire snapshot,
    /// duplicates and postponed requests included.
    pub gas_limit: u64,
}

impl Batch {
    /// Partitions the snapshot in FIFO order. A payload already seen is a
    /// duplicate; a fresh payload to an already-claimed grantee is
    /// postponed, since the chain rejects a transaction carrying two
    /// messages for the same grantee.
    pub fn build(drained: Vec<PendingRequest>) -> Self {
        let mut gas_limit: u64 = 0;

        let dispositions: Vec<Disposition> = {
            let mut seen_payloads: HashSet<(&str, &[u8])> = HashSet::new();
            let mut claimed_grantees: HashSet<&str> = HashSet::new();

            drained
                .iter()
                .map(|request| {
                    gas_limit = gas_limit.saturating_add(request.gas_limit);

                    let payload = (request.msg.type_url.as_str(), request.msg.value.as_slice());

                    if seen_payloads.contains(&payload) {
                        Disposition::Duplicate
                    } else if claimed_grantees.contains(request.grantee.as_str()) {
                        Disposition::Postpone
                    } else {
                        seen_payloads.insert(payload);
                        claimed_grantees.insert(&request.grantee);

                        Disposition::Include
                    }
                })
                .collect()
        };

        let mut messages = Vec::new();
        let mut submitted = Vec::new();
        let mut postponed = Vec::new();

        for (request, disposition) in drained.into_iter().zip(dispositions) {
            match disposition {
                Disposition::Include => {
                    messages.push(request.msg.clone());
                    submitted.push(request);
                }
                Disposition::Duplicate => submitted.push(request),
                Disposition::Postpone => postponed.push(request),
            }
        }

        Self {
            messages,
            submitted,
            postponed,
            gas_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use cosmrs::Any;

    use super::super::BroadcastQueue;
    use super::Batch;

    fn message(tag: &str) -> Any {
        Any {
            type_url: "/cosmos.feegrant.v1beta1.MsgGrantAllowance".into(),
            value: tag.as_bytes().to_vec(),
        }
    }

    #[test]
    fn distinct_grantees_fill_one_batch() {
        let queue = BroadcastQueue::new();

        _ = queue.enqueue(message("a"), 15_000, "secret1aaa".into());
        _ = queue.enqueue(message("b"), 15_000, "secret1bbb".into());

        let batch = Batch::build(queue.drain());

        assert_eq!(batch.messages.len(), 2);
        assert_eq!(batch.submitted.len(), 2);
        assert!(batch.postponed.is_empty());
        assert_eq!(batch.gas_limit, 30_000);
        assert_eq!(batch.messages[0].value, b"a");
        assert_eq!(batch.messages[1].value, b"b");
    }

    #[test]
    fn identical_payloads_are_merged() {
        let queue = BroadcastQueue::new();

        _ = queue.enqueue(message("a"), 15_000, "secret1aaa".into());
        _ = queue.enqueue(message("a"), 15_000, "secret1aaa".into());

        let batch = Batch::build(queue.drain());

        assert_eq!(batch.messages.len(), 1);
        // Both futures still resolve with the submitted batch's outcome.
        assert_eq!(batch.submitted.len(), 2);
        assert!(batch.postponed.is_empty());
        assert_eq!(batch.gas_limit, 30_000);
    }

    #[test]
    fn grantee_collision_is_postponed() {
        let queue = BroadcastQueue::new();

        _ = queue.enqueue(message("revoke"), 15_000, "secret1aaa".into());
        _ = queue.enqueue(message("grant"), 15_000, "secret1aaa".into());

        let batch = Batch::build(queue.drain());

        assert_eq!(batch.messages.len(), 1);
        assert_eq!(batch.messages[0].value, b"revoke");
        assert_eq!(batch.submitted.len(), 1);
        assert_eq!(batch.postponed.len(), 1);
        assert_eq!(batch.postponed[0].grantee, "secret1aaa");
        // Postponed requests still contribute to the gas reservation.
        assert_eq!(batch.gas_limit, 30_000);
    }

    #[test]
    fn batch_grantees_are_unique() {
        let queue = BroadcastQueue::new();

        for (tag, grantee) in [
            ("a", "secret1aaa"),
            ("b", "secret1aaa"),
            ("c", "secret1bbb"),
            ("d", "secret1bbb"),
            ("e", "secret1ccc"),
        ] {
            _ = queue.enqueue(message(tag), 15_000, grantee.into());
        }

        let batch = Batch::build(queue.drain());

        let grantees: HashSet<&str> = batch
            .submitted
            .iter()
            .map(|request| request.grantee.as_str())
            .collect();

        assert_eq!(grantees.len(), batch.messages.len());
        assert_eq!(batch.postponed.len(), 2);
    }
}
