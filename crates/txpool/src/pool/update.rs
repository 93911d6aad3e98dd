//! Scoring of per-sender transaction chains and the promotion pass that
//! moves transactions between the three sub-pools.

use crate::{
    config::PoolConfig,
    identifier::SenderId,
    pool::{meta::MetaTxId, state::SubPoolMarker, PoolInner},
    senders::SenderInfo,
};
use alloy_primitives::U256;

impl PoolInner {
    /// Recomputes marker bits and effective tip for every resident
    /// transaction of `sender`, ascending by nonce.
    ///
    /// Each transaction's fee cap and tip bound the whole chain behind it,
    /// so the effective tip tracks the running minima of both. Once a
    /// transaction cannot pay the protocol base fee, it and everything after
    /// it scores zero.
    pub(crate) fn on_sender_change(
        &mut self,
        sender: SenderId,
        info: &SenderInfo,
        protocol_base_fee: u64,
        pending_base_fee: u64,
    ) {
        let ids: Vec<MetaTxId> = self.by_nonce.ascend(sender).collect();

        let mut expected_nonce = info.nonce;
        let mut cumulative_required = U256::ZERO;
        let mut min_fee_cap = u64::MAX;
        let mut min_tip = u64::MAX;
        let mut below_protocol = false;

        for id in ids {
            let meta = &mut self.arena[id];
            min_fee_cap = min_fee_cap.min(meta.tx.fee_cap);
            min_tip = min_tip.min(meta.tx.tip);
            meta.effective_tip = if pending_base_fee >= min_fee_cap {
                min_tip
            } else {
                min_tip.min(min_fee_cap - pending_base_fee)
            };

            if below_protocol || meta.tx.fee_cap < protocol_base_fee {
                meta.marker = SubPoolMarker::empty();
                below_protocol = true;
                continue
            }
            meta.marker.insert(SubPoolMarker::ENOUGH_FEE_CAP_PROTOCOL);

            meta.marker.remove(SubPoolMarker::NO_NONCE_GAPS);
            if expected_nonce == meta.tx.nonce {
                meta.marker.insert(SubPoolMarker::NO_NONCE_GAPS);
                expected_nonce += 1;
            }

            // Sender must afford `gas * fee_cap + value` of this transaction
            // cumulated with all its required prior transactions.
            meta.marker.remove(SubPoolMarker::ENOUGH_BALANCE);
            if meta.tx.nonce >= info.nonce {
                let needed = U256::from(meta.tx.gas_limit)
                    .saturating_mul(U256::from(meta.tx.fee_cap))
                    .saturating_add(meta.tx.value);
                cumulative_required = cumulative_required.saturating_add(needed);
                if info.balance >= cumulative_required {
                    meta.marker.insert(SubPoolMarker::ENOUGH_BALANCE);
                }
            }

            meta.marker.remove(SubPoolMarker::ENOUGH_FEE_CAP_BLOCK);
            if meta.tx.fee_cap >= pending_base_fee {
                meta.marker.insert(SubPoolMarker::ENOUGH_FEE_CAP_BLOCK);
            }

            // IS_LOCAL never changes here.
        }
    }

    /// Moves transactions between the three sub-pools until every one of
    /// them holds exactly its marker band and respects its capacity.
    ///
    /// The steps run in a fixed order; later steps assume earlier ones.
    pub(crate) fn promote(&mut self, config: &PoolConfig) {
        // 1. Demote or discard pending transactions that no longer qualify.
        loop {
            let Some(worst) = self.pending.worst() else { break };
            let marker = self.arena[worst].marker;
            if marker.qualifies_for_pending() {
                break
            }
            let Some(id) = self.pending.pop_worst(&mut self.arena) else { break };
            if marker.qualifies_for_base_fee() {
                self.base_fee.add(&mut self.arena, id);
            } else if marker.qualifies_for_queued() {
                self.queued.add(&mut self.arena, id);
            } else {
                self.discard(id);
            }
        }

        // 2. Pending over capacity: drop the worst.
        while self.pending.len() > config.pending_limit {
            let Some(id) = self.pending.pop_worst(&mut self.arena) else { break };
            self.discard(id);
        }

        // 3. Promote base-fee transactions that now qualify for pending.
        loop {
            let Some(best) = self.base_fee.best() else { break };
            if !self.arena[best].marker.qualifies_for_pending() {
                break
            }
            let Some(id) = self.base_fee.pop_best(&mut self.arena) else { break };
            self.pending.add(&mut self.arena, id);
        }

        // 4. Demote or discard base-fee transactions below the base-fee bar.
        loop {
            let Some(worst) = self.base_fee.worst() else { break };
            let marker = self.arena[worst].marker;
            if marker.qualifies_for_base_fee() {
                break
            }
            let Some(id) = self.base_fee.pop_worst(&mut self.arena) else { break };
            if marker.qualifies_for_queued() {
                self.queued.add(&mut self.arena, id);
            } else {
                self.discard(id);
            }
        }

        // 5. Base-fee over capacity: drop the worst.
        while self.base_fee.len() > config.base_fee_limit {
            let Some(id) = self.base_fee.pop_worst(&mut self.arena) else { break };
            self.discard(id);
        }

        // 6. Promote queued transactions that now qualify.
        loop {
            let Some(best) = self.queued.best() else { break };
            let marker = self.arena[best].marker;
            if !marker.qualifies_for_base_fee() {
                break
            }
            let Some(id) = self.queued.pop_best(&mut self.arena) else { break };
            if marker.qualifies_for_pending() {
                self.pending.add(&mut self.arena, id);
            } else {
                self.base_fee.add(&mut self.arena, id);
            }
        }

        // 7. Discard queued transactions that can never pay the protocol fee.
        loop {
            let Some(worst) = self.queued.worst() else { break };
            if self.arena[worst].marker.qualifies_for_queued() {
                break
            }
            let Some(id) = self.queued.pop_worst(&mut self.arena) else { break };
            self.discard(id);
        }

        // 8. Queued over capacity: drop the worst.
        while self.queued.len() > config.queued_limit {
            let Some(id) = self.queued.pop_worst(&mut self.arena) else { break };
            self.discard(id);
        }
    }
}
