// File: chorely-core/src/services/ledger_service.rs

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use chorely_common::models::{LedgerReason, PointBalance, PointLedgerEntry, PointType, Role};
use chorely_common::traits::{LedgerTx, SettlementStore, SettlementTx, UserDirectory};

use crate::Error;

/// Moves a balance by `delta` and appends the matching ledger row, inside the
/// caller's transaction. The balance row stays locked until the transaction
/// ends.
pub async fn apply_delta_in(
    tx: &mut dyn SettlementTx,
    user_id: Uuid,
    point_type: PointType,
    delta: i64,
    reason: LedgerReason,
    related_ref: Option<Uuid>,
    counterparty_id: Option<Uuid>,
) -> Result<PointLedgerEntry, Error> {
    let current = tx.lock_balance(user_id, point_type).await?;
    let next = current
        .checked_add(delta)
        .ok_or_else(|| Error::Validation(format!("{} balance would overflow", point_type)))?;
    if next < 0 {
        return Err(Error::InsufficientFunds {
            point_type,
            required: -delta,
            available: current,
        });
    }

    tx.write_balance(user_id, point_type, next).await?;

    let entry = PointLedgerEntry {
        entry_id: Uuid::new_v4(),
        user_id,
        point_type,
        delta,
        balance_after: next,
        reason,
        related_ref,
        counterparty_id,
        created_at: Utc::now(),
    };
    tx.append_ledger_entry(&entry).await?;

    debug!(
        "ledger: user={} {} {:+} => {} ({})",
        user_id, point_type, delta, next, reason
    );
    Ok(entry)
}

pub async fn credit_in(
    tx: &mut dyn SettlementTx,
    user_id: Uuid,
    point_type: PointType,
    amount: i64,
    reason: LedgerReason,
    related_ref: Option<Uuid>,
) -> Result<PointLedgerEntry, Error> {
    ensure_positive(amount)?;
    apply_delta_in(tx, user_id, point_type, amount, reason, related_ref, None).await
}

pub async fn debit_in(
    tx: &mut dyn SettlementTx,
    user_id: Uuid,
    point_type: PointType,
    amount: i64,
    reason: LedgerReason,
    related_ref: Option<Uuid>,
) -> Result<PointLedgerEntry, Error> {
    ensure_positive(amount)?;
    apply_delta_in(tx, user_id, point_type, -amount, reason, related_ref, None).await
}

fn ensure_positive(amount: i64) -> Result<(), Error> {
    if amount <= 0 {
        return Err(Error::Validation(format!("amount must be positive, got {}", amount)));
    }
    Ok(())
}

/// Both sides of a completed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub point_type: PointType,
    pub amount: i64,
    pub from_balance: i64,
    pub to_balance: i64,
    pub out_entry_id: Uuid,
    pub in_entry_id: Uuid,
}

pub struct LedgerService {
    store: Arc<dyn SettlementStore>,
    users: Arc<dyn UserDirectory>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn SettlementStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self { store, users }
    }

    pub async fn credit(
        &self,
        user_id: Uuid,
        point_type: PointType,
        amount: i64,
        reason: LedgerReason,
        related_ref: Option<Uuid>,
    ) -> Result<i64, Error> {
        let mut tx = self.store.begin().await?;
        let entry = credit_in(tx.as_mut(), user_id, point_type, amount, reason, related_ref).await?;
        tx.commit().await?;
        info!("Credited {} {} to user {} ({})", amount, point_type, user_id, reason);
        Ok(entry.balance_after)
    }

    pub async fn debit(
        &self,
        user_id: Uuid,
        point_type: PointType,
        amount: i64,
        reason: LedgerReason,
        related_ref: Option<Uuid>,
    ) -> Result<i64, Error> {
        let mut tx = self.store.begin().await?;
        let entry = debit_in(tx.as_mut(), user_id, point_type, amount, reason, related_ref).await?;
        tx.commit().await?;
        info!("Debited {} {} from user {} ({})", amount, point_type, user_id, reason);
        Ok(entry.balance_after)
    }

    /// Atomic debit of `from` and credit of `to`. The two ledger rows name each
    /// other as counterparty and share one transfer reference.
    pub async fn transfer(
        &self,
        from: Uuid,
        to: Uuid,
        point_type: PointType,
        amount: i64,
    ) -> Result<TransferReceipt, Error> {
        ensure_positive(amount)?;
        if from == to {
            return Err(Error::Validation("cannot transfer points to yourself".to_string()));
        }
        if !self.users.user_exists(from).await? {
            return Err(Error::NotFound(format!("user {}", from)));
        }
        match self.users.role(to).await? {
            None => return Err(Error::NotFound(format!("user {}", to))),
            Some(Role::Admin) => {
                return Err(Error::Forbidden("points cannot be transferred to an admin".to_string()));
            }
            Some(Role::Member) => {}
        }

        let transfer_ref = Uuid::new_v4();
        let mut tx = self.store.begin().await?;

        // Lock in a stable order so two opposite transfers cannot deadlock.
        let (first, second) = if from < to { (from, to) } else { (to, from) };
        tx.lock_balance(first, point_type).await?;
        tx.lock_balance(second, point_type).await?;

        let out = apply_delta_in(
            tx.as_mut(),
            from,
            point_type,
            -amount,
            LedgerReason::TransferOut,
            Some(transfer_ref),
            Some(to),
        )
        .await?;
        let incoming = apply_delta_in(
            tx.as_mut(),
            to,
            point_type,
            amount,
            LedgerReason::TransferIn,
            Some(transfer_ref),
            Some(from),
        )
        .await?;
        tx.commit().await?;

        info!("Transferred {} {} from {} to {}", amount, point_type, from, to);
        Ok(TransferReceipt {
            point_type,
            amount,
            from_balance: out.balance_after,
            to_balance: incoming.balance_after,
            out_entry_id: out.entry_id,
            in_entry_id: incoming.entry_id,
        })
    }

    /// One row per point type; types never touched report zero.
    pub async fn balances(&self, user_id: Uuid) -> Result<Vec<PointBalance>, Error> {
        let mut tx = self.store.begin().await?;
        let stored = tx.list_balances(user_id).await?;
        tx.commit().await?;

        let now = Utc::now();
        Ok(PointType::ALL
            .iter()
            .map(|pt| {
                stored
                    .iter()
                    .find(|b| b.point_type == *pt)
                    .cloned()
                    .unwrap_or(PointBalance {
                        user_id,
                        point_type: *pt,
                        balance: 0,
                        updated_at: now,
                    })
            })
            .collect())
    }

    pub async fn balance(&self, user_id: Uuid, point_type: PointType) -> Result<i64, Error> {
        let balances = self.balances(user_id).await?;
        Ok(balances
            .iter()
            .find(|b| b.point_type == point_type)
            .map(|b| b.balance)
            .unwrap_or(0))
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        point_type: Option<PointType>,
        limit: i64,
    ) -> Result<Vec<PointLedgerEntry>, Error> {
        let mut tx = self.store.begin().await?;
        let entries = tx.list_ledger_entries(user_id, point_type, limit.clamp(1, 500)).await?;
        tx.commit().await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryStore;
    use crate::repositories::memory::MemoryDirectory;

    fn service() -> (LedgerService, MemoryDirectory) {
        let directory = MemoryDirectory::new();
        let svc = LedgerService::new(Arc::new(MemoryStore::new()), Arc::new(directory.clone()));
        (svc, directory)
    }

    #[tokio::test]
    async fn test_credit_then_debit_keeps_balance_and_ledger_in_step() {
        let (svc, dir) = service();
        let kid = dir.add_user(Role::Member);

        assert_eq!(svc.credit(kid, PointType::Coin, 120, LedgerReason::Adjustment, None).await.unwrap(), 120);
        assert_eq!(svc.debit(kid, PointType::Coin, 20, LedgerReason::Adjustment, None).await.unwrap(), 100);

        let history = svc.history(kid, Some(PointType::Coin), 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].balance_after, svc.balance(kid, PointType::Coin).await.unwrap());
        assert_eq!(history[0].delta, -20);
    }

    #[tokio::test]
    async fn test_overdraft_is_rejected_without_side_effects() {
        let (svc, dir) = service();
        let kid = dir.add_user(Role::Member);
        svc.credit(kid, PointType::Diamond, 5, LedgerReason::Adjustment, None).await.unwrap();

        let err = svc
            .debit(kid, PointType::Diamond, 6, LedgerReason::Adjustment, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { required: 6, available: 5, .. }));
        assert_eq!(svc.balance(kid, PointType::Diamond).await.unwrap(), 5);
        assert_eq!(svc.history(kid, None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_positive_amounts_are_validation_errors() {
        let (svc, dir) = service();
        let kid = dir.add_user(Role::Member);
        for amount in [0, -3] {
            let err = svc.credit(kid, PointType::Coin, amount, LedgerReason::Adjustment, None).await;
            assert!(matches!(err, Err(Error::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_transfer_links_both_rows() {
        let (svc, dir) = service();
        let alice = dir.add_user(Role::Member);
        let bob = dir.add_user(Role::Member);
        svc.credit(alice, PointType::Energy, 30, LedgerReason::Adjustment, None).await.unwrap();

        let receipt = svc.transfer(alice, bob, PointType::Energy, 12).await.unwrap();
        assert_eq!(receipt.from_balance, 18);
        assert_eq!(receipt.to_balance, 12);

        let out = &svc.history(alice, None, 1).await.unwrap()[0];
        let incoming = &svc.history(bob, None, 1).await.unwrap()[0];
        assert_eq!(out.reason, LedgerReason::TransferOut);
        assert_eq!(out.counterparty_id, Some(bob));
        assert_eq!(incoming.reason, LedgerReason::TransferIn);
        assert_eq!(incoming.counterparty_id, Some(alice));
        assert_eq!(out.related_ref, incoming.related_ref);
    }

    #[tokio::test]
    async fn test_transfer_guards() {
        let (svc, dir) = service();
        let alice = dir.add_user(Role::Member);
        let parent = dir.add_user(Role::Admin);
        svc.credit(alice, PointType::Coin, 10, LedgerReason::Adjustment, None).await.unwrap();

        assert!(matches!(
            svc.transfer(alice, alice, PointType::Coin, 1).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            svc.transfer(alice, parent, PointType::Coin, 1).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            svc.transfer(alice, Uuid::new_v4(), PointType::Coin, 1).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            svc.transfer(alice, dir.add_user(Role::Member), PointType::Coin, 11).await,
            Err(Error::InsufficientFunds { .. })
        ));
        assert_eq!(svc.balance(alice, PointType::Coin).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_balances_report_every_point_type() {
        let (svc, dir) = service();
        let kid = dir.add_user(Role::Member);
        svc.credit(kid, PointType::Coin, 7, LedgerReason::Adjustment, None).await.unwrap();

        let balances = svc.balances(kid).await.unwrap();
        assert_eq!(balances.len(), 3);
        assert_eq!(balances[0].point_type, PointType::Coin);
        assert_eq!(balances[0].balance, 7);
        assert!(balances[1..].iter().all(|b| b.balance == 0));
    }
}
