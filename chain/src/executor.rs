//! Transaction execution: applies one transaction's effects to a
//! [`Snapshot`], dispatching on [`TxKind`].

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::{ChainError, ChainResult};
use crate::fee::{can_afford, compute_cost, compute_fee};
use crate::state::Snapshot;
use crate::types::tx::TxKind;
use crate::types::{Identity, IdentityState, Transaction};

/// Applies `tx` (the `index`-th transaction in its block) to `snapshot`,
/// mutating sender/recipient accounts and identities in place.
///
/// `validator_count` is the size of the validator set as of the start
/// of the block being applied, used for fee/surcharge computation.
/// Returns the fee this transaction contributes to the block's
/// `total_fee` (the block applier splits it between burn and reward).
pub fn apply_tx_on_state(
    snapshot: &mut Snapshot,
    tx: &Transaction,
    index: usize,
    validator_count: u64,
) -> ChainResult<BigUint> {
    tx.verify_signature()?;

    let sender_addr = tx.sender();
    let common = &tx.common;
    let global = snapshot.global();

    if common.epoch != global.epoch {
        return Err(ChainError::InvalidEpoch {
            index,
            account: sender_addr,
            tx_epoch: common.epoch,
            global_epoch: global.epoch,
        });
    }

    let mut sender_account = snapshot.account(&sender_addr);
    let expected_nonce = if sender_account.epoch < global.epoch {
        1
    } else {
        sender_account.nonce + 1
    };
    if common.account_nonce != expected_nonce {
        return Err(ChainError::BadNonce {
            index,
            account: sender_addr,
            expected: expected_nonce,
            got: common.account_nonce,
        });
    }

    if common.kind == TxKind::NewEpoch {
        sender_account.nonce = common.account_nonce;
        sender_account.epoch = common.epoch;
        snapshot.set_account(sender_addr, sender_account);
        return Ok(BigUint::zero());
    }

    if matches!(common.kind, TxKind::Activation | TxKind::Kill) && !common.amount.is_zero() {
        return Err(ChainError::UnexpectedAmount {
            index,
            account: sender_addr,
            kind_name: if common.kind == TxKind::Activation {
                "activation"
            } else {
                "kill"
            },
        });
    }

    let size_in_bytes = rlp::encode(tx).len() as u64;
    let fee = compute_fee(common.kind, validator_count, size_in_bytes);
    let cost = compute_cost(common.kind, &common.amount, &fee, validator_count);

    if !can_afford(&sender_account.balance, &cost) {
        return Err(ChainError::InsufficientBalance {
            index,
            account: sender_addr,
            needed: cost.to_string(),
            have: sender_account.balance.to_string(),
        });
    }

    match common.kind {
        TxKind::Regular => apply_regular(snapshot, &mut sender_account, &cost, common)?,
        TxKind::Invite => apply_invite(snapshot, &sender_addr, &mut sender_account, &cost, &fee, index, common)?,
        TxKind::Activation => apply_activation(snapshot, &sender_addr, &mut sender_account, &cost, index, common)?,
        TxKind::Kill => apply_kill(snapshot, &sender_addr),
        TxKind::NewEpoch => unreachable!("handled above"),
    }

    sender_account.nonce = common.account_nonce;
    sender_account.epoch = common.epoch;
    snapshot.set_account(sender_addr, sender_account);

    Ok(fee)
}

fn apply_regular(
    snapshot: &mut Snapshot,
    sender_account: &mut crate::types::Account,
    cost: &BigUint,
    common: &crate::types::tx::TxCommon,
) -> ChainResult<()> {
    let to = common
        .to
        .ok_or_else(|| ChainError::Repository("regular transaction missing recipient".into()))?;
    sender_account.balance -= cost;
    let mut recipient = snapshot.account(&to);
    recipient.balance += &common.amount;
    snapshot.set_account(to, recipient);
    Ok(())
}

fn apply_invite(
    snapshot: &mut Snapshot,
    sender_addr: &crate::types::Address,
    sender_account: &mut crate::types::Account,
    cost: &BigUint,
    fee: &BigUint,
    index: usize,
    common: &crate::types::tx::TxCommon,
) -> ChainResult<()> {
    let mut sender_identity = snapshot.identity(sender_addr);
    if sender_identity.state != IdentityState::Verified {
        return Err(ChainError::InvalidIdentityTransition {
            index,
            account: *sender_addr,
            state: sender_identity.state,
            attempted: "invite",
        });
    }
    if sender_identity.invites_remaining == 0 {
        return Err(ChainError::NoInvitesRemaining {
            account: *sender_addr,
        });
    }

    let to = common
        .to
        .ok_or_else(|| ChainError::Repository("invite transaction missing recipient".into()))?;
    let recipient_identity = snapshot.identity(&to);
    if recipient_identity.state != IdentityState::Undefined {
        return Err(ChainError::InvalidIdentityTransition {
            index,
            account: to,
            state: recipient_identity.state,
            attempted: "invite",
        });
    }

    sender_identity.invites_remaining -= 1;
    snapshot.set_identity(*sender_addr, sender_identity);
    snapshot.set_identity(
        to,
        Identity {
            state: IdentityState::Invite,
            stake: BigUint::zero(),
            invites_remaining: 0,
        },
    );

    sender_account.balance -= cost;
    let mut recipient_account = snapshot.account(&to);
    recipient_account.balance += cost - fee;
    snapshot.set_account(to, recipient_account);
    Ok(())
}

/// Turns a throwaway invited key into a long-term verified identity:
/// the sender (which must hold the pending `Invite`) empties its
/// balance into `tx.to`, which is promoted straight to `Verified`.
fn apply_activation(
    snapshot: &mut Snapshot,
    sender_addr: &crate::types::Address,
    sender_account: &mut crate::types::Account,
    cost: &BigUint,
    index: usize,
    common: &crate::types::tx::TxCommon,
) -> ChainResult<()> {
    let mut sender_identity = snapshot.identity(sender_addr);
    if sender_identity.state != IdentityState::Invite {
        return Err(ChainError::InvalidIdentityTransition {
            index,
            account: *sender_addr,
            state: sender_identity.state,
            attempted: "activation",
        });
    }

    let to = common
        .to
        .ok_or_else(|| ChainError::Repository("activation transaction missing recipient".into()))?;

    let change = &sender_account.balance - cost;
    sender_account.balance = BigUint::zero();
    sender_identity.state = IdentityState::Killed;
    sender_identity.stake = BigUint::zero();
    sender_identity.invites_remaining = 0;
    snapshot.set_identity(*sender_addr, sender_identity);

    let mut recipient_identity = snapshot.identity(&to);
    recipient_identity.state = IdentityState::Verified;
    snapshot.set_identity(to, recipient_identity);

    let mut recipient_account = snapshot.account(&to);
    recipient_account.balance += change;
    snapshot.set_account(to, recipient_account);
    Ok(())
}

/// Kills the sender's identity. Stake is non-withdrawable: it is left
/// in place (and simply excluded from the validators cache once the
/// identity is no longer alive), never transferred to balance.
fn apply_kill(snapshot: &mut Snapshot, sender_addr: &crate::types::Address) {
    let mut identity = snapshot.identity(sender_addr);
    identity.state = IdentityState::Killed;
    snapshot.set_identity(*sender_addr, identity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{InMemoryStateDB, StateDB};
    use crate::types::tx::TxCommon;
    use crate::types::{Account, Address, PublicKey, Signature};
    use parity_crypto::publickey::{sign, KeyPair, Message, Secret};

    fn keypair(byte: u8) -> KeyPair {
        let mut sk = [0u8; 32];
        sk[31] = byte;
        sk[0] = 1;
        KeyPair::from_secret(Secret::from_slice(&sk).unwrap()).unwrap()
    }

    fn signed_tx(kp: &KeyPair, common: TxCommon) -> Transaction {
        let uncompressed = kp.public().as_bytes().to_vec();
        let unsigned = Transaction {
            common,
            sender_pubkey: PublicKey(uncompressed),
            signature: Signature(vec![0u8; 65]),
        };
        let digest = crate::types::Hash256::compute(&unsigned.signing_bytes());
        let msg = Message::from(digest.0);
        let sig = sign(kp.secret(), &msg).expect("sign");
        let mut bytes = [0u8; 65];
        bytes.copy_from_slice(&*sig);
        Transaction {
            signature: Signature(bytes.to_vec()),
            ..unsigned
        }
    }

    fn addr_of(kp: &KeyPair) -> Address {
        PublicKey(kp.public().as_bytes().to_vec()).to_address()
    }

    #[test]
    fn regular_transfer_moves_balance_and_charges_fee() {
        let sender_kp = keypair(1);
        let sender = addr_of(&sender_kp);
        let to = Address([9u8; crate::types::ADDRESS_LEN]);

        let db = InMemoryStateDB::new();
        let mut snap = db.new_for_check();
        snap.set_account(
            sender,
            Account {
                balance: BigUint::from(100_000_000_000_000_000_000u128),
                nonce: 0,
                epoch: 0,
            },
        );

        let tx = signed_tx(
            &sender_kp,
            TxCommon {
                kind: TxKind::Regular,
                epoch: 0,
                account_nonce: 1,
                to: Some(to),
                amount: BigUint::from(5_000_000_000_000_000_000u128),
                ..Default::default()
            },
        );
        let size = rlp::encode(&tx).len() as u64;

        let fee = apply_tx_on_state(&mut snap, &tx, 0, 10).expect("apply regular tx");
        let expected_fee = compute_fee(TxKind::Regular, 10, size);
        assert_eq!(fee, expected_fee);
        assert_eq!(snap.account(&to).balance, BigUint::from(5_000_000_000_000_000_000u128));
        assert_eq!(
            snap.account(&sender).balance,
            BigUint::from(100_000_000_000_000_000_000u128)
                - BigUint::from(5_000_000_000_000_000_000u128)
                - expected_fee
        );
        assert_eq!(snap.account(&sender).nonce, 1);
    }

    #[test]
    fn bad_nonce_is_rejected() {
        let sender_kp = keypair(2);
        let sender = addr_of(&sender_kp);

        let db = InMemoryStateDB::new();
        let mut snap = db.new_for_check();
        snap.set_account(
            sender,
            Account {
                balance: BigUint::from(10_000_000_000_000_000_000u128),
                nonce: 1,
                epoch: 0,
            },
        );

        let tx = signed_tx(
            &sender_kp,
            TxCommon {
                kind: TxKind::Regular,
                epoch: 0,
                account_nonce: 3,
                to: Some(Address([1u8; crate::types::ADDRESS_LEN])),
                ..Default::default()
            },
        );

        assert!(matches!(
            apply_tx_on_state(&mut snap, &tx, 0, 10),
            Err(ChainError::BadNonce { .. })
        ));
    }

    #[test]
    fn stale_epoch_tx_is_rejected() {
        let sender_kp = keypair(5);
        let sender = addr_of(&sender_kp);

        let db = InMemoryStateDB::new();
        let mut snap = db.new_for_check();
        snap.set_account(sender, Account::default());
        snap.set_global(crate::types::Global {
            epoch: 1,
            next_epoch_block: 200,
        });

        let tx = signed_tx(
            &sender_kp,
            TxCommon {
                kind: TxKind::Regular,
                epoch: 0,
                account_nonce: 1,
                to: Some(Address([1u8; crate::types::ADDRESS_LEN])),
                ..Default::default()
            },
        );

        assert!(matches!(
            apply_tx_on_state(&mut snap, &tx, 0, 10),
            Err(ChainError::InvalidEpoch { .. })
        ));
    }

    #[test]
    fn nonce_resets_to_one_after_an_epoch_change() {
        let sender_kp = keypair(6);
        let sender = addr_of(&sender_kp);

        let db = InMemoryStateDB::new();
        let mut snap = db.new_for_check();
        snap.set_account(
            sender,
            Account {
                balance: BigUint::from(10_000_000_000_000_000_000u128),
                nonce: 9,
                epoch: 0,
            },
        );
        snap.set_global(crate::types::Global {
            epoch: 1,
            next_epoch_block: 200,
        });

        let tx = signed_tx(
            &sender_kp,
            TxCommon {
                kind: TxKind::Regular,
                epoch: 1,
                account_nonce: 1,
                to: Some(Address([1u8; crate::types::ADDRESS_LEN])),
                ..Default::default()
            },
        );

        apply_tx_on_state(&mut snap, &tx, 0, 10).expect("apply after epoch reset");
        assert_eq!(snap.account(&sender).nonce, 1);
        assert_eq!(snap.account(&sender).epoch, 1);
    }

    #[test]
    fn invite_requires_a_verified_sender_with_slots_left() {
        let sender_kp = keypair(3);
        let sender = addr_of(&sender_kp);
        let to = Address([4u8; crate::types::ADDRESS_LEN]);

        let db = InMemoryStateDB::new();
        let mut snap = db.new_for_check();
        snap.set_account(
            sender,
            Account {
                balance: BigUint::from(10_000_000_000_000_000_000u128),
                nonce: 0,
                epoch: 0,
            },
        );
        snap.set_identity(
            sender,
            Identity {
                state: IdentityState::Verified,
                stake: BigUint::from(1u32),
                invites_remaining: 1,
            },
        );

        let tx = signed_tx(
            &sender_kp,
            TxCommon {
                kind: TxKind::Invite,
                epoch: 0,
                account_nonce: 1,
                to: Some(to),
                ..Default::default()
            },
        );

        apply_tx_on_state(&mut snap, &tx, 0, 10).expect("apply invite");
        assert_eq!(snap.identity(&to).state, IdentityState::Invite);
        assert_eq!(snap.identity(&sender).invites_remaining, 0);
        assert!(snap.account(&to).balance > BigUint::zero());
    }

    #[test]
    fn invite_with_a_nonzero_amount_charges_sender_and_credits_recipient() {
        let sender_kp = keypair(7);
        let sender = addr_of(&sender_kp);
        let to = Address([6u8; crate::types::ADDRESS_LEN]);

        let db = InMemoryStateDB::new();
        let mut snap = db.new_for_check();
        snap.set_account(
            sender,
            Account {
                balance: BigUint::from(100_000_000_000_000_000_000u128),
                nonce: 0,
                epoch: 0,
            },
        );
        snap.set_identity(
            sender,
            Identity {
                state: IdentityState::Verified,
                stake: BigUint::from(1u32),
                invites_remaining: 1,
            },
        );

        let amount = BigUint::from(3_000_000_000_000_000_000u128);
        let tx = signed_tx(
            &sender_kp,
            TxCommon {
                kind: TxKind::Invite,
                epoch: 0,
                account_nonce: 1,
                to: Some(to),
                amount: amount.clone(),
                ..Default::default()
            },
        );
        let size = rlp::encode(&tx).len() as u64;
        let fee = compute_fee(TxKind::Invite, 10, size);
        let surcharge = crate::fee::invite_surcharge(10);

        let sender_balance_before = snap.account(&sender).balance.clone();
        apply_tx_on_state(&mut snap, &tx, 0, 10).expect("apply invite with amount");

        assert_eq!(
            snap.account(&sender).balance,
            sender_balance_before - (&amount + &fee + &surcharge)
        );
        assert_eq!(snap.account(&to).balance, amount + surcharge);
    }

    #[test]
    fn activation_rejects_a_nonzero_amount() {
        let sender_kp = keypair(9);
        let sender = addr_of(&sender_kp);

        let db = InMemoryStateDB::new();
        let mut snap = db.new_for_check();
        snap.set_identity(
            sender,
            Identity {
                state: IdentityState::Invite,
                stake: BigUint::zero(),
                invites_remaining: 0,
            },
        );

        let tx = signed_tx(
            &sender_kp,
            TxCommon {
                kind: TxKind::Activation,
                epoch: 0,
                account_nonce: 1,
                to: Some(Address([1u8; crate::types::ADDRESS_LEN])),
                amount: BigUint::from(1u32),
                ..Default::default()
            },
        );

        assert!(matches!(
            apply_tx_on_state(&mut snap, &tx, 0, 10),
            Err(ChainError::UnexpectedAmount { .. })
        ));
    }

    #[test]
    fn kill_rejects_a_nonzero_amount() {
        let sender_kp = keypair(10);
        let sender = addr_of(&sender_kp);

        let db = InMemoryStateDB::new();
        let mut snap = db.new_for_check();
        snap.set_identity(sender, Identity::default());

        let tx = signed_tx(
            &sender_kp,
            TxCommon {
                kind: TxKind::Kill,
                epoch: 0,
                account_nonce: 1,
                amount: BigUint::from(1u32),
                ..Default::default()
            },
        );

        assert!(matches!(
            apply_tx_on_state(&mut snap, &tx, 0, 10),
            Err(ChainError::UnexpectedAmount { .. })
        ));
    }

    #[test]
    fn activation_kills_sender_and_verifies_recipient() {
        let sender_kp = keypair(4);
        let sender = addr_of(&sender_kp);
        let to = Address([7u8; crate::types::ADDRESS_LEN]);

        let db = InMemoryStateDB::new();
        let mut snap = db.new_for_check();
        snap.set_account(
            sender,
            Account {
                balance: BigUint::from(100_000_000_000_000_000_000u128),
                nonce: 0,
                epoch: 0,
            },
        );
        snap.set_identity(
            sender,
            Identity {
                state: IdentityState::Invite,
                stake: BigUint::zero(),
                invites_remaining: 0,
            },
        );

        let tx = signed_tx(
            &sender_kp,
            TxCommon {
                kind: TxKind::Activation,
                epoch: 0,
                account_nonce: 1,
                to: Some(to),
                ..Default::default()
            },
        );

        apply_tx_on_state(&mut snap, &tx, 0, 10).expect("apply activation");
        assert_eq!(snap.identity(&sender).state, IdentityState::Killed);
        assert_eq!(snap.account(&sender).balance, BigUint::zero());
        assert_eq!(snap.identity(&to).state, IdentityState::Verified);
        assert!(snap.account(&to).balance > BigUint::zero());
    }

    #[test]
    fn kill_leaves_stake_untouched() {
        let sender_kp = keypair(8);
        let sender = addr_of(&sender_kp);

        let db = InMemoryStateDB::new();
        let mut snap = db.new_for_check();
        snap.set_account(
            sender,
            Account {
                balance: BigUint::from(10_000_000_000_000_000_000u128),
                nonce: 0,
                epoch: 0,
            },
        );
        snap.set_identity(
            sender,
            Identity {
                state: IdentityState::Verified,
                stake: BigUint::from(5_000_000_000_000_000_000u128),
                invites_remaining: 2,
            },
        );

        let tx = signed_tx(
            &sender_kp,
            TxCommon {
                kind: TxKind::Kill,
                epoch: 0,
                account_nonce: 1,
                ..Default::default()
            },
        );

        apply_tx_on_state(&mut snap, &tx, 0, 10).expect("apply kill");
        let identity = snap.identity(&sender);
        assert_eq!(identity.state, IdentityState::Killed);
        assert_eq!(identity.stake, BigUint::from(5_000_000_000_000_000_000u128));
        assert_eq!(snap.account(&sender).balance, BigUint::from(10_000_000_000_000_000_000u128));
    }
}
