//! End-to-end tests: chain events → router → queue → finality / rollback →
//! store, against both the LMDB backend and the in-memory store.

use shroud_crypto::{commitment_hash, encrypt_note, new_commitment_record, NoteSecrets, ZkpKeys};
use shroud_nullables::NullStore;
use shroud_store::{BlockStore, CommitmentStore, LedgerStore, TransactionStore, TreeStore};
use shroud_store_lmdb::LmdbEnvironment;
use shroud_sync::{
    handler, Dispatch, KeyRing, Lane, LanePriority, ShutdownController, SyncConfig,
    SyncEngine, SyncError,
};
use shroud_tree::compute_root;
use shroud_types::{
    BlockProposed, ChainEvent, CommitmentHash, EthAddress, EventPayload, Hash32, L1TxHash,
    L2Block, L2Transaction, NullifierHash, Preimage, Salt, TokenId, TransactionType, TxHash,
    ZkpPublicKey,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, timeout};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const TOKEN: EthAddress = EthAddress::new([0xaa; 20]);

fn wallet_keys() -> ZkpKeys {
    ZkpKeys::from_root_key(&[7; 32])
}

fn config() -> SyncConfig {
    SyncConfig {
        tree_height: 10,
        ..SyncConfig::default()
    }
}

fn temp_lmdb() -> (tempfile::TempDir, Arc<dyn LedgerStore>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let env = LmdbEnvironment::open(dir.path(), 64 * 1024 * 1024).expect("open env");
    (dir, Arc::new(env))
}

fn engine(store: Arc<dyn LedgerStore>, shutdown: &ShutdownController) -> SyncEngine {
    SyncEngine::new(store, KeyRing::new(vec![wallet_keys()]), config(), shutdown)
        .expect("engine")
}

fn preimage(owner: ZkpPublicKey, value: u128, salt: u8) -> Preimage {
    Preimage {
        erc_address: TOKEN,
        token_id: TokenId::ZERO,
        value,
        owner,
        salt: Salt::new([salt; 32]),
    }
}

/// A transfer paying `value` to `owner`, spending an unrelated nullifier.
fn transfer_to(owner: ZkpPublicKey, value: u128, salt: u8) -> (CommitmentHash, L2Transaction) {
    let preimage = preimage(owner, value, salt);
    let hash = commitment_hash(&preimage);
    let note = encrypt_note(&NoteSecrets::from_preimage(&preimage), &owner).expect("encrypt");
    let tx = L2Transaction {
        transaction_hash: TxHash::new([salt; 32]),
        transaction_type: TransactionType::SingleTransfer,
        erc_address: EthAddress::ZERO,
        token_id: TokenId::ZERO,
        value: 0,
        fee: 0,
        commitments: vec![hash, CommitmentHash::ZERO],
        nullifiers: vec![NullifierHash::new([salt.wrapping_add(128); 32]), NullifierHash::ZERO],
        encrypted_note: Some(note),
    };
    (hash, tx)
}

fn withdraw(nullifier: NullifierHash, tag: u8) -> L2Transaction {
    L2Transaction {
        transaction_hash: TxHash::new([tag; 32]),
        transaction_type: TransactionType::Withdraw,
        erc_address: TOKEN,
        token_id: TokenId::ZERO,
        value: 10,
        fee: 0,
        commitments: vec![CommitmentHash::ZERO],
        nullifiers: vec![nullifier],
        encrypted_note: None,
    }
}

fn deposit(hash: CommitmentHash, tag: u8) -> L2Transaction {
    L2Transaction {
        transaction_hash: TxHash::new([tag; 32]),
        transaction_type: TransactionType::Deposit,
        erc_address: TOKEN,
        token_id: TokenId::ZERO,
        value: 30,
        fee: 0,
        commitments: vec![hash],
        nullifiers: vec![],
        encrypted_note: None,
    }
}

fn proposal(number: u64, l1_tag: u8, transactions: Vec<L2Transaction>) -> ChainEvent {
    ChainEvent::block_proposed(BlockProposed {
        block_number: 10_000 + number,
        transaction_hash: L1TxHash::new([l1_tag; 32]),
        block_timestamp: 1_700_000_000 + number,
        block: L2Block {
            block_number_l2: number,
            proposer: EthAddress::new([1; 20]),
            root: Hash32::ZERO,
            leaf_count: 0,
            previous_block_hash: Hash32::ZERO,
            transaction_hashes_root: Hash32::ZERO,
            transaction_hashes: transactions.iter().map(|t| t.transaction_hash).collect(),
        },
        transactions,
    })
}

async fn settle(engine: &SyncEngine) {
    timeout(Duration::from_secs(10), engine.flush())
        .await
        .expect("flush timed out")
        .expect("flush");
}

// ---------------------------------------------------------------------------
// 1. Block finality
// ---------------------------------------------------------------------------

#[tokio::test]
async fn incoming_commitment_is_recovered_and_witnessed() {
    let (_dir, store) = temp_lmdb();
    let shutdown = ShutdownController::new();
    let engine = engine(Arc::clone(&store), &shutdown);
    let owner = wallet_keys().zkp_public_key;

    let (_, other) = transfer_to(ZkpKeys::from_root_key(&[99; 32]).zkp_public_key, 5, 1);
    let (mine, tx) = transfer_to(owner, 40, 2);
    engine.dispatch(proposal(0, 1, vec![other, tx])).unwrap();
    settle(&engine).await;

    let record = store.get_commitment(&mine).unwrap().expect("recovered");
    assert_eq!(record.on_chain, Some(0));
    assert_eq!(store.balance_of(&owner, &TOKEN).unwrap(), 40);
    let witness = record.witness.expect("witness");
    assert_eq!(witness.leaf_index, 1);
    assert_eq!(
        compute_root(&Hash32::from(mine), witness.leaf_index, &witness.sibling_path),
        store.get_tree(0).unwrap().unwrap().snapshot.root
    );
    assert!(store.get_block(0).unwrap().is_some());
    assert_eq!(engine.metrics().commitments_decrypted.get(), 1);
    assert_eq!(engine.metrics().tree_leaf_count.get(), 2);
}

#[tokio::test]
async fn replaying_a_block_is_idempotent() {
    let (_dir, store) = temp_lmdb();
    let shutdown = ShutdownController::new();
    let engine = engine(Arc::clone(&store), &shutdown);
    let (_, tx) = transfer_to(wallet_keys().zkp_public_key, 40, 2);
    let event = proposal(0, 1, vec![tx]);

    engine.dispatch(event.clone()).unwrap();
    settle(&engine).await;
    let commitments = store.iter_commitments().unwrap();
    let transactions = store.iter_transactions().unwrap();
    let trees = store.iter_trees().unwrap();

    engine.dispatch(event).unwrap();
    settle(&engine).await;
    assert_eq!(store.iter_commitments().unwrap(), commitments);
    assert_eq!(store.iter_transactions().unwrap(), transactions);
    assert_eq!(store.iter_trees().unwrap(), trees);
    assert_eq!(trees[0].snapshot.leaf_count, 1);
}

#[tokio::test]
async fn re_mined_block_overwrites_l1_fields() {
    let store: Arc<dyn LedgerStore> = Arc::new(NullStore::new());
    let shutdown = ShutdownController::new();
    let engine = engine(Arc::clone(&store), &shutdown);
    let (mine, tx) = transfer_to(wallet_keys().zkp_public_key, 40, 2);

    engine.dispatch(proposal(0, 1, vec![tx.clone()])).unwrap();
    engine.dispatch(proposal(0, 2, vec![tx])).unwrap();
    settle(&engine).await;

    let block = store.get_block(0).unwrap().unwrap();
    assert_eq!(block.transaction_hash_l1, L1TxHash::new([2; 32]));
    let record = store.get_transaction(&TxHash::new([2; 32])).unwrap().unwrap();
    assert_eq!(record.transaction_hash_l1, Some(L1TxHash::new([2; 32])));
    // The commitment keeps its first confirmation.
    let commitment = store.get_commitment(&mine).unwrap().unwrap();
    assert_eq!(commitment.committed_l1, Some(L1TxHash::new([1; 32])));
}

// ---------------------------------------------------------------------------
// 2. Rollback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rollback_reverses_spend_and_keeps_deposit() {
    let (_dir, store) = temp_lmdb();
    let shutdown = ShutdownController::new();
    let engine = engine(Arc::clone(&store), &shutdown);
    let keys = wallet_keys();
    let owner = keys.zkp_public_key;

    // Received at block 1.
    let (received, tx) = transfer_to(owner, 10, 3);
    engine.dispatch(proposal(1, 1, vec![tx])).unwrap();
    settle(&engine).await;
    let nullifier = store.get_commitment(&received).unwrap().unwrap().nullifier;

    // Spent locally, then confirmed at block 10.
    store
        .mark_nullified(&[received], TxHash::new([50; 32]), TransactionType::Withdraw)
        .unwrap();
    engine.dispatch(proposal(10, 10, vec![withdraw(nullifier, 50)])).unwrap();

    // A deposit of ours confirmed at block 12.
    let deposit_record = new_commitment_record(preimage(owner, 30, 4), &keys.nullifier_key).deposited();
    store.put_commitment(&deposit_record).unwrap();
    engine
        .dispatch(proposal(12, 12, vec![deposit(deposit_record.hash, 60)]))
        .unwrap();
    settle(&engine).await;

    let spent = store.get_commitment(&received).unwrap().unwrap();
    assert_eq!(spent.nullified_on_chain, Some(10));
    assert_eq!(store.get_commitment(&deposit_record.hash).unwrap().unwrap().on_chain, Some(12));

    engine.dispatch(ChainEvent::rollback(8)).unwrap();
    settle(&engine).await;

    let spent = store.get_commitment(&received).unwrap().unwrap();
    assert!(spent.is_nullified);
    assert_eq!(spent.nullified_on_chain, None);
    assert_eq!(spent.on_chain, Some(1));
    assert_eq!(store.balance_of(&owner, &TOKEN).unwrap(), 0);

    let deposit = store.get_commitment(&deposit_record.hash).unwrap().expect("deposit survives");
    assert_eq!(deposit.on_chain, None);

    assert!(store.get_block(10).unwrap().is_none());
    assert!(store.get_block(12).unwrap().is_none());
    assert!(store.get_block(1).unwrap().is_some());
    assert!(store.get_transaction(&TxHash::new([50; 32])).unwrap().is_none());
    assert_eq!(store.latest_tree().unwrap().unwrap().block_number_l2, 1);
    assert_eq!(engine.metrics().rollbacks.get(), 1);
}

#[tokio::test]
async fn rollback_then_replay_restores_state() {
    let store: Arc<dyn LedgerStore> = Arc::new(NullStore::new());
    let shutdown = ShutdownController::new();
    let engine = engine(Arc::clone(&store), &shutdown);
    let owner = wallet_keys().zkp_public_key;
    let (first, tx1) = transfer_to(owner, 10, 3);
    let (second, tx2) = transfer_to(owner, 20, 4);
    let block2 = proposal(2, 2, vec![tx2]);

    engine.dispatch(proposal(1, 1, vec![tx1])).unwrap();
    engine.dispatch(block2.clone()).unwrap();
    settle(&engine).await;
    let trees = store.iter_trees().unwrap();

    engine.dispatch(ChainEvent::rollback(1)).unwrap();
    settle(&engine).await;
    assert!(store.get_commitment(&second).unwrap().is_none());
    assert!(store.get_commitment(&first).unwrap().is_some());

    engine.dispatch(block2).unwrap();
    settle(&engine).await;
    assert_eq!(store.iter_trees().unwrap(), trees);
    assert_eq!(store.balance_of(&owner, &TOKEN).unwrap(), 30);
}

#[tokio::test]
async fn removed_proposal_undoes_its_l1_transaction() {
    let store: Arc<dyn LedgerStore> = Arc::new(NullStore::new());
    let shutdown = ShutdownController::new();
    let engine = engine(Arc::clone(&store), &shutdown);
    let (mine, tx) = transfer_to(wallet_keys().zkp_public_key, 40, 2);
    let event = proposal(0, 1, vec![tx]);

    engine.dispatch(event.clone()).unwrap();
    engine.dispatch(event.into_removed()).unwrap();
    settle(&engine).await;

    let record = store.get_commitment(&mine).unwrap().unwrap();
    assert_eq!(record.on_chain, None);
    assert_eq!(record.witness, None);
    assert_eq!(store.get_block(0).unwrap().unwrap().block_number_l1, None);
    assert!(store.get_tree(0).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// 3. Routing and queue behaviour
// ---------------------------------------------------------------------------

fn named(name: &str) -> ChainEvent {
    ChainEvent {
        name: name.to_string(),
        removed: false,
        payload: EventPayload::Other(serde_json::Value::Null),
    }
}

#[tokio::test]
async fn fast_lane_runs_strictly_in_order() {
    let store: Arc<dyn LedgerStore> = Arc::new(NullStore::new());
    let shutdown = ShutdownController::new();
    let mut engine = engine(store, &shutdown);
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    for (name, lane, delay) in [("A", Lane::Fast, 40), ("B", Lane::Fast, 20), ("C", Lane::Fast, 0), ("D", Lane::Slow, 0)] {
        let log = Arc::clone(&log);
        engine.router_mut().register(
            name,
            lane,
            handler(move |event: ChainEvent| {
                let log = Arc::clone(&log);
                async move {
                    sleep(Duration::from_millis(delay)).await;
                    log.lock().unwrap().push(event.name);
                    Ok::<(), SyncError>(())
                }
            }),
            None,
        );
    }
    for name in ["A", "B", "C", "D"] {
        assert!(matches!(engine.dispatch(named(name)).unwrap(), Dispatch::Queued(_)));
    }
    settle(&engine).await;

    let log = log.lock().unwrap().clone();
    let fast: Vec<&str> = log.iter().map(String::as_str).filter(|n| *n != "D").collect();
    assert_eq!(fast, vec!["A", "B", "C"]);
    assert!(log.contains(&"D".to_string()));
}

#[tokio::test]
async fn unknown_events_are_dropped() {
    let store: Arc<dyn LedgerStore> = Arc::new(NullStore::new());
    let shutdown = ShutdownController::new();
    let engine = engine(store, &shutdown);

    assert_eq!(engine.dispatch(named("NewCurrentProposer")).unwrap(), Dispatch::Dropped);
    assert_eq!(
        engine.dispatch(ChainEvent::rollback(1).into_removed()).unwrap(),
        Dispatch::Dropped
    );
    assert_eq!(engine.metrics().events_dropped.get(), 2);
}

#[tokio::test]
async fn failed_task_does_not_stop_the_lane() {
    let store: Arc<dyn LedgerStore> = Arc::new(NullStore::new());
    let shutdown = ShutdownController::new();
    let engine = engine(Arc::clone(&store), &shutdown);

    // A BlockProposed name with the wrong payload fails inside the lane.
    let mut bad = ChainEvent::rollback(3);
    bad.name = "BlockProposed".to_string();
    engine.dispatch(bad).unwrap();

    let (mine, tx) = transfer_to(wallet_keys().zkp_public_key, 40, 2);
    engine.dispatch(proposal(0, 1, vec![tx])).unwrap();
    settle(&engine).await;

    assert_eq!(engine.metrics().failed_tasks.get(), 1);
    assert!(store.get_commitment(&mine).unwrap().is_some());
}

#[tokio::test]
async fn fast_first_priority_holds_back_slow_lane() {
    let store: Arc<dyn LedgerStore> = Arc::new(NullStore::new());
    let shutdown = ShutdownController::new();
    let config = SyncConfig {
        lane_priority: LanePriority::FastFirst,
        ..config()
    };
    let mut engine = SyncEngine::new(store, KeyRing::default(), config, &shutdown).unwrap();
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    for (name, lane, delay, tag) in [("Slowish", Lane::Fast, 60u64, "fast"), ("Background", Lane::Slow, 0, "slow")] {
        let log = Arc::clone(&log);
        engine.router_mut().register(
            name,
            lane,
            handler(move |_event: ChainEvent| {
                let log = Arc::clone(&log);
                async move {
                    sleep(Duration::from_millis(delay)).await;
                    log.lock().unwrap().push(tag);
                    Ok::<(), SyncError>(())
                }
            }),
            None,
        );
    }
    engine.dispatch(named("Slowish")).unwrap();
    engine.dispatch(named("Background")).unwrap();
    settle(&engine).await;
    assert_eq!(*log.lock().unwrap(), vec!["fast", "slow"]);
}

#[tokio::test]
async fn close_drains_and_stops() {
    let store: Arc<dyn LedgerStore> = Arc::new(NullStore::new());
    let shutdown = ShutdownController::new();
    let engine = engine(Arc::clone(&store), &shutdown);
    let (mine, tx) = transfer_to(wallet_keys().zkp_public_key, 40, 2);
    engine.dispatch(proposal(0, 1, vec![tx])).unwrap();

    timeout(Duration::from_secs(10), engine.close()).await.unwrap();
    assert!(store.get_commitment(&mine).unwrap().is_some());
}
