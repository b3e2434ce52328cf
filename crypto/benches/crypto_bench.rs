use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shroud_crypto::{NoteSecrets, ZkpKeys};
use shroud_types::{EthAddress, Preimage, Salt, TokenId};

fn preimage(keys: &ZkpKeys) -> Preimage {
    Preimage {
        erc_address: EthAddress::new([1; 20]),
        token_id: TokenId::ZERO,
        value: 42,
        owner: keys.zkp_public_key,
        salt: Salt::new([2; 32]),
    }
}

fn commitment_hash_bench(c: &mut Criterion) {
    let keys = ZkpKeys::from_root_key(&[1; 32]);
    let p = preimage(&keys);

    c.bench_function("commitment_hash", |b| {
        b.iter(|| shroud_crypto::commitment_hash(black_box(&p)))
    });
}

fn note_decrypt_bench(c: &mut Criterion) {
    let keys = ZkpKeys::from_root_key(&[1; 32]);
    let secrets = NoteSecrets::from_preimage(&preimage(&keys));
    let note = shroud_crypto::encrypt_note_with(&secrets, &keys.zkp_public_key, [5; 32]).unwrap();

    c.bench_function("note_decrypt_own", |b| {
        b.iter(|| shroud_crypto::decrypt_note(black_box(&keys.zkp_private_key), &note))
    });
}

fn note_decrypt_foreign_bench(c: &mut Criterion) {
    let keys = ZkpKeys::from_root_key(&[1; 32]);
    let other = ZkpKeys::from_root_key(&[2; 32]);
    let secrets = NoteSecrets::from_preimage(&preimage(&keys));
    let note = shroud_crypto::encrypt_note_with(&secrets, &keys.zkp_public_key, [5; 32]).unwrap();

    c.bench_function("note_decrypt_foreign", |b| {
        b.iter(|| shroud_crypto::decrypt_note(black_box(&other.zkp_private_key), &note))
    });
}

criterion_group!(
    benches,
    commitment_hash_bench,
    note_decrypt_bench,
    note_decrypt_foreign_bench
);
criterion_main!(benches);
