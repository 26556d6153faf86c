use spdg::{Capability, Onion, Outcome, Reason, Status};

#[test]
fn test_layer_peeling_order() {
    // Pushing P1 then P2 must peel back as P2, then P1.
    let mut onion = Onion::new();
    let first = onion.push(b"p1", false).capability.unwrap();
    let second = onion.push(b"p2", false).capability.unwrap();

    // The inner layer's capability does nothing while the outer layer is present.
    let result = onion.pop(&first);
    assert_eq!(result.outcome, Outcome::no(Reason::Key), "Peeled an inner layer out of order!");
    assert_eq!(onion.len(), 2);

    assert_eq!(onion.pop(&second).plaintext, b"p2");
    assert_eq!(onion.pop(&first).plaintext, b"p1");
    assert!(onion.is_empty());
}

#[test]
fn test_wrong_capability_leaves_onion_intact() {
    let mut onion = Onion::new();
    let owner = onion.push(b"guarded secret", false).capability.unwrap();
    let stranger = Capability::generate().unwrap();

    let (plaintext, status, reason) = onion.pop(&stranger).into_parts();
    assert!(plaintext.is_empty());
    assert_eq!((status, reason), (Status::No, Reason::Key));
    assert_eq!(onion.len(), 1, "A failed peel removed a layer!");

    // Repeated failures are just as harmless.
    for _ in 0..3 {
        assert!(onion.pop(&stranger).outcome.is_no());
    }
    assert_eq!(onion.pop(&owner).plaintext, b"guarded secret");
}

#[test]
fn test_capability_reuse_after_peel() {
    let mut onion = Onion::new();
    let inner = onion.push(b"inner", false).capability.unwrap();
    let outer = onion.push(b"outer", false).capability.unwrap();

    assert!(onion.pop(&outer).outcome.is_ok());

    // The spent capability now faces the inner layer and simply fails.
    assert_eq!(onion.pop(&outer).outcome, Outcome::no(Reason::Key));
    assert_eq!(onion.len(), 1);

    assert!(onion.pop(&inner).outcome.is_ok());
    // Against an empty onion there is nothing left to peel.
    assert_eq!(onion.pop(&inner).outcome, Outcome::no(Reason::ReadOnly));
}

#[test]
fn test_each_push_is_an_independent_envelope() {
    let mut onion = Onion::new();
    let small = onion.push(b"a", false).capability.unwrap();
    let _large = onion.push(&[7u8; 4096], false).capability.unwrap();

    // Outer ciphertext wraps its own payload only, not the layer below.
    let sizes: Vec<usize> = onion.iter().map(|layer| layer.ciphertext().len()).collect();
    assert!(sizes[0] > 4096);
    assert!(sizes[1] < 128);
    assert_ne!(onion.top_key(), Some(&small.public_key()));
}
