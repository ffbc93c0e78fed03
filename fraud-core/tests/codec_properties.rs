//! Property tests for the erasure extension.

use fraud_core::{extend_shares, Axis, ExtendedSquare};
use proptest::prelude::*;

fn shares(k: usize, len: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), len), k)
}

proptest! {
    #[test]
    fn extension_is_linear(k in 1usize..8, a in shares(8, 4), b in shares(8, 4)) {
        let a = &a[..k];
        let b = &b[..k];
        let sum: Vec<Vec<u8>> = a
            .iter()
            .zip(b)
            .map(|(x, y)| x.iter().zip(y).map(|(p, q)| p ^ q).collect())
            .collect();

        let ea = extend_shares(a).unwrap();
        let eb = extend_shares(b).unwrap();
        let es = extend_shares(&sum).unwrap();

        for j in 0..k {
            let expected: Vec<u8> = ea[j].iter().zip(&eb[j]).map(|(p, q)| p ^ q).collect();
            prop_assert_eq!(&es[j], &expected);
        }
    }

    #[test]
    fn every_line_of_a_square_is_consistent(k in 1usize..6, seed in any::<u8>()) {
        let original: Vec<Vec<u8>> = (0..k * k)
            .map(|i| vec![seed.wrapping_add(i as u8); 4])
            .collect();
        let square = ExtendedSquare::from_original(original).unwrap();

        for axis in [Axis::Row, Axis::Column] {
            for index in 0..square.width() {
                let line = square.axis(axis, index).unwrap();
                let parity = extend_shares(&line[..k]).unwrap();
                let actual: Vec<Vec<u8>> = line[k..].iter().map(|s| s.to_vec()).collect();
                prop_assert_eq!(parity, actual);
            }
        }
    }
}
