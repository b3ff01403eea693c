// Copyright (c) 2026 Ledgerflow
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

mod common;

use common::message_ref;
use ledgerflow::core::notary::router::{type_index, NotaryRouter, RoutingError};
use ledgerflow::core::types::{Party, PublicKey};

fn notaries(n: usize) -> Vec<Party> {
    (0..n).map(|i| Party::new(format!("Notary-{i}"), PublicKey([i as u8 + 1; 32]))).collect()
}

#[test]
fn post_routes_to_the_same_notary_every_time() {
    let router = NotaryRouter::new(notaries(3));
    let first = router.route_by_type("POST").unwrap().clone();
    for _ in 0..100 {
        assert_eq!(router.route_by_type("POST").unwrap(), &first);
    }
    let idx = type_index("POST", 3).unwrap();
    assert_eq!(first.name, format!("Notary-{idx}"));
}

#[test]
fn routing_needs_a_notary_with_the_computed_name() {
    let router = NotaryRouter::new(vec![
        Party::new("Alpha", PublicKey([1; 32])),
        Party::new("Beta", PublicKey([2; 32])),
    ]);
    assert!(matches!(router.route_by_type("POST"), Err(RoutingError::NoMatchingNotary(_))));
    assert_eq!(
        NotaryRouter::new(Vec::new()).route_by_type("POST"),
        Err(RoutingError::NoNotaryFound)
    );
}

#[test]
fn default_is_first_registered() {
    let router = NotaryRouter::new(notaries(3));
    assert_eq!(router.default_notary().unwrap().name, "Notary-0");
    assert_eq!(NotaryRouter::new(Vec::new()).default_notary(), Err(RoutingError::NoNotaryFound));
}

#[test]
fn majority_picks_the_most_common_notary() {
    let ns = notaries(3);
    let (a, b) = (Party::new("A", PublicKey([9; 32])), Party::new("B", PublicKey([8; 32])));
    let inputs = vec![
        message_ref(&a, &b, "POST", &ns[2], b"1"),
        message_ref(&a, &b, "POST", &ns[1], b"2"),
        message_ref(&a, &b, "POST", &ns[2], b"3"),
    ];
    assert_eq!(NotaryRouter::new(ns.clone()).majority(&inputs).unwrap(), ns[2]);
}

#[test]
fn majority_ties_go_to_the_smallest_name() {
    let ns = notaries(3);
    let (a, b) = (Party::new("A", PublicKey([9; 32])), Party::new("B", PublicKey([8; 32])));
    let forward = vec![
        message_ref(&a, &b, "POST", &ns[2], b"1"),
        message_ref(&a, &b, "POST", &ns[1], b"2"),
    ];
    let mut backward = forward.clone();
    backward.reverse();
    let router = NotaryRouter::new(ns.clone());
    assert_eq!(router.majority(&forward).unwrap(), ns[1]);
    assert_eq!(router.majority(&backward).unwrap(), ns[1]);
}

#[test]
fn majority_of_nothing_is_an_error() {
    let router = NotaryRouter::new(notaries(3));
    assert_eq!(router.majority(&[]), Err(RoutingError::NoNotaryFound));
}
