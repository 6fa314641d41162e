//! Slicing Tests - Object Graph Scenarios
//!
//! These tests send object graphs from a sender that knows every class to a
//! receiver built with an older subset of them:
//! - Self and mutual cycles
//! - Unknown derived classes sliced to a known base
//! - Completely unknown classes
//! - Sequences and dictionaries sharing instances

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use common::*;
use orb_wire::{
    decode_value, decode_values, encode_values, Graph, Handle, InputStream, OutputStream,
    StaticTypeId, TypeRegistry, UnknownValue, WireError, ROOT_TYPE_ID,
};

fn encode_root(graph: &Graph, root: Handle) -> Bytes {
    encode_values(graph, &[Some(root)]).unwrap()
}

/// Test: B whose pb points at itself comes back pointing at itself
#[test]
fn test_one_element_cycle() {
    init_logging();

    let mut graph = Graph::new();
    let root = graph.insert(b("B1.sb", None));
    graph.get_mut_as::<B>(root).unwrap().pb = Some(root);

    let (decoded, handle) = decode_value(encode_root(&graph, root), &receiver_types(), B::TYPE_ID).unwrap();
    let handle = handle.unwrap();
    let value = decoded.get_as::<B>(handle).unwrap();

    assert_eq!(value.sb, "B1.sb");
    assert_eq!(value.pb, Some(handle));
    assert_eq!(decoded.len(), 1);
}

/// Test: two instances pointing at each other keep their identities
#[test]
fn test_two_element_cycle() {
    init_logging();

    let mut graph = Graph::new();
    let b1 = graph.insert(b("B1.sb", None));
    let b2 = graph.insert(b("B2.sb", Some(b1)));
    graph.get_mut_as::<B>(b1).unwrap().pb = Some(b2);

    let (decoded, root) = decode_value(encode_root(&graph, b1), &receiver_types(), B::TYPE_ID).unwrap();
    let first = root.unwrap();
    let second = decoded.get_as::<B>(first).unwrap().pb.unwrap();

    assert_ne!(first, second);
    assert_eq!(decoded.get_as::<B>(second).unwrap().sb, "B2.sb");
    assert_eq!(decoded.get_as::<B>(second).unwrap().pb, Some(first));
    assert_eq!(decoded.len(), 2);
}

/// Test: a known derived class arrives whole, its references to unknown
/// classes arrive sliced
#[test]
fn test_known_derived_with_unknown_member() {
    init_logging();

    let mut graph = Graph::new();
    let member = graph.insert(d3("D3.sb", None, "D3.sd3", None));
    let root = graph.insert(d1("D1.sb", None, "D1.sd1", Some(member)));

    let (decoded, root) = decode_value(encode_root(&graph, root), &receiver_types(), B::TYPE_ID).unwrap();
    let root = root.unwrap();
    let value = decoded.get_as::<D1>(root).unwrap();
    assert_eq!(value.base.sb, "D1.sb");
    assert_eq!(value.sd1, "D1.sd1");

    let member = value.pd1.unwrap();
    assert_eq!(decoded.type_id_of(member).unwrap(), B::TYPE_ID);
    assert_eq!(decoded.get_as::<B>(member).unwrap().sb, "D3.sb");
    assert_eq!(decoded.sliced_type_ids(member).unwrap(), [D3::TYPE_ID.to_string()]);
}

/// Test: an unknown most-derived class is sliced to B and cannot be
/// narrowed back to its original type
#[test]
fn test_unknown_derived_sliced_to_base() {
    init_logging();

    let mut graph = Graph::new();
    // only reachable through the slice the receiver discards
    let hidden = graph.insert(b("hidden", None));
    let root = graph.insert(d3("D3.sb", None, "D3.sd3", Some(hidden)));
    graph.get_mut_as::<B>(root).unwrap().pb = Some(root);

    let (decoded, root) = decode_value(encode_root(&graph, root), &receiver_types(), B::TYPE_ID).unwrap();
    let root = root.unwrap();

    assert_eq!(decoded.type_id_of(root).unwrap(), B::TYPE_ID);
    let value = decoded.get_as::<B>(root).unwrap();
    assert_eq!(value.sb, "D3.sb");
    assert_eq!(value.pb, Some(root));

    match decoded.get_as::<D3>(root) {
        Err(WireError::TypeMismatch { expected, actual }) => {
            assert_eq!(expected, D3::TYPE_ID);
            assert_eq!(actual, B::TYPE_ID);
        }
        other => panic!("expected type mismatch, got {:?}", other),
    }

    assert_eq!(decoded.sliced_type_ids(root).unwrap(), [D3::TYPE_ID.to_string()]);
    assert_eq!(decoded.len(), 1);
}

/// Test: the sender's own registry decodes the full type
#[test]
fn test_sender_keeps_derived_type() {
    let mut graph = Graph::new();
    let root = graph.insert(d3("D3.sb", None, "D3.sd3", None));

    let (decoded, root) = decode_value(encode_root(&graph, root), &sender_types(), B::TYPE_ID).unwrap();
    let value = decoded.get_as::<D3>(root.unwrap()).unwrap();
    assert_eq!(value.sd3, "D3.sd3");
    assert!(decoded.sliced_type_ids(root.unwrap()).unwrap().is_empty());
}

/// Test: preserved slices of a class hierarchy other than B
#[test]
fn test_sbs_hierarchy() {
    init_logging();

    let mut graph = Graph::new();
    let known = graph.insert(SBSKnownDerived {
        base: SBase { sb: "known.sb".to_string() },
        sbskd: "known.sbskd".to_string(),
    });
    let unknown = graph.insert(SBSUnknownDerived {
        base: SBase { sb: "unknown.sb".to_string() },
        sbsud: "unknown.sbsud".to_string(),
    });

    let bytes = encode_values(&graph, &[Some(known), Some(unknown)]).unwrap();
    let (decoded, roots) = decode_values(bytes, &receiver_types(), 2).unwrap();

    let known = roots[0].unwrap();
    assert_eq!(decoded.get_as::<SBSKnownDerived>(known).unwrap().sbskd, "known.sbskd");
    assert_eq!(decoded.get_as::<SBase>(known).unwrap().sb, "known.sb");

    let unknown = roots[1].unwrap();
    assert_eq!(decoded.type_id_of(unknown).unwrap(), SBase::TYPE_ID);
    assert_eq!(decoded.get_as::<SBase>(unknown).unwrap().sb, "unknown.sb");
}

/// Test: a class with no known slice at all decodes as an unknown value
#[test]
fn test_completely_unknown_class() {
    init_logging();

    let mut graph = Graph::new();
    let root = graph.insert(d2("D2.sb", None, "D2.sd2", None));
    let bytes = encode_root(&graph, root);

    // a receiver that knows none of the test classes
    let (decoded, root) = decode_value(bytes.clone(), &TypeRegistry::new(), ROOT_TYPE_ID).unwrap();
    let root = root.unwrap();
    assert_eq!(decoded.type_id_of(root).unwrap(), ROOT_TYPE_ID);
    assert!(decoded.get_as::<UnknownValue>(root).is_ok());
    assert!(decoded.get_as::<B>(root).is_err());
    assert_eq!(
        decoded.sliced_type_ids(root).unwrap(),
        [D2::TYPE_ID.to_string(), B::TYPE_ID.to_string()]
    );

    // asking for a class it cannot be is a mismatch
    let err = decode_value(bytes, &TypeRegistry::new(), B::TYPE_ID).unwrap_err();
    assert!(matches!(err, WireError::TypeMismatch { .. }));
}

/// Test: a root of an unrelated class is rejected
#[test]
fn test_expected_type_mismatch() {
    let mut graph = Graph::new();
    let root = graph.insert(SBase { sb: "s".to_string() });

    let err = decode_value(encode_root(&graph, root), &receiver_types(), B::TYPE_ID).unwrap_err();
    assert_eq!(
        err,
        WireError::TypeMismatch {
            expected: B::TYPE_ID.to_string(),
            actual: SBase::TYPE_ID.to_string(),
        }
    );
}

/// Test: two sequences in one payload refer to the same instances
#[test]
fn test_sequences_share_instances() {
    init_logging();

    let mut graph = Graph::new();
    let shared = graph.insert(d3("shared", None, "D3.sd3", None));
    let other = graph.insert(b("other", Some(shared)));
    let first = vec![Some(shared), Some(other), None];
    let second = vec![Some(other), Some(shared)];

    let mut out = OutputStream::with_graph(&graph);
    out.write(&first).unwrap();
    out.write(&second).unwrap();
    let bytes = out.finish().unwrap();

    let registry = receiver_types();
    let mut input = InputStream::new(bytes, &registry);
    let first: Vec<Option<Handle>> = input.read().unwrap();
    let second: Vec<Option<Handle>> = input.read().unwrap();
    let decoded = input.finish().unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(first[2], None);
    assert_eq!(first[0], second[1]);
    assert_eq!(first[1], second[0]);
    assert_eq!(decoded.len(), 2);

    let shared = first[0].unwrap();
    assert_eq!(decoded.get_as::<B>(first[1].unwrap()).unwrap().pb, Some(shared));
    assert_eq!(decoded.type_id_of(shared).unwrap(), B::TYPE_ID);
}

fn chain_of_d1(count: i32) -> (Graph, BTreeMap<i32, Option<Handle>>) {
    let mut graph = Graph::new();
    let mut dict = BTreeMap::new();
    let mut previous = None;
    for i in 0..count {
        let handle = graph.insert(d1(
            &format!("D1.{}", i),
            previous,
            &format!("D1.sd1.{}", i),
            None,
        ));
        dict.insert(i, Some(handle));
        previous = Some(handle);
    }
    (graph, dict)
}

fn decode_dict(bytes: Bytes, registry: &TypeRegistry) -> (Graph, BTreeMap<i32, Option<Handle>>) {
    let mut input = InputStream::new(bytes, registry);
    let dict = input.read().unwrap();
    (input.finish().unwrap(), dict)
}

/// Test: a dictionary echoed back re-keyed and partially sliced keeps the
/// predecessor chain the peer built
#[test]
fn test_dictionary_slicing_preserves_chain() {
    init_logging();

    // client -> peer: ten D1 each pointing at its predecessor
    let (graph, dict) = chain_of_d1(10);
    let mut out = OutputStream::with_graph(&graph);
    out.write(&dict).unwrap();
    let request = out.finish().unwrap();

    let (received, received_dict) = decode_dict(request, &sender_types());
    assert_eq!(received_dict.len(), 10);
    for i in 1..10 {
        let current = received.get_as::<D1>(received_dict[&i].unwrap()).unwrap();
        assert_eq!(current.base.pb, received_dict[&(i - 1)]);
    }

    // peer -> client: re-keyed, odd entries replaced by a class the client lacks
    let mut reply_graph = Graph::new();
    let mut reply = BTreeMap::new();
    let mut previous = None;
    for i in 0..10 {
        let sb = received.get_as::<B>(received_dict[&i].unwrap()).unwrap().sb.clone();
        let handle = if i % 2 == 1 {
            reply_graph.insert(d3(&sb, previous, "D3.sd3", None))
        } else {
            reply_graph.insert(d1(&sb, previous, "D1.sd1", None))
        };
        reply.insert(i * 20, Some(handle));
        previous = Some(handle);
    }
    let mut out = OutputStream::with_graph(&reply_graph);
    out.write(&reply).unwrap();
    let reply_bytes = out.finish().unwrap();

    let (decoded, dict) = decode_dict(reply_bytes, &receiver_types());
    assert_eq!(dict.len(), 10);
    assert_eq!(decoded.len(), 10);

    let mut previous = None;
    for i in 0..10 {
        let handle = dict[&(i * 20)].unwrap();
        let expected_type = if i % 2 == 1 { B::TYPE_ID } else { D1::TYPE_ID };
        assert_eq!(decoded.type_id_of(handle).unwrap(), expected_type);

        let value = decoded.get_as::<B>(handle).unwrap();
        assert_eq!(value.sb, format!("D1.{}", i));
        assert_eq!(value.pb, previous);
        previous = Some(handle);
    }
}

/// Test: a damaged payload fails as a whole and leaves the registry usable
#[test]
fn test_truncated_payload_fails_atomically() {
    init_logging();

    let (graph, dict) = chain_of_d1(4);
    let mut out = OutputStream::with_graph(&graph);
    out.write(&dict).unwrap();
    let bytes = out.finish().unwrap();
    let registry = receiver_types();

    for len in [1, bytes.len() / 2, bytes.len() - 1] {
        let mut input = InputStream::new(bytes.slice(..len), &registry);
        let result = input
            .read::<BTreeMap<i32, Option<Handle>>>()
            .and_then(|_| input.finish().map(|_| ()));
        assert!(result.is_err(), "decoding {} of {} bytes succeeded", len, bytes.len());
    }

    let (decoded, dict) = decode_dict(bytes, &registry);
    assert_eq!(dict.len(), 4);
    assert_eq!(decoded.len(), 4);
}

/// Test: payloads decoded on many threads at once do not interfere
#[test]
fn test_concurrent_decodes() {
    init_logging();

    let mut graph = Graph::new();
    let b1 = graph.insert(b("B1.sb", None));
    let b2 = graph.insert(d3("B2.sb", Some(b1), "D3.sd3", None));
    graph.get_mut_as::<B>(b1).unwrap().pb = Some(b2);
    let bytes = encode_root(&graph, b1);
    let registry = Arc::new(receiver_types());

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let bytes = bytes.clone();
            let registry = Arc::clone(&registry);
            scope.spawn(move || {
                for _ in 0..100 {
                    let (decoded, root) = decode_value(bytes.clone(), &registry, B::TYPE_ID).unwrap();
                    let root = root.unwrap();
                    let peer = decoded.get_as::<B>(root).unwrap().pb.unwrap();
                    assert_eq!(decoded.get_as::<B>(peer).unwrap().pb, Some(root));
                }
            });
        }
    });
}
